use crate::config::ConsoleConfiguration;
use anyhow::{anyhow, Result};
use colored::*;
use std::collections::HashMap;

/// Configuration values keyed by section id
fn config_map(config: &ConsoleConfiguration) -> HashMap<String, HashMap<String, serde_yaml::Value>> {
    let mut config_map = HashMap::new();
    config_map.insert(config.id().to_string(), config.get_all_values().clone());
    config_map
}

/// List the loaded configuration
pub fn list(config: &ConsoleConfiguration, format: String) -> Result<()> {
    let config_map = config_map(config);

    match format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&config_map)?);
        }
        "yaml" => {
            println!("{}", serde_yaml::to_string(&config_map)?);
        }
        _ => {
            print_configs_text(&config_map, config);
        }
    }

    Ok(())
}

/// Get a specific configuration value
pub fn get(config: &ConsoleConfiguration, section: String, format: String) -> Result<()> {
    let mut config_map = HashMap::new();
    for (id, values) in self::config_map(config) {
        config_map.insert(id, serde_yaml::to_value(values)?);
    }

    // Dotted path, e.g. "console.snapshot_path"
    let parts: Vec<&str> = section.split('.').collect();
    let value = navigate_config_path(&config_map, &parts)?;

    match format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        "yaml" => {
            println!("{}", serde_yaml::to_string(&value)?);
        }
        _ => {
            print_config_value(&section, &value);
        }
    }

    Ok(())
}

/// Navigate through the configuration structure to find a specific value
fn navigate_config_path(
    configs: &HashMap<String, serde_yaml::Value>,
    path: &[&str],
) -> Result<serde_yaml::Value> {
    if path.is_empty() {
        return Err(anyhow!("Empty configuration path"));
    }

    // Get the top-level section
    let section = path[0];
    let mut current_value = configs
        .get(section)
        .ok_or_else(|| anyhow!("Configuration section '{}' not found", section))?
        .clone();

    // Navigate through the rest of the path
    for (i, &key) in path.iter().enumerate().skip(1) {
        match current_value {
            serde_yaml::Value::Mapping(ref map) => {
                current_value = map
                    .get(serde_yaml::Value::String(key.to_string()))
                    .ok_or_else(|| {
                        let partial_path = path[..=i].join(".");
                        anyhow!("Configuration key '{}' not found", partial_path)
                    })?
                    .clone();
            }
            _ => {
                let partial_path = path[..i].join(".");
                return Err(anyhow!(
                    "Cannot navigate further from '{}': not a mapping",
                    partial_path
                ));
            }
        }
    }

    Ok(current_value)
}

/// Print configurations in a formatted text output
fn print_configs_text(
    configs: &HashMap<String, HashMap<String, serde_yaml::Value>>,
    config: &ConsoleConfiguration,
) {
    println!("{}", "=== Console Configuration ===".bold());
    println!();

    match config.source() {
        Some(path) => println!("{}: {}", "Source".bold(), path.display().to_string().green()),
        None => println!("{}", "No configuration file found, using defaults".yellow()),
    }
    println!();

    for (name, values) in configs {
        println!("{}", format!("[{}]", name).cyan().bold());
        let mut keys: Vec<&String> = values.keys().collect();
        keys.sort();
        for key in keys {
            print!("  {}: ", key.cyan());
            print_yaml_value(&values[key], 2);
        }
        println!();
    }

    println!("{}", format!("Total sections: {}", configs.len()).green());
}

/// Print a specific configuration value
fn print_config_value(path: &str, value: &serde_yaml::Value) {
    println!("{}", "=== Configuration Value ===".bold());
    println!();
    println!("{}: {}", "Path".bold(), path.cyan());
    println!("{}: {}", "Type".bold(), value_type_name(value).yellow());
    println!();
    print!("{}: ", "Value".bold());
    print_yaml_value(value, 1);
}

/// Get a human-readable name for a YAML value type
fn value_type_name(value: &serde_yaml::Value) -> &str {
    match value {
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Bool(_) => "boolean",
        serde_yaml::Value::Number(_) => "number",
        serde_yaml::Value::String(_) => "string",
        serde_yaml::Value::Sequence(_) => "array",
        serde_yaml::Value::Mapping(_) => "object",
        serde_yaml::Value::Tagged(_) => "tagged",
    }
}

/// Colored single-line rendering of a scalar, `None` for collections
fn scalar_text(value: &serde_yaml::Value) -> Option<ColoredString> {
    match value {
        serde_yaml::Value::Null => Some("null".dimmed()),
        serde_yaml::Value::Bool(b) => Some(b.to_string().blue()),
        serde_yaml::Value::Number(n) => Some(n.to_string().magenta()),
        // Paths and routes stand out from plain words
        serde_yaml::Value::String(s) if s.contains('/') => Some(s.green()),
        serde_yaml::Value::String(s) => Some(s.yellow()),
        _ => None,
    }
}

/// Recursively print a YAML value with indentation
fn print_yaml_value(value: &serde_yaml::Value, indent_level: usize) {
    let indent = "  ".repeat(indent_level);

    if let Some(text) = scalar_text(value) {
        println!("{}", text);
        return;
    }

    match value {
        serde_yaml::Value::Sequence(seq) => {
            println!();
            for item in seq {
                print!("{}- ", indent);
                print_yaml_value(item, indent_level + 1);
            }
        }
        serde_yaml::Value::Mapping(map) => {
            println!();
            for (key, val) in map {
                let key = match key {
                    serde_yaml::Value::String(k) => k.clone(),
                    other => format!("{:?}", other),
                };
                print!("{}{}: ", indent, key.cyan());
                print_yaml_value(val, indent_level + 1);
            }
        }
        serde_yaml::Value::Tagged(tagged) => {
            print!("!{} ", tagged.tag);
            print_yaml_value(&tagged.value, indent_level);
        }
        _ => {}
    }
}
