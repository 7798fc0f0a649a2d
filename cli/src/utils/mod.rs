pub mod env_paths;
pub mod files;
