pub mod check;
pub mod config;
pub mod menu;
pub mod role;
pub mod route;
pub mod tree;
