//! I/O helpers: the environment boundary and the config file.

pub mod config;
pub mod env;
pub mod tabletop;
