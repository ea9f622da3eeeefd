pub mod config;
mod config_env;
pub mod elapsed;
pub mod models;
pub mod outbound;
pub mod reminder;
pub mod store;
pub mod timestamp;
pub mod tracker;
