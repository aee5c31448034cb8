pub mod config;
pub mod database;
mod state;

pub use config::Config;
pub use database::Database;
