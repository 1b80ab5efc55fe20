pub mod api_key;
pub mod cli;
pub mod client;
pub mod load_config;
pub mod openrouter;

pub use cli::{run, Cli, Commands};
