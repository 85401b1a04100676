pub mod check;
pub mod config_setup;
pub mod dev;
pub mod documents;
pub mod env_file;
pub mod labels;
pub mod prompt;
pub mod setup;
