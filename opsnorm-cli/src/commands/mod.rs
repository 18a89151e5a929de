//! Command handlers -- one module per subcommand

pub mod apps;
pub mod config;
pub mod normalize;
pub mod rules;
