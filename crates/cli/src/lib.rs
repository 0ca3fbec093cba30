pub mod cli;
pub mod commands;
pub mod connect;
pub mod error;
pub mod logging;
