//! Shared configuration, CLI vocabulary and logging setup for kafka-idle-topics.

pub mod cli;
pub mod config;
pub mod string_set;

pub use config::Configuration;
