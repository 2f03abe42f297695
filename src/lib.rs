//! doky-deploy library — exposes modules for integration testing.

#![cfg_attr(test, allow(clippy::expect_used))]

pub mod apt;
pub mod cli;
pub mod command_runner;
pub mod config;
pub mod deploy;
pub mod error;
pub mod fs;
pub mod output;
pub mod provision;
pub mod systemd;
pub mod talib;
pub mod venv;
