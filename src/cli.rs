//! # Command-Line Interface Module
//!
//! Argument parsing for the two demo binaries (`netoff-worker`,
//! `netoff-driver`), using the `clap` crate's derive API the way the
//! teacher's benchmark CLI does.

use clap::{
    builder::styling::{AnsiColor, Styles},
    Parser,
};
use std::path::PathBuf;

/// Defines the styles for the help message to replicate clap v3's appearance.
fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Yellow.on_default())
        .usage(AnsiColor::Yellow.on_default())
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// `netoff-worker` - hosts one simulation and waits for a driver to couple to it.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None, styles = styles())]
pub struct WorkerArgs {
    /// Address to bind the listener on.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to bind the listener on.
    #[arg(short = 'p', long, default_value_t = 8080)]
    pub port: u16,

    /// Write detailed logs to this file (daily-rolling) instead of only stdout.
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Silence user-facing output on stdout; only the log file (if any) is written.
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Increase log verbosity (-v for debug, -vv for trace).
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// `netoff-driver` - connects to a worker and drives a short coupled run.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None, styles = styles())]
pub struct DriverArgs {
    /// Address of the worker to connect to.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port of the worker to connect to.
    #[arg(short = 'p', long, default_value_t = 8080)]
    pub port: u16,

    /// Path (as understood by the worker) of the simulation to couple to.
    #[arg(long, default_value = "demo.sim")]
    pub sim_path: String,

    /// Number of run-phase steps to execute before disconnecting.
    #[arg(short = 'n', long, default_value_t = 10)]
    pub steps: u32,

    /// Write detailed logs to this file (daily-rolling) instead of only stdout.
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Silence user-facing output on stdout; only the log file (if any) is written.
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Increase log verbosity (-v for debug, -vv for trace).
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
