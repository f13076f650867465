//! Command-line interface definitions for the `vmctl` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

/// Top-level CLI for the `vmctl` binary.
#[derive(Debug, Parser)]
#[command(
    name = "vmctl",
    about = "List, inspect, start, stop, suspend, and resume Compute Engine instances",
    arg_required_else_help = true
)]
pub(crate) struct Cli {
    /// Project that owns the instances (overrides `VMCTL_PROJECT_ID`).
    #[arg(long, global = true, value_name = "PROJECT")]
    pub(crate) project: Option<String>,
    /// Zone to operate in (overrides `VMCTL_ZONE`).
    #[arg(long, global = true, value_name = "ZONE")]
    pub(crate) zone: Option<String>,
    /// Give up waiting for an operation after this many seconds.
    #[arg(long, global = true, value_name = "SECS")]
    pub(crate) timeout: Option<u64>,
    /// Output style for results.
    #[arg(long, global = true, value_enum, default_value_t = Format::Text)]
    pub(crate) format: Format,
    /// Increase log verbosity (repeat for more detail).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub(crate) verbose: u8,
    /// Action to perform.
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// Output styles accepted by `--format`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub(crate) enum Format {
    /// One human-readable line per result.
    Text,
    /// A single JSON document.
    Json,
}

/// Subcommands accepted by `vmctl`.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// List every instance in the zone.
    #[command(name = "list")]
    List,
    /// Show the status of one instance.
    #[command(name = "get")]
    Get(InstanceArgs),
    /// Start a TERMINATED instance and wait for it.
    #[command(name = "start")]
    Start(InstanceArgs),
    /// Stop an instance and wait for it.
    #[command(name = "stop")]
    Stop(InstanceArgs),
    /// Suspend an instance and wait for it.
    #[command(name = "suspend")]
    Suspend(InstanceArgs),
    /// Resume a SUSPENDED instance and wait for it.
    #[command(name = "resume")]
    Resume(InstanceArgs),
}

/// Arguments shared by commands that target a single instance.
#[derive(Debug, Args)]
pub(crate) struct InstanceArgs {
    /// Instance name or numeric identifier.
    #[arg(value_name = "INSTANCE")]
    pub(crate) instance: String,
}
