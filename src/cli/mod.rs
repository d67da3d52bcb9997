//! CLI module for the auth gateway

pub mod serve;

use clap::{Parser, Subcommand};

/// PMP Auth Gateway - signed bearer tokens with shared-counter rate limiting
#[derive(Parser)]
#[command(name = "pmp-auth-gateway")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP server
    Serve,
}
