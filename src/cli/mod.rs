//! CLI command definitions for kanbe
//!
//! The main entry point is the `Cli` struct which contains subcommands.

pub mod export;

use clap::{Parser, Subcommand};
use export::ExportArgs;

/// Kanban board server and maintenance tools
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// HTTP port (overrides config)
    #[arg(short, long, global = true)]
    pub port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP server and daily jobs (default if no subcommand given)
    Serve,

    /// Run one recurrence sweep now
    Recur,

    /// Write one database backup now and prune old ones
    Backup,

    /// Export a user's board as JSON
    Export(ExportArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_serve_with_stderr_logging() {
        let cli = Cli::parse_from(["kanbe"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.log, "2");
        assert!(!cli.verbose);
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::parse_from(["kanbe", "export", "--user", "u1", "-d", "/tmp/b.db", "--gzip"]);
        assert_eq!(cli.database.as_deref(), Some("/tmp/b.db"));
        match cli.command {
            Some(Command::Export(args)) => {
                assert_eq!(args.user, "u1");
                assert!(args.should_compress());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
