//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::Parser;

/// Exit code when a required flag is missing or the configuration is unusable
pub const USAGE_EXIT_CODE: u8 = 1;

/// Archivist - back up configured directories into one compressed archive
#[derive(Parser, Debug)]
#[command(name = "archivist")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the backup configuration file (required)
    #[arg(short, long, value_name = "/path/to/config")]
    pub config: Option<Utf8PathBuf>,

    /// Forward archiver error output to the system log
    #[arg(short, long)]
    pub err: bool,

    /// Path to the archive file to write; it is compressed to <outfile>.gz (required)
    #[arg(short, long, value_name = "/path/to/outfile")]
    pub outfile: Option<Utf8PathBuf>,

    /// List the paths that would be archived and exit
    #[arg(long)]
    pub dry_run: bool,

    /// Exit with status 2 when the backup fails instead of 0
    #[arg(long)]
    pub strict: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress terminal log output
    #[arg(short, long)]
    pub quiet: bool,
}
