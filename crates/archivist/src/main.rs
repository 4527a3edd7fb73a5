//! Archivist CLI - unattended directory backups
//!
//! This is the main entry point for the archivist command-line interface.

mod cli;
mod logging;
mod output;

use anyhow::{Context, Result};
use archivist_backup::{BackupPipeline, RunOptions, STRICT_FAILURE_EXIT_CODE};
use archivist_core::{BackupConfig, TracingSink};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{CommandFactory, Parser};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use cli::{Cli, USAGE_EXIT_CODE};

fn main() -> ExitCode {
    // Parse CLI args
    let cli = Cli::parse();

    // Initialize tracing
    logging::init(cli.verbose, cli.quiet);

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::from(USAGE_EXIT_CODE)
        }
    }
}

/// Runs one backup and returns the process exit code.
///
/// Errors returned from here are configuration problems and exit with
/// [`USAGE_EXIT_CODE`]. Failures inside the backup itself are logged by the
/// pipeline and only change the exit code under `--strict`.
fn run(cli: Cli) -> Result<u8> {
    let (Some(config_path), Some(outfile)) = (cli.config.as_deref(), cli.outfile.as_deref())
    else {
        Cli::command().print_help()?;
        return Ok(USAGE_EXIT_CODE);
    };

    let config = BackupConfig::load(config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;
    let pipeline = BackupPipeline::from_config(&config, Arc::new(TracingSink::new()))
        .context("Invalid backup configuration")?;

    if cli.dry_run {
        return Ok(dry_run(&pipeline, cli.strict));
    }

    let outfile = resolve_outfile(outfile)?;
    let report = pipeline.run(&RunOptions {
        outfile,
        report_diagnostics: cli.err,
    });

    match &report.error {
        Some(e) => {
            let kind = if e.is_filesystem_access() {
                "filesystem access"
            } else {
                "configuration"
            };
            tracing::debug!("Backup failed during {:?} ({}): {}", report.failed_at, kind, e);
        }
        None => tracing::debug!(
            "Backup of {} entries finished ({} skipped)",
            report.manifest_entries,
            report.skipped.len()
        ),
    }

    Ok(report.exit_code(cli.strict))
}

/// Prints the manifest the configuration would produce.
fn dry_run(pipeline: &BackupPipeline, strict: bool) -> u8 {
    match pipeline.build_manifest() {
        Ok(manifest) => {
            output::header("Backup manifest");
            output::kv("Roots", &pipeline.roots().len().to_string());
            output::kv("Entries", &manifest.len().to_string());
            println!();
            for path in &manifest {
                println!("{}", Path::new(path).display());
            }
            for skipped in manifest.skipped() {
                output::warning(&format!("Skipped: {}", skipped));
            }
            if manifest.is_empty() {
                output::warning("Nothing would be archived");
            }
            0
        }
        Err(e) => {
            output::error(&format!("Failed to build manifest: {}", e));
            if strict {
                STRICT_FAILURE_EXIT_CODE
            } else {
                output::info("Exiting with status 0; pass --strict to fail instead");
                0
            }
        }
    }
}

/// Anchors a relative output path at the invoking directory.
fn resolve_outfile(outfile: &Utf8Path) -> Result<Utf8PathBuf> {
    if outfile.is_absolute() {
        return Ok(outfile.to_owned());
    }
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let cwd = Utf8PathBuf::try_from(cwd).context("Current directory path is not valid UTF-8")?;
    Ok(cwd.join(outfile))
}
