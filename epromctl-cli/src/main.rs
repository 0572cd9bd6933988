//! epromctl CLI - Command-line tool for serial EPROM programmers.
//!
//! ## Features
//!
//! - Read a whole EPROM into a text image file
//! - Program and verify an EPROM from an image file
//! - Fill an EPROM with random data for testing
//! - Single-byte read and write, write protection
//! - Shell completion generation
//! - Environment variable and config file support

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use console::style;
use env_logger::Env;
use log::debug;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};

mod commands;
mod config;
mod progress;
mod session;

use commands::bytes::{cmd_protect, cmd_read_byte, cmd_write_byte};
use commands::completions::cmd_completions;
use commands::devices::cmd_devices;
use commands::transfer::{cmd_fill, cmd_read, cmd_verify, cmd_write};
use config::Config;
use session::Session;

/// Whether stderr is a terminal (set once at startup).
static STDERR_IS_TTY: AtomicBool = AtomicBool::new(true);

/// Check if animations should be used (TTY and colors enabled).
fn use_fancy_output() -> bool {
    STDERR_IS_TTY.load(Ordering::Relaxed) && console::colors_enabled_stderr()
}

/// Failures detected by the CLI before any device I/O.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    /// Required setting missing.
    #[error("{0}")]
    Usage(String),
    /// Argument or file rejected.
    #[error("{0}")]
    Validation(String),
}

/// Exit code for operational failures (device, port, timeout, mismatch).
const EXIT_FAILURE: u8 = 1;

/// Exit code for usage and validation failures, matching clap.
const EXIT_USAGE: u8 = 2;

/// epromctl - Read, program and verify EPROMs through a serial programmer.
///
/// Environment variables:
///   EPROMCTL_PORT     - Default serial port
///   EPROMCTL_DEVICE   - Default EPROM type (28C16, 28C64, ...)
#[derive(Parser)]
#[command(name = "epromctl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// EPROM type (see `epromctl devices`).
    #[arg(short, long, global = true, env = "EPROMCTL_DEVICE")]
    device: Option<String>,

    /// Serial port the programmer is attached to (e.g. /dev/ttyUSB0, COM4).
    #[arg(short, long, global = true, env = "EPROMCTL_PORT")]
    port: Option<String>,

    /// Verbose output level (-v, -vv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress progress and status output).
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Plain `#` progress marks instead of a progress bar.
    #[arg(long, global = true)]
    plain: bool,

    /// Path to a configuration file.
    #[arg(long = "config", global = true, value_name = "PATH")]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Read the whole EPROM into a new image file.
    Read {
        /// Image file to create (must not exist).
        file: PathBuf,
    },

    /// Program the EPROM from an image file.
    Write {
        /// Image file to program.
        file: PathBuf,
    },

    /// Compare the EPROM with an image file.
    Verify {
        /// Image file to compare against.
        file: PathBuf,
    },

    /// Read a single byte.
    #[command(alias = "readbyte")]
    ReadByte {
        /// Address in hex (e.g. 0x1f0 or 1f0).
        #[arg(value_parser = parse_hex_u32)]
        address: u32,
    },

    /// Write a single byte.
    #[command(alias = "writebyte")]
    WriteByte {
        /// Address in hex (e.g. 0x1f0 or 1f0).
        #[arg(value_parser = parse_hex_u32)]
        address: u32,

        /// Data byte in hex (0x0 to 0xff).
        #[arg(value_parser = parse_hex_u8)]
        data: u8,
    },

    /// Fill the EPROM with random data and save it to a new image file.
    Fill {
        /// Image file to create (must not exist).
        file: PathBuf,
    },

    /// Set (1) or remove (0) write protection.
    Protect {
        /// 1 to protect, 0 to unprotect.
        #[arg(value_parser = clap::value_parser!(u8).range(0..=1))]
        mode: u8,
    },

    /// List supported EPROM types.
    Devices {
        /// Output the list as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell type for completions.
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Parse hexadecimal address (supports 0x prefix and underscores).
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    let s = s.trim();
    let s = s.trim_start_matches("0x").trim_start_matches("0X");
    // Support underscore separators like 0x1f_ff
    let s: String = s.chars().filter(|c| *c != '_').collect();
    u32::from_str_radix(&s, 16).map_err(|e| format!("The address is not a valid hex value: {e}"))
}

/// Parse one hexadecimal data byte.
fn parse_hex_u8(s: &str) -> Result<u8, String> {
    let value = parse_hex_u32(s).map_err(|_| "The data is not a valid hex value".to_string())?;
    u8::try_from(value)
        .map_err(|_| "The data must be between 0x0 and 0xff (which is 0 and 255 in decimal)".into())
}

/// Map a failure to the process exit code.
fn exit_code(err: &anyhow::Error) -> u8 {
    let rejected_early = err.chain().any(|cause| {
        cause.is::<CliError>()
            || cause
                .downcast_ref::<epromctl::Error>()
                .is_some_and(epromctl::Error::is_validation)
    });
    if rejected_early { EXIT_USAGE } else { EXIT_FAILURE }
}

fn init_logging(cli: &Cli) {
    // Setup logging based on verbosity
    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();
}

fn run(cli: &Cli, config: &Config) -> Result<()> {
    match &cli.command {
        Commands::Devices { json } => cmd_devices(*json),
        Commands::Completions { shell } => {
            cmd_completions(*shell);
            Ok(())
        },
        Commands::Read { file } => cmd_read(cli, &Session::resolve(cli, config)?, file),
        Commands::Write { file } => cmd_write(cli, &Session::resolve(cli, config)?, file),
        Commands::Verify { file } => cmd_verify(cli, &Session::resolve(cli, config)?, file),
        Commands::Fill { file } => cmd_fill(cli, &Session::resolve(cli, config)?, file),
        Commands::ReadByte { address } => {
            cmd_read_byte(&Session::resolve(cli, config)?, *address)
        },
        Commands::WriteByte { address, data } => {
            cmd_write_byte(&Session::resolve(cli, config)?, *address, *data)
        },
        Commands::Protect { mode } => cmd_protect(&Session::resolve(cli, config)?, *mode),
    }
}

fn main() -> ExitCode {
    // --- NO_COLOR and TTY detection (clig.dev best practice) ---
    let stderr_is_tty = console::Term::stderr().is_term();
    STDERR_IS_TTY.store(stderr_is_tty, Ordering::Relaxed);

    if env::var("NO_COLOR").is_ok() || !stderr_is_tty {
        // Disable all color output
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let cli = Cli::parse();
    init_logging(&cli);

    debug!(
        "epromctl v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    // Load configuration
    let config = if let Some(ref path) = cli.config_path {
        Config::load_from_path(path)
    } else {
        Config::load()
    };

    match run(&cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", style("Error:").red().bold());
            ExitCode::from(exit_code(&err))
        },
    }
}
