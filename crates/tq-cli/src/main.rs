//! torq CLI
//!
//! Single binary for all torq operations:
//! - Profiler sessions (the default when no command is given)
//! - Perfetto triggers for a running trace
//! - Device listing, multi-machine relay setup and configuration

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::parser::ValueSource;
use clap::{ArgMatches, Args, CommandFactory, FromArgMatches, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use torq::commands::{self, CommandContext, ProfilerArgs, VmConfigureArgs};
use tq_core::config::ConfigFile;

#[derive(Parser)]
#[command(name = "torq")]
#[command(author, version, about = "Torq CLI tool for performance tests.")]
#[command(propagate_version = true)]
struct Cli {
    /// Specifies serial of the device that will be used
    #[arg(long, global = true)]
    serial: Option<String>,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(flatten)]
    profiler: ProfilerArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Trace and profile Android (the default command)
    Profiler(ProfilerArgs),

    /// Send perfetto triggers to a trace already running on the device
    Trigger {
        /// Trigger names, sent in order
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// List connected devices
    Devices {
        /// Print the list as JSON
        #[arg(long)]
        json: bool,
    },

    /// Configure perfetto in virtualized Android
    Vm {
        #[command(subcommand)]
        action: VmAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum VmAction {
    /// Point secondary machines' traced_relay at the primary's traced
    Configure(VmConfigureArgs),
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Show config file path
    Path,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Get specific config value
    Get { key: String },
    /// Set config value
    Set { key: String, value: String },
}

/// Top-level profiler flags only make sense when no command is named
fn reject_stray_profiler_flags(matches: &ArgMatches) {
    if matches.subcommand_name().is_none() {
        return;
    }
    let flags = ProfilerArgs::augment_args(clap::Command::new("profiler"));
    let stray = flags
        .get_arguments()
        .find(|arg| matches.value_source(arg.get_id().as_str()) == Some(ValueSource::CommandLine));
    if let Some(arg) = stray {
        let name = arg
            .get_long()
            .map(|long| format!("--{}", long))
            .unwrap_or_else(|| arg.get_id().to_string());
        Cli::command()
            .error(
                ErrorKind::ArgumentConflict,
                format!(
                    "'{}' is a profiler option; pass it after 'torq profiler' or drop the '{}' command",
                    name,
                    matches.subcommand_name().unwrap_or_default()
                ),
            )
            .exit();
    }
}

fn main() -> Result<()> {
    let matches = Cli::command().get_matches();
    reject_stray_profiler_flags(&matches);
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    // Setup logging based on verbosity
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config_path = cli.config.as_deref();
    let command = cli
        .command
        .unwrap_or(Commands::Profiler(cli.profiler));

    // The config file is only read by commands that talk to devices
    let context = || -> Result<CommandContext> {
        let config = ConfigFile::load_or_default(config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?;
        let args_hint = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
        Ok(CommandContext::new(config, cli.serial, args_hint))
    };

    match command {
        Commands::Profiler(args) => commands::profiler_command(&context()?, &args)?,
        Commands::Trigger { names } => commands::trigger_command(&context()?, &names)?,
        Commands::Devices { json } => commands::devices_command(&context()?, json)?,
        Commands::Vm {
            action: VmAction::Configure(args),
        } => commands::vm_configure_command(&context()?, &args)?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_show(config_path)?,
            ConfigAction::Path => commands::config_path(config_path)?,
            ConfigAction::Init { force } => commands::config_init(config_path, force)?,
            ConfigAction::Get { key } => commands::config_get(config_path, &key)?,
            ConfigAction::Set { key, value } => commands::config_set(config_path, &key, &value)?,
        },
    }

    Ok(())
}
