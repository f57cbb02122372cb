pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use shipflow_core::config::{AppConfig, ConfigOverrides, LoadOptions, LogFormat};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "shipflow",
    about = "Shipflow operator CLI",
    long_about = "Inspect configuration and operate the durable workflow draft store.",
    after_help = "Examples:\n  shipflow doctor --json\n  shipflow config\n  shipflow drafts inspect"
)]
pub struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    #[arg(long, global = true, help = "Path to a shipflow.toml config file")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Override database.url")]
    database_url: Option<String>,
    #[arg(long, global = true, help = "Override drafts.session_key")]
    session_key: Option<String>,
    #[arg(long, global = true, help = "Override logging.level")]
    log_level: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, DB connectivity, schema, and the saved draft")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Inspect or clear the saved workflow draft")]
    Drafts {
        #[command(subcommand)]
        command: DraftsCommand,
    },
}

#[derive(Debug, Subcommand)]
enum DraftsCommand {
    #[command(about = "Report the saved draft and its age without consuming it")]
    Inspect,
    #[command(about = "Remove the saved draft for the configured session key")]
    Clear,
}

impl GlobalArgs {
    fn load_options(self) -> LoadOptions {
        LoadOptions {
            config_path: self.config,
            require_file: false,
            overrides: ConfigOverrides {
                database_url: self.database_url,
                log_level: self.log_level,
                drafts_session_key: self.session_key,
                ..ConfigOverrides::default()
            },
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = cli.global.load_options();
    init_logging(&options);

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(&options),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run(&options) }
        }
        Command::Doctor { json } => commands::doctor::run(&options, json),
        Command::Drafts { command } => match command {
            DraftsCommand::Inspect => commands::drafts::inspect(&options),
            DraftsCommand::Clear => commands::drafts::clear(&options),
        },
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logs go to stderr so stdout carries only command output. A config that
/// fails to load falls back to defaults here; the command reports the error.
fn init_logging(options: &LoadOptions) {
    let config = AppConfig::load(options.clone()).unwrap_or_default();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(filter);

    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
