mod cli;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

use stratum_core::plugin_system::{PluginCategory, RegisterOptions};
use stratum_core::{Event, Kernel, KernelOptions, Result};

// --- Bundled plugins, registered statically ---
use core_event_logger::EventLoggerPlugin;
use static_market_data::StaticMarketDataPlugin;

/// Stratum: plugin kernel for market research tooling
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Configuration file (JSON, YAML or TOML); may be repeated
    #[arg(short, long = "config", global = true)]
    config: Vec<PathBuf>,

    /// Log filter, e.g. `info` or `stratum_core=debug`
    #[arg(long, env = "STRATUM_LOG_LEVEL", default_value = "warn", global = true)]
    log_level: String,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// Show kernel and component statistics
    Status,
    /// List registered plugins
    Plugins {
        /// Only plugins of this category, e.g. `data-provider`
        #[arg(long)]
        category: Option<String>,
    },
    /// Show recent events
    Events {
        /// Number of events to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
        /// Only events whose type starts with this prefix
        #[arg(long = "type")]
        event_type: Option<String>,
    },
    /// List registered services
    Services,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    if let Err(e) = init_logging(&args.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Install the fmt subscriber on stderr and route `log` records into it.
fn init_logging(filter: &str) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_new(filter)?;
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing_log::LogTracer::init()?;
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

async fn run(args: CliArgs) -> Result<()> {
    let options = KernelOptions { config_files: args.config.clone(), ..KernelOptions::default() };
    let kernel = Kernel::new(options).await?;

    register_bundled_plugins(&kernel).await?;
    kernel.start().await?;

    let command = args.command.clone().unwrap_or(Commands::Status);
    let outcome = execute(&kernel, &command, args.json);

    kernel.stop().await?;
    outcome
}

async fn register_bundled_plugins(kernel: &Kernel) -> Result<()> {
    kernel
        .register_plugin(Arc::new(EventLoggerPlugin::new()), RegisterOptions::default())
        .await?;
    tracing::debug!("Registered {}", core_event_logger::PLUGIN_ID);

    let mut market_config = kernel.config().plugin_config(static_market_data::PLUGIN_ID);
    if market_config.get("quotes").is_none() {
        market_config = sample_quotes();
    }
    kernel
        .register_plugin(
            Arc::new(StaticMarketDataPlugin::new()),
            RegisterOptions::default().with_config(market_config),
        )
        .await?;
    tracing::debug!("Registered {}", static_market_data::PLUGIN_ID);
    Ok(())
}

/// Quotes served when no configuration names any
fn sample_quotes() -> Value {
    json!({
        "quotes": {
            "SPY": { "price": 512.4, "change": 2.1 },
            "QQQ": { "price": 441.9, "change": -1.3 },
        }
    })
}

fn execute(kernel: &Kernel, command: &Commands, as_json: bool) -> Result<()> {
    let _span = tracing::info_span!("command", ?command).entered();
    match command {
        Commands::Status => {
            let status = kernel.status();
            if as_json {
                cli::print_json(&serde_json::to_value(&status).map_err(|e| e.to_string())?);
            } else {
                cli::status_lines(&status).iter().for_each(|line| println!("{}", line));
            }
        }
        Commands::Plugins { category } => {
            let plugins = match category {
                Some(name) => {
                    let category = PluginCategory::parse(name).ok_or_else(|| format!("Unknown category '{}'", name))?;
                    kernel.plugins_by_category(category)
                }
                None => kernel.plugins(),
            };
            if as_json {
                cli::print_json(&Value::Array(plugins.iter().map(cli::plugin_json).collect()));
            } else if plugins.is_empty() {
                println!("No plugins registered.");
            } else {
                println!("Plugins:");
                plugins.iter().for_each(|info| println!("{}", cli::plugin_line(info)));
            }
        }
        Commands::Events { limit, event_type } => {
            let events: Vec<_> = kernel
                .events()
                .history(None)
                .into_iter()
                .filter(|e| event_type.as_ref().map_or(true, |prefix| e.event_type.starts_with(prefix.as_str())))
                .collect();
            let recent = &events[events.len().saturating_sub(*limit)..];
            if as_json {
                let recent: Vec<&Event> = recent.iter().map(|event| event.as_ref()).collect();
                cli::print_json(&serde_json::to_value(recent).map_err(|e| e.to_string())?);
            } else {
                println!("Events ({} of {}):", recent.len(), events.len());
                recent.iter().for_each(|event| println!("{}", cli::event_line(event)));
            }
        }
        Commands::Services => {
            let services = kernel.services().services();
            if as_json {
                cli::print_json(&serde_json::to_value(&services).map_err(|e| e.to_string())?);
            } else {
                println!("Services:");
                services.iter().for_each(|service| println!("{}", cli::service_line(service)));
            }
        }
    }
    Ok(())
}
