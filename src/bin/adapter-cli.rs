use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use lt_lambda_adapter::assets::AssetProvisioner;
use lt_lambda_adapter::backend::AppRegistry;
use lt_lambda_adapter::config::{load_from_env, AdapterConfig, LogFormat, ObservabilityConfig};
use lt_lambda_adapter::http::InvocationEvent;
use lt_lambda_adapter::lifecycle::{archive_source, build_adapter};
use lt_lambda_adapter::observability::init_logging;

#[derive(Parser)]
#[command(name = "adapter-cli")]
#[command(about = "Operator tooling for the LibreTranslate Lambda adapter", long_about = None)]
struct Cli {
    /// Log format for this run (json or pretty)
    #[arg(long, default_value = "pretty")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed the shared model mount from object storage
    Provision {
        /// Mount to populate (defaults to the configured mount path)
        #[arg(long)]
        mount: Option<PathBuf>,
    },
    /// Run one invocation event through the adapter and print the response
    Invoke {
        /// Path to the event JSON
        #[arg(long)]
        event: PathBuf,
    },
    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&ObservabilityConfig {
        log_format: cli.log_format,
        ..ObservabilityConfig::default()
    });

    let config = match load_from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(2);
        }
    };

    let result = match cli.command {
        Commands::Provision { mount } => provision(&config, mount).await,
        Commands::Invoke { event } => invoke(&config, event).await,
        Commands::Config => print_config(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(2)
        }
    }
}

async fn provision(
    config: &AdapterConfig,
    mount: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mount = mount.unwrap_or_else(|| config.assets.mount_path.clone());
    let source = archive_source(&config.assets).await;
    let provisioner = AssetProvisioner::new(config.assets.clone(), source);

    let outcome = provisioner.seed_shared_mount(&mount).await?;
    println!("{}: {:?}", mount.display(), outcome);
    Ok(())
}

async fn invoke(config: &AdapterConfig, event: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let raw = tokio::fs::read(&event).await?;
    let event: InvocationEvent = serde_json::from_slice(&raw)?;

    let adapter = build_adapter(config, &AppRegistry::new()).await;
    let result = adapter.handle(&event).await;
    adapter.shutdown();

    let response = result?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn print_config(config: &AdapterConfig) -> Result<(), Box<dyn std::error::Error>> {
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
