use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use office_voice::audio::native::CpalHost;
use office_voice::backend::HttpBackend;
use office_voice::client::{self, GeminiConnector};
use office_voice::config::Config;
use office_voice::inventory::InventoryStore;
use office_voice::SessionController;
use std::sync::Arc;
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Parser)]
#[command(version, about = "Voice assistant for the office electronics backend")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start a voice session (default)
    Talk {
        /// Input device name; the host default when omitted
        #[arg(long)]
        input_device: Option<String>,
        /// Output device name; the host default when omitted
        #[arg(long)]
        output_device: Option<String>,
    },
    /// Print the office layout known to the backend
    Layout,
    /// List the available audio devices
    Devices,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load application configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    tracing::info!("Configuration loaded successfully.");

    match args.command.unwrap_or(Command::Talk {
        input_device: None,
        output_device: None,
    }) {
        Command::Talk {
            input_device,
            output_device,
        } => talk(&config, input_device, output_device).await,
        Command::Layout => layout(&config).await,
        Command::Devices => devices(),
    }
}

async fn talk(config: &Config, input_device: Option<String>, output_device: Option<String>) -> Result<()> {
    let inventory = Arc::new(InventoryStore::new(Arc::new(HttpBackend::new(&config.backend_url))));
    if inventory.refresh().await.is_err() {
        tracing::error!("Error: Could not load office layout data.");
    }

    let client_config = client::Config::builder()
        .with_api_key(config.api_key.as_deref().unwrap_or_default())
        .build();
    let connector = Arc::new(GeminiConnector::new(client_config));
    let host = Box::new(CpalHost::new(input_device, output_device));
    let mut session = SessionController::new(inventory, connector, host, &config.model);

    let started = tokio::select! {
        result = session.start() => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    match started {
        None => {
            session.stop();
            tracing::info!("{}", session.status());
            return Ok(());
        }
        Some(Err(_)) => {
            tracing::error!("{}", session.status());
            return Ok(());
        }
        Some(Ok(())) => tracing::info!("{}", session.status()),
    }

    session
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for ctrl-c: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;
    tracing::info!("{}", session.status());
    Ok(())
}

async fn layout(config: &Config) -> Result<()> {
    let inventory = InventoryStore::new(Arc::new(HttpBackend::new(&config.backend_url)));
    inventory
        .refresh()
        .await
        .context("Could not load office layout data")?;
    for room in inventory.layout() {
        println!("{} ({})", room.room_name, room.room_id);
        for device in &room.electronics {
            println!(
                "  - {} [{}] {} ({})",
                device.electronics_name, device.electronics_type, device.state, device.electronics_id
            );
        }
    }
    if let Some(instruction) = inventory.system_instruction() {
        println!("\nSystem instruction:\n{instruction}");
    }
    Ok(())
}

fn devices() -> Result<()> {
    println!("Input devices:\n{}", office_voice::utils::device::get_available_inputs()?);
    println!("Output devices:\n{}", office_voice::utils::device::get_available_outputs()?);
    Ok(())
}
