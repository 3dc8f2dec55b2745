//! landisco: command-line front-end for the discovery engine.

use anyhow::Result;
use clap::{Parser, Subcommand};
use landisco::config;
use landisco::events::DiscoveryEvent;
use landisco::manager::{new_event_channel, DiscoveryManager};
use landisco::util::net;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "landisco", about = "Multi-protocol LAN device discovery engine")]
struct Cli {
    /// Configuration directory
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug output
    #[arg(short = 'D', long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every discovery service across every local segment
    DiscoverAll,
    /// Run every discovery service against one CIDR segment
    Discover {
        #[arg(long)]
        cidr: Option<String>,
        #[arg(long)]
        method: Option<String>,
    },
    /// List local network interfaces
    ListInterfaces,
    /// List local network segments (CIDRs)
    ListSegments,
    /// Print the effective configuration as YAML
    DumpConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(filter.parse()?))
        .init();

    let config = config::load_config(cli.config.as_deref().map(std::path::Path::new))?;

    match cli.command {
        Commands::DiscoverAll => {
            let manager = DiscoveryManager::new(config);
            let (sink, mut receiver) = new_event_channel();
            let printer = tokio::spawn(async move { print_events(&mut receiver).await });
            let devices = manager.discover_all(sink).await;
            printer.abort();
            print_devices(&devices);
        }
        Commands::Discover { cidr, method } => {
            let manager = DiscoveryManager::new(config);
            let (sink, mut receiver) = new_event_channel();
            let printer = tokio::spawn(async move { print_events(&mut receiver).await });

            let devices = match (cidr, method) {
                (cidr, Some(method)) => manager.discover_with_method(&method, cidr.as_deref(), sink).await?.devices,
                (Some(cidr), None) => manager.discover_segment(&cidr, sink).await,
                (None, None) => manager.discover_all(sink).await,
            };
            printer.abort();
            print_devices(&devices);
        }
        Commands::ListInterfaces => {
            for iface in net::get_local_network_interfaces() {
                println!("{} ({})", iface.name, iface.description);
                for addr in &iface.ipv4_addresses {
                    println!("  {}/{}", addr.ip_address, addr.prefix_length);
                }
            }
        }
        Commands::ListSegments => {
            for segment in net::get_local_network_segments() {
                println!("{segment}");
            }
        }
        Commands::DumpConfig => {
            println!("{}", serde_yaml::to_string(&config)?);
        }
    }

    Ok(())
}

async fn print_events(receiver: &mut tokio::sync::mpsc::UnboundedReceiver<DiscoveryEvent>) {
    while let Some(event) = receiver.recv().await {
        match event {
            DiscoveryEvent::ProgressChanged { method, current, total, current_target, status } => {
                println!("[{method}] {status} {current}/{total} ({current_target})");
            }
            DiscoveryEvent::DiscoveryError { method, message, .. } => {
                eprintln!("[{method}] error: {message}");
            }
            DiscoveryEvent::DeviceDiscovered { device, method, .. } => {
                println!("[{method}] found {} ({})", device.display_name(), device.ip_address);
            }
        }
    }
}

fn print_devices(devices: &[landisco::models::DiscoveredDevice]) {
    println!("\n{} device(s) discovered:", devices.len());
    for device in devices {
        println!(
            "  {:<15} {:<20} {:<12} methods={:?}",
            device.ip_address.to_string(),
            device.display_name(),
            device.device_type.to_string(),
            device.discovery_methods
        );
    }
}
