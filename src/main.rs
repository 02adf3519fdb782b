use clap::{Parser, Subcommand};
use lora_mesh_gateway::config::GatewayConfig;
use lora_mesh_gateway::modem::{Modem, SerialLink, TcpLink};
use lora_mesh_gateway::{init_logger, log_info, MeshcoreSupervisor, MeshtasticSupervisor};
use rand::RngCore;

#[derive(Parser)]
#[command(name = "lora-mesh-gateway")]
#[command(about = "Demo gateway bridging Meshtastic and MeshCore over one LoRa modem")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the Meshtastic-compatible side against a modem reached over TCP.
    Meshtastic {
        host: String,
        #[arg(short, long, default_value_t = 4403)]
        port: u16,
        #[arg(short, long, default_value = "channels.json")]
        config: String,
    },
    /// Run the MeshCore-compatible side against a modem reached over a serial port.
    Meshcore {
        device: String,
        #[arg(short, long, default_value = "channels.json")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    let cli = Cli::parse();

    match cli.command {
        Commands::Meshtastic { host, port, config } => {
            let config = GatewayConfig::load(&config)?;
            let modem = Modem::new(Box::new(TcpLink::new(host, port)))?;
            let node_id = rand::thread_rng().next_u32();
            let supervisor = MeshtasticSupervisor::start(
                modem,
                node_id,
                config.meshtastic_channels()?,
                config.ping_reply_channel().to_string(),
            )
            .await?;
            log_info(&format!("meshtastic gateway running as node {node_id:08x}"));
            tokio::signal::ctrl_c().await.ok();
            supervisor.stop();
        }
        Commands::Meshcore { device, config } => {
            let config = GatewayConfig::load(&config)?;
            let modem = Modem::new(Box::new(SerialLink::new(device)))?;
            let supervisor = MeshcoreSupervisor::start(modem, config.meshcore_node()?, None).await?;
            log_info("meshcore gateway running");
            tokio::signal::ctrl_c().await.ok();
            supervisor.stop();
        }
    }

    Ok(())
}
