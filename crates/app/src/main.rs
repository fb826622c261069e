// Agent vocal en ligne de commande
//
// Entrée bascule la conversation, `q` quitte. Les barres et le statut
// sont réaffichés à chaque instantané publié par la session.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use audio::{AudioConfig, CpalBackend};
use network::{GatewayConfig, WebSocketGateway};
use session::{SessionConfig, SessionSnapshot, VoiceSession};

#[derive(Parser)]
#[command(author, version, about = "Assistant vocal temps réel")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ouvre une conversation avec l'agent
    Talk {
        /// Clé d'accès à la passerelle
        #[arg(long, env = "API_KEY", hide_env_values = true)]
        api_key: String,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        voice: Option<String>,
        #[arg(long)]
        endpoint: Option<String>,
        /// Consigne système remplaçant celle par défaut
        #[arg(long)]
        instruction: Option<String>,
    },
    /// Liste les périphériques audio
    Devices,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Talk { api_key, model, voice, endpoint, instruction } => {
            let mut gateway = GatewayConfig::default().with_api_key(api_key);
            if let Some(model) = model {
                gateway.model = model;
            }
            if let Some(voice) = voice {
                gateway.voice_name = voice;
            }
            if let Some(endpoint) = endpoint {
                gateway.endpoint = endpoint;
            }
            if let Some(instruction) = instruction {
                gateway.system_instruction = instruction;
            }
            run_talk(SessionConfig::new(AudioConfig::default(), gateway)).await
        }
        Commands::Devices => list_devices(),
    }
}

async fn run_talk(config: SessionConfig) -> Result<()> {
    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("configuration invalide")?;

    let session = VoiceSession::new(
        config,
        Arc::new(CpalBackend::new()),
        Arc::new(WebSocketGateway::new()),
    );
    let (controller, task) = session.spawn();

    println!("🎙️  Entrée pour parler ou arrêter, q pour quitter");
    render(&controller.snapshot());

    let mut snapshots = controller.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line.context("lecture du terminal")? {
                Some(line) if line.trim().eq_ignore_ascii_case("q") => break,
                Some(_) => controller.toggle()?,
                None => break,
            },
            changed = snapshots.changed() => {
                if changed.is_err() {
                    warn!("Session terminée de façon inattendue");
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                render(&snapshot);
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    // La session a pu s'arrêter seule, l'erreur d'envoi est alors sans objet
    let _ = controller.shutdown();
    task.await.context("tâche de session")?;

    let stats = controller.snapshot().stats;
    info!(
        "Bilan: {} session(s), {} chunk(s) envoyés, {} reçus, {} interruption(s)",
        stats.sessions_started, stats.chunks_sent, stats.chunks_received, stats.interruptions
    );
    println!("👋 Au revoir");
    Ok(())
}

fn render(snapshot: &SessionSnapshot) {
    const LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

    let bars: String = snapshot
        .visualizer
        .iter()
        .map(|height| {
            let level = (height.clamp(0.0, 100.0) / 100.0 * (LEVELS.len() - 1) as f32).round();
            LEVELS[level as usize]
        })
        .collect();

    print!("\r\x1b[2K{} [{}] {}", bars, snapshot.state, snapshot.status);
    let _ = io::stdout().flush();
}

fn list_devices() -> Result<()> {
    let devices = CpalBackend::new()
        .probe()
        .context("énumération des périphériques")?;

    if devices.is_empty() {
        println!("⚠️  Aucun périphérique audio détecté");
        return Ok(());
    }

    for (label, is_input) in [("🎤 Entrées", true), ("🔊 Sorties", false)] {
        println!("{}", label);
        for device in devices.iter().filter(|d| d.is_input == is_input) {
            let format = match (device.sample_rate, device.channels) {
                (Some(rate), Some(channels)) => format!("{} Hz, {} canal(aux)", rate, channels),
                _ => "format inconnu".to_string(),
            };
            let marker = if device.is_default { " (défaut)" } else { "" };
            println!("   • {}{} - {}", device.name, marker, format);
        }
    }
    Ok(())
}
