//! États, événements et instantanés de la session
//!
//! Toutes les sources asynchrones (canal, capture, décodage, fin de
//! lecture) sont ramenées à un seul type `SessionEvent`, traité dans
//! l'ordre par la boucle de session. Chaque événement porte la génération
//! de la session qui l'a produit.

use std::fmt;

use serde::{Deserialize, Serialize};

use audio::{AudioError, AudioFrame, DecodedBuffer, SourceId};
use network::{GatewayEvent, GatewayHandle, NetworkError};

/// État observable de la session
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Idle,
    Connecting,
    Active,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Active => "active",
        };
        f.write_str(name)
    }
}

/// Événement à traiter par la boucle de session
pub enum SessionEvent {
    /// Événement remonté par le canal
    Gateway { generation: u64, event: GatewayEvent },

    /// La connexion a abouti
    Connected { generation: u64, handle: Box<dyn GatewayHandle> },

    /// La connexion a échoué
    ConnectFailed { generation: u64, error: NetworkError },

    /// Frame capturée par le microphone
    FrameCaptured { generation: u64, frame: AudioFrame },

    /// Le flux de capture s'est interrompu
    CaptureFailed { generation: u64, error: AudioError },

    /// Chunk reçu décodé, prêt à planifier
    ChunkDecoded { generation: u64, epoch: u64, buffer: DecodedBuffer },

    /// Chunk reçu illisible
    DecodeFailed { generation: u64, error: AudioError },

    /// Une source a fini de jouer naturellement
    PlaybackEnded { generation: u64, source: SourceId },
}

impl SessionEvent {
    /// Génération de la session à l'origine de l'événement
    pub fn generation(&self) -> u64 {
        match self {
            SessionEvent::Gateway { generation, .. }
            | SessionEvent::Connected { generation, .. }
            | SessionEvent::ConnectFailed { generation, .. }
            | SessionEvent::FrameCaptured { generation, .. }
            | SessionEvent::CaptureFailed { generation, .. }
            | SessionEvent::ChunkDecoded { generation, .. }
            | SessionEvent::DecodeFailed { generation, .. }
            | SessionEvent::PlaybackEnded { generation, .. } => *generation,
        }
    }

    /// Nom court pour les logs
    pub fn kind(&self) -> &'static str {
        match self {
            SessionEvent::Gateway { event, .. } => event.kind(),
            SessionEvent::Connected { .. } => "connected",
            SessionEvent::ConnectFailed { .. } => "connect-failed",
            SessionEvent::FrameCaptured { .. } => "frame",
            SessionEvent::CaptureFailed { .. } => "capture-failed",
            SessionEvent::ChunkDecoded { .. } => "decoded",
            SessionEvent::DecodeFailed { .. } => "decode-failed",
            SessionEvent::PlaybackEnded { .. } => "playback-ended",
        }
    }
}

impl fmt::Debug for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionEvent({}, génération {})", self.kind(), self.generation())
    }
}

/// Commande envoyée à la boucle de session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionCommand {
    /// Démarre si inactive, arrête si active, ignorée pendant la connexion
    Toggle,
    Start,
    /// Arrête depuis n'importe quel état
    Stop,
    /// Arrête et quitte la boucle
    Shutdown,
}

/// Compteurs cumulés sur toute la vie du contrôleur
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub sessions_started: u64,
    pub frames_captured: u64,
    pub chunks_sent: u64,
    pub chunks_dropped: u64,
    pub chunks_received: u64,
    pub chunks_scheduled: u64,
    /// Chunks décodés écartés par une interruption
    pub chunks_discarded: u64,
    pub decode_failures: u64,
    pub interruptions: u64,
}

/// Ce que l'interface affiche
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub state: SessionState,

    /// Hauteurs des barres du visualiseur (plancher hors session active)
    pub visualizer: Vec<f32>,

    /// Message court pour l'utilisateur
    pub status: String,

    pub stats: SessionStats,
}

impl SessionSnapshot {
    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }
}
