//! Crate audio de l'agent vocal - Communication vocale temps réel
//!
//! Ce crate gère toute la chaîne audio locale :
//! - Capture microphone avec cpal, découpée en frames de 4096 échantillons
//! - Encodage/décodage PCM16 little-endian
//! - Planification sans trou des buffers reçus sur l'horloge de sortie
//! - Lecture audio avec cpal
//! - Fenêtre d'amplitudes pour le visualiseur

pub mod config;      // Configuration audio
pub mod types;       // Types de données (AudioFrame, EncodedChunk, etc.)
pub mod traits;      // Traits abstraits
pub mod capture;     // Implémentation capture avec cpal
pub mod playback;    // Timeline de sortie et implémentation cpal
pub mod codec;       // Implémentation PCM16
pub mod scheduler;   // Planification gapless
pub mod visualizer;  // Fenêtre du visualiseur
pub mod backend;     // Fabrique de contextes cpal
pub mod error;       // Gestion d'erreurs

// Réexports pour faciliter l'utilisation
pub use config::*;
pub use types::*;
pub use traits::*;
pub use error::*;

// Réexports des implémentations principales
pub use capture::{CpalCapture, FrameAssembler};
pub use playback::{CpalOutput, Timeline};
pub use codec::Pcm16Codec;
pub use scheduler::PlaybackScheduler;
pub use visualizer::VisualizerWindow;
pub use backend::{CpalBackend, DeviceInfo};
