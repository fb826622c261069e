//! Types de données pour le système audio
//!
//! Ce module définit les structures principales pour manipuler l'audio :
//! - AudioFrame : Frame audio brute capturée (échantillons non encodés)
//! - EncodedChunk : Chunk PCM16 échangé avec l'agent distant
//! - DecodedBuffer : Échantillons décodés prêts à être planifiés
//! - PlaybackSource : Buffer planifié sur la timeline de sortie

use std::borrow::Cow;
use std::fmt;
use std::time::Instant;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::AudioResult;

/// Type pour un échantillon audio
///
/// Un échantillon représente l'amplitude du son à un instant donné.
/// - Valeurs entre -1.0 et +1.0
/// - 0.0 = silence
pub type Sample = f32;

/// Frame d'audio brute (non encodée)
///
/// Une frame contient un bloc fixe d'échantillons mono capturés
/// (4096 échantillons à 16 kHz par défaut, soit 256ms).
#[derive(Clone, Debug, PartialEq)]
pub struct AudioFrame {
    /// Les échantillons audio bruts, mono
    pub samples: Vec<Sample>,

    /// Timestamp de création de cette frame
    pub timestamp: Instant,

    /// Numéro de séquence, incrémenté à chaque frame capturée
    pub sequence_number: u64,
}

impl AudioFrame {
    /// Crée une nouvelle frame audio
    ///
    /// # Example
    /// ```rust
    /// use audio::AudioFrame;
    ///
    /// let frame = AudioFrame::new(vec![0.1, 0.2, -0.1, 0.0], 42);
    /// assert_eq!(frame.samples.len(), 4);
    /// ```
    pub fn new(samples: Vec<Sample>, sequence_number: u64) -> Self {
        Self {
            samples,
            timestamp: Instant::now(),
            sequence_number,
        }
    }

    /// Crée une frame de silence
    pub fn silence(sample_count: usize, sequence_number: u64) -> Self {
        Self::new(vec![0.0; sample_count], sequence_number)
    }

    /// Calcule l'amplitude moyenne absolue de la frame
    ///
    /// C'est la valeur qui alimente le visualiseur : somme des |s| / n.
    /// Une frame vide a une amplitude nulle.
    pub fn mean_amplitude(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }

        let sum: f32 = self.samples.iter().map(|s| s.abs()).sum();
        sum / self.samples.len() as f32
    }

    /// Calcule le niveau maximum (peak)
    pub fn peak_level(&self) -> f32 {
        self.samples.iter()
            .map(|&s| s.abs())
            .fold(0.0, f32::max)
    }
}

/// Représentation des octets d'un chunk
///
/// Les frames capturées sont encodées en binaire ; l'audio reçu sur un
/// canal texte arrive en base64 et n'est décodé qu'au moment de la lecture.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkData {
    /// Octets PCM16 little-endian, deux octets par échantillon
    Pcm16(Vec<u8>),

    /// Les mêmes octets, encodés en base64
    Base64(String),
}

/// Chunk audio encodé en PCM16 little-endian
///
/// C'est l'unité échangée avec l'agent distant dans les deux sens :
/// - sortant : une AudioFrame capturée à 16 kHz
/// - entrant : un morceau de voix synthétisée à 24 kHz
///
/// Sur un canal texte, le chunk voyage en base64 accompagné de son type MIME.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedChunk {
    pub data: ChunkData,

    /// Fréquence d'échantillonnage des données
    pub sample_rate: u32,

    /// Numéro de séquence de la frame d'origine (0 pour les chunks entrants)
    #[serde(default)]
    pub sequence_number: u64,
}

impl EncodedChunk {
    /// Préfixe MIME du PCM brut
    pub const MIME_PREFIX: &'static str = "audio/pcm";

    /// Crée un chunk binaire
    pub fn pcm16(bytes: Vec<u8>, sample_rate: u32, sequence_number: u64) -> Self {
        Self {
            data: ChunkData::Pcm16(bytes),
            sample_rate,
            sequence_number,
        }
    }

    /// Crée un chunk depuis sa forme texte, sans la décoder
    pub fn base64(text: impl Into<String>, sample_rate: u32) -> Self {
        Self {
            data: ChunkData::Base64(text.into()),
            sample_rate,
            sequence_number: 0,
        }
    }

    /// Forme texte base64 des données
    pub fn to_base64(&self) -> String {
        match &self.data {
            ChunkData::Pcm16(bytes) => BASE64.encode(bytes),
            ChunkData::Base64(text) => text.clone(),
        }
    }

    /// Octets PCM16, décodés depuis le base64 si nécessaire
    ///
    /// # Erreurs
    /// - `AudioError::DecodeError` si le texte n'est pas du base64 valide
    pub fn pcm_bytes(&self) -> AudioResult<Cow<'_, [u8]>> {
        match &self.data {
            ChunkData::Pcm16(bytes) => Ok(Cow::Borrowed(bytes)),
            ChunkData::Base64(text) => Ok(Cow::Owned(BASE64.decode(text.trim())?)),
        }
    }

    /// Type MIME annonçant le format, ex: `audio/pcm;rate=16000`
    pub fn mime_type(&self) -> String {
        format!("{};rate={}", Self::MIME_PREFIX, self.sample_rate)
    }

    /// Extrait la fréquence d'un type MIME `audio/pcm;rate=N`
    ///
    /// Retourne `None` si ce n'est pas du PCM ou si la fréquence est absente.
    pub fn parse_mime_rate(mime: &str) -> Option<u32> {
        let mut parts = mime.split(';').map(str::trim);
        if !parts.next()?.eq_ignore_ascii_case(Self::MIME_PREFIX) {
            return None;
        }
        parts
            .filter_map(|p| p.strip_prefix("rate="))
            .find_map(|r| r.parse().ok())
    }

    /// Vérifie si le chunk ne contient que du silence
    ///
    /// Un chunk base64 illisible n'est pas considéré comme silencieux.
    pub fn is_silent(&self) -> bool {
        self.pcm_bytes()
            .map(|bytes| bytes.iter().all(|&b| b == 0))
            .unwrap_or(false)
    }
}

/// Buffer décodé prêt à être planifié sur la sortie
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedBuffer {
    pub samples: Vec<Sample>,
    pub sample_rate: u32,
}

impl DecodedBuffer {
    pub fn new(samples: Vec<Sample>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    /// Durée du buffer en secondes
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Identifiant d'une source planifiée sur la sortie
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub u64);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source#{}", self.0)
    }
}

/// Source de lecture planifiée
///
/// Les temps sont exprimés en secondes sur l'horloge du contexte de sortie.
/// La source appartient au planificateur jusqu'à sa fin naturelle
/// ou jusqu'à son annulation par une interruption.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaybackSource {
    pub id: SourceId,

    /// Instant absolu de début de lecture
    pub start_time: f64,

    /// Durée de la source
    pub duration: f64,
}

impl PlaybackSource {
    /// Instant auquel la source aura fini de jouer
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_frame_creation() {
        let samples = vec![0.1, -0.2, 0.3, 0.0];
        let frame = AudioFrame::new(samples.clone(), 42);

        assert_eq!(frame.samples, samples);
        assert_eq!(frame.sequence_number, 42);
        assert!(frame.timestamp.elapsed().as_millis() < 100); // Créé récemment
    }

    #[test]
    fn test_mean_amplitude() {
        let frame = AudioFrame::new(vec![0.5, -0.5, 0.25, -0.25], 1);
        assert!((frame.mean_amplitude() - 0.375).abs() < 1e-6);

        assert_eq!(AudioFrame::silence(4096, 0).mean_amplitude(), 0.0);
        assert_eq!(AudioFrame::new(vec![], 0).mean_amplitude(), 0.0);
    }

    #[test]
    fn test_peak_level() {
        let frame = AudioFrame::new(vec![0.1, -0.8, 0.3], 1);
        assert_eq!(frame.peak_level(), 0.8);
    }

    #[test]
    fn test_chunk_base64() {
        let chunk = EncodedChunk::pcm16(vec![0x00, 0x80, 0xff, 0x7f], 16000, 3);
        let text = chunk.to_base64();
        assert_eq!(text, "AID/fw==");

        let back = EncodedChunk::base64(text, 16000);
        assert_eq!(back.pcm_bytes().unwrap().as_ref(), &[0x00, 0x80, 0xff, 0x7f]);

        let broken = EncodedChunk::base64("pas du base64 !", 24000);
        assert!(broken.pcm_bytes().is_err());
        assert!(!broken.is_silent());
    }

    #[test]
    fn test_chunk_mime() {
        let chunk = EncodedChunk::pcm16(vec![], 16000, 0);
        assert_eq!(chunk.mime_type(), "audio/pcm;rate=16000");

        assert_eq!(EncodedChunk::parse_mime_rate("audio/pcm;rate=24000"), Some(24000));
        assert_eq!(EncodedChunk::parse_mime_rate("audio/pcm; rate=16000"), Some(16000));
        assert_eq!(EncodedChunk::parse_mime_rate("audio/pcm"), None);
        assert_eq!(EncodedChunk::parse_mime_rate("audio/opus;rate=48000"), None);
    }

    #[test]
    fn test_chunk_silence() {
        assert!(EncodedChunk::pcm16(vec![0; 8192], 16000, 0).is_silent());
        assert!(!EncodedChunk::pcm16(vec![0, 1], 16000, 0).is_silent());
        assert!(EncodedChunk::base64("AAAA", 24000).is_silent());
    }

    #[test]
    fn test_playback_source_end() {
        let source = PlaybackSource { id: SourceId(1), start_time: 1.5, duration: 0.25 };
        assert_eq!(source.end_time(), 1.75);
        assert_eq!(source.id.to_string(), "source#1");
    }
}
