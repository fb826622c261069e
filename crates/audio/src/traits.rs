//! Traits abstraits pour le système audio
//!
//! Ce module définit les interfaces (traits) que doivent implémenter
//! tous les composants audio. Le contrôleur de session ne connaît que ces
//! traits : en production ils sont implémentés avec cpal, dans les tests
//! avec des périphériques en mémoire.

use async_trait::async_trait;
use crate::{AudioConfig, AudioFrame, AudioResult, DecodedBuffer, EncodedChunk, SourceId};

/// Callback appelé quand une source planifiée a fini de jouer naturellement
///
/// Il est invoqué depuis le thread audio temps réel : il doit être très
/// rapide et ne jamais bloquer (typiquement un envoi sur un channel).
pub type SourceEndedCallback = Box<dyn Fn(SourceId) + Send + Sync + 'static>;

/// Trait pour capturer l'audio depuis un périphérique d'entrée
///
/// Le périphérique est acquis à l'ouverture (voir `AudioBackend::open_input`),
/// mais aucune frame n'est produite avant `start()`.
///
/// `start()` et `stop()` sont synchrones : l'arrêt d'une session doit libérer
/// le microphone immédiatement, sans point de suspension.
#[async_trait]
pub trait AudioCapture: Send {
    /// Commence à produire des frames
    ///
    /// # Erreurs
    /// - `AudioError::DeviceDisconnected` : Microphone débranché entre-temps
    /// - `AudioError::CpalError` : Le stream refuse de démarrer
    fn start(&mut self) -> AudioResult<()>;

    /// Arrête la capture et libère le périphérique
    ///
    /// Idempotent : un second appel ne fait rien.
    fn stop(&mut self);

    /// Récupère la prochaine frame audio
    ///
    /// Attend jusqu'à ce qu'une frame complète soit disponible.
    ///
    /// # Erreurs
    /// - `AudioError::DeviceDisconnected` : Le flux de capture s'est terminé
    async fn next_frame(&mut self) -> AudioResult<AudioFrame>;

    /// Vérifie si la capture produit des frames
    fn is_recording(&self) -> bool;

    /// Retourne des informations sur le périphérique utilisé
    fn device_info(&self) -> String {
        "Périphérique inconnu".to_string()
    }
}

/// Trait pour le contexte de sortie audio
///
/// Le contexte possède sa propre horloge (en secondes depuis son ouverture)
/// et joue chaque buffer planifié à son instant absolu de début, en mixant
/// les sources qui se chevauchent.
pub trait AudioOutput: Send {
    /// Temps courant de l'horloge de sortie, en secondes
    fn current_time(&self) -> f64;

    /// Planifie un buffer pour qu'il commence à `start_time`
    ///
    /// Si `start_time` est déjà passé, le buffer commence immédiatement.
    ///
    /// # Erreurs
    /// - `AudioError::ContextClosed` : Le contexte a été fermé
    fn schedule(&mut self, id: SourceId, buffer: DecodedBuffer, start_time: f64) -> AudioResult<()>;

    /// Arrête immédiatement une source, quelle que soit sa position
    ///
    /// Sans effet si la source est inconnue ou déjà terminée.
    fn stop_source(&mut self, id: SourceId);

    /// Ferme le contexte et libère le périphérique
    ///
    /// Idempotent : fermer un contexte fermé ne fait rien.
    fn close(&mut self);

    /// Vérifie si le contexte a été fermé
    fn is_closed(&self) -> bool;

    /// Retourne des informations sur le périphérique de sortie
    fn device_info(&self) -> String {
        "Périphérique de sortie inconnu".to_string()
    }
}

/// Trait pour encoder/décoder l'audio échangé avec l'agent
pub trait AudioCodec: Send + Sync {
    /// Encode une frame capturée en chunk prêt à être envoyé
    ///
    /// # Example
    /// ```rust
    /// use audio::{AudioCodec, Pcm16Codec, AudioFrame};
    ///
    /// let codec = Pcm16Codec::new(16000);
    /// let chunk = codec.encode(&AudioFrame::silence(4096, 1));
    /// assert_eq!(chunk.pcm_bytes().unwrap().len(), 8192);
    /// ```
    fn encode(&self, frame: &AudioFrame) -> EncodedChunk;

    /// Décode un chunk reçu en échantillons
    ///
    /// # Erreurs
    /// - `AudioError::DecodeError` : Données malformées
    fn decode(&self, chunk: &EncodedChunk) -> AudioResult<DecodedBuffer>;

    /// Retourne des informations sur le codec
    fn codec_info(&self) -> String {
        "Codec audio".to_string()
    }
}

/// Fabrique des contextes audio d'une session
///
/// Chaque session ouvre un contexte d'entrée et un contexte de sortie
/// neufs, et les ferme à l'arrêt.
pub trait AudioBackend: Send + Sync {
    /// Acquiert le microphone
    ///
    /// # Erreurs
    /// - `AudioError::NoDeviceFound` / `AudioError::PermissionDenied`
    fn open_input(&self, config: &AudioConfig) -> AudioResult<Box<dyn AudioCapture>>;

    /// Ouvre le contexte de sortie
    ///
    /// `on_ended` est appelé pour chaque source arrivée au bout de son buffer.
    fn open_output(
        &self,
        config: &AudioConfig,
        on_ended: SourceEndedCallback,
    ) -> AudioResult<Box<dyn AudioOutput>>;
}
