//! Erreurs de la session vocale
//!
//! Deux familles :
//! - les erreurs terminales, qui passent toutes par `stop()`
//! - les erreurs propres à un chunk, journalisées puis oubliées

use thiserror::Error;

use audio::AudioError;
use network::NetworkError;

#[derive(Error, Debug)]
pub enum SessionError {
    /// Microphone absent ou accès refusé
    #[error("Microphone indisponible: {0}")]
    PermissionDenied(AudioError),

    /// Contexte audio impossible à ouvrir ou perdu en cours de session
    #[error("Erreur audio: {0}")]
    Audio(AudioError),

    /// Le canal vers l'agent n'a pas pu être établi
    #[error("Connexion à l'agent impossible: {0}")]
    Connect(NetworkError),

    /// Chunk reçu illisible
    #[error("Chunk reçu indécodable: {0}")]
    Decode(AudioError),

    /// Chunk capturé non transmis
    #[error("Chunk non envoyé: {0}")]
    TransportSend(NetworkError),

    /// Erreur signalée par le canal
    #[error("Erreur de la passerelle: {0}")]
    Gateway(String),

    /// Le canal a été fermé par l'agent
    #[error("Canal fermé par l'agent")]
    GatewayClosed,

    #[error("Configuration de session invalide: {0}")]
    ConfigError(String),

    /// La boucle de session n'accepte plus de commandes
    #[error("Session terminée")]
    Shutdown,
}

pub type SessionResult<T> = Result<T, SessionError>;

impl SessionError {
    /// Classe une erreur d'ouverture de l'entrée audio
    pub fn from_input(error: AudioError) -> Self {
        if error.is_input_unavailable() {
            SessionError::PermissionDenied(error)
        } else {
            SessionError::Audio(error)
        }
    }

    /// Vérifie si l'erreur met fin à la session
    ///
    /// Les erreurs d'un chunk isolé laissent la session active.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionError::Decode(_) | SessionError::TransportSend(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_classification() {
        assert!(SessionError::PermissionDenied(AudioError::NoDeviceFound).is_terminal());
        assert!(SessionError::Gateway("boom".into()).is_terminal());
        assert!(SessionError::GatewayClosed.is_terminal());
        assert!(SessionError::Connect(NetworkError::ChannelClosed).is_terminal());

        assert!(!SessionError::Decode(AudioError::DecodeError("x".into())).is_terminal());
        assert!(!SessionError::TransportSend(NetworkError::QueueFull { capacity: 1 }).is_terminal());
    }

    #[test]
    fn test_input_errors() {
        assert!(matches!(
            SessionError::from_input(AudioError::PermissionDenied("refusé".into())),
            SessionError::PermissionDenied(_)
        ));
        assert!(matches!(
            SessionError::from_input(AudioError::ConfigError("stéréo".into())),
            SessionError::Audio(_)
        ));
    }

    #[test]
    fn test_display() {
        let error = SessionError::Gateway("quota dépassé".into());
        assert!(error.to_string().contains("quota dépassé"));
    }
}
