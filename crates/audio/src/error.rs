//! Gestion d'erreurs pour le système audio
//!
//! Ce module définit tous les types d'erreurs possibles dans la chaîne audio :
//! acquisition du microphone, ouverture de la sortie, codec PCM16 et planification.

use thiserror::Error;

/// Énumération de toutes les erreurs possibles dans le système audio
///
/// `thiserror::Error` génère automatiquement l'implémentation du trait Error
/// et nous permet de définir des messages d'erreur avec `#[error("...")]`
#[derive(Error, Debug)]
pub enum AudioError {
    /// Aucun périphérique audio (microphone ou haut-parleurs) n'a été trouvé
    #[error("Aucun périphérique audio trouvé")]
    NoDeviceFound,

    /// Le microphone existe mais l'accès a été refusé par l'hôte
    #[error("Accès au microphone refusé: {0}")]
    PermissionDenied(String),

    /// Erreur lors de la configuration des paramètres audio (sample rate, etc.)
    #[error("Erreur de configuration audio: {0}")]
    ConfigError(String),

    /// Erreur provenant de la librairie cpal (Cross-Platform Audio Library)
    /// `#[from]` génère automatiquement une conversion depuis l'erreur cpal
    #[error("Erreur cpal: {0}")]
    CpalError(#[from] cpal::PlayStreamError),

    /// Chunk PCM16 entrant malformé (taille impaire, base64 invalide...)
    #[error("Chunk audio invalide: {0}")]
    DecodeError(String),

    /// Le contexte audio a déjà été fermé
    #[error("Contexte audio fermé")]
    ContextClosed,

    /// Le périphérique audio a été débranché pendant l'utilisation
    #[error("Périphérique audio déconnecté")]
    DeviceDisconnected,

    /// Erreur lors de l'initialisation d'un composant
    #[error("Erreur d'initialisation: {0}")]
    InitializationError(String),
}

impl AudioError {
    /// Indique si l'erreur vient d'un microphone indisponible
    ///
    /// Le contrôleur de session traduit ces erreurs en refus de permission.
    pub fn is_input_unavailable(&self) -> bool {
        matches!(
            self,
            AudioError::NoDeviceFound | AudioError::PermissionDenied(_) | AudioError::DeviceDisconnected
        )
    }
}

/// Conversion des erreurs cpal::BuildStreamError
///
/// Un refus d'accès au périphérique est remonté comme `PermissionDenied`,
/// le reste comme une erreur de configuration.
impl From<cpal::BuildStreamError> for AudioError {
    fn from(err: cpal::BuildStreamError) -> Self {
        match err {
            cpal::BuildStreamError::DeviceNotAvailable => AudioError::NoDeviceFound,
            cpal::BuildStreamError::BackendSpecific { err } => {
                AudioError::PermissionDenied(err.description)
            }
            other => AudioError::ConfigError(format!("Erreur construction stream: {:?}", other)),
        }
    }
}

/// Conversion des erreurs cpal::DefaultStreamConfigError
impl From<cpal::DefaultStreamConfigError> for AudioError {
    fn from(err: cpal::DefaultStreamConfigError) -> Self {
        AudioError::ConfigError(format!("Erreur config par défaut: {:?}", err))
    }
}

/// Conversion des erreurs cpal::SupportedStreamConfigsError
impl From<cpal::SupportedStreamConfigsError> for AudioError {
    fn from(err: cpal::SupportedStreamConfigsError) -> Self {
        AudioError::ConfigError(format!("Impossible d'obtenir configs supportées: {:?}", err))
    }
}

/// Conversion des erreurs cpal::PauseStreamError
impl From<cpal::PauseStreamError> for AudioError {
    fn from(err: cpal::PauseStreamError) -> Self {
        AudioError::ConfigError(format!("Erreur pause stream: {:?}", err))
    }
}

/// Conversion des erreurs de décodage base64 (chunks texte)
impl From<base64::DecodeError> for AudioError {
    fn from(err: base64::DecodeError) -> Self {
        AudioError::DecodeError(format!("base64 invalide: {}", err))
    }
}

/// Type Result personnalisé pour notre crate
///
/// Au lieu d'écrire Result<T, AudioError> partout, on peut écrire AudioResult<T>
pub type AudioResult<T> = Result<T, AudioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = AudioError::NoDeviceFound;
        assert_eq!(error.to_string(), "Aucun périphérique audio trouvé");

        let error = AudioError::DecodeError("taille impaire".to_string());
        assert_eq!(error.to_string(), "Chunk audio invalide: taille impaire");
    }

    #[test]
    fn test_input_unavailable() {
        assert!(AudioError::NoDeviceFound.is_input_unavailable());
        assert!(AudioError::PermissionDenied("refus".into()).is_input_unavailable());
        assert!(!AudioError::ContextClosed.is_input_unavailable());
        assert!(!AudioError::DecodeError("x".into()).is_input_unavailable());
    }

    #[test]
    fn test_base64_conversion() {
        let err: AudioError = base64::DecodeError::InvalidLength(3).into();
        assert!(matches!(err, AudioError::DecodeError(_)));
    }
}
