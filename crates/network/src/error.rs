//! Gestion d'erreurs pour la passerelle vers l'agent distant
//!
//! Ce module définit les erreurs possibles du canal duplex.
//! Il suit les mêmes patterns que le module audio pour la cohérence du code.

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Énumération de toutes les erreurs possibles côté passerelle
///
/// `thiserror::Error` génère automatiquement l'implémentation du trait Error
/// avec des messages d'erreur descriptifs en français.
#[derive(Error, Debug)]
pub enum NetworkError {
    /// Impossible d'établir le canal avec l'agent distant
    #[error("Connexion à {endpoint} impossible: {reason}")]
    ConnectError { endpoint: String, reason: String },

    /// File d'envoi pleine, le chunk est abandonné
    #[error("File d'envoi pleine ({capacity} chunks), chunk abandonné")]
    QueueFull { capacity: usize },

    /// Le canal est fermé, plus aucun envoi possible
    #[error("Canal fermé")]
    ChannelClosed,

    /// Chunk volontairement perdu par la passerelle simulée
    #[error("Chunk {sequence} perdu en transit")]
    ChunkLost { sequence: u64 },

    /// Message reçu qui ne respecte pas le format attendu
    #[error("Message invalide reçu: {0}")]
    InvalidMessage(String),

    /// Erreur lors de la sérialisation/désérialisation JSON
    #[error("Erreur de sérialisation: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Erreur du protocole WebSocket
    #[error("Erreur WebSocket: {0}")]
    WebSocketError(#[from] Box<tungstenite::Error>),

    /// Erreur de configuration de la passerelle
    #[error("Configuration passerelle invalide: {0}")]
    ConfigError(String),
}

/// Conversion automatique des erreurs tungstenite
///
/// L'erreur tungstenite est volumineuse, on la boxe pour garder
/// `NetworkResult` léger.
impl From<tungstenite::Error> for NetworkError {
    fn from(err: tungstenite::Error) -> Self {
        NetworkError::WebSocketError(Box::new(err))
    }
}

/// Type Result personnalisé pour notre crate network
///
/// Au lieu d'écrire Result<T, NetworkError> partout, on peut écrire NetworkResult<T>
pub type NetworkResult<T> = Result<T, NetworkError>;

impl NetworkError {
    /// Crée une erreur de connexion avec contexte
    pub fn connect_failed(endpoint: impl Into<String>, reason: impl ToString) -> Self {
        Self::ConnectError {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }

    /// Vérifie si l'erreur ne concerne qu'un chunk isolé
    ///
    /// Ces erreurs sont absorbées par l'appelant : le chunk est perdu
    /// mais le canal reste utilisable.
    pub fn is_per_chunk(&self) -> bool {
        matches!(
            self,
            NetworkError::QueueFull { .. } | NetworkError::ChunkLost { .. }
        )
    }
}
