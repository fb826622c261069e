//! Traits abstraits pour la passerelle vers l'agent distant
//!
//! La session ne connaît que ces deux interfaces, ce qui permet de la
//! tester avec la passerelle simulée sans réseau.

use std::sync::Arc;

use async_trait::async_trait;

use audio::EncodedChunk;

use crate::{GatewayConfig, GatewayEvent, NetworkResult};

/// Récepteur des événements du canal
///
/// Appelé depuis les tâches de la passerelle, dans l'ordre d'arrivée.
/// Il ne doit jamais bloquer.
pub type EventSink = Arc<dyn Fn(GatewayEvent) + Send + Sync + 'static>;

/// Trait pour ouvrir un canal duplex avec l'agent
///
/// Implémentations :
/// - WebSocketGateway : service réel via tokio-tungstenite
/// - SimulatedGateway : passerelle en mémoire pour les tests
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Ouvre le canal et retourne son handle
    ///
    /// `GatewayEvent::Opened` est émis sur `events` quand l'agent est prêt,
    /// éventuellement avant que cette fonction ne retourne.
    ///
    /// # Erreurs
    /// - `NetworkError::ConnectError` : service injoignable ou handshake refusé
    /// - `NetworkError::ConfigError` : configuration incohérente
    async fn connect(
        &self,
        config: &GatewayConfig,
        events: EventSink,
    ) -> NetworkResult<Box<dyn GatewayHandle>>;

    /// Nom de l'implémentation pour les logs
    fn name(&self) -> &'static str {
        "passerelle"
    }
}

/// Handle d'un canal ouvert
///
/// N'expose que l'envoi et la fermeture.
pub trait GatewayHandle: Send + Sync {
    /// Envoie un chunk sans jamais attendre
    ///
    /// Livraison au plus une fois : un chunk refusé est perdu.
    ///
    /// # Erreurs
    /// - `NetworkError::QueueFull` : file d'envoi saturée
    /// - `NetworkError::ChannelClosed` : canal fermé
    fn send(&self, chunk: EncodedChunk) -> NetworkResult<()>;

    /// Ferme le canal
    ///
    /// Idempotent. Aucun événement n'est plus émis après la fermeture.
    fn close(&self);
}
