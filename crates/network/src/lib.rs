//! Crate network - Passerelle duplex vers l'agent vocal distant
//!
//! Ce crate fournit le canal qui relie la session locale à l'agent :
//! envoi des chunks capturés, réception de la voix synthétisée et des
//! signaux d'interruption.
//!
//! # Architecture
//!
//! - `error` : Gestion d'erreurs avec types spécialisés
//! - `types` : Configuration de la conversation et événements du canal
//! - `protocol` : Enveloppe JSON échangée avec le service
//! - `traits` : Traits abstraits `Gateway` et `GatewayHandle`
//! - `transport` : Implémentations WebSocket (réelle) et simulée
//!
//! # Examples
//!
//! ## Tests et simulation
//!
//! ```rust
//! use std::sync::Arc;
//! use network::{Gateway, GatewayConfig, GatewayEvent, SimulatedGateway};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let gateway = SimulatedGateway::new();
//! let handle = gateway
//!     .connect(&GatewayConfig::default(), Arc::new(|event: GatewayEvent| {
//!         println!("événement: {}", event.kind());
//!     }))
//!     .await?;
//!
//! // Injecte une interruption comme le ferait l'agent
//! gateway.interrupt();
//! handle.close();
//! # Ok(())
//! # }
//! ```

// Modules internes
mod error;
mod types;
mod protocol;
mod traits;
mod transport;

// Réexports publics
pub use error::{NetworkError, NetworkResult};

pub use types::{
    GatewayConfig, GatewayEvent, ResponseModality, DEFAULT_ENDPOINT, DEFAULT_MODEL,
    DEFAULT_SYSTEM_INSTRUCTION, DEFAULT_VOICE,
};

pub use protocol::{ClientMessage, ServerMessage, ServerContent, DEFAULT_INBOUND_RATE};

pub use traits::{EventSink, Gateway, GatewayHandle};

pub use transport::{
    SimulatedGateway, SimulatedHandle, SimulationSettings, WebSocketGateway, WebSocketHandle,
};

// Réexport du type audio transporté
pub use audio::EncodedChunk;

/// Version du crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
