//! Crate session - Conversation vocale temps réel avec l'agent
//!
//! Ce crate relie la chaîne audio locale et la passerelle :
//! - cycle de vie `Idle → Connecting → Active → Idle`, `stop()` idempotent
//! - capture → PCM16 → envoi sans attente
//! - réception → décodage ordonné → lecture sans trou
//! - interruption (barge-in) qui coupe immédiatement l'agent
//! - instantanés observables pour l'interface (état, visualiseur, statut)
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use audio::CpalBackend;
//! use network::WebSocketGateway;
//! use session::{SessionConfig, VoiceSession};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let session = VoiceSession::new(
//!     SessionConfig::default(),
//!     Arc::new(CpalBackend::new()),
//!     Arc::new(WebSocketGateway::new()),
//! );
//! let (controller, task) = session.spawn();
//!
//! controller.toggle()?;
//! println!("{}", controller.snapshot().status);
//!
//! controller.shutdown()?;
//! task.await?;
//! # Ok(())
//! # }
//! ```

pub mod config;        // Configuration de session
pub mod error;         // Gestion d'erreurs
pub mod events;        // États, événements, instantanés
pub mod interruption;  // Barge-in
pub mod session;       // Contrôleur du cycle de vie
pub mod controller;    // Boucle pilotée par commandes

#[cfg(test)]
mod testing;

pub use config::SessionConfig;
pub use error::{SessionError, SessionResult};
pub use events::{SessionCommand, SessionEvent, SessionSnapshot, SessionState, SessionStats};
pub use interruption::InterruptionHandler;
pub use session::VoiceSession;
pub use controller::SessionController;
