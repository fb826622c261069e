//! Configuration d'une session vocale

use serde::{Deserialize, Serialize};

use audio::AudioConfig;
use network::GatewayConfig;

/// Regroupe la configuration audio locale et celle du canal
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub audio: AudioConfig,
    pub gateway: GatewayConfig,
}

impl SessionConfig {
    pub fn new(audio: AudioConfig, gateway: GatewayConfig) -> Self {
        Self { audio, gateway }
    }

    /// Valide les deux parties
    pub fn validate(&self) -> Result<(), String> {
        self.audio.validate().map_err(|e| format!("audio: {}", e))?;
        self.gateway.validate().map_err(|e| format!("passerelle: {}", e))?;
        Ok(())
    }
}
