//! Types de données pour la passerelle vers l'agent distant
//!
//! Ce module contient :
//! - GatewayConfig : paramètres de la conversation (modèle, voix, persona)
//! - ResponseModality : modalité de réponse demandée à l'agent
//! - GatewayEvent : événements remontés par le canal, dans l'ordre d'arrivée

use std::fmt;

use serde::{Deserialize, Serialize};

use audio::EncodedChunk;

/// Modèle utilisé par défaut pour la conversation vocale
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-native-audio-preview-12-2025";

/// Voix prédéfinie utilisée par défaut
pub const DEFAULT_VOICE: &str = "Zephyr";

/// Point d'accès du service de conversation bidirectionnelle
pub const DEFAULT_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Persona de l'assistant vocal
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "Tu es l'assistant vocal d'AB Logistics, \
une entreprise de transport et de logistique. Tu aides les clients pour les envois \
locaux et internationaux, le fret, le transit, l'emballage et l'entreposage. \
Réponds brièvement, sur un ton chaleureux et professionnel, et propose de créer \
une demande de devis quand le client est prêt.";

/// Modalité de réponse demandée à l'agent
///
/// Sérialisée en majuscules sur le fil (`"AUDIO"`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseModality {
    #[default]
    Audio,
    Text,
}

/// Configuration d'une conversation avec l'agent distant
///
/// La clé d'API n'est jamais sérialisée ni affichée.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// URL WebSocket du service
    pub endpoint: String,

    /// Identifiant du modèle (sans le préfixe `models/`)
    pub model: String,

    /// Modalité de réponse (audio par défaut)
    pub response_modality: ResponseModality,

    /// Nom de la voix prédéfinie
    pub voice_name: String,

    /// Instruction système décrivant le persona
    pub system_instruction: String,

    /// Nombre de messages sortants en attente avant abandon (défaut: 32)
    pub outbound_queue_depth: usize,

    /// Clé d'API, ajoutée à l'URL de connexion
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            response_modality: ResponseModality::Audio,
            voice_name: DEFAULT_VOICE.to_string(),
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            outbound_queue_depth: 32, // ~8s d'audio capturé
            api_key: None,
        }
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("response_modality", &self.response_modality)
            .field("voice_name", &self.voice_name)
            .field("outbound_queue_depth", &self.outbound_queue_depth)
            .field("api_key", &self.api_key.as_ref().map(|_| "<masquée>"))
            .finish_non_exhaustive()
    }
}

impl GatewayConfig {
    /// Ajoute la clé d'API
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Nom de ressource du modèle, ex: `models/gemini-...`
    pub fn model_resource(&self) -> String {
        if self.model.starts_with("models/") {
            self.model.clone()
        } else {
            format!("models/{}", self.model)
        }
    }

    /// URL de connexion complète, clé incluse
    ///
    /// Ne jamais journaliser cette valeur.
    pub fn connect_url(&self) -> String {
        match self.api_key.as_deref().filter(|k| !k.is_empty()) {
            Some(key) => {
                let separator = if self.endpoint.contains('?') { '&' } else { '?' };
                format!("{}{}key={}", self.endpoint, separator, key)
            }
            None => self.endpoint.clone(),
        }
    }

    /// Valide la cohérence de la configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(self.endpoint.starts_with("ws://") || self.endpoint.starts_with("wss://")) {
            return Err(format!("endpoint non WebSocket: {}", self.endpoint));
        }
        if self.model.trim().is_empty() {
            return Err("modèle non renseigné".to_string());
        }
        if self.voice_name.trim().is_empty() {
            return Err("voix non renseignée".to_string());
        }
        if self.outbound_queue_depth == 0 {
            return Err("la file d'envoi doit contenir au moins un message".to_string());
        }
        Ok(())
    }
}

/// Événement remonté par le canal duplex
///
/// Les événements sont délivrés dans l'ordre d'arrivée. Un message
/// contenant à la fois de l'audio et le drapeau d'interruption produit
/// d'abord les `MessageReceived`, puis `Interrupted`.
#[derive(Clone, Debug, PartialEq)]
pub enum GatewayEvent {
    /// Le canal est prêt, l'agent écoute
    Opened,

    /// Chunk de voix synthétisée
    MessageReceived(EncodedChunk),

    /// L'utilisateur a coupé la parole à l'agent
    Interrupted,

    /// Erreur du canal
    Errored(String),

    /// Fermeture du canal par le distant
    Closed,
}

impl GatewayEvent {
    /// Événement qui met fin à la session
    pub fn is_terminal(&self) -> bool {
        matches!(self, GatewayEvent::Errored(_) | GatewayEvent::Closed)
    }

    /// Nom court pour les logs
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayEvent::Opened => "opened",
            GatewayEvent::MessageReceived(_) => "message",
            GatewayEvent::Interrupted => "interrupted",
            GatewayEvent::Errored(_) => "error",
            GatewayEvent::Closed => "closed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.voice_name, "Zephyr");
        assert_eq!(config.response_modality, ResponseModality::Audio);
        assert!(config.validate().is_ok());
        assert_eq!(config.model_resource(), format!("models/{}", DEFAULT_MODEL));
    }

    #[test]
    fn test_connect_url() {
        let config = GatewayConfig {
            endpoint: "ws://127.0.0.1:9000/live".to_string(),
            ..Default::default()
        };
        assert_eq!(config.connect_url(), "ws://127.0.0.1:9000/live");

        let config = config.with_api_key("secret");
        assert_eq!(config.connect_url(), "ws://127.0.0.1:9000/live?key=secret");

        let config = GatewayConfig {
            endpoint: "ws://h/live?alt=json".to_string(),
            ..config
        };
        assert_eq!(config.connect_url(), "ws://h/live?alt=json&key=secret");
    }

    #[test]
    fn test_api_key_never_leaks() {
        let config = GatewayConfig::default().with_api_key("super-secret");

        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret"));

        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("super-secret"));

        let back: GatewayConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.api_key, None);
        assert_eq!(back.model, config.model);
    }

    #[test]
    fn test_validation() {
        let bad_endpoint = GatewayConfig {
            endpoint: "https://exemple.test".to_string(),
            ..Default::default()
        };
        assert!(bad_endpoint.validate().is_err());

        let no_queue = GatewayConfig { outbound_queue_depth: 0, ..Default::default() };
        assert!(no_queue.validate().is_err());

        let no_model = GatewayConfig { model: " ".to_string(), ..Default::default() };
        assert!(no_model.validate().is_err());
    }

    #[test]
    fn test_modality_wire_name() {
        assert_eq!(serde_json::to_string(&ResponseModality::Audio).unwrap(), "\"AUDIO\"");
    }

    #[test]
    fn test_terminal_events() {
        assert!(GatewayEvent::Closed.is_terminal());
        assert!(GatewayEvent::Errored("x".into()).is_terminal());
        assert!(!GatewayEvent::Opened.is_terminal());
        assert!(!GatewayEvent::Interrupted.is_terminal());
        assert_eq!(GatewayEvent::Interrupted.kind(), "interrupted");
    }
}
