//! Enveloppe JSON échangée avec l'agent distant
//!
//! Messages client :
//! - `setup` : premier message, décrit le modèle, la voix et le persona
//! - `realtimeInput` : chunks audio capturés, en base64 avec leur type MIME
//!
//! Messages serveur :
//! - `setupComplete` : le canal est prêt
//! - `serverContent` : voix synthétisée (`modelTurn.parts[].inlineData`)
//!   et/ou drapeau `interrupted`
//!
//! Les champs inconnus sont ignorés pour rester compatible avec les
//! évolutions du service.

use serde::{Deserialize, Serialize};
use tracing::debug;

use audio::EncodedChunk;

use crate::{GatewayConfig, GatewayEvent, NetworkResult, ResponseModality};

/// Fréquence supposée d'un chunk entrant dont le type MIME ne la précise pas
pub const DEFAULT_INBOUND_RATE: u32 = 24_000;

/// Message envoyé par le client
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    Setup(SetupMessage),
    RealtimeInput(RealtimeInput),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupMessage {
    pub model: String,
    pub generation_config: GenerationConfig,
    pub system_instruction: Content,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<ResponseModality>,
    pub speech_config: SpeechConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    pub media_chunks: Vec<Blob>,
}

/// Contenu multi-parties (texte ou données binaires)
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<Blob>,
}

/// Données binaires encodées en base64
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

impl ClientMessage {
    /// Message d'ouverture de conversation
    pub fn setup(config: &GatewayConfig) -> Self {
        ClientMessage::Setup(SetupMessage {
            model: config.model_resource(),
            generation_config: GenerationConfig {
                response_modalities: vec![config.response_modality],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: config.voice_name.clone(),
                        },
                    },
                },
            },
            system_instruction: Content {
                parts: vec![Part {
                    text: Some(config.system_instruction.clone()),
                    inline_data: None,
                }],
            },
        })
    }

    /// Message portant un chunk audio capturé
    pub fn realtime_audio(chunk: &EncodedChunk) -> Self {
        ClientMessage::RealtimeInput(RealtimeInput {
            media_chunks: vec![Blob {
                mime_type: chunk.mime_type(),
                data: chunk.to_base64(),
            }],
        })
    }

    pub fn to_json(&self) -> NetworkResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Message reçu du serveur
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerMessage {
    pub setup_complete: Option<serde_json::Value>,
    pub server_content: Option<ServerContent>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerContent {
    pub model_turn: Option<Content>,
    pub interrupted: bool,
    pub turn_complete: bool,
}

impl ServerMessage {
    /// Parse un message texte du serveur
    pub fn parse(text: &str) -> NetworkResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Traduit le message en événements, dans l'ordre de traitement
    ///
    /// L'audio passe avant le drapeau d'interruption : un chunk arrivé
    /// dans le même message que l'interruption appartient à l'époque
    /// précédente et n'est jamais planifié.
    pub fn into_events(self) -> Vec<GatewayEvent> {
        let mut events = Vec::new();

        if self.setup_complete.is_some() {
            events.push(GatewayEvent::Opened);
        }

        if let Some(content) = self.server_content {
            let parts = content.model_turn.map(|turn| turn.parts).unwrap_or_default();
            for blob in parts.into_iter().filter_map(|part| part.inline_data) {
                if !blob.mime_type.starts_with(EncodedChunk::MIME_PREFIX) {
                    debug!("Partie ignorée ({})", blob.mime_type);
                    continue;
                }
                let rate = EncodedChunk::parse_mime_rate(&blob.mime_type)
                    .unwrap_or(DEFAULT_INBOUND_RATE);
                events.push(GatewayEvent::MessageReceived(EncodedChunk::base64(blob.data, rate)));
            }

            if content.interrupted {
                events.push(GatewayEvent::Interrupted);
            }
        }

        events
    }
}
