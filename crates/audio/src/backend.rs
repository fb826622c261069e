//! Backend audio réel basé sur cpal
//!
//! Ouvre les contextes d'entrée et de sortie d'une session sur les
//! périphériques par défaut de l'hôte.

use cpal::traits::{DeviceTrait, HostTrait};
use tracing::debug;

use crate::{
    AudioBackend, AudioCapture, AudioConfig, AudioError, AudioOutput, AudioResult,
    CpalCapture, CpalOutput, SourceEndedCallback,
};

/// Fabrique de contextes audio cpal
#[derive(Clone, Debug, Default)]
pub struct CpalBackend;

/// Périphérique détecté sur l'hôte
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceInfo {
    pub name: String,
    pub is_input: bool,
    pub is_default: bool,

    /// Format par défaut, absent si le périphérique refuse de le donner
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
}

fn device_name(device: &cpal::Device) -> String {
    device.description()
        .ok()
        .map(|desc| desc.name().to_string())
        .unwrap_or_else(|| "Périphérique inconnu".to_string())
}

impl CpalBackend {
    pub fn new() -> Self {
        Self
    }

    /// Liste les micros puis les sorties de l'hôte par défaut
    pub fn probe(&self) -> AudioResult<Vec<DeviceInfo>> {
        let host = cpal::default_host();
        let default_input = host.default_input_device().map(|d| device_name(&d));
        let default_output = host.default_output_device().map(|d| device_name(&d));

        let mut found = Vec::new();

        let inputs = host.input_devices()
            .map_err(|e| AudioError::InitializationError(e.to_string()))?;
        for device in inputs {
            let name = device_name(&device);
            let config = device.default_input_config().ok();
            found.push(DeviceInfo {
                is_default: default_input.as_deref() == Some(name.as_str()),
                name,
                is_input: true,
                sample_rate: config.as_ref().map(|c| c.sample_rate()),
                channels: config.as_ref().map(|c| c.channels()),
            });
        }

        let outputs = host.output_devices()
            .map_err(|e| AudioError::InitializationError(e.to_string()))?;
        for device in outputs {
            let name = device_name(&device);
            let config = device.default_output_config().ok();
            found.push(DeviceInfo {
                is_default: default_output.as_deref() == Some(name.as_str()),
                name,
                is_input: false,
                sample_rate: config.as_ref().map(|c| c.sample_rate()),
                channels: config.as_ref().map(|c| c.channels()),
            });
        }

        debug!("{} périphérique(s) détecté(s) sur {:?}", found.len(), host.id());
        Ok(found)
    }
}

impl AudioBackend for CpalBackend {
    fn open_input(&self, config: &AudioConfig) -> AudioResult<Box<dyn AudioCapture>> {
        config.validate().map_err(AudioError::ConfigError)?;

        let capture = CpalCapture::open(config)?;
        debug!("Contexte d'entrée ouvert sur {}", capture.device_info());
        Ok(Box::new(capture))
    }

    fn open_output(
        &self,
        config: &AudioConfig,
        on_ended: SourceEndedCallback,
    ) -> AudioResult<Box<dyn AudioOutput>> {
        config.validate().map_err(AudioError::ConfigError)?;

        let output = CpalOutput::open(config, on_ended)?;
        debug!("Contexte de sortie ouvert sur {}", output.device_info());
        Ok(Box::new(output))
    }
}
