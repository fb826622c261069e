//! Module d'encodage/décodage PCM16
//!
//! L'agent distant échange de l'audio brut : des entiers signés 16 bits
//! little-endian, mono. Ce module implémente le trait AudioCodec pour
//! ce format.
//!
//! Conversion f32 → i16 : multiplication par 32768, arrondi explicite,
//! puis écrêtage dans [-32768, 32767]. Un échantillon hors plage
//! sature au lieu de boucler.

use crate::{AudioCodec, AudioError, AudioFrame, AudioResult, DecodedBuffer, EncodedChunk, Sample};

/// Facteur d'échelle entre un échantillon flottant et un entier 16 bits
const PCM16_SCALE: f32 = 32768.0;

/// Convertit un échantillon flottant en PCM16 avec saturation
pub fn sample_to_pcm16(sample: Sample) -> i16 {
    let scaled = (sample * PCM16_SCALE).round();
    // NaN donne 0 (comportement de `as`), le reste est borné avant conversion
    scaled.clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Convertit un échantillon PCM16 en flottant dans [-1.0, 1.0)
pub fn pcm16_to_sample(value: i16) -> Sample {
    value as f32 / PCM16_SCALE
}

/// Codec PCM16 little-endian
///
/// Sans état : la même instance peut servir à la capture et au décodage.
#[derive(Clone, Debug)]
pub struct Pcm16Codec {
    /// Fréquence annoncée dans les chunks produits par `encode`
    sample_rate: u32,
}

impl Pcm16Codec {
    /// Crée un codec pour des frames capturées à `sample_rate`
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl AudioCodec for Pcm16Codec {
    fn encode(&self, frame: &AudioFrame) -> EncodedChunk {
        let mut data = Vec::with_capacity(frame.samples.len() * 2);
        for &sample in &frame.samples {
            data.extend_from_slice(&sample_to_pcm16(sample).to_le_bytes());
        }

        EncodedChunk::pcm16(data, self.sample_rate, frame.sequence_number)
    }

    fn decode(&self, chunk: &EncodedChunk) -> AudioResult<DecodedBuffer> {
        let bytes = chunk.pcm_bytes()?;
        if bytes.len() % 2 != 0 {
            return Err(AudioError::DecodeError(format!(
                "taille impaire: {} octets", bytes.len()
            )));
        }

        let sample_rate = match chunk.sample_rate {
            0 => self.sample_rate,
            rate => rate,
        };

        let samples = bytes
            .chunks_exact(2)
            .map(|pair| pcm16_to_sample(i16::from_le_bytes([pair[0], pair[1]])))
            .collect();

        Ok(DecodedBuffer::new(samples, sample_rate))
    }

    fn codec_info(&self) -> String {
        format!("PCM16 LE - {}Hz mono", self.sample_rate)
    }
}
