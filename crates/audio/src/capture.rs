//! Module de capture audio utilisant cpal
//!
//! Ce module implémente le trait AudioCapture en utilisant la librairie cpal
//! (Cross-Platform Audio Library) pour capturer l'audio depuis le microphone.
//!
//! Le micro ne travaille pas forcément à 16 kHz ni en mono : le callback
//! mélange les canaux, rééchantillonne vers la fréquence de l'agent et
//! découpe le flux en frames de taille fixe.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, SupportedStreamConfig};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::{AudioCapture, AudioConfig, AudioError, AudioFrame, AudioResult, Sample};

/// Découpe un flux entrelacé en frames mono de taille fixe
///
/// Le rééchantillonnage est linéaire et conserve sa phase d'un appel à
/// l'autre, les frames produites sont donc continues.
#[derive(Debug)]
pub struct FrameAssembler {
    channels: usize,
    frame_size: usize,

    /// Nombre d'échantillons d'entrée consommés par échantillon de sortie
    step: f64,

    /// Position (en échantillons d'entrée) du prochain échantillon de sortie
    next_position: f64,

    /// Index de l'échantillon d'entrée courant
    input_index: u64,

    previous: Sample,
    pending: Vec<Sample>,
    sequence: u64,
}

impl FrameAssembler {
    pub fn new(device_rate: u32, device_channels: usize, target_rate: u32, frame_size: usize) -> Self {
        Self {
            channels: device_channels.max(1),
            frame_size: frame_size.max(1),
            step: device_rate.max(1) as f64 / target_rate.max(1) as f64,
            next_position: 0.0,
            input_index: 0,
            previous: 0.0,
            pending: Vec::with_capacity(frame_size),
            sequence: 0,
        }
    }

    /// Ajoute des échantillons entrelacés, appelle `emit` pour chaque frame complète
    pub fn push(&mut self, interleaved: &[Sample], mut emit: impl FnMut(AudioFrame)) {
        for device_frame in interleaved.chunks_exact(self.channels) {
            let mono = device_frame.iter().sum::<Sample>() / self.channels as Sample;
            let index = self.input_index as f64;

            // Interpole entre l'échantillon précédent (index - 1) et celui-ci
            while self.next_position <= index {
                let frac = (self.next_position - (index - 1.0)) as Sample;
                self.pending.push(self.previous * (1.0 - frac) + mono * frac);
                self.next_position += self.step;

                if self.pending.len() == self.frame_size {
                    let samples = std::mem::replace(&mut self.pending, Vec::with_capacity(self.frame_size));
                    emit(AudioFrame::new(samples, self.sequence));
                    self.sequence += 1;
                }
            }

            self.previous = mono;
            self.input_index += 1;
        }
    }
}

/// Implémentation de capture audio avec cpal
///
/// Le périphérique est acquis dès `open()` (le stream est construit),
/// mais le callback jette tout tant que `start()` n'a pas été appelé.
///
/// # Architecture thread
///
/// cpal fonctionne avec des callbacks. Quand des données audio arrivent,
/// cpal appelle notre fonction qui accumule les échantillons.
/// Quand une frame est complète, on l'envoie via un channel async
/// vers la boucle de session, sans jamais bloquer.
pub struct CpalCapture {
    /// Stream audio (None une fois arrêté)
    stream: Option<Stream>,

    /// Channel pour recevoir les frames depuis le callback cpal
    frame_receiver: mpsc::Receiver<AudioFrame>,

    /// Porte partagée avec le callback
    recording: Arc<AtomicBool>,

    /// Nom du périphérique pour debug
    device_name: String,
}

impl CpalCapture {
    /// Acquiert le microphone par défaut
    ///
    /// # Erreurs
    /// - `AudioError::NoDeviceFound` si aucun microphone n'est disponible
    /// - `AudioError::PermissionDenied` si l'hôte refuse l'accès
    /// - `AudioError::ConfigError` si aucun format n'est utilisable
    pub fn open(config: &AudioConfig) -> AudioResult<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or(AudioError::NoDeviceFound)?;

        let device_name = device.description()
            .ok()
            .map(|desc| desc.name().to_string())
            .unwrap_or_else(|| "Périphérique inconnu".to_string());

        let stream_config = Self::select_config(&device, config.input_sample_rate)?;
        let (frame_sender, frame_receiver) = mpsc::channel(config.capture_queue_depth);
        let recording = Arc::new(AtomicBool::new(false));

        info!(
            "🎤 Microphone {} : {} Hz, {} canaux, {:?}",
            device_name,
            stream_config.sample_rate(),
            stream_config.channels(),
            stream_config.sample_format()
        );

        let assembler = FrameAssembler::new(
            stream_config.sample_rate(),
            stream_config.channels() as usize,
            config.input_sample_rate,
            config.frame_size,
        );

        let stream = match stream_config.sample_format() {
            SampleFormat::F32 => Self::build_stream::<f32>(&device, &stream_config, assembler, frame_sender, &recording)?,
            SampleFormat::I16 => Self::build_stream::<i16>(&device, &stream_config, assembler, frame_sender, &recording)?,
            SampleFormat::U16 => Self::build_stream::<u16>(&device, &stream_config, assembler, frame_sender, &recording)?,
            SampleFormat::I32 => Self::build_stream::<i32>(&device, &stream_config, assembler, frame_sender, &recording)?,
            other => return Err(AudioError::ConfigError(format!("Format d'échantillon non supporté : {:?}", other))),
        };

        Ok(Self {
            stream: Some(stream),
            frame_receiver,
            recording,
            device_name,
        })
    }

    /// Choisit la configuration du stream d'entrée
    ///
    /// 16 kHz natif si possible, sinon la config par défaut rééchantillonnée.
    fn select_config(device: &Device, wanted_rate: u32) -> AudioResult<SupportedStreamConfig> {
        let matching = device
            .supported_input_configs()?
            .filter(|range| range.min_sample_rate() <= wanted_rate && wanted_rate <= range.max_sample_rate())
            .min_by_key(|range| (range.sample_format() != SampleFormat::F32, range.channels()));

        match matching {
            Some(range) => Ok(range.with_sample_rate(wanted_rate)),
            None => {
                let fallback = device.default_input_config()?;
                debug!(
                    "{} Hz non supporté par le micro, rééchantillonnage depuis {} Hz",
                    wanted_rate,
                    fallback.sample_rate()
                );
                Ok(fallback)
            }
        }
    }

    /// Construit le stream pour un format d'échantillon donné
    fn build_stream<T>(
        device: &Device,
        stream_config: &SupportedStreamConfig,
        mut assembler: FrameAssembler,
        sender: mpsc::Sender<AudioFrame>,
        recording: &Arc<AtomicBool>,
    ) -> AudioResult<Stream>
    where
        T: cpal::SizedSample,
        f32: cpal::FromSample<T>,
    {
        let recording = Arc::clone(recording);
        let mut converted: Vec<f32> = Vec::new();

        let stream = device.build_input_stream(
            &stream_config.config(),
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                if !recording.load(Ordering::Acquire) {
                    return;
                }

                converted.clear();
                converted.extend(data.iter().map(|&s| <f32 as cpal::Sample>::from_sample(s)));

                assembler.push(&converted, |frame| {
                    // File pleine : la frame est perdue, le thread audio ne bloque jamais
                    let _ = sender.try_send(frame);
                });
            },
            move |err| {
                error!("❌ Erreur stream audio : {}", err);
            },
            None,
        )?;

        Ok(stream)
    }
}

#[async_trait]
impl AudioCapture for CpalCapture {
    fn start(&mut self) -> AudioResult<()> {
        let stream = self.stream.as_ref().ok_or(AudioError::DeviceDisconnected)?;

        if self.recording.load(Ordering::Acquire) {
            return Ok(()); // Déjà démarré
        }

        stream.play()?;
        self.recording.store(true, Ordering::Release);

        info!("✅ Capture audio démarrée");
        Ok(())
    }

    fn stop(&mut self) {
        self.recording.store(false, Ordering::Release);

        // Supprimer le stream libère le microphone
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                debug!("Pause de la capture impossible : {}", e);
            }
            info!("🛑 Capture audio arrêtée");
        }
    }

    async fn next_frame(&mut self) -> AudioResult<AudioFrame> {
        match self.frame_receiver.recv().await {
            Some(frame) => Ok(frame),
            None => Err(AudioError::DeviceDisconnected),
        }
    }

    fn is_recording(&self) -> bool {
        self.stream.is_some() && self.recording.load(Ordering::Acquire)
    }

    fn device_info(&self) -> String {
        self.device_name.clone()
    }
}

// Implémentation de Drop pour nettoyer proprement
impl Drop for CpalCapture {
    fn drop(&mut self) {
        if self.stream.is_some() {
            debug!("🧹 Nettoyage automatique de la capture audio");
            self.stop();
        }
    }
}
