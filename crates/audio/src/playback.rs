//! Module de lecture audio utilisant cpal
//!
//! Ce module implémente le trait AudioOutput : un contexte de sortie avec
//! sa propre horloge, sur lequel on planifie des buffers à un instant absolu.
//!
//! # Architecture thread
//!
//! La boucle de session ajoute et retire des sources de la `Timeline`.
//! Le callback cpal (thread temps réel) rend la timeline bloc par bloc :
//! il mixe les sources actives, avance l'horloge, et signale les sources
//! arrivées au bout de leur buffer via le callback `on_ended`.

use std::sync::{Arc, Mutex, PoisonError};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, SupportedStreamConfig};
use tracing::{debug, error, info};

use crate::{
    AudioConfig, AudioError, AudioOutput, AudioResult, DecodedBuffer, Sample,
    SourceEndedCallback, SourceId,
};

/// Buffer planifié, déjà rééchantillonné à la fréquence du périphérique
#[derive(Debug)]
struct ScheduledBuffer {
    id: SourceId,
    start_frame: u64,
    samples: Vec<Sample>,
}

impl ScheduledBuffer {
    fn end_frame(&self) -> u64 {
        self.start_frame + self.samples.len() as u64
    }
}

/// Timeline de sortie, exprimée en frames du périphérique
///
/// L'horloge est le nombre de frames déjà rendues : elle ne dépend que du
/// callback audio et avance donc au rythme réel du périphérique.
#[derive(Debug)]
pub struct Timeline {
    sample_rate: u32,
    channels: usize,
    rendered_frames: u64,
    sources: Vec<ScheduledBuffer>,
}

impl Timeline {
    pub fn new(sample_rate: u32, channels: usize) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            channels: channels.max(1),
            rendered_frames: 0,
            sources: Vec::new(),
        }
    }

    /// Temps de l'horloge en secondes
    pub fn current_time(&self) -> f64 {
        self.rendered_frames as f64 / self.sample_rate as f64
    }

    fn frame_at(&self, seconds: f64) -> u64 {
        (seconds.max(0.0) * self.sample_rate as f64).round() as u64
    }

    /// Ajoute un buffer qui commencera à `start_time`
    ///
    /// Début et fin sont arrondis séparément sur la grille du périphérique :
    /// un buffer planifié à la fin du précédent commence à la frame exacte
    /// où celui-ci s'arrête. Un instant déjà passé est ramené au prochain
    /// bloc rendu.
    pub fn insert(&mut self, id: SourceId, buffer: DecodedBuffer, start_time: f64) {
        let start_time = start_time.max(0.0);
        let requested = self.frame_at(start_time);
        let end = self.frame_at(start_time + buffer.duration_secs());
        let length = end.saturating_sub(requested) as usize;
        let samples = resample_linear(&buffer.samples, buffer.sample_rate, self.sample_rate, length);

        self.sources.push(ScheduledBuffer {
            id,
            start_frame: requested.max(self.rendered_frames),
            samples,
        });
    }

    /// Retire une source sans attendre sa fin
    pub fn remove(&mut self, id: SourceId) -> bool {
        let before = self.sources.len();
        self.sources.retain(|s| s.id != id);
        self.sources.len() != before
    }

    pub fn clear(&mut self) {
        self.sources.clear();
    }

    pub fn active_sources(&self) -> usize {
        self.sources.len()
    }

    /// Rend un bloc entrelacé et avance l'horloge
    ///
    /// Chaque source est dupliquée sur tous les canaux du périphérique.
    /// Retourne les sources terminées pendant ce bloc.
    pub fn render(&mut self, out: &mut [f32]) -> Vec<SourceId> {
        out.fill(0.0);

        let frames = (out.len() / self.channels) as u64;
        let block_start = self.rendered_frames;
        let block_end = block_start + frames;

        for source in &self.sources {
            let from = source.start_frame.max(block_start);
            let to = source.end_frame().min(block_end);

            for frame in from..to {
                let sample = source.samples[(frame - source.start_frame) as usize];
                let base = (frame - block_start) as usize * self.channels;
                for slot in &mut out[base..base + self.channels] {
                    *slot += sample;
                }
            }
        }

        for slot in out.iter_mut() {
            *slot = slot.clamp(-1.0, 1.0);
        }

        self.rendered_frames = block_end;

        let mut finished = Vec::new();
        self.sources.retain(|s| {
            if s.end_frame() <= block_end {
                finished.push(s.id);
                false
            } else {
                true
            }
        });
        finished
    }
}

/// Rééchantillonnage linéaire d'un buffer complet vers `out_len` échantillons
pub fn resample_linear(samples: &[Sample], from_rate: u32, to_rate: u32, out_len: usize) -> Vec<Sample> {
    if samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return vec![0.0; out_len];
    }
    if from_rate == to_rate {
        let mut same = samples.to_vec();
        same.resize(out_len, 0.0);
        return same;
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let last = samples.len() - 1;

    (0..out_len)
        .map(|i| {
            let position = i as f64 * ratio;
            let index = (position.floor() as usize).min(last);
            let frac = (position - index as f64) as f32;
            let current = samples[index];
            let next = samples[(index + 1).min(last)];
            current + (next - current) * frac
        })
        .collect()
}

/// Implémentation du contexte de sortie avec cpal
///
/// Le stream démarre dès l'ouverture : l'horloge tourne même sans source,
/// le périphérique joue alors du silence.
pub struct CpalOutput {
    /// Stream audio actif (None une fois fermé)
    stream: Option<Stream>,

    /// Timeline partagée avec le callback temps réel
    timeline: Arc<Mutex<Timeline>>,

    /// Nom du périphérique pour debug
    device_name: String,

    closed: bool,
}

impl CpalOutput {
    /// Ouvre le périphérique de sortie par défaut et démarre l'horloge
    ///
    /// # Erreurs
    /// - `AudioError::NoDeviceFound` si aucun haut-parleur n'est disponible
    /// - `AudioError::ConfigError` si aucun format n'est utilisable
    pub fn open(config: &AudioConfig, on_ended: SourceEndedCallback) -> AudioResult<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or(AudioError::NoDeviceFound)?;

        let device_name = device.description()
            .ok()
            .map(|desc| desc.name().to_string())
            .unwrap_or_else(|| "Périphérique inconnu".to_string());

        let stream_config = Self::select_config(&device, config.output_sample_rate)?;
        let timeline = Arc::new(Mutex::new(Timeline::new(
            stream_config.sample_rate(),
            stream_config.channels() as usize,
        )));

        info!(
            "🔊 Sortie {} : {} Hz, {} canaux, {:?}",
            device_name,
            stream_config.sample_rate(),
            stream_config.channels(),
            stream_config.sample_format()
        );

        let on_ended: Arc<SourceEndedCallback> = Arc::new(on_ended);
        let stream = match stream_config.sample_format() {
            SampleFormat::F32 => Self::build_stream::<f32>(&device, &stream_config, &timeline, on_ended)?,
            SampleFormat::I16 => Self::build_stream::<i16>(&device, &stream_config, &timeline, on_ended)?,
            SampleFormat::U16 => Self::build_stream::<u16>(&device, &stream_config, &timeline, on_ended)?,
            SampleFormat::I32 => Self::build_stream::<i32>(&device, &stream_config, &timeline, on_ended)?,
            other => return Err(AudioError::ConfigError(format!("Format d'échantillon non supporté : {:?}", other))),
        };
        stream.play()?;

        Ok(Self {
            stream: Some(stream),
            timeline,
            device_name,
            closed: false,
        })
    }

    /// Choisit la configuration du stream de sortie
    ///
    /// On préfère la fréquence de l'agent (pas de rééchantillonnage) ; à
    /// défaut on garde la config par défaut et la timeline rééchantillonne.
    fn select_config(device: &Device, wanted_rate: u32) -> AudioResult<SupportedStreamConfig> {
        let matching = device
            .supported_output_configs()?
            .filter(|range| range.min_sample_rate() <= wanted_rate && wanted_rate <= range.max_sample_rate())
            .min_by_key(|range| (range.sample_format() != SampleFormat::F32, range.channels()));

        match matching {
            Some(range) => Ok(range.with_sample_rate(wanted_rate)),
            None => {
                let fallback = device.default_output_config()?;
                debug!(
                    "{} Hz non supporté en sortie, rééchantillonnage vers {} Hz",
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
        timeline: &Arc<Mutex<Timeline>>,
        on_ended: Arc<SourceEndedCallback>,
    ) -> AudioResult<Stream>
    where
        T: cpal::SizedSample + cpal::FromSample<f32>,
    {
        let timeline = Arc::clone(timeline);
        let mut scratch: Vec<f32> = Vec::new();

        let stream = device.build_output_stream(
            &stream_config.config(),
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                scratch.resize(data.len(), 0.0);

                let finished = {
                    let mut timeline = timeline.lock().unwrap_or_else(PoisonError::into_inner);
                    timeline.render(&mut scratch)
                };

                for (out, &sample) in data.iter_mut().zip(scratch.iter()) {
                    *out = T::from_sample(sample);
                }

                for id in finished {
                    on_ended(id);
                }
            },
            move |err| {
                error!("❌ Erreur stream audio sortie : {}", err);
            },
            None,
        )?;

        Ok(stream)
    }

    fn with_timeline<R>(&self, f: impl FnOnce(&mut Timeline) -> R) -> R {
        let mut timeline = self.timeline.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut timeline)
    }
}

impl AudioOutput for CpalOutput {
    fn current_time(&self) -> f64 {
        self.with_timeline(|t| t.current_time())
    }

    fn schedule(&mut self, id: SourceId, buffer: DecodedBuffer, start_time: f64) -> AudioResult<()> {
        if self.closed {
            return Err(AudioError::ContextClosed);
        }
        self.with_timeline(|t| t.insert(id, buffer, start_time));
        Ok(())
    }

    fn stop_source(&mut self, id: SourceId) {
        self.with_timeline(|t| t.remove(id));
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }

        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                debug!("Pause de la sortie impossible : {}", e);
            }
        }
        self.with_timeline(|t| t.clear());
        self.closed = true;

        info!("🛑 Sortie audio fermée");
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn device_info(&self) -> String {
        self.device_name.clone()
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        if !self.closed {
            debug!("🧹 Nettoyage automatique de la sortie audio");
            self.close();
        }
    }
}
