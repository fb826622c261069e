//! Périphériques audio en mémoire pour les tests de session
//!
//! Chaque périphérique partage une sonde avec le test : le test pilote
//! l'horloge de sortie, injecte des frames capturées et inspecte ce que
//! la session a fait des périphériques après les lui avoir cédés.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;

use audio::{
    AudioBackend, AudioCapture, AudioConfig, AudioError, AudioFrame, AudioOutput, AudioResult,
    DecodedBuffer, SourceEndedCallback, SourceId,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Sonde d'un micro en mémoire
pub struct CaptureProbe {
    frames: mpsc::UnboundedSender<AudioFrame>,
    recording: AtomicBool,
    stopped: AtomicBool,
    starts: AtomicUsize,
}

impl CaptureProbe {
    /// Injecte une frame ; ignorée tant que la capture n'est pas démarrée
    pub fn push(&self, frame: AudioFrame) -> bool {
        if !self.recording.load(Ordering::SeqCst) {
            return false;
        }
        self.frames.send(frame).is_ok()
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }
}

pub struct MemoryCapture {
    frames: mpsc::UnboundedReceiver<AudioFrame>,
    probe: Arc<CaptureProbe>,
}

impl MemoryCapture {
    pub fn new() -> (Self, Arc<CaptureProbe>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let probe = Arc::new(CaptureProbe {
            frames: tx,
            recording: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            starts: AtomicUsize::new(0),
        });
        (Self { frames: rx, probe: probe.clone() }, probe)
    }
}

#[async_trait]
impl AudioCapture for MemoryCapture {
    fn start(&mut self) -> AudioResult<()> {
        if self.probe.is_stopped() {
            return Err(AudioError::DeviceDisconnected);
        }
        self.probe.starts.fetch_add(1, Ordering::SeqCst);
        self.probe.recording.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) {
        self.probe.recording.store(false, Ordering::SeqCst);
        self.probe.stopped.store(true, Ordering::SeqCst);
    }

    async fn next_frame(&mut self) -> AudioResult<AudioFrame> {
        self.frames.recv().await.ok_or(AudioError::DeviceDisconnected)
    }

    fn is_recording(&self) -> bool {
        self.probe.is_recording()
    }
}

/// Sonde d'une sortie en mémoire
#[derive(Default)]
pub struct OutputProbe {
    now: Mutex<f64>,
    scheduled: Mutex<Vec<(SourceId, f64, f64)>>,
    stopped: Mutex<Vec<SourceId>>,
    closed: AtomicBool,
    on_ended: Mutex<Option<SourceEndedCallback>>,
}

impl OutputProbe {
    pub fn set_time(&self, seconds: f64) {
        *lock(&self.now) = seconds;
    }

    /// Sources planifiées : (id, début, durée)
    pub fn scheduled(&self) -> Vec<(SourceId, f64, f64)> {
        lock(&self.scheduled).clone()
    }

    pub fn stopped(&self) -> Vec<SourceId> {
        lock(&self.stopped).clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Signale la fin naturelle d'une source, comme le thread audio
    pub fn finish(&self, id: SourceId) {
        if let Some(on_ended) = lock(&self.on_ended).as_ref() {
            on_ended(id);
        }
    }
}

pub struct MemoryOutput {
    probe: Arc<OutputProbe>,
}

impl MemoryOutput {
    pub fn new() -> (Self, Arc<OutputProbe>) {
        let probe = Arc::new(OutputProbe::default());
        (Self { probe: probe.clone() }, probe)
    }

    pub fn stopped(&self) -> Vec<SourceId> {
        self.probe.stopped()
    }
}

impl AudioOutput for MemoryOutput {
    fn current_time(&self) -> f64 {
        *lock(&self.probe.now)
    }

    fn schedule(&mut self, id: SourceId, buffer: DecodedBuffer, start_time: f64) -> AudioResult<()> {
        if self.probe.is_closed() {
            return Err(AudioError::ContextClosed);
        }
        lock(&self.probe.scheduled).push((id, start_time, buffer.duration_secs()));
        Ok(())
    }

    fn stop_source(&mut self, id: SourceId) {
        lock(&self.probe.stopped).push(id);
    }

    fn close(&mut self) {
        self.probe.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.probe.is_closed()
    }
}

/// Backend qui fabrique des périphériques en mémoire
#[derive(Default)]
pub struct MemoryBackend {
    deny_input: AtomicBool,
    fail_output: AtomicBool,
    captures: Mutex<Vec<Arc<CaptureProbe>>>,
    outputs: Mutex<Vec<Arc<OutputProbe>>>,
}

impl MemoryBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Simule un accès micro refusé
    pub fn deny_input(&self, deny: bool) {
        self.deny_input.store(deny, Ordering::SeqCst);
    }

    pub fn fail_output(&self, fail: bool) {
        self.fail_output.store(fail, Ordering::SeqCst);
    }

    pub fn inputs_opened(&self) -> usize {
        lock(&self.captures).len()
    }

    pub fn outputs_opened(&self) -> usize {
        lock(&self.outputs).len()
    }

    pub fn capture(&self) -> Arc<CaptureProbe> {
        lock(&self.captures).last().cloned().expect("aucune capture ouverte")
    }

    pub fn output(&self) -> Arc<OutputProbe> {
        lock(&self.outputs).last().cloned().expect("aucune sortie ouverte")
    }
}

impl AudioBackend for MemoryBackend {
    fn open_input(&self, _config: &AudioConfig) -> AudioResult<Box<dyn AudioCapture>> {
        if self.deny_input.load(Ordering::SeqCst) {
            return Err(AudioError::PermissionDenied("accès au micro refusé".into()));
        }
        let (capture, probe) = MemoryCapture::new();
        lock(&self.captures).push(probe);
        Ok(Box::new(capture))
    }

    fn open_output(
        &self,
        _config: &AudioConfig,
        on_ended: SourceEndedCallback,
    ) -> AudioResult<Box<dyn AudioOutput>> {
        if self.fail_output.load(Ordering::SeqCst) {
            return Err(AudioError::NoDeviceFound);
        }
        let (output, probe) = MemoryOutput::new();
        *lock(&probe.on_ended) = Some(on_ended);
        lock(&self.outputs).push(probe);
        Ok(Box::new(output))
    }
}
