//! Contrôleur du cycle de vie d'une session vocale
//!
//! `Idle → Connecting → Active → Idle`, avec retour à `Idle` depuis
//! n'importe quel état sur erreur, fermeture du canal ou `stop()`.
//!
//! La session possède seule les périphériques, le planificateur et le
//! handle du canal. Les tâches asynchrones (connexion, décodage) ne
//! touchent à rien : elles renvoient des `SessionEvent` étiquetés avec la
//! génération courante, et tout événement d'une génération passée est
//! écarté. `stop()` incrémente la génération.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use audio::{
    AudioBackend, AudioCapture, AudioCodec, AudioFrame, AudioOutput, DecodedBuffer, EncodedChunk,
    Pcm16Codec, PlaybackScheduler, SourceEndedCallback, VisualizerWindow,
};
use network::{EventSink, Gateway, GatewayConfig, GatewayEvent, GatewayHandle};

use crate::{
    InterruptionHandler, SessionConfig, SessionError, SessionEvent, SessionResult,
    SessionSnapshot, SessionState, SessionStats,
};

/// Ressources d'une session en cours
struct LiveSession {
    capture: Box<dyn AudioCapture>,
    output: Box<dyn AudioOutput>,

    /// Absent tant que la connexion n'a pas abouti
    handle: Option<Box<dyn GatewayHandle>>,

    /// File du décodeur : (époque, chunk)
    decode_queue: mpsc::UnboundedSender<(u64, EncodedChunk)>,
    decoder: JoinHandle<()>,
}

/// Session vocale avec l'agent distant
///
/// # Example
/// ```rust,no_run
/// use std::sync::Arc;
/// use audio::CpalBackend;
/// use network::WebSocketGateway;
/// use session::{SessionConfig, VoiceSession};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut session = VoiceSession::new(
///     SessionConfig::default(),
///     Arc::new(CpalBackend::new()),
///     Arc::new(WebSocketGateway::new()),
/// );
///
/// session.start()?;
/// while let Some(event) = session.next_event().await {
///     session.handle_event(event);
/// }
/// # Ok(())
/// # }
/// ```
pub struct VoiceSession {
    config: SessionConfig,
    backend: Arc<dyn AudioBackend>,
    gateway: Arc<dyn Gateway>,

    /// Encode les frames capturées (16 kHz)
    encoder: Pcm16Codec,

    state: SessionState,
    generation: u64,
    live: Option<LiveSession>,

    scheduler: PlaybackScheduler,
    interruption: InterruptionHandler,
    visualizer: VisualizerWindow,

    stats: SessionStats,
    last_error: Option<String>,

    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl VoiceSession {
    pub fn new(
        config: SessionConfig,
        backend: Arc<dyn AudioBackend>,
        gateway: Arc<dyn Gateway>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let visualizer = VisualizerWindow::from_config(&config.audio);
        let encoder = Pcm16Codec::new(config.audio.input_sample_rate);

        let initial = SessionSnapshot {
            state: SessionState::Idle,
            visualizer: visualizer.values(),
            status: idle_status().to_string(),
            stats: SessionStats::default(),
        };
        let (snapshot_tx, _) = watch::channel(initial);

        Self {
            config,
            backend,
            gateway,
            encoder,
            state: SessionState::Idle,
            generation: 0,
            live: None,
            scheduler: PlaybackScheduler::new(),
            interruption: InterruptionHandler::new(),
            visualizer,
            stats: SessionStats::default(),
            last_error: None,
            events_tx,
            events_rx,
            snapshot_tx,
        }
    }

    /// Démarre une session
    ///
    /// Sans effet si une session est déjà en cours (connexion ou active).
    /// Ouvre le micro et la sortie, lance le décodeur, puis demande la
    /// connexion en tâche de fond : la session passe `Connecting`.
    ///
    /// # Erreurs
    /// - `SessionError::PermissionDenied` : micro indisponible
    /// - `SessionError::Audio` : sortie impossible à ouvrir
    /// - `SessionError::ConfigError` : configuration incohérente
    ///
    /// En cas d'erreur, tout ce qui a été ouvert est relâché et la session
    /// reste `Idle`.
    pub fn start(&mut self) -> SessionResult<()> {
        if self.state != SessionState::Idle {
            debug!("start() ignoré: session {}", self.state);
            return Ok(());
        }

        if let Err(reason) = self.config.validate() {
            return Err(self.abort_start(SessionError::ConfigError(reason)));
        }

        self.last_error = None;
        let generation = self.generation;

        let capture = match self.backend.open_input(&self.config.audio) {
            Ok(capture) => capture,
            Err(e) => return Err(self.abort_start(SessionError::from_input(e))),
        };
        debug!("Micro ouvert: {}", capture.device_info());

        let ended_tx = self.events_tx.clone();
        let on_ended: SourceEndedCallback = Box::new(move |source| {
            let _ = ended_tx.send(SessionEvent::PlaybackEnded { generation, source });
        });

        let output = match self.backend.open_output(&self.config.audio, on_ended) {
            Ok(output) => output,
            Err(e) => {
                let mut capture = capture;
                capture.stop();
                return Err(self.abort_start(SessionError::Audio(e)));
            }
        };
        debug!("Sortie ouverte: {}", output.device_info());

        let (decode_queue, queue) = mpsc::unbounded_channel();
        let decoder = tokio::spawn(decode_worker(
            Pcm16Codec::new(self.config.audio.output_sample_rate),
            queue,
            self.events_tx.clone(),
            generation,
        ));

        self.live = Some(LiveSession {
            capture,
            output,
            handle: None,
            decode_queue,
            decoder,
        });

        // Tâche détachée : une résolution après stop() est écartée par la génération
        tokio::spawn(connect_worker(
            self.gateway.clone(),
            self.config.gateway.clone(),
            self.events_tx.clone(),
            generation,
        ));

        self.state = SessionState::Connecting;
        self.stats.sessions_started += 1;
        info!("📞 Connexion à l'agent via la passerelle {}...", self.gateway.name());
        self.publish();
        Ok(())
    }

    /// Arrête la session et libère toutes les ressources
    ///
    /// Idempotent et sûr depuis n'importe quel état, y compris pendant la
    /// connexion. Ferme le canal, les deux contextes audio, coupe toutes
    /// les sources, remet le curseur de lecture à 0 et le visualiseur au
    /// plancher.
    pub fn stop(&mut self) {
        let previous = self.state;

        match self.live.take() {
            Some(mut live) => {
                if let Some(handle) = live.handle.take() {
                    handle.close();
                }
                live.capture.stop();
                self.scheduler.cancel_all(Some(live.output.as_mut()));
                live.output.close();
                live.decoder.abort();
            }
            None => {
                self.scheduler.cancel_all(None);
            }
        }

        self.visualizer.reset();
        self.generation += 1;
        self.state = SessionState::Idle;

        if previous != SessionState::Idle {
            info!("🔚 Session arrêtée (était {})", previous);
        }
        self.publish();
    }

    /// Attend le prochain événement à traiter
    ///
    /// Mélange les événements asynchrones et, quand la session est active,
    /// les frames du micro.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        let generation = self.generation;
        let capture = match (self.state, self.live.as_mut()) {
            (SessionState::Active, Some(live)) => Some(&mut live.capture),
            _ => None,
        };

        match capture {
            Some(capture) => tokio::select! {
                event = self.events_rx.recv() => event,
                frame = capture.next_frame() => Some(match frame {
                    Ok(frame) => SessionEvent::FrameCaptured { generation, frame },
                    Err(error) => SessionEvent::CaptureFailed { generation, error },
                }),
            },
            None => self.events_rx.recv().await,
        }
    }

    /// Traite un événement
    ///
    /// Tout événement d'une génération passée est écarté ; un handle de
    /// connexion obsolète est fermé aussitôt.
    pub fn handle_event(&mut self, event: SessionEvent) {
        if event.generation() != self.generation {
            debug!("Événement obsolète écarté: {:?}", event);
            if let SessionEvent::Connected { handle, .. } = event {
                handle.close();
            }
            return;
        }

        match event {
            SessionEvent::Connected { handle, .. } => match self.live.as_mut() {
                Some(live) => {
                    debug!("Canal établi");
                    live.handle = Some(handle);
                }
                None => handle.close(),
            },
            SessionEvent::ConnectFailed { error, .. } => {
                self.fail(SessionError::Connect(error));
            }
            SessionEvent::Gateway { event, .. } => self.on_gateway_event(event),
            SessionEvent::FrameCaptured { frame, .. } => self.on_frame(frame),
            SessionEvent::CaptureFailed { error, .. } => {
                self.fail(SessionError::Audio(error));
            }
            SessionEvent::ChunkDecoded { epoch, buffer, .. } => self.on_decoded(epoch, buffer),
            SessionEvent::DecodeFailed { error, .. } => {
                self.stats.decode_failures += 1;
                warn!("{}", SessionError::Decode(error));
            }
            SessionEvent::PlaybackEnded { source, .. } => {
                if self.scheduler.source_ended(source) {
                    debug!("⏹️  {} terminée", source);
                }
            }
        }

        self.publish();
    }

    fn on_gateway_event(&mut self, event: GatewayEvent) {
        match event {
            GatewayEvent::Opened => {
                if self.state != SessionState::Connecting {
                    debug!("Ouverture ignorée: session {}", self.state);
                    return;
                }
                let started = match self.live.as_mut() {
                    Some(live) => live.capture.start(),
                    None => return,
                };
                match started {
                    Ok(()) => {
                        self.state = SessionState::Active;
                        info!("🎙️  Session active, l'agent écoute");
                    }
                    Err(e) => self.fail(SessionError::from_input(e)),
                }
            }
            GatewayEvent::MessageReceived(chunk) => {
                let Some(live) = self.live.as_ref() else { return };
                self.stats.chunks_received += 1;
                let _ = live.decode_queue.send((self.interruption.epoch(), chunk));
            }
            GatewayEvent::Interrupted => {
                match self.live.as_mut() {
                    Some(live) => self.interruption.interrupt(&mut self.scheduler, Some(live.output.as_mut())),
                    None => self.interruption.interrupt(&mut self.scheduler, None),
                };
                self.stats.interruptions += 1;
            }
            GatewayEvent::Errored(reason) => {
                error!("Erreur de la passerelle: {}", reason);
                self.fail(SessionError::Gateway(reason));
            }
            GatewayEvent::Closed => {
                info!("Canal fermé par l'agent");
                self.fail(SessionError::GatewayClosed);
            }
        }
    }

    /// Frame capturée : visualiseur puis envoi sans attente
    fn on_frame(&mut self, frame: AudioFrame) {
        if self.state != SessionState::Active {
            return;
        }
        let Some(live) = self.live.as_ref() else { return };

        self.stats.frames_captured += 1;
        self.visualizer.push_amplitude(frame.mean_amplitude());

        let chunk = self.encoder.encode(&frame);
        let sent = match live.handle.as_ref() {
            Some(handle) => handle.send(chunk).map_err(SessionError::TransportSend),
            None => Err(SessionError::TransportSend(network::NetworkError::ChannelClosed)),
        };

        match sent {
            Ok(()) => self.stats.chunks_sent += 1,
            Err(e) => {
                self.stats.chunks_dropped += 1;
                debug!("Frame {} perdue: {}", frame.sequence_number, e);
            }
        }
    }

    /// Chunk décodé : planifié seulement s'il précède toute interruption
    fn on_decoded(&mut self, epoch: u64, buffer: DecodedBuffer) {
        if !self.interruption.is_current(epoch) {
            self.stats.chunks_discarded += 1;
            debug!("Chunk d'avant l'interruption écarté");
            return;
        }
        let Some(live) = self.live.as_mut() else { return };

        match self.scheduler.schedule(live.output.as_mut(), buffer) {
            Ok(_) => self.stats.chunks_scheduled += 1,
            Err(e) => warn!("Planification impossible: {}", e),
        }
    }

    /// Erreur terminale : même chemin que `stop()`
    fn fail(&mut self, error: SessionError) {
        warn!("Session interrompue: {}", error);
        self.stop();
        self.last_error = Some(error.to_string());
        self.publish();
    }

    fn abort_start(&mut self, error: SessionError) -> SessionError {
        warn!("Démarrage impossible: {}", error);
        self.stop();
        self.last_error = Some(error.to_string());
        self.publish();
        error
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn visualizer(&self) -> Vec<f32> {
        self.visualizer.values()
    }

    pub fn live_sources(&self) -> usize {
        self.scheduler.live_count()
    }

    pub fn next_start_time(&self) -> f64 {
        self.scheduler.next_start_time()
    }

    /// Vérifie si le canal est établi
    pub fn is_connected(&self) -> bool {
        self.live.as_ref().is_some_and(|live| live.handle.is_some())
    }

    /// Message affiché à l'utilisateur
    pub fn status(&self) -> String {
        match (self.state, self.last_error.as_deref()) {
            (SessionState::Idle, Some(error)) => format!("Erreur: {}", error),
            (SessionState::Idle, None) => idle_status().to_string(),
            (SessionState::Connecting, _) => "Connexion...".to_string(),
            (SessionState::Active, _) => "Je vous écoute... Comment puis-je vous aider ?".to_string(),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            visualizer: self.visualizer.values(),
            status: self.status(),
            stats: self.stats.clone(),
        }
    }

    /// Abonnement aux instantanés publiés après chaque événement
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.snapshot());
    }
}

impl Drop for VoiceSession {
    fn drop(&mut self) {
        self.stop();
    }
}

fn idle_status() -> &'static str {
    "Parlez à l'assistant de vos envois."
}

/// Connexion en tâche de fond
///
/// Les événements du canal et l'issue de la connexion repassent tous par
/// la file de la session, étiquetés avec `generation`.
async fn connect_worker(
    gateway: Arc<dyn Gateway>,
    config: GatewayConfig,
    events: mpsc::UnboundedSender<SessionEvent>,
    generation: u64,
) {
    let forward = events.clone();
    let sink: EventSink = Arc::new(move |event| {
        let _ = forward.send(SessionEvent::Gateway { generation, event });
    });

    let outcome = match gateway.connect(&config, sink).await {
        Ok(handle) => SessionEvent::Connected { generation, handle },
        Err(error) => SessionEvent::ConnectFailed { generation, error },
    };

    // Session détruite : le handle est fermé par son Drop
    let _ = events.send(outcome);
}

/// Décodeur d'une session
///
/// Une seule tâche par session : les chunks sont décodés et renvoyés
/// dans leur ordre d'arrivée.
async fn decode_worker(
    codec: Pcm16Codec,
    mut queue: mpsc::UnboundedReceiver<(u64, EncodedChunk)>,
    events: mpsc::UnboundedSender<SessionEvent>,
    generation: u64,
) {
    while let Some((epoch, chunk)) = queue.recv().await {
        let event = match codec.decode(&chunk) {
            Ok(buffer) => SessionEvent::ChunkDecoded { generation, epoch, buffer },
            Err(error) => SessionEvent::DecodeFailed { generation, error },
        };
        if events.send(event).is_err() {
            break;
        }
    }
}
