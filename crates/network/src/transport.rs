//! Passerelles vers l'agent distant
//!
//! - WebSocketGateway : canal WebSocket (TLS) vers le service de conversation
//! - SimulatedGateway : canal en mémoire pour tester la session sans réseau

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use audio::EncodedChunk;

use crate::{
    ClientMessage, EventSink, Gateway, GatewayConfig, GatewayEvent, GatewayHandle,
    NetworkError, NetworkResult, ServerMessage,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Passerelle WebSocket vers le service de conversation
///
/// # Architecture
/// - Une tâche d'écriture vide une file bornée de messages sortants
/// - Une tâche de lecture traduit les messages serveur en événements
/// - `send` ne fait qu'un `try_send` sur la file : jamais d'attente
///
/// # Example
/// ```rust,no_run
/// use std::sync::Arc;
/// use network::{Gateway, GatewayConfig, WebSocketGateway};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = GatewayConfig::default().with_api_key("...");
/// let handle = WebSocketGateway::new()
///     .connect(&config, Arc::new(|event| println!("{:?}", event.kind())))
///     .await?;
///
/// handle.close();
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct WebSocketGateway;

impl WebSocketGateway {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Gateway for WebSocketGateway {
    async fn connect(
        &self,
        config: &GatewayConfig,
        events: EventSink,
    ) -> NetworkResult<Box<dyn GatewayHandle>> {
        config.validate().map_err(NetworkError::ConfigError)?;

        info!("Connexion à l'agent ({}, voix {})", config.model, config.voice_name);

        // L'URL contient la clé : seul l'endpoint apparaît dans les erreurs
        let (stream, _response) = connect_async(config.connect_url())
            .await
            .map_err(|e| NetworkError::connect_failed(&config.endpoint, e))?;

        let (mut sink, source) = stream.split();

        let setup = ClientMessage::setup(config).to_json()?;
        sink.send(Message::Text(setup.into()))
            .await
            .map_err(|e| NetworkError::connect_failed(&config.endpoint, e))?;

        debug!("Message de setup envoyé, en attente de setupComplete");

        let (outbound, queue) = mpsc::channel(config.outbound_queue_depth);
        let closed = Arc::new(AtomicBool::new(false));

        let writer = tokio::spawn(write_loop(sink, queue));
        let reader = tokio::spawn(read_loop(source, events, closed.clone()));

        Ok(Box::new(WebSocketHandle {
            outbound,
            capacity: config.outbound_queue_depth,
            closed,
            reader,
            writer,
        }))
    }

    fn name(&self) -> &'static str {
        "websocket"
    }
}

/// Vide la file sortante vers le socket
async fn write_loop(mut sink: SplitSink<WsStream, Message>, mut queue: mpsc::Receiver<Message>) {
    while let Some(message) = queue.recv().await {
        let closing = matches!(message, Message::Close(_));

        if let Err(e) = sink.send(message).await {
            debug!("Écriture WebSocket interrompue: {}", e);
            break;
        }
        if closing {
            break;
        }
    }

    let _ = sink.close().await;
}

/// Traduit les messages du serveur en événements
async fn read_loop(mut source: SplitStream<WsStream>, events: EventSink, closed: Arc<AtomicBool>) {
    while let Some(frame) = source.next().await {
        if closed.load(Ordering::SeqCst) {
            return;
        }

        match frame {
            Ok(Message::Text(text)) => dispatch(text.as_str(), &events),
            Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                Ok(text) => dispatch(text, &events),
                Err(_) => warn!("Trame binaire non UTF-8 ignorée ({} octets)", bytes.len()),
            },
            Ok(Message::Close(frame)) => {
                match frame {
                    Some(frame) => info!("Canal fermé par l'agent: {} {}", frame.code, frame.reason),
                    None => info!("Canal fermé par l'agent"),
                }
                if !closed.swap(true, Ordering::SeqCst) {
                    events(GatewayEvent::Closed);
                }
                return;
            }
            // ping/pong gérés par tungstenite
            Ok(_) => {}
            Err(e) => {
                error!("Erreur WebSocket: {}", e);
                if !closed.swap(true, Ordering::SeqCst) {
                    events(GatewayEvent::Errored(e.to_string()));
                }
                return;
            }
        }
    }

    if !closed.swap(true, Ordering::SeqCst) {
        events(GatewayEvent::Closed);
    }
}

fn dispatch(text: &str, events: &EventSink) {
    match ServerMessage::parse(text) {
        Ok(message) => {
            for event in message.into_events() {
                events(event);
            }
        }
        Err(e) => warn!("Message serveur ignoré: {}", e),
    }
}

/// Handle d'un canal WebSocket ouvert
pub struct WebSocketHandle {
    outbound: mpsc::Sender<Message>,
    capacity: usize,
    closed: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl GatewayHandle for WebSocketHandle {
    fn send(&self, chunk: EncodedChunk) -> NetworkResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(NetworkError::ChannelClosed);
        }

        let text = ClientMessage::realtime_audio(&chunk).to_json()?;
        self.outbound
            .try_send(Message::Text(text.into()))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => NetworkError::QueueFull { capacity: self.capacity },
                mpsc::error::TrySendError::Closed(_) => NetworkError::ChannelClosed,
            })
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.reader.abort();
        // File pleine : on coupe sans trame de fermeture
        if self.outbound.try_send(Message::Close(None)).is_err() {
            self.writer.abort();
        }
        debug!("Canal WebSocket fermé localement");
    }
}

impl Drop for WebSocketHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// Paramètres de la passerelle simulée
#[derive(Clone, Debug)]
pub struct SimulationSettings {
    /// La connexion échoue systématiquement
    pub fail_connect: bool,

    /// `Opened` est émis dès la connexion (sinon, appeler `open()`)
    pub auto_open: bool,

    /// `connect` attend `release_connect()` avant de répondre
    pub hold_connect: bool,

    /// Probabilité de perdre un chunk envoyé (0.0 à 1.0)
    pub loss_rate: f32,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            fail_connect: false,
            auto_open: true,
            hold_connect: false,
            loss_rate: 0.0,
        }
    }
}

#[derive(Default)]
struct SimulatedState {
    settings: Mutex<SimulationSettings>,

    /// Récepteur du canal courant, retiré à la fermeture
    sink: Mutex<Option<(usize, EventSink)>>,

    sent: Mutex<Vec<EncodedChunk>>,
    last_config: Mutex<Option<GatewayConfig>>,
    connects: AtomicUsize,
    closes: AtomicUsize,
    release: Notify,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Passerelle en mémoire pour les tests
///
/// Les clones partagent le même état : le test garde un clone pour
/// injecter des événements et inspecter les chunks envoyés.
#[derive(Clone, Default)]
pub struct SimulatedGateway {
    state: Arc<SimulatedState>,
}

impl SimulatedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: SimulationSettings) -> Self {
        let gateway = Self::new();
        *lock(&gateway.state.settings) = settings;
        gateway
    }

    pub fn set_fail_connect(&self, fail: bool) {
        lock(&self.state.settings).fail_connect = fail;
    }

    pub fn set_auto_open(&self, auto_open: bool) {
        lock(&self.state.settings).auto_open = auto_open;
    }

    pub fn set_hold_connect(&self, hold: bool) {
        lock(&self.state.settings).hold_connect = hold;
    }

    pub fn set_loss_rate(&self, loss_rate: f32) {
        lock(&self.state.settings).loss_rate = loss_rate.clamp(0.0, 1.0);
    }

    /// Débloque un `connect` en attente (ou le prochain)
    pub fn release_connect(&self) {
        self.state.release.notify_one();
    }

    /// Émet un événement sur le canal courant
    ///
    /// Retourne `false` si aucun canal n'est ouvert.
    pub fn emit(&self, event: GatewayEvent) -> bool {
        let sink = lock(&self.state.sink).as_ref().map(|(_, sink)| sink.clone());
        match sink {
            Some(sink) => {
                sink(event);
                true
            }
            None => false,
        }
    }

    pub fn open(&self) -> bool {
        self.emit(GatewayEvent::Opened)
    }

    pub fn deliver(&self, chunk: EncodedChunk) -> bool {
        self.emit(GatewayEvent::MessageReceived(chunk))
    }

    pub fn interrupt(&self) -> bool {
        self.emit(GatewayEvent::Interrupted)
    }

    pub fn fail(&self, reason: &str) -> bool {
        self.emit(GatewayEvent::Errored(reason.to_string()))
    }

    pub fn close_remote(&self) -> bool {
        self.emit(GatewayEvent::Closed)
    }

    /// Chunks reçus par la passerelle, dans l'ordre d'envoi
    pub fn sent_chunks(&self) -> Vec<EncodedChunk> {
        lock(&self.state.sent).clone()
    }

    pub fn connect_count(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    /// Vérifie si un canal est ouvert
    pub fn is_connected(&self) -> bool {
        lock(&self.state.sink).is_some()
    }

    pub fn last_config(&self) -> Option<GatewayConfig> {
        lock(&self.state.last_config).clone()
    }
}

#[async_trait]
impl Gateway for SimulatedGateway {
    async fn connect(
        &self,
        config: &GatewayConfig,
        events: EventSink,
    ) -> NetworkResult<Box<dyn GatewayHandle>> {
        let connection = self.state.connects.fetch_add(1, Ordering::SeqCst) + 1;
        *lock(&self.state.last_config) = Some(config.clone());

        let settings = lock(&self.state.settings).clone();
        if settings.hold_connect {
            self.state.release.notified().await;
        }
        if settings.fail_connect {
            return Err(NetworkError::connect_failed(&config.endpoint, "connexion simulée refusée"));
        }

        *lock(&self.state.sink) = Some((connection, events));
        debug!("Canal simulé #{} ouvert", connection);

        if settings.auto_open {
            self.open();
        }

        Ok(Box::new(SimulatedHandle {
            state: self.state.clone(),
            connection,
            closed: AtomicBool::new(false),
        }))
    }

    fn name(&self) -> &'static str {
        "simulée"
    }
}

/// Handle d'un canal simulé
pub struct SimulatedHandle {
    state: Arc<SimulatedState>,
    connection: usize,
    closed: AtomicBool,
}

impl GatewayHandle for SimulatedHandle {
    fn send(&self, chunk: EncodedChunk) -> NetworkResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(NetworkError::ChannelClosed);
        }

        let loss_rate = lock(&self.state.settings).loss_rate;
        if loss_rate > 0.0 && fastrand::f32() < loss_rate {
            return Err(NetworkError::ChunkLost { sequence: chunk.sequence_number });
        }

        lock(&self.state.sent).push(chunk);
        Ok(())
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.state.closes.fetch_add(1, Ordering::SeqCst);

        // Ne retire le récepteur que s'il appartient à ce canal
        let mut sink = lock(&self.state.sink);
        if sink.as_ref().is_some_and(|(connection, _)| *connection == self.connection) {
            *sink = None;
        }
        debug!("Canal simulé #{} fermé", self.connection);
    }
}

impl Drop for SimulatedHandle {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn recording_sink() -> (EventSink, Arc<Mutex<Vec<GatewayEvent>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let target = received.clone();
        let sink: EventSink = Arc::new(move |event| lock(&target).push(event));
        (sink, received)
    }

    #[tokio::test]
    async fn test_simulated_connect_auto_open() {
        let gateway = SimulatedGateway::new();
        let (sink, received) = recording_sink();

        let handle = assert_ok!(gateway.connect(&GatewayConfig::default(), sink).await);

        assert_eq!(gateway.connect_count(), 1);
        assert!(gateway.is_connected());
        assert_eq!(*lock(&received), vec![GatewayEvent::Opened]);
        assert_eq!(gateway.last_config().unwrap().voice_name, "Zephyr");

        handle.close();
        handle.close();
        assert_eq!(gateway.close_count(), 1);
        assert!(!gateway.is_connected());
    }

    #[tokio::test]
    async fn test_simulated_connect_failure() {
        let gateway = SimulatedGateway::with_settings(SimulationSettings {
            fail_connect: true,
            ..Default::default()
        });
        let (sink, received) = recording_sink();

        let result = gateway.connect(&GatewayConfig::default(), sink).await;
        assert!(matches!(result, Err(NetworkError::ConnectError { .. })));
        assert!(lock(&received).is_empty());
        assert!(!gateway.is_connected());
    }

    #[tokio::test]
    async fn test_simulated_manual_open_and_events() {
        let gateway = SimulatedGateway::new();
        gateway.set_auto_open(false);
        let (sink, received) = recording_sink();

        let _handle = assert_ok!(gateway.connect(&GatewayConfig::default(), sink).await);
        assert!(lock(&received).is_empty());

        assert!(gateway.open());
        assert!(gateway.deliver(EncodedChunk::base64("AAAA", 24000)));
        assert!(gateway.interrupt());
        assert!(gateway.close_remote());

        let events = lock(&received).clone();
        let kinds: Vec<_> = events.iter().map(GatewayEvent::kind).collect();
        assert_eq!(kinds, vec!["opened", "message", "interrupted", "closed"]);
    }

    #[tokio::test]
    async fn test_simulated_no_events_after_close() {
        let gateway = SimulatedGateway::new();
        let (sink, received) = recording_sink();

        let handle = assert_ok!(gateway.connect(&GatewayConfig::default(), sink).await);
        handle.close();

        assert!(!gateway.interrupt());
        assert_eq!(lock(&received).len(), 1); // seulement Opened
        assert!(matches!(
            handle.send(EncodedChunk::pcm16(vec![0, 0], 16000, 1)),
            Err(NetworkError::ChannelClosed)
        ));
    }

    #[tokio::test]
    async fn test_simulated_records_and_loses_chunks() {
        let gateway = SimulatedGateway::new();
        let (sink, _received) = recording_sink();
        let handle = assert_ok!(gateway.connect(&GatewayConfig::default(), sink).await);

        assert_ok!(handle.send(EncodedChunk::pcm16(vec![1, 0], 16000, 1)));
        assert_ok!(handle.send(EncodedChunk::pcm16(vec![2, 0], 16000, 2)));

        gateway.set_loss_rate(1.0);
        let lost = assert_err!(handle.send(EncodedChunk::pcm16(vec![3, 0], 16000, 3)));
        assert!(lost.is_per_chunk());

        let sequences: Vec<_> = gateway.sent_chunks().iter().map(|c| c.sequence_number).collect();
        assert_eq!(sequences, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_stale_handle_close_keeps_new_channel() {
        let gateway = SimulatedGateway::new();
        let (first_sink, _) = recording_sink();
        let (second_sink, second_events) = recording_sink();

        let first = assert_ok!(gateway.connect(&GatewayConfig::default(), first_sink).await);
        let _second = assert_ok!(gateway.connect(&GatewayConfig::default(), second_sink).await);

        first.close();
        assert!(gateway.is_connected());
        assert!(gateway.interrupt());
        assert_eq!(lock(&second_events).last(), Some(&GatewayEvent::Interrupted));
    }

    #[tokio::test]
    async fn test_simulated_hold_connect() {
        let gateway = SimulatedGateway::new();
        gateway.set_hold_connect(true);
        let (sink, _) = recording_sink();

        let pending = {
            let gateway = gateway.clone();
            tokio::spawn(async move {
                gateway.connect(&GatewayConfig::default(), sink).await.map(|_| ())
            })
        };

        tokio::task::yield_now().await;
        assert!(!gateway.is_connected());

        gateway.release_connect();
        assert_ok!(pending.await.unwrap());
        assert_eq!(gateway.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_websocket_rejects_invalid_config() {
        let gateway = WebSocketGateway::new();
        let (sink, _) = recording_sink();
        let config = GatewayConfig { endpoint: "http://localhost".to_string(), ..Default::default() };

        let result = gateway.connect(&config, sink).await;
        assert!(matches!(result, Err(NetworkError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_websocket_unreachable_endpoint() {
        let gateway = WebSocketGateway::new();
        let (sink, received) = recording_sink();
        // Port 9 (discard) : connexion refusée en local
        let config = GatewayConfig { endpoint: "ws://127.0.0.1:9".to_string(), ..Default::default() };

        let result = gateway.connect(&config, sink).await;
        assert!(matches!(result, Err(NetworkError::ConnectError { .. })));
        assert!(lock(&received).is_empty());
    }
}
