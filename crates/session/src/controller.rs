//! Boucle de session pilotée par commandes
//!
//! La session tourne dans sa propre tâche ; l'interface n'en garde qu'un
//! `SessionController` pour envoyer des commandes et lire les instantanés.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::{SessionCommand, SessionError, SessionResult, SessionSnapshot, SessionState, VoiceSession};

/// Handle de pilotage d'une session lancée avec `VoiceSession::spawn`
#[derive(Clone)]
pub struct SessionController {
    commands: mpsc::UnboundedSender<SessionCommand>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl SessionController {
    pub fn send(&self, command: SessionCommand) -> SessionResult<()> {
        self.commands.send(command).map_err(|_| SessionError::Shutdown)
    }

    /// L'unique action utilisateur : démarrer ou arrêter
    pub fn toggle(&self) -> SessionResult<()> {
        self.send(SessionCommand::Toggle)
    }

    pub fn start(&self) -> SessionResult<()> {
        self.send(SessionCommand::Start)
    }

    pub fn stop(&self) -> SessionResult<()> {
        self.send(SessionCommand::Stop)
    }

    pub fn shutdown(&self) -> SessionResult<()> {
        self.send(SessionCommand::Shutdown)
    }

    /// Dernier instantané publié
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }
}

impl VoiceSession {
    /// Lance la boucle de session dans une tâche tokio
    pub fn spawn(self) -> (SessionController, JoinHandle<()>) {
        let (commands, queue) = mpsc::unbounded_channel();
        let controller = SessionController {
            commands,
            snapshots: self.subscribe(),
        };
        let task = tokio::spawn(self.run(queue));
        (controller, task)
    }

    /// Boucle principale : commandes et événements, un à la fois
    ///
    /// Se termine sur `Shutdown` ou quand tous les contrôleurs sont
    /// détruits ; la session est alors arrêtée.
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<SessionCommand>) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(SessionCommand::Shutdown) | None => break,
                    Some(command) => self.apply(command),
                },
                Some(event) = self.next_event() => self.handle_event(event),
            }
        }

        self.stop();
        info!("Boucle de session terminée");
    }

    /// Applique une commande utilisateur
    pub fn apply(&mut self, command: SessionCommand) {
        debug!("Commande {:?} (session {})", command, self.state());

        match command {
            SessionCommand::Toggle => match self.state() {
                SessionState::Idle => {
                    let _ = self.start();
                }
                SessionState::Active => self.stop(),
                SessionState::Connecting => debug!("Connexion en cours, bascule ignorée"),
            },
            SessionCommand::Start => {
                let _ = self.start();
            }
            SessionCommand::Stop => self.stop(),
            SessionCommand::Shutdown => self.stop(),
        }
    }
}
