//! Gestion des interruptions (barge-in)
//!
//! Quand l'utilisateur coupe la parole à l'agent, tout ce qui est planifié
//! doit se taire immédiatement. Le décodage étant asynchrone, un chunk
//! peut encore être en cours de décodage au moment de l'interruption :
//! chaque chunk est donc étiqueté avec l'époque courante, et un chunk
//! d'une époque passée n'est jamais planifié.

use tracing::info;

use audio::{AudioOutput, PlaybackScheduler};

#[derive(Debug, Default)]
pub struct InterruptionHandler {
    epoch: u64,
    interruptions: u64,
}

impl InterruptionHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Époque à associer aux chunks reçus maintenant
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Vérifie qu'un chunk n'a pas été reçu avant la dernière interruption
    pub fn is_current(&self, epoch: u64) -> bool {
        epoch == self.epoch
    }

    pub fn interruptions(&self) -> u64 {
        self.interruptions
    }

    /// Coupe toutes les sources vivantes et ouvre une nouvelle époque
    ///
    /// Retourne le nombre de sources coupées.
    pub fn interrupt(
        &mut self,
        scheduler: &mut PlaybackScheduler,
        output: Option<&mut dyn AudioOutput>,
    ) -> usize {
        self.epoch += 1;
        self.interruptions += 1;

        let cancelled = scheduler.cancel_all(output);
        info!("✋ Interruption: {} source(s) coupée(s)", cancelled);
        cancelled
    }
}
