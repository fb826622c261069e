//! Planification sans trou des buffers reçus
//!
//! Le planificateur tient un curseur `next_start_time` sur l'horloge de
//! sortie. Chaque buffer commence à `max(maintenant, curseur)` puis avance
//! le curseur de sa durée : les chunks s'enchaînent bout à bout sans se
//! chevaucher, et un chunk en retard part tout de suite sans silence ajouté.
//!
//! Le curseur ne recule jamais, sauf lors d'une annulation (interruption
//! ou arrêt) où il revient à 0.

use std::collections::BTreeMap;

use tracing::debug;

use crate::{AudioOutput, AudioResult, DecodedBuffer, PlaybackSource, SourceId};

#[derive(Debug, Default)]
pub struct PlaybackScheduler {
    /// Prochain instant libre sur la timeline de sortie
    next_start_time: f64,

    /// Sources planifiées et pas encore terminées
    live: BTreeMap<SourceId, PlaybackSource>,

    /// Compteur d'identifiants, jamais réutilisés
    next_id: u64,
}

impl PlaybackScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Planifie un buffer décodé à la suite des précédents
    ///
    /// La source est enregistrée dans l'ensemble vivant ; elle en sort via
    /// `source_ended` (fin naturelle) ou `cancel_all` (interruption, arrêt).
    ///
    /// # Erreurs
    /// - `AudioError::ContextClosed` si la sortie est fermée ; le curseur
    ///   et l'ensemble vivant restent alors inchangés
    pub fn schedule(
        &mut self,
        output: &mut dyn AudioOutput,
        buffer: DecodedBuffer,
    ) -> AudioResult<PlaybackSource> {
        let now = output.current_time();
        let start_time = now.max(self.next_start_time);
        let duration = buffer.duration_secs();

        let id = SourceId(self.next_id);
        output.schedule(id, buffer, start_time)?;
        self.next_id += 1;

        let source = PlaybackSource { id, start_time, duration };
        self.live.insert(id, source);
        self.next_start_time = start_time + duration;

        debug!(
            "▶️  {} planifiée à {:.3}s (durée {:.3}s, horloge {:.3}s)",
            id, start_time, duration, now
        );
        Ok(source)
    }

    /// Retire une source arrivée au bout de son buffer
    ///
    /// Retourne `false` si la source n'était plus vivante (déjà annulée).
    pub fn source_ended(&mut self, id: SourceId) -> bool {
        self.live.remove(&id).is_some()
    }

    /// Arrête de force toutes les sources vivantes et remet le curseur à 0
    ///
    /// Sans sortie (contexte déjà libéré), l'ensemble est simplement vidé.
    /// Retourne le nombre de sources annulées.
    pub fn cancel_all(&mut self, output: Option<&mut dyn AudioOutput>) -> usize {
        let cancelled = self.live.len();

        if let Some(output) = output {
            for id in self.live.keys() {
                output.stop_source(*id);
            }
        }

        self.live.clear();
        self.next_start_time = 0.0;
        cancelled
    }

    pub fn next_start_time(&self) -> f64 {
        self.next_start_time
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn is_live(&self, id: SourceId) -> bool {
        self.live.contains_key(&id)
    }

    /// Sources vivantes dans l'ordre de planification
    pub fn live_sources(&self) -> impl Iterator<Item = &PlaybackSource> {
        self.live.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AudioError;

    /// Sortie factice dont l'horloge est pilotée par le test
    #[derive(Default)]
    struct ClockOutput {
        now: f64,
        scheduled: Vec<(SourceId, f64)>,
        stopped: Vec<SourceId>,
        closed: bool,
    }

    impl AudioOutput for ClockOutput {
        fn current_time(&self) -> f64 {
            self.now
        }

        fn schedule(&mut self, id: SourceId, _buffer: DecodedBuffer, start_time: f64) -> AudioResult<()> {
            if self.closed {
                return Err(AudioError::ContextClosed);
            }
            self.scheduled.push((id, start_time));
            Ok(())
        }

        fn stop_source(&mut self, id: SourceId) {
            self.stopped.push(id);
        }

        fn close(&mut self) {
            self.closed = true;
        }

        fn is_closed(&self) -> bool {
            self.closed
        }
    }

    fn buffer(seconds: f64) -> DecodedBuffer {
        DecodedBuffer::new(vec![0.0; (seconds * 24000.0) as usize], 24000)
    }

    #[test]
    fn test_back_to_back_without_gap() {
        let mut output = ClockOutput::default();
        let mut scheduler = PlaybackScheduler::new();

        let durations = [0.5, 0.25, 1.0, 0.125];
        let mut sources = Vec::new();
        for (i, d) in durations.iter().enumerate() {
            // L'horloge avance moins vite que l'audio planifié
            output.now = i as f64 * 0.1;
            sources.push(scheduler.schedule(&mut output, buffer(*d)).unwrap());
        }

        for pair in sources.windows(2) {
            assert!(pair[1].start_time >= pair[0].start_time);
            assert!((pair[1].start_time - pair[0].end_time()).abs() < 1e-9);
        }
        assert!((scheduler.next_start_time() - 1.875).abs() < 1e-9);
        assert_eq!(scheduler.live_count(), 4);
    }

    #[test]
    fn test_late_chunk_starts_now() {
        let mut output = ClockOutput::default();
        let mut scheduler = PlaybackScheduler::new();

        scheduler.schedule(&mut output, buffer(0.5)).unwrap();

        // Le chunk suivant arrive bien après la fin du premier
        output.now = 2.0;
        let late = scheduler.schedule(&mut output, buffer(0.5)).unwrap();

        assert_eq!(late.start_time, 2.0);
        assert!((scheduler.next_start_time() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_cancel_all_resets_cursor() {
        let mut output = ClockOutput::default();
        let mut scheduler = PlaybackScheduler::new();

        let a = scheduler.schedule(&mut output, buffer(1.0)).unwrap();
        let b = scheduler.schedule(&mut output, buffer(1.0)).unwrap();

        let cancelled = scheduler.cancel_all(Some(&mut output));
        assert_eq!(cancelled, 2);
        assert_eq!(scheduler.live_count(), 0);
        assert_eq!(scheduler.next_start_time(), 0.0);
        assert_eq!(output.stopped, vec![a.id, b.id]);

        // Après annulation, on repart de l'horloge courante
        output.now = 0.7;
        let next = scheduler.schedule(&mut output, buffer(0.2)).unwrap();
        assert_eq!(next.start_time, 0.7);
    }

    #[test]
    fn test_source_ended_removes_once() {
        let mut output = ClockOutput::default();
        let mut scheduler = PlaybackScheduler::new();

        let source = scheduler.schedule(&mut output, buffer(0.1)).unwrap();
        assert!(scheduler.is_live(source.id));
        assert!(scheduler.source_ended(source.id));
        assert!(!scheduler.source_ended(source.id));
        assert_eq!(scheduler.live_count(), 0);
    }

    #[test]
    fn test_closed_output_leaves_state_untouched() {
        let mut output = ClockOutput { closed: true, ..Default::default() };
        let mut scheduler = PlaybackScheduler::new();

        assert!(scheduler.schedule(&mut output, buffer(0.5)).is_err());
        assert_eq!(scheduler.live_count(), 0);
        assert_eq!(scheduler.next_start_time(), 0.0);
    }

    #[test]
    fn test_cancel_without_output() {
        let mut output = ClockOutput::default();
        let mut scheduler = PlaybackScheduler::new();
        scheduler.schedule(&mut output, buffer(0.5)).unwrap();

        assert_eq!(scheduler.cancel_all(None), 1);
        assert_eq!(scheduler.live_count(), 0);
        assert_eq!(scheduler.cancel_all(None), 0);
    }
}
