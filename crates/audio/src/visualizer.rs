//! Fenêtre glissante d'amplitudes pour le visualiseur
//!
//! Chaque frame capturée ajoute une barre `amplitude * échelle + plancher`
//! à droite, la plus ancienne sort à gauche. La fenêtre a toujours
//! exactement `bars` entrées : au repos, toutes valent le plancher.

use std::collections::VecDeque;

use crate::AudioConfig;

#[derive(Clone, Debug, PartialEq)]
pub struct VisualizerWindow {
    values: VecDeque<f32>,
    bars: usize,
    scale: f32,
    floor: f32,
}

impl VisualizerWindow {
    /// Crée une fenêtre plate de `bars` entrées
    ///
    /// Une fenêtre a au moins une barre.
    pub fn new(bars: usize, scale: f32, floor: f32) -> Self {
        let bars = bars.max(1);
        Self {
            values: std::iter::repeat_n(floor, bars).collect(),
            bars,
            scale,
            floor,
        }
    }

    pub fn from_config(config: &AudioConfig) -> Self {
        Self::new(config.visualizer_bars, config.visualizer_scale, config.visualizer_floor)
    }

    /// Ajoute l'amplitude d'une nouvelle frame
    pub fn push_amplitude(&mut self, amplitude: f32) {
        self.values.push_back(amplitude * self.scale + self.floor);
        while self.values.len() > self.bars {
            self.values.pop_front();
        }
    }

    /// Remet toutes les barres au plancher
    pub fn reset(&mut self) {
        self.values.iter_mut().for_each(|v| *v = self.floor);
    }

    /// Copie des valeurs, de la plus ancienne à la plus récente
    pub fn values(&self) -> Vec<f32> {
        self.values.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn floor(&self) -> f32 {
        self.floor
    }

    /// Vrai si toutes les barres sont au plancher
    pub fn is_flat(&self) -> bool {
        self.values.iter().all(|&v| v == self.floor)
    }
}

impl Default for VisualizerWindow {
    fn default() -> Self {
        Self::from_config(&AudioConfig::default())
    }
}
