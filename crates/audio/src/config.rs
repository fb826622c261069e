//! Configuration audio pour l'agent vocal
//!
//! Ce module définit tous les paramètres audio utilisés par la session.
//! Les fréquences d'entrée et de sortie sont imposées par l'agent distant :
//! il attend du PCM16 à 16 kHz et répond en PCM16 à 24 kHz.

use serde::{Deserialize, Serialize};

/// Échantillons par frame capturée, fixé par le format de l'agent
pub const FRAME_SIZE: usize = 4096;

/// Nombre de barres du visualiseur
pub const VISUALIZER_BARS: usize = 20;

/// Configuration principale pour tout le système audio
///
/// Cette structure contient tous les paramètres nécessaires pour configurer :
/// - La capture audio (microphone)
/// - La lecture audio (haut-parleurs)
/// - Le visualiseur d'amplitude
///
/// `#[derive(Serialize, Deserialize)]` : Permet de sauvegarder/charger depuis un fichier
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Fréquence d'échantillonnage de la capture en Hz
    ///
    /// 16000 Hz = format attendu par l'agent distant
    pub input_sample_rate: u32,

    /// Fréquence d'échantillonnage de l'audio reçu en Hz
    ///
    /// 24000 Hz = format de la voix synthétisée renvoyée par l'agent
    pub output_sample_rate: u32,

    /// Nombre de canaux audio envoyés et reçus
    ///
    /// L'agent ne travaille qu'en mono
    pub channels: u16,

    /// Nombre d'échantillons par frame capturée
    ///
    /// 4096 échantillons à 16 kHz = 256ms de voix par chunk envoyé
    pub frame_size: usize,

    /// Profondeur de la file entre le callback cpal et la boucle de session
    ///
    /// Si la boucle prend du retard, les frames en trop sont perdues
    /// plutôt que de bloquer le thread audio temps réel
    pub capture_queue_depth: usize,

    /// Nombre de barres du visualiseur
    pub visualizer_bars: usize,

    /// Facteur appliqué à l'amplitude moyenne avant affichage
    pub visualizer_scale: f32,

    /// Valeur plancher d'une barre (ligne plate au repos)
    pub visualizer_floor: f32,
}

impl Default for AudioConfig {
    /// Configuration par défaut alignée sur le format de l'agent distant
    fn default() -> Self {
        Self {
            input_sample_rate: 16000,   // 16 kHz - entrée de l'agent
            output_sample_rate: 24000,  // 24 kHz - sortie de l'agent
            channels: 1,                // Mono pour la voix
            frame_size: FRAME_SIZE,     // 256ms par frame
            capture_queue_depth: 8,     // ~2s de marge
            visualizer_bars: VISUALIZER_BARS,
            visualizer_scale: 100.0,
            visualizer_floor: 5.0,
        }
    }
}

impl AudioConfig {
    /// Durée d'une frame capturée en millisecondes
    ///
    /// Formule : frame_size * 1000 / input_sample_rate
    /// Exemple : 4096 * 1000 / 16000 = 256ms
    pub fn frame_duration_ms(&self) -> f32 {
        self.frame_size as f32 * 1000.0 / self.input_sample_rate as f32
    }

    /// Taille en bytes d'une frame une fois encodée en PCM16
    pub fn encoded_frame_bytes(&self) -> usize {
        self.frame_size * self.channels as usize * 2
    }

    /// Valide que la configuration est cohérente
    ///
    /// Vérifie que tous les paramètres sont dans des plages acceptables
    pub fn validate(&self) -> Result<(), String> {
        for (name, rate) in [("entrée", self.input_sample_rate), ("sortie", self.output_sample_rate)] {
            if !(8000..=48000).contains(&rate) {
                return Err(format!("Sample rate {} invalide: {} (doit être entre 8000 et 48000)", name, rate));
            }
        }

        if self.channels != 1 {
            return Err(format!("Nombre de canaux invalide: {} (l'agent n'accepte que du mono)", self.channels));
        }

        if self.frame_size != FRAME_SIZE {
            return Err(format!("Taille de frame invalide: {} (doit être {})", self.frame_size, FRAME_SIZE));
        }

        if self.capture_queue_depth == 0 {
            return Err("La file de capture doit contenir au moins une frame".to_string());
        }

        if self.visualizer_bars != VISUALIZER_BARS {
            return Err(format!(
                "Nombre de barres invalide: {} (doit être {})", self.visualizer_bars, VISUALIZER_BARS
            ));
        }

        if !self.visualizer_scale.is_finite() || !self.visualizer_floor.is_finite() {
            return Err("Échelle et plancher du visualiseur doivent être finis".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AudioConfig::default();

        assert_eq!(config.frame_duration_ms(), 256.0);
        assert_eq!(config.encoded_frame_bytes(), 8192);
        assert_eq!(config.visualizer_bars, 20);

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let mut config = AudioConfig::default();

        config.input_sample_rate = 1000; // Trop bas
        assert!(config.validate().is_err());

        config.input_sample_rate = 16000;
        config.channels = 2; // Stéréo refusé
        assert!(config.validate().is_err());

        config.channels = 1;
        config.frame_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fixed_sizes_enforced() {
        let mut config = AudioConfig::default();
        config.frame_size = 1024;
        assert!(config.validate().is_err());

        config.frame_size = FRAME_SIZE;
        config.visualizer_bars = 12;
        assert!(config.validate().is_err());

        config.visualizer_bars = VISUALIZER_BARS;
        assert!(config.validate().is_ok());
    }
}
