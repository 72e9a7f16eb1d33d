//! Hyperparameters for the generator, the discriminator and the trainer

use crate::error::{GanError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Config for specifying the architecture and training parameters of a GAN
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GanConfig {
    pub latent_dim: usize,
    pub data_dim: usize,
    pub generator_hidden: Vec<usize>,
    pub discriminator_hidden: Vec<usize>,
    /// Negative-slope coefficient of every leaky activation
    pub leaky_slope: f64,
    /// Drop probability of the discriminator's dropout layers
    pub dropout: f32,
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub eps: f64,
    pub batch_size: usize,
    pub seed: u64,
    pub log_every: usize,
    pub abort_on_divergence: bool,
}

impl Default for GanConfig {
    /// Returns the 100 -> 784 fully-connected GAN configuration
    fn default() -> Self {
        Self {
            latent_dim: 100,
            data_dim: 784,
            generator_hidden: vec![256, 512, 1_024],
            discriminator_hidden: vec![1_024, 512, 256],
            leaky_slope: 0.2,
            dropout: 0.3,
            learning_rate: 0.0002,
            beta1: 0.5,
            beta2: 0.999,
            eps: 1e-8,
            batch_size: 64,
            seed: 42,
            log_every: 1,
            abort_on_divergence: true,
        }
    }
}

impl GanConfig {
    /// Returns a custom configuration to be used in unit tests
    pub fn small_test() -> Self {
        Self {
            latent_dim: 8,
            data_dim: 12,
            generator_hidden: vec![16, 24, 32],
            discriminator_hidden: vec![32, 24, 16],
            batch_size: 4,
            ..Default::default()
        }
    }

    /// Loads a config from a JSON file. Missing fields take their default values.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let cfg: GanConfig = serde_json::from_reader(reader)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.latent_dim == 0 || self.data_dim == 0 {
            return Err(GanError::InvalidConfig(
                "latent_dim and data_dim must be positive".to_string(),
            ));
        }
        for (name, hidden) in [
            ("generator_hidden", &self.generator_hidden),
            ("discriminator_hidden", &self.discriminator_hidden),
        ] {
            if hidden.is_empty() || hidden.contains(&0) {
                return Err(GanError::InvalidConfig(format!(
                    "{name} must be a non-empty list of positive sizes"
                )));
            }
        }
        if !(0.0..1.0).contains(&self.leaky_slope) {
            return Err(GanError::InvalidConfig(format!(
                "leaky_slope must lie in [0, 1), got {}",
                self.leaky_slope
            )));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(GanError::InvalidConfig(format!(
                "dropout must lie in [0, 1), got {}",
                self.dropout
            )));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(GanError::InvalidConfig(format!(
                "learning_rate must be positive and finite, got {}",
                self.learning_rate
            )));
        }
        if !self.eps.is_finite() || self.eps < 0.0 {
            return Err(GanError::InvalidConfig(format!(
                "eps must be non-negative and finite, got {}",
                self.eps
            )));
        }
        if !(0.0..1.0).contains(&self.beta1) || !(0.0..1.0).contains(&self.beta2) {
            return Err(GanError::InvalidConfig(
                "beta1 and beta2 must lie in [0, 1)".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(GanError::InvalidConfig(
                "batch_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
