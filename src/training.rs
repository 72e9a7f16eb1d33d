//! Adversarial training of a `Generator` against a `Discriminator`
//!
//! A step is two strictly sequential phases:
//! 1. the discriminator is updated on a real batch (label 1) and a detached
//!    generated batch (label 0);
//! 2. the generator is updated so that the freshly updated discriminator
//!    labels a new generated batch as real.
//!
//! Each model has its own optimizer built from its own variables only.

use crate::candle_addons::{binary_cross_entropy_with_logits, Sigmoid};
use crate::config::GanConfig;
use crate::discriminator::Discriminator;
use crate::error::{GanError, Phase, Result};
use crate::generator::Generator;
use candle_core::{Device, Module, Tensor};
use candle_nn::{AdamW, Optimizer, ParamsAdamW};
use comfy_table::Table;
use log::{debug, info, warn};
use plotly::{common::Mode, Plot, Scatter};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Supplier of batches of real data vectors, shaped `(batch_size, data_dim)`
pub trait RealDataSource {
    fn next_batch(&mut self, batch_size: usize, dev: &Device) -> Result<Tensor>;
}

/// Placeholder source of standard-normal "real" data
pub struct GaussianSource {
    data_dim: usize,
    rng: StdRng,
}

impl GaussianSource {
    pub fn new(data_dim: usize, seed: u64) -> Self {
        Self {
            data_dim,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl RealDataSource for GaussianSource {
    fn next_batch(&mut self, batch_size: usize, dev: &Device) -> Result<Tensor> {
        let values: Vec<f32> = (0..batch_size * self.data_dim)
            .map(|_| self.rng.sample(StandardNormal))
            .collect();
        Ok(Tensor::from_vec(values, (batch_size, self.data_dim), dev)?)
    }
}

/// Outcome of a discriminator update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiscriminatorPhase {
    /// BCE(D(real), 1) + BCE(D(G(z)), 0), computed before the update
    pub loss: f32,
    /// Mean score given to the real batch
    pub real_score: f32,
    /// Mean score given to the generated batch
    pub fake_score: f32,
}

/// Losses and scores of one adversarial step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepLosses {
    pub d_loss: f32,
    pub g_loss: f32,
    pub real_score: f32,
    pub fake_score: f32,
}

/// Per-step record of a training run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    steps: Vec<StepLosses>,
}

impl TrainingHistory {
    pub fn push(&mut self, losses: StepLosses) {
        self.steps.push(losses);
    }

    pub fn steps(&self) -> &[StepLosses] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn d_losses(&self) -> Vec<f32> {
        self.steps.iter().map(|s| s.d_loss).collect()
    }

    pub fn g_losses(&self) -> Vec<f32> {
        self.steps.iter().map(|s| s.g_loss).collect()
    }

    /// Tabulates every step with 1-based step numbers
    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        table.set_header(vec!["step", "D loss", "G loss", "D(x)", "D(G(z))"]);
        for (ix, s) in self.steps.iter().enumerate() {
            table.add_row(vec![
                (ix + 1).to_string(),
                format!("{:.4}", s.d_loss),
                format!("{:.4}", s.g_loss),
                format!("{:.4}", s.real_score),
                format!("{:.4}", s.fake_score),
            ]);
        }
        table
    }

    /// Writes an HTML chart of both loss curves
    pub fn write_plot<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let xs: Vec<usize> = (1..=self.steps.len()).collect();
        let mut plot = Plot::new();
        plot.add_trace(
            Scatter::new(xs.clone(), self.d_losses())
                .mode(Mode::Lines)
                .name("D loss"),
        );
        plot.add_trace(
            Scatter::new(xs, self.g_losses())
                .mode(Mode::Lines)
                .name("G loss"),
        );
        std::fs::write(path, plot.to_html())?;
        Ok(())
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}

/// Owns both models, their optimizers and the latent-noise rng
pub struct AdversarialTrainer {
    cfg: GanConfig,
    device: Device,
    generator: Generator,
    discriminator: Discriminator,
    gen_optimizer: AdamW,
    disc_optimizer: AdamW,
    noise_rng: StdRng,
}

impl AdversarialTrainer {
    /// Builds both models and their optimizers from `cfg`
    ///
    /// Every random stream (both inits, dropout masks, latent noise) is derived
    /// from `cfg.seed`, so two trainers with the same config are identical.
    ///
    /// ```rust
    /// use candle_core::{DType, Device, Tensor};
    /// use gan_from_scratch_rs::{config::GanConfig, training::AdversarialTrainer};
    ///
    /// let cfg = GanConfig::small_test();
    /// let mut trainer = AdversarialTrainer::new(cfg.clone(), &Device::Cpu).unwrap();
    /// let real = Tensor::zeros((cfg.batch_size, cfg.data_dim), DType::F32, &Device::Cpu).unwrap();
    /// let losses = trainer.step(&real).unwrap();
    /// assert!(losses.d_loss >= 0.0 && losses.g_loss >= 0.0);
    /// ```
    pub fn new(cfg: GanConfig, dev: &Device) -> Result<Self> {
        cfg.validate()?;
        let mut master = StdRng::seed_from_u64(cfg.seed);
        let gen_seed: u64 = master.gen();
        let disc_seed: u64 = master.gen();
        let dropout_seed: u64 = master.gen();
        let noise_seed: u64 = master.gen();

        let generator = Generator::new(&cfg, &mut StdRng::seed_from_u64(gen_seed), dev)?;
        let discriminator = Discriminator::new(
            &cfg,
            &mut StdRng::seed_from_u64(disc_seed),
            dropout_seed,
            dev,
        )?;
        let gen_optimizer = AdamW::new(generator.parameters(), adam_params(&cfg))?;
        let disc_optimizer = AdamW::new(discriminator.parameters(), adam_params(&cfg))?;
        debug!(
            "built generator ({} params) and discriminator ({} params)",
            generator.num_parameters(),
            discriminator.num_parameters()
        );

        Ok(Self {
            cfg,
            device: dev.clone(),
            generator,
            discriminator,
            gen_optimizer,
            disc_optimizer,
            noise_rng: StdRng::seed_from_u64(noise_seed),
        })
    }

    /// Samples a `(batch_size, latent_dim)` batch of standard-normal noise
    pub fn sample_latent(&mut self, batch_size: usize) -> Result<Tensor> {
        let latent_dim = self.cfg.latent_dim;
        let values: Vec<f32> = (0..batch_size * latent_dim)
            .map(|_| self.noise_rng.sample(StandardNormal))
            .collect();
        Ok(Tensor::from_vec(
            values,
            (batch_size, latent_dim),
            &self.device,
        )?)
    }

    /// Updates the discriminator only
    ///
    /// The generated batch is detached, so no gradient reaches the generator.
    pub fn discriminator_phase(
        &mut self,
        real: &Tensor,
        latent: &Tensor,
    ) -> Result<DiscriminatorPhase> {
        self.check_real_batch(real)?;
        let real_logits = self.discriminator.logits(real, true)?;
        let fake = self.generator.generate(latent)?.detach();
        let fake_logits = self.discriminator.logits(&fake, true)?;

        let real_loss =
            binary_cross_entropy_with_logits(&real_logits, &real_logits.ones_like()?)?;
        let fake_loss =
            binary_cross_entropy_with_logits(&fake_logits, &fake_logits.zeros_like()?)?;
        let loss = (real_loss + fake_loss)?;
        let real_scores = Sigmoid.forward(&real_logits)?;
        let fake_scores = Sigmoid.forward(&fake_logits)?;

        let outcome = DiscriminatorPhase {
            loss: loss.to_scalar::<f32>()?,
            real_score: real_scores.mean_all()?.to_scalar::<f32>()?,
            fake_score: fake_scores.mean_all()?.to_scalar::<f32>()?,
        };
        self.check_finite(
            Phase::Discriminator,
            &[outcome.loss, outcome.real_score, outcome.fake_score],
        )?;

        self.disc_optimizer.backward_step(&loss)?;
        debug!(
            "discriminator phase: loss {:.4}, D(x) {:.4}, D(G(z)) {:.4}",
            outcome.loss, outcome.real_score, outcome.fake_score
        );
        Ok(outcome)
    }

    /// Updates the generator only, scoring with the current discriminator
    ///
    /// Returns the generator loss `BCE(D(G(z)), 1)` computed before the update.
    pub fn generator_phase(&mut self, latent: &Tensor) -> Result<f32> {
        let fake = self.generator.generate(latent)?;
        let logits = self.discriminator.logits(&fake, true)?;
        let loss = binary_cross_entropy_with_logits(&logits, &logits.ones_like()?)?;

        let loss_val = loss.to_scalar::<f32>()?;
        let score = Sigmoid.forward(&logits)?.mean_all()?.to_scalar::<f32>()?;
        self.check_finite(Phase::Generator, &[loss_val, score])?;

        // gradients also land on the discriminator's variables but only the
        // generator's optimizer steps
        self.gen_optimizer.backward_step(&loss)?;
        debug!("generator phase: loss {loss_val:.4}");
        Ok(loss_val)
    }

    /// One discriminator update followed by one generator update
    ///
    /// Each phase draws its own fresh latent batch the size of `real`.
    pub fn step(&mut self, real: &Tensor) -> Result<StepLosses> {
        let batch_size = self.check_real_batch(real)?;

        let latent = self.sample_latent(batch_size)?;
        let d = self.discriminator_phase(real, &latent)?;

        let latent = self.sample_latent(batch_size)?;
        let g_loss = self.generator_phase(&latent)?;

        Ok(StepLosses {
            d_loss: d.loss,
            g_loss,
            real_score: d.real_score,
            fake_score: d.fake_score,
        })
    }

    /// Runs `num_steps` sequential steps on batches drawn from `source`
    ///
    /// NOTE: there is no convergence criterion; the run stops after
    /// `num_steps` or at the first error.
    pub fn train<S: RealDataSource>(
        &mut self,
        source: &mut S,
        num_steps: usize,
    ) -> Result<TrainingHistory> {
        let mut history = TrainingHistory::default();
        for step in 1..=num_steps {
            let real = source.next_batch(self.cfg.batch_size, &self.device)?;
            let losses = self.step(&real)?;
            if self.cfg.log_every > 0 && step % self.cfg.log_every == 0 {
                info!(
                    "step {step}/{num_steps}: D loss {:.4} | G loss {:.4}",
                    losses.d_loss, losses.g_loss
                );
            }
            history.push(losses);
        }
        Ok(history)
    }

    pub fn config(&self) -> &GanConfig {
        &self.cfg
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn generator(&self) -> &Generator {
        &self.generator
    }

    pub fn discriminator(&self) -> &Discriminator {
        &self.discriminator
    }

    fn check_real_batch(&self, real: &Tensor) -> Result<usize> {
        match *real.dims() {
            [b, n] if b > 0 && n == self.cfg.data_dim => Ok(b),
            _ => Err(GanError::shape_mismatch(
                "real batch",
                format!("(batch, {})", self.cfg.data_dim),
                real.dims(),
            )),
        }
    }

    fn check_finite(&self, phase: Phase, values: &[f32]) -> Result<()> {
        if !self.cfg.abort_on_divergence {
            return Ok(());
        }
        match values.iter().find(|v| !v.is_finite()) {
            Some(&value) => {
                warn!("{phase} phase produced non-finite value {value}, skipping update");
                Err(GanError::DivergedTraining { phase, value })
            }
            None => Ok(()),
        }
    }
}

fn adam_params(cfg: &GanConfig) -> ParamsAdamW {
    ParamsAdamW {
        lr: cfg.learning_rate,
        beta1: cfg.beta1,
        beta2: cfg.beta2,
        eps: cfg.eps,
        weight_decay: 0.0,
    }
}
