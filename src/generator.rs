//! The generator network: latent noise to synthetic data vectors

use crate::candle_addons::{
    forward_layers, num_parameters, seeded_linear, snapshot_vars, Layer, LeakyReLU, Tanh,
};
use crate::config::GanConfig;
use crate::error::{GanError, Result};
use candle_core::{Device, Tensor, Var};
use candle_nn::VarMap;
use rand::rngs::StdRng;
use std::collections::BTreeMap;

/// Maps a latent vector to a data vector with every element in `[-1, 1]`
///
/// Architecture: `latent_dim -> hidden.. -> data_dim`, a leaky activation
/// after every hidden affine layer and `tanh` after the last one.
pub struct Generator {
    latent_dim: usize,
    data_dim: usize,
    layers: Vec<Layer>,
    varmap: VarMap,
}

impl Generator {
    /// Creates a new `Generator` with parameters drawn from `rng`
    ///
    /// ```rust
    /// use candle_core::Device;
    /// use gan_from_scratch_rs::{config::GanConfig, generator::Generator};
    /// use rand::{rngs::StdRng, SeedableRng};
    ///
    /// let cfg = GanConfig::small_test();
    /// let mut rng = StdRng::seed_from_u64(42_u64);
    /// let generator = Generator::new(&cfg, &mut rng, &Device::Cpu).unwrap();
    /// assert_eq!(generator.layers().len(), 8);
    /// ```
    pub fn new(cfg: &GanConfig, rng: &mut StdRng, dev: &Device) -> Result<Self> {
        let varmap = VarMap::new();
        let mut layers = Vec::with_capacity(2 * (cfg.generator_hidden.len() + 1));
        let mut in_dim = cfg.latent_dim;
        for (ix, &out_dim) in cfg.generator_hidden.iter().enumerate() {
            let prefix = format!("gen.fc{ix}");
            layers.push(Layer::Linear(seeded_linear(
                in_dim, out_dim, &varmap, &prefix, rng, dev,
            )?));
            layers.push(Layer::LeakyReLU(LeakyReLU::new(cfg.leaky_slope)));
            in_dim = out_dim;
        }
        let prefix = format!("gen.fc{}", cfg.generator_hidden.len());
        layers.push(Layer::Linear(seeded_linear(
            in_dim,
            cfg.data_dim,
            &varmap,
            &prefix,
            rng,
            dev,
        )?));
        layers.push(Layer::Tanh(Tanh));

        Ok(Self {
            latent_dim: cfg.latent_dim,
            data_dim: cfg.data_dim,
            layers,
            varmap,
        })
    }

    /// Generates data vectors from `latent`
    ///
    /// Accepts a single vector `(latent_dim,)` or a batch `(batch, latent_dim)`
    /// and returns `(data_dim,)` or `(batch, data_dim)` respectively.
    pub fn generate(&self, latent: &Tensor) -> Result<Tensor> {
        match *latent.dims() {
            [n] if n == self.latent_dim => {
                let out = forward_layers(&self.layers, &latent.unsqueeze(0)?, false)?;
                Ok(out.squeeze(0)?)
            }
            [b, n] if b > 0 && n == self.latent_dim => {
                Ok(forward_layers(&self.layers, latent, false)?)
            }
            _ => Err(GanError::shape_mismatch(
                "latent vector",
                format!("({}) or (batch, {})", self.latent_dim, self.latent_dim),
                latent.dims(),
            )),
        }
    }

    pub fn latent_dim(&self) -> usize {
        self.latent_dim
    }

    pub fn data_dim(&self) -> usize {
        self.data_dim
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// The trainable variables, to be handed to this model's optimizer only
    pub fn parameters(&self) -> Vec<Var> {
        self.varmap.all_vars()
    }

    pub fn num_parameters(&self) -> usize {
        num_parameters(&self.varmap)
    }

    pub fn snapshot(&self) -> Result<BTreeMap<String, Vec<f32>>> {
        Ok(snapshot_vars(&self.varmap)?)
    }
}
