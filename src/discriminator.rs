//! The discriminator network: data vectors to realness probabilities

use crate::candle_addons::{
    forward_layers, num_parameters, seeded_linear, snapshot_vars, Layer, LeakyReLU,
    SeededDropout, SharedRng, Sigmoid,
};
use crate::config::GanConfig;
use crate::error::{GanError, Result};
use candle_core::{Device, Tensor, Var};
use candle_nn::VarMap;
use rand::{rngs::StdRng, SeedableRng};
use std::{cell::RefCell, collections::BTreeMap, rc::Rc};

/// Scores a data vector with the probability, in `[0, 1]`, that it is real
///
/// Architecture: `data_dim -> hidden.. -> 1`. Every hidden affine layer is
/// followed by a leaky activation and dropout; the output by a sigmoid.
/// Dropout is only active when scoring with `training = true`.
pub struct Discriminator {
    data_dim: usize,
    layers: Vec<Layer>,
    varmap: VarMap,
    dropout_rng: SharedRng,
}

impl Discriminator {
    /// Creates a new `Discriminator`
    ///
    /// Parameters are drawn from `rng`; dropout masks from a separate rng
    /// seeded with `dropout_seed`.
    ///
    /// ```rust
    /// use candle_core::Device;
    /// use gan_from_scratch_rs::{config::GanConfig, discriminator::Discriminator};
    /// use rand::{rngs::StdRng, SeedableRng};
    ///
    /// let cfg = GanConfig::small_test();
    /// let mut rng = StdRng::seed_from_u64(42_u64);
    /// let discriminator = Discriminator::new(&cfg, &mut rng, 7_u64, &Device::Cpu).unwrap();
    /// assert_eq!(discriminator.layers().len(), 11);
    /// ```
    pub fn new(cfg: &GanConfig, rng: &mut StdRng, dropout_seed: u64, dev: &Device) -> Result<Self> {
        let varmap = VarMap::new();
        let dropout_rng = Rc::new(RefCell::new(StdRng::seed_from_u64(dropout_seed)));
        let mut layers = Vec::with_capacity(3 * cfg.discriminator_hidden.len() + 2);
        let mut in_dim = cfg.data_dim;
        for (ix, &out_dim) in cfg.discriminator_hidden.iter().enumerate() {
            let prefix = format!("disc.fc{ix}");
            layers.push(Layer::Linear(seeded_linear(
                in_dim, out_dim, &varmap, &prefix, rng, dev,
            )?));
            layers.push(Layer::LeakyReLU(LeakyReLU::new(cfg.leaky_slope)));
            layers.push(Layer::Dropout(SeededDropout::new(
                cfg.dropout,
                Rc::clone(&dropout_rng),
            )));
            in_dim = out_dim;
        }
        let prefix = format!("disc.fc{}", cfg.discriminator_hidden.len());
        layers.push(Layer::Linear(seeded_linear(
            in_dim, 1, &varmap, &prefix, rng, dev,
        )?));
        layers.push(Layer::Sigmoid(Sigmoid));

        Ok(Self {
            data_dim: cfg.data_dim,
            layers,
            varmap,
            dropout_rng,
        })
    }

    /// Scores `data`
    ///
    /// Accepts a single vector `(data_dim,)`, returning a scalar, or a batch
    /// `(batch, data_dim)`, returning `(batch, 1)`.
    pub fn discriminate(&self, data: &Tensor, training: bool) -> Result<Tensor> {
        self.forward(&self.layers, data, training)
    }

    /// Pre-sigmoid scores of `data`, shaped like the output of `discriminate`
    ///
    /// Training losses are taken on these, since the sigmoid rounds to exactly
    /// 0 or 1 once the discriminator is confident.
    pub fn logits(&self, data: &Tensor, training: bool) -> Result<Tensor> {
        // the final layer is always the sigmoid
        let body = &self.layers[..self.layers.len() - 1];
        self.forward(body, data, training)
    }

    fn forward(&self, layers: &[Layer], data: &Tensor, training: bool) -> Result<Tensor> {
        match *data.dims() {
            [n] if n == self.data_dim => {
                let out = forward_layers(layers, &data.unsqueeze(0)?, training)?;
                Ok(out.flatten_all()?.squeeze(0)?)
            }
            [b, n] if b > 0 && n == self.data_dim => Ok(forward_layers(layers, data, training)?),
            _ => Err(GanError::shape_mismatch(
                "data vector",
                format!("({}) or (batch, {})", self.data_dim, self.data_dim),
                data.dims(),
            )),
        }
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

    /// Reseeds the rng that draws dropout masks
    pub fn reseed_dropout(&self, seed: u64) {
        *self.dropout_rng.borrow_mut() = StdRng::seed_from_u64(seed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use candle_core::{DType, Device, Module, Tensor};
    use rstest::*;

    #[fixture]
    pub fn cfg() -> GanConfig {
        GanConfig::small_test()
    }

    #[fixture]
    pub fn discriminator(cfg: GanConfig) -> Discriminator {
        let mut rng = StdRng::seed_from_u64(42_u64);
        Discriminator::new(&cfg, &mut rng, 7_u64, &Device::Cpu).unwrap()
    }

    #[rstest]
    fn test_discriminator_init(cfg: GanConfig, discriminator: Discriminator) {
        assert_eq!(discriminator.layers.len(), 11_usize);
        let dropouts: Vec<f32> = discriminator
            .layers
            .iter()
            .filter_map(|l| match l {
                Layer::Dropout(d) => Some(d.drop_p()),
                _ => None,
            })
            .collect();
        assert_eq!(dropouts, vec![cfg.dropout; 3]);
        // dropout directly follows each leaky activation
        for ix in [1_usize, 4, 7] {
            assert!(matches!(discriminator.layers[ix], Layer::LeakyReLU(_)));
            assert!(matches!(discriminator.layers[ix + 1], Layer::Dropout(_)));
        }
        assert!(matches!(discriminator.layers[10], Layer::Sigmoid(_)));
        assert_eq!(discriminator.parameters().len(), 8_usize);
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    fn test_discriminate_in_unit_interval(
        cfg: GanConfig,
        discriminator: Discriminator,
        #[case] training: bool,
    ) -> Result<()> {
        let data = (Tensor::randn(0f32, 1f32, (16_usize, cfg.data_dim), &Device::Cpu)? * 30.)?;
        let scores = discriminator.discriminate(&data, training)?;

        assert_eq!(scores.dims(), &[16_usize, 1]);
        let values = scores.flatten_all()?.to_vec1::<f32>()?;
        assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));
        Ok(())
    }

    #[rstest]
    fn test_discriminate_single_vector(cfg: GanConfig, discriminator: Discriminator) -> Result<()> {
        let data = Tensor::randn(0f32, 1f32, cfg.data_dim, &Device::Cpu)?;
        let score = discriminator.discriminate(&data, false)?;
        assert_eq!(score.dims(), &[] as &[usize]);
        assert!((0.0..=1.0).contains(&score.to_scalar::<f32>()?));
        Ok(())
    }

    #[rstest]
    fn test_eval_mode_is_deterministic(cfg: GanConfig, discriminator: Discriminator) -> Result<()> {
        let data = Tensor::randn(0f32, 1f32, (4_usize, cfg.data_dim), &Device::Cpu)?;
        let a = discriminator.discriminate(&data, false)?.to_vec2::<f32>()?;
        let b = discriminator.discriminate(&data, false)?.to_vec2::<f32>()?;
        assert_eq!(a, b);
        Ok(())
    }

    #[rstest]
    fn test_training_mode_applies_dropout(
        cfg: GanConfig,
        discriminator: Discriminator,
    ) -> Result<()> {
        let data = Tensor::randn(0f32, 1f32, (32_usize, cfg.data_dim), &Device::Cpu)?;
        let eval = discriminator.discriminate(&data, false)?.to_vec2::<f32>()?;
        let train_a = discriminator.discriminate(&data, true)?.to_vec2::<f32>()?;
        let train_b = discriminator.discriminate(&data, true)?.to_vec2::<f32>()?;
        assert_ne!(eval, train_a);
        assert_ne!(train_a, train_b);

        // reseeding replays the same masks
        discriminator.reseed_dropout(99_u64);
        let replay_a = discriminator.discriminate(&data, true)?.to_vec2::<f32>()?;
        discriminator.reseed_dropout(99_u64);
        let replay_b = discriminator.discriminate(&data, true)?.to_vec2::<f32>()?;
        assert_eq!(replay_a, replay_b);
        Ok(())
    }

    #[rstest]
    fn test_zero_dropout_training_equals_eval(cfg: GanConfig) -> Result<()> {
        let cfg = GanConfig { dropout: 0.0, ..cfg };
        let mut rng = StdRng::seed_from_u64(42_u64);
        let discriminator = Discriminator::new(&cfg, &mut rng, 7_u64, &Device::Cpu)?;

        let data = Tensor::randn(0f32, 1f32, (4_usize, cfg.data_dim), &Device::Cpu)?;
        let eval = discriminator.discriminate(&data, false)?.to_vec2::<f32>()?;
        let train = discriminator.discriminate(&data, true)?.to_vec2::<f32>()?;
        assert_eq!(eval, train);
        Ok(())
    }

    #[rstest]
    fn test_logits_feed_the_sigmoid(cfg: GanConfig, discriminator: Discriminator) -> Result<()> {
        let data = Tensor::randn(0f32, 1f32, (6_usize, cfg.data_dim), &Device::Cpu)?;
        let logits = discriminator.logits(&data, false)?;
        assert_eq!(logits.dims(), &[6_usize, 1]);

        let scores = discriminator.discriminate(&data, false)?.to_vec2::<f32>()?;
        assert_eq!(Sigmoid.forward(&logits)?.to_vec2::<f32>()?, scores);

        let single = discriminator.logits(&data.get(0)?, false)?;
        assert_eq!(single.dims(), &[] as &[usize]);
        Ok(())
    }

    #[rstest]
    #[case(vec![11_usize])]
    #[case(vec![3_usize, 13])]
    #[case(vec![0_usize, 12])]
    #[case(vec![1_usize, 1, 12])]
    fn test_discriminate_shape_mismatch(
        discriminator: Discriminator,
        #[case] shape: Vec<usize>,
    ) -> Result<()> {
        let data = Tensor::zeros(shape.clone(), DType::F32, &Device::Cpu)?;
        for out in [
            discriminator.discriminate(&data, true),
            discriminator.logits(&data, true),
        ] {
            match out {
                Err(GanError::InputShapeMismatch { actual, .. }) => assert_eq!(actual, shape),
                other => panic!("expected InputShapeMismatch, got {other:?}"),
            }
        }
        Ok(())
    }

    #[rstest]
    fn test_default_architecture_scores() -> Result<()> {
        let cfg = GanConfig::default();
        let mut rng = StdRng::seed_from_u64(42_u64);
        let discriminator = Discriminator::new(&cfg, &mut rng, 7_u64, &Device::Cpu)?;

        let data = (Tensor::randn(0f32, 1f32, (8_usize, 784), &Device::Cpu)? * 10.)?;
        for training in [true, false] {
            let scores = discriminator.discriminate(&data, training)?;
            assert_eq!(scores.dims(), &[8_usize, 1]);
            let values = scores.flatten_all()?.to_vec1::<f32>()?;
            assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));
        }

        let short = Tensor::zeros(783_usize, DType::F32, &Device::Cpu)?;
        match discriminator.discriminate(&short, false) {
            Err(GanError::InputShapeMismatch { actual, .. }) => assert_eq!(actual, vec![783_usize]),
            other => panic!("expected InputShapeMismatch, got {other:?}"),
        }
        Ok(())
    }
}
