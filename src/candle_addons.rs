//! # Custom addons module to Candle
//!
//! #### Features
//! - `Layer`: an explicit, typed layer for fixed sequential architectures
//! - `LeakyReLU`, `Tanh` and `Sigmoid` activations
//! - `SeededDropout`: dropout whose masks are drawn from an owned `StdRng`
//! - `seeded_linear`: an affine layer initialized from a given rng
//! - `binary_cross_entropy_with_logits`: BCE on pre-sigmoid scores
//! - `snapshot_vars`: copies every variable of a `VarMap` to the host
use candle_core::{Device, Module, ModuleT, Result, Tensor, Var};
use candle_nn::{Linear, VarMap};
use rand::{rngs::StdRng, Rng};
use rand_distr::Uniform;
use std::{cell::RefCell, collections::BTreeMap, rc::Rc};

/// Random generator handle shared by the layers of a single model
pub type SharedRng = Rc<RefCell<StdRng>>;

/// Leaky rectifier `max(x, slope * x)`, valid for `0 <= slope < 1`
#[derive(Clone, Debug)]
pub struct LeakyReLU {
    negative_slope: f64,
}

impl LeakyReLU {
    pub fn new(negative_slope: f64) -> Self {
        Self { negative_slope }
    }

    pub fn negative_slope(&self) -> f64 {
        self.negative_slope
    }
}

impl Module for LeakyReLU {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        xs.maximum(&(xs * self.negative_slope)?)
    }
}

#[derive(Clone, Debug)]
pub struct Tanh;

impl Module for Tanh {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        xs.tanh()
    }
}

/// Logistic function, computed as `(tanh(x / 2) + 1) / 2` so that it stays
/// within `[0, 1]`
///
/// NOTE: in f32 the output rounds to exactly 0 or 1 for `|x|` above ~17, so
/// losses are taken on the logits instead (see `binary_cross_entropy_with_logits`).
#[derive(Clone, Debug)]
pub struct Sigmoid;

impl Module for Sigmoid {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        ((xs * 0.5)?.tanh()? + 1.0)? * 0.5
    }
}

/// Inverted dropout drawing its Bernoulli masks from a seeded rng
///
/// NOTE: `candle_nn::Dropout` samples from the device rng which cannot be
/// seeded on CPU, so repeated runs would never be reproducible.
#[derive(Clone, Debug)]
pub struct SeededDropout {
    drop_p: f32,
    rng: SharedRng,
}

impl SeededDropout {
    pub fn new(drop_p: f32, rng: SharedRng) -> Self {
        Self { drop_p, rng }
    }

    pub fn drop_p(&self) -> f32 {
        self.drop_p
    }
}

impl ModuleT for SeededDropout {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        if !train || self.drop_p == 0.0 {
            return Ok(xs.clone());
        }
        let scale = 1.0 / (1.0 - self.drop_p);
        let mask: Vec<f32> = {
            let mut rng = self.rng.borrow_mut();
            (0..xs.elem_count())
                .map(|_| {
                    if rng.gen::<f32>() < self.drop_p {
                        0.0
                    } else {
                        scale
                    }
                })
                .collect()
        };
        let mask = Tensor::from_vec(mask, xs.dims(), xs.device())?.to_dtype(xs.dtype())?;
        xs.mul(&mask)
    }
}

/// Explicit layer type used to build fixed sequential architectures
///
/// NOTE: an enum rather than `Vec<Box<dyn ModuleT>>` keeps the concrete type of
/// every layer, which tests use to inspect the architecture.
#[derive(Clone, Debug)]
pub enum Layer {
    Linear(Linear),
    LeakyReLU(LeakyReLU),
    Tanh(Tanh),
    Sigmoid(Sigmoid),
    Dropout(SeededDropout),
}

impl ModuleT for Layer {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        match self {
            Layer::Linear(l) => l.forward(xs),
            Layer::LeakyReLU(a) => a.forward(xs),
            Layer::Tanh(a) => a.forward(xs),
            Layer::Sigmoid(a) => a.forward(xs),
            Layer::Dropout(d) => d.forward_t(xs, train),
        }
    }
}

/// Applies `layers` in order
pub fn forward_layers(layers: &[Layer], xs: &Tensor, train: bool) -> Result<Tensor> {
    let mut xs = xs.clone();
    for layer in layers.iter() {
        xs = layer.forward_t(&xs, train)?;
    }
    Ok(xs)
}

/// Creates an affine layer `in_dim -> out_dim` registered in `varmap` under
/// `{prefix}.weight` and `{prefix}.bias`
///
/// Weight and bias are drawn from `U(-1/sqrt(in_dim), 1/sqrt(in_dim))`.
///
/// ```rust
/// use candle_core::Device;
/// use candle_nn::VarMap;
/// use gan_from_scratch_rs::candle_addons::seeded_linear;
/// use rand::{rngs::StdRng, SeedableRng};
///
/// let varmap = VarMap::new();
/// let mut rng = StdRng::seed_from_u64(42_u64);
/// let linear = seeded_linear(3, 5, &varmap, "fc0", &mut rng, &Device::Cpu).unwrap();
/// assert_eq!(linear.weight().dims(), &[5, 3]);
/// assert_eq!(varmap.all_vars().len(), 2);
/// ```
pub fn seeded_linear(
    in_dim: usize,
    out_dim: usize,
    varmap: &VarMap,
    prefix: &str,
    rng: &mut StdRng,
    dev: &Device,
) -> Result<Linear> {
    let bound = 1.0 / (in_dim as f32).sqrt();
    let dist = Uniform::new_inclusive(-bound, bound);
    let ws: Vec<f32> = (0..out_dim * in_dim).map(|_| rng.sample(dist)).collect();
    let bs: Vec<f32> = (0..out_dim).map(|_| rng.sample(dist)).collect();
    let weight = Var::from_tensor(&Tensor::from_vec(ws, (out_dim, in_dim), dev)?)?;
    let bias = Var::from_tensor(&Tensor::from_vec(bs, out_dim, dev)?)?;

    let mut data = varmap
        .data()
        .lock()
        .map_err(|e| candle_core::Error::Msg(e.to_string()))?;
    data.insert(format!("{prefix}.weight"), weight.clone());
    data.insert(format!("{prefix}.bias"), bias.clone());
    drop(data);

    Ok(Linear::new(
        weight.as_tensor().clone(),
        Some(bias.as_tensor().clone()),
    ))
}

/// `ln(1 + exp(x))`, evaluated as `max(x, 0) + ln(1 + exp(-|x|))` so that
/// `exp` never overflows
pub fn softplus(xs: &Tensor) -> Result<Tensor> {
    let tail = xs.abs()?.neg()?.exp()?.affine(1.0, 1.0)?.log()?;
    xs.relu()? + tail
}

/// Mean binary cross-entropy between `sigmoid(logits)` and targets
///
/// Computed as `softplus(x) - y * x`, which keeps a gradient of `sigmoid(x) - y`
/// with respect to the logit even where the sigmoid itself saturates.
pub fn binary_cross_entropy_with_logits(logits: &Tensor, targets: &Tensor) -> Result<Tensor> {
    (softplus(logits)? - logits.mul(targets)?)?.mean_all()
}

/// Host copies of every variable in `varmap`, ordered by name
pub fn snapshot_vars(varmap: &VarMap) -> Result<BTreeMap<String, Vec<f32>>> {
    let data = varmap
        .data()
        .lock()
        .map_err(|e| candle_core::Error::Msg(e.to_string()))?;
    data.iter()
        .map(|(name, var)| -> Result<(String, Vec<f32>)> {
            let values = var.as_tensor().flatten_all()?.to_vec1::<f32>()?;
            Ok((name.clone(), values))
        })
        .collect()
}

/// Total number of scalar parameters held by `varmap`
pub fn num_parameters(varmap: &VarMap) -> usize {
    varmap
        .all_vars()
        .iter()
        .map(|v| v.as_tensor().elem_count())
        .sum()
}
