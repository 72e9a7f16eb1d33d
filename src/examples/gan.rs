use crate::Example;

/// Example 01
pub struct EG01;

impl Example for EG01 {
    fn description(&self) -> String {
        String::from("Sample synthetic data vectors from an untrained generator.")
    }

    fn main(&self) -> anyhow::Result<()> {
        use crate::config::GanConfig;
        use candle_core::Device;

        let cfg = GanConfig::default();
        let dev = Device::cuda_if_available(0)?;
        let (generator, samples) = addons::sample_untrained_generator(&cfg, 4_usize, &dev)?;
        println!("generator parameters: {}", generator.num_parameters());
        println!("samples shape: {:?}", samples.shape());
        println!(
            "min: {:?}, max: {:?}",
            samples.min_keepdim(1)?.flatten_all()?.to_vec1::<f32>()?,
            samples.max_keepdim(1)?.flatten_all()?.to_vec1::<f32>()?
        );
        Ok(())
    }
}

/// Example 02
pub struct EG02;

impl Example for EG02 {
    fn description(&self) -> String {
        String::from("Discriminator scores with dropout active (training) and inactive.")
    }

    fn main(&self) -> anyhow::Result<()> {
        use crate::config::GanConfig;
        use candle_core::Device;

        let cfg = GanConfig::default();
        let dev = Device::cuda_if_available(0)?;
        let (discriminator, data) = addons::placeholder_discriminator(&cfg, 3_usize, &dev)?;
        for training in [false, false, true, true] {
            let scores = discriminator.discriminate(&data, training)?;
            println!(
                "training={training}: {:?}",
                scores.flatten_all()?.to_vec1::<f32>()?
            );
        }
        Ok(())
    }
}

/// Example 03
pub struct EG03;

impl Example for EG03 {
    fn description(&self) -> String {
        String::from("One adversarial step (discriminator then generator) on a placeholder batch.")
    }

    fn main(&self) -> anyhow::Result<()> {
        use crate::{
            config::GanConfig,
            training::{AdversarialTrainer, GaussianSource, RealDataSource},
        };
        use candle_core::Device;

        let cfg = GanConfig::default();
        let dev = Device::cuda_if_available(0)?;
        let mut trainer = AdversarialTrainer::new(cfg.clone(), &dev)?;

        // standard-normal placeholder in lieu of real images
        let mut source = GaussianSource::new(cfg.data_dim, cfg.seed);
        let real = source.next_batch(cfg.batch_size, &dev)?;

        let losses = trainer.step(&real)?;
        println!(
            "D Loss: {:.4} | G Loss: {:.4}",
            losses.d_loss, losses.g_loss
        );
        Ok(())
    }
}

/// Example 04
pub struct EG04;

impl Example for EG04 {
    fn description(&self) -> String {
        String::from("A short multi-step training run with a per-step loss table.")
    }

    fn main(&self) -> anyhow::Result<()> {
        use crate::{
            config::GanConfig,
            training::{AdversarialTrainer, GaussianSource},
        };
        use candle_core::Device;

        let cfg = GanConfig {
            log_every: 5,
            ..Default::default()
        };
        let dev = Device::cuda_if_available(0)?;
        let mut trainer = AdversarialTrainer::new(cfg.clone(), &dev)?;
        let mut source = GaussianSource::new(cfg.data_dim, cfg.seed);

        let num_steps = 20_usize;
        let history = trainer.train(&mut source, num_steps)?;
        println!("{}", history.to_table());
        Ok(())
    }
}

pub mod addons {
    //! Auxiliary module for examples::gan
    use crate::{
        config::GanConfig,
        discriminator::Discriminator,
        generator::Generator,
        training::{GaussianSource, RealDataSource},
    };
    use candle_core::{Device, Tensor};
    use rand::{rngs::StdRng, SeedableRng};

    /// Builds a generator from `cfg` and the `n` data vectors it produces
    /// from standard-normal noise, all seeded with `cfg.seed`
    pub fn sample_untrained_generator(
        cfg: &GanConfig,
        n: usize,
        dev: &Device,
    ) -> anyhow::Result<(Generator, Tensor)> {
        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let generator = Generator::new(cfg, &mut rng, dev)?;
        let latent = GaussianSource::new(cfg.latent_dim, cfg.seed).next_batch(n, dev)?;
        let samples = generator.generate(&latent)?;
        Ok((generator, samples))
    }

    /// Builds a discriminator from `cfg` with `n` placeholder data vectors to
    /// score, all seeded with `cfg.seed`
    pub fn placeholder_discriminator(
        cfg: &GanConfig,
        n: usize,
        dev: &Device,
    ) -> anyhow::Result<(Discriminator, Tensor)> {
        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let discriminator = Discriminator::new(cfg, &mut rng, cfg.seed, dev)?;
        let data = GaussianSource::new(cfg.data_dim, cfg.seed).next_batch(n, dev)?;
        Ok((discriminator, data))
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use anyhow::Result;
        use rstest::*;

        #[fixture]
        pub fn cfg() -> GanConfig {
            GanConfig::small_test()
        }

        #[rstest]
        fn test_generator_demo_is_reproducible(cfg: GanConfig) -> Result<()> {
            let (_, a) = sample_untrained_generator(&cfg, 4_usize, &Device::Cpu)?;
            let (_, b) = sample_untrained_generator(&cfg, 4_usize, &Device::Cpu)?;
            assert_eq!(a.dims(), &[4_usize, cfg.data_dim]);
            assert_eq!(a.to_vec2::<f32>()?, b.to_vec2::<f32>()?);

            let (_, c) =
                sample_untrained_generator(&GanConfig { seed: 7, ..cfg }, 4_usize, &Device::Cpu)?;
            assert_ne!(a.to_vec2::<f32>()?, c.to_vec2::<f32>()?);
            Ok(())
        }

        #[rstest]
        fn test_discriminator_demo_is_reproducible(cfg: GanConfig) -> Result<()> {
            let run = || -> Result<Vec<Vec<f32>>> {
                let (discriminator, data) = placeholder_discriminator(&cfg, 3_usize, &Device::Cpu)?;
                let mut scores = discriminator.discriminate(&data, false)?.to_vec2::<f32>()?;
                scores.extend(discriminator.discriminate(&data, true)?.to_vec2::<f32>()?);
                Ok(scores)
            };
            assert_eq!(run()?, run()?);
            Ok(())
        }
    }
}
