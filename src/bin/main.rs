use anyhow::{anyhow, Context};
use candle_core::Device;
use clap::{Parser, Subcommand};
use gan_from_scratch_rs::{
    config::GanConfig,
    examples,
    training::{AdversarialTrainer, GaussianSource},
    Example,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::LazyLock;

static EXAMPLE_REGISTRY: LazyLock<HashMap<&'static str, Box<dyn Example + Send + Sync>>> =
    LazyLock::new(|| {
        let mut m: HashMap<&'static str, Box<dyn Example + Send + Sync + 'static>> =
            HashMap::new();
        m.insert("01", Box::new(examples::gan::EG01));
        m.insert("02", Box::new(examples::gan::EG02));
        m.insert("03", Box::new(examples::gan::EG03));
        m.insert("04", Box::new(examples::gan::EG04));
        m
    });

/// CLI
#[derive(Debug, Parser)]
#[command(name = "gan-from-scratch-rs")]
#[command(about = "A CLI for running examples and training a GAN.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run examples
    Example {
        /// The example to run
        id: String,
    },
    /// List the registered examples
    List,
    /// Train on standard-normal placeholder data
    Train {
        /// JSON config file; missing fields take their defaults
        #[arg(long)]
        config: Option<PathBuf>,
        /// Number of adversarial steps
        #[arg(long, default_value_t = 1)]
        steps: usize,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        batch_size: Option<usize>,
        /// Write an HTML chart of both loss curves here
        #[arg(long)]
        plot: Option<PathBuf>,
        /// Write the per-step losses as JSON here
        #[arg(long)]
        history: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let example_registry = &*EXAMPLE_REGISTRY;
    let cli = Cli::parse();

    match cli.command {
        Commands::Example { id } => {
            let eg = example_registry
                .get(&id[..])
                .ok_or_else(|| anyhow!("unknown example id: {id}"))?;
            eg.main()
        }
        Commands::List => {
            let mut ids: Vec<_> = example_registry.keys().collect();
            ids.sort();
            for id in ids {
                println!("{id}: {}", example_registry[id].description());
            }
            Ok(())
        }
        Commands::Train {
            config,
            steps,
            seed,
            batch_size,
            plot,
            history,
        } => {
            let mut cfg = match config {
                Some(path) => GanConfig::from_json_file(&path)
                    .with_context(|| format!("loading config from {}", path.display()))?,
                None => GanConfig::default(),
            };
            if let Some(seed) = seed {
                cfg.seed = seed;
            }
            if let Some(batch_size) = batch_size {
                cfg.batch_size = batch_size;
            }

            let dev = Device::cuda_if_available(0)?;
            let mut source = GaussianSource::new(cfg.data_dim, cfg.seed);
            let mut trainer = AdversarialTrainer::new(cfg, &dev)?;
            let losses = trainer.train(&mut source, steps)?;
            println!("{}", losses.to_table());

            if let Some(path) = plot {
                losses.write_plot(&path)?;
                println!("Saved loss plot to {}", path.display());
            }
            if let Some(path) = history {
                losses.write_json(&path)?;
                println!("Saved loss history to {}", path.display());
            }
            Ok(())
        }
    }
}
