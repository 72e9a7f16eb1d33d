pub mod candle_addons;
pub mod config;
pub mod discriminator;
pub mod error;
pub mod examples;
pub mod generator;
pub mod training;

pub use error::{GanError, Result};

pub trait Example {
    fn description(&self) -> String;

    fn main(&self) -> anyhow::Result<()>;
}
