//! Examples
//!
//! Runnable demonstrations of the generator, the discriminator and the
//! adversarial training step. Each one is registered in the CLI under an id
//! and can be run with `cargo run example <id>`.

pub mod gan;
