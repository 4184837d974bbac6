//! Datasets and batch loaders
//!
//! Source batches carry task labels plus a domain indicator; target batches
//! carry only the domain indicator. The adaptation engine zips one source
//! loader with one target loader per epoch.

mod dataset;
mod loader;
mod synth;

pub use dataset::{DomainBatch, DomainDataset};
pub use loader::DomainLoader;
pub use synth::{rotate_2d, two_moons};
