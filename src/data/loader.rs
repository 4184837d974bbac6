//! Minibatch loader with per-epoch shuffling

use super::{DomainBatch, DomainDataset};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Draws shuffled minibatches from a [`DomainDataset`], reshuffling at the
/// start of every epoch. The trailing partial batch is kept.
pub struct DomainLoader {
    dataset: DomainDataset,
    batch_size: usize,
    shuffle: bool,
    rng: StdRng,
}

impl DomainLoader {
    pub fn new(dataset: DomainDataset, batch_size: usize, shuffle: bool, seed: u64) -> Self {
        assert!(batch_size > 0, "batch_size must be positive");
        Self {
            dataset,
            batch_size,
            shuffle,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Number of batches per epoch (last partial batch included).
    pub fn num_batches(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }

    pub fn dataset(&self) -> &DomainDataset {
        &self.dataset
    }

    /// Produce one epoch of batches in a fresh shuffle order.
    pub fn epoch(&mut self) -> Vec<DomainBatch> {
        let mut indices: Vec<usize> = (0..self.dataset.len()).collect();
        if self.shuffle {
            indices.shuffle(&mut self.rng);
        }

        indices
            .chunks(self.batch_size)
            .map(|chunk| self.dataset.gather(chunk))
            .collect()
    }
}
