//! Utility functions for BBAnn
//!
//! This module provides common utilities used throughout the library.

pub mod metrics;
pub mod recall;

pub use metrics::{Metrics, Stats, TimeRecorder, Timer};
pub use recall::{knn_id_recall, knn_recall, range_recall};

/// Generate random float vectors for testing
#[cfg(test)]
pub fn generate_random_vectors(num_vectors: usize, dimension: usize) -> Vec<Vec<f32>> {
    use rand::Rng;
    let mut rng = rand::thread_rng();

    (0..num_vectors)
        .map(|_| (0..dimension).map(|_| rng.gen_range(-1.0..1.0)).collect())
        .collect()
}
