//! Seeded synthetic trial datasets for tests and benchmarks.
//!
//! Available to integration tests through the `test-utils` feature. All
//! generators are deterministic for a given seed.

use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::dataset::{dataset_from_columns, Dataset};

/// Draws from a normal distribution via the Box-Muller transform.
pub fn normal_sample(rng: &mut StdRng, mean: f64, sd: f64) -> f64 {
    let u1: f64 = rng.random::<f64>().max(f64::MIN_POSITIVE);
    let u2: f64 = rng.random();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mean + sd * z
}

/// A randomized trial with a known additive treatment effect.
///
/// Columns: `treatment` (alternating 0/1 assignment), `outcome`
/// (N(10, 1) plus `effect` for treated rows), `age` (N(40, 5)), and
/// `site` (three levels).
pub fn synthetic_rct(n: usize, effect: f64, seed: u64) -> Dataset {
    let mut rng = StdRng::seed_from_u64(seed);

    let treatment: Vec<i64> = (0..n).map(|i| (i % 2) as i64).collect();
    let outcome: Vec<f64> = treatment
        .iter()
        .map(|&t| normal_sample(&mut rng, 10.0, 1.0) + effect * t as f64)
        .collect();
    let age: Vec<f64> = (0..n).map(|_| normal_sample(&mut rng, 40.0, 5.0)).collect();
    let site: Vec<i64> = (0..n).map(|i| (i % 3) as i64 + 1).collect();

    dataset_from_columns(vec![
        (
            "treatment",
            Arc::new(Int64Array::from(treatment)) as ArrayRef,
        ),
        ("outcome", Arc::new(Float64Array::from(outcome)) as ArrayRef),
        ("age", Arc::new(Float64Array::from(age)) as ArrayRef),
        ("site", Arc::new(Int64Array::from(site)) as ArrayRef),
    ])
    .expect("synthetic dataset is well-formed")
}

/// A trial whose `age` covariate is confounded with assignment: treated
/// rows are drawn from a visibly older population.
pub fn confounded_rct(n: usize, seed: u64) -> Dataset {
    let mut rng = StdRng::seed_from_u64(seed);

    let treatment: Vec<i64> = (0..n).map(|i| (i % 2) as i64).collect();
    let age: Vec<f64> = treatment
        .iter()
        .map(|&t| normal_sample(&mut rng, 35.0 + 20.0 * t as f64, 3.0))
        .collect();
    let outcome: Vec<f64> = treatment
        .iter()
        .zip(age.iter())
        .map(|(&t, &a)| normal_sample(&mut rng, 5.0, 1.0) + 0.5 * t as f64 + 0.1 * a)
        .collect();

    dataset_from_columns(vec![
        (
            "treatment",
            Arc::new(Int64Array::from(treatment)) as ArrayRef,
        ),
        ("outcome", Arc::new(Float64Array::from(outcome)) as ArrayRef),
        ("age", Arc::new(Float64Array::from(age)) as ArrayRef),
    ])
    .expect("confounded dataset is well-formed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_dataset() {
        let a = synthetic_rct(50, 0.5, 7);
        let b = synthetic_rct(50, 0.5, 7);
        assert_eq!(
            a.numeric_values("outcome").unwrap(),
            b.numeric_values("outcome").unwrap()
        );
    }

    #[test]
    fn test_normal_sample_is_roughly_centered() {
        let mut rng = StdRng::seed_from_u64(1);
        let mean = (0..10_000)
            .map(|_| normal_sample(&mut rng, 3.0, 1.0))
            .sum::<f64>()
            / 10_000.0;
        assert!((mean - 3.0).abs() < 0.1);
    }
}
