//! Bundled reference dataset
//!
//! A deterministic stand-in for the public water-potability dataset: nine
//! physico-chemical measurements plus a binary `Potability` label, with the
//! same column order, approximate marginals and missing-value rates.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::{Column, Dataset, DEFAULT_TARGET};
use crate::error::Result;

/// Rows in the bundled sample
pub const SAMPLE_ROWS: usize = 3276;

/// (name, mean, std, lower clamp, missing rate)
const FEATURES: [(&str, f64, f64, f64, f64); 9] = [
    ("ph", 7.08, 1.59, 0.0, 0.15),
    ("Hardness", 196.37, 32.88, 47.0, 0.0),
    ("Solids", 22014.09, 8768.57, 320.0, 0.0),
    ("Chloramines", 7.12, 1.58, 0.35, 0.0),
    ("Sulfate", 333.78, 41.42, 129.0, 0.238),
    ("Conductivity", 426.21, 80.82, 181.0, 0.0),
    ("Organic_carbon", 14.28, 3.31, 2.2, 0.0),
    ("Trihalomethanes", 66.40, 16.18, 0.74, 0.049),
    ("Turbidity", 3.97, 0.78, 1.45, 0.0),
];

fn standard_normal(rng: &mut ChaCha8Rng) -> f64 {
    // Box-Muller
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

fn round4(v: f64) -> f64 {
    (v * 1e4).round() / 1e4
}

/// Generate the sample with a fixed seed
pub fn water_potability() -> Result<Dataset> {
    generate(SAMPLE_ROWS, 42)
}

/// Generate `n_rows` of water-quality-like data
pub fn generate(n_rows: usize, seed: u64) -> Result<Dataset> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let mut z_scores = vec![vec![0.0; n_rows]; FEATURES.len()];
    let mut columns = Vec::with_capacity(FEATURES.len() + 1);

    for (j, &(name, mean, std, floor, missing)) in FEATURES.iter().enumerate() {
        let values = (0..n_rows)
            .map(|i| {
                let z = standard_normal(&mut rng);
                z_scores[j][i] = z;
                let value = round4((mean + std * z).max(floor));
                (rng.gen::<f64>() >= missing).then_some(value)
            })
            .collect();
        columns.push(Column::numeric(name, values));
    }

    // Potability depends weakly on a few measurements; roughly 39% positive.
    let labels = (0..n_rows)
        .map(|i| {
            let ph_dev = z_scores[0][i].abs();
            let logit = -0.45 - 0.6 * ph_dev + 0.35 * z_scores[3][i] - 0.3 * z_scores[4][i]
                + 0.25 * z_scores[2][i]
                + 0.8 * standard_normal(&mut rng);
            let p = 1.0 / (1.0 + (-logit).exp());
            Some(i64::from(rng.gen::<f64>() < p))
        })
        .collect();
    columns.push(Column::integer(DEFAULT_TARGET, labels));

    Dataset::new(columns)
}
