//! K-means clustering of colour samples
//!
//! [`LloydKMeans`] runs plain Lloyd iterations from randomly chosen samples,
//! restarting a few times and keeping the most compact result. The assignment
//! step is spread over the rayon pool and polls the cancel flag per chunk.

use crate::context::CancelToken;
use crate::error::Result;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use rayon::prelude::*;

/// Samples handled per rayon task during assignment
const ASSIGN_CHUNK: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KMeansParams {
    pub clusters: usize,
    pub max_iterations: usize,
    /// Stop once no centre moves further than this (Euclidean distance)
    pub epsilon: f64,
    pub attempts: usize,
}

impl Default for KMeansParams {
    fn default() -> Self {
        Self {
            clusters: 30,
            max_iterations: 10,
            epsilon: 1.0,
            attempts: 3,
        }
    }
}

impl KMeansParams {
    /// Cluster count actually used for `samples` points; never more than there
    /// are samples to seed from
    pub fn effective_clusters(&self, samples: usize) -> usize {
        self.clusters.min(samples)
    }
}

pub trait KMeansClusterer: Send + Sync {
    /// Assign each sample a cluster id in `0..params.effective_clusters(n)`
    fn cluster(&self, samples: &[[f32; 3]], params: &KMeansParams, cancel: &CancelToken) -> Result<Vec<usize>>;
}

#[derive(Debug, Clone, Copy)]
pub struct LloydKMeans {
    seed: u64,
}

impl Default for LloydKMeans {
    fn default() -> Self {
        Self { seed: 0x5eed_1234 }
    }
}

impl LloydKMeans {
    pub fn with_seed(seed: u64) -> Self {
        Self { seed }
    }
}

struct Attempt {
    labels: Vec<usize>,
    compactness: f64,
}

impl KMeansClusterer for LloydKMeans {
    fn cluster(&self, samples: &[[f32; 3]], params: &KMeansParams, cancel: &CancelToken) -> Result<Vec<usize>> {
        let k = params.effective_clusters(samples.len());
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let epsilon_sq = params.epsilon * params.epsilon;
        let mut best: Option<Attempt> = None;

        for attempt in 0..params.attempts.max(1) {
            let mut centers: Vec<[f64; 3]> = index::sample(&mut rng, samples.len(), k)
                .into_iter()
                .map(|i| to_f64(&samples[i]))
                .collect();

            let (mut labels, mut compactness) = assign(samples, &centers, cancel)?;

            for _ in 0..params.max_iterations {
                let shift = update_centers(samples, &labels, &mut centers);
                let (next_labels, next_compactness) = assign(samples, &centers, cancel)?;
                labels = next_labels;
                compactness = next_compactness;

                if shift <= epsilon_sq {
                    break;
                }
            }

            tracing::trace!(attempt, compactness, clusters = k, "K-means attempt finished");

            if best.as_ref().map_or(true, |b| compactness < b.compactness) {
                best = Some(Attempt { labels, compactness });
            }
        }

        Ok(best.map(|b| b.labels).unwrap_or_default())
    }
}

fn to_f64(sample: &[f32; 3]) -> [f64; 3] {
    [sample[0] as f64, sample[1] as f64, sample[2] as f64]
}

fn distance_sq(sample: &[f32; 3], center: &[f64; 3]) -> f64 {
    sample
        .iter()
        .zip(center)
        .map(|(&s, &c)| {
            let d = s as f64 - c;
            d * d
        })
        .sum()
}

/// Index of the nearest centre; ties go to the lowest index
fn nearest(sample: &[f32; 3], centers: &[[f64; 3]]) -> (usize, f64) {
    let mut best = (0, f64::MAX);
    for (i, center) in centers.iter().enumerate() {
        let d = distance_sq(sample, center);
        if d < best.1 {
            best = (i, d);
        }
    }
    best
}

fn assign(samples: &[[f32; 3]], centers: &[[f64; 3]], cancel: &CancelToken) -> Result<(Vec<usize>, f64)> {
    let mut labels = vec![0usize; samples.len()];

    let compactness: f64 = labels
        .par_chunks_mut(ASSIGN_CHUNK)
        .zip(samples.par_chunks(ASSIGN_CHUNK))
        .map(|(label_chunk, sample_chunk)| {
            if cancel.is_cancelled() {
                return 0.0;
            }
            let mut sum = 0.0;
            for (label, sample) in label_chunk.iter_mut().zip(sample_chunk) {
                let (index, dist) = nearest(sample, centers);
                *label = index;
                sum += dist;
            }
            sum
        })
        .sum();

    cancel.check()?;
    Ok((labels, compactness))
}

/// Move every centre to the mean of its members and return the largest
/// squared shift. Empty clusters keep their previous centre.
fn update_centers(samples: &[[f32; 3]], labels: &[usize], centers: &mut [[f64; 3]]) -> f64 {
    let mut sums = vec![[0.0f64; 3]; centers.len()];
    let mut counts = vec![0usize; centers.len()];

    for (sample, &label) in samples.iter().zip(labels) {
        for c in 0..3 {
            sums[label][c] += sample[c] as f64;
        }
        counts[label] += 1;
    }

    let mut max_shift = 0.0f64;
    for ((center, sum), &count) in centers.iter_mut().zip(&sums).zip(&counts) {
        if count == 0 {
            continue;
        }
        let updated = [
            sum[0] / count as f64,
            sum[1] / count as f64,
            sum[2] / count as f64,
        ];
        let shift: f64 = updated.iter().zip(center.iter()).map(|(a, b)| (a - b) * (a - b)).sum();
        max_shift = max_shift.max(shift);
        *center = updated;
    }

    max_shift
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QualityError;

    fn two_blobs() -> Vec<[f32; 3]> {
        let mut samples = Vec::new();
        for i in 0..50 {
            let jitter = (i % 5) as f32 * 0.1;
            samples.push([10.0 + jitter, 10.0, 10.0]);
            samples.push([200.0 - jitter, 200.0, 200.0]);
        }
        samples
    }

    #[test]
    fn test_effective_clusters_clamped_to_sample_count() {
        let params = KMeansParams::default();
        assert_eq!(params.effective_clusters(1000), 30);
        assert_eq!(params.effective_clusters(7), 7);
        assert_eq!(params.effective_clusters(0), 0);
    }

    #[test]
    fn test_empty_input_returns_empty_assignment() {
        let labels = LloydKMeans::default()
            .cluster(&[], &KMeansParams::default(), &CancelToken::new())
            .unwrap();
        assert!(labels.is_empty());
    }

    #[test]
    fn test_fewer_samples_than_clusters() {
        let samples = vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]];
        let labels = LloydKMeans::default()
            .cluster(&samples, &KMeansParams::default(), &CancelToken::new())
            .unwrap();
        assert_eq!(labels.len(), 3);
        assert!(labels.iter().all(|&l| l < 3));
    }

    #[test]
    fn test_separates_two_blobs() {
        let samples = two_blobs();
        let params = KMeansParams { clusters: 2, ..KMeansParams::default() };
        let labels = LloydKMeans::default()
            .cluster(&samples, &params, &CancelToken::new())
            .unwrap();

        // Even indices are the dark blob, odd the bright one
        let dark = labels[0];
        let bright = labels[1];
        assert_ne!(dark, bright);
        for (i, &label) in labels.iter().enumerate() {
            assert_eq!(label, if i % 2 == 0 { dark } else { bright });
        }
    }

    #[test]
    fn test_identical_samples_share_a_cluster() {
        let samples = vec![[128.0, 0.5, 0.5]; 200];
        let labels = LloydKMeans::default()
            .cluster(&samples, &KMeansParams::default(), &CancelToken::new())
            .unwrap();
        assert!(labels.iter().all(|&l| l == labels[0]));
    }

    #[test]
    fn test_same_seed_is_deterministic() {
        let samples = two_blobs();
        let params = KMeansParams { clusters: 4, ..KMeansParams::default() };
        let a = LloydKMeans::with_seed(7).cluster(&samples, &params, &CancelToken::new()).unwrap();
        let b = LloydKMeans::with_seed(7).cluster(&samples, &params, &CancelToken::new()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_cancelled_clustering_errors() {
        let token = CancelToken::new();
        token.cancel();
        let result = LloydKMeans::default().cluster(&two_blobs(), &KMeansParams::default(), &token);
        assert!(matches!(result, Err(QualityError::Cancelled)));
    }

    #[test]
    fn test_update_centers_keeps_empty_cluster() {
        let samples = vec![[0.0, 0.0, 0.0], [2.0, 2.0, 2.0]];
        let labels = vec![0, 0];
        let mut centers = vec![[1.0, 1.0, 1.0], [50.0, 50.0, 50.0]];
        let shift = update_centers(&samples, &labels, &mut centers);
        assert_eq!(centers[0], [1.0, 1.0, 1.0]);
        assert_eq!(centers[1], [50.0, 50.0, 50.0]);
        assert_eq!(shift, 0.0);
    }
}
