//! Sensor noise estimate from clustered YCbCr samples
//!
//! Pixels are converted to YCbCr and grouped into colour clusters with
//! k-means. Within a cluster the colour should be roughly constant, so the
//! spread of its members is attributed to noise. The per-cluster spreads are
//! weighted by cluster population and averaged over the three channels.

use crate::context::{CancelToken, RunContext};
use crate::error::Result;
use crate::image::BitDepth;
use crate::kmeans::{KMeansClusterer, KMeansParams};
use crate::preprocess::ChannelBuffers;
use serde::{Deserialize, Serialize};

/// Each channel's spread is halved before averaging
const CHANNEL_DAMPING: f64 = 2.0;
/// Brings 16-bit spreads back onto the 8-bit scale
const SIXTEEN_BIT_SCALE: f64 = 256.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NoiseEstimate {
    /// Population-weighted per-cluster mean, per YCbCr channel
    pub weighted_mean: [f64; 3],
    /// Population-weighted per-cluster standard deviation, per YCbCr channel
    pub weighted_stddev: [f64; 3],
    pub clusters_used: usize,
    pub score: f64,
}

/// Streaming sums for one cluster, taken relative to its first member so a
/// constant cluster has exactly zero spread
#[derive(Debug, Clone, Copy, Default)]
struct ClusterAccumulator {
    count: u64,
    shift: [f64; 3],
    sum: [f64; 3],
    sum_sq: [f64; 3],
}

impl ClusterAccumulator {
    fn push(&mut self, sample: &[f32; 3]) {
        if self.count == 0 {
            self.shift = [sample[0] as f64, sample[1] as f64, sample[2] as f64];
        }
        self.count += 1;
        for c in 0..3 {
            let d = sample[c] as f64 - self.shift[c];
            self.sum[c] += d;
            self.sum_sq[c] += d * d;
        }
    }

    fn mean(&self, channel: usize) -> f64 {
        self.shift[channel] + self.sum[channel] / self.count as f64
    }

    /// Sample standard deviation; a single member has none
    fn stddev(&self, channel: usize) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        let n = self.count as f64;
        let variance = (self.sum_sq[channel] - self.sum[channel] * self.sum[channel] / n) / (n - 1.0);
        variance.max(0.0).sqrt()
    }
}

/// Full-range BT.601 conversion of native-depth RGB samples
pub fn to_ycbcr(channels: &ChannelBuffers, cancel: &CancelToken) -> Result<Vec<[f32; 3]>> {
    let mut samples = Vec::with_capacity(channels.len());

    for (i, ((&r, &g), &b)) in channels
        .red
        .iter()
        .zip(&channels.green)
        .zip(&channels.blue)
        .enumerate()
    {
        if i % 4096 == 0 {
            cancel.check()?;
        }
        let y = 0.2990 * r + 0.5870 * g + 0.1140 * b;
        let cb = -0.1687 * r - 0.3313 * g + 0.5000 * b + 0.5;
        let cr = 0.5000 * r - 0.4187 * g - 0.0813 * b + 0.5;
        samples.push([y, cb, cr]);
    }

    Ok(samples)
}

pub struct NoiseDetector<'a> {
    pub clusterer: &'a dyn KMeansClusterer,
    pub params: KMeansParams,
}

impl<'a> NoiseDetector<'a> {
    pub fn detect(&self, ctx: &RunContext) -> Result<NoiseEstimate> {
        let estimate = match ctx.channels.as_ref() {
            Some(channels) => self.estimate(channels, ctx.bit_depth, ctx.cancel_token())?,
            None => NoiseEstimate::default(),
        };

        tracing::debug!(
            noise = estimate.score,
            clusters = estimate.clusters_used,
            stddev_y = estimate.weighted_stddev[0],
            stddev_cb = estimate.weighted_stddev[1],
            stddev_cr = estimate.weighted_stddev[2],
            "Noise metrics"
        );
        Ok(estimate)
    }

    pub fn estimate(&self, channels: &ChannelBuffers, depth: BitDepth, cancel: &CancelToken) -> Result<NoiseEstimate> {
        let total = channels.len();
        if total == 0 {
            return Ok(NoiseEstimate::default());
        }

        let samples = to_ycbcr(channels, cancel)?;
        let labels = self.clusterer.cluster(&samples, &self.params, cancel)?;
        cancel.check()?;

        let k = self.params.effective_clusters(total);
        let mut clusters = vec![ClusterAccumulator::default(); k];
        for (i, (sample, &label)) in samples.iter().zip(&labels).enumerate() {
            if i % 4096 == 0 {
                cancel.check()?;
            }
            if let Some(acc) = clusters.get_mut(label) {
                acc.push(sample);
            }
        }

        let mut weighted_mean = [0.0f64; 3];
        let mut weighted_stddev = [0.0f64; 3];
        let mut clusters_used = 0;

        for acc in clusters.iter().filter(|acc| acc.count > 0) {
            clusters_used += 1;
            let population = acc.count as f64;
            for c in 0..3 {
                weighted_mean[c] += acc.mean(c) * population;
                weighted_stddev[c] += acc.stddev(c) * population;
            }
        }

        for c in 0..3 {
            weighted_mean[c] /= total as f64;
            weighted_stddev[c] /= total as f64;
            if depth.is_sixteen_bit() {
                weighted_stddev[c] /= SIXTEEN_BIT_SCALE;
            }
        }

        let score = weighted_stddev
            .iter()
            .map(|s| s / CHANNEL_DAMPING)
            .sum::<f64>()
            / 3.0;

        Ok(NoiseEstimate {
            weighted_mean,
            weighted_stddev,
            clusters_used,
            score,
        })
    }
}
