//! The four independent pixel analyzers
//!
//! Every detector reads only from the shared [`RunContext`](crate::context::RunContext)
//! (and, for exposure, the source image), so they can run side by side.

pub mod blur;
pub mod compression;
pub mod exposure;
pub mod noise;

pub use blur::{BlurDetector, BlurEstimate};
pub use compression::CompressionDetector;
pub use exposure::{ExposureDetector, ExposureEstimate};
pub use noise::{NoiseDetector, NoiseEstimate};
