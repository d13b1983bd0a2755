//! Rule-based image quality assessment for Photo Triage
//!
//! Four independent detectors (blur, noise, compression and exposure) score a
//! photograph. Their outputs are normalised, weighted and bucketed into a
//! [`PickLabel`] that a culling workflow can act on.

pub mod batch;
pub mod context;
pub mod detectors;
pub mod error;
pub mod image;
pub mod kmeans;
pub mod mask;
pub mod preprocess;
pub mod primitives;
pub mod quality;
pub mod score;
pub mod settings;

pub use batch::{BatchEntry, BatchReport, BatchSummary};
pub use context::{CancelToken, RawScores, RunContext, RunState};
pub use error::{QualityError, Result};
pub use image::{load_image, BitDepth, DecodedImage, SourceImage};
pub use primitives::{ImageprocBackend, Primitives};
pub use quality::QualityAnalyzer;
pub use score::{classify, NormalizedScores, PickLabel, QualityReport};
pub use settings::{ExposureMaskSettings, QualitySettings};
