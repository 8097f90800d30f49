//! Core modelling and trace processing modules

pub mod conditioning;
pub mod model;
pub mod raytrace;
pub mod supergather;
pub mod wavelet;

// Re-export main types
pub use conditioning::{ConditioningParams, TraceConditioner};
pub use model::{Grid, ModelBuilder, ModelParams, Property};
pub use raytrace::{find_points, traveltime, Ray, RaySampler};
pub use supergather::{build_supergather, SupergatherAggregator, SupergatherParams};
pub use wavelet::{build_wavelet, fft_frequencies, WaveletParams, WaveletSynthesizer};
