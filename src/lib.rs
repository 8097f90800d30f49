//! Strata: layered-earth synthetic models and supergather stacking
//!
//! This library builds 2-D layered, faulted velocity/density models with their
//! reflectivity, synthesizes zero-phase source wavelets, integrates travel
//! times along straight rays, conditions seismic traces (AGC, mixing,
//! convolution) and stacks field traces into offset-binned supergathers.

pub mod types;
pub mod core;

#[cfg(feature = "python")]
mod python;

// Re-export main types and functions for easier access
pub use types::{
    Dataset, GeoError, GeoReal, GeoResult, PropertyArray, Trace, TraceHeader, TraceMatrix,
    TraceRecord, Wavelet,
};

pub use crate::core::{
    build_supergather, build_wavelet, find_points, traveltime, ConditioningParams, Grid,
    ModelBuilder, ModelParams, Property, Ray, RaySampler, SupergatherAggregator,
    SupergatherParams, TraceConditioner, WaveletParams, WaveletSynthesizer,
};
