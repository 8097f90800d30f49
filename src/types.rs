use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Real-valued trace sample or model property value
pub type GeoReal = f32;

/// 1D trace (samples along time or depth)
pub type Trace = Array1<GeoReal>;

/// 2D trace section indexed `[trace, sample]`
pub type TraceMatrix = Array2<GeoReal>;

/// 2D model property array indexed `[x, z]`
pub type PropertyArray = Array2<GeoReal>;

/// Zero-phase source pulse
pub type Wavelet = Array1<GeoReal>;

/// Trace header fields used by the core.
///
/// Names follow the SU trace header convention. `ns1` and `ep` are scratch
/// slots: the supergather stacker writes the group id and offset-bin id into
/// them on its output records, and `nhs` receives the fold.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TraceHeader {
    pub tracl: i32,
    pub fldr: i32,
    pub cdp: i64,
    pub offset: f32,
    pub sx: f32,
    pub gx: f32,
    pub dt: u32, // microseconds
    pub nhs: u32,
    pub ns1: i32,
    pub ep: i32,
}

/// One trace with its header
#[derive(Debug, Clone, PartialEq)]
pub struct TraceRecord {
    pub header: TraceHeader,
    pub trace: Trace,
}

impl TraceRecord {
    pub fn new(header: TraceHeader, trace: Trace) -> Self {
        Self { header, trace }
    }

    /// Number of samples in the trace
    pub fn ns(&self) -> usize {
        self.trace.len()
    }
}

/// Ordered collection of trace records sharing one sample count
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    records: Vec<TraceRecord>,
}

impl Dataset {
    /// Build a dataset, checking that every trace has the same length
    pub fn new(records: Vec<TraceRecord>) -> GeoResult<Self> {
        if let Some(first) = records.first() {
            let ns = first.ns();
            if let Some((index, bad)) = records.iter().enumerate().find(|(_, r)| r.ns() != ns) {
                return Err(GeoError::InvalidData(format!(
                    "trace {} has {} samples, expected {}",
                    index,
                    bad.ns(),
                    ns
                )));
            }
        }
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Samples per trace, zero for an empty dataset
    pub fn ns(&self) -> usize {
        self.records.first().map_or(0, TraceRecord::ns)
    }

    pub fn records(&self) -> &[TraceRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TraceRecord> {
        self.records.iter()
    }

    pub fn into_records(self) -> Vec<TraceRecord> {
        self.records
    }

    /// Copy all traces into one `[trace, sample]` matrix
    pub fn trace_matrix(&self) -> TraceMatrix {
        let mut matrix = Array2::zeros((self.len(), self.ns()));
        for (mut row, record) in matrix.axis_iter_mut(Axis(0)).zip(self.records.iter()) {
            row.assign(&record.trace);
        }
        matrix
    }

    /// Replace every trace with the matching row of `matrix`
    pub fn set_trace_matrix(&mut self, matrix: &TraceMatrix) -> GeoResult<()> {
        if matrix.dim() != (self.len(), self.ns()) {
            return Err(GeoError::InvalidData(format!(
                "trace matrix is {:?}, dataset is {}x{}",
                matrix.dim(),
                self.len(),
                self.ns()
            )));
        }
        for (record, row) in self.records.iter_mut().zip(matrix.axis_iter(Axis(0))) {
            record.trace.assign(&row);
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a TraceRecord;
    type IntoIter = std::slice::Iter<'a, TraceRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Error types for model building and trace processing
#[derive(Debug, thiserror::Error)]
pub enum GeoError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Index {index} out of bounds on {axis} axis of length {len}")]
    OutOfBounds {
        axis: &'static str,
        index: i64,
        len: usize,
    },

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Processing error: {0}")]
    Processing(String),
}

/// Result type for geophysical operations
pub type GeoResult<T> = Result<T, GeoError>;

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn record(cdp: i64, samples: Vec<f32>) -> TraceRecord {
        TraceRecord::new(
            TraceHeader { cdp, ..Default::default() },
            Array1::from(samples),
        )
    }

    #[test]
    fn test_dataset_rejects_ragged_traces() {
        let result = Dataset::new(vec![record(1, vec![0.0; 4]), record(2, vec![0.0; 5])]);
        assert!(matches!(result, Err(GeoError::InvalidData(_))));
    }

    #[test]
    fn test_trace_matrix_roundtrip() {
        let mut dataset =
            Dataset::new(vec![record(1, vec![1.0, 2.0]), record(2, vec![3.0, 4.0])]).unwrap();
        assert_eq!(dataset.trace_matrix(), array![[1.0, 2.0], [3.0, 4.0]]);

        dataset.set_trace_matrix(&array![[5.0, 6.0], [7.0, 8.0]]).unwrap();
        assert_eq!(dataset.records()[1].trace, array![7.0, 8.0]);
        assert!(dataset.set_trace_matrix(&array![[1.0, 2.0, 3.0]]).is_err());
    }
}
