use crate::types::{Dataset, GeoError, GeoReal, GeoResult, TraceMatrix, Wavelet};
use ndarray::{ArrayView1, Axis, Zip};
use num_traits::Float;
use serde::{Deserialize, Serialize};

/// Window lengths for gain control and trace mixing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditioningParams {
    /// AGC moving-average length in samples
    pub agc_window: usize,
    /// Mix moving-average length in traces
    pub mix_window: usize,
}

impl Default for ConditioningParams {
    fn default() -> Self {
        Self {
            agc_window: 100,
            mix_window: 10,
        }
    }
}

/// Stateless trace filters over `[trace, sample]` sections
pub struct TraceConditioner {
    params: ConditioningParams,
}

impl TraceConditioner {
    /// Create a conditioner with default windows
    pub fn new() -> Self {
        Self {
            params: ConditioningParams::default(),
        }
    }

    /// Create a conditioner with custom windows
    pub fn with_params(params: ConditioningParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ConditioningParams {
        &self.params
    }

    /// Gain envelope used by AGC: centered moving sum of `|x|` over
    /// `agc_window` samples, scaled by `2 / agc_window`.
    pub fn agc_envelope(&self, data: &TraceMatrix) -> GeoResult<TraceMatrix> {
        let kernel = moving_average_kernel(self.params.agc_window)?;
        Ok(apply_along_axis(data, Axis(1), |lane| {
            let magnitude: Vec<GeoReal> = lane.iter().map(|v| v.abs()).collect();
            convolve_same(&magnitude, &kernel)
        }))
    }

    /// Automatic gain control along the sample axis
    pub fn agc(&self, data: &TraceMatrix) -> GeoResult<TraceMatrix> {
        log::info!(
            "Applying AGC (window {}) to {} traces",
            self.params.agc_window,
            data.nrows()
        );

        let envelope = self.agc_envelope(data)?;
        let mut repaired = 0usize;
        let mut output = data / &envelope;
        output.mapv_inplace(|v| {
            if v.is_finite() {
                v
            } else {
                repaired += 1;
                0.0
            }
        });

        if repaired > 0 {
            log::warn!("AGC zeroed {} samples with a vanishing envelope", repaired);
        }
        log::info!("AGC complete");
        Ok(output)
    }

    /// In-place AGC
    pub fn agc_inplace(&self, data: &mut TraceMatrix) -> GeoResult<()> {
        let gained = self.agc(data)?;
        data.assign(&gained);
        Ok(())
    }

    /// Moving-average smoothing across neighbouring traces at each sample
    pub fn mix(&self, data: &TraceMatrix) -> GeoResult<TraceMatrix> {
        log::info!(
            "Mixing {} traces over a {}-trace window",
            data.nrows(),
            self.params.mix_window
        );

        let kernel = moving_average_kernel(self.params.mix_window)?;
        let mixed = apply_along_axis(data, Axis(0), |lane| {
            convolve_same(&lane.to_vec(), &kernel)
        });
        log::info!("Mix complete");
        Ok(mixed)
    }

    /// Convolve every trace with `wavelet`, keeping the trace length
    pub fn convolve(&self, data: &TraceMatrix, wavelet: &Wavelet) -> GeoResult<TraceMatrix> {
        if wavelet.is_empty() {
            return Err(GeoError::Configuration("Wavelet is empty".to_string()));
        }
        log::info!(
            "Convolving {} traces with a {}-sample wavelet",
            data.nrows(),
            wavelet.len()
        );

        let kernel = wavelet.to_vec();
        let convolved = apply_along_axis(data, Axis(1), |lane| {
            convolve_same(&lane.to_vec(), &kernel)
        });
        log::info!("Convolution complete");
        Ok(convolved)
    }

    /// Delay every trace by `lag` samples, mirroring the trace start into the gap
    pub fn shift(&self, data: &TraceMatrix, lag: usize) -> GeoResult<TraceMatrix> {
        let ns = data.ncols();
        if lag > 0 && lag >= ns {
            return Err(GeoError::Configuration(format!(
                "Shift of {} samples needs traces longer than {} samples",
                lag, ns
            )));
        }

        log::info!("Shifting {} traces by {} samples", data.nrows(), lag);

        let shifted = apply_along_axis(data, Axis(1), |lane| {
            (0..lane.len())
                .map(|i| if i < lag { lane[lag - i] } else { lane[i - lag] })
                .collect()
        });
        log::info!("Shift complete");
        Ok(shifted)
    }

    /// Apply AGC to the traces of a dataset
    pub fn agc_dataset(&self, dataset: &mut Dataset) -> GeoResult<()> {
        let gained = self.agc(&dataset.trace_matrix())?;
        dataset.set_trace_matrix(&gained)
    }

    /// Apply trace mixing to a dataset, in dataset order
    pub fn mix_dataset(&self, dataset: &mut Dataset) -> GeoResult<()> {
        let mixed = self.mix(&dataset.trace_matrix())?;
        dataset.set_trace_matrix(&mixed)
    }

    /// Convolve the traces of a dataset with `wavelet`
    pub fn convolve_dataset(&self, dataset: &mut Dataset, wavelet: &Wavelet) -> GeoResult<()> {
        let convolved = self.convolve(&dataset.trace_matrix(), wavelet)?;
        dataset.set_trace_matrix(&convolved)
    }
}

impl Default for TraceConditioner {
    fn default() -> Self {
        Self::new()
    }
}

/// Uniform kernel of `window` taps, each `1 / (window / 2)`
fn moving_average_kernel(window: usize) -> GeoResult<Vec<GeoReal>> {
    if window == 0 {
        return Err(GeoError::Configuration(
            "Window length must be positive".to_string(),
        ));
    }
    let weight = 1.0 / (window as GeoReal / 2.0);
    Ok(vec![weight; window])
}

/// Run `f` over every 1D lane along `axis` and collect the results into a
/// matrix of the same shape.
fn apply_along_axis<F>(data: &TraceMatrix, axis: Axis, f: F) -> TraceMatrix
where
    F: Fn(ArrayView1<'_, GeoReal>) -> Vec<GeoReal> + Sync + Send,
{
    let mut output = TraceMatrix::zeros(data.dim());
    let zip = Zip::from(output.lanes_mut(axis)).and(data.lanes(axis));

    let fill = |mut out_lane: ndarray::ArrayViewMut1<'_, GeoReal>, in_lane: ArrayView1<'_, GeoReal>| {
        for (dst, src) in out_lane.iter_mut().zip(f(in_lane)) {
            *dst = src;
        }
    };

    #[cfg(feature = "parallel")]
    zip.par_for_each(fill);
    #[cfg(not(feature = "parallel"))]
    zip.for_each(fill);

    output
}

/// Centered convolution whose output has the length of `signal`.
///
/// Equivalent to the full convolution cropped to start at `(kernel.len() - 1) / 2`.
pub(crate) fn convolve_same<T: Float>(signal: &[T], kernel: &[T]) -> Vec<T> {
    let n = signal.len();
    let m = kernel.len();
    if n == 0 || m == 0 {
        return vec![T::zero(); n];
    }

    let offset = (m - 1) / 2;
    (0..n)
        .map(|i| {
            let lo = (i + offset + 1).saturating_sub(m);
            let hi = (i + offset).min(n - 1);
            (lo..=hi).fold(T::zero(), |acc, j| acc + signal[j] * kernel[i + offset - j])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use crate::types::{TraceHeader, TraceRecord};
    use ndarray::{array, Array1, Array2};

    fn conditioner(agc_window: usize, mix_window: usize) -> TraceConditioner {
        TraceConditioner::with_params(ConditioningParams {
            agc_window,
            mix_window,
        })
    }

    #[test]
    fn test_convolve_same_alignment() {
        // np.convolve([1, 3, 5], [1, 1], mode='same') == [1, 4, 8]
        assert_eq!(convolve_same(&[1.0, 3.0, 5.0], &[1.0, 1.0]), vec![1.0, 4.0, 8.0]);
        // odd kernels are centered
        assert_eq!(
            convolve_same(&[1.0, 2.0, 3.0, 4.0], &[0.0, 1.0, 0.0]),
            vec![1.0, 2.0, 3.0, 4.0]
        );
        // kernel longer than signal still returns the signal length
        assert_eq!(convolve_same(&[1.0f64, 1.0], &[1.0; 5]).len(), 2);
    }

    #[test]
    fn test_agc_constant_trace() {
        let data = Array2::<f32>::from_elem((2, 12), 3.0);
        let gained = conditioner(4, 2).agc(&data).unwrap();

        assert_eq!(gained.dim(), data.dim());
        // interior envelope = 4 * 3 / 2 = 6
        for j in 2..10 {
            assert_abs_diff_eq!(gained[[0, j]], 0.5, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_agc_repairs_dead_traces() {
        let mut data = Array2::<f32>::zeros((3, 20));
        data.row_mut(1).fill(1.0);
        let gained = conditioner(5, 2).agc(&data).unwrap();

        assert!(gained.iter().all(|v| v.is_finite()));
        assert!(gained.row(0).iter().all(|&v| v == 0.0));
        assert!(gained.row(2).iter().all(|&v| v == 0.0));
        assert!(gained.row(1).iter().all(|&v| v > 0.0));
    }

    #[test]
    fn test_agc_twice_stays_finite() {
        let data = Array2::from_shape_fn((4, 64), |(i, j)| {
            ((j as f32) * 0.3 + i as f32).sin() * (1.0 + j as f32)
        });
        let cond = conditioner(9, 3);
        let once = cond.agc(&data).unwrap();
        let twice = cond.agc(&once).unwrap();

        assert!(twice.iter().all(|v| v.is_finite()));
        assert!(twice.iter().any(|v| v.abs() > 0.1));
    }

    #[test]
    fn test_mix_smooths_across_traces() {
        let data = array![[1.0f32, 0.0], [3.0, 0.0], [5.0, 2.0]];
        let mixed = conditioner(4, 2).mix(&data).unwrap();
        assert_eq!(mixed, array![[1.0, 0.0], [4.0, 0.0], [8.0, 2.0]]);
    }

    #[test]
    fn test_convolve_with_spike_is_identity() {
        let data = array![[1.0f32, -2.0, 3.0, 0.5], [0.0, 1.0, 0.0, 0.0]];
        let spike = array![0.0f32, 1.0, 0.0];
        let out = TraceConditioner::new().convolve(&data, &spike).unwrap();
        assert_eq!(out, data);

        assert!(TraceConditioner::new()
            .convolve(&data, &Wavelet::zeros(0))
            .is_err());
    }

    #[test]
    fn test_shift_reflects_leading_samples() {
        let data = array![[1.0f32, 2.0, 3.0, 4.0, 5.0]];
        let cond = TraceConditioner::new();

        assert_eq!(cond.shift(&data, 2).unwrap(), array![[3.0, 2.0, 1.0, 2.0, 3.0]]);
        assert_eq!(cond.shift(&data, 0).unwrap(), data);
        assert!(matches!(cond.shift(&data, 5), Err(GeoError::Configuration(_))));
    }

    #[test]
    fn test_dataset_helpers_match_matrix_filters() {
        let records = (0..4)
            .map(|i| {
                TraceRecord::new(
                    TraceHeader {
                        tracl: i + 1,
                        cdp: i as i64,
                        ..TraceHeader::default()
                    },
                    Array1::from_shape_fn(16, |j| ((j as f32) * 0.7 + i as f32).sin()),
                )
            })
            .collect();
        let original = Dataset::new(records).unwrap();
        let matrix = original.trace_matrix();
        let cond = conditioner(5, 2);
        let wavelet = array![0.25f32, 0.5, 0.25];

        let mut gained = original.clone();
        cond.agc_dataset(&mut gained).unwrap();
        assert_eq!(gained.trace_matrix(), cond.agc(&matrix).unwrap());

        let mut mixed = original.clone();
        cond.mix_dataset(&mut mixed).unwrap();
        assert_eq!(mixed.trace_matrix(), cond.mix(&matrix).unwrap());

        let mut convolved = original.clone();
        cond.convolve_dataset(&mut convolved, &wavelet).unwrap();
        assert_eq!(convolved.trace_matrix(), cond.convolve(&matrix, &wavelet).unwrap());

        for (after, before) in convolved.iter().zip(original.iter()) {
            assert_eq!(after.header, before.header);
        }
        assert!(cond
            .convolve_dataset(&mut convolved, &Wavelet::zeros(0))
            .is_err());
    }

    #[test]
    fn test_zero_window_rejected() {
        let data = Array2::<f32>::ones((2, 2));
        assert!(matches!(conditioner(0, 2).agc(&data), Err(GeoError::Configuration(_))));
        assert!(matches!(conditioner(2, 0).mix(&data), Err(GeoError::Configuration(_))));
    }
}
