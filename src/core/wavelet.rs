//! Band-limited zero-phase source wavelets
//!
//! A unit impulse at the centre sample is transformed to the frequency
//! domain, multiplied by a smoothed passband mask and transformed back. The
//! mask is smoothed with a uniform moving average so the filter edges taper
//! instead of ringing.

use crate::core::conditioning::convolve_same;
use crate::types::{GeoError, GeoResult, Wavelet};
use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use serde::{Deserialize, Serialize};

/// Wavelet design parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaveletParams {
    /// Low corner of the passband (Hz)
    pub lowcut: f64,
    /// High corner of the passband (Hz)
    pub highcut: f64,
    /// Number of samples
    pub ns: usize,
    /// Sample interval (s)
    pub dt: f64,
    /// Length of the moving average applied to the passband mask
    pub smoother_taps: usize,
}

impl Default for WaveletParams {
    fn default() -> Self {
        Self {
            lowcut: 5.0,
            highcut: 140.0,
            ns: 200,
            dt: 0.001,
            smoother_taps: 100,
        }
    }
}

impl WaveletParams {
    fn validate(&self) -> GeoResult<()> {
        if !(self.lowcut.is_finite() && self.highcut.is_finite()) || self.lowcut < 0.0 {
            return Err(GeoError::Configuration(format!(
                "Invalid passband {}-{} Hz",
                self.lowcut, self.highcut
            )));
        }
        if self.lowcut >= self.highcut {
            return Err(GeoError::Configuration(format!(
                "Low cut {} Hz must be below high cut {} Hz",
                self.lowcut, self.highcut
            )));
        }
        if self.ns == 0 {
            return Err(GeoError::Configuration(
                "Wavelet needs at least one sample".to_string(),
            ));
        }
        if !(self.dt > 0.0 && self.dt.is_finite()) {
            return Err(GeoError::Configuration(format!(
                "Sample interval must be positive, got {}",
                self.dt
            )));
        }
        if self.smoother_taps == 0 {
            return Err(GeoError::Configuration(
                "Mask smoother needs at least one tap".to_string(),
            ));
        }
        Ok(())
    }
}

/// Zero-phase wavelet synthesizer
pub struct WaveletSynthesizer {
    params: WaveletParams,
}

impl WaveletSynthesizer {
    pub fn new(params: WaveletParams) -> Self {
        Self { params }
    }

    /// Synthesizer for a given passband with the default length and sampling
    pub fn with_band(lowcut: f64, highcut: f64) -> Self {
        Self::new(WaveletParams {
            lowcut,
            highcut,
            ..WaveletParams::default()
        })
    }

    pub fn params(&self) -> &WaveletParams {
        &self.params
    }

    /// Build the wavelet
    pub fn build(&self) -> GeoResult<Wavelet> {
        self.params.validate()?;
        let WaveletParams {
            lowcut,
            highcut,
            ns,
            dt,
            smoother_taps,
        } = self.params;

        log::info!(
            "Building {}-{} Hz zero-phase wavelet ({} samples at {} s)",
            lowcut,
            highcut,
            ns,
            dt
        );

        let nyquist = 0.5 / dt;
        if highcut >= nyquist {
            log::warn!(
                "High cut {} Hz is at or above Nyquist ({} Hz); passband is not alias-guarded",
                highcut,
                nyquist
            );
        }

        let mut spectrum = vec![Complex64::new(0.0, 0.0); ns];
        spectrum[ns / 2] = Complex64::new(1.0, 0.0);

        let mut planner = FftPlanner::<f64>::new();
        planner.plan_fft_forward(ns).process(&mut spectrum);

        let mask: Vec<f64> = fft_frequencies(ns, dt)
            .into_iter()
            .map(|f| if lowcut < f.abs() && f.abs() < highcut { 1.0 } else { 0.0 })
            .collect();
        let smoother = vec![1.0 / smoother_taps as f64; smoother_taps];
        let mask = convolve_same(&mask, &smoother);

        for (bin, gain) in spectrum.iter_mut().zip(mask.iter()) {
            *bin *= *gain;
        }

        planner.plan_fft_inverse(ns).process(&mut spectrum);
        let scale = 1.0 / ns as f64;

        let wavelet: Wavelet = spectrum.iter().map(|c| (c.re * scale) as f32).collect();
        log::info!(
            "Wavelet built, peak amplitude {:.4}",
            wavelet.iter().fold(0.0f32, |m, v| m.max(v.abs()))
        );
        Ok(wavelet)
    }

    /// Frequencies and amplitude spectrum of a sampled wavelet
    pub fn amplitude_spectrum(wavelet: &Wavelet, dt: f64) -> (Vec<f64>, Vec<f64>) {
        let n = wavelet.len();
        let mut buffer: Vec<Complex64> = wavelet
            .iter()
            .map(|&v| Complex64::new(v as f64, 0.0))
            .collect();
        if n > 0 {
            FftPlanner::<f64>::new().plan_fft_forward(n).process(&mut buffer);
        }
        (
            fft_frequencies(n, dt),
            buffer.iter().map(|c| c.norm()).collect(),
        )
    }
}

/// Build a zero-phase wavelet passing `lowcut < |f| < highcut`
pub fn build_wavelet(lowcut: f64, highcut: f64, ns: usize, dt: f64) -> GeoResult<Wavelet> {
    WaveletSynthesizer::new(WaveletParams {
        lowcut,
        highcut,
        ns,
        dt,
        ..WaveletParams::default()
    })
    .build()
}

/// DFT bin centre frequencies in standard order (0, positive, negative)
pub fn fft_frequencies(n: usize, dt: f64) -> Vec<f64> {
    let span = n as f64 * dt;
    (0..n)
        .map(|k| {
            let signed = if k <= (n - 1) / 2 {
                k as f64
            } else {
                k as f64 - n as f64
            };
            signed / span
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_fft_frequencies_layout() {
        assert_eq!(fft_frequencies(4, 0.25), vec![0.0, 1.0, -2.0, -1.0]);
        assert_eq!(fft_frequencies(5, 0.2), vec![0.0, 1.0, 2.0, -2.0, -1.0]);
    }

    #[test]
    fn test_default_wavelet_peaks_at_centre() {
        let wavelet = build_wavelet(5.0, 140.0, 200, 0.001).unwrap();
        assert_eq!(wavelet.len(), 200);

        let peak = wavelet
            .iter()
            .enumerate()
            .fold((0, 0.0f32), |best, (i, v)| if v.abs() > best.1 { (i, v.abs()) } else { best });
        assert_eq!(peak.0, 100);
        assert!(wavelet[100] > 0.0);

        let far = wavelet
            .iter()
            .enumerate()
            .filter(|(i, _)| (*i as i64 - 100).abs() >= 20)
            .fold(0.0f32, |m, (_, v)| m.max(v.abs()));
        assert!(far < 0.25 * wavelet[100]);
    }

    #[test]
    fn test_wavelet_is_symmetric() {
        let wavelet = build_wavelet(5.0, 140.0, 200, 0.001).unwrap();
        for m in 1..100 {
            assert_abs_diff_eq!(wavelet[100 + m], wavelet[100 - m], epsilon = 1e-6);
        }
    }

    #[test]
    fn test_energy_concentrated_in_band() {
        let dt = 0.001;
        let wavelet = build_wavelet(5.0, 140.0, 2000, dt).unwrap();
        let (freqs, amps) = WaveletSynthesizer::amplitude_spectrum(&wavelet, dt);

        let (inside, outside) = freqs.iter().zip(amps.iter()).fold(
            (0.0, 0.0),
            |(inside, outside), (f, a)| {
                if 5.0 < f.abs() && f.abs() < 140.0 {
                    (inside + a * a, outside)
                } else {
                    (inside, outside + a * a)
                }
            },
        );
        assert!(outside < 0.05 * inside, "outside {} inside {}", outside, inside);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(
            build_wavelet(140.0, 5.0, 200, 0.001),
            Err(GeoError::Configuration(_))
        ));
        assert!(build_wavelet(5.0, 140.0, 0, 0.001).is_err());
        assert!(build_wavelet(5.0, 140.0, 200, 0.0).is_err());
        assert!(build_wavelet(-1.0, 140.0, 200, 0.001).is_err());
    }

    #[test]
    fn test_above_nyquist_still_finite() {
        let wavelet = build_wavelet(5.0, 900.0, 64, 0.001).unwrap();
        assert!(wavelet.iter().all(|v| v.is_finite()));
    }
}
