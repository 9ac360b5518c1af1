use crate::config::EstimatorConfig;

/// Windows shorter than this cannot hold a period in the vocal range.
const MIN_WINDOW_SAMPLES: usize = 32;

/// A shorter-lag peak at least this strong (relative to the strongest lag,
/// both overlap-normalized) is the fundamental; the strongest is a multiple.
const OCTAVE_PEAK_RATIO: f64 = 0.9;

/// Time-domain autocorrelation pitch estimator.
///
/// Keeps its correlation buffer between calls so the per-window path does not
/// allocate once warmed up. Returns `None` for silence, invalid windows and
/// signals without a usable period.
#[derive(Debug, Clone)]
pub struct PitchEstimator {
    config: EstimatorConfig,
    corr: Vec<f64>,
}

impl PitchEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        PitchEstimator {
            config,
            corr: Vec::new(),
        }
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    pub fn estimate(&mut self, samples: &[f32], sample_rate: f32) -> Option<f32> {
        if samples.len() < MIN_WINDOW_SAMPLES || !sample_rate.is_finite() || sample_rate <= 0.0 {
            return None;
        }
        if samples.iter().any(|s| !s.is_finite()) {
            return None;
        }

        // Step 1: energy gate
        let energy: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
        let rms = (energy / samples.len() as f64).sqrt();
        if rms < self.config.silence_rms as f64 {
            return None;
        }

        // Step 2: trim quiet edges. The threshold never exceeds half the
        // peak, so a quiet voiced window keeps its body.
        let peak = samples.iter().fold(0.0f32, |m, &s| m.max(s.abs()));
        let threshold = self.config.trim_threshold.min(peak * 0.5);
        let first = samples.iter().position(|s| s.abs() > threshold)?;
        let last = samples.iter().rposition(|s| s.abs() > threshold)?;
        let buf = &samples[first..=last];
        let n = buf.len();
        if n < MIN_WINDOW_SAMPLES {
            return None;
        }

        // Step 3: unnormalized autocorrelation, lags limited to the lowest
        // frequency we report.
        let longest_period = (sample_rate / self.config.min_hz).ceil() as usize;
        let max_lag = longest_period.saturating_add(2).min(n - 1);
        self.corr.clear();
        self.corr.resize(max_lag + 1, 0.0);
        for lag in 0..=max_lag {
            let mut sum = 0.0f64;
            for j in 0..n - lag {
                sum += buf[j] as f64 * buf[j + lag] as f64;
            }
            self.corr[lag] = sum;
        }
        let corr = &self.corr;

        // Step 4: walk off the zero-lag shoulder, then take the strongest lag
        let mut start = 0;
        while start < max_lag && corr[start] > corr[start + 1] {
            start += 1;
        }
        if start >= max_lag {
            return None;
        }
        let mut best = start;
        for lag in start..=max_lag {
            if corr[lag] > corr[best] {
                best = lag;
            }
        }
        // Still rising at the edge: the period is longer than we track.
        if best == max_lag || corr[best] <= 0.0 {
            return None;
        }

        // Step 5: the raw sum is tapered by the shrinking overlap, which
        // drags low-frequency peaks toward shorter lags. Work on the
        // overlap-normalized curve from here on.
        let norm = |lag: usize| corr[lag] / (n - lag) as f64;

        // Short periods fall between whole-sample lags, so the strongest raw
        // lag can land on twice the period. Take the first peak that is
        // nearly as strong instead.
        let floor = OCTAVE_PEAK_RATIO * norm(best);
        if let Some(shorter) = (start + 1..best)
            .find(|&l| norm(l) >= norm(l - 1) && norm(l) >= norm(l + 1) && norm(l) >= floor)
        {
            best = shorter;
        }

        // Settle on the normalized peak, then interpolate.
        let mut lag = best;
        loop {
            if lag > start && norm(lag - 1) > norm(lag) {
                lag -= 1;
            } else if lag < max_lag && norm(lag + 1) > norm(lag) {
                lag += 1;
            } else {
                break;
            }
        }

        let refined = if lag > 0 && lag < max_lag {
            let alpha = norm(lag - 1);
            let beta = norm(lag);
            let gamma = norm(lag + 1);
            let denom = alpha - 2.0 * beta + gamma;
            if denom.abs() > 1e-12 {
                lag as f64 + 0.5 * (alpha - gamma) / denom
            } else {
                lag as f64
            }
        } else {
            lag as f64
        };
        if refined <= 0.0 {
            return None;
        }

        let hz = (sample_rate as f64 / refined) as f32;
        if hz < self.config.min_hz || hz > self.config.max_hz {
            return None;
        }
        Some(hz)
    }
}

impl Default for PitchEstimator {
    fn default() -> Self {
        PitchEstimator::new(EstimatorConfig::default())
    }
}

/// One-shot estimate with default settings.
pub fn estimate_pitch(samples: &[f32], sample_rate: f32) -> Option<f32> {
    PitchEstimator::default().estimate(samples, sample_rate)
}
