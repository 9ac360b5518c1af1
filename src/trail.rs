use std::collections::VecDeque;

use crate::pitch::{hz_to_midi, PitchSample};

/// Recent pitch contour for the pitch rail. Never read by scoring.
#[derive(Debug, Clone)]
pub struct PitchTrail {
    window: f64,
    samples: VecDeque<PitchSample>,
}

impl PitchTrail {
    pub fn new(window_seconds: f64) -> Self {
        PitchTrail {
            window: window_seconds,
            samples: VecDeque::new(),
        }
    }

    pub fn push(&mut self, sample: PitchSample) {
        // Keep time order if a sample lands behind the tail (after a seek)
        while self.samples.back().is_some_and(|s| s.time > sample.time) {
            self.samples.pop_back();
        }
        self.samples.push_back(sample);
    }

    /// Drop samples older than the window, and samples from after `now`
    /// left behind by a backward seek.
    pub fn evict(&mut self, now: f64) {
        while self.samples.front().is_some_and(|s| now - s.time > self.window) {
            self.samples.pop_front();
        }
        while self.samples.back().is_some_and(|s| s.time > now) {
            self.samples.pop_back();
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &PitchSample> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// `[t0, hz0, t1, hz1, ...]` for hosts that want a flat typed array.
    pub fn to_flat(&self) -> Vec<f64> {
        self.samples
            .iter()
            .flat_map(|s| [s.time, s.hz as f64])
            .collect()
    }

    /// `[t0, midi0, t1, midi1, ...]` with fractional MIDI numbers, for a
    /// rail drawn in note space.
    pub fn to_flat_midi(&self) -> Vec<f64> {
        self.samples
            .iter()
            .flat_map(|s| [s.time, hz_to_midi(s.hz as f64)])
            .collect()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    fn sample(time: f64, hz: f32) -> PitchSample {
        PitchSample { time, hz }
    }

    #[test]
    fn test_eviction_window_is_inclusive() {
        let mut trail = PitchTrail::new(4.0);
        trail.push(sample(0.0, 440.0));
        trail.push(sample(1.0, 441.0));
        trail.evict(4.0);
        assert_eq!(trail.len(), 2);
        trail.evict(4.5);
        assert_eq!(trail.len(), 1);
        assert_eq!(trail.iter().next().unwrap().time, 1.0);
    }

    #[test]
    fn test_backward_seek_drops_future_samples() {
        let mut trail = PitchTrail::new(4.0);
        for i in 0..10 {
            trail.push(sample(10.0 + i as f64 * 0.1, 300.0));
        }
        trail.evict(10.45);
        assert!(trail.iter().all(|s| s.time <= 10.45));
        assert_eq!(trail.len(), 5);

        trail.push(sample(2.0, 200.0));
        trail.evict(2.0);
        assert_eq!(trail.len(), 1);
    }

    #[test]
    fn test_flat_layout() {
        let mut trail = PitchTrail::new(4.0);
        trail.push(sample(1.0, 100.0));
        trail.push(sample(2.0, 200.0));
        assert_eq!(trail.to_flat(), vec![1.0, 100.0, 2.0, 200.0]);
        trail.clear();
        assert!(trail.is_empty());
    }

    #[test]
    fn test_flat_midi_layout() {
        let mut trail = PitchTrail::new(4.0);
        trail.push(sample(1.0, 440.0));
        trail.push(sample(2.0, 220.0));
        let flat = trail.to_flat_midi();
        assert_eq!(flat.len(), 4);
        assert_eq!(flat[0], 1.0);
        assert_abs_diff_eq!(flat[1], 69.0, epsilon = 1e-9);
        assert_eq!(flat[2], 2.0);
        assert_abs_diff_eq!(flat[3], 57.0, epsilon = 1e-9);
    }

    proptest! {
        #[test]
        fn prop_never_older_than_window(
            steps in prop::collection::vec(
                (-3.0f64..1.0, prop::option::of(80.0f32..1000.0)),
                1..200,
            )
        ) {
            let mut trail = PitchTrail::new(4.0);
            let mut now = 0.0f64;
            for (dt, hz) in steps {
                now = (now + dt).max(0.0);
                if let Some(hz) = hz {
                    trail.push(sample(now, hz));
                }
                trail.evict(now);
                for s in trail.iter() {
                    prop_assert!(now - s.time <= 4.0);
                    prop_assert!(s.time <= now);
                }
                let times: Vec<f64> = trail.iter().map(|s| s.time).collect();
                prop_assert!(times.windows(2).all(|w| w[0] <= w[1]));
            }
        }
    }
}
