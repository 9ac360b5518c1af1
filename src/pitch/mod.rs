pub mod autocorrelation;

use serde::{Deserialize, Serialize};

pub use autocorrelation::{estimate_pitch, PitchEstimator};

/// A detected pitch at a playback time. `hz` is always positive.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct PitchSample {
    pub time: f64,
    pub hz: f32,
}

/// Equal-tempered frequency of a (possibly fractional) MIDI note, A4 = 440 Hz.
pub fn midi_to_hz(midi: f64) -> f64 {
    440.0 * 2f64.powf((midi - 69.0) / 12.0)
}

/// Fractional MIDI number of a frequency.
pub fn hz_to_midi(hz: f64) -> f64 {
    69.0 + 12.0 * (hz / 440.0).log2()
}

/// Signed distance from `target_hz` to `hz` in cents (positive = sharp).
pub fn cents_between(hz: f64, target_hz: f64) -> f64 {
    1200.0 * (hz / target_hz).log2()
}
