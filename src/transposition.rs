use serde::{Deserialize, Serialize};

/// Karaoke key change, in semitones. Positive raises the melody.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KeyShift {
    pub semitones: i32,
}

impl KeyShift {
    pub fn new(semitones: i32) -> Self {
        KeyShift { semitones }
    }
}

/// Shift a target MIDI note, or `None` if the result leaves 0..=127.
pub fn shift_midi(midi: i32, shift: KeyShift) -> Option<i32> {
    let shifted = midi.checked_add(shift.semitones)?;
    (0..=127).contains(&shifted).then_some(shifted)
}
