pub mod builder;
pub mod indexer;

use std::ops::Range;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{KaraokeError, Result};
use crate::pitch::midi_to_hz;
use crate::transposition::{shift_midi, KeyShift};

// Input types, as delivered by the lyric/melody pipeline

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NoteSpec {
    pub start_time: f64,
    pub end_time: f64,
    /// Target MIDI note. Must be a whole number; anything else is rejected.
    pub midi: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LineSpec {
    pub start_time: f64,
    pub end_time: f64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub notes: Vec<NoteSpec>,
}

// Validated timeline

/// Stable identity of a note: its line and its position in that line's
/// input note list.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NoteId {
    pub line: usize,
    pub position: usize,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Note {
    pub id: NoteId,
    pub start_time: f64,
    pub end_time: f64,
    pub midi: i32,
}

impl Note {
    pub fn target_hz(&self) -> f64 {
        midi_to_hz(self.midi as f64)
    }

    pub fn contains(&self, time: f64) -> bool {
        time >= self.start_time && time <= self.end_time
    }
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Line {
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
    /// Dense indices of this line's scoreable notes.
    #[serde(skip)]
    pub notes: Range<usize>,
}

/// Read-only melody for one song.
///
/// Scoreable notes live in one dense arena in (line, position) order so that
/// per-note engine state can be plain `Vec`s indexed by the same number.
/// Two extra orderings answer the per-frame questions "which notes are open
/// at `t`" and "which notes closed before `t`" by binary search.
#[derive(Debug, Clone, Default)]
pub struct MelodyTimeline {
    lines: Vec<Line>,
    notes: Vec<Note>,
    by_start: Vec<usize>,
    /// `max_end[k]` is the latest end time among `by_start[..=k]`.
    max_end: Vec<f64>,
    by_end: Vec<usize>,
}

fn validate_note(spec: &NoteSpec, id: NoteId) -> Option<Note> {
    if !spec.start_time.is_finite() || !spec.end_time.is_finite() {
        warn!("Dropping note {:?}: non-finite time", id);
        return None;
    }
    if spec.end_time <= spec.start_time {
        warn!(
            "Dropping note {:?}: end {} is not after start {}",
            id, spec.end_time, spec.start_time
        );
        return None;
    }
    let whole = spec.midi.is_finite() && spec.midi.fract() == 0.0;
    if !whole || !(0.0..=127.0).contains(&spec.midi) {
        warn!("Dropping note {:?}: invalid MIDI target {}", id, spec.midi);
        return None;
    }
    Some(Note {
        id,
        start_time: spec.start_time,
        end_time: spec.end_time,
        midi: spec.midi as i32,
    })
}

impl MelodyTimeline {
    /// Validate and index raw lines. Malformed lines and notes are dropped
    /// with a warning; this never fails.
    pub fn from_lines(specs: Vec<LineSpec>) -> Self {
        let mut specs: Vec<LineSpec> = specs
            .into_iter()
            .filter(|l| {
                let ok = l.start_time.is_finite()
                    && l.end_time.is_finite()
                    && l.end_time >= l.start_time;
                if !ok {
                    warn!(
                        "Dropping line '{}': bad bounds [{}, {}]",
                        l.text, l.start_time, l.end_time
                    );
                }
                ok
            })
            .collect();

        if specs.windows(2).any(|w| w[1].start_time < w[0].start_time) {
            warn!("Timeline lines are out of order; sorting by start time");
            specs.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        }

        let lines = specs
            .into_iter()
            .enumerate()
            .map(|(line_idx, spec)| {
                let notes = spec
                    .notes
                    .iter()
                    .enumerate()
                    .filter_map(|(position, n)| {
                        validate_note(n, NoteId { line: line_idx, position })
                    })
                    .collect();
                (spec.start_time, spec.end_time, spec.text, notes)
            })
            .collect();

        Self::assemble(lines)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let specs: Vec<LineSpec> = serde_json::from_str(json).map_err(KaraokeError::Timeline)?;
        Ok(Self::from_lines(specs))
    }

    fn assemble(lines: Vec<(f64, f64, String, Vec<Note>)>) -> Self {
        let mut out_lines = Vec::with_capacity(lines.len());
        let mut notes = Vec::new();
        for (start_time, end_time, text, line_notes) in lines {
            let first = notes.len();
            notes.extend(line_notes);
            out_lines.push(Line {
                start_time,
                end_time,
                text,
                notes: first..notes.len(),
            });
        }

        let mut by_start: Vec<usize> = (0..notes.len()).collect();
        by_start.sort_by(|&a, &b| notes[a].start_time.total_cmp(&notes[b].start_time));
        let mut max_end = Vec::with_capacity(notes.len());
        let mut latest = f64::NEG_INFINITY;
        for &idx in &by_start {
            latest = latest.max(notes[idx].end_time);
            max_end.push(latest);
        }
        let mut by_end: Vec<usize> = (0..notes.len()).collect();
        by_end.sort_by(|&a, &b| notes[a].end_time.total_cmp(&notes[b].end_time));

        MelodyTimeline {
            lines: out_lines,
            notes,
            by_start,
            max_end,
            by_end,
        }
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// All scoreable notes in dense order.
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn line_notes(&self, line: usize) -> &[Note] {
        self.lines
            .get(line)
            .map(|l| &self.notes[l.notes.clone()])
            .unwrap_or(&[])
    }

    pub fn note_count(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Dense index of a note, if it exists and survived validation.
    pub fn dense_index(&self, id: NoteId) -> Option<usize> {
        let range = self.lines.get(id.line)?.notes.clone();
        self.notes[range.clone()]
            .binary_search_by_key(&id.position, |n| n.id.position)
            .ok()
            .map(|offset| range.start + offset)
    }

    pub fn note(&self, id: NoteId) -> Option<&Note> {
        self.dense_index(id).map(|idx| &self.notes[idx])
    }

    /// Dense indices of notes whose window `[start, end]` contains `time`.
    pub fn open_notes(&self, time: f64) -> impl Iterator<Item = usize> + '_ {
        let lo = self.max_end.partition_point(|&end| end < time);
        let hi = self
            .by_start
            .partition_point(|&idx| self.notes[idx].start_time <= time);
        let lo = lo.min(hi);
        self.by_start[lo..hi]
            .iter()
            .copied()
            .filter(move |&idx| self.notes[idx].end_time >= time)
    }

    /// Number of notes whose window ended strictly before `time`.
    /// Those notes are `self.closed_order()[..count]`.
    pub fn closed_count(&self, time: f64) -> usize {
        self.by_end
            .partition_point(|&idx| self.notes[idx].end_time < time)
    }

    /// Dense note indices ordered by end time.
    pub fn closed_order(&self) -> &[usize] {
        &self.by_end
    }

    /// Copy of this timeline with every target moved by `shift`. Notes pushed
    /// outside the MIDI range are dropped; identities of the rest are kept.
    pub fn transposed(&self, shift: KeyShift) -> Self {
        let lines = self
            .lines
            .iter()
            .map(|line| {
                let notes = self.notes[line.notes.clone()]
                    .iter()
                    .filter_map(|n| match shift_midi(n.midi, shift) {
                        Some(midi) => Some(Note { midi, ..n.clone() }),
                        None => {
                            warn!("Key shift {:?} pushes note {:?} out of range", shift, n.id);
                            None
                        }
                    })
                    .collect();
                (line.start_time, line.end_time, line.text.clone(), notes)
            })
            .collect();
        Self::assemble(lines)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn note(start: f64, end: f64, midi: f64) -> NoteSpec {
        NoteSpec {
            start_time: start,
            end_time: end,
            midi,
        }
    }

    pub(crate) fn line(start: f64, end: f64, notes: Vec<NoteSpec>) -> LineSpec {
        LineSpec {
            start_time: start,
            end_time: end,
            text: String::new(),
            notes,
        }
    }

    #[test]
    fn test_valid_notes_are_indexed_densely() {
        let tl = MelodyTimeline::from_lines(vec![
            line(0.0, 2.0, vec![note(0.0, 1.0, 60.0), note(1.0, 2.0, 62.0)]),
            line(3.0, 4.0, vec![note(3.0, 4.0, 64.0)]),
        ]);
        assert_eq!(tl.note_count(), 3);
        assert_eq!(tl.dense_index(NoteId { line: 1, position: 0 }), Some(2));
        assert_eq!(tl.line_notes(0).len(), 2);
        assert_eq!(tl.note(NoteId { line: 0, position: 1 }).unwrap().midi, 62);
    }

    #[test]
    fn test_malformed_notes_are_excluded() {
        let tl = MelodyTimeline::from_lines(vec![line(
            0.0,
            10.0,
            vec![
                note(1.0, 1.0, 60.0),       // zero length
                note(2.0, 1.5, 60.0),       // reversed
                note(3.0, 4.0, f64::NAN),   // bad target
                note(4.0, 5.0, 60.5),       // not a semitone
                note(5.0, f64::INFINITY, 60.0),
                note(6.0, 7.0, 200.0),      // out of MIDI range
                note(8.0, 9.0, 67.0),
            ],
        )]);
        assert_eq!(tl.note_count(), 1);
        let kept = &tl.notes()[0];
        assert_eq!(kept.id, NoteId { line: 0, position: 6 });
        assert_eq!(tl.dense_index(NoteId { line: 0, position: 0 }), None);
        assert_eq!(tl.dense_index(NoteId { line: 0, position: 6 }), Some(0));
    }

    #[test]
    fn test_bad_lines_dropped_and_order_repaired() {
        let tl = MelodyTimeline::from_lines(vec![
            line(5.0, 6.0, vec![]),
            line(f64::NAN, 1.0, vec![]),
            line(1.0, 2.0, vec![]),
            line(4.0, 3.0, vec![]),
        ]);
        assert_eq!(tl.lines().len(), 2);
        assert_eq!(tl.lines()[0].start_time, 1.0);
        assert_eq!(tl.lines()[1].start_time, 5.0);
    }

    #[test]
    fn test_open_notes_handles_long_overlapping_note() {
        let tl = MelodyTimeline::from_lines(vec![line(
            0.0,
            10.0,
            vec![note(0.0, 10.0, 60.0), note(1.0, 2.0, 62.0), note(3.0, 4.0, 64.0)],
        )]);
        let open: Vec<usize> = tl.open_notes(3.5).collect();
        assert_eq!(open, vec![0, 2]);
        let open: Vec<usize> = tl.open_notes(2.0).collect();
        assert_eq!(open, vec![0, 1]);
        assert_eq!(tl.open_notes(10.5).count(), 0);
        assert_eq!(tl.open_notes(-1.0).count(), 0);
    }

    #[test]
    fn test_closed_count_is_strict() {
        let tl = MelodyTimeline::from_lines(vec![line(
            0.0,
            4.0,
            vec![note(0.0, 1.0, 60.0), note(1.0, 2.0, 62.0)],
        )]);
        assert_eq!(tl.closed_count(1.0), 0);
        assert_eq!(tl.closed_count(1.01), 1);
        assert_eq!(tl.closed_count(100.0), 2);
        assert_eq!(tl.closed_order(), &[0, 1]);
    }

    #[test]
    fn test_from_json() {
        let json = r#"[
            {"start_time": 0.0, "end_time": 2.0, "text": "hello",
             "notes": [{"start_time": 0.0, "end_time": 1.0, "midi": 69}]},
            {"start_time": 3.0, "end_time": 4.0}
        ]"#;
        let tl = MelodyTimeline::from_json(json).unwrap();
        assert_eq!(tl.lines().len(), 2);
        assert_eq!(tl.lines()[0].text, "hello");
        assert_eq!(tl.notes()[0].midi, 69);
        assert!(tl.line_notes(1).is_empty());

        assert!(matches!(
            MelodyTimeline::from_json("{}"),
            Err(KaraokeError::Timeline(_))
        ));
    }

    #[test]
    fn test_transposed_keeps_ids() {
        let tl = MelodyTimeline::from_lines(vec![line(
            0.0,
            2.0,
            vec![note(0.0, 1.0, 126.0), note(1.0, 2.0, 60.0)],
        )]);
        let up = tl.transposed(KeyShift::new(2));
        assert_eq!(up.note_count(), 1);
        assert_eq!(up.notes()[0].midi, 62);
        assert_eq!(up.notes()[0].id, NoteId { line: 0, position: 1 });
        assert_eq!(up.lines().len(), 1);
    }
}
