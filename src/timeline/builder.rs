use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::timeline::{LineSpec, NoteSpec};

/// One sung note with its lyric syllable, before it is assigned to a line.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NoteRow {
    pub start_time: f64,
    pub end_time: f64,
    pub midi: f64,
    #[serde(default)]
    pub syllable: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LineBreakRules {
    /// A silence longer than this between two notes starts a new line.
    pub gap_seconds: f64,
    /// Lines are split before they grow longer than this.
    pub max_line_seconds: f64,
}

impl Default for LineBreakRules {
    fn default() -> Self {
        Self {
            gap_seconds: 1.0,
            max_line_seconds: 8.0,
        }
    }
}

fn close_line(rows: &mut Vec<NoteRow>, out: &mut Vec<LineSpec>) {
    if rows.is_empty() {
        return;
    }
    let start_time = rows[0].start_time;
    let end_time = rows.iter().map(|r| r.end_time).fold(start_time, f64::max);
    let text: String = rows.iter().map(|r| r.syllable.as_str()).collect();
    let notes = rows
        .drain(..)
        .map(|r| NoteSpec {
            start_time: r.start_time,
            end_time: r.end_time,
            midi: r.midi,
        })
        .collect();
    out.push(LineSpec {
        start_time,
        end_time,
        text: text.trim().to_string(),
        notes,
    });
}

/// Group note rows into lyric lines.
///
/// Rows are sorted by start time; rows without a positive finite duration
/// are skipped. Syllables are concatenated as-is, so word spacing must
/// already be part of the syllable text.
pub fn group_into_lines(mut rows: Vec<NoteRow>, rules: &LineBreakRules) -> Vec<LineSpec> {
    rows.retain(|r| {
        let ok = r.start_time.is_finite() && r.end_time.is_finite() && r.end_time > r.start_time;
        if !ok {
            warn!(
                "Skipping note row with non-positive duration: [{}, {}] '{}'",
                r.start_time, r.end_time, r.syllable
            );
        }
        ok
    });
    rows.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));

    let mut lines = Vec::new();
    let mut current: Vec<NoteRow> = Vec::new();
    let mut line_start = 0.0;
    let mut line_end = 0.0;

    for row in rows {
        if !current.is_empty() {
            let gap = row.start_time - line_end;
            let too_long = row.end_time - line_start > rules.max_line_seconds;
            if gap > rules.gap_seconds || too_long {
                close_line(&mut current, &mut lines);
            }
        }
        if current.is_empty() {
            line_start = row.start_time;
            line_end = row.end_time;
        }
        line_end = f64::max(line_end, row.end_time);
        current.push(row);
    }
    close_line(&mut current, &mut lines);

    debug!("Grouped notes into {} lines", lines.len());
    lines
}
