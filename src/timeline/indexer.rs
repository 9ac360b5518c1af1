//! Which lyric line is on screen at a given playback time.
//!
//! Lines are announced before they start, held briefly after they end, and
//! dropped during long instrumental gaps. Scoring never reads this.

use crate::config::TimelineConfig;
use crate::timeline::Line;

pub fn active_line(lines: &[Line], time: f64, config: &TimelineConfig) -> Option<usize> {
    let first = lines.first()?;
    if time < first.start_time {
        return Some(0);
    }

    // Last line that has started by `time`
    let idx = lines.partition_point(|l| l.start_time <= time).checked_sub(1)?;
    let line = &lines[idx];
    if time <= line.end_time {
        return Some(idx);
    }

    match lines.get(idx + 1) {
        Some(next) => {
            if time <= line.end_time + config.line_grace_seconds {
                Some(idx)
            } else if next.start_time - line.end_time <= config.pre_announce_gap_seconds {
                Some(idx + 1)
            } else {
                None
            }
        }
        None => (time <= line.end_time + config.final_line_hold_seconds).then_some(idx),
    }
}
