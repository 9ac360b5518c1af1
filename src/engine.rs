//! Per-frame driver for one karaoke performance.
//!
//! The engine owns every piece of mutable performance state. The host calls
//! [`Engine::tick`] once per update with the playback time and at most one
//! fresh pitch estimate; stale estimates must not be passed twice.

use log::{info, trace};
use serde::Serialize;

use crate::config::EngineConfig;
use crate::pitch::{PitchEstimator, PitchSample};
use crate::scoring::{
    judge_note, JudgementEvent, NoteSampleCollector, NoteScoringRecord, ScoreBoard,
    SessionSummary,
};
use crate::timeline::indexer::active_line;
use crate::timeline::{MelodyTimeline, NoteId};
use crate::trail::PitchTrail;

/// What changed during one tick.
#[derive(Serialize, Clone, Debug, Default, PartialEq)]
pub struct TickReport {
    pub time: f64,
    pub active_line: Option<usize>,
    pub score: u64,
    pub combo: u32,
    /// Notes judged during this tick, in order of their end time.
    pub judgements: Vec<JudgementEvent>,
}

pub struct Engine {
    config: EngineConfig,
    timeline: MelodyTimeline,
    estimator: PitchEstimator,
    collector: NoteSampleCollector,
    records: Vec<Option<NoteScoringRecord>>,
    board: ScoreBoard,
    trail: PitchTrail,
    mic_enabled: bool,
    /// Prefix of `timeline.closed_order()` already handed to judgement.
    closed_cursor: usize,
    active_line: Option<usize>,
    last_time: Option<f64>,
}

impl Engine {
    pub fn new(timeline: MelodyTimeline, config: EngineConfig) -> Self {
        info!(
            "Loaded timeline: {} lines, {} scoreable notes",
            timeline.lines().len(),
            timeline.note_count()
        );
        let note_count = timeline.note_count();
        Engine {
            estimator: PitchEstimator::new(config.estimator.clone()),
            collector: NoteSampleCollector::new(note_count),
            records: vec![None; note_count],
            board: ScoreBoard::new(config.scoring.clone()),
            trail: PitchTrail::new(config.trail.window_seconds),
            mic_enabled: true,
            closed_cursor: 0,
            active_line: None,
            last_time: None,
            config,
            timeline,
        }
    }

    /// Swap in a new song. All performance state is cleared.
    pub fn load_timeline(&mut self, timeline: MelodyTimeline) {
        let note_count = timeline.note_count();
        self.timeline = timeline;
        self.collector = NoteSampleCollector::new(note_count);
        self.records = vec![None; note_count];
        self.restart();
        info!("Song changed: {} scoreable notes", note_count);
    }

    /// Advance to `time`, optionally with a fresh pitch estimate in Hz.
    pub fn tick(&mut self, time: f64, pitch_hz: Option<f32>) -> TickReport {
        debug_assert!(time.is_finite(), "tick called with non-finite time {}", time);
        if !time.is_finite() {
            return self.report(self.last_time.unwrap_or(0.0), Vec::new());
        }
        if self.last_time.is_some_and(|last| time < last) {
            trace!("Seek backward to {:.3}s", time);
        }

        self.active_line = active_line(self.timeline.lines(), time, &self.config.timeline);

        let sample = pitch_hz
            .filter(|hz| self.mic_enabled && hz.is_finite() && *hz > 0.0)
            .map(|hz| PitchSample { time, hz });

        if let Some(sample) = sample {
            for idx in self.timeline.open_notes(time) {
                // A judged note ignores later passes through its window
                if self.records[idx].is_none() {
                    self.collector.push(idx, sample.hz);
                }
            }
            self.trail.push(sample);
        }

        let judgements = self.finalize_closed(time);

        self.trail.evict(time);
        self.last_time = Some(time);
        self.report(time, judgements)
    }

    /// Estimate pitch from a raw audio window, then tick. The window is
    /// ignored while mic input is off.
    pub fn tick_with_window(
        &mut self,
        time: f64,
        samples: &[f32],
        sample_rate: f32,
    ) -> TickReport {
        let pitch = if self.mic_enabled {
            self.estimator.estimate(samples, sample_rate)
        } else {
            None
        };
        self.tick(time, pitch)
    }

    fn finalize_closed(&mut self, time: f64) -> Vec<JudgementEvent> {
        let closed = self.timeline.closed_count(time);
        if closed < self.closed_cursor {
            // Backward seek: those notes are either judged already or will
            // be reached again.
            self.closed_cursor = closed;
        }

        let mut events = Vec::new();
        for k in self.closed_cursor..closed {
            let idx = self.timeline.closed_order()[k];
            if self.records[idx].is_some() {
                continue;
            }
            let note = &self.timeline.notes()[idx];
            let judgement = judge_note(
                note.midi,
                self.collector.samples(idx),
                self.mic_enabled,
                &self.config.scoring,
            );
            self.collector.clear(idx);
            let event = self.board.apply(note.id, judgement, time);
            self.records[idx] = Some(NoteScoringRecord {
                tier: event.tier,
                points: event.points,
                best_cents: event.best_cents,
                scored_at: time,
            });
            events.push(event);
        }
        self.closed_cursor = closed;
        events
    }

    fn report(&self, time: f64, judgements: Vec<JudgementEvent>) -> TickReport {
        TickReport {
            time,
            active_line: self.active_line,
            score: self.board.score(),
            combo: self.board.combo(),
            judgements,
        }
    }

    /// Stop or resume feeding pitch into open notes. Judged notes keep
    /// their records either way.
    pub fn set_mic_enabled(&mut self, enabled: bool) {
        if self.mic_enabled != enabled {
            info!("Mic input {}", if enabled { "enabled" } else { "disabled" });
        }
        self.mic_enabled = enabled;
    }

    pub fn mic_enabled(&self) -> bool {
        self.mic_enabled
    }

    /// Clear score, combo, records, pending samples and the trail. Every
    /// note can be judged again afterwards.
    pub fn restart(&mut self) {
        self.board.reset();
        self.records.iter_mut().for_each(|r| *r = None);
        self.collector.clear_all();
        self.trail.clear();
        self.closed_cursor = 0;
        self.active_line = None;
        self.last_time = None;
        info!("Performance restarted");
    }

    pub fn score(&self) -> u64 {
        self.board.score()
    }

    pub fn combo(&self) -> u32 {
        self.board.combo()
    }

    pub fn board(&self) -> &ScoreBoard {
        &self.board
    }

    pub fn summary(&self) -> SessionSummary {
        self.board.summary()
    }

    /// Active line as of the last tick.
    pub fn active_line(&self) -> Option<usize> {
        self.active_line
    }

    pub fn trail(&self) -> &PitchTrail {
        &self.trail
    }

    pub fn record(&self, id: NoteId) -> Option<&NoteScoringRecord> {
        let idx = self.timeline.dense_index(id)?;
        self.records[idx].as_ref()
    }

    /// Samples waiting on a note that has not been judged yet.
    pub fn pending_samples(&self, id: NoteId) -> &[f32] {
        match self.timeline.dense_index(id) {
            Some(idx) => self.collector.samples(idx),
            None => &[],
        }
    }

    pub fn timeline(&self) -> &MelodyTimeline {
        &self.timeline
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
