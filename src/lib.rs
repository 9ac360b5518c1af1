use wasm_bindgen::prelude::*;

pub mod config;
pub mod engine;
pub mod error;
pub mod handoff;
pub mod parser;
pub mod pitch;
pub mod scoring;
pub mod timeline;
pub mod trail;
pub mod transposition;

pub use config::EngineConfig;
pub use engine::{Engine, TickReport};
pub use error::KaraokeError;
pub use timeline::{LineSpec, MelodyTimeline, NoteId, NoteSpec};

use serde::Serialize;
use timeline::builder::{group_into_lines, LineBreakRules, NoteRow};
use transposition::KeyShift;

use std::cell::RefCell;

thread_local! {
    static ESTIMATOR: RefCell<pitch::PitchEstimator> =
        RefCell::new(pitch::PitchEstimator::default());
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|e| JsValue::from_str(&e.to_string()))
}

fn js_err(e: KaraokeError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn break_rules(gap_seconds: Option<f64>, max_line_seconds: Option<f64>) -> LineBreakRules {
    let defaults = LineBreakRules::default();
    LineBreakRules {
        gap_seconds: gap_seconds.unwrap_or(defaults.gap_seconds),
        max_line_seconds: max_line_seconds.unwrap_or(defaults.max_line_seconds),
    }
}

/// Autocorrelation pitch estimate in Hz, or `undefined` for silence and
/// unusable windows. Reuses a thread-local scratch buffer between calls.
#[wasm_bindgen]
pub fn detect_pitch(samples: &[f32], sample_rate: f32) -> Option<f32> {
    ESTIMATOR.with(|cell| cell.borrow_mut().estimate(samples, sample_rate))
}

#[derive(Serialize)]
struct ImportedSong {
    title: Option<String>,
    initial_tempo: f64,
    lines: Vec<LineSpec>,
}

/// Import the vocal line of a MusicXML score as timeline lines, ready to be
/// passed to `KaraokeSession`.
#[wasm_bindgen]
pub fn parse_musicxml(
    xml: &str,
    gap_seconds: Option<f64>,
    max_line_seconds: Option<f64>,
) -> Result<JsValue, JsValue> {
    let import = parser::musicxml::parse_melody(xml).map_err(js_err)?;
    if import.rows.is_empty() {
        return Err(js_err(KaraokeError::EmptyTimeline));
    }
    let song = ImportedSong {
        title: import.title,
        initial_tempo: import.initial_tempo,
        lines: group_into_lines(import.rows, &break_rules(gap_seconds, max_line_seconds)),
    };
    to_js(&song)
}

/// Group `{start_time, end_time, midi, syllable}` rows into timeline lines.
#[wasm_bindgen]
pub fn group_note_rows(
    rows_js: JsValue,
    gap_seconds: Option<f64>,
    max_line_seconds: Option<f64>,
) -> Result<JsValue, JsValue> {
    let rows: Vec<NoteRow> =
        serde_wasm_bindgen::from_value(rows_js).map_err(|e| JsValue::from_str(&e.to_string()))?;
    to_js(&group_into_lines(rows, &break_rules(gap_seconds, max_line_seconds)))
}

/// One performance of one song, driven by the host's animation loop.
#[wasm_bindgen]
pub struct KaraokeSession {
    engine: Engine,
    /// Untransposed song, so repeated key changes don't accumulate drops.
    source: MelodyTimeline,
    shift: KeyShift,
}

fn timeline_from_js(lines_js: JsValue) -> Result<MelodyTimeline, JsValue> {
    let lines: Vec<LineSpec> =
        serde_wasm_bindgen::from_value(lines_js).map_err(|e| JsValue::from_str(&e.to_string()))?;
    Ok(MelodyTimeline::from_lines(lines))
}

#[wasm_bindgen]
impl KaraokeSession {
    /// `config_js` may be `undefined`, `null` or a partial config object.
    #[wasm_bindgen(constructor)]
    pub fn new(lines_js: JsValue, config_js: JsValue) -> Result<KaraokeSession, JsValue> {
        let config: EngineConfig = if config_js.is_null() || config_js.is_undefined() {
            EngineConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config_js)
                .map_err(|e| JsValue::from_str(&e.to_string()))?
        };
        config.validate().map_err(js_err)?;
        let source = timeline_from_js(lines_js)?;
        Ok(KaraokeSession {
            engine: Engine::new(source.clone(), config),
            source,
            shift: KeyShift::default(),
        })
    }

    /// Advance to `time` seconds with the latest pitch estimate, if any.
    /// Returns the tick report (`{time, active_line, score, combo, judgements}`).
    pub fn tick(&mut self, time: f64, pitch_hz: Option<f32>) -> Result<JsValue, JsValue> {
        to_js(&self.engine.tick(time, pitch_hz))
    }

    /// Like `tick`, estimating pitch from a raw mono audio window.
    pub fn tick_audio(
        &mut self,
        time: f64,
        samples: &[f32],
        sample_rate: f32,
    ) -> Result<JsValue, JsValue> {
        to_js(&self.engine.tick_with_window(time, samples, sample_rate))
    }

    pub fn set_mic_enabled(&mut self, enabled: bool) {
        self.engine.set_mic_enabled(enabled);
    }

    pub fn restart(&mut self) {
        self.engine.restart();
    }

    /// Replace the song. Performance state is cleared; the key shift stays.
    pub fn load_song(&mut self, lines_js: JsValue) -> Result<(), JsValue> {
        self.source = timeline_from_js(lines_js)?;
        self.engine.load_timeline(self.source.transposed(self.shift));
        Ok(())
    }

    /// Move every target by `semitones` from the original key. Restarts the
    /// performance.
    pub fn transpose(&mut self, semitones: i32) {
        self.shift = KeyShift::new(semitones);
        self.engine.load_timeline(self.source.transposed(self.shift));
    }

    #[wasm_bindgen(getter)]
    pub fn score(&self) -> f64 {
        self.engine.score() as f64
    }

    #[wasm_bindgen(getter)]
    pub fn combo(&self) -> u32 {
        self.engine.combo()
    }

    #[wasm_bindgen(getter)]
    pub fn active_line(&self) -> Option<u32> {
        self.engine.active_line().map(|i| i as u32)
    }

    #[wasm_bindgen(getter)]
    pub fn mic_enabled(&self) -> bool {
        self.engine.mic_enabled()
    }

    /// Flat `[t0, hz0, t1, hz1, ...]` pitch trail for the pitch rail.
    pub fn trail(&self) -> js_sys::Float64Array {
        js_sys::Float64Array::from(&self.engine.trail().to_flat()[..])
    }

    /// Same trail as `[t0, midi0, t1, midi1, ...]` with fractional MIDI.
    pub fn trail_midi(&self) -> js_sys::Float64Array {
        js_sys::Float64Array::from(&self.engine.trail().to_flat_midi()[..])
    }

    pub fn recent_judgements(&self) -> Result<JsValue, JsValue> {
        let recent: Vec<_> = self.engine.board().recent().copied().collect();
        to_js(&recent)
    }

    pub fn summary(&self) -> Result<JsValue, JsValue> {
        to_js(&self.engine.summary())
    }
}
