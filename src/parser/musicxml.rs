use log::{debug, info};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{KaraokeError, Result};
use crate::timeline::builder::{group_into_lines, LineBreakRules, NoteRow};
use crate::timeline::MelodyTimeline;

pub fn midi_from_pitch(step: char, alter: i32, octave: i32) -> i32 {
    let base = match step {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => 0,
    };
    (octave + 1) * 12 + base + alter
}

/// Sung notes extracted from the first part of a MusicXML score.
#[derive(Clone, Debug)]
pub struct MelodyImport {
    pub title: Option<String>,
    /// Tempo in effect at the first note, quarter notes per minute.
    pub initial_tempo: f64,
    pub rows: Vec<NoteRow>,
}

fn tempo_attr(e: &BytesStart) -> Option<f64> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == b"tempo")
        .and_then(|attr| std::str::from_utf8(&attr.value).ok()?.parse::<f64>().ok())
        .filter(|t| *t > 0.0)
}

/// Read the vocal line of a MusicXML score as timed note rows.
///
/// Only the first `<part>` and the first voice seen in it are read. Chord
/// members other than the first are ignored, tied notes are merged, rests
/// advance time, and tempo changes apply from the point they appear. Lyric
/// syllables that end a word get a trailing space so grouped line text
/// reads naturally.
pub fn parse_melody(xml: &str) -> Result<MelodyImport> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();

    let mut divisions: f64 = 1.0;
    let mut tempo: f64 = 120.0;
    let mut initial_tempo: Option<f64> = None;
    let mut rows: Vec<NoteRow> = Vec::new();
    let mut current_time: f64 = 0.0;

    let mut current_tag: Option<&'static str> = None;
    let mut in_first_part = false;
    let mut parts_seen = 0u32;
    let mut title: Option<String> = None;

    // Note state
    let mut in_note = false;
    let mut note_is_rest = false;
    let mut note_is_chord = false;
    let mut note_is_grace = false;
    let mut tie_stop = false;
    let mut note_duration_divs: Option<f64> = None;
    let mut step: Option<char> = None;
    let mut alter: i32 = 0;
    let mut octave: Option<i32> = None;
    let mut in_lyric = false;
    let mut lyric_taken = false;
    let mut syllabic = String::new();
    let mut lyric_text = String::new();
    let mut note_voice: Option<String> = None;
    let mut melody_voice: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = e.name();
                match name.as_ref() {
                    b"part" => {
                        parts_seen += 1;
                        in_first_part = parts_seen == 1;
                    }
                    b"note" if in_first_part => {
                        in_note = true;
                        note_is_rest = false;
                        note_is_chord = false;
                        note_is_grace = false;
                        tie_stop = false;
                        note_duration_divs = None;
                        step = None;
                        alter = 0;
                        octave = None;
                        lyric_taken = false;
                        syllabic.clear();
                        lyric_text.clear();
                        note_voice = None;
                    }
                    b"rest" if in_note => note_is_rest = true,
                    b"chord" if in_note => note_is_chord = true,
                    b"lyric" if in_note && !lyric_taken => in_lyric = true,
                    b"divisions" => current_tag = Some("divisions"),
                    b"duration" => current_tag = Some("duration"),
                    b"step" => current_tag = Some("step"),
                    b"alter" => current_tag = Some("alter"),
                    b"octave" => current_tag = Some("octave"),
                    b"voice" if in_note => current_tag = Some("voice"),
                    b"per-minute" => current_tag = Some("per-minute"),
                    b"movement-title" => current_tag = Some("movement-title"),
                    b"work-title" => current_tag = Some("work-title"),
                    b"syllabic" if in_lyric => current_tag = Some("syllabic"),
                    b"text" if in_lyric => current_tag = Some("text"),
                    b"sound" => {
                        if let Some(t) = tempo_attr(e) {
                            tempo = t;
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"sound" => {
                    if let Some(t) = tempo_attr(e) {
                        tempo = t;
                    }
                }
                b"rest" if in_note => note_is_rest = true,
                b"chord" if in_note => note_is_chord = true,
                b"grace" if in_note => note_is_grace = true,
                b"tie" if in_note => {
                    let is_stop = e
                        .attributes()
                        .flatten()
                        .any(|a| a.key.as_ref() == b"type" && a.value.as_ref() == b"stop");
                    if is_stop {
                        tie_stop = true;
                    }
                }
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if let Some(tag) = current_tag.take() {
                    let text = e.unescape().map_err(|e| KaraokeError::MusicXml(e.to_string()))?;
                    match tag {
                        "divisions" => {
                            if let Ok(v) = text.parse::<f64>() {
                                if v > 0.0 {
                                    divisions = v;
                                }
                            }
                        }
                        "per-minute" => {
                            if let Ok(v) = text.parse::<f64>() {
                                if v > 0.0 {
                                    tempo = v;
                                }
                            }
                        }
                        "duration" => {
                            if let Ok(v) = text.parse::<f64>() {
                                note_duration_divs = Some(v);
                            }
                        }
                        "step" => step = text.chars().next(),
                        "alter" => {
                            // Microtonal alters are rounded to the nearest semitone
                            if let Ok(v) = text.parse::<f64>() {
                                alter = v.round() as i32;
                            }
                        }
                        "octave" => {
                            if let Ok(v) = text.parse::<i32>() {
                                octave = Some(v);
                            }
                        }
                        "voice" => note_voice = Some(text.to_string()),
                        "syllabic" => syllabic = text.to_string(),
                        "text" => lyric_text.push_str(&text),
                        "movement-title" | "work-title" => {
                            if title.is_none() {
                                title = Some(text.to_string());
                            }
                        }
                        _ => {}
                    }
                }
            }
            Ok(Event::End(ref e)) => {
                let name = e.name();
                match name.as_ref() {
                    b"part" => in_first_part = false,
                    b"lyric" if in_lyric => {
                        in_lyric = false;
                        lyric_taken = true;
                    }
                    b"note" if in_note => 'note: {
                        in_note = false;
                        let voice = note_voice.take();
                        if melody_voice.is_none() {
                            melody_voice = voice.clone();
                        }
                        // Grace notes, lower chord members and other voices
                        // take no melody time
                        if note_is_grace || note_is_chord || voice != melody_voice {
                            break 'note;
                        }
                        let duration_beats = note_duration_divs.unwrap_or(0.0) / divisions;
                        let start_time = current_time;
                        current_time += duration_beats * 60.0 / tempo;
                        if note_is_rest {
                            break 'note;
                        }

                        let s = step
                            .ok_or_else(|| KaraokeError::MusicXml("Missing pitch step".into()))?;
                        let o = octave
                            .ok_or_else(|| KaraokeError::MusicXml("Missing pitch octave".into()))?;
                        let midi = midi_from_pitch(s, alter, o) as f64;
                        initial_tempo.get_or_insert(tempo);

                        let extends_tie = tie_stop
                            && rows.last().is_some_and(|prev| {
                                prev.midi == midi && (prev.end_time - start_time).abs() < 1e-6
                            });
                        if extends_tie {
                            if let Some(prev) = rows.last_mut() {
                                prev.end_time = current_time;
                            }
                        } else {
                            let mut syllable = lyric_text.clone();
                            let ends_word = matches!(syllabic.as_str(), "" | "single" | "end");
                            if !syllable.is_empty() && ends_word {
                                syllable.push(' ');
                            }
                            rows.push(NoteRow {
                                start_time,
                                end_time: current_time,
                                midi,
                                syllable,
                            });
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(KaraokeError::MusicXml(format!("XML parse error: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    debug!("Parsed {} sung notes from MusicXML", rows.len());
    Ok(MelodyImport {
        title,
        initial_tempo: initial_tempo.unwrap_or(tempo),
        rows,
    })
}

/// Import a MusicXML melody straight into a timeline.
pub fn parse_musicxml_timeline(xml: &str, rules: &LineBreakRules) -> Result<MelodyTimeline> {
    let import = parse_melody(xml)?;
    if import.rows.is_empty() {
        return Err(KaraokeError::EmptyTimeline);
    }
    info!(
        "Imported '{}' at {} bpm",
        import.title.as_deref().unwrap_or("untitled"),
        import.initial_tempo
    );
    Ok(MelodyTimeline::from_lines(group_into_lines(import.rows, rules)))
}
