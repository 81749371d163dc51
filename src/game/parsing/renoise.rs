//! Renoise songs.
//!
//! Only the parts a drum chart needs are read:
//!
//! - `GlobalSongData`: `BeatsPerMin`, `LinesPerBeat`, `SignatureNumerator`
//! - `PatternSequence/SequenceEntries`: the play order, as pattern indices
//! - `PatternPool/Patterns`: per pattern, `NumberOfLines` and for every
//!   `PatternTrack` line the instrument of its first note column
//!
//! Every sequence entry expands to its pattern's lines. A line whose first
//! note column plays instrument `n` sets bit `n` of that step's mask.

use std::io::{BufRead, Cursor, Read, Seek};

use log::debug;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use zip::ZipArchive;

use crate::core::drum::DrumMask;
use crate::game::chart::Chart;
use crate::game::parsing::{ChartError, invalid};

const SONG_ENTRY: &str = "Song.xml";

#[derive(Debug, Default)]
struct Pattern {
    lines: Option<usize>,
    hits: Vec<(usize, u32)>,
}

#[derive(Debug, Default)]
struct Song {
    bpm: Option<String>,
    lpb: Option<String>,
    signature: Option<String>,
    sequence: Vec<String>,
    patterns: Vec<Pattern>,
}

/// State of the `Line` currently being read.
#[derive(Debug, Default)]
struct LineCursor {
    index: Option<usize>,
    note_columns: usize,
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().local_name().as_ref()).into_owned()
}

fn ends_with(path: &[String], suffix: &[&str]) -> bool {
    path.len() >= suffix.len()
        && path[path.len() - suffix.len()..]
            .iter()
            .zip(suffix)
            .all(|(a, b)| a == b)
}

pub fn parse_xml(xml: &[u8]) -> Result<Chart, ChartError> {
    let song = read_song(Reader::from_reader(xml))?;
    build_chart(song)
}

/// Reads `Song.xml` out of a zipped `.xrns` song.
pub fn parse_xrns<R: Read + Seek>(archive: R) -> Result<Chart, ChartError> {
    let mut archive = ZipArchive::new(archive)?;
    let mut entry = archive.by_name(SONG_ENTRY)?;
    let mut xml = Vec::new();
    entry
        .read_to_end(&mut xml)
        .map_err(|e| ChartError::Archive(format!("cannot read {SONG_ENTRY}: {e}")))?;
    parse_xml(&xml)
}

fn read_song<R: BufRead>(mut reader: Reader<R>) -> Result<Song, ChartError> {
    reader.config_mut().trim_text(true);

    let mut song = Song::default();
    let mut path: Vec<String> = Vec::new();
    let mut line = LineCursor::default();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = local_name(&e);
                match name.as_str() {
                    "Pattern" if ends_with(&path, &["PatternPool", "Patterns"]) => {
                        song.patterns.push(Pattern::default());
                    }
                    "Line" if ends_with(&path, &["PatternTrack", "Lines"]) => {
                        line = LineCursor {
                            index: line_index(&e)?,
                            note_columns: 0,
                        };
                    }
                    "NoteColumn" if ends_with(&path, &["Line", "NoteColumns"]) => {
                        line.note_columns += 1;
                    }
                    _ => {}
                }
                path.push(name);
            }
            Event::Empty(e) => {
                // Self-closing pattern still occupies its pool slot.
                let name = local_name(&e);
                if name == "Pattern" && ends_with(&path, &["PatternPool", "Patterns"]) {
                    song.patterns.push(Pattern::default());
                } else if name == "NoteColumn" && ends_with(&path, &["Line", "NoteColumns"]) {
                    line.note_columns += 1;
                }
            }
            Event::Text(e) => {
                let text = e.unescape()?.into_owned();
                read_text(&mut song, &path, &line, text);
            }
            Event::End(_) => {
                path.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(song)
}

fn line_index(e: &BytesStart<'_>) -> Result<Option<usize>, ChartError> {
    let Some(attr) = e.try_get_attribute("index")? else {
        return Ok(None);
    };
    let value = attr.unescape_value()?;
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|_| invalid("Line@index", value, "a line number"))
}

fn read_text(song: &mut Song, path: &[String], line: &LineCursor, text: String) {
    if ends_with(path, &["GlobalSongData", "BeatsPerMin"]) {
        song.bpm = Some(text);
    } else if ends_with(path, &["GlobalSongData", "LinesPerBeat"]) {
        song.lpb = Some(text);
    } else if ends_with(path, &["GlobalSongData", "SignatureNumerator"]) {
        song.signature = Some(text);
    } else if ends_with(path, &["SequenceEntries", "SequenceEntry", "Pattern"]) {
        song.sequence.push(text);
    } else if ends_with(path, &["Patterns", "Pattern", "NumberOfLines"]) {
        if let Some(p) = song.patterns.last_mut() {
            p.lines = text.trim().parse().ok();
        }
    } else if ends_with(
        path,
        &["PatternTrack", "Lines", "Line", "NoteColumns", "NoteColumn", "Instrument"],
    ) && line.note_columns == 1
    {
        // Empty cells carry ".." instead of a number.
        let (Some(index), Ok(instrument)) = (line.index, text.trim().parse::<u32>()) else {
            return;
        };
        if let Some(p) = song.patterns.last_mut() {
            p.hits.push((index, instrument));
        }
    }
}

fn required<T: std::str::FromStr>(value: Option<String>, field: &str, expected: &str) -> Result<T, ChartError> {
    let value = value.ok_or_else(|| ChartError::MissingElement(field.to_string()))?;
    value.trim().parse().map_err(|_| invalid(field, value, expected))
}

fn build_chart(song: Song) -> Result<Chart, ChartError> {
    let bpm: f64 = required(song.bpm, "BeatsPerMin", "a number")?;
    let lpb: u32 = required(song.lpb, "LinesPerBeat", "a positive integer")?;
    let signature: u32 = required(song.signature, "SignatureNumerator", "a positive integer")?;

    let mut steps = Vec::new();
    for entry in song.sequence {
        let index: usize = entry
            .trim()
            .parse()
            .map_err(|_| invalid("SequenceEntry/Pattern", &entry, "a pattern index"))?;
        let pattern = song.patterns.get(index).ok_or_else(|| {
            invalid(
                "SequenceEntry/Pattern",
                index,
                &format!("an index below {}", song.patterns.len()),
            )
        })?;
        let lines = pattern
            .lines
            .ok_or_else(|| ChartError::MissingElement(format!("Pattern {index}/NumberOfLines")))?;

        let base = steps.len();
        steps.resize(base + lines, DrumMask::empty());
        for &(line, instrument) in &pattern.hits {
            if line < lines && instrument < u32::BITS {
                steps[base + line] |= DrumMask::from_bits_truncate(1 << instrument);
            }
        }
    }

    debug!(
        "Renoise song: {} BPM, {} LPB, {} sequence steps.",
        bpm,
        lpb,
        steps.len()
    );
    Chart::new(bpm, lpb, signature, steps)
}

/// Sniffs zip magic so callers can hand over either a bare `Song.xml` or a
/// whole `.xrns`.
pub fn parse_bytes(data: &[u8]) -> Result<Chart, ChartError> {
    if data.starts_with(b"PK\x03\x04") {
        parse_xrns(Cursor::new(data))
    } else {
        parse_xml(data)
    }
}
