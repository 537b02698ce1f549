//! Line-timed lyrics (LRC) parsing

use std::path::Path;

use tracing::debug;

use crate::domain::model::{LyricLine, WordTiming};
use crate::error::{BeatCutError, BeatCutResult};
use crate::utils::time::TimeParser;

/// Display time for the last line
const LAST_LINE_SECONDS: f64 = 4.0;
/// No line stays on screen longer than this
const MAX_LINE_SECONDS: f64 = 5.0;

/// A timed line before end times are resolved
#[derive(Debug, Clone)]
struct Event {
    start: f64,
    text: String,
    words: Vec<WordTiming>,
}

/// Read and parse an LRC file
pub fn load_lrc(path: &Path) -> BeatCutResult<Vec<LyricLine>> {
    let content = std::fs::read_to_string(path).map_err(|e| BeatCutError::InvalidLyrics {
        line: 0,
        message: format!("cannot read {}: {}", path.display(), e),
    })?;
    parse_lrc(&content)
}

/// Parse LRC text into non-overlapping lines with strictly increasing starts
pub fn parse_lrc(content: &str) -> BeatCutResult<Vec<LyricLine>> {
    let parser = TimeParser::new();
    let mut offset = 0.0;
    let mut events: Vec<Event> = Vec::new();

    for (number, raw) in content.lines().enumerate() {
        let line_number = number + 1;
        let mut rest = raw.trim();
        let mut stamps: Vec<f64> = Vec::new();

        while let Some(body_end) = rest.strip_prefix('[').and_then(|r| r.find(']')) {
            let tag = &rest[1..body_end + 1];
            rest = rest[body_end + 2..].trim_start();

            if let Some(time) = parser.parse_lrc_timestamp(tag) {
                stamps.push(time);
            } else if tag.starts_with(|c: char| c.is_ascii_digit()) {
                return Err(BeatCutError::InvalidLyrics {
                    line: line_number,
                    message: format!("malformed timestamp [{}]", tag),
                });
            } else if let Some((key, value)) = tag.split_once(':') {
                if key.trim().eq_ignore_ascii_case("offset") {
                    let millis: f64 = value.trim().parse().map_err(|_| BeatCutError::InvalidLyrics {
                        line: line_number,
                        message: format!("invalid offset '{}'", value.trim()),
                    })?;
                    // Positive offsets make lyrics appear sooner
                    offset = -millis / 1000.0;
                } else {
                    debug!("Ignoring LRC tag [{}]", tag);
                }
            }
        }

        if stamps.is_empty() {
            continue;
        }

        let (text, words) = split_words(rest, &parser);
        for start in stamps {
            events.push(Event {
                start,
                text: text.clone(),
                words: words.clone(),
            });
        }
    }

    if events.is_empty() {
        return Err(BeatCutError::InvalidLyrics {
            line: 0,
            message: "no timed lines found".to_string(),
        });
    }

    for event in &mut events {
        event.start = (event.start + offset).max(0.0);
        for word in &mut event.words {
            word.start = (word.start + offset).max(0.0);
        }
    }
    events.sort_by(|a, b| a.start.total_cmp(&b.start));

    Ok(resolve(merge_same_start(events)))
}

/// Lines sharing one timestamp are shown together
fn merge_same_start(events: Vec<Event>) -> Vec<Event> {
    let mut merged: Vec<Event> = Vec::with_capacity(events.len());
    for event in events {
        match merged.last_mut() {
            Some(previous) if (previous.start - event.start).abs() < 1e-9 => {
                if !event.text.is_empty() {
                    if !previous.text.is_empty() {
                        previous.text.push_str(" / ");
                    }
                    previous.text.push_str(&event.text);
                    previous.words.extend(event.words);
                }
            }
            _ => merged.push(event),
        }
    }
    merged
}

/// End each line at the next event, within the display cap. Empty events only end lines.
fn resolve(events: Vec<Event>) -> Vec<LyricLine> {
    let mut lines = Vec::new();
    for (i, event) in events.iter().enumerate() {
        if event.text.is_empty() {
            continue;
        }
        let next = events
            .get(i + 1)
            .map(|e| e.start)
            .unwrap_or(event.start + LAST_LINE_SECONDS);
        let end = next.min(event.start + MAX_LINE_SECONDS);

        let mut line = LyricLine::new(event.start, end, event.text.clone());
        line.words = close_words(&event.words, end);
        lines.push(line);
    }
    lines
}

fn close_words(words: &[WordTiming], line_end: f64) -> Vec<WordTiming> {
    words
        .iter()
        .enumerate()
        .map(|(i, word)| WordTiming {
            start: word.start,
            end: Some(
                words
                    .get(i + 1)
                    .map(|next| next.start)
                    .unwrap_or(line_end)
                    .min(line_end),
            ),
            text: word.text.clone(),
        })
        .collect()
}

/// Strip enhanced-LRC `<mm:ss.xx>` word stamps, returning plain text and word timings
fn split_words(text: &str, parser: &TimeParser) -> (String, Vec<WordTiming>) {
    if !text.contains('<') {
        return (text.trim().to_string(), Vec::new());
    }

    let mut plain = String::new();
    let mut words = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let stamped = rest
            .strip_prefix('<')
            .and_then(|r| r.find('>').map(|end| (&r[..end], &r[end + 1..])))
            .and_then(|(tag, after)| parser.parse_lrc_timestamp(tag).map(|t| (t, after)));

        match stamped {
            Some((start, after)) => {
                let word_end = after.find('<').unwrap_or(after.len());
                let word = after[..word_end].trim();
                if !word.is_empty() {
                    words.push(WordTiming {
                        start,
                        end: None,
                        text: word.to_string(),
                    });
                }
                plain.push_str(&after[..word_end]);
                rest = &after[word_end..];
            }
            None => {
                let skip = rest.chars().next().map_or(rest.len(), char::len_utf8);
                let next = rest[skip..].find('<').map(|i| i + skip).unwrap_or(rest.len());
                plain.push_str(&rest[..next]);
                rest = &rest[next..];
            }
        }
    }

    let plain = plain.split_whitespace().collect::<Vec<_>>().join(" ");
    (plain, words)
}
