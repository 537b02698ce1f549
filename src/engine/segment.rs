//! Segment rendering (Pass 1)
//!
//! Each segment becomes a silent intermediate with identical codec
//! parameters: cropped and scaled to the output frame, time-remapped by the
//! segment speed, and cut to an exact frame count.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::config::{CaptionSettings, OutputSettings};
use crate::domain::model::{segment_file_path, EditPlan, LyricLine, Segment};
use crate::error::{BeatCutError, BeatCutResult};
use crate::ports::{ExecutePort, SegmentEncode};

/// Everything needed to render one segment
#[derive(Debug, Clone, PartialEq)]
pub struct RenderUnit {
    pub segment: Segment,
    /// Position of the segment on the output timeline
    pub timeline_start: f64,
    /// Frames this segment contributes to the output
    pub frame_count: u64,
    /// Caption lines in segment-local time
    pub captions: Vec<LyricLine>,
    pub output: PathBuf,
}

/// Frames per segment from cumulative boundaries, so the total is `round(sum * fps)`
pub fn frame_budget(durations: &[f64], fps: u32) -> Vec<u64> {
    let fps = fps as f64;
    let mut boundary = 0.0;
    durations
        .iter()
        .map(|duration| {
            let start = (boundary * fps).round() as u64;
            boundary += duration;
            let end = (boundary * fps).round() as u64;
            end.saturating_sub(start).max(1)
        })
        .collect()
}

/// Lines overlapping `[start, end)`, clipped and moved to segment-local time
pub fn captions_for(lyrics: &[LyricLine], start: f64, end: f64) -> Vec<LyricLine> {
    lyrics
        .iter()
        .filter(|line| line.start < end && line.end > start)
        .map(|line| {
            let mut local = line.shifted(-start);
            local.start = local.start.max(0.0);
            local.end = local.end.min(end - start);
            local
        })
        .collect()
}

/// One render unit per plan segment, in plan order
pub fn build_units(plan: &EditPlan, lyrics: &[LyricLine], fps: u32, work_dir: &Path) -> Vec<RenderUnit> {
    let durations: Vec<f64> = plan.segments.iter().map(|s| s.duration).collect();
    let frames = frame_budget(&durations, fps);

    plan.segments
        .iter()
        .zip(plan.segment_starts())
        .zip(frames)
        .map(|((segment, start), frame_count)| RenderUnit {
            segment: segment.clone(),
            timeline_start: start,
            frame_count,
            captions: captions_for(lyrics, start, start + segment.duration),
            output: segment_file_path(work_dir, segment.index),
        })
        .collect()
}

/// Greedy word wrap; a word longer than the limit gets its own row
pub fn wrap_caption(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut rows: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > max_chars {
            rows.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        rows.push(current);
    }
    rows
}

/// Escape text for a quoted drawtext value
pub fn escape_drawtext(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push('\u{2019}'),
            ':' => escaped.push_str("\\:"),
            '%' => escaped.push_str("\\%"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

/// Builds `-vf` graphs for one output format
#[derive(Debug, Clone)]
pub struct FilterGraph {
    output: OutputSettings,
    captions: CaptionSettings,
}

impl FilterGraph {
    pub fn new(output: OutputSettings, captions: CaptionSettings) -> Self {
        Self { output, captions }
    }

    pub fn video_filter(&self, unit: &RenderUnit) -> String {
        let (w, h, fps) = (self.output.width, self.output.height, self.output.fps);
        let mut filters = vec![
            format!("setpts=(PTS-STARTPTS)/{:.6}", unit.segment.speed),
            format!("scale=w={}:h={}:force_original_aspect_ratio=increase", w, h),
            format!("crop={}:{}", w, h),
            "setsar=1".to_string(),
            format!("fps={}", fps),
        ];

        if self.captions.enabled {
            for line in &unit.captions {
                filters.extend(self.drawtext(line));
            }
        }

        filters.push("format=yuv420p".to_string());
        // Clone the last frame if the source runs short; -frames:v trims the rest
        filters.push("tpad=stop_mode=clone:stop_duration=1".to_string());
        filters.join(",")
    }

    fn drawtext(&self, line: &LyricLine) -> Vec<String> {
        let rows = wrap_caption(&line.text, self.captions.max_chars_per_line);
        let font = match &self.captions.font_file {
            Some(path) => format!("fontfile='{}'", escape_filter_path(path)),
            None => "font='Sans'".to_string(),
        };
        let size = self.captions.font_size;
        let line_height = (size as f64 * 1.2).round() as i64;
        let anchor = (self.output.height as f64 * self.captions.position).round() as i64;
        let first_row = anchor - line_height * rows.len() as i64 / 2;

        rows.iter()
            .enumerate()
            .map(|(row, text)| {
                format!(
                    "drawtext={}:text='{}':fontsize={}:fontcolor=white:borderw=4:bordercolor=black:x=(w-text_w)/2:y={}:enable='between(t,{:.3},{:.3})'",
                    font,
                    escape_drawtext(text),
                    size,
                    first_row + line_height * row as i64,
                    line.start,
                    line.end
                )
            })
            .collect()
    }
}

/// Renders single segments through the execution port
pub struct SegmentRenderer {
    exec: Arc<dyn ExecutePort>,
    graph: FilterGraph,
    fps: u32,
    codec_args: Vec<String>,
}

impl SegmentRenderer {
    pub fn new(
        exec: Arc<dyn ExecutePort>,
        output: OutputSettings,
        captions: CaptionSettings,
        codec_args: Vec<String>,
    ) -> Self {
        let fps = output.fps;
        Self {
            exec,
            graph: FilterGraph::new(output, captions),
            fps,
            codec_args,
        }
    }

    /// Fully resolved encode for a unit
    pub fn request(&self, unit: &RenderUnit) -> SegmentEncode {
        let segment = &unit.segment;
        SegmentEncode {
            index: segment.index,
            source: segment.clip_path.clone(),
            seek: segment.source_in,
            span: segment.span(),
            video_filter: self.graph.video_filter(unit),
            frame_count: unit.frame_count,
            fps: self.fps,
            codec_args: self.codec_args.clone(),
            output: unit.output.clone(),
        }
    }

    /// Render one segment to its intermediate file. Every failure names the segment index.
    pub async fn render_segment(&self, unit: &RenderUnit) -> BeatCutResult<()> {
        let index = unit.segment.index;
        let request = self.request(unit);
        debug!(
            "Segment {}: {} [{:.3}s..{:.3}s] x{:.3} -> {} frames",
            index,
            unit.segment.clip_id,
            unit.segment.source_in,
            unit.segment.source_out,
            unit.segment.speed,
            unit.frame_count
        );

        self.exec.encode_segment(&request).await.map_err(|e| match e {
            BeatCutError::Render { .. } => e,
            other => BeatCutError::render(index, other.to_string()),
        })?;

        let written = tokio::fs::metadata(&unit.output)
            .await
            .map(|meta| meta.len() > 0)
            .unwrap_or(false);
        if !written {
            return Err(BeatCutError::render(
                index,
                format!("encoder produced no output at {}", unit.output.display()),
            ));
        }
        Ok(())
    }
}
