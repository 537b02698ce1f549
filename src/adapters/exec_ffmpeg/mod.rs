//! FFmpeg execution adapter
//!
//! Builds ffmpeg command lines for Pass 1 segment encodes and the Pass 2
//! concat/mux, and runs them as child processes.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{BeatCutError, BeatCutResult};
use crate::ports::{AudioSource, ConcatMux, ExecutePort, SegmentEncode};

/// Lines of stderr kept for error messages
const STDERR_TAIL_LINES: usize = 12;

/// One ffmpeg input with its own options
#[derive(Debug, Clone, PartialEq)]
pub struct FfmpegInput {
    source: String,
    args: Vec<String>,
}

impl FfmpegInput {
    pub fn new(source: impl AsRef<Path>) -> Self {
        Self {
            source: source.as_ref().to_string_lossy().to_string(),
            args: Vec::new(),
        }
    }

    /// Add an input argument (before -i).
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set seek position.
    pub fn seek(self, seconds: f64) -> Self {
        self.arg("-ss").arg(format!("{:.6}", seconds))
    }

    /// Limit how much of the input is read.
    pub fn duration(self, seconds: f64) -> Self {
        self.arg("-t").arg(format!("{:.6}", seconds))
    }

    /// Force the input format.
    pub fn format(self, format: impl Into<String>) -> Self {
        self.arg("-f").arg(format)
    }
}

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    inputs: Vec<FfmpegInput>,
    output: PathBuf,
    output_args: Vec<String>,
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command writing to `output`.
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            inputs: Vec::new(),
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
            log_level: "error".to_string(),
        }
    }

    pub fn input(mut self, input: FfmpegInput) -> Self {
        self.inputs.push(input);
        self
    }

    /// Add output arguments (after the inputs).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set video filter.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Set audio filter.
    pub fn audio_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-af").output_arg(filter)
    }

    /// Set audio codec.
    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    /// Set audio bitrate.
    pub fn audio_bitrate(self, bitrate: impl Into<String>) -> Self {
        self.output_arg("-b:a").output_arg(bitrate)
    }

    /// Map a stream into the output.
    pub fn map(self, spec: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(spec)
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-nostdin".to_string(),
            "-hide_banner".to_string(),
            "-v".to_string(),
            self.log_level.clone(),
        ];

        for input in &self.inputs {
            args.extend(input.args.iter().cloned());
            args.push("-i".to_string());
            args.push(input.source.clone());
        }

        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().to_string());
        args
    }
}

/// Exit status and stderr tail of a finished ffmpeg process
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stderr_tail: String,
}

impl RunOutcome {
    /// Human-readable failure description
    pub fn describe(&self) -> String {
        let code = self
            .exit_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        if self.stderr_tail.is_empty() {
            format!("ffmpeg exited with status {}", code)
        } else {
            format!("ffmpeg exited with status {}: {}", code, self.stderr_tail)
        }
    }
}

/// Runs ffmpeg commands
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    binary: PathBuf,
}

impl FfmpegRunner {
    /// Locate ffmpeg on PATH.
    pub fn locate() -> BeatCutResult<Self> {
        let binary = which::which("ffmpeg").map_err(|_| BeatCutError::FfmpegNotFound {
            tool: "ffmpeg".to_string(),
        })?;
        Ok(Self { binary })
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Run a command to completion.
    pub async fn run(&self, cmd: &FfmpegCommand) -> std::io::Result<RunOutcome> {
        let args = cmd.build_args();
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        Ok(RunOutcome {
            success: output.status.success(),
            exit_code: output.status.code(),
            stderr_tail: stderr_tail(&output.stderr),
        })
    }

    /// Run ffmpeg with raw arguments and capture stdout.
    pub async fn capture(&self, args: &[&str]) -> std::io::Result<(RunOutcome, Vec<u8>)> {
        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        let outcome = RunOutcome {
            success: output.status.success(),
            exit_code: output.status.code(),
            stderr_tail: stderr_tail(&output.stderr),
        };
        Ok((outcome, output.stdout))
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join(" | ")
}

/// Pass 1 command for one segment
pub fn segment_command(request: &SegmentEncode) -> FfmpegCommand {
    let input = FfmpegInput::new(&request.source)
        .seek(request.seek)
        .duration(request.span);

    FfmpegCommand::new(&request.output)
        .input(input)
        .video_filter(&request.video_filter)
        .output_args(["-frames:v".to_string(), request.frame_count.to_string()])
        .output_args(["-r".to_string(), request.fps.to_string()])
        .output_arg("-an")
        .output_args(request.codec_args.iter().cloned())
        .output_args(["-video_track_timescale", "90000"])
        .output_args(["-map_metadata", "-1"])
}

/// Pass 2 command: stream-copy concat plus audio
pub fn concat_command(request: &ConcatMux) -> FfmpegCommand {
    let video = FfmpegInput::new(&request.list_file)
        .format("concat")
        .arg("-safe")
        .arg("0");

    let (audio, audio_filter) = match &request.audio {
        AudioSource::Track { path, offset } => (
            FfmpegInput::new(path).seek(*offset).duration(request.duration),
            Some("apad"),
        ),
        AudioSource::Synthetic { lavfi } => (
            FfmpegInput::new(lavfi).format("lavfi").duration(request.duration),
            None,
        ),
    };

    let mut cmd = FfmpegCommand::new(&request.output)
        .input(video)
        .input(audio)
        .map("0:v:0")
        .map("1:a:0")
        .output_args(["-c:v", "copy"])
        .audio_codec("aac")
        .audio_bitrate(&request.audio_bitrate)
        .output_args(["-ar".to_string(), request.audio_sample_rate.to_string()])
        .output_args(["-ac", "2"]);

    if let Some(filter) = audio_filter {
        cmd = cmd.audio_filter(filter);
    }

    cmd.output_args(["-t".to_string(), format!("{:.6}", request.duration)])
        .output_args(["-map_metadata", "-1"])
        .output_args(["-fflags", "+bitexact"])
        .output_args(["-flags:a", "+bitexact"])
        .output_args(["-movflags", "+faststart"])
        .output_args(["-f", "mp4"])
}

/// Encoder names from `ffmpeg -encoders` output (video encoders only)
pub fn parse_encoder_list(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let flags = fields.next()?;
            let name = fields.next()?;
            if flags.len() == 6 && flags.starts_with('V') && name != "=" {
                Some(name.to_string())
            } else {
                None
            }
        })
        .collect()
}

/// FFmpeg-based execution adapter
pub struct FfmpegAdapter {
    runner: FfmpegRunner,
}

impl FfmpegAdapter {
    /// Create adapter using ffmpeg from PATH
    pub fn new() -> BeatCutResult<Self> {
        Ok(Self {
            runner: FfmpegRunner::locate()?,
        })
    }

    pub fn with_runner(runner: FfmpegRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl ExecutePort for FfmpegAdapter {
    async fn encode_segment(&self, request: &SegmentEncode) -> BeatCutResult<()> {
        if !request.source.is_file() {
            return Err(BeatCutError::render(
                request.index,
                format!("source clip missing: {}", request.source.display()),
            ));
        }

        let outcome = self
            .runner
            .run(&segment_command(request))
            .await
            .map_err(|e| BeatCutError::render(request.index, format!("cannot spawn ffmpeg: {}", e)))?;

        if outcome.success {
            Ok(())
        } else {
            Err(BeatCutError::render(request.index, outcome.describe()))
        }
    }

    async fn concat_and_mux(&self, request: &ConcatMux) -> BeatCutResult<()> {
        let outcome = self
            .runner
            .run(&concat_command(request))
            .await
            .map_err(|e| BeatCutError::assembly(format!("cannot spawn ffmpeg: {}", e)))?;

        if outcome.success {
            Ok(())
        } else {
            Err(BeatCutError::assembly(outcome.describe()))
        }
    }

    async fn available_encoders(&self) -> BeatCutResult<Vec<String>> {
        let (outcome, stdout) = self.runner.capture(&["-hide_banner", "-encoders"]).await?;
        if !outcome.success {
            return Err(BeatCutError::config(outcome.describe()));
        }
        Ok(parse_encoder_list(&String::from_utf8_lossy(&stdout)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_request() -> SegmentEncode {
        SegmentEncode {
            index: 3,
            source: PathBuf::from("/clips/city/a.mp4"),
            seek: 1.5,
            span: 0.95,
            video_filter: "scale=1080:1920".to_string(),
            frame_count: 30,
            fps: 30,
            codec_args: vec!["-c:v".to_string(), "libx264".to_string()],
            output: PathBuf::from("/work/seg_0003.mp4"),
        }
    }

    #[test]
    fn test_segment_command_seeks_before_input() {
        let args = segment_command(&encode_request()).build_args();
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(ss < input);
        assert_eq!(args[ss + 1], "1.500000");
        assert!(args.windows(2).any(|w| w[0] == "-frames:v" && w[1] == "30"));
        assert!(args.contains(&"-an".to_string()));
        assert_eq!(args.last().unwrap(), "/work/seg_0003.mp4");
    }

    #[test]
    fn test_concat_command_copies_video_and_trims_audio() {
        let request = ConcatMux {
            list_file: PathBuf::from("/work/concat.txt"),
            audio: AudioSource::Track {
                path: PathBuf::from("/music/song.mp3"),
                offset: 2.0,
            },
            duration: 12.0,
            audio_bitrate: "192k".to_string(),
            audio_sample_rate: 48_000,
            output: PathBuf::from("/out/final.mp4"),
        };
        let args = concat_command(&request).build_args();
        assert!(args.windows(2).any(|w| w[0] == "-f" && w[1] == "concat"));
        assert!(args.windows(2).any(|w| w[0] == "-c:v" && w[1] == "copy"));
        assert!(args.windows(2).any(|w| w[0] == "-c:a" && w[1] == "aac"));
        assert!(args.windows(2).any(|w| w[0] == "-ss" && w[1] == "2.000000"));
        assert!(args.windows(2).any(|w| w[0] == "-af" && w[1] == "apad"));
    }

    #[test]
    fn test_concat_command_with_synthetic_audio() {
        let request = ConcatMux {
            list_file: PathBuf::from("/work/concat.txt"),
            audio: AudioSource::Synthetic {
                lavfi: "anullsrc=r=48000:cl=stereo".to_string(),
            },
            duration: 6.0,
            audio_bitrate: "192k".to_string(),
            audio_sample_rate: 48_000,
            output: PathBuf::from("/out/final.mp4"),
        };
        let args = concat_command(&request).build_args();
        assert!(args.windows(2).any(|w| w[0] == "-f" && w[1] == "lavfi"));
        assert!(args.contains(&"anullsrc=r=48000:cl=stereo".to_string()));
        assert!(!args.contains(&"apad".to_string()));
    }

    #[test]
    fn test_parse_encoder_list() {
        let text = "Encoders:\n V..... = Video\n A..... = Audio\n ------\n V....D libx264              libx264 H.264\n V....D h264_nvenc           NVIDIA NVENC H.264 encoder\n A....D aac                  AAC (Advanced Audio Coding)\n";
        let encoders = parse_encoder_list(text);
        assert_eq!(encoders, vec!["libx264".to_string(), "h264_nvenc".to_string()]);
    }

    #[test]
    fn test_stderr_tail_keeps_last_lines() {
        let stderr: String = (0..20).map(|i| format!("line {}\n", i)).collect();
        let tail = stderr_tail(stderr.as_bytes());
        assert!(tail.starts_with("line 8"));
        assert!(tail.ends_with("line 19"));
    }
}
