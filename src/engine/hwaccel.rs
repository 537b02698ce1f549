//! Encoder selection for Pass 1 intermediates

use std::fmt;

use tracing::{info, warn};

use crate::config::{EncoderSettings, HardwareAcceleration, OutputSettings};

/// Concrete H.264 encoder used for every segment of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderChoice {
    Nvenc,
    Qsv,
    Amf,
    VideoToolbox,
    Software,
}

impl EncoderChoice {
    /// Detection order for `auto`
    const PREFERENCE: [EncoderChoice; 4] = [
        EncoderChoice::Nvenc,
        EncoderChoice::Qsv,
        EncoderChoice::Amf,
        EncoderChoice::VideoToolbox,
    ];

    /// ffmpeg encoder name
    pub fn codec(&self) -> &'static str {
        match self {
            EncoderChoice::Nvenc => "h264_nvenc",
            EncoderChoice::Qsv => "h264_qsv",
            EncoderChoice::Amf => "h264_amf",
            EncoderChoice::VideoToolbox => "h264_videotoolbox",
            EncoderChoice::Software => "libx264",
        }
    }

    pub fn is_hardware(&self) -> bool {
        !matches!(self, EncoderChoice::Software)
    }

    /// Resolve the configured acceleration against what the local ffmpeg offers.
    /// An explicit request for a missing encoder falls back to software.
    pub fn resolve(requested: HardwareAcceleration, available: &[String]) -> Self {
        let offered = |choice: &EncoderChoice| available.iter().any(|name| name == choice.codec());

        let explicit = match requested {
            HardwareAcceleration::None => return EncoderChoice::Software,
            HardwareAcceleration::Auto => None,
            HardwareAcceleration::Nvenc => Some(EncoderChoice::Nvenc),
            HardwareAcceleration::Qsv => Some(EncoderChoice::Qsv),
            HardwareAcceleration::Amf => Some(EncoderChoice::Amf),
            HardwareAcceleration::VideoToolbox => Some(EncoderChoice::VideoToolbox),
        };

        let chosen = match explicit {
            Some(choice) if offered(&choice) => choice,
            Some(choice) => {
                warn!("{} is not available, encoding in software", choice.codec());
                EncoderChoice::Software
            }
            None => Self::PREFERENCE
                .iter()
                .copied()
                .find(|choice| offered(choice))
                .unwrap_or(EncoderChoice::Software),
        };
        info!("Pass 1 encoder: {}", chosen.codec());
        chosen
    }

    /// Encoder arguments shared by every segment, so stream-copy concat is safe
    pub fn codec_args(&self, encoder: &EncoderSettings, output: &OutputSettings) -> Vec<String> {
        let mut args: Vec<String> = vec!["-c:v".into(), self.codec().into()];

        match self {
            EncoderChoice::Nvenc => {
                args.extend(
                    [
                        "-preset",
                        encoder.hardware_preset.as_str(),
                        "-rc:v",
                        "vbr",
                        "-b:v",
                        output.video_bitrate.as_str(),
                        "-maxrate",
                        output.maxrate.as_str(),
                        "-bufsize",
                        output.bufsize.as_str(),
                    ]
                    .iter()
                    .map(|s| s.to_string()),
                );
            }
            EncoderChoice::Qsv => {
                args.extend(
                    ["-preset", "veryfast", "-b:v", output.video_bitrate.as_str(), "-maxrate", output.maxrate.as_str()]
                        .iter()
                        .map(|s| s.to_string()),
                );
            }
            EncoderChoice::Amf => {
                args.extend(
                    ["-quality", "speed", "-rc", "vbr_peak", "-b:v", output.video_bitrate.as_str(), "-maxrate", output.maxrate.as_str()]
                        .iter()
                        .map(|s| s.to_string()),
                );
            }
            EncoderChoice::VideoToolbox => {
                args.extend(
                    ["-realtime", "1", "-b:v", output.video_bitrate.as_str(), "-maxrate", output.maxrate.as_str()]
                        .iter()
                        .map(|s| s.to_string()),
                );
            }
            EncoderChoice::Software => {
                args.extend(
                    [
                        "-preset".to_string(),
                        encoder.software_preset.clone(),
                        "-crf".to_string(),
                        encoder.crf.to_string(),
                    ],
                );
            }
        }

        args.extend([
            "-profile:v".to_string(),
            "high".to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-g".to_string(),
            encoder.gop.to_string(),
        ]);
        args
    }
}

impl fmt::Display for EncoderChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.codec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offered(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn auto_prefers_nvenc() {
        let available = offered(&["libx264", "h264_qsv", "h264_nvenc"]);
        assert_eq!(EncoderChoice::resolve(HardwareAcceleration::Auto, &available), EncoderChoice::Nvenc);
    }

    #[test]
    fn auto_without_hardware_is_software() {
        let available = offered(&["libx264", "mpeg4"]);
        assert_eq!(EncoderChoice::resolve(HardwareAcceleration::Auto, &available), EncoderChoice::Software);
    }

    #[test]
    fn missing_explicit_encoder_falls_back() {
        let available = offered(&["libx264"]);
        assert_eq!(EncoderChoice::resolve(HardwareAcceleration::Qsv, &available), EncoderChoice::Software);
        assert_eq!(EncoderChoice::resolve(HardwareAcceleration::None, &offered(&["h264_nvenc"])), EncoderChoice::Software);
    }

    #[test]
    fn nvenc_args_use_fast_preset_and_bitrate() {
        let args = EncoderChoice::Nvenc.codec_args(&EncoderSettings::default(), &OutputSettings::default());
        let joined = args.join(" ");
        assert!(joined.starts_with("-c:v h264_nvenc -preset p1"));
        assert!(joined.contains("-b:v 14M -maxrate 18M -bufsize 28M"));
        assert!(joined.ends_with("-pix_fmt yuv420p -g 60"));
    }

    #[test]
    fn software_args_use_crf() {
        let args = EncoderChoice::Software.codec_args(&EncoderSettings::default(), &OutputSettings::default());
        assert!(args.join(" ").contains("-c:v libx264 -preset ultrafast -crf 18"));
    }
}
