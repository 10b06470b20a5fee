use std::fmt;

use crate::error::{ConfigErrorKind, EncodeError, Result};
use crate::frame::Subsampling;

/// Planar pixel format handed to the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    /// 8-bit Y/Cb/Cr, chroma halved in both directions.
    #[default]
    Yuv420p,
    /// 8-bit Y/Cb/Cr, full-resolution chroma.
    Yuv444p,
}

impl PixelFormat {
    pub fn subsampling(self) -> Subsampling {
        match self {
            Self::Yuv420p => Subsampling::Yuv420,
            Self::Yuv444p => Subsampling::Yuv444,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yuv420p => write!(f, "yuv420p"),
            Self::Yuv444p => write!(f, "yuv444p"),
        }
    }
}

/// Seconds per timestamp tick, as a rational `num / den`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBase {
    pub num: u32,
    pub den: u32,
}

impl TimeBase {
    pub const fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    /// One tick per frame at `fps` frames per second.
    pub const fn from_fps(fps: u32) -> Self {
        Self::new(1, fps)
    }
}

impl Default for TimeBase {
    fn default() -> Self {
        Self::from_fps(30)
    }
}

impl fmt::Display for TimeBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Parameters applied to an encoder context before it is opened.
///
/// Fixed for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderConfig {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub time_base: TimeBase,
    /// Force a key frame every N frames. `None` leaves the cadence to the encoder.
    pub key_frame_interval: Option<u32>,
    /// Registered encoder to use. `None` picks the registry default.
    pub encoder: Option<String>,
    /// Backend-specific `key=value` options, passed through verbatim.
    pub options: Vec<(String, String)>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            pixel_format: PixelFormat::default(),
            time_base: TimeBase::default(),
            key_frame_interval: None,
            encoder: None,
            options: Vec::new(),
        }
    }
}

impl EncoderConfig {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn pixel_format(mut self, pixel_format: PixelFormat) -> Self {
        self.pixel_format = pixel_format;
        self
    }

    pub fn time_base(mut self, time_base: TimeBase) -> Self {
        self.time_base = time_base;
        self
    }

    pub fn key_frame_interval(mut self, interval: u32) -> Self {
        self.key_frame_interval = Some(interval);
        self
    }

    pub fn encoder(mut self, name: impl Into<String>) -> Self {
        self.encoder = Some(name.into());
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.push((key.into(), value.into()));
        self
    }

    pub fn subsampling(&self) -> Subsampling {
        self.pixel_format.subsampling()
    }

    /// Check the invariants every session relies on.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(EncodeError::InvalidConfig(ConfigErrorKind::ZeroDimension));
        }
        if self.time_base.num == 0 || self.time_base.den == 0 {
            return Err(EncodeError::InvalidConfig(ConfigErrorKind::ZeroTimeBase));
        }
        if self.key_frame_interval == Some(0) {
            return Err(EncodeError::InvalidConfig(
                ConfigErrorKind::ZeroKeyFrameInterval,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EncoderConfig::default();
        assert_eq!((config.width, config.height), (640, 480));
        assert_eq!(config.pixel_format, PixelFormat::Yuv420p);
        assert_eq!(config.time_base.to_string(), "1/30");
        assert_eq!(config.key_frame_interval, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_sets_fields() {
        let config = EncoderConfig::new(320, 240)
            .pixel_format(PixelFormat::Yuv444p)
            .time_base(TimeBase::from_fps(25))
            .key_frame_interval(50)
            .encoder("libx264")
            .option("preset", "ultrafast");
        assert_eq!(config.subsampling(), Subsampling::Yuv444);
        assert_eq!(config.time_base, TimeBase::new(1, 25));
        assert_eq!(config.key_frame_interval, Some(50));
        assert_eq!(config.encoder.as_deref(), Some("libx264"));
        assert_eq!(config.options, [("preset".to_string(), "ultrafast".to_string())]);
    }

    #[test]
    fn validate_rejects_each_violation() {
        let kind = |config: EncoderConfig| match config.validate() {
            Err(EncodeError::InvalidConfig(kind)) => Some(kind),
            _ => None,
        };
        assert_eq!(kind(EncoderConfig::new(0, 480)), Some(ConfigErrorKind::ZeroDimension));
        assert_eq!(kind(EncoderConfig::new(640, 0)), Some(ConfigErrorKind::ZeroDimension));
        assert_eq!(
            kind(EncoderConfig::default().time_base(TimeBase::new(1, 0))),
            Some(ConfigErrorKind::ZeroTimeBase)
        );
        assert_eq!(
            kind(EncoderConfig::default().key_frame_interval(0)),
            Some(ConfigErrorKind::ZeroKeyFrameInterval)
        );
        assert_eq!(kind(EncoderConfig::default().key_frame_interval(1)), None);
    }
}
