use crate::error::Result;
use crate::media::EncoderRegistry;
use crate::session::{EncoderConfig, EncoderSession};

/// MIME type of the elementary stream every session produces.
pub const H264_MIME_TYPE: &str = "video/H264";

/// Builds encoder sessions for one output format.
///
/// Holds a registry and a config template; each call fills in the
/// caller's dimensions and key-frame cadence.
#[derive(Debug, Clone)]
pub struct EncoderFactory {
    registry: EncoderRegistry,
    template: EncoderConfig,
}

impl EncoderFactory {
    pub fn new(registry: EncoderRegistry) -> Self {
        Self::with_template(registry, EncoderConfig::default())
    }

    /// Factory whose sessions inherit pixel format, time base, encoder name,
    /// and options from `template`.
    pub fn with_template(registry: EncoderRegistry, template: EncoderConfig) -> Self {
        Self { registry, template }
    }

    pub fn mime_type(&self) -> &'static str {
        H264_MIME_TYPE
    }

    pub fn registry(&self) -> &EncoderRegistry {
        &self.registry
    }

    /// Open a session for `width` x `height` frames with a key frame every
    /// `key_frame_interval` frames.
    pub fn new_encoder(
        &self,
        width: u32,
        height: u32,
        key_frame_interval: u32,
    ) -> Result<EncoderSession> {
        let config = EncoderConfig {
            width,
            height,
            key_frame_interval: Some(key_frame_interval),
            ..self.template.clone()
        };
        EncoderSession::open(config, &self.registry)
    }
}
