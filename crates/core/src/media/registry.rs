use std::sync::Arc;

use parking_lot::RwLock;

use super::Encoder;

/// Set of named encoder capabilities.
///
/// Cloning shares the underlying set. Registration order matters: the first
/// encoder registered is the default used when a config names none.
///
/// There is no process-wide registry. Whoever opens the first session builds
/// one, usually via [`with_defaults`](Self::with_defaults).
#[derive(Clone, Default)]
pub struct EncoderRegistry {
    encoders: Arc<RwLock<Vec<Arc<dyn Encoder>>>>,
}

impl EncoderRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every backend compiled into this build.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register_defaults();
        registry
    }

    /// Register the compiled-in backends that are available on this host.
    ///
    /// Idempotent: repeated calls re-register under the same names and
    /// leave the set unchanged.
    pub fn register_defaults(&self) {
        #[cfg(feature = "ffmpeg")]
        for encoder in super::ffmpeg::FfmpegEncoder::available() {
            self.register(encoder);
        }
    }

    /// Register an encoder, replacing any existing one with the same name.
    ///
    /// Returns `true` if the name was new. A replacement keeps the
    /// original position.
    pub fn register<E: Encoder + 'static>(&self, encoder: E) -> bool {
        let encoder: Arc<dyn Encoder> = Arc::new(encoder);
        let mut encoders = self.encoders.write();
        if let Some(slot) = encoders.iter_mut().find(|e| e.name() == encoder.name()) {
            tracing::debug!(name = encoder.name(), "encoder re-registered");
            *slot = encoder;
            return false;
        }
        tracing::info!(name = encoder.name(), "encoder registered");
        encoders.push(encoder);
        true
    }

    /// Look up an encoder by exact name.
    pub fn find(&self, name: &str) -> Option<Arc<dyn Encoder>> {
        self.encoders.read().iter().find(|e| e.name() == name).cloned()
    }

    /// The first registered encoder.
    pub fn default_encoder(&self) -> Option<Arc<dyn Encoder>> {
        self.encoders.read().first().cloned()
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.encoders
            .read()
            .iter()
            .map(|e| e.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.encoders.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.encoders.read().is_empty()
    }
}

impl std::fmt::Debug for EncoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncoderRegistry")
            .field("encoders", &self.names())
            .finish()
    }
}
