//! H.264 frame encode pipeline.
//!
//! Turns bitmaps of any pixel format into an H.264 Annex-B byte stream
//! through a pluggable native encoder.
//!
//! ```text
//! Bitmap -> frame::convert -> PlanarFrame -> EncoderSession::encode
//!        -> send_frame / receive_packet ... -> Vec<u8>
//! ```
//!
//! Native encoders plug in through [`media::Encoder`] and are looked up in
//! an [`EncoderRegistry`]. With the `ffmpeg` feature, libavcodec's H.264
//! encoders are available via [`EncoderRegistry::with_defaults`].

pub mod cancel;
pub mod error;
pub mod factory;
pub mod frame;
pub mod media;
pub mod session;
pub mod source;

pub use cancel::CancelToken;
pub use error::{ConfigErrorKind, EncodeError, ErrorCode, Result, Stage};
pub use factory::{EncoderFactory, H264_MIME_TYPE};
pub use frame::{Bitmap, FrameBuffer, PlanarFrame, PlanarImage, Rect, Subsampling};
pub use media::EncoderRegistry;
pub use session::{EncoderConfig, EncoderSession, EncoderStats, PixelFormat, SessionState, TimeBase};
pub use source::{EncodeStream, FrameSource};
