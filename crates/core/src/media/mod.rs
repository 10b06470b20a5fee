//! Encoder capabilities and H.264 bitstream helpers.
//!
//! A native H.264 encoder is consumed through two traits:
//!
//! - [`Encoder`]: a registered capability (one per native encoder name)
//!   that can allocate contexts.
//! - [`EncoderContext`]: one stateful encoder instance. It is configured
//!   once, opened, fed frames, drained, and closed.
//!
//! The contract mirrors libavcodec's send/receive API. Every submitted frame
//! may produce zero, one, or several packets, and the encoder tells the
//! caller when it has nothing more ([`Receive::WouldBlock`]) or will never
//! produce more ([`Receive::EndOfStream`]).
//!
//! ## Backends
//!
//! | Backend | Module | Feature |
//! |---------|--------|---------|
//! | libavcodec (`libx264`, `h264_v4l2m2m`, ...) | `ffmpeg` | `ffmpeg` |
//!
//! ## Implementing a new backend
//!
//! 1. Implement [`EncoderContext`] over the native handle.
//! 2. Implement [`Encoder`] to allocate it.
//! 3. Register it with [`EncoderRegistry::register`].

#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;
pub mod h264;
mod registry;

pub use registry::EncoderRegistry;

use crate::error::ErrorCode;
use crate::frame::PlanarFrame;
use crate::session::EncoderConfig;

/// Outcome of a native call: `Ok` or a negative status code.
pub type Status = std::result::Result<(), ErrorCode>;

/// A registered H.264 encoder capability.
pub trait Encoder: Send + Sync {
    /// Registry key, e.g. `"libx264"`.
    fn name(&self) -> &str;

    /// Allocate a fresh, unconfigured context.
    ///
    /// `None` means the native allocator returned nothing.
    fn alloc_context(&self) -> Option<Box<dyn EncoderContext>>;
}

/// One native encoder instance.
///
/// Calls arrive in this order: [`configure`](Self::configure) once,
/// [`open`](Self::open) once, then any number of frame cycles, then
/// [`close`](Self::close). A frame cycle is
/// [`make_frame_writable`](Self::make_frame_writable),
/// [`send_frame`](Self::send_frame), repeated
/// [`receive_packet`](Self::receive_packet), and finally
/// [`release_frame`](Self::release_frame).
pub trait EncoderContext: Send {
    /// Apply resolution, pixel format, time base, key-frame cadence, and
    /// backend options.
    fn configure(&mut self, config: &EncoderConfig);

    /// Activate the configured context and allocate its frame.
    fn open(&mut self) -> Status;

    /// Make sure the context's frame is not still referenced by the encoder
    /// before it is overwritten.
    fn make_frame_writable(&mut self) -> Status;

    /// Submit one frame stamped with `pts`.
    fn send_frame(&mut self, frame: &PlanarFrame<'_>, pts: i64) -> Status;

    /// Signal that no more frames will be sent.
    fn send_eof(&mut self) -> Status;

    /// Poll the next ready packet.
    ///
    /// The returned packet borrows encoder-owned storage; it is released
    /// when dropped, before the next poll.
    fn receive_packet(&mut self) -> Receive<'_>;

    /// Drop this cycle's frame reference.
    fn release_frame(&mut self) {}

    /// Release the native context. Called at most once.
    fn close(&mut self);
}

/// Result of polling an encoder for output.
#[derive(Debug)]
pub enum Receive<'a> {
    /// A packet is ready.
    Packet(CompressedPacket<'a>),
    /// Nothing ready now; the encoder is holding frames back.
    WouldBlock,
    /// The encoder is fully drained and will produce nothing more.
    EndOfStream,
    /// Hard failure.
    Failed(ErrorCode),
}

/// Encoded payload on loan from the encoder.
#[derive(Debug, Clone, Copy)]
pub struct CompressedPacket<'a> {
    pub data: &'a [u8],
    pub pts: Option<i64>,
}
