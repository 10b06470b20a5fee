//! Frame submission and packet draining.
//!
//! One [`encode`](EncoderSession::encode) call runs a full frame cycle:
//!
//! ```text
//! make_frame_writable -> convert -> stamp pts -> send_frame
//!     -> receive_packet ... (until WouldBlock or EndOfStream)
//!     -> release_frame
//! ```
//!
//! The encoder may hold frames back for reordering, so a call can return
//! zero bytes, and a later call can return packets for earlier frames.
//! A drain failure drops everything the failing call gathered.

use crate::cancel::CancelToken;
use crate::error::{EncodeError, Result};
use crate::frame::{self, Bitmap, FrameBuffer, Subsampling};
use crate::media::{EncoderContext, Receive, h264};

use super::{EncoderSession, SessionState};

/// Output gathered by one drain.
#[derive(Debug, Default)]
struct Drained {
    data: Vec<u8>,
    packets: u64,
    key_frames: u64,
    last_pts: Option<i64>,
}

impl EncoderSession {
    /// Encode one bitmap and return whatever Annex-B bytes the encoder
    /// released in response (possibly none).
    pub fn encode<B: Bitmap + ?Sized>(&mut self, bitmap: &B) -> Result<Vec<u8>> {
        self.run_frame(bitmap, None)
    }

    /// Like [`encode`](Self::encode), but gives up with
    /// [`Cancelled`](EncodeError::Cancelled) once `cancel` fires.
    ///
    /// The token is checked before the frame is submitted and between drain
    /// iterations. Bytes drained before cancellation are discarded.
    pub fn encode_cancellable<B: Bitmap + ?Sized>(
        &mut self,
        bitmap: &B,
        cancel: &CancelToken,
    ) -> Result<Vec<u8>> {
        self.run_frame(bitmap, Some(cancel))
    }

    /// Signal end of input and collect the frames the encoder still holds.
    ///
    /// The session moves to [`Flushed`](SessionState::Flushed) and rejects
    /// further frames with [`SessionClosed`](EncodeError::SessionClosed).
    /// Flushing again only drains.
    pub fn flush(&mut self) -> Result<Vec<u8>> {
        let context = self
            .context
            .as_deref_mut()
            .ok_or(EncodeError::SessionClosed)?;

        if self.state == SessionState::Opened {
            if let Err(code) = context.send_eof() {
                tracing::warn!(encoder = %self.encoder, %code, "encoder rejected end of stream");
                return Err(EncodeError::SendFailed {
                    code,
                    pts: self.next_pts,
                });
            }
            self.state = SessionState::Flushed;
        }

        let drained = drain(context, None)?;
        tracing::debug!(
            encoder = %self.encoder,
            packets = drained.packets,
            bytes = drained.data.len(),
            "encoder flushed"
        );
        Ok(self.record(drained, false))
    }

    fn run_frame<B: Bitmap + ?Sized>(
        &mut self,
        bitmap: &B,
        cancel: Option<&CancelToken>,
    ) -> Result<Vec<u8>> {
        if self.state != SessionState::Opened {
            return Err(EncodeError::SessionClosed);
        }
        let subsampling = self.config.subsampling();
        let context = self
            .context
            .as_deref_mut()
            .ok_or(EncodeError::SessionClosed)?;

        if let Some(cancel) = cancel {
            cancel.check()?;
        }

        if let Err(code) = context.make_frame_writable() {
            tracing::warn!(encoder = %self.encoder, %code, "encoder frame not writable");
            return Err(EncodeError::FrameNotWritable { code });
        }

        let result = submit_and_drain(
            context,
            &mut self.frame,
            &mut self.next_pts,
            subsampling,
            bitmap,
            cancel,
        );
        context.release_frame();

        let drained = result?;
        Ok(self.record(drained, true))
    }

    /// Fold a successful drain into the session totals and hand back its bytes.
    fn record(&mut self, drained: Drained, submitted: bool) -> Vec<u8> {
        if submitted {
            self.stats.frames_submitted += 1;
        }
        self.stats.packets += drained.packets;
        self.stats.bytes += drained.data.len() as u64;
        self.stats.key_frames += drained.key_frames;
        if drained.last_pts.is_some() {
            self.stats.last_pts = drained.last_pts;
        }
        if !drained.data.is_empty() {
            self.parameter_sets.capture(&drained.data);
        }
        drained.data
    }
}

fn submit_and_drain<B: Bitmap + ?Sized>(
    context: &mut dyn EncoderContext,
    buffer: &mut FrameBuffer,
    next_pts: &mut i64,
    subsampling: Subsampling,
    bitmap: &B,
    cancel: Option<&CancelToken>,
) -> Result<Drained> {
    let frame = frame::convert(buffer, bitmap, subsampling);

    if let Some(cancel) = cancel {
        cancel.check()?;
    }

    let pts = *next_pts;
    *next_pts += 1;

    if let Err(code) = context.send_frame(&frame, pts) {
        tracing::warn!(pts, %code, "encoder rejected frame");
        return Err(EncodeError::SendFailed { code, pts });
    }
    tracing::trace!(pts, width = frame.width(), height = frame.height(), "frame submitted");

    drain(context, cancel)
}

/// Poll the encoder until it has nothing ready or has finished.
fn drain(context: &mut dyn EncoderContext, cancel: Option<&CancelToken>) -> Result<Drained> {
    let mut drained = Drained::default();
    loop {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            if drained.packets > 0 {
                tracing::warn!(packets = drained.packets, "drain cancelled, output discarded");
            }
            return Err(EncodeError::Cancelled);
        }

        match context.receive_packet() {
            Receive::Packet(packet) => {
                tracing::trace!(pts = ?packet.pts, len = packet.data.len(), "packet drained");
                drained.data.extend_from_slice(packet.data);
                drained.packets += 1;
                if h264::is_key_frame(packet.data) {
                    drained.key_frames += 1;
                }
                if packet.pts.is_some() {
                    drained.last_pts = packet.pts;
                }
            }
            Receive::WouldBlock | Receive::EndOfStream => return Ok(drained),
            Receive::Failed(code) => {
                tracing::warn!(
                    %code,
                    packets = drained.packets,
                    bytes = drained.data.len(),
                    "drain failed, output discarded"
                );
                return Err(EncodeError::DrainFailed {
                    code,
                    discarded_packets: drained.packets as usize,
                });
            }
        }
    }
}
