//! Pull-based frame sources.
//!
//! [`EncodeStream`] pulls one bitmap per step from a [`FrameSource`],
//! encodes it, and yields the bytes. When the source runs dry it can flush
//! the encoder so the frames it was holding come out as a final item.

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::frame::Bitmap;
use crate::session::EncoderSession;

/// Producer of frames to encode.
pub trait FrameSource {
    type Frame: Bitmap;

    /// Next frame, or `None` at end of input.
    fn next_frame(&mut self) -> Option<Self::Frame>;
}

impl<I> FrameSource for I
where
    I: Iterator,
    I::Item: Bitmap,
{
    type Frame = I::Item;

    fn next_frame(&mut self) -> Option<Self::Frame> {
        self.next()
    }
}

/// Iterator that encodes a [`FrameSource`] frame by frame.
///
/// Each item is the output of one [`EncoderSession::encode`] call, so items
/// may be empty while the encoder buffers. Errors are yielded and the
/// stream carries on with the next frame; stop iterating to give up.
pub struct EncodeStream<'s, S: FrameSource> {
    session: &'s mut EncoderSession,
    source: S,
    cancel: Option<CancelToken>,
    flush_at_end: bool,
    done: bool,
}

impl<'s, S: FrameSource> EncodeStream<'s, S> {
    pub fn new(session: &'s mut EncoderSession, source: S) -> Self {
        Self {
            session,
            source,
            cancel: None,
            flush_at_end: false,
            done: false,
        }
    }

    /// Flush the encoder once the source is exhausted and yield the tail.
    pub fn flush_at_end(mut self, flush: bool) -> Self {
        self.flush_at_end = flush;
        self
    }

    /// Check `cancel` before every pull and during every encode; once it
    /// fires the stream yields one `Cancelled` error and ends without
    /// pulling or flushing again.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn session(&self) -> &EncoderSession {
        &*self.session
    }
}

impl<S: FrameSource> Iterator for EncodeStream<'_, S> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(cancel) = &self.cancel {
            if let Err(err) = cancel.check() {
                self.done = true;
                return Some(Err(err));
            }
        }

        let Some(frame) = self.source.next_frame() else {
            self.done = true;
            if self.flush_at_end {
                return Some(self.session.flush());
            }
            return None;
        };

        let result = match &self.cancel {
            Some(cancel) => self.session.encode_cancellable(&frame, cancel),
            None => self.session.encode(&frame),
        };
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            self.done = true;
        }
        Some(result)
    }
}
