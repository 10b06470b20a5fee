//! Scripted in-memory encoder for driving sessions without a native library.
//!
//! Behaves like a libavcodec encoder with B-frame reordering: it holds
//! `reorder_depth` frames back before releasing packets, emits SPS + PPS +
//! IDR for key frames, and drains everything after end of stream. Failures
//! are injected through the shared [`Script`].

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use h264enc::media::{CompressedPacket, Encoder, EncoderContext, Receive, Status};
use h264enc::{CancelToken, EncoderConfig, EncoderRegistry, ErrorCode, PlanarFrame};
use parking_lot::Mutex;

pub const EINVAL: i32 = -22;
pub const EIO: i32 = -5;
/// libavcodec's `AVERROR_EOF`.
pub const AVERROR_EOF: i32 = -541_478_725;

pub const SPS: [u8; 4] = [0x67, 0x42, 0x00, 0x1e];
pub const PPS: [u8; 4] = [0x68, 0xce, 0x38, 0x80];

/// Knobs and records shared between a test and the contexts it spawns.
#[derive(Debug)]
pub struct Script {
    pub reorder_depth: usize,
    pub packets_per_frame: usize,
    pub alloc_fails: bool,
    pub open_error: Option<i32>,
    pub writable_error: Option<i32>,
    pub send_error: Option<i32>,
    /// Fail the drain once this many packets have been returned since the
    /// last send.
    pub receive_error: Option<(usize, i32)>,
    pub cancel_on_receive: Option<CancelToken>,

    pub configured: Option<EncoderConfig>,
    pub sent_pts: Vec<i64>,
    /// First Y, Cb, Cr samples of each accepted frame.
    pub samples: Vec<(u8, u8, u8)>,
    /// Address of the Y plane of the last frame handed to `send_frame`.
    pub last_y_ptr: usize,
    /// Length of the Y plane of the last frame handed to `send_frame`.
    pub y_len: usize,
    pub writable_calls: usize,
    pub releases: usize,
    pub closes: usize,
    pub eof_sent: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            reorder_depth: 0,
            packets_per_frame: 1,
            alloc_fails: false,
            open_error: None,
            writable_error: None,
            send_error: None,
            receive_error: None,
            cancel_on_receive: None,
            configured: None,
            sent_pts: Vec::new(),
            samples: Vec::new(),
            last_y_ptr: 0,
            y_len: 0,
            writable_calls: 0,
            releases: 0,
            closes: 0,
            eof_sent: false,
        }
    }
}

pub type Handle = Arc<Mutex<Script>>;

pub struct ScriptedEncoder {
    name: String,
    script: Handle,
}

impl ScriptedEncoder {
    pub fn new(name: &str, script: Script) -> (Self, Handle) {
        let script = Arc::new(Mutex::new(script));
        (
            Self {
                name: name.to_string(),
                script: script.clone(),
            },
            script,
        )
    }
}

impl Encoder for ScriptedEncoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn alloc_context(&self) -> Option<Box<dyn EncoderContext>> {
        if self.script.lock().alloc_fails {
            return None;
        }
        Some(Box::new(ScriptedContext {
            script: self.script.clone(),
            config: None,
            frames_in: 0,
            pending: VecDeque::new(),
            ready: VecDeque::new(),
            current: Vec::new(),
            returned_since_send: 0,
            eof: false,
        }))
    }
}

/// Registry holding a single scripted encoder named `"scripted"`.
pub fn registry_with(script: Script) -> (EncoderRegistry, Handle) {
    let (encoder, handle) = ScriptedEncoder::new("scripted", script);
    let registry = EncoderRegistry::new();
    registry.register(encoder);
    (registry, handle)
}

struct ScriptedContext {
    script: Handle,
    config: Option<EncoderConfig>,
    frames_in: u64,
    /// (pts, key frame) of frames held for reordering.
    pending: VecDeque<(i64, bool)>,
    ready: VecDeque<(Vec<u8>, i64)>,
    current: Vec<u8>,
    returned_since_send: usize,
    eof: bool,
}

impl ScriptedContext {
    fn release_oldest(&mut self) {
        let Some((pts, key)) = self.pending.pop_front() else {
            return;
        };
        let packets = self.script.lock().packets_per_frame;
        for i in 0..packets {
            let mut data = Vec::new();
            if i == 0 && key {
                for nal in [&SPS[..], &PPS[..]] {
                    data.extend_from_slice(&[0, 0, 0, 1]);
                    data.extend_from_slice(nal);
                }
                data.extend_from_slice(&[0, 0, 0, 1, 0x65, pts as u8]);
            } else {
                data.extend_from_slice(&[0, 0, 0, 1, 0x41, pts as u8, i as u8]);
            }
            self.ready.push_back((data, pts));
        }
    }
}

impl EncoderContext for ScriptedContext {
    fn configure(&mut self, config: &EncoderConfig) {
        self.config = Some(config.clone());
        self.script.lock().configured = Some(config.clone());
    }

    fn open(&mut self) -> Status {
        match self.script.lock().open_error {
            Some(code) => Err(ErrorCode(code)),
            None => Ok(()),
        }
    }

    fn make_frame_writable(&mut self) -> Status {
        let mut script = self.script.lock();
        script.writable_calls += 1;
        match script.writable_error.take() {
            Some(code) => Err(ErrorCode(code)),
            None => Ok(()),
        }
    }

    fn send_frame(&mut self, frame: &PlanarFrame<'_>, pts: i64) -> Status {
        let Some(config) = &self.config else {
            return Err(ErrorCode(EINVAL));
        };
        if self.eof {
            return Err(ErrorCode(AVERROR_EOF));
        }
        if !frame.is_well_formed()
            || frame.width() != config.width
            || frame.height() != config.height
        {
            return Err(ErrorCode(EINVAL));
        }

        let mut script = self.script.lock();
        script.last_y_ptr = frame.y.as_ptr() as usize;
        script.y_len = frame.y.len();
        if let Some(code) = script.send_error.take() {
            return Err(ErrorCode(code));
        }
        script.sent_pts.push(pts);
        script.samples.push((frame.y[0], frame.cb[0], frame.cr[0]));
        drop(script);

        let interval = config.key_frame_interval.unwrap_or(u32::MAX) as u64;
        let key = self.frames_in % interval == 0;
        self.frames_in += 1;
        self.pending.push_back((pts, key));
        self.returned_since_send = 0;
        Ok(())
    }

    fn send_eof(&mut self) -> Status {
        self.eof = true;
        self.script.lock().eof_sent = true;
        Ok(())
    }

    fn receive_packet(&mut self) -> Receive<'_> {
        {
            let mut script = self.script.lock();
            if let Some(token) = &script.cancel_on_receive {
                token.cancel();
            }
            if let Some((after, code)) = script.receive_error {
                if self.returned_since_send >= after {
                    script.receive_error = None;
                    return Receive::Failed(ErrorCode(code));
                }
            }
        }

        if self.ready.is_empty() {
            let depth = self.script.lock().reorder_depth;
            if self.pending.len() > depth || (self.eof && !self.pending.is_empty()) {
                self.release_oldest();
            }
        }

        match self.ready.pop_front() {
            Some((data, pts)) => {
                self.current = data;
                self.returned_since_send += 1;
                Receive::Packet(CompressedPacket {
                    data: &self.current,
                    pts: Some(pts),
                })
            }
            None if self.eof => Receive::EndOfStream,
            None => Receive::WouldBlock,
        }
    }

    fn release_frame(&mut self) {
        self.script.lock().releases += 1;
    }

    fn close(&mut self) {
        self.script.lock().closes += 1;
    }
}
