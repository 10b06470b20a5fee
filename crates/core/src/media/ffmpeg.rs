//! libavcodec backend via `ffmpeg-next`.
//!
//! Each H.264 encoder libavcodec was built with (`libx264`,
//! `h264_v4l2m2m`, ...) becomes one registered [`Encoder`]. Status codes
//! are libavcodec's own negative `AVERROR` values.

use std::sync::OnceLock;

use ffmpeg_next::{self as ffmpeg, codec, encoder, format};

use super::{CompressedPacket, Encoder, EncoderContext, Receive, Status};
use crate::error::ErrorCode;
use crate::frame::PlanarFrame;
use crate::session::{EncoderConfig, PixelFormat};

/// Encoder names checked by [`FfmpegEncoder::available`], most preferred first.
pub const PREFERRED_ENCODERS: &[&str] = &[
    "libx264",
    "h264_v4l2m2m",
    "h264_videotoolbox",
    "h264_nvenc",
    "libopenh264",
];

/// Initialise libav* once per process. Returns `false` if it failed.
fn init() -> bool {
    static INIT: OnceLock<bool> = OnceLock::new();
    *INIT.get_or_init(|| match ffmpeg::init() {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(error = %err, "ffmpeg init failed");
            false
        }
    })
}

fn code(err: ffmpeg::Error) -> ErrorCode {
    ErrorCode(i32::from(err))
}

/// One libavcodec H.264 encoder, by name.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    name: String,
}

impl FfmpegEncoder {
    /// The named encoder, if libavcodec has it.
    pub fn find(name: &str) -> Option<Self> {
        if !init() {
            return None;
        }
        let found = encoder::find_by_name(name)?;
        if found.id() != codec::Id::H264 || !found.is_encoder() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
        })
    }

    /// Every encoder from [`PREFERRED_ENCODERS`] present in this build.
    pub fn available() -> Vec<Self> {
        PREFERRED_ENCODERS
            .iter()
            .filter_map(|name| Self::find(name))
            .collect()
    }
}

impl Encoder for FfmpegEncoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn alloc_context(&self) -> Option<Box<dyn EncoderContext>> {
        let found = encoder::find_by_name(&self.name)?;
        let video = codec::context::Context::new_with_codec(found)
            .encoder()
            .video()
            .ok()?;
        Some(Box::new(FfmpegContext {
            state: State::Configuring(video),
            options: Vec::new(),
            frame: ffmpeg::frame::Video::empty(),
            packet: ffmpeg::Packet::empty(),
        }))
    }
}

enum State {
    Configuring(encoder::video::Video),
    Open(encoder::video::Encoder),
    Closed,
}

struct FfmpegContext {
    state: State,
    options: Vec<(String, String)>,
    frame: ffmpeg::frame::Video,
    packet: ffmpeg::Packet,
}

const EINVAL: ErrorCode = ErrorCode(-ffmpeg::util::error::EINVAL);

impl FfmpegContext {
    fn encoder(&mut self) -> std::result::Result<&mut encoder::video::Encoder, ErrorCode> {
        match &mut self.state {
            State::Open(encoder) => Ok(encoder),
            _ => Err(EINVAL),
        }
    }
}

fn pixel(format: PixelFormat) -> format::Pixel {
    match format {
        PixelFormat::Yuv420p => format::Pixel::YUV420P,
        PixelFormat::Yuv444p => format::Pixel::YUV444P,
    }
}

/// Map a failed `receive_packet` to the drain outcome it stands for.
fn receive_error(err: ffmpeg::Error) -> Receive<'static> {
    match err {
        ffmpeg::Error::Eof => Receive::EndOfStream,
        ffmpeg::Error::Other { errno } if errno == ffmpeg::util::error::EAGAIN => {
            Receive::WouldBlock
        }
        err => Receive::Failed(code(err)),
    }
}

/// Copy `rows` rows of `width` bytes between buffers with different strides.
fn copy_plane(
    dst: &mut [u8],
    dst_stride: usize,
    src: &[u8],
    src_stride: usize,
    width: usize,
    rows: usize,
) {
    for row in 0..rows {
        let d = row * dst_stride;
        let s = row * src_stride;
        dst[d..d + width].copy_from_slice(&src[s..s + width]);
    }
}

impl EncoderContext for FfmpegContext {
    fn configure(&mut self, config: &EncoderConfig) {
        let State::Configuring(video) = &mut self.state else {
            return;
        };
        let time_base =
            ffmpeg::Rational::new(config.time_base.num as i32, config.time_base.den as i32);
        video.set_width(config.width);
        video.set_height(config.height);
        video.set_format(pixel(config.pixel_format));
        video.set_time_base(time_base);
        video.set_frame_rate(Some(time_base.invert()));
        if let Some(interval) = config.key_frame_interval {
            video.set_gop(interval);
        }

        self.options = config.options.clone();
        self.frame =
            ffmpeg::frame::Video::new(pixel(config.pixel_format), config.width, config.height);
    }

    fn open(&mut self) -> Status {
        let State::Configuring(video) = std::mem::replace(&mut self.state, State::Closed) else {
            return Err(EINVAL);
        };
        let mut options = ffmpeg::Dictionary::new();
        for (key, value) in &self.options {
            options.set(key, value);
        }
        let encoder = video.open_with(options).map_err(code)?;
        self.state = State::Open(encoder);
        Ok(())
    }

    fn make_frame_writable(&mut self) -> Status {
        // SAFETY: `frame` owns a valid AVFrame for the lifetime of `self`.
        let ret = unsafe { ffmpeg::ffi::av_frame_make_writable(self.frame.as_mut_ptr()) };
        if ret < 0 {
            return Err(ErrorCode(ret));
        }
        Ok(())
    }

    fn send_frame(&mut self, frame: &PlanarFrame<'_>, pts: i64) -> Status {
        if !frame.is_well_formed()
            || frame.width() != self.frame.width()
            || frame.height() != self.frame.height()
        {
            return Err(EINVAL);
        }

        let (cw, ch) = frame.chroma_dimensions();
        let (width, height) = (frame.width() as usize, frame.height() as usize);
        let planes = [
            (frame.y, frame.y_stride, width, height),
            (frame.cb, frame.c_stride, cw as usize, ch as usize),
            (frame.cr, frame.c_stride, cw as usize, ch as usize),
        ];
        for (i, (src, src_stride, plane_width, rows)) in planes.into_iter().enumerate() {
            let dst_stride = self.frame.stride(i);
            copy_plane(self.frame.data_mut(i), dst_stride, src, src_stride, plane_width, rows);
        }
        self.frame.set_pts(Some(pts));

        let video = &self.frame;
        match &mut self.state {
            State::Open(encoder) => encoder.send_frame(video).map_err(code),
            _ => Err(EINVAL),
        }
    }

    fn send_eof(&mut self) -> Status {
        self.encoder()?.send_eof().map_err(code)
    }

    fn receive_packet(&mut self) -> Receive<'_> {
        let State::Open(encoder) = &mut self.state else {
            return Receive::Failed(EINVAL);
        };
        match encoder.receive_packet(&mut self.packet) {
            Ok(()) => Receive::Packet(CompressedPacket {
                data: self.packet.data().unwrap_or(&[]),
                pts: self.packet.pts(),
            }),
            Err(err) => receive_error(err),
        }
    }

    fn close(&mut self) {
        self.state = State::Closed;
    }
}
