//! Bitmaps, planar frames, and the reusable frame buffer.
//!
//! The encoder consumes planar Y/Cb/Cr frames. Callers hand in any
//! [`Bitmap`]; [`convert`] either borrows its planes directly (when the
//! bitmap already is planar with the right subsampling) or fills a
//! session-owned [`FrameBuffer`] through the colourspace transform.
//!
//! ## Plane layout
//!
//! ```text
//! FrameBuffer storage (one allocation, 3 * width * height bytes):
//! +----------------+--------+--------+------------------+
//! |       Y        |   Cb   |   Cr   |  spare capacity  |
//! +----------------+--------+--------+------------------+
//!  width * height    chroma   chroma
//! ```
//!
//! For 4:2:0 each chroma plane is `ceil(w/2) * ceil(h/2)`; for 4:4:4 it is
//! `w * h` and the spare capacity is zero.

mod bitmap;
mod convert;

pub use bitmap::PlanarImage;
pub use convert::{convert, rgb_to_ycbcr, ycbcr_to_rgb};

/// Rectangle of valid pixels, in the bitmap's own coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    /// Rectangle anchored at the origin.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Chroma subsampling ratio of a planar frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Subsampling {
    /// Chroma halved horizontally and vertically.
    #[default]
    Yuv420,
    /// Full-resolution chroma.
    Yuv444,
}

impl Subsampling {
    /// Chroma plane dimensions for a luma plane of `width` x `height`.
    ///
    /// Odd dimensions round up so edge pixels keep a chroma sample.
    pub fn chroma_dimensions(self, width: u32, height: u32) -> (u32, u32) {
        match self {
            Self::Yuv420 => (width.div_ceil(2), height.div_ceil(2)),
            Self::Yuv444 => (width, height),
        }
    }

    /// Bytes needed for all three planes, packed end to end.
    pub fn frame_len(self, width: u32, height: u32) -> usize {
        let (cw, ch) = self.chroma_dimensions(width, height);
        width as usize * height as usize + 2 * cw as usize * ch as usize
    }
}

/// A source image the pipeline can encode.
///
/// Implementors must answer the generic colour query; the two optional
/// views let the converter skip per-pixel work.
pub trait Bitmap {
    /// Valid pixel bounds.
    fn bounds(&self) -> Rect;

    /// Colour at `(x, y)` (absolute coordinates inside [`bounds`](Self::bounds))
    /// as `[r, g, b, a]`, each scaled to `0..=0xFFFF`.
    fn rgba16(&self, x: u32, y: u32) -> [u16; 4];

    /// Native planar view, if the bitmap already stores Y/Cb/Cr planes.
    fn planar(&self) -> Option<PlanarFrame<'_>> {
        None
    }

    /// Tightly packed 8-bit RGBA pixels covering [`bounds`](Self::bounds),
    /// row-major with stride `width * 4`.
    fn packed_rgba8(&self) -> Option<&[u8]> {
        None
    }
}

impl<B: Bitmap + ?Sized> Bitmap for &B {
    fn bounds(&self) -> Rect {
        (**self).bounds()
    }

    fn rgba16(&self, x: u32, y: u32) -> [u16; 4] {
        (**self).rgba16(x, y)
    }

    fn planar(&self) -> Option<PlanarFrame<'_>> {
        (**self).planar()
    }

    fn packed_rgba8(&self) -> Option<&[u8]> {
        (**self).packed_rgba8()
    }
}

/// Borrowed Y/Cb/Cr planes ready to hand to an encoder.
///
/// Either a view into a session's [`FrameBuffer`] or an alias of a planar
/// source bitmap's own storage; it never owns pixel data.
#[derive(Debug, Clone, Copy)]
pub struct PlanarFrame<'a> {
    pub y: &'a [u8],
    pub cb: &'a [u8],
    pub cr: &'a [u8],
    pub y_stride: usize,
    pub c_stride: usize,
    pub subsampling: Subsampling,
    pub rect: Rect,
}

impl PlanarFrame<'_> {
    pub fn width(&self) -> u32 {
        self.rect.width
    }

    pub fn height(&self) -> u32 {
        self.rect.height
    }

    /// Chroma plane dimensions for this frame.
    pub fn chroma_dimensions(&self) -> (u32, u32) {
        self.subsampling
            .chroma_dimensions(self.rect.width, self.rect.height)
    }

    /// Whether every plane is long enough, at its stride, for `rect`.
    pub fn is_well_formed(&self) -> bool {
        let (cw, ch) = self.chroma_dimensions();
        covers(self.y, self.y_stride, self.rect.width, self.rect.height)
            && covers(self.cb, self.c_stride, cw, ch)
            && covers(self.cr, self.c_stride, cw, ch)
    }
}

/// `plane` holds `rows` rows of `width` bytes spaced `stride` apart.
fn covers(plane: &[u8], stride: usize, width: u32, rows: u32) -> bool {
    let (width, rows) = (width as usize, rows as usize);
    if width == 0 || rows == 0 {
        return true;
    }
    stride >= width
        && stride
            .checked_mul(rows - 1)
            .and_then(|n| n.checked_add(width))
            .is_some_and(|needed| plane.len() >= needed)
}

/// Growth-only backing storage for converted frames.
///
/// The physical allocation only ever grows (to `3 * width * height`, enough
/// for three full planes); a logical length tracks the bytes used by the
/// current dimensions and subsampling. Once sized for the stream resolution,
/// conversions reuse the allocation for every frame.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    storage: Vec<u8>,
    len: usize,
    rect: Rect,
    subsampling: Subsampling,
}

impl FrameBuffer {
    /// Empty buffer; storage is allocated on first [`prepare`](Self::prepare).
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer pre-sized for frames of the given shape.
    pub fn with_dimensions(width: u32, height: u32, subsampling: Subsampling) -> Self {
        let mut buffer = Self::new();
        buffer.prepare(width, height, subsampling);
        buffer
    }

    /// Resize the logical frame to `width` x `height`.
    ///
    /// Returns `true` when the backing storage had to grow. Unchanged
    /// dimensions are a no-op.
    pub fn prepare(&mut self, width: u32, height: u32, subsampling: Subsampling) -> bool {
        let rect = Rect::new(width, height);
        if self.rect == rect && self.subsampling == subsampling && self.len > 0 {
            return false;
        }

        self.rect = rect;
        self.subsampling = subsampling;
        self.len = subsampling.frame_len(width, height);

        let physical = 3 * rect.area();
        if self.storage.len() >= physical {
            return false;
        }
        self.storage.resize(physical, 0);
        tracing::trace!(width, height, capacity = physical, "frame buffer grown");
        true
    }

    /// Physical bytes allocated.
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Bytes used by the current frame shape.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn subsampling(&self) -> Subsampling {
        self.subsampling
    }

    fn plane_lengths(&self) -> (usize, usize) {
        let (cw, ch) = self
            .subsampling
            .chroma_dimensions(self.rect.width, self.rect.height);
        (self.rect.area(), cw as usize * ch as usize)
    }

    /// Mutable Y, Cb, Cr plane slices for the current shape.
    pub fn planes_mut(&mut self) -> (&mut [u8], &mut [u8], &mut [u8]) {
        let (luma, chroma) = self.plane_lengths();
        let (y, rest) = self.storage[..self.len].split_at_mut(luma);
        let (cb, cr) = rest.split_at_mut(chroma);
        (y, cb, cr)
    }

    /// Read-only planar view of the current contents.
    pub fn frame(&self) -> PlanarFrame<'_> {
        let (luma, chroma) = self.plane_lengths();
        let (cw, _) = self
            .subsampling
            .chroma_dimensions(self.rect.width, self.rect.height);
        let data = &self.storage[..self.len];
        PlanarFrame {
            y: &data[..luma],
            cb: &data[luma..luma + chroma],
            cr: &data[luma + chroma..],
            y_stride: self.rect.width as usize,
            c_stride: cw as usize,
            subsampling: self.subsampling,
            rect: self.rect,
        }
    }
}
