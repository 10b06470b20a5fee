use ::image::{DynamicImage, GenericImageView, GrayImage, RgbImage, RgbaImage};

use super::convert::{rgb_to_ycbcr, ycbcr_to_rgb};
use super::{Bitmap, PlanarFrame, Rect, Subsampling};

/// Widen an 8-bit channel to 16 bits (`0xFF` becomes `0xFFFF`).
#[inline]
fn widen(v: u8) -> u16 {
    v as u16 * 257
}

impl Bitmap for RgbaImage {
    fn bounds(&self) -> Rect {
        Rect::new(self.width(), self.height())
    }

    fn rgba16(&self, x: u32, y: u32) -> [u16; 4] {
        self.get_pixel(x, y).0.map(widen)
    }

    fn packed_rgba8(&self) -> Option<&[u8]> {
        Some(self.as_raw())
    }
}

impl Bitmap for RgbImage {
    fn bounds(&self) -> Rect {
        Rect::new(self.width(), self.height())
    }

    fn rgba16(&self, x: u32, y: u32) -> [u16; 4] {
        let [r, g, b] = self.get_pixel(x, y).0;
        [widen(r), widen(g), widen(b), u16::MAX]
    }
}

impl Bitmap for GrayImage {
    fn bounds(&self) -> Rect {
        Rect::new(self.width(), self.height())
    }

    fn rgba16(&self, x: u32, y: u32) -> [u16; 4] {
        let l = widen(self.get_pixel(x, y).0[0]);
        [l, l, l, u16::MAX]
    }
}

impl Bitmap for DynamicImage {
    fn bounds(&self) -> Rect {
        let (width, height) = GenericImageView::dimensions(self);
        Rect::new(width, height)
    }

    fn rgba16(&self, x: u32, y: u32) -> [u16; 4] {
        match self {
            DynamicImage::ImageRgba16(buf) => buf.get_pixel(x, y).0,
            DynamicImage::ImageRgb16(buf) => {
                let [r, g, b] = buf.get_pixel(x, y).0;
                [r, g, b, u16::MAX]
            }
            DynamicImage::ImageLuma16(buf) => {
                let l = buf.get_pixel(x, y).0[0];
                [l, l, l, u16::MAX]
            }
            other => GenericImageView::get_pixel(other, x, y).0.map(widen),
        }
    }

    fn packed_rgba8(&self) -> Option<&[u8]> {
        self.as_rgba8().map(|buf| buf.as_raw().as_slice())
    }
}

/// Owned Y/Cb/Cr image stored as three tightly packed planes.
///
/// Already in the encoder's native layout: when its subsampling matches the
/// session, encoding borrows the planes without any conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanarImage {
    width: u32,
    height: u32,
    subsampling: Subsampling,
    y: Vec<u8>,
    cb: Vec<u8>,
    cr: Vec<u8>,
}

impl PlanarImage {
    /// Black image (Y=16, Cb=Cr=128).
    pub fn new(width: u32, height: u32, subsampling: Subsampling) -> Self {
        let (cw, ch) = subsampling.chroma_dimensions(width, height);
        let chroma = cw as usize * ch as usize;
        Self {
            width,
            height,
            subsampling,
            y: vec![16; width as usize * height as usize],
            cb: vec![128; chroma],
            cr: vec![128; chroma],
        }
    }

    /// Image filled with one 8-bit RGB colour.
    pub fn solid(width: u32, height: u32, subsampling: Subsampling, rgb: (u8, u8, u8)) -> Self {
        let (y, cb, cr) = rgb_to_ycbcr(rgb.0, rgb.1, rgb.2);
        let mut img = Self::new(width, height, subsampling);
        img.y.fill(y);
        img.cb.fill(cb);
        img.cr.fill(cr);
        img
    }

    /// Wrap existing planes. Returns `None` if a plane length does not
    /// match the dimensions and subsampling.
    pub fn from_planes(
        width: u32,
        height: u32,
        subsampling: Subsampling,
        y: Vec<u8>,
        cb: Vec<u8>,
        cr: Vec<u8>,
    ) -> Option<Self> {
        let (cw, ch) = subsampling.chroma_dimensions(width, height);
        let chroma = cw as usize * ch as usize;
        if y.len() != width as usize * height as usize || cb.len() != chroma || cr.len() != chroma {
            return None;
        }
        Some(Self {
            width,
            height,
            subsampling,
            y,
            cb,
            cr,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn subsampling(&self) -> Subsampling {
        self.subsampling
    }

    pub fn y(&self) -> &[u8] {
        &self.y
    }

    pub fn cb(&self) -> &[u8] {
        &self.cb
    }

    pub fn cr(&self) -> &[u8] {
        &self.cr
    }

    fn chroma_index(&self, x: u32, y: u32) -> usize {
        let (cw, _) = self.subsampling.chroma_dimensions(self.width, self.height);
        match self.subsampling {
            Subsampling::Yuv420 => (y / 2) as usize * cw as usize + (x / 2) as usize,
            Subsampling::Yuv444 => y as usize * cw as usize + x as usize,
        }
    }
}

impl Bitmap for PlanarImage {
    fn bounds(&self) -> Rect {
        Rect::new(self.width, self.height)
    }

    fn rgba16(&self, x: u32, y: u32) -> [u16; 4] {
        let luma = self.y[y as usize * self.width as usize + x as usize];
        let c = self.chroma_index(x, y);
        let (r, g, b) = ycbcr_to_rgb(luma, self.cb[c], self.cr[c]);
        [widen(r), widen(g), widen(b), u16::MAX]
    }

    fn planar(&self) -> Option<PlanarFrame<'_>> {
        let (cw, _) = self.subsampling.chroma_dimensions(self.width, self.height);
        Some(PlanarFrame {
            y: &self.y,
            cb: &self.cb,
            cr: &self.cr,
            y_stride: self.width as usize,
            c_stride: cw as usize,
            subsampling: self.subsampling,
            rect: self.bounds(),
        })
    }
}
