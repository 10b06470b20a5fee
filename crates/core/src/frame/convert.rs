//! Bitmap to planar Y/Cb/Cr conversion.
//!
//! Uses the studio-range BT.601 transform in 8-bit fixed point:
//!
//! ```text
//! Y  = ((  66 R + 129 G +  25 B + 128) >> 8) +  16
//! Cb = (( -38 R -  74 G + 112 B + 128) >> 8) + 128
//! Cr = (( 112 R -  94 G -  18 B + 128) >> 8) + 128
//! ```
//!
//! Luma lands in 16..=235 and chroma in 16..=240 without clamping. For 4:2:0
//! each chroma sample is the rounded mean of the per-pixel chroma of its
//! 2x2 block (fewer pixels on odd right/bottom edges).
//!
//! Two paths fill the planes: a scalar path that asks the bitmap for every
//! pixel through [`Bitmap::rgba16`], and a batch path that walks a packed
//! RGBA8 buffer directly. Both share [`rgb_to_ycbcr`] and the same chroma
//! averaging, so their output is identical.

use super::{Bitmap, FrameBuffer, PlanarFrame, Subsampling};

/// Convert one 8-bit RGB triple to studio-range `(Y, Cb, Cr)`.
#[inline]
pub fn rgb_to_ycbcr(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (r, g, b) = (r as i32, g as i32, b as i32);
    let y = ((66 * r + 129 * g + 25 * b + 128) >> 8) + 16;
    let cb = ((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128;
    let cr = ((112 * r - 94 * g - 18 * b + 128) >> 8) + 128;
    (y as u8, cb as u8, cr as u8)
}

/// Convert a studio-range `(Y, Cb, Cr)` sample back to 8-bit RGB.
///
/// Inverse of [`rgb_to_ycbcr`] up to rounding; used by planar bitmaps to
/// answer the generic colour query.
#[inline]
pub fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8) -> (u8, u8, u8) {
    let c = 298 * (y as i32 - 16);
    let d = cb as i32 - 128;
    let e = cr as i32 - 128;
    let r = (c + 409 * e + 128) >> 8;
    let g = (c - 100 * d - 208 * e + 128) >> 8;
    let b = (c + 516 * d + 128) >> 8;
    (clamp_u8(r), clamp_u8(g), clamp_u8(b))
}

#[inline]
fn clamp_u8(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

/// Fill planar Y/Cb/Cr from `src`.
///
/// A planar source with matching `subsampling` whose planes cover its bounds
/// is returned as-is, aliasing its planes. Anything else is converted into
/// `dst`, which is resized (never shrunk) to the source bounds first, and
/// the returned frame borrows `dst`.
///
/// Alpha is dropped; there is no compositing against a background.
pub fn convert<'a, B>(
    dst: &'a mut FrameBuffer,
    src: &'a B,
    subsampling: Subsampling,
) -> PlanarFrame<'a>
where
    B: Bitmap + ?Sized,
{
    if let Some(planar) = src.planar() {
        if planar.subsampling == subsampling {
            if planar.is_well_formed() {
                return planar;
            }
            tracing::debug!(
                width = planar.width(),
                height = planar.height(),
                y_len = planar.y.len(),
                cb_len = planar.cb.len(),
                "planar view too short for its bounds, converting per pixel"
            );
        }
    }

    let bounds = src.bounds();
    dst.prepare(bounds.width, bounds.height, subsampling);

    let width = bounds.width as usize;
    let height = bounds.height as usize;
    let (y, cb, cr) = dst.planes_mut();

    match src.packed_rgba8() {
        Some(raw) if raw.len() >= width * height * 4 => {
            rgba8_planes(raw, width, height, subsampling, y, cb, cr);
        }
        _ => {
            let rgb_at = |x: usize, row: usize| {
                let [r, g, b, _] = src.rgba16(bounds.x + x as u32, bounds.y + row as u32);
                [(r >> 8) as u8, (g >> 8) as u8, (b >> 8) as u8]
            };
            scalar_planes(rgb_at, width, height, subsampling, y, cb, cr);
        }
    }

    dst.frame()
}

fn scalar_planes<F>(
    rgb_at: F,
    width: usize,
    height: usize,
    subsampling: Subsampling,
    y: &mut [u8],
    cb: &mut [u8],
    cr: &mut [u8],
) where
    F: Fn(usize, usize) -> [u8; 3],
{
    match subsampling {
        Subsampling::Yuv444 => {
            for row in 0..height {
                for x in 0..width {
                    let [r, g, b] = rgb_at(x, row);
                    let i = row * width + x;
                    (y[i], cb[i], cr[i]) = rgb_to_ycbcr(r, g, b);
                }
            }
        }
        Subsampling::Yuv420 => {
            for row in 0..height {
                for x in 0..width {
                    let [r, g, b] = rgb_at(x, row);
                    y[row * width + x] = rgb_to_ycbcr(r, g, b).0;
                }
            }
            subsample_chroma(&rgb_at, width, height, cb, cr);
        }
    }
}

/// Batch kernel over a packed RGBA8 buffer.
fn rgba8_planes(
    raw: &[u8],
    width: usize,
    height: usize,
    subsampling: Subsampling,
    y: &mut [u8],
    cb: &mut [u8],
    cr: &mut [u8],
) {
    let pixels = &raw[..width * height * 4];
    match subsampling {
        Subsampling::Yuv444 => {
            for (((px, y), cb), cr) in pixels
                .chunks_exact(4)
                .zip(y.iter_mut())
                .zip(cb.iter_mut())
                .zip(cr.iter_mut())
            {
                (*y, *cb, *cr) = rgb_to_ycbcr(px[0], px[1], px[2]);
            }
        }
        Subsampling::Yuv420 => {
            for (px, y) in pixels.chunks_exact(4).zip(y.iter_mut()) {
                *y = rgb_to_ycbcr(px[0], px[1], px[2]).0;
            }
            let rgb_at = |x: usize, row: usize| {
                let i = (row * width + x) * 4;
                [pixels[i], pixels[i + 1], pixels[i + 2]]
            };
            subsample_chroma(&rgb_at, width, height, cb, cr);
        }
    }
}

/// Average per-pixel chroma over each 2x2 block.
fn subsample_chroma<F>(rgb_at: &F, width: usize, height: usize, cb: &mut [u8], cr: &mut [u8])
where
    F: Fn(usize, usize) -> [u8; 3],
{
    let chroma_width = width.div_ceil(2);
    for (i, (cb, cr)) in cb.iter_mut().zip(cr.iter_mut()).enumerate() {
        let x0 = (i % chroma_width) * 2;
        let y0 = (i / chroma_width) * 2;

        let (mut sum_cb, mut sum_cr, mut n) = (0u32, 0u32, 0u32);
        for row in y0..(y0 + 2).min(height) {
            for x in x0..(x0 + 2).min(width) {
                let [r, g, b] = rgb_at(x, row);
                let (_, u, v) = rgb_to_ycbcr(r, g, b);
                sum_cb += u as u32;
                sum_cr += v as u32;
                n += 1;
            }
        }

        *cb = ((sum_cb + n / 2) / n) as u8;
        *cr = ((sum_cr + n / 2) / n) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{PlanarImage, Rect};

    use ::image::{Rgba, RgbaImage};

    /// Hides the packed buffer so the scalar path runs.
    struct Opaque<'a>(&'a RgbaImage);

    impl Bitmap for Opaque<'_> {
        fn bounds(&self) -> Rect {
            self.0.bounds()
        }

        fn rgba16(&self, x: u32, y: u32) -> [u16; 4] {
            self.0.rgba16(x, y)
        }
    }

    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            Rgba([
                (x * 37 % 256) as u8,
                (y * 59 % 256) as u8,
                ((x + y) * 23 % 256) as u8,
                255,
            ])
        })
    }

    #[test]
    fn primaries_map_to_fixed_triples() {
        assert_eq!(rgb_to_ycbcr(255, 0, 0), (82, 90, 240));
        assert_eq!(rgb_to_ycbcr(0, 255, 0), (144, 54, 34));
        assert_eq!(rgb_to_ycbcr(0, 0, 255), (41, 240, 110));
        assert_eq!(rgb_to_ycbcr(255, 255, 255), (235, 128, 128));
        assert_eq!(rgb_to_ycbcr(0, 0, 0), (16, 128, 128));
    }

    #[test]
    fn inverse_preserves_black_and_white() {
        assert_eq!(ycbcr_to_rgb(16, 128, 128), (0, 0, 0));
        assert_eq!(ycbcr_to_rgb(235, 128, 128), (255, 255, 255));
    }

    #[test]
    fn solid_red_converts_identically_every_call() {
        let red = RgbaImage::from_pixel(8, 6, Rgba([255, 0, 0, 255]));
        let opaque = Opaque(&red);
        let mut buf = FrameBuffer::new();

        for _ in 0..3 {
            let frame = convert(&mut buf, &opaque, Subsampling::Yuv420);
            assert!(frame.y.iter().all(|&v| v == 82));
            assert!(frame.cb.iter().all(|&v| v == 90));
            assert!(frame.cr.iter().all(|&v| v == 240));
            assert_eq!(frame.cb.len(), 4 * 3);
        }
    }

    #[test]
    fn scalar_and_batch_paths_agree() {
        for (w, h) in [(16, 8), (7, 5), (1, 1)] {
            let img = gradient(w, h);
            let opaque = Opaque(&img);
            for subsampling in [Subsampling::Yuv420, Subsampling::Yuv444] {
                let mut scalar = FrameBuffer::new();
                let mut batch = FrameBuffer::new();
                let a = convert(&mut scalar, &opaque, subsampling);
                let b = convert(&mut batch, &img, subsampling);
                assert_eq!(a.y, b.y, "{w}x{h} {subsampling:?} luma");
                assert_eq!(a.cb, b.cb, "{w}x{h} {subsampling:?} cb");
                assert_eq!(a.cr, b.cr, "{w}x{h} {subsampling:?} cr");
            }
        }
    }

    #[test]
    fn chroma_is_rounded_block_mean() {
        // Left column red, right column blue.
        let img = RgbaImage::from_fn(2, 2, |x, _| {
            if x == 0 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        });
        let mut buf = FrameBuffer::new();
        let frame = convert(&mut buf, &img, Subsampling::Yuv420);
        assert_eq!(frame.y, &[82, 41, 82, 41]);
        // (90 + 240 + 90 + 240 + 2) / 4 = 165, (240 + 110 + 240 + 110 + 2) / 4 = 175
        assert_eq!(frame.cb, &[165]);
        assert_eq!(frame.cr, &[175]);
    }

    #[test]
    fn alpha_is_discarded() {
        let translucent = RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 10]));
        let mut buf = FrameBuffer::new();
        let frame = convert(&mut buf, &translucent, Subsampling::Yuv444);
        assert!(frame.y.iter().all(|&v| v == 82));
    }

    #[test]
    fn planar_source_is_aliased() {
        let src = PlanarImage::solid(6, 4, Subsampling::Yuv420, (255, 0, 0));
        let mut buf = FrameBuffer::new();
        let frame = convert(&mut buf, &src, Subsampling::Yuv420);

        assert!(std::ptr::eq(frame.y, src.y()));
        assert!(std::ptr::eq(frame.cb, src.cb()));
        assert!(std::ptr::eq(frame.cr, src.cr()));
        assert_eq!(buf.capacity(), 0, "no copy into the frame buffer");
    }

    /// Claims to be planar but hands back truncated planes.
    struct Truncated(PlanarImage);

    impl Bitmap for Truncated {
        fn bounds(&self) -> Rect {
            self.0.bounds()
        }

        fn rgba16(&self, x: u32, y: u32) -> [u16; 4] {
            self.0.rgba16(x, y)
        }

        fn planar(&self) -> Option<PlanarFrame<'_>> {
            let full = self.0.planar()?;
            Some(PlanarFrame {
                y: &full.y[..3],
                cb: &full.cb[..1],
                ..full
            })
        }
    }

    #[test]
    fn truncated_planar_view_falls_back_to_conversion() {
        let src = Truncated(PlanarImage::solid(8, 8, Subsampling::Yuv420, (255, 0, 0)));
        let mut buf = FrameBuffer::new();
        let frame = convert(&mut buf, &src, Subsampling::Yuv420);

        assert_eq!(frame.y.len(), 64);
        assert_eq!(frame.cb.len(), 16);
        assert_eq!(frame.cr.len(), 16);
        assert!(frame.is_well_formed());
        assert!(frame.y.iter().all(|&v| v == 82));
        assert!(frame.cb.iter().all(|&v| v == 90));
        assert!(frame.cr.iter().all(|&v| v == 240));
    }

    #[test]
    fn planar_source_with_other_subsampling_is_converted() {
        let src = PlanarImage::solid(4, 4, Subsampling::Yuv444, (255, 255, 255));
        let mut buf = FrameBuffer::new();
        let frame = convert(&mut buf, &src, Subsampling::Yuv420);

        assert_eq!(frame.subsampling, Subsampling::Yuv420);
        assert_eq!(frame.cb.len(), 4);
        assert!(frame.y.iter().all(|&v| v == 235));
        assert!(frame.cb.iter().all(|&v| v == 128));
    }

    #[test]
    fn offset_bounds_are_read_relative_to_origin() {
        struct Window;

        impl Bitmap for Window {
            fn bounds(&self) -> Rect {
                Rect {
                    x: 10,
                    y: 20,
                    width: 2,
                    height: 1,
                }
            }

            fn rgba16(&self, x: u32, y: u32) -> [u16; 4] {
                assert!((10..12).contains(&x) && y == 20, "({x}, {y}) outside bounds");
                if x == 10 {
                    [0xFFFF, 0xFFFF, 0xFFFF, 0xFFFF]
                } else {
                    [0, 0, 0, 0xFFFF]
                }
            }
        }

        let window = Window;
        let mut buf = FrameBuffer::new();
        let frame = convert(&mut buf, &window, Subsampling::Yuv444);
        assert_eq!(frame.y, &[235, 16]);
        assert_eq!(frame.rect, Rect::new(2, 1));
    }
}
