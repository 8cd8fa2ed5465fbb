//! Cursor compositing.
//!
//! [`CursorCompositor`] wraps any [`CaptureSource`] and draws the system
//! cursor onto each frame it produces. The cursor is sampled once per tick,
//! placed relative to the target origin, scaled to the user's preferred
//! cursor size, and alpha-blended. A cursor that cannot be sampled or is
//! hidden leaves the frame untouched; it is never an error.

use std::sync::Arc;

use framegrab_common::error::FramegrabResult;
use framegrab_platform_core::{CursorImage, PixelBuffer, Point, Rect};

use crate::backend::CaptureBackend;
use crate::frame::Frame;
use crate::source::CaptureSource;
use crate::tracker::TargetGeometry;

/// Where and how large to draw the cursor on one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorOverlay {
    /// Left edge in frame pixels (may be negative).
    pub x: i32,
    /// Top edge in frame pixels (may be negative).
    pub y: i32,
    /// Drawn width after scaling.
    pub width: u32,
    /// Drawn height after scaling.
    pub height: u32,
    /// Scale factor applied to the cursor image.
    pub scale: f64,
}

impl CursorOverlay {
    /// Place `image` so its hotspot lands on `position`, in the coordinate
    /// space of a frame whose top-left is `origin`.
    pub fn place(position: Point, image: &CursorImage, origin: Point, preferred_size: u32) -> Self {
        let nominal = image.width().max(1);
        let scale = preferred_size.max(1) as f64 / nominal as f64;
        let hotspot = image.hotspot();
        let hotspot_x = (hotspot.x as f64 * scale).round() as i32;
        let hotspot_y = (hotspot.y as f64 * scale).round() as i32;
        let local = position.offset_from(origin);

        Self {
            x: local.x.saturating_sub(hotspot_x),
            y: local.y.saturating_sub(hotspot_y),
            width: ((image.width() as f64 * scale).round() as u32).max(1),
            height: ((image.height() as f64 * scale).round() as u32).max(1),
            scale,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

/// Alpha-blend `image` onto `frame` at `overlay`, clipped to the frame.
///
/// Scaling uses nearest-neighbour sampling. Fully transparent cursor pixels
/// leave the frame bytes unchanged.
pub fn blend_cursor(frame: &mut PixelBuffer, image: &CursorImage, overlay: &CursorOverlay) {
    let bounds = Rect::new(0, 0, frame.width(), frame.height());
    let Some(visible) = bounds.intersect(&overlay.rect()) else {
        return;
    };

    for fy in visible.y..visible.bottom() as i32 {
        let sy = ((fy - overlay.y) as u64 * image.height() as u64 / overlay.height as u64) as u32;
        for fx in visible.x..visible.right() as i32 {
            let sx = ((fx - overlay.x) as u64 * image.width() as u64 / overlay.width as u64) as u32;
            let src = image.pixel(sx.min(image.width() - 1), sy.min(image.height() - 1));
            let alpha = src[3] as u32;
            if alpha == 0 {
                continue;
            }
            let Some(dst) = frame.pixel_mut(fx as u32, fy as u32) else {
                continue;
            };
            let inverse = 255 - alpha;
            for channel in 0..3 {
                dst[channel] =
                    ((src[channel] as u32 * alpha + dst[channel] as u32 * inverse + 127) / 255) as u8;
            }
            dst[3] = (alpha + (dst[3] as u32 * inverse + 127) / 255).min(255) as u8;
        }
    }
}

/// Decorates a capture source with the system cursor.
pub struct CursorCompositor {
    inner: Box<dyn CaptureSource>,
    backend: Arc<dyn CaptureBackend>,
    preferred_size: Option<u32>,
}

impl CursorCompositor {
    pub fn new(inner: Box<dyn CaptureSource>, backend: Arc<dyn CaptureBackend>) -> Self {
        Self {
            inner,
            backend,
            preferred_size: None,
        }
    }

    /// The preferred cursor size, read once per compositor.
    fn preferred_size(&mut self) -> u32 {
        if let Some(size) = self.preferred_size {
            return size;
        }
        let size = self.backend.cursor_size_preference().max(1);
        self.preferred_size = Some(size);
        size
    }
}

impl CaptureSource for CursorCompositor {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn capture(&mut self, geometry: &TargetGeometry) -> FramegrabResult<Frame> {
        let mut frame = self.inner.capture(geometry)?;
        if frame.is_placeholder() {
            return Ok(frame);
        }

        let snapshot = match self.backend.cursor_snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::trace!(error = %e, "Cursor sample failed, frame left undecorated");
                return Ok(frame);
            }
        };
        let Some(image) = snapshot.image.as_ref().filter(|_| snapshot.visible) else {
            return Ok(frame);
        };

        let overlay =
            CursorOverlay::place(snapshot.position, image, geometry.origin, self.preferred_size());
        blend_cursor(frame.buffer_mut(), image, &overlay);
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SyntheticBackend;
    use framegrab_platform_core::{CursorSnapshot, Size};
    use proptest::prelude::*;

    const RED: [u8; 4] = [0, 0, 255, 255];
    const GREY: [u8; 4] = [40, 40, 40, 255];

    struct Solid;

    impl CaptureSource for Solid {
        fn name(&self) -> &str {
            "solid"
        }

        fn capture(&mut self, geometry: &TargetGeometry) -> FramegrabResult<Frame> {
            if geometry.is_degenerate() {
                return Ok(Frame::placeholder());
            }
            Ok(Frame::new(PixelBuffer::filled(
                geometry.size.width,
                geometry.size.height,
                GREY,
            )))
        }
    }

    fn cursor(width: u32, height: u32, hotspot: Point, bgra: [u8; 4]) -> CursorImage {
        CursorImage::new(
            width,
            height,
            hotspot,
            PixelBuffer::filled(width, height, bgra).into_data(),
        )
        .unwrap()
    }

    fn compositor(backend: &SyntheticBackend) -> CursorCompositor {
        CursorCompositor::new(Box::new(Solid), Arc::new(backend.clone()))
    }

    fn geometry() -> TargetGeometry {
        TargetGeometry::from_rect(Rect::new(100, 50, 20, 20))
    }

    #[test]
    fn draws_at_position_minus_hotspot_minus_origin() {
        let backend = SyntheticBackend::new();
        backend.set_cursor_size(2);
        backend.set_cursor(CursorSnapshot {
            position: Point::new(111, 61),
            visible: true,
            image: Some(cursor(2, 2, Point::new(1, 1), RED)),
        });

        let frame = compositor(&backend).capture(&geometry()).unwrap();
        let buffer = frame.buffer();
        assert_eq!(buffer.pixel(10, 10), Some(RED));
        assert_eq!(buffer.pixel(11, 11), Some(RED));
        assert_eq!(buffer.pixel(9, 10), Some(GREY));
        assert_eq!(buffer.pixel(12, 12), Some(GREY));
    }

    #[test]
    fn hidden_cursor_leaves_frame_identical() {
        let backend = SyntheticBackend::new();
        backend.set_cursor(CursorSnapshot {
            position: Point::new(105, 55),
            visible: false,
            image: Some(cursor(4, 4, Point::new(0, 0), RED)),
        });

        let decorated = compositor(&backend).capture(&geometry()).unwrap();
        let plain = Solid.capture(&geometry()).unwrap();
        assert_eq!(decorated.data(), plain.data());
    }

    #[test]
    fn failed_cursor_sample_is_not_an_error() {
        let backend = SyntheticBackend::new();
        backend.fail_cursor(true);

        let frame = compositor(&backend).capture(&geometry()).unwrap();
        assert_eq!(frame.buffer().pixel(0, 0), Some(GREY));
    }

    #[test]
    fn cursor_is_clipped_at_frame_edges() {
        let backend = SyntheticBackend::new();
        backend.set_cursor_size(4);
        backend.set_cursor(CursorSnapshot {
            position: Point::new(98, 48),
            visible: true,
            image: Some(cursor(4, 4, Point::new(0, 0), RED)),
        });

        let frame = compositor(&backend).capture(&geometry()).unwrap();
        assert_eq!(frame.buffer().pixel(0, 0), Some(RED));
        assert_eq!(frame.buffer().pixel(1, 1), Some(RED));
        assert_eq!(frame.buffer().pixel(2, 2), Some(GREY));
    }

    #[test]
    fn cursor_scales_to_preferred_size() {
        let backend = SyntheticBackend::new();
        backend.set_cursor_size(8);
        backend.set_cursor(CursorSnapshot {
            position: Point::new(100, 50),
            visible: true,
            image: Some(cursor(4, 4, Point::new(0, 0), RED)),
        });

        let frame = compositor(&backend).capture(&geometry()).unwrap();
        assert_eq!(frame.buffer().pixel(7, 7), Some(RED));
        assert_eq!(frame.buffer().pixel(8, 8), Some(GREY));
    }

    #[test]
    fn placeholder_frames_are_not_decorated() {
        let backend = SyntheticBackend::new();
        backend.set_cursor(CursorSnapshot {
            position: Point::new(0, 0),
            visible: true,
            image: Some(cursor(4, 4, Point::new(0, 0), RED)),
        });

        let frame = compositor(&backend)
            .capture(&TargetGeometry::new(Point::new(0, 0), Size::new(0, 0)))
            .unwrap();
        assert!(frame.is_placeholder());
        assert_eq!(frame.data(), &[0, 0, 0, 0]);
    }

    #[test]
    fn half_transparent_cursor_blends() {
        let mut frame = PixelBuffer::filled(1, 1, [0, 0, 0, 255]);
        let image = cursor(1, 1, Point::new(0, 0), [255, 255, 255, 128]);
        let overlay = CursorOverlay::place(Point::new(0, 0), &image, Point::new(0, 0), 1);

        blend_cursor(&mut frame, &image, &overlay);
        assert_eq!(frame.pixel(0, 0), Some([128, 128, 128, 255]));
    }

    proptest! {
        #[test]
        fn unscaled_placement_is_position_minus_hotspot_minus_origin(
            px in -2000i32..2000, py in -2000i32..2000,
            ox in -2000i32..2000, oy in -2000i32..2000,
            hx in 0i32..32, hy in 0i32..32,
        ) {
            let image = cursor(32, 32, Point::new(hx, hy), RED);
            let overlay = CursorOverlay::place(Point::new(px, py), &image, Point::new(ox, oy), 32);
            prop_assert_eq!(overlay.x, px - hx - ox);
            prop_assert_eq!(overlay.y, py - hy - oy);
            prop_assert_eq!((overlay.width, overlay.height), (32, 32));
        }
    }
}
