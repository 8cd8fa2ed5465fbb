//! Cursor state sampled once per capture tick.

use crate::pixels::PixelBufferError;
use crate::Point;

/// A cursor bitmap: BGRA8 with straight (non-premultiplied) alpha.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorImage {
    width: u32,
    height: u32,
    /// Pixel inside the image that represents the pointer tip.
    hotspot: Point,
    pixels: Vec<u8>,
}

impl CursorImage {
    pub fn new(
        width: u32,
        height: u32,
        hotspot: Point,
        pixels: Vec<u8>,
    ) -> Result<Self, PixelBufferError> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(PixelBufferError {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            hotspot,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn hotspot(&self) -> Point {
        self.hotspot
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// BGRA value at `(x, y)`; callers stay inside the image.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let at = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.pixels[at],
            self.pixels[at + 1],
            self.pixels[at + 2],
            self.pixels[at + 3],
        ]
    }
}

/// The system cursor at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorSnapshot {
    /// Pointer position in virtual-screen coordinates.
    pub position: Point,
    /// Whether the OS is currently showing the cursor.
    pub visible: bool,
    /// The current cursor shape, when it could be resolved.
    pub image: Option<CursorImage>,
}

impl CursorSnapshot {
    pub fn hidden() -> Self {
        Self {
            position: Point::default(),
            visible: false,
            image: None,
        }
    }
}
