//! CPU-side pixel buffers.

use serde::{Deserialize, Serialize};

use crate::Size;

/// Pixel layout of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// 8-bit blue, green, red, alpha; rows top-down.
    #[default]
    Bgra8,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Bgra8 => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("pixel data is {actual} bytes, expected {expected} for {width}x{height}")]
pub struct PixelBufferError {
    pub width: u32,
    pub height: u32,
    pub expected: usize,
    pub actual: usize,
}

/// An owned, tightly packed image.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
}

impl std::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl PixelBuffer {
    /// Wrap BGRA8 bytes; the length must be exactly `width * height * 4`.
    pub fn from_bgra(width: u32, height: u32, data: Vec<u8>) -> Result<Self, PixelBufferError> {
        let expected = width as usize * height as usize * PixelFormat::Bgra8.bytes_per_pixel();
        if data.len() != expected {
            return Err(PixelBufferError {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            format: PixelFormat::Bgra8,
            data,
        })
    }

    /// A fully transparent image.
    pub fn transparent(width: u32, height: u32) -> Self {
        Self::filled(width, height, [0, 0, 0, 0])
    }

    /// An image where every pixel is `bgra`.
    pub fn filled(width: u32, height: u32, bgra: [u8; 4]) -> Self {
        let count = width as usize * height as usize;
        let mut data = Vec::with_capacity(count * 4);
        for _ in 0..count {
            data.extend_from_slice(&bgra);
        }
        Self {
            width,
            height,
            format: PixelFormat::Bgra8,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.stride() + x as usize * self.format.bytes_per_pixel())
    }

    /// BGRA value at `(x, y)`, or `None` outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let at = self.offset(x, y)?;
        let px = &self.data[at..at + 4];
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Mutable BGRA slice at `(x, y)`, or `None` outside the image.
    pub fn pixel_mut(&mut self, x: u32, y: u32) -> Option<&mut [u8]> {
        let at = self.offset(x, y)?;
        Some(&mut self.data[at..at + 4])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_length() {
        let err = PixelBuffer::from_bgra(2, 2, vec![0; 15]).unwrap_err();
        assert_eq!(err.expected, 16);
        assert_eq!(err.actual, 15);
    }

    #[test]
    fn transparent_is_all_zero() {
        let buffer = PixelBuffer::transparent(1, 1);
        assert_eq!(buffer.data(), &[0, 0, 0, 0]);
        assert_eq!(buffer.stride(), 4);
    }

    #[test]
    fn pixel_outside_is_none() {
        let buffer = PixelBuffer::transparent(2, 2);
        assert!(buffer.pixel(2, 0).is_none());
        assert!(buffer.pixel(0, 2).is_none());
    }
}
