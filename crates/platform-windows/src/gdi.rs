//! GDI capture: desktop blits and `PrintWindow`.
//!
//! Every device context and bitmap is owned by a guard that releases it on
//! drop, including on early returns.

use std::mem::size_of;

use framegrab_common::error::{FramegrabError, FramegrabResult};
use framegrab_platform_core::{PixelBuffer, Rect, Size, WindowHandle};
use windows::Win32::Graphics::Gdi::{
    BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDC, GetDIBits,
    ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, CAPTUREBLT, DIB_RGB_COLORS,
    HBITMAP, HDC, HGDIOBJ, ROP_CODE, SRCCOPY,
};
use windows::Win32::Storage::Xps::{PrintWindow, PRINT_WINDOW_FLAGS, PW_CLIENTONLY};

use crate::window::to_hwnd;

/// Render DirectComposition / hardware-accelerated content as well.
const PW_RENDERFULLCONTENT: PRINT_WINDOW_FLAGS = PRINT_WINDOW_FLAGS(2);

pub(crate) struct ScreenDc(pub(crate) HDC);

impl ScreenDc {
    pub(crate) fn acquire() -> FramegrabResult<Self> {
        let dc = unsafe { GetDC(None) };
        if dc.is_invalid() {
            return Err(FramegrabError::capture("GetDC for the screen failed"));
        }
        Ok(Self(dc))
    }
}

impl Drop for ScreenDc {
    fn drop(&mut self) {
        unsafe {
            ReleaseDC(None, self.0);
        }
    }
}

pub(crate) struct MemoryDc(pub(crate) HDC);

impl MemoryDc {
    pub(crate) fn compatible_with(screen: &ScreenDc) -> FramegrabResult<Self> {
        let dc = unsafe { CreateCompatibleDC(screen.0) };
        if dc.is_invalid() {
            return Err(FramegrabError::capture("CreateCompatibleDC failed"));
        }
        Ok(Self(dc))
    }
}

impl Drop for MemoryDc {
    fn drop(&mut self) {
        unsafe {
            let _ = DeleteDC(self.0);
        }
    }
}

pub(crate) struct Bitmap(pub(crate) HBITMAP);

impl Bitmap {
    fn compatible_with(screen: &ScreenDc, size: Size) -> FramegrabResult<Self> {
        let bitmap =
            unsafe { CreateCompatibleBitmap(screen.0, size.width as i32, size.height as i32) };
        if bitmap.is_invalid() {
            return Err(FramegrabError::capture(format!(
                "CreateCompatibleBitmap {size} failed"
            )));
        }
        Ok(Self(bitmap))
    }
}

impl Drop for Bitmap {
    fn drop(&mut self) {
        unsafe {
            let _ = DeleteObject(self.0);
        }
    }
}

/// Restores the previously selected object when dropped.
pub(crate) struct Selection<'a> {
    dc: &'a MemoryDc,
    previous: HGDIOBJ,
}

impl<'a> Selection<'a> {
    pub(crate) fn bitmap(dc: &'a MemoryDc, bitmap: HBITMAP) -> Self {
        let previous = unsafe { SelectObject(dc.0, HGDIOBJ(bitmap.0)) };
        Self { dc, previous }
    }
}

impl Drop for Selection<'_> {
    fn drop(&mut self) {
        unsafe {
            SelectObject(self.dc.0, self.previous);
        }
    }
}

/// Copy a rectangle of the virtual screen.
pub fn copy_screen(region: Rect) -> FramegrabResult<PixelBuffer> {
    let size = region.size();
    if size.is_empty() {
        return Err(FramegrabError::capture("cannot copy an empty screen region"));
    }

    let screen = ScreenDc::acquire()?;
    let memory = MemoryDc::compatible_with(&screen)?;
    let bitmap = Bitmap::compatible_with(&screen, size)?;

    {
        let _selected = Selection::bitmap(&memory, bitmap.0);
        unsafe {
            BitBlt(
                memory.0,
                0,
                0,
                size.width as i32,
                size.height as i32,
                screen.0,
                region.x,
                region.y,
                ROP_CODE(SRCCOPY.0 | CAPTUREBLT.0),
            )
        }
        .map_err(|e| FramegrabError::capture(format!("BitBlt of {size} failed: {e}")))?;
    }

    read_bitmap(&memory, &bitmap, size)
}

/// Ask a window to render its client area into an offscreen bitmap of `size`.
///
/// Works for occluded windows; the window must still exist.
pub fn print_window(window: WindowHandle, size: Size) -> FramegrabResult<PixelBuffer> {
    if size.is_empty() {
        return Err(FramegrabError::capture("cannot print a window with an empty client area"));
    }

    let screen = ScreenDc::acquire()?;
    let memory = MemoryDc::compatible_with(&screen)?;
    let bitmap = Bitmap::compatible_with(&screen, size)?;

    {
        let _selected = Selection::bitmap(&memory, bitmap.0);
        let flags = PRINT_WINDOW_FLAGS(PW_CLIENTONLY.0 | PW_RENDERFULLCONTENT.0);
        let printed = unsafe { PrintWindow(to_hwnd(window), memory.0, flags) }.as_bool();
        if !printed {
            return Err(FramegrabError::capture(format!("PrintWindow on {window} failed")));
        }
    }

    read_bitmap(&memory, &bitmap, size)
}

/// Read a bitmap back as top-down BGRA8 with an opaque alpha channel.
fn read_bitmap(memory: &MemoryDc, bitmap: &Bitmap, size: Size) -> FramegrabResult<PixelBuffer> {
    let mut info = BITMAPINFO {
        bmiHeader: BITMAPINFOHEADER {
            biSize: size_of::<BITMAPINFOHEADER>() as u32,
            biWidth: size.width as i32,
            biHeight: -(size.height as i32),
            biPlanes: 1,
            biBitCount: 32,
            biCompression: BI_RGB.0,
            ..Default::default()
        },
        ..Default::default()
    };

    let mut data = vec![0u8; size.area() as usize * 4];
    let lines = unsafe {
        GetDIBits(
            memory.0,
            bitmap.0,
            0,
            size.height,
            Some(data.as_mut_ptr().cast()),
            &mut info,
            DIB_RGB_COLORS,
        )
    };
    if lines != size.height as i32 {
        return Err(FramegrabError::capture(format!(
            "GetDIBits returned {lines} of {} rows",
            size.height
        )));
    }

    // GDI leaves the fourth byte undefined for 32bpp RGB bitmaps.
    for pixel in data.chunks_exact_mut(4) {
        pixel[3] = 255;
    }

    PixelBuffer::from_bgra(size.width, size.height, data)
        .map_err(|e| FramegrabError::capture(e.to_string()))
}
