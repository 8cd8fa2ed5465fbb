//! System cursor sampling.

use std::ffi::c_void;
use std::mem::size_of;

use framegrab_common::error::{FramegrabError, FramegrabResult};
use framegrab_platform_core::{CursorImage, CursorSnapshot, Point};
use windows::core::w;
use windows::Win32::Foundation::{ERROR_SUCCESS, POINT};
use windows::Win32::Graphics::Gdi::{
    CreateDIBSection, GdiFlush, GetObjectW, BITMAP, BITMAPINFO, BITMAPINFOHEADER, BI_RGB,
    DIB_RGB_COLORS, HBITMAP, HGDIOBJ,
};
use windows::Win32::System::Registry::{RegGetValueW, HKEY_CURRENT_USER, RRF_RT_REG_DWORD};
use windows::Win32::UI::WindowsAndMessaging::{
    DrawIconEx, GetCursorInfo, GetIconInfo, GetSystemMetrics, CURSORINFO, CURSORINFO_FLAGS,
    CURSOR_SHOWING, DI_NORMAL, HCURSOR, HICON, ICONINFO, SM_CXCURSOR,
};

use crate::convert::alpha_from_backgrounds;
use crate::gdi::{Bitmap, MemoryDc, ScreenDc, Selection};
use crate::DEFAULT_CURSOR_SIZE;

/// Current cursor position, visibility, and shape.
///
/// The shape is best effort: when it cannot be extracted the snapshot still
/// reports position and visibility with `image: None`.
pub fn cursor_snapshot() -> FramegrabResult<CursorSnapshot> {
    let mut info = CURSORINFO {
        cbSize: size_of::<CURSORINFO>() as u32,
        flags: CURSORINFO_FLAGS(0),
        hCursor: HCURSOR::default(),
        ptScreenPos: POINT::default(),
    };
    unsafe { GetCursorInfo(&mut info) }
        .map_err(|e| FramegrabError::capture(format!("GetCursorInfo failed: {e}")))?;

    let position = Point::new(info.ptScreenPos.x, info.ptScreenPos.y);
    let visible = info.flags.0 & CURSOR_SHOWING.0 != 0 && !info.hCursor.is_invalid();
    if !visible {
        return Ok(CursorSnapshot {
            position,
            visible: false,
            image: None,
        });
    }

    let image = match cursor_image(HICON(info.hCursor.0)) {
        Ok(image) => Some(image),
        Err(e) => {
            tracing::trace!(error = %e, "Cursor shape unavailable");
            None
        }
    };

    Ok(CursorSnapshot {
        position,
        visible: true,
        image,
    })
}

fn cursor_image(icon: HICON) -> FramegrabResult<CursorImage> {
    let mut icon_info = ICONINFO::default();
    unsafe { GetIconInfo(icon, &mut icon_info) }
        .map_err(|e| FramegrabError::capture(format!("GetIconInfo failed: {e}")))?;

    // GetIconInfo hands us copies of both bitmaps; the guards free them.
    let color = owned_bitmap(icon_info.hbmColor);
    let mask = owned_bitmap(icon_info.hbmMask);

    let (width, height) = match (&color, &mask) {
        (Some(color), _) => bitmap_size(color)?,
        // Monochrome cursors stack the AND and XOR masks vertically.
        (None, Some(mask)) => bitmap_size(mask).map(|(w, h)| (w, h / 2))?,
        (None, None) => return Err(FramegrabError::capture("cursor has no bitmaps")),
    };
    if width == 0 || height == 0 {
        return Err(FramegrabError::capture("cursor bitmap is empty"));
    }

    let over_black = render_icon(icon, width, height, 0x00)?;
    let over_white = render_icon(icon, width, height, 0xFF)?;
    let pixels = alpha_from_backgrounds(&over_black, &over_white);

    let hotspot = Point::new(icon_info.xHotspot as i32, icon_info.yHotspot as i32);
    CursorImage::new(width, height, hotspot, pixels)
        .map_err(|e| FramegrabError::capture(e.to_string()))
}

fn owned_bitmap(handle: HBITMAP) -> Option<Bitmap> {
    (!handle.is_invalid()).then_some(Bitmap(handle))
}

fn bitmap_size(bitmap: &Bitmap) -> FramegrabResult<(u32, u32)> {
    let mut header = BITMAP::default();
    let copied = unsafe {
        GetObjectW(
            HGDIOBJ(bitmap.0 .0),
            size_of::<BITMAP>() as i32,
            Some(&mut header as *mut BITMAP as *mut c_void),
        )
    };
    if copied == 0 {
        return Err(FramegrabError::capture("GetObjectW on cursor bitmap failed"));
    }
    Ok((header.bmWidth.max(0) as u32, header.bmHeight.max(0) as u32))
}

/// Draw the icon onto a 32bpp surface pre-filled with `background`.
fn render_icon(icon: HICON, width: u32, height: u32, background: u8) -> FramegrabResult<Vec<u8>> {
    let screen = ScreenDc::acquire()?;
    let memory = MemoryDc::compatible_with(&screen)?;

    let info = BITMAPINFO {
        bmiHeader: BITMAPINFOHEADER {
            biSize: size_of::<BITMAPINFOHEADER>() as u32,
            biWidth: width as i32,
            biHeight: -(height as i32),
            biPlanes: 1,
            biBitCount: 32,
            biCompression: BI_RGB.0,
            ..Default::default()
        },
        ..Default::default()
    };

    let mut bits: *mut c_void = std::ptr::null_mut();
    let section = unsafe { CreateDIBSection(memory.0, &info, DIB_RGB_COLORS, &mut bits, None, 0) }
        .map_err(|e| FramegrabError::capture(format!("CreateDIBSection failed: {e}")))?;
    let section = Bitmap(section);
    if bits.is_null() {
        return Err(FramegrabError::capture("CreateDIBSection returned no pixels"));
    }

    let len = width as usize * height as usize * 4;
    let surface = unsafe { std::slice::from_raw_parts_mut(bits as *mut u8, len) };
    surface.fill(background);

    {
        let _selected = Selection::bitmap(&memory, section.0);
        unsafe {
            DrawIconEx(memory.0, 0, 0, icon, width as i32, height as i32, 0, None, DI_NORMAL)
        }
        .map_err(|e| FramegrabError::capture(format!("DrawIconEx failed: {e}")))?;
        unsafe {
            let _ = GdiFlush();
        }
    }

    Ok(surface.to_vec())
}

/// The cursor size the user picked in accessibility settings, in pixels.
pub fn cursor_size_preference() -> u32 {
    let mut value = 0u32;
    let mut len = size_of::<u32>() as u32;
    let status = unsafe {
        RegGetValueW(
            HKEY_CURRENT_USER,
            w!("Control Panel\\Cursors"),
            w!("CursorBaseSize"),
            RRF_RT_REG_DWORD,
            None,
            Some(&mut value as *mut u32 as *mut c_void),
            Some(&mut len),
        )
    };
    if status == ERROR_SUCCESS && value > 0 {
        return value;
    }

    match unsafe { GetSystemMetrics(SM_CXCURSOR) } {
        size if size > 0 => size as u32,
        _ => DEFAULT_CURSOR_SIZE,
    }
}
