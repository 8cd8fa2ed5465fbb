//! Top-level window enumeration, geometry, and z-order.

use std::ffi::c_void;
use std::mem::size_of;
use std::ptr::addr_of_mut;

use framegrab_common::error::{FramegrabError, FramegrabResult};
use framegrab_platform_core::{Rect, WindowBounds, WindowHandle, WindowInfo};
use windows::Win32::Foundation::{BOOL, HWND, LPARAM, POINT, RECT, TRUE};
use windows::Win32::Graphics::Dwm::{
    DwmGetWindowAttribute, DWMWA_CLOAKED, DWMWA_EXTENDED_FRAME_BOUNDS,
};
use windows::Win32::Graphics::Gdi::ClientToScreen;
use windows::Win32::System::Threading::GetCurrentProcessId;
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetClientRect, GetShellWindow, GetWindowLongPtrW, GetWindowRect,
    GetWindowTextLengthW, GetWindowTextW, GetWindowThreadProcessId, IsIconic, IsWindow,
    IsWindowVisible, SetWindowPos, GWL_EXSTYLE, HWND_NOTOPMOST, HWND_TOPMOST, SWP_NOACTIVATE,
    SWP_NOMOVE, SWP_NOSIZE, WS_EX_TOOLWINDOW,
};

use crate::REGION_PICKER_TITLE;

pub(crate) fn to_hwnd(handle: WindowHandle) -> HWND {
    HWND(handle.0 as usize as *mut c_void)
}

fn from_hwnd(hwnd: HWND) -> WindowHandle {
    WindowHandle(hwnd.0 as usize as u64)
}

struct EnumContext {
    windows: Vec<WindowInfo>,
    shell: HWND,
    own_process: u32,
}

/// List visible, titled top-level windows owned by other processes.
///
/// Cloaked windows (suspended store apps, windows on other virtual desktops),
/// tool windows, and the region picker overlay are skipped. Minimized windows
/// are kept.
pub fn enumerate_windows() -> FramegrabResult<Vec<WindowInfo>> {
    let mut context = EnumContext {
        windows: Vec::new(),
        shell: unsafe { GetShellWindow() },
        own_process: unsafe { GetCurrentProcessId() },
    };

    unsafe {
        EnumWindows(Some(collect_window), LPARAM(addr_of_mut!(context) as isize))
            .map_err(|e| FramegrabError::platform(format!("EnumWindows failed: {e}")))?;
    }

    tracing::debug!(count = context.windows.len(), "Enumerated windows");
    Ok(context.windows)
}

unsafe extern "system" fn collect_window(hwnd: HWND, data: LPARAM) -> BOOL {
    let context = &mut *(data.0 as *mut EnumContext);
    if hwnd == context.shell || !IsWindowVisible(hwnd).as_bool() {
        return TRUE;
    }

    let mut process_id = 0u32;
    GetWindowThreadProcessId(hwnd, Some(&mut process_id));
    if process_id == context.own_process {
        return TRUE;
    }

    let ex_style = GetWindowLongPtrW(hwnd, GWL_EXSTYLE);
    if ex_style & WS_EX_TOOLWINDOW.0 as isize != 0 || is_cloaked(hwnd) {
        return TRUE;
    }

    let Some(title) = window_title(hwnd).filter(|t| t.as_str() != REGION_PICKER_TITLE) else {
        return TRUE;
    };

    context.windows.push(WindowInfo {
        handle: from_hwnd(hwnd),
        title,
        process_id,
    });
    TRUE
}

fn is_cloaked(hwnd: HWND) -> bool {
    let mut cloaked = 0u32;
    let queried = unsafe {
        DwmGetWindowAttribute(
            hwnd,
            DWMWA_CLOAKED,
            (&mut cloaked as *mut u32).cast(),
            size_of::<u32>() as u32,
        )
    };
    match queried {
        Ok(()) => cloaked != 0,
        Err(e) => {
            tracing::debug!(hwnd = ?hwnd.0, error = %e, "Cloak state unavailable");
            false
        }
    }
}

fn window_title(hwnd: HWND) -> Option<String> {
    let length = unsafe { GetWindowTextLengthW(hwnd) };
    if length <= 0 {
        return None;
    }
    let mut buffer = vec![0u16; length as usize + 1];
    let copied = unsafe { GetWindowTextW(hwnd, &mut buffer) };
    if copied <= 0 {
        return None;
    }
    Some(String::from_utf16_lossy(&buffer[..copied as usize]))
}

/// Visible frame and client area of a window, in physical screen pixels.
///
/// The frame comes from DWM so it excludes the invisible resize border and
/// drop shadow. A destroyed window is reported as `TargetGone`.
pub fn window_bounds(window: WindowHandle) -> FramegrabResult<WindowBounds> {
    let hwnd = to_hwnd(window);
    if !unsafe { IsWindow(hwnd) }.as_bool() {
        return Err(FramegrabError::target_gone(format!("window {window} no longer exists")));
    }

    let frame = frame_rect(hwnd).ok_or_else(|| {
        FramegrabError::target_gone(format!("window {window} bounds are unavailable"))
    })?;

    if unsafe { IsIconic(hwnd) }.as_bool() {
        return Ok(WindowBounds {
            frame,
            client: Rect::new(frame.x, frame.y, 0, 0),
            minimized: true,
        });
    }

    let mut client = RECT::default();
    unsafe { GetClientRect(hwnd, &mut client) }.map_err(|e| {
        FramegrabError::target_gone(format!("window {window} client area query failed: {e}"))
    })?;
    let mut origin = POINT { x: 0, y: 0 };
    if !unsafe { ClientToScreen(hwnd, &mut origin) }.as_bool() {
        return Err(FramegrabError::target_gone(format!(
            "window {window} client origin query failed"
        )));
    }

    Ok(WindowBounds {
        frame,
        client: Rect::new(
            origin.x,
            origin.y,
            (client.right - client.left).max(0) as u32,
            (client.bottom - client.top).max(0) as u32,
        ),
        minimized: false,
    })
}

fn frame_rect(hwnd: HWND) -> Option<Rect> {
    let mut rect = RECT::default();
    let from_dwm = unsafe {
        DwmGetWindowAttribute(
            hwnd,
            DWMWA_EXTENDED_FRAME_BOUNDS,
            (&mut rect as *mut RECT).cast(),
            size_of::<RECT>() as u32,
        )
    };
    if from_dwm.is_err() {
        unsafe { GetWindowRect(hwnd, &mut rect) }.ok()?;
    }
    Some(Rect::from_edges(rect.left, rect.top, rect.right, rect.bottom))
}

/// Pin a window above all non-topmost windows, or release it.
pub fn set_topmost(window: WindowHandle, topmost: bool) -> FramegrabResult<()> {
    let hwnd = to_hwnd(window);
    let insert_after = if topmost { HWND_TOPMOST } else { HWND_NOTOPMOST };
    unsafe {
        SetWindowPos(
            hwnd,
            insert_after,
            0,
            0,
            0,
            0,
            SWP_NOMOVE | SWP_NOSIZE | SWP_NOACTIVATE,
        )
    }
    .map_err(|e| FramegrabError::platform(format!("SetWindowPos on {window} failed: {e}")))
}
