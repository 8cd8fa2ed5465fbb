//! Monitor enumeration and DPI handling.

use std::ffi::c_void;
use std::mem::size_of;
use std::ptr::addr_of_mut;

use framegrab_common::error::{FramegrabError, FramegrabResult};
use framegrab_platform_core::{MonitorHandle, MonitorInfo, Rect};
use windows::core::PCWSTR;
use windows::Win32::Foundation::{BOOL, LPARAM, RECT, TRUE};
use windows::Win32::Graphics::Gdi::{
    EnumDisplayMonitors, EnumDisplaySettingsW, GetMonitorInfoW, DEVMODEW, ENUM_CURRENT_SETTINGS,
    HDC, HMONITOR, MONITORINFOEXW,
};
use windows::Win32::UI::HiDpi::{
    GetDpiForMonitor, SetProcessDpiAwarenessContext, DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2,
    MDT_EFFECTIVE_DPI,
};

const MONITORINFOF_PRIMARY: u32 = 1;
const BASE_DPI: f64 = 96.0;

/// Opt the process into per-monitor DPI awareness so every coordinate the
/// engine sees is in physical pixels.
///
/// Fails harmlessly when the host already chose an awareness mode.
pub fn enable_per_monitor_dpi_awareness() {
    match unsafe { SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2) } {
        Ok(()) => tracing::debug!("Per-monitor DPI awareness enabled"),
        Err(e) => tracing::debug!(error = %e, "DPI awareness already set by the host"),
    }
}

pub(crate) fn to_hmonitor(handle: MonitorHandle) -> HMONITOR {
    HMONITOR(handle.0 as usize as *mut c_void)
}

/// Detect connected monitors, in the order Windows reports them.
pub fn detect_monitors() -> FramegrabResult<Vec<MonitorInfo>> {
    tracing::debug!("Detecting monitors");

    let mut handles: Vec<HMONITOR> = Vec::new();
    unsafe {
        let _ = EnumDisplayMonitors(
            None,
            None,
            Some(collect_monitor),
            LPARAM(addr_of_mut!(handles) as isize),
        );
    }

    let monitors: Vec<MonitorInfo> = handles.into_iter().filter_map(describe_monitor).collect();
    if monitors.is_empty() {
        return Err(FramegrabError::platform("no monitors reported by the system"));
    }
    Ok(monitors)
}

unsafe extern "system" fn collect_monitor(
    monitor: HMONITOR,
    _: HDC,
    _: *mut RECT,
    data: LPARAM,
) -> BOOL {
    let handles = &mut *(data.0 as *mut Vec<HMONITOR>);
    handles.push(monitor);
    TRUE
}

fn describe_monitor(monitor: HMONITOR) -> Option<MonitorInfo> {
    let mut info = MONITORINFOEXW::default();
    info.monitorInfo.cbSize = size_of::<MONITORINFOEXW>() as u32;

    let ok = unsafe { GetMonitorInfoW(monitor, &mut info as *mut _ as *mut _) }.as_bool();
    if !ok {
        tracing::warn!(handle = ?monitor.0, "GetMonitorInfoW failed, skipping monitor");
        return None;
    }

    let bounds = info.monitorInfo.rcMonitor;
    let name = String::from_utf16_lossy(
        &info.szDevice[..info.szDevice.iter().position(|&c| c == 0).unwrap_or(info.szDevice.len())],
    );

    Some(MonitorInfo {
        handle: MonitorHandle(monitor.0 as usize as u64),
        name,
        rect: Rect::from_edges(bounds.left, bounds.top, bounds.right, bounds.bottom),
        scale_factor: scale_factor(monitor),
        refresh_rate_hz: refresh_rate(&info.szDevice),
        primary: info.monitorInfo.dwFlags & MONITORINFOF_PRIMARY != 0,
    })
}

fn scale_factor(monitor: HMONITOR) -> f64 {
    let (mut dpi_x, mut dpi_y) = (0u32, 0u32);
    match unsafe { GetDpiForMonitor(monitor, MDT_EFFECTIVE_DPI, &mut dpi_x, &mut dpi_y) } {
        Ok(()) if dpi_x > 0 => dpi_x as f64 / BASE_DPI,
        _ => 1.0,
    }
}

fn refresh_rate(device: &[u16; 32]) -> u32 {
    let mut mode = DEVMODEW {
        dmSize: size_of::<DEVMODEW>() as u16,
        ..Default::default()
    };
    let ok = unsafe {
        EnumDisplaySettingsW(PCWSTR(device.as_ptr()), ENUM_CURRENT_SETTINGS, &mut mode)
    }
    .as_bool();

    if ok && mode.dmDisplayFrequency > 1 {
        mode.dmDisplayFrequency
    } else {
        60
    }
}
