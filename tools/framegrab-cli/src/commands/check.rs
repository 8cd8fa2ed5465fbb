//! Check system capture capabilities.

use framegrab_capture_engine::native_backend;
use framegrab_platform_core::virtual_desktop_bounds;
use framegrab_platform_windows::probe_graphics_capture_support;

pub fn run() -> anyhow::Result<()> {
    println!("Framegrab System Check");
    println!("{}", "=".repeat(50));

    let backend = match native_backend() {
        Ok(backend) => {
            println!("[OK] Capture backend: {}", backend.name());
            backend
        }
        Err(e) => {
            println!("[FAIL] Capture backend: {e}");
            println!();
            println!("Use `framegrab capture --synthetic` to exercise the engine anyway.");
            return Ok(());
        }
    };

    match backend.detect_monitors() {
        Ok(monitors) => {
            println!("[OK] Monitors detected: {}", monitors.len());
            for m in &monitors {
                println!(
                    "     {} {}x{} @ {}Hz (scale: {}x) {}",
                    m.name,
                    m.rect.width,
                    m.rect.height,
                    m.refresh_rate_hz,
                    m.scale_factor,
                    if m.primary { "(primary)" } else { "" }
                );
            }
            let desktop = virtual_desktop_bounds(&monitors);
            println!(
                "     virtual desktop {}x{} at ({}, {})",
                desktop.width, desktop.height, desktop.x, desktop.y
            );
        }
        Err(e) => println!("[FAIL] Monitor detection: {e}"),
    }

    match backend.enumerate_windows() {
        Ok(windows) => println!("[OK] Capturable windows: {}", windows.len()),
        Err(e) => println!("[WARN] Window enumeration: {e}"),
    }

    let gpu = probe_graphics_capture_support();
    if gpu.available {
        println!("[OK] GPU duplication (Windows Graphics Capture) available");
        if !gpu.border_optional {
            println!("     capture border cannot be hidden on this build");
        }
    } else {
        println!("[WARN] GPU duplication unavailable, monitors use pixel copy");
    }

    match backend.cursor_snapshot() {
        Ok(cursor) => println!(
            "[OK] Cursor sampling ({}, preferred size {}px)",
            if cursor.visible { "visible" } else { "hidden" },
            backend.cursor_size_preference()
        ),
        Err(e) => println!("[WARN] Cursor sampling: {e}"),
    }

    Ok(())
}
