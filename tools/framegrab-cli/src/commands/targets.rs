//! List capture targets.

use framegrab_capture_engine::enumerate_targets;

pub fn run(synthetic: bool, json: bool) -> anyhow::Result<()> {
    let backend = super::backend(synthetic)?;
    let targets = enumerate_targets(backend.as_ref())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&targets)?);
        return Ok(());
    }

    println!("Monitors ({}):", targets.monitors.len());
    for (index, m) in targets.monitors.iter().enumerate() {
        println!(
            "  [{index}] {} {}x{} at ({}, {}) @ {}Hz (scale: {}x) {}",
            m.name,
            m.rect.width,
            m.rect.height,
            m.rect.x,
            m.rect.y,
            m.refresh_rate_hz,
            m.scale_factor,
            if m.primary { "(primary)" } else { "" }
        );
    }

    println!();
    println!("Windows ({}):", targets.windows.len());
    for w in &targets.windows {
        println!("  {}  pid {:>6}  {}", w.handle, w.process_id, w.title);
    }

    Ok(())
}
