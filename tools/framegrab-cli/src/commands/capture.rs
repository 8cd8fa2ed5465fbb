//! Run a capture session and report what the consumer saw.

use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use clap::Args;
use framegrab_capture_engine::{
    enumerate_targets, AbortReason, CaptureTarget, EngineConfig, EngineController, EngineEvents,
    StrategyKind,
};
use framegrab_common::config::AppConfig;
use framegrab_platform_core::{CaptureTargets, Rect, Size, WindowHandle};
use tokio::sync::mpsc;

#[derive(Args, Debug)]
pub struct CaptureArgs {
    /// Zero-based monitor index (defaults to the primary monitor)
    #[arg(long, conflicts_with_all = ["window", "title", "region"])]
    monitor: Option<usize>,

    /// Window handle as listed by `framegrab targets` (hex or decimal)
    #[arg(long, conflicts_with_all = ["title", "region"])]
    window: Option<String>,

    /// First window whose title contains this text (case-insensitive)
    #[arg(long, conflicts_with = "region")]
    title: Option<String>,

    /// Screen region as X,Y,W,H in virtual-desktop pixels
    #[arg(long, value_parser = parse_region)]
    region: Option<Rect>,

    /// Frames per second (defaults to the configured rate)
    #[arg(long)]
    fps: Option<f64>,

    /// auto | pixel-copy | window-print | gpu-duplication
    #[arg(long)]
    strategy: Option<StrategyKind>,

    /// Do not draw the cursor into frames
    #[arg(long)]
    no_cursor: bool,

    /// Frame queue capacity
    #[arg(long)]
    queue: Option<usize>,

    /// Stop after this many seconds (runs until Ctrl+C otherwise)
    #[arg(long)]
    duration: Option<f64>,

    /// Capture the in-memory synthetic desktop instead of the real one
    #[arg(long)]
    synthetic: bool,
}

pub async fn run(args: CaptureArgs, app: &AppConfig) -> anyhow::Result<()> {
    let backend = super::backend(args.synthetic)?;
    let targets = enumerate_targets(backend.as_ref())?;
    let target = select_target(&args, &targets)?;

    let mut config = EngineConfig::from_defaults(&app.capture, target)?.with_cursor(!args.no_cursor);
    if let Some(fps) = args.fps {
        config.frame_rate = fps;
    }
    if let Some(strategy) = args.strategy {
        config = config.with_strategy(strategy);
    }
    if let Some(queue) = args.queue {
        config = config.with_queue_capacity(queue);
    }

    let deadline = args.duration.map(deadline_after).transpose()?;

    let (abort_tx, mut abort_rx) = mpsc::unbounded_channel::<AbortReason>();
    let events = EngineEvents::new()
        .on_target_size_changed(|size: Size| {
            println!("  target resized to {size}");
        })
        .on_aborted(move |reason| {
            let _ = abort_tx.send(reason.clone());
        });

    let mut controller = EngineController::new(backend);
    controller.configure(config.clone())?;
    controller.set_events(events);
    controller.start()?;

    println!("Capturing {} at {} fps", config.target, config.frame_rate);
    if let Some(strategy) = controller.active_strategy() {
        println!("  strategy: {strategy}");
    }
    match args.duration {
        Some(secs) => println!("  stopping after {secs}s"),
        None => println!("Press Ctrl+C to stop..."),
    }
    println!();

    let poll_every = Duration::from_secs_f64((1.0 / config.frame_rate / 2.0).max(0.001));
    let mut poll = tokio::time::interval(poll_every);
    let mut report = tokio::time::interval(Duration::from_secs(1));
    report.tick().await;

    let started = Instant::now();
    let mut consumed = 0u64;
    let mut last_size = None;
    let mut aborted = None;

    loop {
        tokio::select! {
            _ = poll.tick() => {
                while let Some(frame) = controller.next_frame() {
                    consumed += 1;
                    if last_size != Some(frame.size()) {
                        tracing::debug!(size = %frame.size(), seq = frame.sequence(), "Frame size");
                        last_size = Some(frame.size());
                    }
                }
            }
            _ = report.tick() => {
                if let Some(stats) = controller.stats() {
                    println!(
                        "  {:>6.1}s  captured {:>6}  consumed {:>6}  dropped {:>4}  overruns {:>4}",
                        started.elapsed().as_secs_f64(),
                        stats.frames_captured,
                        consumed,
                        stats.frames_dropped,
                        stats.ticks_overrun,
                    );
                }
            }
            reason = abort_rx.recv() => {
                aborted = reason;
                break;
            }
            _ = sleep_until(deadline) => break,
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    let stats = controller.stats();
    controller.stop();

    println!();
    if let Some(reason) = &aborted {
        println!("Capture aborted: {reason}");
    }
    if let Some(stats) = stats {
        let elapsed = started.elapsed().as_secs_f64();
        println!("Frames captured: {}", stats.frames_captured);
        println!("Frames consumed: {consumed}");
        println!(
            "Frames dropped:  {} ({:.1}%)",
            stats.frames_dropped,
            stats.drop_rate()
        );
        println!("Resize events:   {}", stats.size_changes);
        if elapsed > 0.0 {
            println!("Effective rate:  {:.2} fps", stats.frames_captured as f64 / elapsed);
        }
    }

    match aborted {
        Some(reason) => Err(anyhow!("capture aborted: {reason}")),
        None => Ok(()),
    }
}

fn deadline_after(secs: f64) -> anyhow::Result<tokio::time::Instant> {
    let span = Duration::try_from_secs_f64(secs.max(0.0))
        .with_context(|| format!("invalid capture duration {secs}s"))?;
    tokio::time::Instant::now()
        .checked_add(span)
        .with_context(|| format!("capture duration {secs}s is out of range"))
}

async fn sleep_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn select_target(args: &CaptureArgs, targets: &CaptureTargets) -> anyhow::Result<CaptureTarget> {
    if let Some(rect) = args.region {
        return Ok(CaptureTarget::region(rect));
    }

    if let Some(raw) = &args.window {
        let handle = parse_window_handle(raw)?;
        let window = targets
            .windows
            .iter()
            .find(|w| w.handle == handle)
            .with_context(|| format!("no capturable window with handle {handle}"))?;
        return Ok(CaptureTarget::window(window));
    }

    if let Some(needle) = &args.title {
        let window = targets
            .windows_matching(needle)
            .next()
            .with_context(|| format!("no window title contains {needle:?}"))?;
        return Ok(CaptureTarget::window(window));
    }

    let monitor = match args.monitor {
        Some(index) => targets.monitors.get(index).with_context(|| {
            format!(
                "monitor index {index} out of range ({} detected)",
                targets.monitors.len()
            )
        })?,
        None => targets
            .primary_monitor()
            .ok_or_else(|| anyhow!("no monitors detected"))?,
    };
    Ok(CaptureTarget::monitor(monitor))
}

fn parse_window_handle(raw: &str) -> anyhow::Result<WindowHandle> {
    let value = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => raw.parse(),
    }
    .with_context(|| format!("invalid window handle {raw:?}"))?;
    Ok(WindowHandle(value))
}

fn parse_region(raw: &str) -> Result<Rect, String> {
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    let [x, y, w, h] = parts.as_slice() else {
        return Err(format!("expected X,Y,W,H, got {raw:?}"));
    };
    let x = x.parse().map_err(|e| format!("bad X: {e}"))?;
    let y = y.parse().map_err(|e| format!("bad Y: {e}"))?;
    let w = w.parse().map_err(|e| format!("bad width: {e}"))?;
    let h = h.parse().map_err(|e| format!("bad height: {e}"))?;
    let rect = Rect::new(x, y, w, h);
    if rect.is_empty() {
        return Err(format!("region {raw:?} has no area"));
    }
    Ok(rect)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_parses_with_negative_origin() {
        assert_eq!(
            parse_region("-1920, 0, 800, 600"),
            Ok(Rect::new(-1920, 0, 800, 600))
        );
    }

    #[test]
    fn region_rejects_wrong_arity_and_empty_area() {
        assert!(parse_region("1,2,3").is_err());
        assert!(parse_region("0,0,0,10").is_err());
        assert!(parse_region("0,0,-5,10").is_err());
    }

    #[test]
    fn window_handle_accepts_hex_and_decimal() {
        assert_eq!(parse_window_handle("0x1000").unwrap(), WindowHandle(0x1000));
        assert_eq!(parse_window_handle("4096").unwrap(), WindowHandle(4096));
        assert!(parse_window_handle("window").is_err());
    }

    #[test]
    fn duration_must_fit_a_deadline() {
        assert!(deadline_after(f64::INFINITY).is_err());
        assert!(deadline_after(1e300).is_err());
        assert!(deadline_after(-3.0).is_ok());
        assert!(deadline_after(0.5).is_ok());
    }

    #[test]
    fn title_selects_synthetic_window() {
        let desktop = super::super::demo_desktop();
        let targets = enumerate_targets(&desktop).unwrap();
        let args = CaptureArgs {
            monitor: None,
            window: None,
            title: Some("notepad".to_string()),
            region: None,
            fps: None,
            strategy: None,
            no_cursor: false,
            queue: None,
            duration: None,
            synthetic: true,
        };

        match select_target(&args, &targets).unwrap() {
            CaptureTarget::Window { title, .. } => assert_eq!(title, "Untitled - Notepad"),
            other => panic!("unexpected target {other:?}"),
        }
    }
}
