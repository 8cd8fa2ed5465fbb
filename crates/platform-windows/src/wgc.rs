//! Per-monitor GPU duplication through Windows.Graphics.Capture.
//!
//! ```text
//! HMONITOR ──IGraphicsCaptureItemInterop::CreateForMonitor──► GraphicsCaptureItem
//!   │
//!   ▼
//! Direct3D11CaptureFramePool (free threaded, BGRA8, 2 buffers)
//!   │  FrameArrived (thread pool): keep only the newest frame
//!   ▼
//! FrameSignal ──acquire_latest──► staging texture ──Map──► PixelBuffer
//! ```

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use framegrab_common::error::{FramegrabError, FramegrabResult};
use framegrab_platform_core::{MonitorInfo, PixelBuffer};
use windows::core::{IInspectable, Interface, HSTRING};
use windows::Foundation::Metadata::ApiInformation;
use windows::Foundation::{EventRegistrationToken, TypedEventHandler};
use windows::Graphics::Capture::{
    Direct3D11CaptureFrame, Direct3D11CaptureFramePool, GraphicsCaptureItem,
    GraphicsCaptureSession,
};
use windows::Graphics::DirectX::Direct3D11::IDirect3DDevice;
use windows::Graphics::DirectX::DirectXPixelFormat;
use windows::Win32::Foundation::HMODULE;
use windows::Win32::Graphics::Direct3D::{
    D3D_DRIVER_TYPE, D3D_DRIVER_TYPE_HARDWARE, D3D_DRIVER_TYPE_WARP,
};
use windows::Win32::Graphics::Direct3D11::{
    D3D11CreateDevice, ID3D11Device, ID3D11DeviceContext, ID3D11Texture2D,
    D3D11_CPU_ACCESS_READ, D3D11_CREATE_DEVICE_BGRA_SUPPORT, D3D11_MAPPED_SUBRESOURCE,
    D3D11_MAP_READ, D3D11_SDK_VERSION, D3D11_TEXTURE2D_DESC, D3D11_USAGE_STAGING,
};
use windows::Win32::Graphics::Dxgi::Common::{DXGI_FORMAT_B8G8R8A8_UNORM, DXGI_SAMPLE_DESC};
use windows::Win32::Graphics::Dxgi::IDXGIDevice;
use windows::Win32::System::WinRT::Direct3D11::{
    CreateDirect3D11DeviceFromDXGIDevice, IDirect3DDxgiInterfaceAccess,
};
use windows::Win32::System::WinRT::Graphics::Capture::IGraphicsCaptureItemInterop;
use windows::Win32::System::WinRT::{RoInitialize, RO_INIT_MULTITHREADED};

use crate::convert::pack_rows;
use crate::display::to_hmonitor;
use crate::GraphicsCaptureSupport;

const POOL_BUFFERS: i32 = 2;

/// Probe whether Windows Graphics Capture is available.
pub fn probe_graphics_capture_support() -> GraphicsCaptureSupport {
    let available = GraphicsCaptureSession::IsSupported().unwrap_or(false);
    let border_optional = available
        && ApiInformation::IsPropertyPresent(
            &HSTRING::from("Windows.Graphics.Capture.GraphicsCaptureSession"),
            &HSTRING::from("IsBorderRequired"),
        )
        .unwrap_or(false);
    GraphicsCaptureSupport {
        available,
        border_optional,
    }
}

#[derive(Default)]
struct FrameState {
    latest: Option<Direct3D11CaptureFrame>,
    sequence: u64,
    closed: bool,
}

#[derive(Default)]
struct FrameSignal {
    state: Mutex<FrameState>,
    arrived: Condvar,
}

/// An open duplication session for one monitor.
pub struct MonitorDuplication {
    monitor: String,
    device: ID3D11Device,
    context: ID3D11DeviceContext,
    item: GraphicsCaptureItem,
    pool: Direct3D11CaptureFramePool,
    session: GraphicsCaptureSession,
    frame_arrived: EventRegistrationToken,
    closed: EventRegistrationToken,
    signal: Arc<FrameSignal>,
    seen: u64,
    staging: Option<(ID3D11Texture2D, u32, u32)>,
}

// The WinRT objects are agile and the D3D11 immediate context is only used
// from whichever thread currently owns this value.
unsafe impl Send for MonitorDuplication {}

impl MonitorDuplication {
    /// Start duplicating `monitor`.
    ///
    /// Fails with `Unsupported` when the OS does not offer Windows Graphics
    /// Capture, so callers can fall back to another strategy.
    pub fn open(monitor: &MonitorInfo) -> FramegrabResult<Self> {
        if !probe_graphics_capture_support().available {
            return Err(FramegrabError::unsupported(
                "Windows Graphics Capture is not available on this system",
            ));
        }

        unsafe {
            let _ = RoInitialize(RO_INIT_MULTITHREADED);
        }

        let (device, context) = create_device()?;
        let dxgi: IDXGIDevice = device.cast().map_err(platform("ID3D11Device as IDXGIDevice"))?;
        let winrt_device: IDirect3DDevice = unsafe { CreateDirect3D11DeviceFromDXGIDevice(&dxgi) }
            .and_then(|inspectable| inspectable.cast())
            .map_err(platform("CreateDirect3D11DeviceFromDXGIDevice"))?;

        let interop = windows::core::factory::<GraphicsCaptureItem, IGraphicsCaptureItemInterop>()
            .map_err(platform("IGraphicsCaptureItemInterop factory"))?;
        let item: GraphicsCaptureItem = unsafe { interop.CreateForMonitor(to_hmonitor(monitor.handle)) }
            .map_err(|e| {
                FramegrabError::target_gone(format!("monitor {} is not capturable: {e}", monitor.name))
            })?;
        let size = item.Size().map_err(platform("GraphicsCaptureItem::Size"))?;

        let pool = Direct3D11CaptureFramePool::CreateFreeThreaded(
            &winrt_device,
            DirectXPixelFormat::B8G8R8A8UIntNormalized,
            POOL_BUFFERS,
            size,
        )
        .map_err(platform("Direct3D11CaptureFramePool::CreateFreeThreaded"))?;
        let session = pool
            .CreateCaptureSession(&item)
            .map_err(platform("CreateCaptureSession"))?;

        // The engine draws its own cursor; older builds lack these setters.
        let _ = session.SetIsCursorCaptureEnabled(false);
        let _ = session.SetIsBorderRequired(false);

        let signal = Arc::new(FrameSignal::default());
        let on_frame = signal.clone();
        let frame_arrived = pool
            .FrameArrived(&TypedEventHandler::<Direct3D11CaptureFramePool, IInspectable>::new(
                move |sender, _| {
                    let Some(pool) = sender else {
                        return Ok(());
                    };
                    let mut newest: Option<Direct3D11CaptureFrame> = None;
                    while let Ok(frame) = pool.TryGetNextFrame() {
                        if let Some(older) = newest.replace(frame) {
                            let _ = older.Close();
                        }
                    }
                    if let (Some(frame), Ok(mut state)) = (newest, on_frame.state.lock()) {
                        if let Some(older) = state.latest.replace(frame) {
                            let _ = older.Close();
                        }
                        state.sequence = state.sequence.wrapping_add(1);
                        on_frame.arrived.notify_all();
                    }
                    Ok(())
                },
            ))
            .map_err(platform("FrameArrived registration"))?;

        let on_closed = signal.clone();
        let closed = item
            .Closed(&TypedEventHandler::<GraphicsCaptureItem, IInspectable>::new(move |_, _| {
                if let Ok(mut state) = on_closed.state.lock() {
                    state.closed = true;
                    on_closed.arrived.notify_all();
                }
                Ok(())
            }))
            .map_err(platform("GraphicsCaptureItem::Closed registration"))?;

        session.StartCapture().map_err(platform("StartCapture"))?;
        tracing::info!(
            monitor = %monitor.name,
            width = size.Width,
            height = size.Height,
            "Windows Graphics Capture session started"
        );

        Ok(Self {
            monitor: monitor.name.clone(),
            device,
            context,
            item,
            pool,
            session,
            frame_arrived,
            closed,
            signal,
            seen: 0,
            staging: None,
        })
    }

    /// Wait up to `timeout` for a frame newer than the last one returned.
    ///
    /// `Ok(None)` means nothing new was composited in time. A monitor that was
    /// disconnected is reported as `TargetGone`.
    pub fn acquire_latest(&mut self, timeout: Duration) -> FramegrabResult<Option<PixelBuffer>> {
        let deadline = Instant::now() + timeout;
        let frame = {
            let mut state = self
                .signal
                .state
                .lock()
                .map_err(|_| FramegrabError::capture("frame signal mutex poisoned"))?;
            loop {
                if state.closed {
                    return Err(FramegrabError::target_gone(format!(
                        "monitor {} was disconnected",
                        self.monitor
                    )));
                }
                if state.sequence != self.seen {
                    break;
                }
                let now = Instant::now();
                if now >= deadline {
                    return Ok(None);
                }
                state = self
                    .signal
                    .arrived
                    .wait_timeout(state, deadline - now)
                    .map_err(|_| FramegrabError::capture("frame signal mutex poisoned"))?
                    .0;
            }
            self.seen = state.sequence;
            state.latest.take()
        };

        let Some(frame) = frame else {
            return Ok(None);
        };
        let buffer = self.read_back(&frame);
        let _ = frame.Close();
        buffer.map(Some)
    }

    fn read_back(&mut self, frame: &Direct3D11CaptureFrame) -> FramegrabResult<PixelBuffer> {
        let access: IDirect3DDxgiInterfaceAccess = frame
            .Surface()
            .and_then(|surface| surface.cast())
            .map_err(capture("frame surface"))?;
        let texture: ID3D11Texture2D =
            unsafe { access.GetInterface() }.map_err(capture("surface texture"))?;

        let mut desc = D3D11_TEXTURE2D_DESC::default();
        unsafe { texture.GetDesc(&mut desc) };
        let (width, height) = (desc.Width, desc.Height);

        let staging = self.staging_texture(width, height)?;
        unsafe { self.context.CopyResource(&staging, &texture) };

        let mut mapped = D3D11_MAPPED_SUBRESOURCE::default();
        unsafe {
            self.context
                .Map(&staging, 0, D3D11_MAP_READ, 0, Some(&mut mapped))
        }
        .map_err(capture("Map staging texture"))?;

        let row_bytes = width as usize * 4;
        let pitch = mapped.RowPitch as usize;
        let packed = if mapped.pData.is_null() {
            None
        } else {
            let len = pitch * (height as usize).saturating_sub(1) + row_bytes;
            let source = unsafe { std::slice::from_raw_parts(mapped.pData as *const u8, len) };
            pack_rows(source, row_bytes, pitch, height as usize)
        };
        unsafe { self.context.Unmap(&staging, 0) };

        let data = packed.ok_or_else(|| FramegrabError::capture("mapped texture is too small"))?;
        PixelBuffer::from_bgra(width, height, data).map_err(|e| FramegrabError::capture(e.to_string()))
    }

    fn staging_texture(&mut self, width: u32, height: u32) -> FramegrabResult<ID3D11Texture2D> {
        if let Some((texture, w, h)) = &self.staging {
            if (*w, *h) == (width, height) {
                return Ok(texture.clone());
            }
        }

        let desc = D3D11_TEXTURE2D_DESC {
            Width: width,
            Height: height,
            MipLevels: 1,
            ArraySize: 1,
            Format: DXGI_FORMAT_B8G8R8A8_UNORM,
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            Usage: D3D11_USAGE_STAGING,
            BindFlags: 0,
            CPUAccessFlags: D3D11_CPU_ACCESS_READ.0 as u32,
            MiscFlags: 0,
        };
        let mut texture: Option<ID3D11Texture2D> = None;
        unsafe { self.device.CreateTexture2D(&desc, None, Some(&mut texture)) }
            .map_err(capture("CreateTexture2D staging"))?;
        let texture =
            texture.ok_or_else(|| FramegrabError::capture("CreateTexture2D returned nothing"))?;

        tracing::debug!(width, height, "Allocated staging texture");
        self.staging = Some((texture.clone(), width, height));
        Ok(texture)
    }
}

impl Drop for MonitorDuplication {
    fn drop(&mut self) {
        let _ = self.pool.RemoveFrameArrived(self.frame_arrived);
        let _ = self.item.RemoveClosed(self.closed);
        if let Ok(mut state) = self.signal.state.lock() {
            if let Some(frame) = state.latest.take() {
                let _ = frame.Close();
            }
        }
        let _ = self.session.Close();
        let _ = self.pool.Close();
        tracing::debug!(monitor = %self.monitor, "Windows Graphics Capture session closed");
    }
}

fn create_device() -> FramegrabResult<(ID3D11Device, ID3D11DeviceContext)> {
    let mut last_error = None;
    for driver in [D3D_DRIVER_TYPE_HARDWARE, D3D_DRIVER_TYPE_WARP] {
        match create_device_with(driver) {
            Ok(pair) => return Ok(pair),
            Err(e) => {
                tracing::debug!(driver = driver.0, error = %e, "D3D11CreateDevice failed");
                last_error = Some(e);
            }
        }
    }
    Err(FramegrabError::unsupported(format!(
        "no Direct3D 11 device available: {}",
        last_error.map(|e| e.to_string()).unwrap_or_default()
    )))
}

fn create_device_with(
    driver: D3D_DRIVER_TYPE,
) -> windows::core::Result<(ID3D11Device, ID3D11DeviceContext)> {
    let mut device: Option<ID3D11Device> = None;
    let mut context: Option<ID3D11DeviceContext> = None;
    unsafe {
        D3D11CreateDevice(
            None,
            driver,
            HMODULE::default(),
            D3D11_CREATE_DEVICE_BGRA_SUPPORT,
            None,
            D3D11_SDK_VERSION,
            Some(&mut device),
            None,
            Some(&mut context),
        )?;
    }
    match (device, context) {
        (Some(device), Some(context)) => Ok((device, context)),
        _ => Err(windows::core::Error::from(windows::Win32::Foundation::E_POINTER)),
    }
}

fn platform(what: &'static str) -> impl Fn(windows::core::Error) -> FramegrabError {
    move |e| FramegrabError::platform(format!("{what} failed: {e}"))
}

fn capture(what: &'static str) -> impl Fn(windows::core::Error) -> FramegrabError {
    move |e| FramegrabError::capture(format!("{what} failed: {e}"))
}
