use anyhow::{anyhow, Result};
use web_sys::HtmlCanvasElement;
use wgpu::{Device, Queue, Surface, SurfaceConfiguration, TextureFormat, TextureView};

pub(crate) const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

pub struct Renderer {
    pub surface: Surface<'static>,
    pub config: SurfaceConfiguration,
    pub device: Device,
    pub queue: Queue,
    pub depth_texture_view: TextureView,
}

#[cfg(target_arch = "wasm32")]
fn create_surface(
    instance: &wgpu::Instance,
    canvas: HtmlCanvasElement,
) -> Result<Surface<'static>> {
    Ok(instance.create_surface(wgpu::SurfaceTarget::Canvas(canvas))?)
}

#[cfg(not(target_arch = "wasm32"))]
fn create_surface(
    _instance: &wgpu::Instance,
    _canvas: HtmlCanvasElement,
) -> Result<Surface<'static>> {
    Err(anyhow!("canvas surfaces are only available on wasm32"))
}

/// Tracks canvas sizes while the renderer is created asynchronously, so a
/// resize that lands mid-creation is applied once the renderer exists and a
/// failed creation can be retried on the next resize.
#[derive(Debug, Default)]
pub struct SurfaceSize {
    pending: bool,
    latest: Option<(u32, u32)>,
}

impl SurfaceSize {
    /// Record a new canvas size. Returns the size to create a renderer with
    /// when no creation is in flight; zero sizes are ignored.
    pub fn resized(&mut self, width: u32, height: u32) -> Option<(u32, u32)> {
        if width == 0 || height == 0 {
            return None;
        }
        self.latest = Some((width, height));
        if self.pending {
            return None;
        }
        self.pending = true;
        self.latest
    }

    /// The renderer is ready. Returns the last size seen, which may differ
    /// from the one it was created with.
    pub fn created(&mut self) -> Option<(u32, u32)> {
        self.pending = false;
        self.latest.take()
    }

    pub fn failed(&mut self) {
        self.pending = false;
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }
}

fn create_depth_texture(device: &Device, width: u32, height: u32) -> TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth_texture"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

impl Renderer {
    /// `transparent` asks for a surface that composites over the page.
    pub async fn new(
        canvas: HtmlCanvasElement,
        width: u32,
        height: u32,
        transparent: bool,
    ) -> Result<Self> {
        let width = width.max(1);
        let height = height.max(1);
        let instance = wgpu::Instance::default();
        let surface = create_surface(&instance, canvas)?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                force_fallback_adapter: false,
                compatible_surface: Some(&surface),
            })
            .await
            .ok_or(anyhow!("Failed to find an appropriate adapter"))?;
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: None,
                    required_features: wgpu::Features::empty(),
                    // Make sure we use the texture resolution limits from the adapter, so we can support images the size of the swapchain.
                    required_limits: wgpu::Limits::downlevel_webgl2_defaults()
                        .using_resolution(adapter.limits()),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        // Colors are authored as plain hex values, so write them unconverted.
        let texture_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or(surface_caps.formats.first().copied())
            .ok_or(anyhow!("surface reports no texture format"))?;
        let alpha_mode = if transparent
            && surface_caps
                .alpha_modes
                .contains(&wgpu::CompositeAlphaMode::PreMultiplied)
        {
            wgpu::CompositeAlphaMode::PreMultiplied
        } else {
            surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto)
        };

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: texture_format,
            width,
            height,
            present_mode: wgpu::PresentMode::Fifo,
            desired_maximum_frame_latency: 2,
            alpha_mode,
            view_formats: vec![],
        };

        surface.configure(&device, &config);
        let depth_texture_view = create_depth_texture(&device, width, height);

        leptos::logging::log!(
            "renderer ready: {}x{} {:?} {:?}",
            width,
            height,
            texture_format,
            alpha_mode
        );

        Ok(Self {
            surface,
            device,
            config,
            queue,
            depth_texture_view,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.depth_texture_view = create_depth_texture(&self.device, width, height);
    }

    #[inline]
    pub fn w(&self) -> u32 {
        self.config.width
    }

    #[inline]
    pub fn h(&self) -> u32 {
        self.config.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_nonzero_resize_starts_creation() {
        let mut size = SurfaceSize::default();
        assert_eq!(size.resized(0, 600), None);
        assert!(!size.is_pending());
        assert_eq!(size.resized(800, 600), Some((800, 600)));
        assert!(size.is_pending());
    }

    #[test]
    fn resize_during_creation_is_applied_afterwards() {
        let mut size = SurfaceSize::default();
        assert_eq!(size.resized(800, 600), Some((800, 600)));
        assert_eq!(size.resized(1024, 768), None);
        assert_eq!(size.resized(1280, 720), None);
        assert_eq!(size.created(), Some((1280, 720)));
        assert!(!size.is_pending());
    }

    #[test]
    fn failed_creation_retries_on_next_resize() {
        let mut size = SurfaceSize::default();
        assert_eq!(size.resized(800, 600), Some((800, 600)));
        size.failed();
        assert_eq!(size.resized(800, 600), Some((800, 600)));
        assert!(size.is_pending());
    }
}
