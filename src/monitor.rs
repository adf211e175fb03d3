use smithay_client_toolkit::{
    output::OutputInfo,
    shell::{WaylandSurface, wlr_layer::LayerSurface},
    shm::{Shm, slot::SlotPool},
};
use wayland_client::protocol::{wl_output::WlOutput, wl_surface::WlSurface};

use crate::{
    canvas::Canvas,
    geometry::{self, Extent, FALLBACK_DPI},
    layout::Painter,
    pool::{Allocator, BufferPool, PoolError, Region},
    text::{ScaledFont, Shaper},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceState {
    /// Surface requested, no size from the compositor yet.
    Unconfigured,
    Sized,
    /// Presented at least once.
    Active,
    Closed,
}

/// Everything the compositor has told us about one output and its bar surface.
#[derive(Debug, Clone)]
pub struct MonitorState {
    name: String,
    state: SurfaceState,
    scale: u32,
    size: Extent,
    dpi: f32,
    font_dirty: bool,
}

impl MonitorState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: SurfaceState::Unconfigured,
            scale: 1,
            size: Extent::new(0, 0),
            dpi: FALLBACK_DPI,
            font_dirty: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> SurfaceState {
        self.state
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn dpi(&self) -> f32 {
        self.dpi
    }

    /// Records a configure. Returns true when an active surface changed size.
    pub fn configure(&mut self, width: u32, height: u32) -> bool {
        if self.state == SurfaceState::Closed {
            return false;
        }

        let size = Extent::new(width, height);
        let resized = self.state == SurfaceState::Active && size != self.size;
        self.size = size;
        self.state = SurfaceState::Sized;
        resized
    }

    /// Records a new scale factor. Returns true when it changed.
    pub fn set_scale(&mut self, scale: i32) -> bool {
        let scale = scale.max(1) as u32;
        if scale == self.scale {
            return false;
        }
        self.scale = scale;
        self.font_dirty = true;
        true
    }

    /// Static output properties, applied once the compositor finished announcing them.
    pub fn set_geometry(&mut self, physical_mm: (i32, i32), mode_px: (i32, i32)) {
        self.dpi = geometry::dpi(physical_mm, mode_px);
    }

    pub fn update_from_info(&mut self, info: &OutputInfo) -> bool {
        if let Some(name) = &info.name {
            self.name.clone_from(name);
        }
        let mode = info
            .modes
            .iter()
            .find(|mode| mode.current)
            .map_or((0, 0), |mode| mode.dimensions);
        self.set_geometry(info.physical_size, mode);
        self.set_scale(info.scale_factor)
    }

    pub fn can_render(&self) -> bool {
        matches!(self.state, SurfaceState::Sized | SurfaceState::Active)
    }

    /// Buffer size in device pixels.
    pub fn device_extent(&self) -> Extent {
        assert!(
            self.can_render(),
            "{}: no render target in state {:?}",
            self.name,
            self.state
        );
        self.size.scaled(self.scale)
    }

    /// Takes the pending font rebuild, if any.
    pub fn take_font_dirty(&mut self) -> bool {
        std::mem::take(&mut self.font_dirty)
    }

    pub fn mark_presented(&mut self) {
        if self.state == SurfaceState::Sized {
            self.state = SurfaceState::Active;
        }
    }

    pub fn close(&mut self) {
        self.state = SurfaceState::Closed;
    }
}

/// The drawable side of a monitor: state, buffers and the font scaled for it.
pub struct Viewport<R: Region> {
    pub state: MonitorState,
    pool: BufferPool<R>,
    font: Option<ScaledFont>,
}

impl<R: Region> Viewport<R> {
    pub fn new(state: MonitorState) -> Self {
        Self {
            state,
            pool: BufferPool::new(),
            font: None,
        }
    }

    pub fn pool(&self) -> &BufferPool<R> {
        &self.pool
    }

    pub fn font(&self) -> Option<&ScaledFont> {
        self.font.as_ref()
    }

    /// Paints `status` into a free buffer and returns it with its size.
    pub fn draw<A, S>(
        &mut self,
        allocator: &A,
        painter: &mut Painter<S>,
        status: &str,
    ) -> Result<(&R::Handle, Extent), PoolError>
    where
        A: Allocator<Region = R>,
        S: Shaper,
    {
        let extent = self.state.device_extent();

        if self.state.take_font_dirty() || self.font.is_none() {
            self.font = Some(painter.load_font(self.state.scale()));
        }
        if self.pool.ensure_size(allocator, extent)? {
            log::debug!(
                "{}: buffers now {}x{}",
                self.state.name(),
                extent.width,
                extent.height
            );
        }

        let frame = self.pool.next_frame()?;
        let mut canvas = Canvas::new(frame.pixels, frame.extent);
        if let Some(font) = &self.font {
            painter.paint(&mut canvas, font, status);
        }

        Ok((frame.handle, frame.extent))
    }

    pub fn destroy(&mut self) {
        self.pool.destroy();
        self.font = None;
        self.state.close();
    }
}

/// One output with its layer surface.
pub struct MonitorSession {
    output: WlOutput,
    layer: LayerSurface,
    view: Viewport<SlotPool>,
}

impl MonitorSession {
    pub fn new(output: WlOutput, layer: LayerSurface, state: MonitorState) -> Self {
        Self {
            output,
            layer,
            view: Viewport::new(state),
        }
    }

    pub fn output(&self) -> &WlOutput {
        &self.output
    }

    pub fn wl_surface(&self) -> &WlSurface {
        self.layer.wl_surface()
    }

    pub fn state(&self) -> &MonitorState {
        &self.view.state
    }

    pub fn state_mut(&mut self) -> &mut MonitorState {
        &mut self.view.state
    }

    pub fn can_render(&self) -> bool {
        self.view.state.can_render()
    }

    /// Draws and commits one frame.
    pub fn render<S: Shaper>(
        &mut self,
        shm: &Shm,
        painter: &mut Painter<S>,
        status: &str,
    ) -> Result<(), PoolError> {
        let scale = self.view.state.scale();
        let (buffer, extent) = self.view.draw(shm, painter, status)?;

        let wl_surface = self.layer.wl_surface();
        wl_surface.set_buffer_scale(scale as i32);
        buffer.attach_to(wl_surface)?;
        wl_surface.damage_buffer(0, 0, extent.width as i32, extent.height as i32);
        self.layer.commit();

        self.view.state.mark_presented();
        Ok(())
    }

    /// Releases buffers and the surface. The session cannot be used afterwards.
    pub fn destroy(&mut self) {
        if self.view.state.state() == SurfaceState::Closed {
            return;
        }
        log::info!("{}: destroying bar surface", self.view.state.name());
        self.view.destroy();
    }
}

impl Drop for MonitorSession {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        pool::heap::{HeapAllocator, HeapRegion},
        text::{FontDescription, FontFamily, ShapedRun},
        theme::Theme,
    };

    /// Counts font loads so rebuilds can be observed.
    #[derive(Default)]
    struct CountingShaper {
        loads: Vec<u32>,
    }

    impl Shaper for CountingShaper {
        fn load(&mut self, description: &FontDescription, scale: u32) -> ScaledFont {
            self.loads.push(scale);
            ScaledFont {
                family: FontFamily::Monospace,
                scale,
                pixel_size: description.pixel_size(scale),
                ascent: 10.0,
                descent: 3.0,
            }
        }

        fn shape(&mut self, _text: &str, _font: &ScaledFont) -> ShapedRun {
            ShapedRun::default()
        }
    }

    fn painter() -> Painter<CountingShaper> {
        Painter::new(
            CountingShaper::default(),
            FontDescription::default(),
            Theme::default(),
        )
    }

    #[test]
    fn configure_moves_to_sized_then_active() {
        let mut state = MonitorState::new("DP-1");
        assert_eq!(state.state(), SurfaceState::Unconfigured);
        assert!(!state.can_render());

        assert!(!state.configure(800, 20));
        assert_eq!(state.state(), SurfaceState::Sized);

        state.mark_presented();
        assert_eq!(state.state(), SurfaceState::Active);

        assert!(state.configure(1024, 20));
        assert!(!state.configure(1024, 20));
    }

    #[test]
    fn closed_is_final() {
        let mut state = MonitorState::new("DP-1");
        state.configure(800, 20);
        state.close();
        state.configure(800, 20);
        assert_eq!(state.state(), SurfaceState::Closed);
        assert!(!state.can_render());
    }

    #[test]
    #[should_panic(expected = "no render target")]
    fn rendering_unconfigured_surface_panics() {
        MonitorState::new("DP-1").device_extent();
    }

    #[test]
    fn scale_is_clamped_and_marks_font_dirty() {
        let mut state = MonitorState::new("eDP-1");
        assert!(state.take_font_dirty());
        assert!(!state.set_scale(0));
        assert!(!state.take_font_dirty());

        assert!(state.set_scale(2));
        assert!(state.take_font_dirty());
        assert!(!state.take_font_dirty());
    }

    #[test]
    fn dpi_defaults_without_physical_size() {
        let mut state = MonitorState::new("HEADLESS-1");
        state.set_geometry((0, 0), (1920, 1080));
        assert_eq!(state.dpi(), FALLBACK_DPI);
    }

    #[test]
    fn geometry_sets_dpi() {
        let mut state = MonitorState::new("DP-1");
        state.set_geometry((597, 336), (2560, 1440));
        assert!((state.dpi() - 109.0).abs() < 1.0, "{}", state.dpi());
    }

    #[test]
    fn scale_change_reallocates_and_reloads_font() {
        let mut view = Viewport::<HeapRegion>::new(MonitorState::new("eDP-1"));
        let mut painter = painter();
        view.state.configure(800, 20);

        let (_, extent) = view.draw(&HeapAllocator, &mut painter, "").unwrap();
        assert_eq!(extent, Extent::new(800, 20));
        view.state.mark_presented();

        view.state.set_scale(2);
        let (_, extent) = view.draw(&HeapAllocator, &mut painter, "").unwrap();
        assert_eq!(extent, Extent::new(1600, 40));
        assert_eq!(view.pool().allocations(), 2);
        assert_eq!(view.font().map(|font| font.scale), Some(2));
        assert_eq!(painter_loads(&painter), [1, 2]);
    }

    #[test]
    fn redraw_at_same_size_reuses_buffers_and_font() {
        let mut view = Viewport::<HeapRegion>::new(MonitorState::new("eDP-1"));
        let mut painter = painter();
        view.state.configure(800, 20);

        view.draw(&HeapAllocator, &mut painter, "a").unwrap();
        view.draw(&HeapAllocator, &mut painter, "b").unwrap();
        assert_eq!(view.pool().allocations(), 1);
        assert_eq!(painter_loads(&painter), [1]);
    }

    fn painter_loads(painter: &Painter<CountingShaper>) -> Vec<u32> {
        painter.shaper().loads.clone()
    }
}
