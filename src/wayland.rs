use anyhow::Context;
use smithay_client_toolkit::{
    compositor::CompositorState,
    output::OutputState,
    registry::RegistryState,
    shell::{
        WaylandSurface,
        wlr_layer::{Anchor, KeyboardInteractivity, Layer, LayerShell},
    },
    shm::Shm,
};
use wayland_client::{
    QueueHandle,
    globals::GlobalList,
    protocol::{wl_output::WlOutput, wl_surface::WlSurface},
};

use crate::{
    Bar,
    config::Edge,
    monitor::{MonitorSession, MonitorState},
};

const NAMESPACE: &str = "swab";

/// Connection-wide globals plus one bar per output.
pub struct Display {
    pub registry_state: RegistryState,
    pub output_state: OutputState,
    pub shm: Shm,
    pub compositor: CompositorState,
    pub layer_shell: LayerShell,
    pub monitors: Vec<MonitorSession>,
    height: u32,
    edge: Edge,
}

impl Display {
    /// Binds the globals a bar cannot work without.
    pub fn open(
        globals: &GlobalList,
        qh: &QueueHandle<Bar>,
        height: u32,
        edge: Edge,
    ) -> anyhow::Result<Self> {
        let shm = Shm::bind(globals, qh).context("compositor does not provide wl_shm")?;
        let compositor =
            CompositorState::bind(globals, qh).context("compositor does not provide wl_compositor")?;
        let layer_shell =
            LayerShell::bind(globals, qh).context("compositor does not provide zwlr_layer_shell_v1")?;

        Ok(Self {
            registry_state: RegistryState::new(globals),
            output_state: OutputState::new(globals, qh),
            shm,
            compositor,
            layer_shell,
            monitors: Vec::new(),
            height,
            edge,
        })
    }

    fn anchor(&self) -> Anchor {
        let edge = match self.edge {
            Edge::Top => Anchor::TOP,
            Edge::Bottom => Anchor::BOTTOM,
        };
        edge | Anchor::LEFT | Anchor::RIGHT
    }

    /// Creates the bar surface for a newly announced output.
    pub fn add_monitor(&mut self, qh: &QueueHandle<Bar>, output: WlOutput) {
        if self.monitor_for_output(&output).is_some() {
            return;
        }

        let mut state = MonitorState::new("unknown");
        if let Some(info) = self.output_state.info(&output) {
            state.update_from_info(&info);
        }

        let surface = self.compositor.create_surface(qh);
        let layer = self.layer_shell.create_layer_surface(
            qh,
            surface,
            Layer::Top,
            Some(NAMESPACE),
            Some(&output),
        );
        layer.set_size(0, self.height);
        layer.set_anchor(self.anchor());
        layer.set_exclusive_zone(self.height as i32);
        layer.set_margin(0, 0, 0, 0);
        layer.set_keyboard_interactivity(KeyboardInteractivity::None);
        layer.commit();

        log::info!(
            "{}: created bar (scale {}, {:.0} dpi)",
            state.name(),
            state.scale(),
            state.dpi()
        );
        self.monitors.push(MonitorSession::new(output, layer, state));
    }

    pub fn remove_monitor(&mut self, surface: &WlSurface) {
        self.monitors.retain(|monitor| monitor.wl_surface() != surface);
    }

    pub fn remove_output(&mut self, output: &WlOutput) {
        self.monitors.retain(|monitor| monitor.output() != output);
    }

    pub fn monitor_for_surface(&mut self, surface: &WlSurface) -> Option<&mut MonitorSession> {
        self.monitors
            .iter_mut()
            .find(|monitor| monitor.wl_surface() == surface)
    }

    pub fn monitor_for_output(&mut self, output: &WlOutput) -> Option<&mut MonitorSession> {
        self.monitors
            .iter_mut()
            .find(|monitor| monitor.output() == output)
    }

    pub fn for_each_monitor(&mut self, f: impl FnMut(&mut MonitorSession)) {
        self.monitors.iter_mut().for_each(f);
    }

    /// Destroys every bar surface and its buffers.
    pub fn close(&mut self) {
        self.for_each_monitor(MonitorSession::destroy);
        self.monitors.clear();
    }
}
