use smithay_client_toolkit::{
    compositor::CompositorHandler,
    delegate_compositor, delegate_layer, delegate_output, delegate_registry, delegate_shm,
    output::{OutputHandler, OutputState},
    registry::{ProvidesRegistryState, RegistryState},
    registry_handlers,
    shell::{
        WaylandSurface,
        wlr_layer::{LayerShellHandler, LayerSurface, LayerSurfaceConfigure},
    },
    shm::{Shm, ShmHandler},
};
use wayland_client::{
    Connection, QueueHandle,
    protocol::{wl_output, wl_surface},
};

use crate::Bar;

impl CompositorHandler for Bar {
    fn scale_factor_changed(
        &mut self,
        _: &Connection,
        _: &QueueHandle<Self>,
        surface: &wl_surface::WlSurface,
        new_factor: i32,
    ) {
        let Some(monitor) = self.display.monitor_for_surface(surface) else {
            return;
        };
        if monitor.state_mut().set_scale(new_factor) {
            log::info!("{}: scale now {new_factor}", monitor.state().name());
            self.render_surface(surface);
        }
    }

    fn transform_changed(
        &mut self,
        _: &Connection,
        _: &QueueHandle<Self>,
        _: &wl_surface::WlSurface,
        _: wl_output::Transform,
    ) {
    }

    fn frame(&mut self, _: &Connection, _: &QueueHandle<Self>, _: &wl_surface::WlSurface, _: u32) {}

    fn surface_enter(
        &mut self,
        _: &Connection,
        _: &QueueHandle<Self>,
        _: &wl_surface::WlSurface,
        _: &wl_output::WlOutput,
    ) {
    }

    fn surface_leave(
        &mut self,
        _: &Connection,
        _: &QueueHandle<Self>,
        _: &wl_surface::WlSurface,
        _: &wl_output::WlOutput,
    ) {
    }
}

impl OutputHandler for Bar {
    fn output_state(&mut self) -> &mut OutputState {
        &mut self.display.output_state
    }

    fn new_output(&mut self, _: &Connection, qh: &QueueHandle<Self>, output: wl_output::WlOutput) {
        self.display.add_monitor(qh, output);
    }

    fn update_output(&mut self, _: &Connection, _: &QueueHandle<Self>, output: wl_output::WlOutput) {
        let Some(info) = self.display.output_state.info(&output) else {
            return;
        };
        let Some(monitor) = self.display.monitor_for_output(&output) else {
            return;
        };
        if monitor.state_mut().update_from_info(&info) {
            let surface = monitor.wl_surface().clone();
            self.render_surface(&surface);
        }
    }

    fn output_destroyed(&mut self, _: &Connection, _: &QueueHandle<Self>, output: wl_output::WlOutput) {
        log::info!("output removed");
        self.display.remove_output(&output);
    }
}

impl LayerShellHandler for Bar {
    fn closed(&mut self, _: &Connection, _: &QueueHandle<Self>, layer: &LayerSurface) {
        if let Some(monitor) = self.display.monitor_for_surface(layer.wl_surface()) {
            log::info!("{}: bar closed by compositor", monitor.state().name());
        }
        self.display.remove_monitor(layer.wl_surface());
    }

    fn configure(
        &mut self,
        _: &Connection,
        _: &QueueHandle<Self>,
        layer: &LayerSurface,
        configure: LayerSurfaceConfigure,
        _: u32,
    ) {
        let surface = layer.wl_surface();
        let Some(monitor) = self.display.monitor_for_surface(surface) else {
            return;
        };

        let (width, height) = configure.new_size;
        if width == 0 || height == 0 {
            log::warn!(
                "{}: ignoring empty configure {width}x{height}",
                monitor.state().name()
            );
            return;
        }

        monitor.state_mut().configure(width, height);
        log::debug!("{}: configured {width}x{height}", monitor.state().name());
        self.render_surface(surface);
    }
}

impl ShmHandler for Bar {
    fn shm_state(&mut self) -> &mut Shm {
        &mut self.display.shm
    }
}

delegate_compositor!(Bar);
delegate_output!(Bar);
delegate_shm!(Bar);
delegate_layer!(Bar);
delegate_registry!(Bar);

impl ProvidesRegistryState for Bar {
    fn registry(&mut self) -> &mut RegistryState {
        &mut self.display.registry_state
    }
    registry_handlers![OutputState];
}
