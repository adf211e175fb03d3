use std::sync::Arc;

use wayland_client::protocol::wl_surface::WlSurface;

use crate::{
    content::ContentModel,
    layout::Painter,
    pool::PoolError,
    text::CosmicShaper,
    wayland::Display,
};

/// Coalesces redraw requests: any number of them between two passes yields one render.
#[derive(Debug, Default)]
pub struct RefreshFlag(bool);

impl RefreshFlag {
    pub fn request(&mut self) {
        self.0 = true;
    }

    /// Clears the flag and returns whether it was set.
    pub fn take(&mut self) -> bool {
        std::mem::take(&mut self.0)
    }
}

/// Dispatch-thread state: the display, the painter and the shared content.
pub struct Bar {
    pub display: Display,
    painter: Painter<CosmicShaper>,
    model: Arc<ContentModel>,
    refresh: RefreshFlag,
    error: Option<PoolError>,
}

impl Bar {
    pub fn new(display: Display, painter: Painter<CosmicShaper>, model: Arc<ContentModel>) -> Self {
        Self {
            display,
            painter,
            model,
            refresh: RefreshFlag::default(),
            error: None,
        }
    }

    pub fn model(&self) -> &ContentModel {
        &self.model
    }

    pub fn request_refresh(&mut self) {
        self.refresh.request();
    }

    /// Clears and returns the pending refresh flag.
    pub fn take_refresh(&mut self) -> bool {
        self.refresh.take()
    }

    /// A render failure from inside an event handler, if one happened.
    pub fn take_error(&mut self) -> Option<PoolError> {
        self.error.take()
    }

    /// Redraws every monitor that has a size.
    pub fn render_all(&mut self) -> Result<(), PoolError> {
        let status = self.model.status();
        log::trace!("rendering {status:?}");

        for monitor in &mut self.display.monitors {
            if monitor.can_render() {
                monitor.render(&self.display.shm, &mut self.painter, &status)?;
            }
        }
        Ok(())
    }

    /// Redraws the monitor owning `surface`. Failures are kept for the dispatch loop.
    pub fn render_surface(&mut self, surface: &WlSurface) {
        let status = self.model.status();
        let Some(monitor) = self
            .display
            .monitors
            .iter_mut()
            .find(|monitor| monitor.wl_surface() == surface)
        else {
            return;
        };

        if monitor.can_render()
            && let Err(err) = monitor.render(&self.display.shm, &mut self.painter, &status)
        {
            self.error.get_or_insert(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_requests_collapse_into_one_pass() {
        let mut refresh = RefreshFlag::default();
        assert!(!refresh.take());

        refresh.request();
        refresh.request();
        refresh.request();
        assert!(refresh.take());
        assert!(!refresh.take());
    }
}
