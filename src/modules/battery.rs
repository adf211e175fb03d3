use std::sync::Mutex;

use anyhow::Context;
use zbus::{blocking::Connection, proxy};

use super::{Module, ModuleContext};
use crate::{content::ContentModel, field::Field};

#[proxy(
    interface = "org.freedesktop.UPower.Device",
    default_service = "org.freedesktop.UPower",
    default_path = "/org/freedesktop/UPower/devices/DisplayDevice"
)]
trait Device {
    #[zbus(property)]
    fn percentage(&self) -> zbus::Result<f64>;
}

/// Charge of the UPower display device, tracked through property change signals.
pub struct Battery {
    connection: Connection,
    percentage: Mutex<f64>,
}

impl Battery {
    /// Connects to the system bus and reads the current charge.
    pub fn connect() -> anyhow::Result<Self> {
        let connection = Connection::system().context("failed to connect to the system bus")?;
        let percentage = DeviceProxyBlocking::new(&connection)?
            .percentage()
            .context("failed to read Percentage")?;
        log::debug!("battery at {percentage}%");

        Ok(Self {
            connection,
            percentage: Mutex::new(percentage),
        })
    }

    pub fn format(percentage: f64) -> String {
        // Truncated
        format!("BAT {}%", percentage.clamp(0.0, 100.0) as u32)
    }

    fn set(&self, percentage: f64) {
        *self
            .percentage
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = percentage;
    }
}

impl Module for Battery {
    fn name(&self) -> &'static str {
        "battery"
    }

    fn publish(&self, model: &ContentModel) {
        let percentage = *self
            .percentage
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        model.publish(Field::Battery, Self::format(percentage));
    }

    fn run(self: Box<Self>, ctx: ModuleContext) -> anyhow::Result<()> {
        let proxy = DeviceProxyBlocking::new(&self.connection)?;
        let changes = proxy.receive_percentage_changed();

        // Closing the connection ends the signal stream below
        let connection = self.connection.clone();
        ctx.cancel.on_cancel(move || {
            if let Err(err) = connection.close() {
                log::debug!("closing system bus connection: {err}");
            }
        });

        for change in changes {
            if ctx.cancel.is_cancelled() {
                break;
            }
            match change.get() {
                Ok(percentage) => {
                    log::debug!("battery now at {percentage}%");
                    self.set(percentage);
                    ctx.publish(&*self);
                }
                Err(err) => log::warn!("ignoring unreadable Percentage change: {err}"),
            }
        }

        if ctx.cancel.is_cancelled() {
            Ok(())
        } else {
            anyhow::bail!("UPower signal stream ended")
        }
    }
}
