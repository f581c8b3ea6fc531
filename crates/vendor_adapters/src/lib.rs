//! Vendor adapters behind one device-control contract.

use async_trait::async_trait;
use shared::{
    domain::{BrightnessScale, ColorTarget, HueValue, LightState, RgbColor, Saturation, Vendor},
    error::AdapterError,
};

pub mod bridge;
pub mod budget;
pub mod cloud;
mod http;
pub mod lan_packet;
pub mod local_bulb;

pub use bridge::{BridgeConfig, BridgeLampAdapter, LampHandle};
pub use budget::RequestBudget;
pub use cloud::{CloudApiAdapter, CloudConfig, CloudDevice};
pub use local_bulb::{BulbHandle, LocalBulbAdapter, LocalBulbConfig};

/// Uniform capability set over one vendor's devices.
///
/// Every operation targets all devices the adapter owns. Brightness levels are
/// native to the vendor and clamped to [`DeviceAdapter::brightness_scale`]
/// before transmission.
#[async_trait]
pub trait DeviceAdapter: Send + Sync {
    fn vendor(&self) -> Vendor;
    fn name(&self) -> &str;
    fn brightness_scale(&self) -> BrightnessScale;
    /// Devices addressed individually. Zero when every write is a broadcast
    /// to however many devices are listening.
    fn device_count(&self) -> usize;

    async fn power_all(&self, on: bool) -> Result<(), AdapterError>;
    async fn set_brightness_all(&self, level: u16) -> Result<(), AdapterError>;
    async fn set_saturation_all(&self, saturation: Saturation) -> Result<(), AdapterError>;
    async fn set_hue_all(&self, hue: HueValue) -> Result<(), AdapterError>;
    async fn set_color_all(&self, color: RgbColor) -> Result<(), AdapterError>;

    /// Applies every populated field of `state`.
    ///
    /// The default issues power, brightness, saturation and colour primitives
    /// in that order and stops at the first failure.
    async fn apply_all(&self, state: &LightState) -> Result<(), AdapterError> {
        if let Some(on) = state.power {
            self.power_all(on).await?;
        }
        if let Some(level) = state.brightness {
            self.set_brightness_all(level).await?;
        }
        if let Some(saturation) = state.saturation {
            self.set_saturation_all(saturation).await?;
        }
        match state.color {
            Some(ColorTarget::Hue(hue)) => self.set_hue_all(hue).await?,
            Some(ColorTarget::Rgb(color)) => self.set_color_all(color).await?,
            Some(ColorTarget::White) => self.set_color_all(RgbColor::WHITE).await?,
            None => {}
        }
        Ok(())
    }
}
