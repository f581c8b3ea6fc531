use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use shared::{
    domain::{BrightnessScale, HueValue, RgbColor, Saturation, Vendor},
    error::AdapterError,
};
use vendor_adapters::DeviceAdapter;

#[derive(Debug, Default, Clone)]
pub(crate) struct Calls {
    pub(crate) power: Vec<bool>,
    pub(crate) brightness: Vec<u16>,
    pub(crate) saturation: Vec<Saturation>,
    pub(crate) hues: Vec<HueValue>,
    pub(crate) colors: Vec<RgbColor>,
}

/// Adapter that records every primitive call and can be told to fail or stall.
pub(crate) struct RecordingAdapter {
    vendor: Vendor,
    name: String,
    scale: BrightnessScale,
    calls: Arc<Mutex<Calls>>,
    fail_with: Option<AdapterError>,
    stall: Option<Duration>,
}

impl RecordingAdapter {
    pub(crate) fn new(vendor: Vendor, max_brightness: u16) -> Self {
        Self {
            vendor,
            name: vendor.to_string(),
            scale: BrightnessScale::new(0, max_brightness),
            calls: Arc::new(Mutex::new(Calls::default())),
            fail_with: None,
            stall: None,
        }
    }

    pub(crate) fn failing(mut self, error: AdapterError) -> Self {
        self.fail_with = Some(error);
        self
    }

    pub(crate) fn stalling(mut self, stall: Duration) -> Self {
        self.stall = Some(stall);
        self
    }

    pub(crate) fn calls(&self) -> Arc<Mutex<Calls>> {
        self.calls.clone()
    }

    async fn record(&self, apply: impl FnOnce(&mut Calls)) -> Result<(), AdapterError> {
        if let Some(stall) = self.stall {
            tokio::time::sleep(stall).await;
        }
        apply(&mut self.calls.lock().expect("calls lock"));
        match &self.fail_with {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

pub(crate) fn snapshot(calls: &Arc<Mutex<Calls>>) -> Calls {
    calls.lock().expect("calls lock").clone()
}

#[async_trait]
impl DeviceAdapter for RecordingAdapter {
    fn vendor(&self) -> Vendor {
        self.vendor
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn brightness_scale(&self) -> BrightnessScale {
        self.scale
    }

    fn device_count(&self) -> usize {
        1
    }

    async fn power_all(&self, on: bool) -> Result<(), AdapterError> {
        self.record(|calls| calls.power.push(on)).await
    }

    async fn set_brightness_all(&self, level: u16) -> Result<(), AdapterError> {
        let level = self.scale.clamp(level);
        self.record(|calls| calls.brightness.push(level)).await
    }

    async fn set_saturation_all(&self, saturation: Saturation) -> Result<(), AdapterError> {
        self.record(|calls| calls.saturation.push(saturation)).await
    }

    async fn set_hue_all(&self, hue: HueValue) -> Result<(), AdapterError> {
        self.record(|calls| calls.hues.push(hue)).await
    }

    async fn set_color_all(&self, color: RgbColor) -> Result<(), AdapterError> {
        self.record(|calls| calls.colors.push(color)).await
    }
}
