//! Devices reachable only through the vendor's cloud REST API.

use std::{
    sync::Mutex,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use shared::{
    color::hsv_to_rgb,
    domain::{BrightnessScale, HueValue, RgbColor, Saturation, Vendor},
    error::AdapterError,
};
use tracing::{debug, warn};
use url::Url;

use crate::{
    budget::RequestBudget,
    http::{build_client, check_status, transport_error},
    DeviceAdapter,
};

pub const API_KEY_HEADER: &str = "Govee-API-KEY";
pub const DEFAULT_BASE_URL: &str = "https://developer-api.govee.com";
pub const CLOUD_BRIGHTNESS: BrightnessScale = BrightnessScale::new(0, 100);
pub const DEFAULT_REQUESTS_PER_MINUTE: usize = 100;
const SUCCESS_CODE: i64 = 200;

#[derive(Debug, Clone)]
pub struct CloudConfig {
    pub api_key: String,
    pub base_url: Url,
    pub requests_per_minute: usize,
    pub request_timeout: Duration,
}

impl CloudConfig {
    pub fn new(api_key: impl Into<String>, base_url: Url) -> Self {
        Self {
            api_key: api_key.into(),
            base_url,
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
            request_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudDevice {
    pub device: String,
    pub model: String,
}

/// `{code, message, data}` wrapper around every cloud reply.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct DeviceList {
    #[serde(default)]
    devices: Vec<CloudDevice>,
}

#[derive(Debug, Serialize)]
struct ControlRequest<'a> {
    device: &'a str,
    model: &'a str,
    cmd: Command,
}

#[derive(Debug, Clone, Serialize)]
struct Command {
    name: &'static str,
    value: Value,
}

impl Command {
    fn turn(on: bool) -> Self {
        Self {
            name: "turn",
            value: json!(if on { "on" } else { "off" }),
        }
    }

    fn brightness(level: u16) -> Self {
        Self {
            name: "brightness",
            value: json!(CLOUD_BRIGHTNESS.clamp(level)),
        }
    }

    fn color(color: RgbColor) -> Self {
        Self {
            name: "color",
            value: json!({"r": color.r, "g": color.g, "b": color.b}),
        }
    }
}

pub struct CloudApiAdapter {
    http: Client,
    base_url: Url,
    api_key: String,
    devices: Vec<CloudDevice>,
    budget: Mutex<RequestBudget>,
}

impl CloudApiAdapter {
    /// Enumerates the account's devices once.
    pub async fn connect(config: CloudConfig) -> Result<Self, AdapterError> {
        let mut adapter = Self::with_devices(config, Vec::new())?;
        let url = adapter.endpoint("v1/devices")?;
        let response = adapter
            .http
            .get(url)
            .header(API_KEY_HEADER, &adapter.api_key)
            .send()
            .await
            .map_err(transport_error)?;
        let list: DeviceList = read_envelope(response)
            .await?
            .ok_or_else(|| AdapterError::invalid_response("device list missing data"))?;
        adapter.devices = list.devices;
        debug!(devices = adapter.devices.len(), "cloud: devices enumerated");
        Ok(adapter)
    }

    pub fn with_devices(config: CloudConfig, devices: Vec<CloudDevice>) -> Result<Self, AdapterError> {
        Ok(Self {
            http: build_client(config.request_timeout)?,
            base_url: config.base_url,
            api_key: config.api_key,
            devices,
            budget: Mutex::new(RequestBudget::per_minute(config.requests_per_minute)),
        })
    }

    pub fn devices(&self) -> &[CloudDevice] {
        &self.devices
    }

    fn endpoint(&self, path: &str) -> Result<Url, AdapterError> {
        self.base_url
            .join(path)
            .map_err(|err| AdapterError::unreachable(format!("invalid cloud path {path}: {err}")))
    }

    fn reserve(&self) -> Result<(), AdapterError> {
        let mut budget = self
            .budget
            .lock()
            .map_err(|_| AdapterError::rate_limited("request budget poisoned"))?;
        if budget.try_acquire(Instant::now()) {
            Ok(())
        } else {
            Err(AdapterError::rate_limited("local request budget exhausted"))
        }
    }

    async fn send_command(&self, device: &CloudDevice, cmd: Command) -> Result<(), AdapterError> {
        self.reserve()?;
        let url = self.endpoint("v1/devices/control")?;
        let response = self
            .http
            .put(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&ControlRequest {
                device: &device.device,
                model: &device.model,
                cmd,
            })
            .send()
            .await
            .map_err(transport_error)?;
        read_envelope::<Value>(response).await.map(drop)
    }

    /// Sends `cmd` to every device. Rate limiting stops the loop early.
    async fn send_all(&self, cmd: Command) -> Result<(), AdapterError> {
        let mut first_error = None;
        for device in &self.devices {
            match self.send_command(device, cmd.clone()).await {
                Ok(()) => {}
                Err(err @ AdapterError::RateLimited(_)) => return Err(err),
                Err(err) => {
                    warn!(device = %device.device, error = %err, "cloud: command failed");
                    first_error.get_or_insert(err);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

async fn read_envelope<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<Option<T>, AdapterError> {
    check_status(response.status())?;
    let envelope: Envelope<T> = response.json().await.map_err(transport_error)?;
    if envelope.code != SUCCESS_CODE {
        return Err(AdapterError::invalid_response(format!(
            "vendor code {}: {}",
            envelope.code, envelope.message
        )));
    }
    Ok(envelope.data)
}

#[async_trait]
impl DeviceAdapter for CloudApiAdapter {
    fn vendor(&self) -> Vendor {
        Vendor::Cloud
    }

    fn name(&self) -> &str {
        "cloud"
    }

    fn brightness_scale(&self) -> BrightnessScale {
        CLOUD_BRIGHTNESS
    }

    fn device_count(&self) -> usize {
        self.devices.len()
    }

    async fn power_all(&self, on: bool) -> Result<(), AdapterError> {
        self.send_all(Command::turn(on)).await
    }

    async fn set_brightness_all(&self, level: u16) -> Result<(), AdapterError> {
        self.send_all(Command::brightness(level)).await
    }

    async fn set_saturation_all(&self, saturation: Saturation) -> Result<(), AdapterError> {
        debug!(
            saturation = saturation.fraction(),
            "cloud: saturation has no native command, ignored"
        );
        Ok(())
    }

    async fn set_hue_all(&self, hue: HueValue) -> Result<(), AdapterError> {
        self.set_color_all(hsv_to_rgb(hue)).await
    }

    async fn set_color_all(&self, color: RgbColor) -> Result<(), AdapterError> {
        self.send_all(Command::color(color)).await
    }
}

#[cfg(test)]
#[path = "tests/cloud_tests.rs"]
mod tests;
