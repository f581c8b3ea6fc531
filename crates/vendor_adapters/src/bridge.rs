//! Lamps behind a local bridge speaking the Hue-style REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::{
    color::rgb_to_hsv,
    domain::{BrightnessScale, ColorTarget, HueValue, LightState, RgbColor, Saturation, Vendor},
    error::AdapterError,
};
use tracing::{debug, warn};
use url::Url;

use crate::{
    http::{build_client, check_status, transport_error},
    DeviceAdapter,
};

pub const BRIDGE_BRIGHTNESS: BrightnessScale = BrightnessScale::new(1, 254);
pub const BRIDGE_MAX_SATURATION: u16 = 254;
/// Bridge error type reported for unknown or unlinked usernames.
const UNAUTHORIZED_USER: i64 = 1;

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Bridge host (`192.168.1.2`) or full base url (`http://host:port`).
    pub ip: String,
    pub username: String,
    pub transition: Duration,
    pub request_timeout: Duration,
}

impl BridgeConfig {
    pub fn new(ip: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            username: username.into(),
            transition: Duration::from_secs(1),
            request_timeout: Duration::from_secs(3),
        }
    }

    fn api_base(&self) -> Result<Url, AdapterError> {
        let root = if self.ip.starts_with("http://") || self.ip.starts_with("https://") {
            self.ip.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", self.ip)
        };
        Url::parse(&format!("{root}/api/{}/", self.username)).map_err(|err| {
            AdapterError::unreachable(format!("invalid bridge address '{}': {err}", self.ip))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LampHandle {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct LampSummary {
    #[serde(default)]
    name: String,
}

/// Body of `PUT lights/{id}/state`. Unset fields are omitted on the wire.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
struct LampStateBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    on: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bri: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sat: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hue: Option<u16>,
    /// Deciseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    transitiontime: Option<u16>,
}

pub struct BridgeLampAdapter {
    http: Client,
    api_base: Url,
    lamps: Vec<LampHandle>,
    transition: Duration,
}

impl BridgeLampAdapter {
    /// Opens a session against the bridge and enumerates its lamps once.
    pub async fn connect(config: BridgeConfig) -> Result<Self, AdapterError> {
        let mut adapter = Self::with_lamps(config, Vec::new())?;
        adapter.lamps = adapter.fetch_lamps().await?;
        debug!(lamps = adapter.lamps.len(), "bridge: lamps enumerated");
        Ok(adapter)
    }

    /// Builds an adapter over an already known set of lamps.
    pub fn with_lamps(config: BridgeConfig, lamps: Vec<LampHandle>) -> Result<Self, AdapterError> {
        Ok(Self {
            http: build_client(config.request_timeout)?,
            api_base: config.api_base()?,
            lamps,
            transition: config.transition,
        })
    }

    pub fn lamps(&self) -> &[LampHandle] {
        &self.lamps
    }

    async fn fetch_lamps(&self) -> Result<Vec<LampHandle>, AdapterError> {
        let url = self.endpoint("lights")?;
        let response = self.http.get(url).send().await.map_err(transport_error)?;
        check_status(response.status())?;
        let body: Value = response.json().await.map_err(transport_error)?;

        if body.is_array() {
            parse_reply(&body)?;
            return Err(AdapterError::invalid_response(
                "bridge returned a reply list instead of lamps",
            ));
        }

        let lamps: std::collections::BTreeMap<String, LampSummary> = serde_json::from_value(body)
            .map_err(|err| AdapterError::invalid_response(format!("malformed lamp list: {err}")))?;
        Ok(lamps
            .into_iter()
            .map(|(id, summary)| LampHandle {
                id,
                name: summary.name,
            })
            .collect())
    }

    fn endpoint(&self, path: &str) -> Result<Url, AdapterError> {
        self.api_base
            .join(path)
            .map_err(|err| AdapterError::unreachable(format!("invalid bridge path {path}: {err}")))
    }

    async fn put_state(&self, lamp: &LampHandle, body: &LampStateBody) -> Result<(), AdapterError> {
        let url = self.endpoint(&format!("lights/{}/state", lamp.id))?;
        let response = self
            .http
            .put(url)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        check_status(response.status())?;
        let reply: Value = response.json().await.map_err(transport_error)?;
        parse_reply(&reply)
    }

    /// Writes the same state to every lamp, one request per lamp.
    ///
    /// A failing lamp does not stop the loop; the first failure is returned
    /// once every lamp has been tried.
    async fn put_all(&self, body: LampStateBody) -> Result<(), AdapterError> {
        let mut first_error = None;
        for lamp in &self.lamps {
            if let Err(err) = self.put_state(lamp, &body).await {
                warn!(lamp = %lamp.id, error = %err, "bridge: lamp update failed");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn transition_deciseconds(&self) -> u16 {
        (self.transition.as_millis() / 100).min(u128::from(u16::MAX)) as u16
    }

    fn body_for(&self, state: &LightState) -> LampStateBody {
        let mut body = LampStateBody {
            on: state.power,
            bri: state.brightness.map(|level| BRIDGE_BRIGHTNESS.clamp(level)),
            sat: state
                .saturation
                .map(|saturation| saturation.to_native(BRIDGE_MAX_SATURATION)),
            hue: None,
            transitiontime: Some(self.transition_deciseconds()),
        };

        match state.color {
            Some(ColorTarget::Hue(hue)) => body.hue = Some(hue.get()),
            Some(ColorTarget::Rgb(color)) => {
                let (hue, saturation, _value) = rgb_to_hsv(color);
                body.hue = Some(hue.get());
                body.sat = Some(saturation.to_native(BRIDGE_MAX_SATURATION));
            }
            Some(ColorTarget::White) => body.sat = Some(0),
            None => {}
        }
        body
    }
}

/// Interprets the bridge's `[{"success":..}|{"error":..}]` reply list.
fn parse_reply(reply: &Value) -> Result<(), AdapterError> {
    let Some(entries) = reply.as_array() else {
        return Err(AdapterError::invalid_response("bridge reply is not a list"));
    };

    for entry in entries {
        if let Some(error) = entry.get("error") {
            let kind = error.get("type").and_then(Value::as_i64).unwrap_or_default();
            let description = error
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("unknown bridge error");
            return Err(if kind == UNAUTHORIZED_USER {
                AdapterError::unauthorized(description)
            } else {
                AdapterError::invalid_response(format!("bridge error {kind}: {description}"))
            });
        }
    }
    Ok(())
}

#[async_trait]
impl DeviceAdapter for BridgeLampAdapter {
    fn vendor(&self) -> Vendor {
        Vendor::Bridge
    }

    fn name(&self) -> &str {
        "bridge"
    }

    fn brightness_scale(&self) -> BrightnessScale {
        BRIDGE_BRIGHTNESS
    }

    fn device_count(&self) -> usize {
        self.lamps.len()
    }

    async fn power_all(&self, on: bool) -> Result<(), AdapterError> {
        self.apply_all(&LightState::new().with_power(on)).await
    }

    async fn set_brightness_all(&self, level: u16) -> Result<(), AdapterError> {
        self.apply_all(&LightState::new().with_brightness(level))
            .await
    }

    async fn set_saturation_all(&self, saturation: Saturation) -> Result<(), AdapterError> {
        self.apply_all(&LightState::new().with_saturation(saturation))
            .await
    }

    async fn set_hue_all(&self, hue: HueValue) -> Result<(), AdapterError> {
        self.apply_all(&LightState::new().with_color(ColorTarget::Hue(hue)))
            .await
    }

    async fn set_color_all(&self, color: RgbColor) -> Result<(), AdapterError> {
        self.apply_all(&LightState::new().with_color(ColorTarget::Rgb(color)))
            .await
    }

    async fn apply_all(&self, state: &LightState) -> Result<(), AdapterError> {
        if state.is_empty() {
            return Ok(());
        }
        self.put_all(self.body_for(state)).await
    }
}

#[cfg(test)]
#[path = "tests/bridge_tests.rs"]
mod tests;
