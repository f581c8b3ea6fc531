use std::{
    fs,
    net::SocketAddr,
    path::Path,
    time::Duration,
};

use anyhow::{bail, Context};
use serde::Deserialize;
use shared::domain::HueValue;
use sync_core::{ControllerSettings, HueProgression};
use url::Url;
use vendor_adapters::{
    cloud::DEFAULT_BASE_URL, lan_packet::parse_mac, BridgeConfig, BulbHandle, CloudConfig,
    LocalBulbConfig,
};

pub const DEFAULT_CONFIG_PATH: &str = "lightctl.toml";
const ENV_PREFIX: &str = "LIGHTSYNC__";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub cycle: CycleSection,
    pub bridge: Option<BridgeSection>,
    pub local_bulb: Option<LocalBulbSection>,
    pub cloud: Option<CloudSection>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleMode {
    #[default]
    Continuous,
    Alternating,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CycleSection {
    pub cycle_time_secs: f64,
    pub transition_ms: u64,
    pub call_timeout_ms: u64,
    pub jitter: bool,
    pub max_jitter: f32,
    pub mode: CycleMode,
    pub alternate_hues: [u16; 2],
    pub alternate_every_ticks: u64,
}

impl Default for CycleSection {
    fn default() -> Self {
        Self {
            cycle_time_secs: 15.0,
            transition_ms: 1000,
            call_timeout_ms: 3000,
            jitter: false,
            max_jitter: sync_core::controller::DEFAULT_MAX_JITTER,
            mode: CycleMode::Continuous,
            // blue, then magenta
            alternate_hues: [39_780, 56_227],
            alternate_every_ticks: 60,
        }
    }
}

impl CycleSection {
    pub fn transition(&self) -> Duration {
        Duration::from_millis(self.transition_ms)
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        let progression = match self.mode {
            CycleMode::Continuous => HueProgression::continuous(self.cycle_time_secs),
            CycleMode::Alternating => HueProgression::alternating(
                HueValue::new(self.alternate_hues[0]),
                HueValue::new(self.alternate_hues[1]),
                self.alternate_every_ticks,
            ),
        };
        ControllerSettings {
            progression,
            transition: self.transition(),
            call_timeout: Duration::from_millis(self.call_timeout_ms),
            max_jitter: self.max_jitter.clamp(0.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct BridgeSection {
    pub ip: String,
    pub username: String,
    /// Overrides the cycle transition for bridge fades.
    pub transition_ms: Option<u64>,
}

impl BridgeSection {
    pub fn to_config(&self, cycle: &CycleSection) -> anyhow::Result<BridgeConfig> {
        if self.ip.trim().is_empty() {
            bail!("[bridge] needs an ip (or LIGHTSYNC__BRIDGE__IP)");
        }
        if self.username.trim().is_empty() {
            bail!("[bridge] needs a username (or LIGHTSYNC__BRIDGE__USERNAME)");
        }
        let mut config = BridgeConfig::new(self.ip.trim(), self.username.trim());
        config.transition = self
            .transition_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| cycle.transition());
        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BulbEntry {
    pub addr: SocketAddr,
    /// MAC-style device id, `d0:73:d5:01:02:03`.
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LocalBulbSection {
    pub broadcast_addr: SocketAddr,
    pub bulbs: Vec<BulbEntry>,
    pub kelvin: u16,
    pub rapid: bool,
    pub ack_timeout_ms: u64,
}

impl Default for LocalBulbSection {
    fn default() -> Self {
        let defaults = LocalBulbConfig::default();
        Self {
            broadcast_addr: defaults.broadcast_addr,
            bulbs: Vec::new(),
            kelvin: defaults.kelvin,
            rapid: defaults.rapid,
            ack_timeout_ms: defaults.ack_timeout.as_millis() as u64,
        }
    }
}

impl LocalBulbSection {
    pub fn to_config(&self, cycle: &CycleSection) -> anyhow::Result<LocalBulbConfig> {
        let bulbs = self
            .bulbs
            .iter()
            .map(|entry| {
                let target = parse_mac(&entry.target)
                    .with_context(|| format!("bulb {} has a malformed target '{}'", entry.addr, entry.target))?;
                Ok(BulbHandle {
                    addr: entry.addr,
                    target,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(LocalBulbConfig {
            broadcast_addr: self.broadcast_addr,
            bulbs,
            kelvin: self.kelvin,
            rapid: self.rapid,
            ack_timeout: Duration::from_millis(self.ack_timeout_ms),
            transition: cycle.transition(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CloudSection {
    pub api_key: String,
    pub base_url: String,
    pub push_every_ticks: u64,
    pub requests_per_minute: usize,
}

impl Default for CloudSection {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.into(),
            push_every_ticks: 2,
            requests_per_minute: vendor_adapters::cloud::DEFAULT_REQUESTS_PER_MINUTE,
        }
    }
}

impl CloudSection {
    pub fn to_config(&self) -> anyhow::Result<CloudConfig> {
        if self.api_key.trim().is_empty() {
            bail!("[cloud] needs an api_key (or LIGHTSYNC__CLOUD__API_KEY)");
        }
        let base_url = Url::parse(&self.base_url)
            .with_context(|| format!("invalid cloud base_url '{}'", self.base_url))?;
        let mut config = CloudConfig::new(self.api_key.trim(), base_url);
        config.requests_per_minute = self.requests_per_minute.max(1);
        Ok(config)
    }
}

/// Reads the settings file and applies environment overrides.
///
/// A missing file is only an error when the path was given explicitly.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let explicit = path.is_some();
    let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));

    let mut settings = match fs::read_to_string(path) {
        Ok(raw) => parse_settings(&raw)
            .with_context(|| format!("failed to parse config '{}'", path.display()))?,
        Err(err) if !explicit && err.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "no config file, using defaults");
            Settings::default()
        }
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read config '{}'", path.display()))
        }
    };

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok())?;
    Ok(settings)
}

pub fn parse_settings(raw: &str) -> anyhow::Result<Settings> {
    Ok(toml::from_str(raw)?)
}

/// Applies `LIGHTSYNC__SECTION__KEY` overrides. Credentials given only via
/// the environment are enough to enable that vendor.
pub fn apply_env_overrides(
    settings: &mut Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    let var = |key: &str| lookup(&format!("{ENV_PREFIX}{key}"));

    if let Some(v) = var("BRIDGE__IP") {
        settings.bridge.get_or_insert_with(BridgeSection::default).ip = v;
    }
    if let Some(v) = var("BRIDGE__USERNAME") {
        settings.bridge.get_or_insert_with(BridgeSection::default).username = v;
    }
    if let Some(v) = var("CLOUD__API_KEY") {
        settings.cloud.get_or_insert_with(CloudSection::default).api_key = v;
    }
    if let Some(v) = var("CYCLE__CYCLE_TIME_SECS") {
        settings.cycle.cycle_time_secs = v
            .trim()
            .parse()
            .with_context(|| format!("{ENV_PREFIX}CYCLE__CYCLE_TIME_SECS is not a number: '{v}'"))?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
