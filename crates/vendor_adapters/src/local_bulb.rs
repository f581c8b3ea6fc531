//! Bulbs on the local network driven over the LAN UDP protocol.

use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::atomic::{AtomicU8, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use shared::{
    color::rgb_to_hsv,
    domain::{BrightnessScale, ColorTarget, HueValue, LightState, RgbColor, Saturation, Vendor},
    error::AdapterError,
};
use tokio::{
    net::UdpSocket,
    sync::Mutex,
    time::{timeout_at, Instant},
};
use tracing::debug;

use crate::{
    lan_packet::{self, Addressing, Hsbk, Message, ACKNOWLEDGEMENT, LAN_PORT},
    DeviceAdapter,
};

pub const LAN_BRIGHTNESS: BrightnessScale = BrightnessScale::new(0, u16::MAX);
pub const CYCLE_KELVIN: u16 = 3500;
pub const WHITE_KELVIN: u16 = 4000;
/// Hue reported alongside white; ignored by the bulbs at zero saturation.
pub const WHITE_HUE: u16 = 40000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulbHandle {
    pub addr: SocketAddr,
    pub target: [u8; 6],
}

#[derive(Debug, Clone)]
pub struct LocalBulbConfig {
    pub broadcast_addr: SocketAddr,
    /// Explicit bulbs. Empty means one tagged broadcast reaches every bulb.
    pub bulbs: Vec<BulbHandle>,
    pub kelvin: u16,
    /// Fire-and-forget: no acknowledgement is requested or awaited.
    pub rapid: bool,
    pub ack_timeout: Duration,
    pub transition: Duration,
}

impl Default for LocalBulbConfig {
    fn default() -> Self {
        Self {
            broadcast_addr: SocketAddr::from((Ipv4Addr::BROADCAST, LAN_PORT)),
            bulbs: Vec::new(),
            kelvin: CYCLE_KELVIN,
            rapid: true,
            ack_timeout: Duration::from_millis(500),
            transition: Duration::from_secs(1),
        }
    }
}

pub struct LocalBulbAdapter {
    socket: UdpSocket,
    config: LocalBulbConfig,
    source: u32,
    sequence: AtomicU8,
    /// Last colour sent; partial updates are merged into it.
    last_color: Mutex<Hsbk>,
    io: Mutex<()>,
}

impl LocalBulbAdapter {
    pub async fn bind(config: LocalBulbConfig) -> Result<Self, AdapterError> {
        let socket = UdpSocket::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)))
            .await
            .map_err(|err| AdapterError::unreachable(format!("failed to bind lan socket: {err}")))?;
        socket
            .set_broadcast(true)
            .map_err(|err| AdapterError::unreachable(format!("failed to enable broadcast: {err}")))?;

        let source = std::process::id().max(2);
        let kelvin = config.kelvin;
        Ok(Self {
            socket,
            config,
            source,
            sequence: AtomicU8::new(0),
            last_color: Mutex::new(Hsbk {
                hue: 0,
                saturation: u16::MAX,
                brightness: u16::MAX,
                kelvin,
            }),
            io: Mutex::new(()),
        })
    }

    fn destinations(&self) -> Vec<(SocketAddr, Option<[u8; 6]>)> {
        if self.config.bulbs.is_empty() {
            vec![(self.config.broadcast_addr, None)]
        } else {
            self.config
                .bulbs
                .iter()
                .map(|bulb| (bulb.addr, Some(bulb.target)))
                .collect()
        }
    }

    fn duration_ms(&self) -> u32 {
        self.config.transition.as_millis().min(u128::from(u32::MAX)) as u32
    }

    /// Sends one message to every destination ("set all").
    async fn send_all(&self, message: Message) -> Result<(), AdapterError> {
        let _io = self.io.lock().await;
        for (addr, target) in self.destinations() {
            let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
            let packet = lan_packet::encode(
                &Addressing {
                    source: self.source,
                    target,
                    ack_required: !self.config.rapid,
                    sequence,
                },
                &message,
            );
            self.socket
                .send_to(&packet, addr)
                .await
                .map_err(|err| AdapterError::unreachable(format!("send to {addr} failed: {err}")))?;
            debug!(%addr, sequence, message_type = message.message_type(), "lan: packet sent");

            if !self.config.rapid {
                self.await_ack(sequence).await?;
            }
        }
        Ok(())
    }

    async fn await_ack(&self, sequence: u8) -> Result<(), AdapterError> {
        let deadline = Instant::now() + self.config.ack_timeout;
        let mut buf = [0u8; 128];
        loop {
            let (len, from) = timeout_at(deadline, self.socket.recv_from(&mut buf))
                .await
                .map_err(|_| AdapterError::unreachable(format!("no acknowledgement for {sequence}")))?
                .map_err(|err| AdapterError::unreachable(format!("lan receive failed: {err}")))?;

            let Ok(header) = lan_packet::decode_header(&buf[..len]) else {
                debug!(%from, "lan: ignoring foreign packet");
                continue;
            };
            if header.message_type == ACKNOWLEDGEMENT
                && header.source == self.source
                && header.sequence == sequence
            {
                return Ok(());
            }
        }
    }

    fn merge(&self, mut color: Hsbk, state: &LightState) -> Hsbk {
        if let Some(level) = state.brightness {
            color.brightness = LAN_BRIGHTNESS.clamp(level);
        }
        if let Some(saturation) = state.saturation {
            color.saturation = saturation.to_native(u16::MAX);
        }
        match state.color {
            Some(ColorTarget::Hue(hue)) => {
                color.hue = hue.get();
                color.kelvin = self.config.kelvin;
            }
            Some(ColorTarget::Rgb(rgb)) => {
                let (hue, saturation, value) = rgb_to_hsv(rgb);
                color.hue = hue.get();
                color.saturation = saturation.to_native(u16::MAX);
                if state.brightness.is_none() {
                    color.brightness = LAN_BRIGHTNESS.from_fraction(value);
                }
                color.kelvin = self.config.kelvin;
            }
            Some(ColorTarget::White) => {
                color.hue = WHITE_HUE;
                color.saturation = 0;
                color.kelvin = WHITE_KELVIN;
            }
            None => {}
        }
        color
    }
}

#[async_trait]
impl DeviceAdapter for LocalBulbAdapter {
    fn vendor(&self) -> Vendor {
        Vendor::LocalBulb
    }

    fn name(&self) -> &str {
        "local_bulb"
    }

    fn brightness_scale(&self) -> BrightnessScale {
        LAN_BRIGHTNESS
    }

    fn device_count(&self) -> usize {
        self.config.bulbs.len()
    }

    async fn power_all(&self, on: bool) -> Result<(), AdapterError> {
        let level = if on { u16::MAX } else { 0 };
        let message = match self.duration_ms() {
            0 => Message::SetPower { level },
            duration_ms => Message::LightSetPower { level, duration_ms },
        };
        self.send_all(message).await
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

    /// One power packet if requested, then one merged `SetColor`.
    ///
    /// The stored colour stays locked until the packet is out, so concurrent
    /// partial updates merge in order.
    async fn apply_all(&self, state: &LightState) -> Result<(), AdapterError> {
        if let Some(on) = state.power {
            self.power_all(on).await?;
        }
        if state.brightness.is_none() && state.saturation.is_none() && state.color.is_none() {
            return Ok(());
        }

        let mut last_color = self.last_color.lock().await;
        let color = self.merge(*last_color, state);
        self.send_all(Message::SetColor {
            color,
            duration_ms: self.duration_ms(),
        })
        .await?;
        *last_color = color;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/local_bulb_tests.rs"]
mod tests;
