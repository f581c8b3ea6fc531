//! Binary codec for the LIFX-style LAN protocol.
//!
//! Every packet is a 36-byte little-endian header followed by a
//! message-specific payload.

use shared::error::AdapterError;

pub const LAN_PORT: u16 = 56700;
pub const HEADER_LEN: usize = 36;

const PROTOCOL: u16 = 1024;
const ADDRESSABLE: u16 = 1 << 12;
const TAGGED: u16 = 1 << 13;
const RES_REQUIRED: u8 = 1 << 0;
const ACK_REQUIRED: u8 = 1 << 1;

pub const SET_POWER: u16 = 21;
pub const ACKNOWLEDGEMENT: u16 = 45;
pub const SET_COLOR: u16 = 102;
pub const LIGHT_SET_POWER: u16 = 117;

/// Hue, saturation, brightness and kelvin, all on the protocol's native scales.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hsbk {
    pub hue: u16,
    pub saturation: u16,
    pub brightness: u16,
    pub kelvin: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    SetPower { level: u16 },
    LightSetPower { level: u16, duration_ms: u32 },
    SetColor { color: Hsbk, duration_ms: u32 },
    Acknowledgement,
}

impl Message {
    pub fn message_type(&self) -> u16 {
        match self {
            Self::SetPower { .. } => SET_POWER,
            Self::LightSetPower { .. } => LIGHT_SET_POWER,
            Self::SetColor { .. } => SET_COLOR,
            Self::Acknowledgement => ACKNOWLEDGEMENT,
        }
    }

    fn write_payload(&self, out: &mut Vec<u8>) {
        match self {
            Self::SetPower { level } => out.extend_from_slice(&level.to_le_bytes()),
            Self::LightSetPower { level, duration_ms } => {
                out.extend_from_slice(&level.to_le_bytes());
                out.extend_from_slice(&duration_ms.to_le_bytes());
            }
            Self::SetColor { color, duration_ms } => {
                out.push(0);
                for field in [color.hue, color.saturation, color.brightness, color.kelvin] {
                    out.extend_from_slice(&field.to_le_bytes());
                }
                out.extend_from_slice(&duration_ms.to_le_bytes());
            }
            Self::Acknowledgement => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub size: u16,
    pub tagged: bool,
    pub source: u32,
    /// Device MAC; all zeroes together with `tagged` addresses every bulb.
    pub target: [u8; 6],
    pub ack_required: bool,
    pub res_required: bool,
    pub sequence: u8,
    pub message_type: u16,
}

/// Frame addressing for one outgoing packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Addressing {
    pub source: u32,
    pub target: Option<[u8; 6]>,
    pub ack_required: bool,
    pub sequence: u8,
}

pub fn encode(addressing: &Addressing, message: &Message) -> Vec<u8> {
    let mut payload = Vec::with_capacity(16);
    message.write_payload(&mut payload);
    let size = (HEADER_LEN + payload.len()) as u16;

    let mut out = Vec::with_capacity(usize::from(size));
    out.extend_from_slice(&size.to_le_bytes());
    let mut protocol = PROTOCOL | ADDRESSABLE;
    if addressing.target.is_none() {
        protocol |= TAGGED;
    }
    out.extend_from_slice(&protocol.to_le_bytes());
    out.extend_from_slice(&addressing.source.to_le_bytes());

    out.extend_from_slice(&addressing.target.unwrap_or_default());
    out.extend_from_slice(&[0; 2]);
    out.extend_from_slice(&[0; 6]);
    out.push(if addressing.ack_required { ACK_REQUIRED } else { 0 });
    out.push(addressing.sequence);

    out.extend_from_slice(&[0; 8]);
    out.extend_from_slice(&message.message_type().to_le_bytes());
    out.extend_from_slice(&[0; 2]);

    out.extend_from_slice(&payload);
    out
}

pub fn decode_header(bytes: &[u8]) -> Result<Header, AdapterError> {
    if bytes.len() < HEADER_LEN {
        return Err(AdapterError::invalid_response(format!(
            "lan packet too short: {} bytes",
            bytes.len()
        )));
    }

    let u16_at = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]);
    let protocol = u16_at(2);
    if protocol & 0x0fff != PROTOCOL {
        return Err(AdapterError::invalid_response(format!(
            "unsupported lan protocol {}",
            protocol & 0x0fff
        )));
    }

    let mut target = [0; 6];
    target.copy_from_slice(&bytes[8..14]);
    let flags = bytes[22];

    Ok(Header {
        size: u16_at(0),
        tagged: protocol & TAGGED != 0,
        source: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        target,
        ack_required: flags & ACK_REQUIRED != 0,
        res_required: flags & RES_REQUIRED != 0,
        sequence: bytes[23],
        message_type: u16_at(32),
    })
}

/// Parses `d0:73:d5:01:02:03` style device addresses.
pub fn parse_mac(raw: &str) -> Option<[u8; 6]> {
    let mut out = [0; 6];
    let mut parts = raw.trim().split([':', '-']);
    for byte in &mut out {
        *byte = u8::from_str_radix(parts.next()?, 16).ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(out)
}

#[cfg(test)]
#[path = "tests/lan_packet_tests.rs"]
mod tests;
