//! iBeacon advertisement frames
//!
//! The beacon is broadcast as Apple iBeacon manufacturer data: a type/length
//! prefix, the proximity UUID, major and minor (big-endian) and the
//! calibrated tx power. Receivers identify the frame by company id 0x004C.

use uuid::Uuid;

use crate::session::BeaconParams;

/// Bluetooth SIG company identifier for Apple, Inc.
pub const APPLE_COMPANY_ID: u16 = 0x004C;

const IBEACON_TYPE: u8 = 0x02;
const IBEACON_REMAINING_LEN: u8 = 0x15;

/// Length of the manufacturer data after the company id.
pub const MANUFACTURER_DATA_LEN: usize = 23;

/// AD type for the flags structure.
const AD_TYPE_FLAGS: u8 = 0x01;
/// AD type for manufacturer-specific data.
const AD_TYPE_MANUFACTURER: u8 = 0xFF;
/// LE General Discoverable, BR/EDR not supported.
const FLAGS_GENERAL_DISCOVERABLE_LE_ONLY: u8 = 0x06;

/// A decoded iBeacon frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IBeaconFrame {
    pub uuid: Uuid,
    pub major: u16,
    pub minor: u16,
    pub tx_power: i8,
}

impl From<&BeaconParams> for IBeaconFrame {
    fn from(params: &BeaconParams) -> Self {
        Self {
            uuid: params.service_uuid,
            major: params.major,
            minor: params.minor,
            tx_power: params.tx_power,
        }
    }
}

impl IBeaconFrame {
    /// Manufacturer-specific payload, without the company id.
    pub fn manufacturer_data(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(MANUFACTURER_DATA_LEN);
        buf.push(IBEACON_TYPE);
        buf.push(IBEACON_REMAINING_LEN);
        buf.extend_from_slice(self.uuid.as_bytes());
        buf.extend_from_slice(&self.major.to_be_bytes());
        buf.extend_from_slice(&self.minor.to_be_bytes());
        buf.push(self.tx_power as u8);
        buf
    }

    /// Complete legacy advertising data: flags AD followed by the
    /// manufacturer-specific AD carrying the frame.
    pub fn advertising_data(&self) -> Vec<u8> {
        let manufacturer = self.manufacturer_data();
        let mut buf = Vec::with_capacity(3 + 4 + manufacturer.len());
        buf.extend_from_slice(&[0x02, AD_TYPE_FLAGS, FLAGS_GENERAL_DISCOVERABLE_LE_ONLY]);
        // Length covers the AD type, the company id and the payload.
        buf.push((1 + 2 + manufacturer.len()) as u8);
        buf.push(AD_TYPE_MANUFACTURER);
        buf.extend_from_slice(&APPLE_COMPANY_ID.to_le_bytes());
        buf.extend_from_slice(&manufacturer);
        buf
    }

    /// Decode the manufacturer payload (company id already stripped).
    pub fn from_manufacturer_data(data: &[u8]) -> Option<Self> {
        if data.len() < MANUFACTURER_DATA_LEN {
            return None;
        }
        if data[0] != IBEACON_TYPE || data[1] != IBEACON_REMAINING_LEN {
            return None;
        }
        let uuid = Uuid::from_slice(&data[2..18]).ok()?;
        let major = u16::from_be_bytes([data[18], data[19]]);
        let minor = u16::from_be_bytes([data[20], data[21]]);
        let tx_power = data[22] as i8;
        Some(Self {
            uuid,
            major,
            minor,
            tx_power,
        })
    }

    /// Walk the AD structures of raw advertising data and decode the first
    /// Apple manufacturer-specific structure that holds an iBeacon frame.
    pub fn from_advertising_data(data: &[u8]) -> Option<Self> {
        let mut rest = data;
        while let Some((&len, tail)) = rest.split_first() {
            let len = len as usize;
            if len == 0 || tail.len() < len {
                return None;
            }
            let (structure, next) = tail.split_at(len);
            if structure[0] == AD_TYPE_MANUFACTURER && structure.len() >= 3 {
                let company = u16::from_le_bytes([structure[1], structure[2]]);
                if company == APPLE_COMPANY_ID {
                    if let Some(frame) = Self::from_manufacturer_data(&structure[3..]) {
                        return Some(frame);
                    }
                }
            }
            rest = next;
        }
        None
    }
}
