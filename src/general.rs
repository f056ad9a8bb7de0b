//! Protocol-neutral navigation and fuel data
//!
//! Decoded packets are converted into these types first (see
//! [`ToGeneral`][crate::convert::ToGeneral]), which then map one-to-one onto
//! EGTS subrecords.

use crate::egts;

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Subrecord {
    Nav(NavData),
    Fuel(FuelData),
}

impl Subrecord {
    pub fn to_egts(&self) -> egts::Subrecord {
        match self {
            Self::Nav(nav) => egts::Subrecord::PosData(nav.to_egts()),
            Self::Fuel(fuel) => egts::Subrecord::FuelData(fuel.to_egts()),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NavData {
    /// Unix timestamp
    pub time: u32,

    /// Signed degrees, negative for the western hemisphere
    pub lon: f64,

    /// Signed degrees, negative for the southern hemisphere
    pub lat: f64,

    pub bearing: u16,

    /// Speed in km/h
    pub speed: u16,

    /// Sent as soon as it was measured, as opposed to replayed from history.
    pub realtime: bool,

    pub valid: bool,

    /// Origin of the report. See [`egts::PosData::SOURCE_SOS`].
    pub source: u8,
}

impl NavData {
    pub fn to_egts(&self) -> egts::PosData {
        egts::PosData {
            time: self.time.saturating_sub(egts::EPOCH_OFFSET),
            longitude: self.lon,
            latitude: self.lat,
            bearing: self.bearing,
            speed: self.speed,
            west: self.lon < 0.0,
            south: self.lat < 0.0,
            moving: self.speed > 0,
            realtime: self.realtime,
            valid: self.valid,
            source: self.source,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FuelData {
    pub fuel_type: u8,
    pub fuel: u32,
}

impl FuelData {
    pub fn to_egts(&self) -> egts::FuelData {
        egts::FuelData {
            fuel_type: self.fuel_type,
            fuel: self.fuel,
        }
    }
}
