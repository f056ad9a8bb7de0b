//! Subrecords
//!
//! Every subrecord starts with a one byte type and a two byte length. The
//! meaning of the type depends on the service of the enclosing record, except
//! for record responses which are valid for any service.

use bitflags::bitflags;
use bytes::{
    Buf,
    BufMut,
};

use crate::egts::{
    DecodeError,
    EncodeError,
    Service,
    Unsupported,
    record::ensure_length,
};

const SUBRECORD_HEADER_LENGTH: usize = 3;

const POS_DATA_LENGTH: usize = 21;
const FUEL_DATA_LENGTH: usize = 7;
const CONFIRMATION_LENGTH: usize = 3;

/// Largest speed that fits into the 14 bit speed field (in 0.1 km/h).
const MAX_RAW_SPEED: u32 = 0x3fff;

/// Largest bearing that fits into the 9 bit bearing field.
const MAX_BEARING: u16 = 0x1ff;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    struct PosFlags: u8 {
        const WEST = 0x40;
        const SOUTH = 0x20;
        const MOVING = 0x10;
        const REALTIME = 0x08;
        /// We always report a 3D fix.
        const FIX_3D = 0x02;
        const VALID = 0x01;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    struct FuelFlags: u8 {
        const ERROR = 0x40;
        const UNIT = 0x30;
        const RAW_DATA = 0x08;
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Subrecord {
    /// `EGTS_SR_POS_DATA`
    PosData(PosData),

    /// `EGTS_SR_LIQUID_LEVEL_SENSOR`
    FuelData(FuelData),

    /// `EGTS_SR_RECORD_RESPONSE`
    Confirmation(Confirmation),
}

impl Subrecord {
    pub const SR_RECORD_RESPONSE: u8 = 0;
    pub const SR_POS_DATA: u8 = 16;
    pub const SR_LIQUID_LEVEL_SENSOR: u8 = 27;

    pub fn subrecord_type(&self) -> u8 {
        match self {
            Self::PosData(_) => Self::SR_POS_DATA,
            Self::FuelData(_) => Self::SR_LIQUID_LEVEL_SENSOR,
            Self::Confirmation(_) => Self::SR_RECORD_RESPONSE,
        }
    }

    pub(super) fn encode(&self, service: Service, buffer: &mut Vec<u8>) -> Result<(), EncodeError> {
        let subrecord_type = self.subrecord_type();

        if !matches!(self, Self::Confirmation(_)) && service != Service::TELEDATA {
            return Err(EncodeError::NotImplemented(Unsupported::Subrecord {
                service,
                subrecord_type,
            }));
        }

        buffer.put_u8(subrecord_type);
        match self {
            Self::PosData(pos_data) => {
                buffer.put_u16_le(POS_DATA_LENGTH as u16);
                pos_data.encode(buffer)?;
            }
            Self::FuelData(fuel_data) => {
                buffer.put_u16_le(FUEL_DATA_LENGTH as u16);
                fuel_data.encode(buffer)?;
            }
            Self::Confirmation(confirmation) => {
                buffer.put_u16_le(CONFIRMATION_LENGTH as u16);
                buffer.put_u16_le(confirmation.record_number);
                buffer.put_u8(confirmation.status);
            }
        }

        Ok(())
    }
}

/// Decodes the next subrecord from `data`.
///
/// Returns `None` for subrecords that are skipped.
pub(super) fn decode(service: Service, data: &mut &[u8]) -> Result<Option<Subrecord>, DecodeError> {
    ensure_length("subrecord header", data, SUBRECORD_HEADER_LENGTH)?;
    let subrecord_type = data.get_u8();
    let length = usize::from(data.get_u16_le());

    ensure_length("subrecord", data, length)?;
    let remaining: &[u8] = *data;
    let (body, rest) = remaining.split_at(length);
    *data = rest;

    let subrecord = match (subrecord_type, service) {
        (Subrecord::SR_RECORD_RESPONSE, _) => {
            ensure_length("record response", body, CONFIRMATION_LENGTH)?;
            let mut body = body;
            Some(Subrecord::Confirmation(Confirmation {
                record_number: body.get_u16_le(),
                status: body.get_u8(),
            }))
        }
        (Subrecord::SR_POS_DATA, Service::TELEDATA) => {
            ensure_length("position data", body, POS_DATA_LENGTH)?;
            Some(Subrecord::PosData(PosData::decode(body)))
        }
        (Subrecord::SR_LIQUID_LEVEL_SENSOR, Service::TELEDATA) => {
            ensure_length("liquid level sensor data", body, FUEL_DATA_LENGTH)?;
            FuelData::decode(body).map(Subrecord::FuelData)
        }
        _ => {
            tracing::trace!(subrecord_type, ?service, length, "skipping subrecord");
            None
        }
    };

    Ok(subrecord)
}

/// `EGTS_SR_POS_DATA`
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PosData {
    /// Seconds since the EGTS epoch
    pub time: u32,

    /// Longitude in degrees. The hemisphere is given by `west`.
    pub longitude: f64,

    /// Latitude in degrees. The hemisphere is given by `south`.
    pub latitude: f64,

    /// Bearing in degrees, 9 bits
    pub bearing: u16,

    /// Speed in km/h
    pub speed: u16,

    pub west: bool,
    pub south: bool,
    pub moving: bool,
    pub realtime: bool,
    pub valid: bool,

    /// Source of the report, e.g. `13` for an alarm button.
    pub source: u8,
}

impl PosData {
    pub const SOURCE_SOS: u8 = 13;

    fn decode(mut body: &[u8]) -> Self {
        let time = body.get_u32_le();
        let latitude = body.get_u32_le();
        let longitude = body.get_u32_le();
        let flags = PosFlags::from_bits_truncate(body.get_u8());
        let speed_low = body.get_u8();
        let high_bits = body.get_u8();
        let bearing_low = body.get_u8();
        body.advance(4);
        let source = body.get_u8();

        let raw_speed = (u16::from(high_bits & 0x3f) << 8) | u16::from(speed_low);
        let bearing = (u16::from(high_bits >> 7) << 8) | u16::from(bearing_low);

        let west = flags.contains(PosFlags::WEST);
        let south = flags.contains(PosFlags::SOUTH);

        Self {
            time,
            longitude: coordinate_from_raw(longitude, 180.0, west),
            latitude: coordinate_from_raw(latitude, 90.0, south),
            bearing,
            speed: (raw_speed + 5) / 10,
            west,
            south,
            moving: flags.contains(PosFlags::MOVING),
            realtime: flags.contains(PosFlags::REALTIME),
            valid: flags.contains(PosFlags::VALID),
            source,
        }
    }

    fn encode(&self, buffer: &mut Vec<u8>) -> Result<(), EncodeError> {
        if self.bearing > MAX_BEARING {
            return Err(EncodeError::NotImplemented(Unsupported::Bearing(
                self.bearing,
            )));
        }

        let mut flags = PosFlags::FIX_3D;
        flags.set(PosFlags::WEST, self.west);
        flags.set(PosFlags::SOUTH, self.south);
        flags.set(PosFlags::MOVING, self.moving);
        flags.set(PosFlags::REALTIME, self.realtime);
        flags.set(PosFlags::VALID, self.valid);

        let raw_speed = (u32::from(self.speed) * 10).min(MAX_RAW_SPEED);
        let high_bits = (((self.bearing >> 8) & 0x01) as u8) << 7 | ((raw_speed >> 8) as u8 & 0x3f);

        buffer.put_u32_le(self.time);
        buffer.put_u32_le(coordinate_to_raw(self.latitude, 90.0));
        buffer.put_u32_le(coordinate_to_raw(self.longitude, 180.0));
        buffer.put_u8(flags.bits());
        buffer.put_u8(raw_speed as u8);
        buffer.put_u8(high_bits);
        buffer.put_u8(self.bearing as u8);
        buffer.put_bytes(0, 4);
        buffer.put_u8(self.source);
        Ok(())
    }
}

fn coordinate_from_raw(raw: u32, range: f64, negative: bool) -> f64 {
    let degrees = f64::from(raw) * range / f64::from(u32::MAX);
    if negative { -degrees } else { degrees }
}

fn coordinate_to_raw(degrees: f64, range: f64) -> u32 {
    // float to int casts saturate
    (degrees.abs() / range * f64::from(u32::MAX)).round() as u32
}

/// `EGTS_SR_LIQUID_LEVEL_SENSOR`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FuelData {
    /// Unit of `fuel`: `0` for mm, `1` for percent, `2` for litres.
    /// [`FuelData::TYPE_ERROR`] if the sensor reported an error.
    pub fuel_type: u8,

    /// Fuel level. Litres are transmitted in units of 0.1 l.
    pub fuel: u32,
}

impl FuelData {
    pub const TYPE_MILLIMETRES: u8 = 0;
    pub const TYPE_PERCENT: u8 = 1;
    pub const TYPE_LITRES: u8 = 2;
    pub const TYPE_ERROR: u8 = 0xff;

    fn decode(mut body: &[u8]) -> Option<Self> {
        let flags = FuelFlags::from_bits_retain(body.get_u8());
        body.advance(2);
        let quantity = body.get_u32_le();

        if flags.contains(FuelFlags::RAW_DATA) {
            tracing::trace!("skipping raw liquid level sensor data");
            return None;
        }

        if flags.contains(FuelFlags::ERROR) {
            return Some(Self {
                fuel_type: Self::TYPE_ERROR,
                fuel: 0,
            });
        }

        let fuel_type = (flags & FuelFlags::UNIT).bits() >> 4;
        let fuel = match fuel_type {
            Self::TYPE_MILLIMETRES | Self::TYPE_PERCENT => quantity,
            Self::TYPE_LITRES => quantity / 10,
            _ => {
                tracing::trace!(fuel_type, "skipping liquid level with unknown unit");
                return None;
            }
        };

        Some(Self { fuel_type, fuel })
    }

    fn encode(&self, buffer: &mut Vec<u8>) -> Result<(), EncodeError> {
        let (flags, quantity) = match self.fuel_type {
            Self::TYPE_ERROR => (FuelFlags::ERROR, 0),
            Self::TYPE_MILLIMETRES | Self::TYPE_PERCENT => {
                (FuelFlags::from_bits_retain(self.fuel_type << 4), self.fuel)
            }
            Self::TYPE_LITRES => {
                (
                    FuelFlags::from_bits_retain(self.fuel_type << 4),
                    self.fuel.saturating_mul(10),
                )
            }
            fuel_type => {
                return Err(EncodeError::NotImplemented(Unsupported::FuelType(
                    fuel_type,
                )));
            }
        };

        buffer.put_u8(flags.bits());
        buffer.put_bytes(0, 2);
        buffer.put_u32_le(quantity);
        Ok(())
    }
}

/// `EGTS_SR_RECORD_RESPONSE`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Confirmation {
    /// Number of the confirmed record
    pub record_number: u16,
    pub status: u8,
}
