//! EGTS (ERA-GLONASS Telematics Standard) codec
//!
//! An EGTS packet is a transport header protected by a CRC-8, followed by a
//! body protected by a CRC-16. The body consists of service data records,
//! which in turn contain subrecords.
//!
//! Only the parts needed to report positions and fuel levels are
//! implemented: the `EGTS_PT_APPDATA` and `EGTS_PT_RESPONSE` packet types and
//! the position, liquid level sensor and record response subrecords.

mod header;
mod record;
mod subrecord;

use std::fmt::{
    self,
    Display,
};

use bytes::{
    BufMut,
    Bytes,
};

pub use self::{
    record::Record,
    subrecord::{
        Confirmation,
        FuelData,
        PosData,
        Subrecord,
    },
};
use crate::{
    Decoded,
    crc::crc16_egts,
};

/// Seconds between the unix epoch and the EGTS epoch (2010-01-01 00:00 UTC).
pub const EPOCH_OFFSET: u32 = 1_262_304_000;

/// EGTS packet type
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PacketType(pub u8);

impl PacketType {
    /// `EGTS_PT_RESPONSE`
    pub const RESPONSE: Self = Self(0);

    /// `EGTS_PT_APPDATA`
    pub const APP_DATA: Self = Self(1);

    /// `EGTS_PT_SIGNED_APPDATA`
    pub const SIGNED_APP_DATA: Self = Self(2);
}

impl fmt::Debug for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::RESPONSE => write!(f, "PacketType::RESPONSE"),
            Self::APP_DATA => write!(f, "PacketType::APP_DATA"),
            Self::SIGNED_APP_DATA => write!(f, "PacketType::SIGNED_APP_DATA"),
            _ => write!(f, "PacketType({})", self.0),
        }
    }
}

/// EGTS service (source or recipient of a record)
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Service(pub u8);

impl Service {
    /// `EGTS_AUTH_SERVICE`
    pub const AUTH: Self = Self(1);

    /// `EGTS_TELEDATA_SERVICE`
    pub const TELEDATA: Self = Self(2);
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::AUTH => write!(f, "Service::AUTH"),
            Self::TELEDATA => write!(f, "Service::TELEDATA"),
            _ => write!(f, "Service({})", self.0),
        }
    }
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("EGTS signature not found")]
    SignatureNotFound,

    /// The buffer doesn't contain a complete packet yet.
    ///
    /// `rest` is a copy of the whole input buffer, if the header wasn't
    /// complete. Once the header was validated the packet can't be retried.
    #[error("expected {expected} bytes, but only {available} are available")]
    TooShort {
        expected: usize,
        available: usize,
        rest: Option<Bytes>,
    },

    #[error("invalid header length: {length}")]
    InvalidHeaderLength { length: u8 },

    #[error("header CRC mismatch: calculated {calculated:#04x}, received {received:#04x}")]
    HeaderCrcMismatch { calculated: u8, received: u8 },

    #[error("body CRC mismatch: calculated {calculated:#06x}, received {received:#06x}")]
    BodyCrcMismatch { calculated: u16, received: u16 },

    #[error("packet type {packet_type:?} not implemented")]
    Unimplemented { packet_type: PacketType },

    /// A length field inside the body points past its end.
    #[error("{what} truncated: expected {expected} bytes, but only {available} are available")]
    Truncated {
        what: &'static str,
        expected: usize,
        available: usize,
    },
}

impl DecodeError {
    /// Returns `true` if decoding might succeed once more bytes are available.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Self::TooShort { rest: Some(_), .. })
    }

    /// The bytes to retry with, if any.
    pub fn rest(&self) -> Option<&Bytes> {
        match self {
            Self::TooShort { rest, .. } => rest.as_ref(),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum EncodeError {
    #[error("not implemented: {0}")]
    NotImplemented(Unsupported),

    #[error("response packet without response data")]
    MissingResponse,

    #[error("{what} too long: {length} bytes")]
    TooLong { what: &'static str, length: usize },
}

/// Things that can be represented, but not encoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Unsupported {
    PacketType(PacketType),
    Subrecord {
        service: Service,
        subrecord_type: u8,
    },
    FuelType(u8),

    /// Bearing in degrees that doesn't fit into 9 bits.
    Bearing(u16),
}

impl Display for Unsupported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PacketType(packet_type) => write!(f, "packet type {}", packet_type.0),
            Self::Subrecord {
                service,
                subrecord_type,
            } => {
                write!(
                    f,
                    "subrecord type {subrecord_type} for service {}",
                    service.0
                )
            }
            Self::FuelType(fuel_type) => write!(f, "fuel type {fuel_type}"),
            Self::Bearing(bearing) => write!(f, "bearing {bearing}"),
        }
    }
}

/// Data of an `EGTS_PT_RESPONSE` packet preceding its records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Response {
    /// ID of the packet this responds to
    pub response_packet_id: u16,
    pub processing_result: u8,
}

const RESPONSE_LENGTH: usize = 3;

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Packet {
    pub packet_type: PacketType,
    pub id: u16,
    pub records: Vec<Record>,

    /// Only present in response packets.
    pub response: Option<Response>,
}

impl Packet {
    /// Creates an `EGTS_PT_APPDATA` packet.
    pub fn app_data(id: u16, records: Vec<Record>) -> Self {
        Self {
            packet_type: PacketType::APP_DATA,
            id,
            records,
            response: None,
        }
    }

    /// Creates an `EGTS_PT_RESPONSE` packet.
    pub fn response(id: u16, response: Response, records: Vec<Record>) -> Self {
        Self {
            packet_type: PacketType::RESPONSE,
            id,
            records,
            response: Some(response),
        }
    }

    /// Decodes the first EGTS packet found in `buffer`.
    pub fn decode(buffer: &[u8]) -> Result<Decoded<Self>, DecodeError> {
        let located = header::locate(buffer)?;
        let body = located.body;

        let (response, records) = match located.header.packet_type {
            PacketType::APP_DATA => (None, record::decode_records(body)?),
            PacketType::RESPONSE => {
                if body.len() < RESPONSE_LENGTH {
                    return Err(DecodeError::Truncated {
                        what: "response",
                        expected: RESPONSE_LENGTH,
                        available: body.len(),
                    });
                }
                let response = Response {
                    response_packet_id: u16::from_le_bytes([body[0], body[1]]),
                    processing_result: body[2],
                };
                (
                    Some(response),
                    record::decode_records(&body[RESPONSE_LENGTH..])?,
                )
            }
            packet_type => return Err(DecodeError::Unimplemented { packet_type }),
        };

        Ok(Decoded {
            packet: Self {
                packet_type: located.header.packet_type,
                id: located.header.id,
                records,
                response,
            },
            rest: Bytes::copy_from_slice(located.rest),
        })
    }

    /// Encodes the packet, including both checksums.
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let mut body = vec![];

        match self.packet_type {
            PacketType::APP_DATA => {}
            PacketType::RESPONSE => {
                let response = self.response.ok_or(EncodeError::MissingResponse)?;
                body.put_u16_le(response.response_packet_id);
                body.put_u8(response.processing_result);
            }
            packet_type => {
                return Err(EncodeError::NotImplemented(Unsupported::PacketType(
                    packet_type,
                )));
            }
        }

        for record in &self.records {
            record.encode(&mut body)?;
        }

        let body_length = u16::try_from(body.len()).map_err(|_| {
            EncodeError::TooLong {
                what: "packet body",
                length: body.len(),
            }
        })?;

        let mut packet = Vec::with_capacity(header::HEADER_LENGTH + body.len() + 2);
        header::encode(&mut packet, self.packet_type, self.id, body_length);
        let crc = crc16_egts(&body);
        packet.extend_from_slice(&body);
        packet.put_u16_le(crc);

        Ok(packet)
    }
}

impl Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Header: {{packet_type: {}, id: {}}}; ",
            self.packet_type.0, self.id
        )?;
        if let Some(response) = &self.response {
            write!(
                f,
                "Response: {{response_packet_id: {}, processing_result: {}}}; ",
                response.response_packet_id, response.processing_result
            )?;
        }
        write!(f, "Records: [")?;
        for (i, record) in self.records.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{record}")?;
        }
        write!(f, "]")
    }
}


/// Reference packets shared by the tests of the EGTS modules.
#[cfg(test)]
pub(crate) mod tests_support {
    use crate::{
        crc::{
            crc8_egts,
            crc16_egts,
        },
        egts::PacketType,
    };

    /// `EGTS_PT_APPDATA` with one position record of object 239
    pub const APP_DATA_PACKET: [u8; 48] = [
        1, 0, 0, 11, 0, 35, 0, 0, 0, 1, 153, 24, 0, 0, 0, 1, 239, 0, 0, 0, 2, 2, 16, 21, 0, 210,
        49, 43, 16, 79, 186, 58, 158, 210, 39, 188, 53, 3, 0, 0, 178, 0, 0, 0, 0, 0, 106, 141,
    ];

    /// `EGTS_PT_RESPONSE` followed by three extra bytes
    pub const RESPONSE_PACKET: [u8; 32] = [
        1, 0, 3, 11, 0, 16, 0, 6, 0, 0, 22, 6, 0, 0, 6, 0, 6, 0, 24, 2, 2, 0, 3, 0, 6, 0, 0, 24, 29,
        1, 2, 3,
    ];

    pub const NO_SIGNATURE: [u8; 32] = [
        4, 4, 4, 4, 4, 5, 6, 34, 3, 4, 5, 6, 4, 3, 3, 2, 2, 5, 6, 2, 3, 5, 6, 6, 2, 11, 4, 5, 6, 2,
        41, 44,
    ];

    /// Builds a packet with valid checksums around `body`.
    pub fn packet_with_body(packet_type: PacketType, id: u16, body: &[u8]) -> Vec<u8> {
        let mut packet = vec![1, 0, 0, 11, 0];
        packet.extend_from_slice(&(body.len() as u16).to_le_bytes());
        packet.extend_from_slice(&id.to_le_bytes());
        packet.push(packet_type.0);
        packet.push(crc8_egts(&packet));
        packet.extend_from_slice(body);
        packet.extend_from_slice(&crc16_egts(body).to_le_bytes());
        packet
    }
}
