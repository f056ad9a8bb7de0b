//! Session layer (NPH)

use bytes::Buf;

use crate::ndtp::{
    NPH_HEADER_LENGTH,
    PACKET_TYPE_RESULT,
    PacketKind,
    ServiceId,
    ext_device::ExtDevice,
    navdata::{
        self,
        Cell,
    },
};

/// NPH flags value of a request that expects a reply.
const FLAG_REQUEST: u16 = 1;

/// Offset of the terminal ID in the payload of `NPH_SGC_CONN_REQUEST`
const CONN_REQUEST_TERMINAL_ID_OFFSET: usize = 6;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("session layer too short: expected {expected} bytes, but only {available} are available")]
    TooShort { expected: usize, available: usize },

    #[error("unknown NPH service: {service}")]
    UnknownService { service: ServiceId },

    #[error("unknown NPH packet type {packet_type} for service {service}")]
    UnknownPacketType { service: ServiceId, packet_type: u16 },
}

/// The fixed 10 byte header of the session layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionHeader {
    pub service: ServiceId,
    pub packet_type: u16,
    pub request_flag: bool,
    pub request_id: u32,
}

impl SessionHeader {
    pub(super) fn decode(mut data: &[u8]) -> Result<Self, SessionError> {
        ensure_length(data, NPH_HEADER_LENGTH)?;

        Ok(Self {
            service: ServiceId(data.get_u16_le()),
            packet_type: data.get_u16_le(),
            request_flag: data.get_u16_le() == FLAG_REQUEST,
            request_id: data.get_u32_le(),
        })
    }
}

/// Decoded NDTP session layer
#[derive(Clone, Debug, PartialEq)]
pub struct Nph {
    pub service: ServiceId,
    pub packet_type: u16,
    pub request_flag: bool,
    pub request_id: u32,
    pub payload: NphPayload,
}

/// Payload of the session layer, depending on service and packet type.
#[derive(Clone, Debug, PartialEq)]
pub enum NphPayload {
    /// Result code of a `NPH_RESULT`.
    Result(u32),

    /// Terminal ID of a `NPH_SGC_CONN_REQUEST`.
    TerminalId(u32),

    /// Navigation and fuel cells of `NPH_SND_HISTORY` or `NPH_SND_REALTIME`.
    Cells(Vec<Cell>),

    ExternalDevice(ExtDevice),

    /// Generic control packets other than connection requests carry nothing
    /// we decode.
    None,
}

impl Nph {
    /// Decodes the session layer, i.e. the frame data after the NPL header.
    pub fn decode(data: &[u8]) -> Result<Self, SessionError> {
        let header = SessionHeader::decode(data)?;
        let payload = &data[NPH_HEADER_LENGTH..];

        let payload = if header.packet_type == PACKET_TYPE_RESULT {
            ensure_length(payload, 4)?;
            NphPayload::Result((&payload[..4]).get_u32_le())
        }
        else {
            match header.service {
                ServiceId::GENERIC_CONTROLS => {
                    if header.packet_type == PacketKind::CONN_REQUEST {
                        let offset = CONN_REQUEST_TERMINAL_ID_OFFSET;
                        ensure_length(payload, offset + 4)?;
                        NphPayload::TerminalId((&payload[offset..offset + 4]).get_u32_le())
                    }
                    else {
                        NphPayload::None
                    }
                }
                ServiceId::NAVDATA => NphPayload::Cells(navdata::decode_cells(payload)),
                ServiceId::EXTERNAL_DEVICE => {
                    NphPayload::ExternalDevice(ExtDevice::decode(header.packet_type, payload)?)
                }
                service => return Err(SessionError::UnknownService { service }),
            }
        };

        Ok(Self {
            service: header.service,
            packet_type: header.packet_type,
            request_flag: header.request_flag,
            request_id: header.request_id,
            payload,
        })
    }

    pub fn is_result(&self) -> bool {
        self.packet_type == PACKET_TYPE_RESULT
    }

    pub fn packet_kind(&self) -> Option<PacketKind> {
        PacketKind::from_service_and_type(self.service, self.packet_type)
    }

    pub fn header(&self) -> SessionHeader {
        SessionHeader {
            service: self.service,
            packet_type: self.packet_type,
            request_flag: self.request_flag,
            request_id: self.request_id,
        }
    }
}

pub(super) fn ensure_length(data: &[u8], expected: usize) -> Result<(), SessionError> {
    if data.len() < expected {
        Err(SessionError::TooShort {
            expected,
            available: data.len(),
        })
    }
    else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::ndtp::{
        Nph,
        NphPayload,
        PacketKind,
        ServiceId,
        SessionError,
        tests_support::*,
    };

    #[test]
    fn it_decodes_the_session_header() {
        let nph = Nph::decode(&NAV_FRAME[15..]).unwrap();
        let header = nph.header();
        assert_eq!(header.service, ServiceId::NAVDATA);
        assert_eq!(header.packet_type, 101);
        assert!(header.request_flag);
        assert_eq!(header.request_id, 5291);
    }

    #[test]
    fn only_flag_value_one_requests_a_reply() {
        let nph = Nph::decode(&nph_header(0, 5, 3, 0)).unwrap();
        assert!(!nph.request_flag);
        assert_eq!(nph.payload, NphPayload::None);
        assert_eq!(nph.packet_kind(), None);
    }

    #[test]
    fn it_rejects_short_session_layers() {
        assert_eq!(
            Nph::decode(&[1, 0, 101, 0]),
            Err(SessionError::TooShort {
                expected: 10,
                available: 4
            })
        );

        // NPH_RESULT without a result code
        assert_eq!(
            Nph::decode(&nph_header(1, 0, 0, 0)),
            Err(SessionError::TooShort {
                expected: 4,
                available: 0
            })
        );

        // connection request without the terminal ID
        let data = conn_request_data(1);
        assert_eq!(
            Nph::decode(&data[..data.len() - 1]),
            Err(SessionError::TooShort {
                expected: 10,
                available: 9
            })
        );
    }

    #[test]
    fn it_decodes_a_terminal_id() {
        let nph = Nph::decode(&conn_request_data(4_000_001)).unwrap();
        assert_eq!(nph.payload, NphPayload::TerminalId(4_000_001));
        assert_eq!(nph.packet_kind(), Some(PacketKind::ConnRequest));
    }

    #[test]
    fn it_rejects_unknown_services() {
        assert_eq!(
            Nph::decode(&nph_header(3, 100, 0, 0)),
            Err(SessionError::UnknownService {
                service: ServiceId(3)
            })
        );
    }
}
