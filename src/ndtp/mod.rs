//! NDTP (Navigation Data Transfer Protocol) codec
//!
//! An NDTP frame consists of a 15 byte transport header (NPL) followed by
//! the session layer (NPH), which has a 10 byte header and a
//! service-specific payload.
//!
//! ```plain
//! NPL  0  signature 7E 7E
//!      2  data length
//!      4  flags (bit 1: CRC present)
//!      6  CRC-16 of the data part (big-endian)
//!      8  data type
//!      9  peer address (4 bytes)
//!     13  request ID
//! NPH 15  service
//!     17  packet type
//!     19  flags (1: reply requested)
//!     21  request ID (4 bytes)
//!     25  payload
//! ```
//!
//! All integers are little-endian, except the CRC which is big-endian.
//!
//! Only decoding is implemented in full. For the opposite direction there are
//! [replies][reply] and in-place [patches][Changes] of already received
//! frames.

mod ext_device;
mod navdata;
mod nph;
mod npl;
pub mod reply;

use std::fmt::{
    self,
    Display,
};

use bytes::{
    Bytes,
    BytesMut,
};

pub use self::{
    ext_device::ExtDevice,
    navdata::{
        Cell,
        FuelData,
        NavData,
    },
    nph::{
        Nph,
        NphPayload,
        SessionError,
        SessionHeader,
    },
    npl::{
        Npl,
        Peeked,
        peek,
        service,
    },
    reply::{
        Changes,
        ReplyError,
        change_address,
        make_reply,
        patch,
    },
};
use crate::Decoded;

/// Frame signature
pub const SIGNATURE: [u8; 2] = [0x7e, 0x7e];

/// Length of the transport (NPL) header
pub const NPL_HEADER_LENGTH: usize = 15;

/// Length of the session (NPH) header
pub const NPH_HEADER_LENGTH: usize = 10;

/// Offset of the NPH header within a frame
pub const NPH_OFFSET: usize = NPL_HEADER_LENGTH;

/// Offset of the NPH payload within a frame
pub const NPH_PAYLOAD_OFFSET: usize = NPL_HEADER_LENGTH + NPH_HEADER_LENGTH;

/// NPH result code for a successfully processed request.
pub const RESULT_OK: u32 = 0;

/// NPH packet type of a result (`NPH_RESULT`). Valid for all services.
pub const PACKET_TYPE_RESULT: u16 = 0;

/// NPH service identifier
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServiceId(pub u16);

impl ServiceId {
    /// `NPH_SRV_GENERIC_CONTROLS`
    pub const GENERIC_CONTROLS: Self = Self(0);

    /// `NPH_SRV_NAVDATA`
    pub const NAVDATA: Self = Self(1);

    /// `NPH_SRV_EXTERNAL_DEVICE`
    pub const EXTERNAL_DEVICE: Self = Self(5);

    pub fn as_u16(&self) -> u16 {
        self.0
    }
}

impl fmt::Debug for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::GENERIC_CONTROLS => write!(f, "ServiceId::GENERIC_CONTROLS"),
            Self::NAVDATA => write!(f, "ServiceId::NAVDATA"),
            Self::EXTERNAL_DEVICE => write!(f, "ServiceId::EXTERNAL_DEVICE"),
            _ => write!(f, "ServiceId({})", self.0),
        }
    }
}

impl Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Packet types this crate knows about.
///
/// NPH packet types are only unique within a service, so this is derived from
/// the service and the raw packet type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PacketKind {
    /// `NPH_RESULT`
    Result,
    /// `NPH_SGC_CONN_REQUEST`
    ConnRequest,
    /// `NPH_SND_HISTORY`
    History,
    /// `NPH_SND_REALTIME`
    Realtime,
    /// `NPH_SED_DEVICE_TITLE_DATA`
    DeviceTitleData,
    /// `NPH_SED_DEVICE_RESULT`
    DeviceResult,
}

impl PacketKind {
    pub const CONN_REQUEST: u16 = 100;
    pub const HISTORY: u16 = 100;
    pub const REALTIME: u16 = 101;
    pub const DEVICE_TITLE_DATA: u16 = 100;
    pub const DEVICE_RESULT: u16 = 102;

    pub fn from_service_and_type(service: ServiceId, packet_type: u16) -> Option<Self> {
        if packet_type == PACKET_TYPE_RESULT {
            return Some(Self::Result);
        }

        match (service, packet_type) {
            (ServiceId::GENERIC_CONTROLS, Self::CONN_REQUEST) => Some(Self::ConnRequest),
            (ServiceId::NAVDATA, Self::HISTORY) => Some(Self::History),
            (ServiceId::NAVDATA, Self::REALTIME) => Some(Self::Realtime),
            (ServiceId::EXTERNAL_DEVICE, Self::DEVICE_TITLE_DATA) => Some(Self::DeviceTitleData),
            (ServiceId::EXTERNAL_DEVICE, Self::DEVICE_RESULT) => Some(Self::DeviceResult),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Result => "NPH_RESULT",
            Self::ConnRequest => "NPH_SGC_CONN_REQUEST",
            Self::History => "NPH_SND_HISTORY",
            Self::Realtime => "NPH_SND_REALTIME",
            Self::DeviceTitleData => "NPH_SED_DEVICE_TITLE_DATA",
            Self::DeviceResult => "NPH_SED_DEVICE_RESULT",
        }
    }
}

impl Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("NDTP signature not found")]
    SignatureNotFound,

    /// The buffer doesn't contain a complete frame yet.
    ///
    /// `rest` holds a copy of the whole input buffer. Feed it again with more
    /// bytes appended.
    #[error("expected {expected} bytes for the frame, but only {available} are available")]
    TooShort {
        expected: usize,
        available: usize,
        rest: Bytes,
    },

    /// The frame is corrupted. Retrying with the same bytes won't help.
    #[error("frame CRC mismatch: calculated {calculated:#06x}, received {received:#06x}")]
    CrcMismatch { calculated: u16, received: u16 },
}

impl DecodeError {
    /// Returns `true` if decoding might succeed once more bytes are available.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Self::TooShort { .. })
    }

    /// The bytes to retry with, if any.
    pub fn rest(&self) -> Option<&Bytes> {
        match self {
            Self::TooShort { rest, .. } => Some(rest),
            _ => None,
        }
    }
}

/// A decoded NDTP packet
#[derive(Clone, Debug, PartialEq)]
pub struct Packet {
    /// Transport layer
    pub npl: Npl,

    /// Session layer.
    ///
    /// If the session layer couldn't be decoded the transport layer and the
    /// raw frame are still valid, so the frame can be forwarded or replied to.
    pub nph: Result<Nph, SessionError>,

    /// The whole frame, from signature to the last data byte.
    pub frame: BytesMut,
}

impl Packet {
    /// Decodes the first NDTP frame found in `buffer`.
    ///
    /// Bytes before the signature are discarded.
    pub fn decode(buffer: &[u8]) -> Result<Decoded<Self>, DecodeError> {
        let located = npl::locate(buffer)?;
        let nph = Nph::decode(&located.frame[NPH_OFFSET..]);

        if let Err(error) = &nph {
            tracing::debug!(?error, npl = ?located.npl, "failed to decode NPH");
        }

        Ok(Decoded {
            packet: Self {
                npl: located.npl,
                nph,
                frame: BytesMut::from(located.frame),
            },
            rest: Bytes::copy_from_slice(located.rest),
        })
    }

    /// Service of the packet.
    ///
    /// This is taken from the raw frame if the session layer couldn't be
    /// decoded.
    pub fn service(&self) -> Option<ServiceId> {
        match &self.nph {
            Ok(nph) => Some(nph.service),
            Err(_) => service(&self.frame).ok(),
        }
    }

    /// Returns the known packet kind, if any.
    pub fn packet_kind(&self) -> Option<PacketKind> {
        self.nph.as_ref().ok().and_then(Nph::packet_kind)
    }

    /// Returns `true` if this is a `NPH_RESULT` packet.
    pub fn is_result(&self) -> bool {
        self.nph.as_ref().is_ok_and(Nph::is_result)
    }

    /// Returns `true` if the sender requested a reply.
    pub fn needs_reply(&self) -> bool {
        self.nph.as_ref().is_ok_and(|nph| nph.request_flag)
    }

    /// Terminal ID announced in a `NPH_SGC_CONN_REQUEST`.
    pub fn terminal_id(&self) -> Option<u32> {
        match &self.nph {
            Ok(Nph {
                payload: NphPayload::TerminalId(terminal_id),
                ..
            }) => Some(*terminal_id),
            _ => None,
        }
    }
}

impl Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "NPL: {{data_type: {}, peer_address: {:?}, request_id: {}}}; ",
            self.npl.data_type, self.npl.peer_address, self.npl.request_id
        )?;

        match &self.nph {
            Ok(nph) => {
                write!(
                    f,
                    "NPH: {{service: {}, packet_type: {}, request_flag: {}, request_id: {}}}; Data: ",
                    nph.service, nph.packet_type, nph.request_flag, nph.request_id
                )?;
                match &nph.payload {
                    NphPayload::Result(result) => write!(f, "result {result}")?,
                    NphPayload::TerminalId(id) => write!(f, "terminal {id}")?,
                    NphPayload::Cells(cells) => write!(f, "{cells:?}")?,
                    NphPayload::ExternalDevice(ext) => write!(f, "{ext:?}")?,
                    NphPayload::None => write!(f, "none")?,
                }
            }
            Err(error) => write!(f, "NPH: {error}")?,
        }

        write!(f, "; Frame: {:02x?}", &self.frame[..])
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use crate::ndtp::{
        Cell,
        DecodeError,
        ExtDevice,
        NphPayload,
        Packet,
        PacketKind,
        ServiceId,
        SessionError,
        tests_support::*,
    };

    #[test]
    fn it_decodes_a_navigation_frame() {
        let decoded = Packet::decode(&garbage_then(&NAV_FRAME, &[1, 2, 3])).unwrap();
        assert_eq!(&decoded.rest[..], &[1, 2, 3]);

        let packet = decoded.packet;
        assert_eq!(&packet.frame[..], &NAV_FRAME[..]);
        assert_eq!(packet.npl.data_type, 2);
        assert_eq!(packet.npl.peer_address, [0, 0, 0, 0]);
        assert_eq!(packet.npl.request_id, 0);

        let nph = packet.nph.as_ref().unwrap();
        assert_eq!(nph.service, ServiceId::NAVDATA);
        assert_eq!(nph.packet_type, 101);
        assert!(nph.request_flag);
        assert_eq!(nph.request_id, 5291);
        assert_eq!(packet.packet_kind(), Some(PacketKind::Realtime));
        assert!(packet.needs_reply());
        assert!(!packet.is_result());

        let NphPayload::Cells(cells) = &nph.payload
        else {
            panic!("unexpected payload: {:?}", nph.payload);
        };
        // the sensor cell is skipped and the UziM cell reports an error
        assert_eq!(cells.len(), 1);
        let Cell::Nav(nav) = &cells[0]
        else {
            panic!("unexpected cell: {:?}", cells[0]);
        };
        assert_eq!(nav.time, 1522961700);
        assert_abs_diff_eq!(nav.lon, 37.6925783, epsilon = 1e-9);
        assert_abs_diff_eq!(nav.lat, 55.7890249, epsilon = 1e-9);
        assert_eq!(nav.bearing, 339);
        assert_eq!(nav.speed, 0);
        assert!(!nav.sos);
        assert!(nav.east);
        assert!(nav.north);
        assert!(nav.valid);
    }

    #[test]
    fn it_decodes_external_device_title_data() {
        let decoded = Packet::decode(&EXT_TITLE_FRAME).unwrap();
        assert!(decoded.rest.is_empty());

        let packet = decoded.packet;
        assert_eq!(packet.npl.peer_address, [0, 4, 0, 0]);
        assert_eq!(packet.npl.request_id, 1936);
        let nph = packet.nph.as_ref().unwrap();
        assert_eq!(nph.service, ServiceId::EXTERNAL_DEVICE);
        assert_eq!(nph.request_id, 1);
        assert!(!nph.request_flag);
        assert_eq!(
            nph.payload,
            NphPayload::ExternalDevice(ExtDevice {
                message_id: 18,
                pack_num: 32768,
                result: 0,
            })
        );
        assert_eq!(packet.packet_kind(), Some(PacketKind::DeviceTitleData));
    }

    #[test]
    fn it_decodes_external_device_result() {
        let decoded = Packet::decode(&EXT_RESULT_FRAME).unwrap();
        let packet = decoded.packet;
        assert_eq!(packet.npl.request_id, 263);
        let nph = packet.nph.as_ref().unwrap();
        assert_eq!(nph.request_id, 263);
        assert_eq!(
            nph.payload,
            NphPayload::ExternalDevice(ExtDevice {
                message_id: 1,
                pack_num: 0,
                result: 0,
            })
        );
    }

    #[test]
    fn it_decodes_a_connection_request() {
        let frame = frame_with_data(&conn_request_data(0x1234_5678), true);
        let packet = Packet::decode(&frame).unwrap().packet;
        assert_eq!(packet.terminal_id(), Some(0x1234_5678));
        assert_eq!(packet.packet_kind(), Some(PacketKind::ConnRequest));
    }

    #[test]
    fn it_decodes_results_of_any_service() {
        let mut data = nph_header(ServiceId::EXTERNAL_DEVICE.0, 0, 0, 42).to_vec();
        data.extend_from_slice(&7u32.to_le_bytes());
        let packet = Packet::decode(&frame_with_data(&data, true)).unwrap().packet;
        assert!(packet.is_result());
        assert_eq!(packet.nph.unwrap().payload, NphPayload::Result(7));
    }

    #[test]
    fn unknown_services_keep_the_transport_layer() {
        let mut data = nph_header(42, 1, 0, 1).to_vec();
        data.extend_from_slice(&[0; 4]);
        let decoded = Packet::decode(&garbage_then(&frame_with_data(&data, true), &[9])).unwrap();
        assert_eq!(&decoded.rest[..], &[9]);
        assert_eq!(
            decoded.packet.nph,
            Err(SessionError::UnknownService {
                service: ServiceId(42)
            })
        );
        assert_eq!(decoded.packet.service(), Some(ServiceId(42)));
        assert_eq!(decoded.packet.npl.data_type, 2);
    }

    #[test]
    fn it_rejects_corrupted_frames() {
        let mut frame = NAV_FRAME.to_vec();
        frame[40] ^= 0xff;
        assert!(matches!(
            Packet::decode(&frame),
            Err(DecodeError::CrcMismatch { .. })
        ));
    }

    #[test]
    fn it_ignores_the_crc_if_not_flagged() {
        let mut frame = NAV_FRAME.to_vec();
        frame[4] = 0;
        frame[6] = 0;
        frame[7] = 0;
        assert!(Packet::decode(&frame).is_ok());
    }

    #[test]
    fn short_buffers_are_returned_whole() {
        let buffer = garbage_then(&NAV_FRAME[..NAV_FRAME.len() - 4], &[]);
        match Packet::decode(&buffer) {
            Err(error @ DecodeError::TooShort { .. }) => {
                assert!(error.is_incomplete());
                assert_eq!(&error.rest().unwrap()[..], &buffer[..]);
            }
            other => panic!("unexpected result: {other:?}"),
        }

        let buffer = [0x00, 0x7e, 0x7e, 0x4a];
        match Packet::decode(&buffer) {
            Err(DecodeError::TooShort { rest, .. }) => assert_eq!(&rest[..], &buffer[..]),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn it_reports_missing_signatures() {
        let buffer = [4, 4, 4, 4, 4, 5, 6, 34, 3, 4, 5, 6, 4, 3, 3, 2, 2, 5, 6, 2, 3, 5, 6, 6];
        assert_eq!(Packet::decode(&buffer), Err(DecodeError::SignatureNotFound));
        assert_eq!(Packet::decode(&[]), Err(DecodeError::SignatureNotFound));
        assert_eq!(Packet::decode(&[0x7e]), Err(DecodeError::SignatureNotFound));
    }

    #[test]
    fn truncation_never_panics() {
        for frame in [&NAV_FRAME[..], &EXT_TITLE_FRAME[..], &EXT_RESULT_FRAME[..]] {
            for k in 0..frame.len() {
                match Packet::decode(&frame[..k]) {
                    Err(DecodeError::TooShort { rest, .. }) => assert_eq!(&rest[..], &frame[..k]),
                    Err(DecodeError::SignatureNotFound) => assert!(k < 2),
                    other => panic!("unexpected result for {k} bytes: {other:?}"),
                }
            }
        }
    }

    #[test]
    fn it_decodes_consecutive_frames() {
        let mut buffer = NAV_FRAME.to_vec();
        buffer.extend_from_slice(&EXT_RESULT_FRAME);

        let first = Packet::decode(&buffer).unwrap();
        assert_eq!(first.packet.service(), Some(ServiceId::NAVDATA));
        let second = Packet::decode(&first.rest).unwrap();
        assert_eq!(second.packet.service(), Some(ServiceId::EXTERNAL_DEVICE));
        assert!(second.rest.is_empty());
    }

    #[test]
    fn rest_is_independent_of_the_frame() {
        let mut buffer = NAV_FRAME.to_vec();
        buffer.extend_from_slice(&EXT_RESULT_FRAME);

        let mut decoded = Packet::decode(&buffer).unwrap();
        decoded.packet.frame[..].fill(0);
        assert_eq!(&decoded.rest[..], &EXT_RESULT_FRAME[..]);
    }

    #[test]
    fn it_formats_packets() {
        let packet = Packet::decode(&NAV_FRAME).unwrap().packet;
        let text = packet.to_string();
        assert!(text.starts_with("NPL: {data_type: 2, peer_address: [0, 0, 0, 0], request_id: 0}; "));
        assert!(text.contains("service: 1, packet_type: 101, request_flag: true, request_id: 5291"));
    }
}
