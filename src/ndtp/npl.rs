//! Transport layer (NPL)

use bytes::{
    Buf,
    Bytes,
};

use crate::{
    crc::crc16_ndtp,
    ndtp::{
        DecodeError,
        NPH_HEADER_LENGTH,
        NPH_OFFSET,
        NPL_HEADER_LENGTH,
        SIGNATURE,
        ServiceId,
        SessionError,
        nph::SessionHeader,
    },
    util::{
        BufReadBytesExt,
        find_signature,
    },
};

/// Flag in the NPL flags field signalling that the frame carries a CRC.
const FLAG_CRC_PRESENT: u16 = 0x0002;

/// NDTP transport header
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Npl {
    pub data_type: u8,
    pub peer_address: [u8; 4],
    pub request_id: u16,
}

/// A frame located in a buffer, with a verified CRC.
#[derive(Debug)]
pub(super) struct Located<'a> {
    pub npl: Npl,
    pub frame: &'a [u8],
    pub rest: &'a [u8],
}

pub(super) fn locate(buffer: &[u8]) -> Result<Located<'_>, DecodeError> {
    let Some(index) = find_signature(buffer, &SIGNATURE)
    else {
        return Err(DecodeError::SignatureNotFound);
    };

    let too_short = |expected: usize, available: usize| {
        tracing::trace!(expected, available, "incomplete NDTP frame");
        DecodeError::TooShort {
            expected,
            available,
            rest: Bytes::copy_from_slice(buffer),
        }
    };

    let available = buffer.len() - index;
    if available < NPL_HEADER_LENGTH {
        return Err(too_short(NPL_HEADER_LENGTH, available));
    }

    let mut header = &buffer[index + SIGNATURE.len()..index + NPL_HEADER_LENGTH];
    let data_length = usize::from(header.get_u16_le());
    let flags = header.get_u16_le();
    let received_crc = header.get_u16();
    let data_type = header.get_u8();
    let peer_address = header.get_bytes::<4>();
    let request_id = header.get_u16_le();

    let frame_length = NPL_HEADER_LENGTH + data_length;
    if available < frame_length {
        return Err(too_short(frame_length, available));
    }

    let frame = &buffer[index..index + frame_length];

    if flags & FLAG_CRC_PRESENT != 0 {
        let calculated = crc16_ndtp(&frame[NPL_HEADER_LENGTH..]);
        if calculated != received_crc {
            return Err(DecodeError::CrcMismatch {
                calculated,
                received: received_crc,
            });
        }
    }

    Ok(Located {
        npl: Npl {
            data_type,
            peer_address,
            request_id,
        },
        frame,
        rest: &buffer[index + frame_length..],
    })
}

/// A located and checked frame, without the session layer decoded.
#[derive(Clone, Debug, PartialEq)]
pub struct Peeked {
    pub frame: Bytes,
    pub rest: Bytes,

    /// Session header, if the frame is long enough to carry one.
    pub session: Option<SessionHeader>,
}

impl Peeked {
    pub fn service(&self) -> Option<ServiceId> {
        self.session.map(|session| session.service)
    }

    pub fn packet_type(&self) -> Option<u16> {
        self.session.map(|session| session.packet_type)
    }

    pub fn request_id(&self) -> Option<u32> {
        self.session.map(|session| session.request_id)
    }
}

/// Locates and checks the first frame in `buffer` without decoding its
/// payload.
///
/// This is much cheaper than [`Packet::decode`][super::Packet::decode] and
/// is enough to route or forward frames.
pub fn peek(buffer: &[u8]) -> Result<Peeked, DecodeError> {
    let located = locate(buffer)?;

    let session = (located.frame.len() > NPH_OFFSET + NPH_HEADER_LENGTH)
        .then(|| SessionHeader::decode(&located.frame[NPH_OFFSET..]).ok())
        .flatten();

    Ok(Peeked {
        frame: Bytes::copy_from_slice(located.frame),
        rest: Bytes::copy_from_slice(located.rest),
        session,
    })
}

/// Reads the NPH service from a raw frame.
pub fn service(frame: &[u8]) -> Result<ServiceId, SessionError> {
    let expected = NPH_OFFSET + NPH_HEADER_LENGTH;
    if frame.len() < expected {
        return Err(SessionError::TooShort {
            expected,
            available: frame.len(),
        });
    }

    let mut data = &frame[NPH_OFFSET..];
    Ok(ServiceId(data.get_u16_le()))
}

#[cfg(test)]
mod tests {
    use crate::ndtp::{
        DecodeError,
        ServiceId,
        SessionError,
        peek,
        service,
        tests_support::*,
    };

    #[test]
    fn it_peeks_at_frames() {
        let peeked = peek(&garbage_then(&EXT_RESULT_FRAME, &[1, 2, 3])).unwrap();
        assert_eq!(&peeked.frame[..], &EXT_RESULT_FRAME[..]);
        assert_eq!(&peeked.rest[..], &[1, 2, 3]);
        assert_eq!(peeked.service(), Some(ServiceId::EXTERNAL_DEVICE));
        assert_eq!(peeked.packet_type(), Some(102));
        assert_eq!(peeked.request_id(), Some(263));
    }

    #[test]
    fn peek_checks_the_crc() {
        let mut frame = NAV_FRAME.to_vec();
        frame[30] = frame[30].wrapping_add(1);
        assert!(matches!(peek(&frame), Err(DecodeError::CrcMismatch { .. })));
    }

    #[test]
    fn peek_skips_the_session_header_of_bare_frames() {
        let frame = frame_with_data(&nph_header(1, 101, 1, 3), true);
        let peeked = peek(&frame).unwrap();
        assert_eq!(peeked.session, None);
        assert!(peeked.rest.is_empty());
    }

    #[test]
    fn it_reads_the_service_of_raw_frames() {
        assert_eq!(service(&NAV_FRAME), Ok(ServiceId::NAVDATA));
        assert_eq!(service(&EXT_RESULT_FRAME), Ok(ServiceId::EXTERNAL_DEVICE));
        assert_eq!(
            service(&NAV_FRAME[..20]),
            Err(SessionError::TooShort {
                expected: 25,
                available: 20
            })
        );
    }
}
