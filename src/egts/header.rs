//! Transport header
//!
//! ```plain
//!  0  protocol version (PRV), also used as signature
//!  1  security key ID
//!  2  flags
//!  3  header length
//!  4  header encoding
//!  5  body length
//!  7  packet ID
//!  9  packet type
//! 10  header CRC-8
//! ```

use bytes::{
    Buf,
    BufMut,
    Bytes,
};

use crate::{
    crc::{
        crc8_egts,
        crc16_egts,
    },
    egts::{
        DecodeError,
        PacketType,
    },
    util::find_signature,
};

pub const SIGNATURE: u8 = 0x01;

/// Length of the header without optional fields. We never write those.
pub const HEADER_LENGTH: usize = 11;

/// Flags of responses. This sets the routing priority bits.
const FLAGS_RESPONSE: u8 = 0x03;

#[derive(Clone, Copy, Debug)]
pub struct Header {
    pub packet_type: PacketType,
    pub id: u16,
}

#[derive(Debug)]
pub struct Located<'a> {
    pub header: Header,
    pub body: &'a [u8],
    pub rest: &'a [u8],
}

/// Finds a packet in `buffer` and checks both CRCs.
pub fn locate(buffer: &[u8]) -> Result<Located<'_>, DecodeError> {
    let Some(index) = find_signature(buffer, &[SIGNATURE])
    else {
        return Err(DecodeError::SignatureNotFound);
    };

    let too_short = |expected: usize, available: usize| {
        tracing::trace!(expected, available, "incomplete EGTS header");
        DecodeError::TooShort {
            expected,
            available,
            rest: Some(Bytes::copy_from_slice(buffer)),
        }
    };

    let data = &buffer[index..];
    if data.len() < HEADER_LENGTH {
        return Err(too_short(HEADER_LENGTH, data.len()));
    }

    let header_length = data[3];
    if data.len() < usize::from(header_length) {
        return Err(too_short(usize::from(header_length), data.len()));
    }
    if usize::from(header_length) < HEADER_LENGTH {
        return Err(DecodeError::InvalidHeaderLength {
            length: header_length,
        });
    }

    let (header, data) = data.split_at(usize::from(header_length));
    let (header, received) = header.split_at(header.len() - 1);
    let received = received[0];
    let calculated = crc8_egts(header);
    if calculated != received {
        tracing::debug!(calculated, received, "EGTS header CRC mismatch");
        return Err(DecodeError::HeaderCrcMismatch {
            calculated,
            received,
        });
    }

    let mut fields = &header[5..10];
    let body_length = usize::from(fields.get_u16_le());
    let id = fields.get_u16_le();
    let packet_type = PacketType(fields.get_u8());

    if data.len() < body_length + 2 {
        return Err(DecodeError::TooShort {
            expected: body_length + 2,
            available: data.len(),
            rest: None,
        });
    }

    let (body, data) = data.split_at(body_length);
    let (mut crc, rest) = data.split_at(2);
    let received = crc.get_u16_le();
    let calculated = crc16_egts(body);
    if calculated != received {
        tracing::debug!(calculated, received, "EGTS body CRC mismatch");
        return Err(DecodeError::BodyCrcMismatch {
            calculated,
            received,
        });
    }

    Ok(Located {
        header: Header { packet_type, id },
        body,
        rest,
    })
}

/// Writes the header for a body of `body_length` bytes.
pub fn encode(buffer: &mut Vec<u8>, packet_type: PacketType, id: u16, body_length: u16) {
    let start = buffer.len();

    let flags = if packet_type == PacketType::RESPONSE {
        FLAGS_RESPONSE
    }
    else {
        0
    };

    buffer.put_u8(SIGNATURE);
    buffer.put_u8(0);
    buffer.put_u8(flags);
    buffer.put_u8(HEADER_LENGTH as u8);
    buffer.put_u8(0);
    buffer.put_u16_le(body_length);
    buffer.put_u16_le(id);
    buffer.put_u8(packet_type.0);

    let crc = crc8_egts(&buffer[start..]);
    buffer.put_u8(crc);
}
