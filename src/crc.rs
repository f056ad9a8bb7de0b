//! Checksums used by the NDTP and EGTS wire formats.
//!
//! Terminals and servers usually carry literal 256-entry tables for these.
//! The `crc` crate builds the same tables at compile time.

use crc::{
    Algorithm,
    Crc,
};

/// CRC-8 protecting the EGTS transport header.
///
/// Known as CRC-8/NRSC-5 in the CRC catalogue.
pub const CRC_8_EGTS: Algorithm<u8> = Algorithm {
    width: 8,
    poly: 0x31,
    init: 0xff,
    refin: false,
    refout: false,
    xorout: 0x00,
    check: 0xf7,
    residue: 0x00,
};

/// CRC-16 protecting the EGTS service support layer (the packet body).
///
/// Known as CRC-16/IBM-3740 (often called CCITT-FALSE).
pub const CRC_16_EGTS: Algorithm<u16> = Algorithm {
    width: 16,
    poly: 0x1021,
    init: 0xffff,
    refin: false,
    refout: false,
    xorout: 0x0000,
    check: 0x29b1,
    residue: 0x0000,
};

/// CRC-16 protecting the data part of an NDTP frame.
///
/// Known as CRC-16/MODBUS. The bytes are processed LSB first.
pub const CRC_16_NDTP: Algorithm<u16> = Algorithm {
    width: 16,
    poly: 0x8005,
    init: 0xffff,
    refin: true,
    refout: true,
    xorout: 0x0000,
    check: 0x4b37,
    residue: 0x0000,
};

const EGTS_HEADER: Crc<u8> = Crc::<u8>::new(&CRC_8_EGTS);
const EGTS_BODY: Crc<u16> = Crc::<u16>::new(&CRC_16_EGTS);
const NDTP_FRAME: Crc<u16> = Crc::<u16>::new(&CRC_16_NDTP);

/// Checksum of an EGTS header (all header bytes but the checksum itself).
pub fn crc8_egts(data: &[u8]) -> u8 {
    EGTS_HEADER.checksum(data)
}

/// Checksum of an EGTS packet body.
pub fn crc16_egts(data: &[u8]) -> u16 {
    EGTS_BODY.checksum(data)
}

/// Checksum of the data part of an NDTP frame (everything after the 15 byte
/// transport header).
pub fn crc16_ndtp(data: &[u8]) -> u16 {
    NDTP_FRAME.checksum(data)
}
