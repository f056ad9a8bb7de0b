//! # Telematics wire protocols
//!
//! Codecs for two binary vehicle-tracking protocols:
//!
//! - [NDTP][ndtp], the transport (NPL) and session (NPH) protocol spoken by
//!   tracking terminals,
//! - [EGTS][egts], the ERA-GLONASS telematics standard used to report
//!   telemetry to a monitoring backend,
//!
//! and a [translation][convert] of decoded NDTP navigation packets into EGTS
//! packets via a protocol-neutral [intermediate model][general].
//!
//! All codecs work on byte buffers. They never perform I/O and never retry:
//! when a buffer doesn't contain a complete frame yet, the decoder says so
//! and the caller feeds it again once more bytes arrived.
//!
//! ```no_run
//! # fn main() -> Result<(), navprot::Error> {
//! # let received: &[u8] = &[];
//! use navprot::{
//!     convert::to_egts,
//!     ndtp,
//! };
//!
//! let decoded = ndtp::Packet::decode(received)?;
//! let egts = to_egts(&decoded.packet, 239, 0, 0)?;
//! let bytes = egts.encode()?;
//! # Ok(())
//! # }
//! ```

pub mod convert;
pub mod crc;
pub mod egts;
pub mod general;
pub mod ndtp;
mod util;

use bytes::Bytes;

/// A successfully decoded packet and the bytes that followed it.
#[derive(Clone, Debug, PartialEq)]
pub struct Decoded<P> {
    pub packet: P,

    /// Everything after the decoded frame. This is always a copy, so it stays
    /// valid if the decoded frame is modified.
    pub rest: Bytes,
}

/// Any error produced by this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("NDTP decode error")]
    NdtpDecode(#[from] ndtp::DecodeError),

    #[error("NDTP session layer error")]
    NdtpSession(#[from] ndtp::SessionError),

    #[error("NDTP reply error")]
    NdtpReply(#[from] ndtp::ReplyError),

    #[error("EGTS decode error")]
    EgtsDecode(#[from] egts::DecodeError),

    #[error("EGTS encode error")]
    EgtsEncode(#[from] egts::EncodeError),

    #[error("conversion error")]
    Convert(#[from] convert::ConvertError),
}
