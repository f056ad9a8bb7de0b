//! Replies and in-place modification of NDTP frames
//!
//! All of these work on raw frames as returned in [`Packet::frame`]. Every
//! operation that touches the data part leaves the frame with a correct CRC.

use byteorder::{
    BigEndian,
    ByteOrder,
    LittleEndian,
};

use crate::{
    crc::crc16_ndtp,
    ndtp::{
        NPH_PAYLOAD_OFFSET,
        NPL_HEADER_LENGTH,
        Nph,
        NphPayload,
        Packet,
        PacketKind,
        ServiceId,
    },
};

/// Length of a `NPH_RESULT` frame
pub const REPLY_LENGTH: usize = NPH_PAYLOAD_OFFSET + 4;

/// Length of a `NPH_SED_DEVICE_RESULT` frame
pub const REPLY_EXT_LENGTH: usize = NPH_PAYLOAD_OFFSET + 8;

const OFFSET_DATA_LENGTH: usize = 2;
const OFFSET_CRC: usize = 6;
const OFFSET_PEER_ADDRESS: usize = 9;
const OFFSET_NPL_REQUEST_ID: usize = 13;
const OFFSET_PACKET_TYPE: usize = 17;
const OFFSET_REQUEST_FLAG: usize = 19;
const OFFSET_NPH_REQUEST_ID: usize = 21;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ReplyError {
    #[error("frame too short for a reply: {length} bytes")]
    TooShort { length: usize },

    #[error("reply not possible for service {service:?}")]
    WrongService { service: Option<ServiceId> },

    /// The frame belongs to the external device service, but carries no
    /// title data or device result to take pack number and message ID from.
    #[error("no external device data to reply to")]
    MissingDeviceData,
}

/// Fields to overwrite with [`patch`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Changes {
    pub npl_request_id: Option<u16>,
    pub nph_request_id: Option<u32>,
    pub packet_type: Option<u16>,
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        self.npl_request_id.is_none() && self.nph_request_id.is_none() && self.packet_type.is_none()
    }
}

/// Creates a `NPH_RESULT` reply for a frame.
///
/// The reply keeps transport header, service and request ID of the frame.
pub fn make_reply(frame: &[u8], result: u32) -> Result<Vec<u8>, ReplyError> {
    let mut reply = reply_template(frame, REPLY_LENGTH)?;
    reply[OFFSET_PACKET_TYPE..OFFSET_NPH_REQUEST_ID].fill(0);
    LittleEndian::write_u32(&mut reply[NPH_PAYLOAD_OFFSET..], result);
    update_crc(&mut reply);
    Ok(reply)
}

/// Overwrites the fields given in `changes` and recomputes the CRC.
pub fn patch(frame: &mut [u8], changes: &Changes) -> Result<(), ReplyError> {
    if frame.len() < NPH_PAYLOAD_OFFSET {
        return Err(ReplyError::TooShort {
            length: frame.len(),
        });
    }

    if let Some(request_id) = changes.npl_request_id {
        LittleEndian::write_u16(&mut frame[OFFSET_NPL_REQUEST_ID..], request_id);
    }
    if let Some(request_id) = changes.nph_request_id {
        LittleEndian::write_u32(&mut frame[OFFSET_NPH_REQUEST_ID..], request_id);
    }
    if let Some(packet_type) = changes.packet_type {
        LittleEndian::write_u16(&mut frame[OFFSET_PACKET_TYPE..], packet_type);
    }

    update_crc(frame);
    Ok(())
}

/// Overwrites the peer address of a frame.
///
/// The CRC only covers the data part, so it stays valid.
pub fn change_address(frame: &mut [u8], address: [u8; 4]) -> Result<(), ReplyError> {
    if frame.len() < NPL_HEADER_LENGTH {
        return Err(ReplyError::TooShort {
            length: frame.len(),
        });
    }
    frame[OFFSET_PEER_ADDRESS..OFFSET_PEER_ADDRESS + 4].copy_from_slice(&address);
    Ok(())
}

fn reply_template(frame: &[u8], length: usize) -> Result<Vec<u8>, ReplyError> {
    if frame.len() < NPH_PAYLOAD_OFFSET {
        return Err(ReplyError::TooShort {
            length: frame.len(),
        });
    }

    let mut reply = vec![0; length];
    reply[..NPH_PAYLOAD_OFFSET].copy_from_slice(&frame[..NPH_PAYLOAD_OFFSET]);

    LittleEndian::write_u16(
        &mut reply[OFFSET_DATA_LENGTH..],
        (length - NPL_HEADER_LENGTH) as u16,
    );

    Ok(reply)
}

fn update_crc(frame: &mut [u8]) {
    let crc = crc16_ndtp(&frame[NPL_HEADER_LENGTH..]);
    BigEndian::write_u16(&mut frame[OFFSET_CRC..], crc);
}

impl Packet {
    /// Creates a `NPH_RESULT` reply for this packet.
    pub fn reply(&self, result: u32) -> Result<Vec<u8>, ReplyError> {
        make_reply(&self.frame, result)
    }

    /// Creates a `NPH_SED_DEVICE_RESULT` reply for an external device packet.
    ///
    /// Pack number and message ID are copied from the title data or device
    /// result being answered.
    pub fn reply_ext(&self, result: u32) -> Result<Vec<u8>, ReplyError> {
        let service = self.service();
        if service != Some(ServiceId::EXTERNAL_DEVICE) {
            return Err(ReplyError::WrongService { service });
        }

        let ext = match &self.nph {
            Ok(Nph {
                payload: NphPayload::ExternalDevice(ext),
                ..
            }) => *ext,
            _ => return Err(ReplyError::MissingDeviceData),
        };

        let mut reply = reply_template(&self.frame, REPLY_EXT_LENGTH)?;
        reply[OFFSET_REQUEST_FLAG..OFFSET_NPH_REQUEST_ID].fill(0);
        LittleEndian::write_u16(&mut reply[OFFSET_PACKET_TYPE..], PacketKind::DEVICE_RESULT);

        let payload = &mut reply[NPH_PAYLOAD_OFFSET..];
        LittleEndian::write_u16(&mut payload[0..], ext.pack_num);
        LittleEndian::write_u32(&mut payload[2..], result);
        LittleEndian::write_u16(&mut payload[6..], ext.message_id);

        update_crc(&mut reply);
        Ok(reply)
    }

    /// Applies `changes` to the raw frame. The decoded fields are updated as
    /// well.
    pub fn apply_changes(&mut self, changes: &Changes) -> Result<(), ReplyError> {
        patch(&mut self.frame, changes)?;

        if let Some(request_id) = changes.npl_request_id {
            self.npl.request_id = request_id;
        }
        if let Ok(nph) = &mut self.nph {
            if let Some(request_id) = changes.nph_request_id {
                nph.request_id = request_id;
            }
            if let Some(packet_type) = changes.packet_type {
                nph.packet_type = packet_type;
            }
        }

        Ok(())
    }

    /// Changes the peer address in the transport header.
    pub fn change_address(&mut self, address: [u8; 4]) -> Result<(), ReplyError> {
        change_address(&mut self.frame, address)?;
        self.npl.peer_address = address;
        Ok(())
    }
}
