use bytes::Buf;

use crate::ndtp::{
    PacketKind,
    ServiceId,
    SessionError,
    nph::ensure_length,
};

/// Payload of the `NPH_SRV_EXTERNAL_DEVICE` service
///
/// Title data carries message ID and pack number. Device results additionally
/// carry a result code.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExtDevice {
    pub message_id: u16,
    pub pack_num: u16,
    pub result: u32,
}

impl ExtDevice {
    pub(super) fn decode(packet_type: u16, mut payload: &[u8]) -> Result<Self, SessionError> {
        match packet_type {
            PacketKind::DEVICE_TITLE_DATA => {
                ensure_length(payload, 4)?;
                Ok(Self {
                    message_id: payload.get_u16_le(),
                    pack_num: payload.get_u16_le(),
                    result: 0,
                })
            }
            PacketKind::DEVICE_RESULT => {
                ensure_length(payload, 8)?;
                let pack_num = payload.get_u16_le();
                let result = payload.get_u32_le();
                let message_id = payload.get_u16_le();
                Ok(Self {
                    message_id,
                    pack_num,
                    result,
                })
            }
            _ => {
                Err(SessionError::UnknownPacketType {
                    service: ServiceId::EXTERNAL_DEVICE,
                    packet_type,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ndtp::{
        ExtDevice,
        ServiceId,
        SessionError,
    };

    #[test]
    fn it_decodes_device_results() {
        let payload = [3, 0, 9, 0, 0, 0, 17, 0];
        assert_eq!(
            ExtDevice::decode(102, &payload),
            Ok(ExtDevice {
                message_id: 17,
                pack_num: 3,
                result: 9,
            })
        );
        assert!(matches!(
            ExtDevice::decode(102, &payload[..7]),
            Err(SessionError::TooShort { .. })
        ));
    }

    #[test]
    fn it_rejects_unknown_packet_types() {
        assert_eq!(
            ExtDevice::decode(101, &[0; 8]),
            Err(SessionError::UnknownPacketType {
                service: ServiceId::EXTERNAL_DEVICE,
                packet_type: 101
            })
        );
    }
}
