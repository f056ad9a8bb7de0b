//! Translation of decoded packets into EGTS

use crate::{
    egts::{
        self,
        PosData,
        Record,
        Service,
    },
    general,
    ndtp::{
        self,
        Cell,
        NphPayload,
        PacketKind,
        ServiceId,
        SessionError,
    },
};

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("packet type {packet_type:?} of service {service:?} carries no navigation data")]
    WrongPacketType {
        service: Option<ServiceId>,
        packet_type: Option<u16>,
    },

    #[error("session layer could not be decoded")]
    Session(#[from] SessionError),
}

/// Packets that can be converted into protocol-neutral data.
pub trait ToGeneral {
    fn to_general(&self) -> Result<Vec<general::Subrecord>, ConvertError>;
}

impl ToGeneral for ndtp::Nph {
    fn to_general(&self) -> Result<Vec<general::Subrecord>, ConvertError> {
        let NphPayload::Cells(cells) = &self.payload
        else {
            return Err(ConvertError::WrongPacketType {
                service: Some(self.service),
                packet_type: Some(self.packet_type),
            });
        };

        if self.service != ServiceId::NAVDATA {
            return Err(ConvertError::WrongPacketType {
                service: Some(self.service),
                packet_type: Some(self.packet_type),
            });
        }

        let realtime = self.packet_kind() != Some(PacketKind::History);

        Ok(cells
            .iter()
            .map(|cell| {
                match cell {
                    Cell::Nav(nav) => {
                        general::Subrecord::Nav(general::NavData {
                            time: nav.time,
                            lon: nav.lon,
                            lat: nav.lat,
                            bearing: nav.bearing,
                            speed: nav.speed,
                            realtime,
                            valid: nav.valid,
                            source: if nav.sos { PosData::SOURCE_SOS } else { 0 },
                        })
                    }
                    Cell::Fuel(fuel) => {
                        general::Subrecord::Fuel(general::FuelData {
                            fuel_type: fuel.fuel_type,
                            fuel: u32::from(fuel.fuel),
                        })
                    }
                }
            })
            .collect())
    }
}

impl ToGeneral for ndtp::Packet {
    fn to_general(&self) -> Result<Vec<general::Subrecord>, ConvertError> {
        match &self.nph {
            Ok(nph) => nph.to_general(),
            Err(error) => Err(error.clone().into()),
        }
    }
}

/// Converts a packet into an `EGTS_PT_APPDATA` packet with one teledata
/// record.
pub fn to_egts<P: ToGeneral + ?Sized>(
    packet: &P,
    object_id: u32,
    packet_id: u16,
    record_number: u16,
) -> Result<egts::Packet, ConvertError> {
    let subrecords = packet
        .to_general()?
        .iter()
        .map(general::Subrecord::to_egts)
        .collect::<Vec<_>>();
    tracing::trace!(object_id, subrecords = subrecords.len(), "converted to EGTS");

    Ok(egts::Packet::app_data(
        packet_id,
        vec![Record {
            record_number,
            object_id: Some(object_id),
            service: Service::TELEDATA,
            subrecords,
        }],
    ))
}
