use std::fmt::{
    self,
    Display,
};

use bitflags::bitflags;
use bytes::{
    Buf,
    BufMut,
};

use crate::egts::{
    DecodeError,
    EncodeError,
    Service,
    Subrecord,
    subrecord,
};

/// Length of the record header without optional fields
const RECORD_HEADER_LENGTH: usize = 7;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    struct RecordFlags: u8 {
        /// Object ID field present
        const OBJECT_ID = 0x01;
        /// Event ID field present
        const EVENT_ID = 0x02;
        /// Time field present
        const TIME = 0x04;
    }
}

/// Service data record
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Record {
    pub record_number: u16,
    pub object_id: Option<u32>,

    /// Source service. Records are always addressed to the same service on
    /// the recipient side.
    pub service: Service,

    pub subrecords: Vec<Subrecord>,
}

impl Record {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        ensure_length("record header", data, RECORD_HEADER_LENGTH)?;

        let data_length = usize::from(data.get_u16_le());
        let record_number = data.get_u16_le();
        let flags = RecordFlags::from_bits_truncate(data.get_u8());

        // optional fields appear in this order, each 4 bytes long
        let optional_length = 4 * flags.bits().count_ones() as usize;
        ensure_length("record header", data, optional_length + 2)?;

        let object_id = flags
            .contains(RecordFlags::OBJECT_ID)
            .then(|| data.get_u32_le());
        if flags.contains(RecordFlags::EVENT_ID) {
            data.advance(4);
        }
        if flags.contains(RecordFlags::TIME) {
            data.advance(4);
        }

        let service = Service(data.get_u8());
        let _recipient_service = data.get_u8();

        ensure_length("record data", data, data_length)?;
        let remaining: &[u8] = *data;
        let (mut subrecord_data, rest) = remaining.split_at(data_length);
        *data = rest;

        let mut subrecords = vec![];
        while !subrecord_data.is_empty() {
            if let Some(subrecord) = subrecord::decode(service, &mut subrecord_data)? {
                subrecords.push(subrecord);
            }
        }

        Ok(Self {
            record_number,
            object_id,
            service,
            subrecords,
        })
    }

    pub(super) fn encode(&self, buffer: &mut Vec<u8>) -> Result<(), EncodeError> {
        let mut subrecords = vec![];
        for subrecord in &self.subrecords {
            subrecord.encode(self.service, &mut subrecords)?;
        }

        let data_length = u16::try_from(subrecords.len()).map_err(|_| {
            EncodeError::TooLong {
                what: "record",
                length: subrecords.len(),
            }
        })?;

        let mut flags = RecordFlags::empty();
        if self.object_id.is_some() {
            flags |= RecordFlags::OBJECT_ID;
        }

        buffer.put_u16_le(data_length);
        buffer.put_u16_le(self.record_number);
        buffer.put_u8(flags.bits());
        if let Some(object_id) = self.object_id {
            buffer.put_u32_le(object_id);
        }
        buffer.put_u8(self.service.0);
        buffer.put_u8(self.service.0);
        buffer.extend_from_slice(&subrecords);

        Ok(())
    }
}

impl Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{service: {}, record_number: {}, object_id: ",
            self.service.0, self.record_number
        )?;
        match self.object_id {
            Some(object_id) => write!(f, "{object_id}")?,
            None => write!(f, "-")?,
        }
        write!(f, ", subrecords: {:?}}}", self.subrecords)
    }
}

/// Decodes a body that is a plain sequence of records.
pub(super) fn decode_records(mut body: &[u8]) -> Result<Vec<Record>, DecodeError> {
    let mut records = vec![];
    while !body.is_empty() {
        records.push(Record::decode(&mut body)?);
    }
    Ok(records)
}

pub(super) fn ensure_length(
    what: &'static str,
    data: &[u8],
    expected: usize,
) -> Result<(), DecodeError> {
    if data.len() < expected {
        tracing::debug!(what, expected, available = data.len(), "truncated");
        Err(DecodeError::Truncated {
            what,
            expected,
            available: data.len(),
        })
    }
    else {
        Ok(())
    }
}
