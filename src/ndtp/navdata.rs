//! Cells of the `NPH_SRV_NAVDATA` service
//!
//! A navigation payload is a sequence of cells. Each cell starts with a one
//! byte tag that determines its length. Only position cells and the two fuel
//! sensor cells are decoded, all others are skipped.

use bitflags::bitflags;
use bytes::Buf;

/// Cell lengths by tag. `None` marks tags that end the scan.
const CELL_LENGTHS: [Option<usize>; 11] = [
    Some(28), // navigation
    None,
    Some(28), // sensors
    Some(16), // Corona
    Some(17), // IRMA
    Some(8),  // KMD
    Some(11), // counters
    Some(3),  // digital inputs
    Some(8),  // UziM fuel sensor
    Some(42), // registrator
    Some(39), // M333 fuel sensor
];

const TAG_NAV: u8 = 0;
const TAG_UZIM: u8 = 8;
const TAG_M333: u8 = 10;

/// M333 reports this instead of a measurement if it has no reading.
const M333_NO_READING: u32 = 0xffff_ffff;

/// Coordinates are transmitted in units of 1e-7 degrees.
const COORDINATE_SCALE: f64 = 10_000_000.0;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    struct NavFlags: u8 {
        const VALID = 0x80;
        const EAST = 0x40;
        const NORTH = 0x20;
        const SOS = 0x04;
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Cell {
    Nav(NavData),
    Fuel(FuelData),
}

/// Position report of a terminal
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NavData {
    /// Unix timestamp
    pub time: u32,

    /// Longitude in degrees. Negative for the western hemisphere.
    pub lon: f64,

    /// Latitude in degrees. Negative for the southern hemisphere.
    pub lat: f64,

    pub bearing: u16,

    /// Speed in km/h
    pub speed: u16,

    /// The alarm button was pressed.
    pub sos: bool,

    pub east: bool,
    pub north: bool,
    pub valid: bool,
}

impl NavData {
    /// Decodes a position cell. `cell` must be a whole cell including its tag.
    fn decode(cell: &[u8]) -> Self {
        let mut cell = &cell[2..];
        let time = cell.get_u32_le();
        let lon = cell.get_u32_le();
        let lat = cell.get_u32_le();
        let flags = NavFlags::from_bits_truncate(cell.get_u8());
        cell.advance(1);
        let speed = cell.get_u16_le();
        cell.advance(2);
        let bearing = cell.get_u16_le();

        let east = flags.contains(NavFlags::EAST);
        let north = flags.contains(NavFlags::NORTH);

        Self {
            time,
            lon: signed_degrees(lon, east),
            lat: signed_degrees(lat, north),
            bearing,
            speed,
            sos: flags.contains(NavFlags::SOS),
            east,
            north,
            valid: flags.contains(NavFlags::VALID),
        }
    }
}

fn signed_degrees(raw: u32, positive: bool) -> f64 {
    let degrees = f64::from(raw) / COORDINATE_SCALE;
    if positive { degrees } else { -degrees }
}

/// Fuel level reading
///
/// The fuel type tells how to interpret the value:
///
/// - `0`: level in mm
/// - `1`: level in percent
/// - `2`: volume in litres
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FuelData {
    pub fuel_type: u8,
    pub fuel: u16,
}

impl FuelData {
    pub const TYPE_MILLIMETRES: u8 = 0;
    pub const TYPE_PERCENT: u8 = 1;
    pub const TYPE_LITRES: u8 = 2;

    /// Decodes an UziM cell. Returns `None` if the sensor reported an error.
    fn decode_uzim(cell: &[u8]) -> Option<Self> {
        let mut cell = &cell[2..];
        let status = cell.get_u8();
        let millimetres = cell.get_u16_le();
        let litres = cell.get_u16_le();

        if status != 0 {
            tracing::trace!(status, "UziM sensor error");
            None
        }
        else if litres > 0 {
            Some(Self {
                fuel_type: Self::TYPE_LITRES,
                fuel: litres,
            })
        }
        else {
            Some(Self {
                fuel_type: Self::TYPE_MILLIMETRES,
                fuel: millimetres,
            })
        }
    }

    /// Decodes a M333 cell. Returns `None` if the sensor had no reading.
    ///
    /// The MSB of the level selects percent (set) or litres (clear).
    fn decode_m333(cell: &[u8]) -> Option<Self> {
        if (&cell[2..6]).get_u32_le() == M333_NO_READING {
            return None;
        }

        let level = (&cell[18..20]).get_u16_le();
        let fuel_type = if level & 0x8000 == 0 {
            Self::TYPE_LITRES
        }
        else {
            Self::TYPE_PERCENT
        };

        Some(Self {
            fuel_type,
            fuel: level & 0x7fff,
        })
    }
}

/// Decodes cells until the payload ends, an unknown tag is encountered, or a
/// cell is incomplete.
pub(super) fn decode_cells(mut data: &[u8]) -> Vec<Cell> {
    let mut cells = vec![];

    while let Some(&tag) = data.first() {
        let Some(length) = CELL_LENGTHS.get(usize::from(tag)).copied().flatten()
        else {
            tracing::trace!(tag, "stopping at unknown cell");
            break;
        };

        if data.len() < length {
            tracing::trace!(tag, length, available = data.len(), "incomplete cell");
            break;
        }

        let (cell, tail) = data.split_at(length);
        match tag {
            TAG_NAV => cells.push(Cell::Nav(NavData::decode(cell))),
            TAG_UZIM => cells.extend(FuelData::decode_uzim(cell).map(Cell::Fuel)),
            TAG_M333 => cells.extend(FuelData::decode_m333(cell).map(Cell::Fuel)),
            _ => {}
        }
        data = tail;
    }

    cells
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use crate::ndtp::{
        Cell,
        FuelData,
        navdata::decode_cells,
        tests_support::NAV_FRAME,
    };

    fn nav_cell(lon: u32, lat: u32, flags: u8, speed: u16, bearing: u16) -> Vec<u8> {
        let mut cell = vec![0u8; 28];
        cell[2..6].copy_from_slice(&1_600_000_000u32.to_le_bytes());
        cell[6..10].copy_from_slice(&lon.to_le_bytes());
        cell[10..14].copy_from_slice(&lat.to_le_bytes());
        cell[14] = flags;
        cell[16..18].copy_from_slice(&speed.to_le_bytes());
        cell[20..22].copy_from_slice(&bearing.to_le_bytes());
        cell
    }

    fn uzim_cell(status: u8, millimetres: u16, litres: u16) -> Vec<u8> {
        let mut cell = vec![8, 0, status];
        cell.extend_from_slice(&millimetres.to_le_bytes());
        cell.extend_from_slice(&litres.to_le_bytes());
        cell.push(0);
        cell
    }

    fn m333_cell(sentinel: u32, level: u16) -> Vec<u8> {
        let mut cell = vec![0u8; 39];
        cell[0] = 10;
        cell[2..6].copy_from_slice(&sentinel.to_le_bytes());
        cell[18..20].copy_from_slice(&level.to_le_bytes());
        cell
    }

    fn single_nav(data: &[u8]) -> crate::ndtp::NavData {
        match &decode_cells(data)[..] {
            [Cell::Nav(nav)] => nav.clone(),
            cells => panic!("unexpected cells: {cells:?}"),
        }
    }

    #[test]
    fn it_decodes_the_reference_cells() {
        let cells = decode_cells(&NAV_FRAME[25..]);
        assert_eq!(cells.len(), 1);
    }

    #[test]
    fn it_negates_western_and_southern_coordinates() {
        let nav = single_nav(&nav_cell(376_925_783, 557_890_249, 0x80, 54, 12));
        assert_abs_diff_eq!(nav.lon, -37.6925783, epsilon = 1e-9);
        assert_abs_diff_eq!(nav.lat, -55.7890249, epsilon = 1e-9);
        assert!(!nav.east);
        assert!(!nav.north);
        assert!(nav.valid);
        assert_eq!(nav.speed, 54);
        assert_eq!(nav.bearing, 12);
        assert_eq!(nav.time, 1_600_000_000);
    }

    #[test]
    fn it_decodes_the_sos_flag() {
        let nav = single_nav(&nav_cell(1, 2, 0x64, 0, 0));
        assert!(nav.sos);
        assert!(nav.east);
        assert!(nav.north);
        assert!(!nav.valid);
    }

    #[test]
    fn it_decodes_uzim_cells() {
        let mut data = uzim_cell(0, 120, 0);
        data.extend(uzim_cell(0, 120, 45));
        data.extend(uzim_cell(1, 120, 45));

        assert_eq!(
            decode_cells(&data),
            vec![
                Cell::Fuel(FuelData {
                    fuel_type: FuelData::TYPE_MILLIMETRES,
                    fuel: 120
                }),
                Cell::Fuel(FuelData {
                    fuel_type: FuelData::TYPE_LITRES,
                    fuel: 45
                }),
            ]
        );
    }

    #[test]
    fn it_decodes_m333_cells() {
        let mut data = m333_cell(0, 0x8000 | 55);
        data.extend(m333_cell(0, 300));
        data.extend(m333_cell(0xffff_ffff, 300));

        assert_eq!(
            decode_cells(&data),
            vec![
                Cell::Fuel(FuelData {
                    fuel_type: FuelData::TYPE_PERCENT,
                    fuel: 55
                }),
                Cell::Fuel(FuelData {
                    fuel_type: FuelData::TYPE_LITRES,
                    fuel: 300
                }),
            ]
        );
    }

    #[test]
    fn it_skips_uninterpreted_cells() {
        let mut data = vec![];
        for (tag, length) in [(2, 28), (3, 16), (4, 17), (5, 8), (6, 11), (7, 3), (9, 42)] {
            let mut cell = vec![0u8; length];
            cell[0] = tag;
            data.extend(cell);
        }
        data.extend(nav_cell(10, 20, 0xe0, 0, 0));

        let cells = decode_cells(&data);
        assert_eq!(cells.len(), 1);
        assert!(matches!(cells[0], Cell::Nav(_)));
    }

    #[test]
    fn it_stops_at_unknown_tags() {
        for tag in [1, 11, 0xff] {
            let mut data = nav_cell(10, 20, 0xe0, 0, 0);
            data.push(tag);
            data.extend(nav_cell(10, 20, 0xe0, 0, 0));
            assert_eq!(decode_cells(&data).len(), 1, "tag {tag}");
        }
    }

    #[test]
    fn it_stops_at_incomplete_cells() {
        let mut data = nav_cell(10, 20, 0xe0, 0, 0);
        data.extend(&nav_cell(10, 20, 0xe0, 0, 0)[..27]);
        assert_eq!(decode_cells(&data).len(), 1);

        for tag in 0..=10 {
            assert!(decode_cells(&[tag, 0, 0]).is_empty());
            assert!(decode_cells(&[tag]).is_empty());
        }
        assert!(decode_cells(&[]).is_empty());
    }
}
