//! OS-1 legacy UDP wire format (little endian)
//!
//! Column block:
//!
//! | offset | size | field |
//! |---|---|---|
//! | 0 | 8 | timestamp (ns) |
//! | 8 | 2 | measurement id |
//! | 10 | 2 | frame id |
//! | 12 | 4 | encoder count |
//! | 16 | 12 x beams | pixels: range u32 (low 20 bits, mm), reflectivity u16, signal u16, noise u16, reserved u16 |
//! | end - 4 | 4 | status, `0xFFFFFFFF` = valid |
//!
//! IMU datagram: sys/accel/gyro timestamps (u64 ns) followed by accel xyz (f32, g)
//! and gyro xyz (f32, deg/s), 48 bytes.

use std::collections::VecDeque;

use bytes::{BufMut, Bytes, BytesMut};
use contracts::{ImuSample, PixelSample, RawColumn};

use crate::error::{IngestionError, Result};

/// Column header size
pub const COLUMN_HEADER_BYTES: usize = 16;
/// Per-beam pixel size
pub const PIXEL_BYTES: usize = 12;
/// Trailing status word size
pub const STATUS_BYTES: usize = 4;
/// Status word of a valid column
pub const COLUMN_VALID: u32 = 0xFFFF_FFFF;
/// Range occupies the low 20 bits
pub const RANGE_MASK: u32 = 0x000F_FFFF;
/// Columns per datagram sent by the OS-1
pub const COLUMNS_PER_PACKET: usize = 16;
/// IMU datagram size
pub const IMU_PACKET_BYTES: usize = 48;

/// Size of one column block for `beams` beams
pub fn column_block_size(beams: usize) -> usize {
    COLUMN_HEADER_BYTES + beams * PIXEL_BYTES + STATUS_BYTES
}

/// Zero-copy view over one column block
pub struct ColumnSlice<'a> {
    slice: &'a [u8],
    beams: usize,
}

impl<'a> ColumnSlice<'a> {
    pub fn from_slice(slice: &'a [u8], beams: usize) -> Result<ColumnSlice<'a>> {
        if beams == 0 {
            return Err(IngestionError::NoBeams);
        }
        let expected = column_block_size(beams);
        if slice.len() != expected {
            return Err(IngestionError::Truncated {
                what: "column block",
                expected,
                actual: slice.len(),
            });
        }
        Ok(ColumnSlice { slice, beams })
    }

    pub fn timestamp(&self) -> u64 {
        u64::from_le_bytes(self.array::<8>(0))
    }

    pub fn measurement_id(&self) -> u16 {
        u16::from_le_bytes(self.array::<2>(8))
    }

    pub fn frame_id(&self) -> u16 {
        u16::from_le_bytes(self.array::<2>(10))
    }

    pub fn encoder_count(&self) -> u32 {
        u32::from_le_bytes(self.array::<4>(12))
    }

    pub fn status(&self) -> u32 {
        u32::from_le_bytes(self.array::<4>(self.slice.len() - STATUS_BYTES))
    }

    pub fn is_valid(&self) -> bool {
        self.status() == COLUMN_VALID
    }

    pub fn pixel(&self, beam: usize) -> PixelSample {
        let base = COLUMN_HEADER_BYTES + beam * PIXEL_BYTES;
        PixelSample {
            range_mm: u32::from_le_bytes(self.array::<4>(base)) & RANGE_MASK,
            reflectivity: u16::from_le_bytes(self.array::<2>(base + 4)),
            signal: u16::from_le_bytes(self.array::<2>(base + 6)),
            noise: u16::from_le_bytes(self.array::<2>(base + 8)),
        }
    }

    pub fn to_column(&self) -> RawColumn {
        RawColumn {
            timestamp_ns: self.timestamp(),
            measurement_id: self.measurement_id(),
            frame_id: self.frame_id(),
            encoder_count: self.encoder_count(),
            pixels: (0..self.beams).map(|b| self.pixel(b)).collect(),
        }
    }

    fn array<const N: usize>(&self, offset: usize) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.slice[offset..offset + N]);
        out
    }
}

/// Decode one column block, rejecting invalid columns
pub fn decode_column(block: &[u8], beams: usize) -> Result<RawColumn> {
    let slice = ColumnSlice::from_slice(block, beams)?;
    if !slice.is_valid() {
        return Err(IngestionError::InvalidColumn {
            measurement_id: slice.measurement_id(),
            status: slice.status(),
        });
    }
    Ok(slice.to_column())
}

/// Decode every block of a lidar datagram into `queue`.
///
/// The whole datagram is rejected when it is not made of whole column blocks.
/// Invalid columns are skipped; their count is returned.
pub fn decode_lidar_datagram(
    datagram: &[u8],
    beams: usize,
    queue: &mut VecDeque<RawColumn>,
) -> Result<usize> {
    if beams == 0 {
        return Err(IngestionError::NoBeams);
    }
    let block_size = column_block_size(beams);
    if datagram.is_empty() || datagram.len() % block_size != 0 {
        return Err(IngestionError::Misaligned {
            len: datagram.len(),
            block_size,
        });
    }

    let mut invalid = 0;
    for block in datagram.chunks_exact(block_size) {
        match decode_column(block, beams) {
            Ok(column) => queue.push_back(column),
            Err(IngestionError::InvalidColumn { .. }) => invalid += 1,
            Err(e) => return Err(e),
        }
    }
    Ok(invalid)
}

/// Decode an IMU datagram
pub fn decode_imu(datagram: &[u8]) -> Result<ImuSample> {
    if datagram.len() != IMU_PACKET_BYTES {
        return Err(IngestionError::Truncated {
            what: "imu datagram",
            expected: IMU_PACKET_BYTES,
            actual: datagram.len(),
        });
    }
    let u64_at = |o: usize| {
        let mut b = [0u8; 8];
        b.copy_from_slice(&datagram[o..o + 8]);
        u64::from_le_bytes(b)
    };
    let f32_at = |o: usize| {
        let mut b = [0u8; 4];
        b.copy_from_slice(&datagram[o..o + 4]);
        f32::from_le_bytes(b)
    };

    Ok(ImuSample {
        sys_timestamp_ns: u64_at(0),
        accel_timestamp_ns: u64_at(8),
        gyro_timestamp_ns: u64_at(16),
        accel: [f32_at(24), f32_at(28), f32_at(32)],
        gyro: [f32_at(36), f32_at(40), f32_at(44)],
    })
}

/// Encode one column block (simulators, replay tools)
pub fn encode_column(buf: &mut BytesMut, column: &RawColumn, status: u32) {
    buf.reserve(column_block_size(column.pixels.len()));
    buf.put_u64_le(column.timestamp_ns);
    buf.put_u16_le(column.measurement_id);
    buf.put_u16_le(column.frame_id);
    buf.put_u32_le(column.encoder_count);
    for px in &column.pixels {
        buf.put_u32_le(px.range_mm & RANGE_MASK);
        buf.put_u16_le(px.reflectivity);
        buf.put_u16_le(px.signal);
        buf.put_u16_le(px.noise);
        buf.put_u16_le(0);
    }
    buf.put_u32_le(status);
}

/// Encode a lidar datagram of valid columns
pub fn encode_lidar_datagram(columns: &[RawColumn]) -> Bytes {
    let mut buf = BytesMut::new();
    for column in columns {
        encode_column(&mut buf, column, COLUMN_VALID);
    }
    buf.freeze()
}

/// Encode an IMU datagram
pub fn encode_imu(sample: &ImuSample) -> Bytes {
    let mut buf = BytesMut::with_capacity(IMU_PACKET_BYTES);
    buf.put_u64_le(sample.sys_timestamp_ns);
    buf.put_u64_le(sample.accel_timestamp_ns);
    buf.put_u64_le(sample.gyro_timestamp_ns);
    for v in sample.accel.iter().chain(sample.gyro.iter()) {
        buf.put_f32_le(*v);
    }
    buf.freeze()
}
