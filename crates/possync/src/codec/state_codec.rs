use glam::Vec2;

use super::varint::{block_bits, read_blocks, write_blocks};
use super::{AnglePacker, BitReader, BitWriter, CodecError, QuatPacker, ScalarPacker, Vec2Packer, Vec3Packer};
use crate::config::SyncConfig;
use crate::snapshot::{SyncFlags, SyncState};
use crate::sync::SyncId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub id: SyncId,
    pub payload_bits: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct StateCodec {
    time: ScalarPacker,
    position: Vec3Packer,
    position_2d: Vec2Packer,
    rotation: QuatPacker,
    angle: AnglePacker,
    block_size: u32,
    include_component_index: bool,
    include_write_size: bool,
}

impl StateCodec {
    pub fn new(config: &SyncConfig) -> Self {
        let block_size = config.varint_block_size;
        let precision = config.position_precision;
        Self {
            time: ScalarPacker::new(config.time_precision, block_size),
            position: Vec3Packer::new(precision, block_size),
            position_2d: Vec2Packer::new(Vec2::new(precision.x, precision.y), block_size),
            rotation: QuatPacker::new(config.rotation_bit_count),
            angle: AnglePacker::new(config.rotation_bit_count),
            block_size,
            include_component_index: config.include_component_index,
            include_write_size: config.include_write_size,
        }
    }

    pub fn position(&self) -> &Vec3Packer {
        &self.position
    }

    pub fn position_2d(&self) -> &Vec2Packer {
        &self.position_2d
    }

    pub fn rotation(&self) -> &QuatPacker {
        &self.rotation
    }

    pub fn angle(&self) -> &AnglePacker {
        &self.angle
    }

    pub fn includes_write_size(&self) -> bool {
        self.include_write_size
    }

    pub fn pack_time(&self, writer: &mut BitWriter, time: f64) {
        self.time.pack(writer, time);
    }

    pub fn unpack_time(&self, reader: &mut BitReader<'_>) -> Result<f64, CodecError> {
        self.time.unpack(reader)
    }

    pub fn pack_entity_id(&self, writer: &mut BitWriter, id: u32) {
        write_blocks(writer, id as u64, self.block_size);
    }

    pub fn unpack_entity_id(&self, reader: &mut BitReader<'_>) -> Result<u32, CodecError> {
        let raw = read_blocks(reader, self.block_size)?;
        u32::try_from(raw).map_err(|_| CodecError::IdOutOfRange(raw))
    }

    /// Writes one complete record: id, optional component index, optional payload length,
    /// payload.
    pub fn pack_record<S: SyncState>(
        &self,
        writer: &mut BitWriter,
        id: SyncId,
        flags: SyncFlags,
        state: &S,
    ) {
        self.pack_entity_id(writer, id.entity);
        if self.include_component_index {
            write_blocks(writer, id.component as u64, self.block_size);
        }

        if self.include_write_size {
            let mut payload = BitWriter::with_capacity(16);
            state.write(self, flags, &mut payload);
            write_blocks(writer, payload.bit_len() as u64, self.block_size);
            writer.append(&payload);
        } else {
            state.write(self, flags, writer);
        }
    }

    pub fn unpack_record_header(
        &self,
        reader: &mut BitReader<'_>,
    ) -> Result<RecordHeader, CodecError> {
        let entity = self.unpack_entity_id(reader)?;
        let component = if self.include_component_index {
            let raw = read_blocks(reader, self.block_size)?;
            u16::try_from(raw).map_err(|_| CodecError::IdOutOfRange(raw))?
        } else {
            0
        };
        let payload_bits = if self.include_write_size {
            Some(read_blocks(reader, self.block_size)? as usize)
        } else {
            None
        };

        Ok(RecordHeader {
            id: SyncId { entity, component },
            payload_bits,
        })
    }

    /// Reads the payload following `header`, checking it against the written length.
    pub fn unpack_payload<S: SyncState>(
        &self,
        reader: &mut BitReader<'_>,
        header: &RecordHeader,
        flags: SyncFlags,
    ) -> Result<S, CodecError> {
        let start = reader.position();
        let state = S::read(self, flags, reader)?;
        if let Some(expected) = header.payload_bits {
            let actual = reader.position() - start;
            if actual != expected {
                return Err(CodecError::LengthMismatch { expected, actual });
            }
        }
        Ok(state)
    }

    pub fn max_time_bits(&self) -> usize {
        self.time.max_bits()
    }

    fn prefix_bits(&self, value: u64) -> usize {
        let id = block_bits(value, self.block_size);
        let mut bits = id;
        if self.include_component_index {
            bits += id;
        }
        if self.include_write_size {
            bits += id;
        }
        bits
    }

    /// Smallest record any entity with state `S` can produce. Used to tell another record
    /// from the zero padding at the end of a message.
    pub fn min_record_bits<S: SyncState>(&self) -> usize {
        (self.prefix_bits(0) + S::min_payload_bits(self)).max(8)
    }

    pub fn max_record_bits<S: SyncState>(&self) -> usize {
        self.prefix_bits(u64::MAX) + S::max_payload_bits(self)
    }
}
