use super::CodecError;

/// Growable LSB-first bit buffer. Messages are padded with zero bits up to the next byte.
#[derive(Debug, Clone, Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    bit_len: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(bytes),
            bit_len: 0,
        }
    }

    pub fn write(&mut self, value: u64, bits: u32) {
        debug_assert!(bits <= 64);
        let mut value = if bits < 64 {
            value & ((1u64 << bits) - 1)
        } else {
            value
        };
        let mut remaining = bits;

        while remaining > 0 {
            let offset = (self.bit_len % 8) as u32;
            if offset == 0 {
                self.bytes.push(0);
            }
            let take = (8 - offset).min(remaining);
            let chunk = (value & ((1u64 << take) - 1)) as u8;
            let last = self.bytes.len() - 1;
            self.bytes[last] |= chunk << offset;

            value >>= take;
            remaining -= take;
            self.bit_len += take as usize;
        }
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write(value as u64, 1);
    }

    /// Appends every bit written to `other`, bit-exact, without re-encoding.
    pub fn append(&mut self, other: &BitWriter) {
        let full_bytes = other.bit_len / 8;
        for &byte in &other.bytes[..full_bytes] {
            self.write(byte as u64, 8);
        }
        let tail = (other.bit_len % 8) as u32;
        if tail > 0 {
            self.write(other.bytes[full_bytes] as u64, tail);
        }
    }

    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bit_len == 0
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
        self.bit_len = 0;
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    pub fn read(&mut self, bits: u32) -> Result<u64, CodecError> {
        debug_assert!(bits <= 64);
        self.ensure(bits as usize)?;

        let mut value = 0u64;
        let mut filled = 0u32;
        while filled < bits {
            let byte = self.bytes[self.position / 8];
            let offset = (self.position % 8) as u32;
            let take = (8 - offset).min(bits - filled);
            let chunk = ((byte >> offset) as u64) & ((1u64 << take) - 1);

            value |= chunk << filled;
            filled += take;
            self.position += take as usize;
        }

        Ok(value)
    }

    pub fn read_bool(&mut self) -> Result<bool, CodecError> {
        Ok(self.read(1)? != 0)
    }

    pub fn skip(&mut self, bits: usize) -> Result<(), CodecError> {
        self.ensure(bits)?;
        self.position += bits;
        Ok(())
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining_bits(&self) -> usize {
        self.bytes.len() * 8 - self.position
    }

    fn ensure(&self, bits: usize) -> Result<(), CodecError> {
        let remaining = self.remaining_bits();
        if bits > remaining {
            return Err(CodecError::EndOfStream {
                needed: bits,
                remaining,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_widths_read_back_in_order() {
        let mut writer = BitWriter::new();
        writer.write(0b101, 3);
        writer.write(0xABCD, 16);
        writer.write_bool(true);
        writer.write(u64::MAX, 64);
        writer.write(0, 5);

        assert_eq!(writer.bit_len(), 89);
        assert_eq!(writer.byte_len(), 12);

        let mut reader = BitReader::new(writer.as_bytes());
        assert_eq!(reader.read(3).unwrap(), 0b101);
        assert_eq!(reader.read(16).unwrap(), 0xABCD);
        assert!(reader.read_bool().unwrap());
        assert_eq!(reader.read(64).unwrap(), u64::MAX);
        assert_eq!(reader.read(5).unwrap(), 0);
        assert_eq!(reader.remaining_bits(), 7);
    }

    #[test]
    fn write_masks_high_bits() {
        let mut writer = BitWriter::new();
        writer.write(0xFF, 4);
        writer.write(0, 4);
        assert_eq!(writer.as_bytes(), &[0x0F]);
    }

    #[test]
    fn append_is_bit_exact() {
        let mut record = BitWriter::new();
        record.write(0b1_0110_1101, 9);

        let mut message = BitWriter::new();
        message.write(0b11, 2);
        message.append(&record);
        message.append(&record);

        let mut reader = BitReader::new(message.as_bytes());
        assert_eq!(reader.read(2).unwrap(), 0b11);
        assert_eq!(reader.read(9).unwrap(), 0b1_0110_1101);
        assert_eq!(reader.read(9).unwrap(), 0b1_0110_1101);
        assert_eq!(message.bit_len(), 20);
    }

    #[test]
    fn truncated_read_is_an_error() {
        let bytes = [0xAAu8];
        let mut reader = BitReader::new(&bytes);
        reader.read(6).unwrap();

        let err = reader.read(4).unwrap_err();
        assert!(matches!(
            err,
            CodecError::EndOfStream {
                needed: 4,
                remaining: 2
            }
        ));
        assert!(reader.skip(3).is_err());
        assert!(reader.skip(2).is_ok());
    }
}
