use std::f32::consts::FRAC_1_SQRT_2;

use glam::{Quat, Vec2, Vec3};

use super::varint::{block_bits, read_blocks, write_blocks, zigzag_decode, zigzag_encode};
use super::{BitReader, BitWriter, CodecError};

/// Quantizes a signed value to a multiple of `precision` and writes it as a zig-zag
/// block-varint, so values near zero are cheap.
#[derive(Debug, Clone, Copy)]
pub struct ScalarPacker {
    precision: f64,
    inverse_precision: f64,
    block_size: u32,
}

impl ScalarPacker {
    pub fn new(precision: f64, block_size: u32) -> Self {
        Self {
            precision,
            inverse_precision: 1.0 / precision,
            block_size,
        }
    }

    pub fn precision(&self) -> f64 {
        self.precision
    }

    pub fn pack(&self, writer: &mut BitWriter, value: f64) {
        let scaled = (value * self.inverse_precision).round() as i64;
        write_blocks(writer, zigzag_encode(scaled), self.block_size);
    }

    pub fn unpack(&self, reader: &mut BitReader<'_>) -> Result<f64, CodecError> {
        let scaled = zigzag_decode(read_blocks(reader, self.block_size)?);
        Ok(scaled as f64 * self.precision)
    }

    pub fn min_bits(&self) -> usize {
        block_bits(0, self.block_size)
    }

    pub fn max_bits(&self) -> usize {
        block_bits(u64::MAX, self.block_size)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Vec3Packer {
    axes: [ScalarPacker; 3],
}

impl Vec3Packer {
    pub fn new(precision: Vec3, block_size: u32) -> Self {
        Self {
            axes: [
                ScalarPacker::new(precision.x as f64, block_size),
                ScalarPacker::new(precision.y as f64, block_size),
                ScalarPacker::new(precision.z as f64, block_size),
            ],
        }
    }

    pub fn pack(&self, writer: &mut BitWriter, value: Vec3) {
        for (packer, component) in self.axes.iter().zip(value.to_array()) {
            packer.pack(writer, component as f64);
        }
    }

    pub fn unpack(&self, reader: &mut BitReader<'_>) -> Result<Vec3, CodecError> {
        Ok(Vec3::new(
            self.axes[0].unpack(reader)? as f32,
            self.axes[1].unpack(reader)? as f32,
            self.axes[2].unpack(reader)? as f32,
        ))
    }

    pub fn min_bits(&self) -> usize {
        self.axes.iter().map(ScalarPacker::min_bits).sum()
    }

    pub fn max_bits(&self) -> usize {
        self.axes.iter().map(ScalarPacker::max_bits).sum()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Vec2Packer {
    axes: [ScalarPacker; 2],
}

impl Vec2Packer {
    pub fn new(precision: Vec2, block_size: u32) -> Self {
        Self {
            axes: [
                ScalarPacker::new(precision.x as f64, block_size),
                ScalarPacker::new(precision.y as f64, block_size),
            ],
        }
    }

    pub fn pack(&self, writer: &mut BitWriter, value: Vec2) {
        self.axes[0].pack(writer, value.x as f64);
        self.axes[1].pack(writer, value.y as f64);
    }

    pub fn unpack(&self, reader: &mut BitReader<'_>) -> Result<Vec2, CodecError> {
        Ok(Vec2::new(
            self.axes[0].unpack(reader)? as f32,
            self.axes[1].unpack(reader)? as f32,
        ))
    }

    pub fn min_bits(&self) -> usize {
        self.axes.iter().map(ScalarPacker::min_bits).sum()
    }

    pub fn max_bits(&self) -> usize {
        self.axes.iter().map(ScalarPacker::max_bits).sum()
    }
}

/// Smallest-three rotation encoding: a 2 bit index of the largest component followed by
/// the other three components, each in `bits_per_component` bits.
#[derive(Debug, Clone, Copy)]
pub struct QuatPacker {
    bits_per_component: u32,
    max_value: f32,
}

impl QuatPacker {
    const INDEX_BITS: u32 = 2;

    pub fn new(bits_per_component: u32) -> Self {
        Self {
            bits_per_component,
            max_value: ((1u64 << bits_per_component) - 1) as f32,
        }
    }

    pub fn bit_count(&self) -> usize {
        (Self::INDEX_BITS + 3 * self.bits_per_component) as usize
    }

    pub fn pack(&self, writer: &mut BitWriter, value: Quat) {
        let value = if value.length_squared() > f32::EPSILON {
            value.normalize()
        } else {
            Quat::IDENTITY
        };

        let mut components = value.to_array();
        let largest = largest_index(&components);
        // q and -q are the same rotation; keep the dropped component positive
        if components[largest] < 0.0 {
            for component in &mut components {
                *component = -*component;
            }
        }

        writer.write(largest as u64, Self::INDEX_BITS);
        for (index, component) in components.iter().enumerate() {
            if index != largest {
                writer.write(self.quantize(*component), self.bits_per_component);
            }
        }
    }

    pub fn unpack(&self, reader: &mut BitReader<'_>) -> Result<Quat, CodecError> {
        let largest = reader.read(Self::INDEX_BITS)? as usize;

        let mut components = [0.0f32; 4];
        let mut sum_squares = 0.0;
        for (index, component) in components.iter_mut().enumerate() {
            if index != largest {
                *component = self.dequantize(reader.read(self.bits_per_component)?);
                sum_squares += *component * *component;
            }
        }
        components[largest] = (1.0 - sum_squares).max(0.0).sqrt();

        Ok(Quat::from_array(components).normalize())
    }

    fn quantize(&self, component: f32) -> u64 {
        let normalized = (component.clamp(-FRAC_1_SQRT_2, FRAC_1_SQRT_2) + FRAC_1_SQRT_2)
            / (2.0 * FRAC_1_SQRT_2);
        (normalized * self.max_value).round() as u64
    }

    fn dequantize(&self, quantized: u64) -> f32 {
        (quantized as f32 / self.max_value) * (2.0 * FRAC_1_SQRT_2) - FRAC_1_SQRT_2
    }
}

fn largest_index(components: &[f32; 4]) -> usize {
    let mut largest = 0;
    for index in 1..4 {
        if components[index].abs() > components[largest].abs() {
            largest = index;
        }
    }
    largest
}

/// Fixed-width angle in degrees, wrapped to `[0, 360)`.
#[derive(Debug, Clone, Copy)]
pub struct AnglePacker {
    bits: u32,
    steps: f32,
}

impl AnglePacker {
    pub fn new(bits: u32) -> Self {
        Self {
            bits,
            steps: (1u64 << bits) as f32,
        }
    }

    pub fn bit_count(&self) -> usize {
        self.bits as usize
    }

    pub fn pack(&self, writer: &mut BitWriter, degrees: f32) {
        let wrapped = degrees.rem_euclid(360.0);
        let quantized = ((wrapped / 360.0) * self.steps).round() as u64 % (1u64 << self.bits);
        writer.write(quantized, self.bits);
    }

    pub fn unpack(&self, reader: &mut BitReader<'_>) -> Result<f32, CodecError> {
        Ok(reader.read(self.bits)? as f32 / self.steps * 360.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip_scalar(packer: &ScalarPacker, value: f64) -> f64 {
        let mut writer = BitWriter::new();
        packer.pack(&mut writer, value);
        packer.unpack(&mut BitReader::new(writer.as_bytes())).unwrap()
    }

    #[test]
    fn scalar_error_is_bounded_by_half_precision() {
        let packer = ScalarPacker::new(0.01, 5);
        for value in [0.0, 0.004, -0.004, 0.005, 12.3456, -999.999, 54_000.123] {
            let decoded = round_trip_scalar(&packer, value);
            assert!(
                (decoded - value).abs() <= 0.005 + 1e-9,
                "{value} decoded as {decoded}"
            );
        }
    }

    #[test]
    fn time_precision_holds_for_a_month() {
        let packer = ScalarPacker::new(1.0 / 10_000.0, 5);
        let mut time = 0.0;
        while time < 3600.0 * 24.0 * 30.0 {
            let decoded = round_trip_scalar(&packer, time);
            assert!((decoded - time).abs() <= 1.0 / 10_000.0);
            time += 1000.123_4;
        }
    }

    #[test]
    fn per_axis_precision() {
        let packer = Vec3Packer::new(Vec3::new(0.1, 0.001, 0.1), 5);
        let value = Vec3::new(1.234, 1.234, -1.234);

        let mut writer = BitWriter::new();
        packer.pack(&mut writer, value);
        let decoded = packer.unpack(&mut BitReader::new(writer.as_bytes())).unwrap();

        assert!((decoded.x - 1.2).abs() < 1e-5);
        assert!((decoded.y - 1.234).abs() < 1e-5);
        assert!((decoded.z + 1.2).abs() < 1e-5);
    }

    #[test]
    fn quaternion_round_trip_stays_close() {
        let packer = QuatPacker::new(10);
        let rotations = [
            Quat::IDENTITY,
            Quat::from_rotation_y(std::f32::consts::FRAC_PI_4),
            Quat::from_rotation_x(-2.5),
            Quat::from_euler(glam::EulerRot::YXZ, 1.0, -0.3, 2.9),
            -Quat::from_rotation_z(0.7),
        ];

        for rotation in rotations {
            let mut writer = BitWriter::new();
            packer.pack(&mut writer, rotation);
            assert_eq!(writer.bit_len(), 32);

            let decoded = packer.unpack(&mut BitReader::new(writer.as_bytes())).unwrap();
            assert!((decoded.length() - 1.0).abs() < 1e-5);
            assert!(
                rotation.angle_between(decoded).to_degrees() < 0.5,
                "{rotation:?} decoded as {decoded:?}"
            );
        }
    }

    #[test]
    fn angle_wraps_into_range() {
        let packer = AnglePacker::new(12);
        for (input, expected) in [(0.0, 0.0), (90.0, 90.0), (-90.0, 270.0), (725.0, 5.0)] {
            let mut writer = BitWriter::new();
            packer.pack(&mut writer, input);
            let decoded = packer.unpack(&mut BitReader::new(writer.as_bytes())).unwrap();
            assert!((decoded - expected).abs() < 0.1, "{input} -> {decoded}");
        }

        let mut writer = BitWriter::new();
        packer.pack(&mut writer, 359.99);
        let decoded = packer.unpack(&mut BitReader::new(writer.as_bytes())).unwrap();
        assert!(decoded < 0.1);
    }
}
