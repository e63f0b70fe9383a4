mod bits;
mod packers;
mod state_codec;
pub mod varint;

pub use bits::{BitReader, BitWriter};
pub use packers::{AnglePacker, QuatPacker, ScalarPacker, Vec2Packer, Vec3Packer};
pub use state_codec::{RecordHeader, StateCodec};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("stream truncated: needed {needed} bits, {remaining} remaining")]
    EndOfStream { needed: usize, remaining: usize },
    #[error("block-varint with block size {block_size} does not terminate within 64 bits")]
    VarIntOverflow { block_size: u32 },
    #[error("entity id {0} does not fit in 32 bits")]
    IdOutOfRange(u64),
    #[error("payload length mismatch: header says {expected} bits, payload used {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}
