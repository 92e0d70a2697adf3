//! Paletted, bit-packed storage for one 16x16x16 section of block states and
//! light, plus its network and JSON encodings.

pub mod chunk;
pub mod config;
pub mod err;
pub mod protocol_types;

pub use chunk::packed_array::PackedArray;
pub use chunk::palette::{Palette, PaletteMode, PalettedContainer};
pub use chunk::section::ChunkSection;
pub use chunk::snapshot::SectionSnapshot;
pub use config::SectionConfig;
pub use err::SectionError;
pub use protocol_types::compound::Position;
