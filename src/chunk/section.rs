use async_trait::async_trait;
use log::trace;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::chunk::packed_array::PackedArray;
use crate::chunk::palette::{PaletteMode, PalettedContainer};
use crate::chunk::{block_index, BlockState, AIR, SECTION_VOLUME};
use crate::config::SectionConfig;
use crate::err::SectionError;
use crate::protocol_types::compound::Position;
use crate::protocol_types::traits::{SizedProt, WriteProt};

/// One 16x16x16 slice of a chunk column: block states plus block and sky light.
#[derive(Clone, Debug)]
pub struct ChunkSection {
    block_states: PalettedContainer,
    block_light: PackedArray,
    sky_light: PackedArray,
    solid_block_count: u16,
    is_dirty: bool,
}

impl ChunkSection {
    /// An all-air, unlit section.
    pub fn new(config: SectionConfig) -> Result<Self, SectionError> {
        config.validate()?;
        Ok(Self {
            block_states: PalettedContainer::new(config)?,
            block_light: PackedArray::new(SECTION_VOLUME, config.light_bits)?,
            sky_light: PackedArray::new(SECTION_VOLUME, config.light_bits)?,
            solid_block_count: 0,
            is_dirty: false,
        })
    }

    /**
     * Assembles a section from restored parts. Without a `solid_block_count`
     * the count is rebuilt by scanning every cell.
     */
    pub fn from_parts(
        block_states: PalettedContainer,
        block_light: PackedArray,
        sky_light: PackedArray,
        solid_block_count: Option<u16>,
    ) -> Result<Self, SectionError> {
        let config = *block_states.config();
        for (name, light) in [("block", &block_light), ("sky", &sky_light)] {
            if light.capacity() != SECTION_VOLUME || light.bits_per_value() != config.light_bits {
                return Err(SectionError::Deserialization(format!(
                    "{name} light must hold {SECTION_VOLUME} values of {} bits",
                    config.light_bits
                )));
            }
        }
        let mut section = Self {
            block_states,
            block_light,
            sky_light,
            solid_block_count: 0,
            is_dirty: false,
        };
        section.solid_block_count = match solid_block_count {
            Some(count) => count,
            None => section.count_solid_blocks()?,
        };
        Ok(section)
    }

    fn count_solid_blocks(&self) -> Result<u16, SectionError> {
        let mut count = 0;
        for i in 0..SECTION_VOLUME {
            if self.block_states.get(i)? != AIR {
                count += 1;
            }
        }
        Ok(count)
    }

    pub fn get_block(&self, pos: Position) -> Result<BlockState, SectionError> {
        self.block_states.get(block_index(pos)?)
    }

    pub fn set_block(&mut self, pos: Position, state: BlockState) -> Result<(), SectionError> {
        let index = block_index(pos)?;
        let old = self.block_states.get(index)?;
        self.block_states.set(index, state)?;
        if state == AIR && old != AIR {
            self.solid_block_count = self.solid_block_count.saturating_sub(1);
        } else if state != AIR && old == AIR {
            self.solid_block_count = self.solid_block_count.saturating_add(1);
        }
        Ok(())
    }

    /// Replaces every block with `state`. Light is left as is.
    pub fn fill(&mut self, state: BlockState) -> Result<(), SectionError> {
        let config = *self.block_states.config();
        self.block_states = PalettedContainer::filled(state, config)?;
        self.solid_block_count = if state == AIR { 0 } else { SECTION_VOLUME as u16 };
        Ok(())
    }

    pub fn get_block_light(&self, pos: Position) -> Result<u8, SectionError> {
        Ok(self.block_light.get(block_index(pos)?)? as u8)
    }

    pub fn get_sky_light(&self, pos: Position) -> Result<u8, SectionError> {
        Ok(self.sky_light.get(block_index(pos)?)? as u8)
    }

    pub fn set_block_light(&mut self, pos: Position, light: u8) -> Result<(), SectionError> {
        self.block_light.set(block_index(pos)?, light as u32)
    }

    pub fn set_sky_light(&mut self, pos: Position, light: u8) -> Result<(), SectionError> {
        self.sky_light.set(block_index(pos)?, light as u32)
    }

    pub fn is_empty(&self) -> bool {
        self.solid_block_count == 0
    }

    pub fn solid_block_count(&self) -> u16 {
        self.solid_block_count
    }

    pub fn bits_per_block(&self) -> u8 {
        self.block_states.bits_per_value()
    }

    /// The local palette, `None` once the section stores global ids.
    pub fn palette(&self) -> Option<&[BlockState]> {
        self.block_states.palette().map(|p| p.states())
    }

    pub fn mode(&self) -> &PaletteMode {
        self.block_states.mode()
    }

    pub fn block_states(&self) -> &PalettedContainer {
        &self.block_states
    }

    pub fn block_light(&self) -> &PackedArray {
        &self.block_light
    }

    pub fn sky_light(&self) -> &PackedArray {
        &self.sky_light
    }

    /// Never set by the section itself; owners use it to track unsaved changes.
    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    pub fn set_dirty(&mut self, dirty: bool) {
        self.is_dirty = dirty;
    }

    /// Parses the network layout written by [`WriteProt::write`].
    pub async fn read(
        stream: &mut (impl AsyncRead + Unpin + Send),
        config: SectionConfig,
    ) -> Result<Self, SectionError> {
        config.validate()?;
        let block_states = PalettedContainer::read(stream, config).await?;
        let mut block_light = PackedArray::new(SECTION_VOLUME, config.light_bits)?;
        block_light.read_words(stream).await?;
        let mut sky_light = PackedArray::new(SECTION_VOLUME, config.light_bits)?;
        sky_light.read_words(stream).await?;
        let section = Self::from_parts(block_states, block_light, sky_light, None)?;
        trace!(
            "Read section: {} bits per block, {} solid blocks",
            section.bits_per_block(),
            section.solid_block_count
        );
        Ok(section)
    }

    pub(crate) fn restore_dirty(mut self, is_dirty: bool) -> Self {
        self.is_dirty = is_dirty;
        self
    }
}

// bits per block, palette (indexed only), block data, block light, sky light
#[async_trait]
impl WriteProt for ChunkSection {
    async fn write(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), SectionError> {
        self.block_states.write(stream).await?;
        self.block_light.write_words(stream).await?;
        self.sky_light.write_words(stream).await?;
        Ok(())
    }
}

impl SizedProt for ChunkSection {
    fn prot_size(&self) -> usize {
        self.block_states.prot_size() + (self.block_light.len() + self.sky_light.len()) * 4
    }
}
