//! JSON persistence format of a section. Separate from the network layout:
//! it keeps the palette mode, the dirty flag and the cached block count.

use log::trace;
use serde::{Deserialize, Serialize};

use crate::chunk::packed_array::PackedArray;
use crate::chunk::palette::{Palette, PaletteMode, PalettedContainer};
use crate::chunk::section::ChunkSection;
use crate::chunk::{BlockState, SECTION_VOLUME};
use crate::config::SectionConfig;
use crate::err::SectionError;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PackedArraySnapshot {
    pub data: Vec<u32>,
    pub bits_per_value: u8,
    pub capacity: usize,
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SectionSnapshot {
    pub version: u32,
    pub data: PackedArraySnapshot,
    /// `null` once the section stores global ids. Required, even though optional.
    #[serde(deserialize_with = "Option::deserialize")]
    pub palette: Option<Vec<BlockState>>,
    pub block_light: PackedArraySnapshot,
    pub sky_light: PackedArraySnapshot,
    pub solid_block_count: u16,
    pub is_dirty: bool,
}

impl From<&PackedArray> for PackedArraySnapshot {
    fn from(array: &PackedArray) -> Self {
        Self {
            data: array.words().to_vec(),
            bits_per_value: array.bits_per_value(),
            capacity: array.capacity(),
        }
    }
}

impl TryFrom<PackedArraySnapshot> for PackedArray {
    type Error = SectionError;

    fn try_from(snapshot: PackedArraySnapshot) -> Result<Self, Self::Error> {
        if snapshot.capacity != SECTION_VOLUME {
            return Err(SectionError::Deserialization(format!(
                "packed array capacity {} is not {SECTION_VOLUME}",
                snapshot.capacity
            )));
        }
        PackedArray::from_raw(snapshot.capacity, snapshot.bits_per_value, snapshot.data).map_err(|e| match e {
            SectionError::InvalidBitsPerValue(bits) => {
                SectionError::Deserialization(format!("invalid bits per value: {bits}"))
            }
            e => e,
        })
    }
}

impl From<&ChunkSection> for SectionSnapshot {
    fn from(section: &ChunkSection) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            data: section.block_states().data().into(),
            palette: section.palette().map(|p| p.to_vec()),
            block_light: section.block_light().into(),
            sky_light: section.sky_light().into(),
            solid_block_count: section.solid_block_count(),
            is_dirty: section.is_dirty(),
        }
    }
}

impl SectionSnapshot {
    pub fn into_section(self, config: SectionConfig) -> Result<ChunkSection, SectionError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(SectionError::Deserialization(format!(
                "unsupported snapshot version {}",
                self.version
            )));
        }
        if self.solid_block_count as usize > SECTION_VOLUME {
            return Err(SectionError::Deserialization(format!(
                "solid block count {} exceeds section volume",
                self.solid_block_count
            )));
        }
        let mode = match self.palette {
            Some(states) => PaletteMode::Indexed(Palette::from_states(states)?),
            None => PaletteMode::Global,
        };
        let block_states = PalettedContainer::from_parts(mode, self.data.try_into()?, config)?;
        let section = ChunkSection::from_parts(
            block_states,
            self.block_light.try_into()?,
            self.sky_light.try_into()?,
            Some(self.solid_block_count),
        )?;
        Ok(section.restore_dirty(self.is_dirty))
    }
}

impl ChunkSection {
    pub fn to_json(&self) -> Result<String, SectionError> {
        serde_json::to_string(&SectionSnapshot::from(self))
            .map_err(|e| SectionError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, SectionError> {
        Self::from_json_with_config(json, SectionConfig::default())
    }

    pub fn from_json_with_config(json: &str, config: SectionConfig) -> Result<Self, SectionError> {
        config.validate()?;
        let snapshot: SectionSnapshot = serde_json::from_str(json)?;
        let section = snapshot.into_section(config)?;
        trace!(
            "Restored section from snapshot: {} bits per block, {} solid blocks",
            section.bits_per_block(),
            section.solid_block_count()
        );
        Ok(section)
    }
}
