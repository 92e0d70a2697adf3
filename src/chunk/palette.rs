use std::fmt::Debug;

use async_trait::async_trait;
use log::debug;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::chunk::packed_array::PackedArray;
use crate::chunk::{needed_bits, BlockState, AIR, SECTION_VOLUME};
use crate::config::SectionConfig;
use crate::err::SectionError;
use crate::protocol_types::primitives::VarInt;
use crate::protocol_types::traits::{ReadProt, SizedProt, WriteProt};

/// Insertion ordered table of the block states used by one section.
/// Palettes created here start with air at index 0.
#[derive(Clone, PartialEq, Eq)]
pub struct Palette {
    states: Vec<BlockState>,
}

impl Palette {
    pub fn new() -> Self {
        Self { states: vec![AIR] }
    }

    /// Accepts any non-empty list of states without duplicates. Index 0 is
    /// not required to be air: palettes read off the wire come from other
    /// encoders, and empty-cell counting goes through `resolve`, never the
    /// raw index.
    pub fn from_states(states: Vec<BlockState>) -> Result<Self, SectionError> {
        if states.is_empty() {
            return Err(SectionError::Deserialization("empty palette".into()));
        }
        for (i, state) in states.iter().enumerate() {
            if states[..i].contains(state) {
                return Err(SectionError::Deserialization(format!(
                    "duplicate palette entry {state}"
                )));
            }
        }
        Ok(Self { states })
    }

    pub fn index_of(&self, state: BlockState) -> Option<u32> {
        self.states.iter().position(|s| *s == state).map(|i| i as u32)
    }

    /// Appends a state and returns its index. Does not check for duplicates.
    fn push(&mut self, state: BlockState) -> u32 {
        self.states.push(state);
        (self.states.len() - 1) as u32
    }

    /// Translates a stored index. Indices past the end of the palette are
    /// returned unchanged instead of failing.
    pub fn resolve(&self, index: u32) -> BlockState {
        self.states.get(index as usize).copied().unwrap_or(index)
    }

    pub fn states(&self) -> &[BlockState] {
        &self.states
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WriteProt for Palette {
    async fn write(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), SectionError> {
        VarInt::from(self.len()).write(stream).await?;
        for state in &self.states {
            VarInt::from(*state).write(stream).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ReadProt for Palette {
    async fn read(stream: &mut (impl AsyncRead + Unpin + Send)) -> Result<Self, SectionError> {
        let len = VarInt::read(stream).await?.as_u32() as usize;
        // a local palette can never outgrow the section
        if len > SECTION_VOLUME {
            return Err(SectionError::Deserialization(format!("palette too long: {len}")));
        }
        let mut states = Vec::with_capacity(len);
        for _ in 0..len {
            states.push(VarInt::read(stream).await?.as_u32());
        }
        Self::from_states(states)
    }
}

impl SizedProt for Palette {
    fn prot_size(&self) -> usize {
        VarInt::from(self.len()).prot_size()
            + self
                .states
                .iter()
                .map(|s| VarInt::from(*s).prot_size())
                .sum::<usize>()
    }
}

impl Debug for Palette {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Palette{:?}", self.states)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaletteMode {
    /// The data array holds indices into the palette.
    Indexed(Palette),
    /// The data array holds block states directly.
    Global,
}

/// Block data of a section: the packed array plus how to interpret it.
#[derive(Clone, Debug)]
pub struct PalettedContainer {
    mode: PaletteMode,
    data: PackedArray,
    config: SectionConfig,
}

impl PalettedContainer {
    pub fn new(config: SectionConfig) -> Result<Self, SectionError> {
        Ok(Self {
            mode: PaletteMode::Indexed(Palette::new()),
            data: PackedArray::new(SECTION_VOLUME, config.block_bits)?,
            config,
        })
    }

    /// Pairs restored data with a mode. Indexed data has to be narrow enough
    /// for a local palette and global data wide enough for the configured ids.
    pub fn from_parts(mode: PaletteMode, data: PackedArray, config: SectionConfig) -> Result<Self, SectionError> {
        if data.capacity() != SECTION_VOLUME {
            return Err(SectionError::Deserialization(format!(
                "block data holds {} values, expected {}",
                data.capacity(),
                SECTION_VOLUME
            )));
        }
        let bits = data.bits_per_value();
        let fits = match &mode {
            PaletteMode::Indexed(_) => config.is_local_width(bits),
            PaletteMode::Global => !config.is_local_width(bits),
        };
        if !fits {
            return Err(SectionError::Deserialization(format!(
                "{bits} bits per block don't match palette mode {}",
                if matches!(mode, PaletteMode::Global) { "global" } else { "indexed" }
            )));
        }
        Ok(Self { mode, data, config })
    }

    /// A container where every cell holds `state`.
    pub fn filled(state: BlockState, config: SectionConfig) -> Result<Self, SectionError> {
        let mut container = Self::new(config)?;
        if state != AIR {
            let mut palette = Palette::new();
            let index = palette.push(state);
            for i in 0..SECTION_VOLUME {
                container.data.set(i, index)?;
            }
            container.mode = PaletteMode::Indexed(palette);
        }
        Ok(container)
    }

    pub fn get(&self, index: usize) -> Result<BlockState, SectionError> {
        let raw = self.data.get(index)?;
        Ok(match &self.mode {
            PaletteMode::Indexed(palette) => palette.resolve(raw),
            PaletteMode::Global => raw,
        })
    }

    /// Stores `state` at `index`, growing the palette, widening the data
    /// array or switching to global ids as needed. On error the palette,
    /// mode and data are left as they were.
    pub fn set(&mut self, index: usize, state: BlockState) -> Result<(), SectionError> {
        self.data.get(index)?;
        let value = match &mut self.mode {
            PaletteMode::Global => state,
            PaletteMode::Indexed(palette) => match palette.index_of(state) {
                Some(palette_index) => palette_index,
                None => {
                    // the palette only grows once every fallible step has passed
                    let bits = needed_bits(palette.len() as u32);
                    if bits <= self.data.bits_per_value() {
                        palette.push(state)
                    } else if self.config.is_local_width(bits) {
                        debug!(
                            "Resizing block data from {} to {} bits ({} palette entries)",
                            self.data.bits_per_value(),
                            bits,
                            palette.len() + 1
                        );
                        self.data = self.data.resize_to(bits)?;
                        palette.push(state)
                    } else {
                        debug!(
                            "Palette with {} entries exceeds {} bits, switching to global ids",
                            palette.len() + 1,
                            self.config.max_local_palette_bits
                        );
                        let mut global = PackedArray::new(SECTION_VOLUME, self.config.global_bits_per_block)?;
                        if state > global.max_value() {
                            return Err(SectionError::ValueOutOfRange {
                                value: state,
                                bits: global.bits_per_value(),
                            });
                        }
                        for i in 0..SECTION_VOLUME {
                            global.set(i, palette.resolve(self.data.get(i)?))?;
                        }
                        self.data = global;
                        self.mode = PaletteMode::Global;
                        state
                    }
                }
            },
        };
        self.data.set(index, value)
    }

    pub fn mode(&self) -> &PaletteMode {
        &self.mode
    }

    pub fn palette(&self) -> Option<&Palette> {
        match &self.mode {
            PaletteMode::Indexed(palette) => Some(palette),
            PaletteMode::Global => None,
        }
    }

    pub fn data(&self) -> &PackedArray {
        &self.data
    }

    pub fn bits_per_value(&self) -> u8 {
        self.data.bits_per_value()
    }

    pub fn config(&self) -> &SectionConfig {
        &self.config
    }
}

#[async_trait]
impl WriteProt for PalettedContainer {
    async fn write(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), SectionError> {
        self.data.bits_per_value().write(stream).await?;
        if let PaletteMode::Indexed(palette) = &self.mode {
            palette.write(stream).await?;
        }
        self.data.write(stream).await // word array
    }
}

impl SizedProt for PalettedContainer {
    fn prot_size(&self) -> usize {
        1 + self.palette().map_or(0, |p| p.prot_size()) + self.data.prot_size()
    }
}

impl PalettedContainer {
    /// Reads the layout produced by `write`. Whether a palette follows the
    /// bits-per-value byte is decided by `config`.
    pub async fn read(
        stream: &mut (impl AsyncRead + Unpin + Send),
        config: SectionConfig,
    ) -> Result<Self, SectionError> {
        let bits = u8::read(stream).await?;
        let mode = if config.is_local_width(bits) {
            PaletteMode::Indexed(Palette::read(stream).await?)
        } else {
            PaletteMode::Global
        };
        let mut data = PackedArray::new(SECTION_VOLUME, bits)
            .map_err(|_| SectionError::Deserialization(format!("invalid bits per block: {bits}")))?;
        let words = VarInt::read(stream).await?.as_u32() as usize;
        if words != data.len() {
            return Err(SectionError::Deserialization(format!(
                "expected {} data words for {bits} bits per block, got {words}",
                data.len()
            )));
        }
        data.read_words(stream).await?;
        Self::from_parts(mode, data, config)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_palette() {
        let mut palette = Palette::new();
        assert_eq!(palette.index_of(0), Some(0));
        assert_eq!(palette.index_of(1), None);
        assert_eq!(palette.push(1), 1);
        assert_eq!(palette.push(2), 2);
        assert_eq!(palette.index_of(1), Some(1));
        assert_eq!(palette.index_of(2), Some(2));
        assert_eq!(palette.states(), &[0, 1, 2]);
    }

    #[test]
    fn resolve_past_end_returns_index() {
        let palette = Palette::from_states(vec![0, 9]).unwrap();
        assert_eq!(palette.resolve(1), 9);
        assert_eq!(palette.resolve(5), 5);
    }

    #[test]
    fn from_states_rejects_bad_palettes() {
        assert!(Palette::from_states(vec![]).is_err());
        assert!(Palette::from_states(vec![0, 3, 3]).is_err());
    }

    #[test]
    fn set_block_get_block() {
        let mut container = PalettedContainer::new(SectionConfig::default()).unwrap();
        container.set(0, 1).unwrap();
        assert_eq!(container.get(0).unwrap(), 1);
        container.set(0, 2).unwrap();
        assert_eq!(container.get(0).unwrap(), 2);
        container.set(0, 0).unwrap();
        assert_eq!(container.get(0).unwrap(), 0);
        assert_eq!(container.palette().unwrap().states(), &[0, 1, 2]);
    }

    #[test]
    fn grows_then_goes_global() {
        let mut container = PalettedContainer::new(SectionConfig::default()).unwrap();
        for state in 1..=15u32 {
            container.set(state as usize, state).unwrap();
        }
        assert_eq!(container.bits_per_value(), 4);
        container.set(16, 16).unwrap();
        assert_eq!(container.bits_per_value(), 5);
        for state in 17..=255u32 {
            container.set(state as usize, state).unwrap();
        }
        assert_eq!(container.bits_per_value(), 8);
        assert_eq!(container.palette().unwrap().len(), 256);

        container.set(256, 1000).unwrap();
        assert_eq!(container.mode(), &PaletteMode::Global);
        assert_eq!(container.bits_per_value(), 15);
        for i in 0..=255usize {
            assert_eq!(container.get(i).unwrap(), i as u32);
        }
        assert_eq!(container.get(256).unwrap(), 1000);
        assert_eq!(container.get(4095).unwrap(), 0);
    }

    #[test]
    fn global_rejects_oversized_state() {
        let mut container =
            PalettedContainer::from_parts(PaletteMode::Global, PackedArray::new(SECTION_VOLUME, 15).unwrap(), SectionConfig::default())
                .unwrap();
        assert!(matches!(
            container.set(0, 1 << 15),
            Err(SectionError::ValueOutOfRange { bits: 15, .. })
        ));
    }

    #[test]
    fn restored_palette_may_start_with_non_air() {
        let palette = Palette::from_states(vec![7, 0]).unwrap();
        let container = PalettedContainer::from_parts(
            PaletteMode::Indexed(palette),
            PackedArray::new(SECTION_VOLUME, 4).unwrap(),
            SectionConfig::default(),
        )
        .unwrap();
        assert_eq!(container.get(0).unwrap(), 7);
    }

    fn with_oversized_entry() -> PalettedContainer {
        // 40_000 fits a local palette but not the 15 bit global ids
        let mut container = PalettedContainer::new(SectionConfig::default()).unwrap();
        container.set(0, 40_000).unwrap();
        for state in 1..=254u32 {
            container.set(state as usize, state).unwrap();
        }
        assert_eq!(container.palette().unwrap().len(), 256);
        assert_eq!(container.bits_per_value(), 8);
        container
    }

    #[test]
    fn failed_global_switch_leaves_container_untouched() {
        let mut container = with_oversized_entry();
        let before = container.clone();

        assert!(matches!(
            container.set(300, 500),
            Err(SectionError::ValueOutOfRange { value: 40_000, bits: 15 })
        ));
        assert_eq!(container.mode(), before.mode());
        assert_eq!(container.data(), before.data());
        assert_eq!(container.palette().unwrap().index_of(500), None);

        // retrying fails the same way instead of on a stale palette index
        assert!(matches!(
            container.set(301, 500),
            Err(SectionError::ValueOutOfRange { value: 40_000, bits: 15 })
        ));
        assert_eq!(container.palette().unwrap().len(), 256);
        container.set(302, 3).unwrap();
        assert_eq!(container.get(302).unwrap(), 3);
    }

    #[test]
    fn bad_index_does_not_grow_palette() {
        let mut container = PalettedContainer::new(SectionConfig::default()).unwrap();
        assert!(matches!(
            container.set(SECTION_VOLUME, 9),
            Err(SectionError::IndexOutOfRange { .. })
        ));
        assert_eq!(container.palette().unwrap().states(), &[0]);
    }

    #[test]
    fn oversized_state_does_not_trigger_global_switch() {
        let mut container = PalettedContainer::new(SectionConfig::default()).unwrap();
        for state in 1..=255u32 {
            container.set(state as usize, state).unwrap();
        }
        let before = container.clone();
        assert!(matches!(
            container.set(300, 1 << 15),
            Err(SectionError::ValueOutOfRange { value: 32768, bits: 15 })
        ));
        assert_eq!(container.mode(), before.mode());
        assert_eq!(container.data(), before.data());
        container.set(300, 1000).unwrap();
        assert_eq!(container.mode(), &PaletteMode::Global);
        assert_eq!(container.get(255).unwrap(), 255);
    }

    #[test]
    fn from_parts_checks_width_against_mode() {
        let config = SectionConfig::default();
        let wide = PackedArray::new(SECTION_VOLUME, 15).unwrap();
        let narrow = PackedArray::new(SECTION_VOLUME, 4).unwrap();
        assert!(PalettedContainer::from_parts(PaletteMode::Indexed(Palette::new()), wide, config).is_err());
        assert!(PalettedContainer::from_parts(PaletteMode::Global, narrow.clone(), config).is_err());
        assert!(PalettedContainer::from_parts(PaletteMode::Indexed(Palette::new()), narrow, config).is_ok());
        let short = PackedArray::new(16, 4).unwrap();
        assert!(PalettedContainer::from_parts(PaletteMode::Indexed(Palette::new()), short, config).is_err());
    }

    #[test]
    fn filled() {
        let container = PalettedContainer::filled(7, SectionConfig::default()).unwrap();
        assert_eq!(container.palette().unwrap().states(), &[0, 7]);
        assert!((0..SECTION_VOLUME).all(|i| container.get(i).unwrap() == 7));
        let air = PalettedContainer::filled(AIR, SectionConfig::default()).unwrap();
        assert_eq!(air.palette().unwrap().states(), &[0]);
    }

    #[tokio::test]
    async fn write_then_read() -> Result<(), SectionError> {
        let config = SectionConfig::default();
        let mut container = PalettedContainer::new(config)?;
        container.set(3, 300)?;
        container.set(4000, 2)?;
        let mut buf: Vec<u8> = vec![];
        container.write(&mut buf).await?;
        assert_eq!(buf.len(), container.prot_size());
        // bits, palette [0, 300, 2], word count 512
        assert_eq!(&buf[..7], &[4, 3, 0, 0xac, 0x02, 2, 0x80]);
        assert_eq!(buf[7], 0x04);

        let read = PalettedContainer::read(&mut buf.as_slice(), config).await?;
        assert_eq!(read.mode(), container.mode());
        assert_eq!(read.data(), container.data());
        Ok(())
    }

    #[tokio::test]
    async fn read_rejects_wrong_word_count() {
        let mut buf: Vec<u8> = vec![4, 1, 0];
        VarInt::from(10usize).write(&mut buf).await.unwrap();
        buf.extend(std::iter::repeat(0).take(40));
        let res = PalettedContainer::read(&mut buf.as_slice(), SectionConfig::default()).await;
        assert!(matches!(res, Err(SectionError::Deserialization(_))));
    }
}
