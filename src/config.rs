use std::env;
use std::str::FromStr;

use dotenv::dotenv;
use log::debug;

use crate::err::SectionError;

pub const MAX_LOCAL_PALETTE_BITS: u8 = 8;
pub const GLOBAL_BITS_PER_BLOCK: u8 = 15;
pub const DEFAULT_BLOCK_BITS: u8 = 4;
pub const LIGHT_BITS: u8 = 4;

/// Widths used by a section when it allocates or migrates its packed arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionConfig {
    /// Widest palette index before the section switches to global ids.
    pub max_local_palette_bits: u8,
    /// Width of raw block state ids, sized to the block state registry.
    pub global_bits_per_block: u8,
    /// Width of the block array of a freshly created section.
    pub block_bits: u8,
    pub light_bits: u8,
}

impl Default for SectionConfig {
    fn default() -> Self {
        Self {
            max_local_palette_bits: MAX_LOCAL_PALETTE_BITS,
            global_bits_per_block: GLOBAL_BITS_PER_BLOCK,
            block_bits: DEFAULT_BLOCK_BITS,
            light_bits: LIGHT_BITS,
        }
    }
}

impl SectionConfig {
    /**
     * Reads overrides from the environment (and a `.env` file, if present).
     * Unset variables keep their defaults.
     */
    pub fn from_env() -> Result<Self, SectionError> {
        dotenv().ok();
        let defaults = Self::default();
        let config = Self {
            max_local_palette_bits: env_or("MAX_LOCAL_PALETTE_BITS", defaults.max_local_palette_bits)?,
            global_bits_per_block: env_or("GLOBAL_BITS_PER_BLOCK", defaults.global_bits_per_block)?,
            block_bits: env_or("DEFAULT_BLOCK_BITS", defaults.block_bits)?,
            light_bits: defaults.light_bits,
        };
        config.validate()?;
        debug!("Section config: {config:?}");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SectionError> {
        if self.block_bits == 0 || self.block_bits > self.max_local_palette_bits {
            return Err(SectionError::InvalidConfig(format!(
                "block_bits must be in 1..={}, got {}",
                self.max_local_palette_bits, self.block_bits
            )));
        }
        if self.global_bits_per_block <= self.max_local_palette_bits || self.global_bits_per_block > 32 {
            return Err(SectionError::InvalidConfig(format!(
                "global_bits_per_block must be in {}..=32, got {}",
                self.max_local_palette_bits as u16 + 1,
                self.global_bits_per_block
            )));
        }
        if self.light_bits != LIGHT_BITS {
            return Err(SectionError::InvalidConfig(format!(
                "light arrays are {} bits wide, got {}",
                LIGHT_BITS, self.light_bits
            )));
        }
        Ok(())
    }

    /// Whether an array of this width carries a local palette.
    pub fn is_local_width(&self, bits: u8) -> bool {
        bits <= self.max_local_palette_bits
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, SectionError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| SectionError::InvalidConfig(format!("{key} is not a number: {value}"))),
        Err(_) => Ok(default),
    }
}
