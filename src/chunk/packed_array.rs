use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::err::SectionError;
use crate::protocol_types::primitives::VarInt;
use crate::protocol_types::traits::{ReadProt, SizedProt, WriteProt};

const WORD_BITS: usize = u32::BITS as usize;

/// Fixed capacity array of `bits_per_value` wide unsigned integers, packed
/// without padding into 32 bit words. An entry may straddle two words.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackedArray {
    data: Vec<u32>,
    bits_per_value: u8,
    capacity: usize,
    value_mask: u32,
}

fn word_count(capacity: usize, bits_per_value: u8) -> usize {
    (capacity * bits_per_value as usize).div_ceil(WORD_BITS)
}

fn check_bits(bits_per_value: u8) -> Result<(), SectionError> {
    if bits_per_value == 0 || bits_per_value as usize > WORD_BITS {
        return Err(SectionError::InvalidBitsPerValue(bits_per_value));
    }
    Ok(())
}

impl PackedArray {
    pub fn new(capacity: usize, bits_per_value: u8) -> Result<Self, SectionError> {
        check_bits(bits_per_value)?;
        Ok(Self {
            data: vec![0; word_count(capacity, bits_per_value)],
            bits_per_value,
            capacity,
            value_mask: u32::MAX >> (WORD_BITS - bits_per_value as usize),
        })
    }

    /// Rebuilds an array from persisted words. The word count has to match
    /// `capacity` and `bits_per_value` exactly.
    pub fn from_raw(capacity: usize, bits_per_value: u8, data: Vec<u32>) -> Result<Self, SectionError> {
        let mut array = Self::new(capacity, bits_per_value)?;
        if data.len() != array.data.len() {
            return Err(SectionError::Deserialization(format!(
                "expected {} words for {} values of {} bits, got {}",
                array.data.len(),
                capacity,
                bits_per_value,
                data.len()
            )));
        }
        array.data = data;
        Ok(array)
    }

    fn check_index(&self, index: usize) -> Result<(), SectionError> {
        if index >= self.capacity {
            return Err(SectionError::IndexOutOfRange {
                index,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    pub fn get(&self, index: usize) -> Result<u32, SectionError> {
        self.check_index(index)?;
        let bit_offset = index * self.bits_per_value as usize;
        let word = bit_offset / WORD_BITS;
        let start = bit_offset % WORD_BITS;

        let mut value = self.data[word] >> start;
        if start + self.bits_per_value as usize > WORD_BITS {
            // start > 0 here, so the shift stays below 32
            value |= self.data[word + 1] << (WORD_BITS - start);
        }
        Ok(value & self.value_mask)
    }

    pub fn set(&mut self, index: usize, value: u32) -> Result<(), SectionError> {
        self.check_index(index)?;
        if value > self.value_mask {
            return Err(SectionError::ValueOutOfRange {
                value,
                bits: self.bits_per_value,
            });
        }
        let bit_offset = index * self.bits_per_value as usize;
        let word = bit_offset / WORD_BITS;
        let start = bit_offset % WORD_BITS;

        self.data[word] = (self.data[word] & !(self.value_mask << start)) | (value << start);
        if start + self.bits_per_value as usize > WORD_BITS {
            let shift = WORD_BITS - start;
            self.data[word + 1] = (self.data[word + 1] & !(self.value_mask >> shift)) | (value >> shift);
        }
        Ok(())
    }

    /// Copies every value into a new, wider array. The receiver is left untouched.
    pub fn resize_to(&self, bits_per_value: u8) -> Result<Self, SectionError> {
        if bits_per_value <= self.bits_per_value {
            return Err(SectionError::InvalidBitsPerValue(bits_per_value));
        }
        let mut resized = Self::new(self.capacity, bits_per_value)?;
        for i in 0..self.capacity {
            resized.set(i, self.get(i)?)?;
        }
        Ok(resized)
    }

    pub fn bits_per_value(&self) -> u8 {
        self.bits_per_value
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn max_value(&self) -> u32 {
        self.value_mask
    }

    /// Number of backing words.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn words(&self) -> &[u32] {
        &self.data
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.capacity).map(move |i| self.get(i).unwrap_or_default())
    }

    /// Writes the backing words without a length prefix.
    pub async fn write_words(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), SectionError> {
        for word in &self.data {
            word.write(stream).await?;
        }
        Ok(())
    }

    /// Reads exactly as many words as this array holds, replacing its contents.
    pub async fn read_words(&mut self, stream: &mut (impl AsyncRead + Unpin + Send)) -> Result<(), SectionError> {
        for word in self.data.iter_mut() {
            *word = u32::read(stream).await?;
        }
        Ok(())
    }
}

// word count as VarInt, followed by the words
#[async_trait]
impl WriteProt for PackedArray {
    async fn write(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), SectionError> {
        VarInt::from(self.data.len()).write(stream).await?;
        self.write_words(stream).await
    }
}

impl SizedProt for PackedArray {
    fn prot_size(&self) -> usize {
        VarInt::from(self.data.len()).prot_size() + self.data.len() * 4
    }
}
