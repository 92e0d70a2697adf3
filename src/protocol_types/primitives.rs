use std::fmt::{Debug, Display, Formatter};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::err::SectionError;
use crate::protocol_types::traits::{ReadProt, SizedProt, WriteProt};

const SEGMENT_BITS: u8 = 0x7f;
const CONTINUE_BIT: u8 = 0x80;

/// LEB128-style variable length integer. Negative values are encoded via their
/// unsigned 32 bit representation, so every value takes at most five bytes.
#[derive(Ord, PartialOrd, Eq, PartialEq, Clone, Copy)]
pub struct VarInt {
    pub value: i32,
}

impl VarInt {
    pub fn as_u32(&self) -> u32 {
        self.value as u32
    }
}

impl From<usize> for VarInt {
    fn from(value: usize) -> Self {
        Self {
            value: value as i32,
        }
    }
}

impl From<u32> for VarInt {
    fn from(value: u32) -> Self {
        Self {
            value: value as i32,
        }
    }
}

impl From<i32> for VarInt {
    fn from(value: i32) -> Self {
        Self { value }
    }
}

impl Display for VarInt {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl Debug for VarInt {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

#[async_trait]
impl ReadProt for VarInt {
    async fn read(stream: &mut (impl AsyncRead + Unpin + Send)) -> Result<Self, SectionError> {
        let mut value: u32 = 0;
        let mut pos: u32 = 0;
        loop {
            let current_byte = stream.read_u8().await?;
            value |= ((current_byte & SEGMENT_BITS) as u32) << pos;
            if current_byte & CONTINUE_BIT == 0 {
                return Ok(Self {
                    value: value as i32,
                });
            }
            pos += 7;
            if pos >= 35 {
                return Err(SectionError::Deserialization("VarInt is too big".into()));
            }
        }
    }
}

impl SizedProt for VarInt {
    fn prot_size(&self) -> usize {
        let mut x = self.value as u32;
        let mut count = 0;
        loop {
            x >>= 7;
            count += 1;

            if x == 0 {
                break count;
            }
        }
    }
}

#[async_trait]
impl WriteProt for VarInt {
    async fn write(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), SectionError> {
        let mut x = self.value as u32;
        loop {
            let mut temp = (x & 0b0111_1111) as u8;
            x >>= 7;
            if x != 0 {
                temp |= 0b1000_0000;
            }

            stream.write_all(&[temp]).await?;

            if x == 0 {
                break;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ReadProt for u8 {
    async fn read(stream: &mut (impl AsyncRead + Unpin + Send)) -> Result<Self, SectionError>
    where
        Self: Sized,
    {
        Ok(stream.read_u8().await?)
    }
}

#[async_trait]
impl WriteProt for u8 {
    async fn write(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), SectionError> {
        stream.write_all(&[*self]).await?;
        Ok(())
    }
}

impl SizedProt for u8 {
    fn prot_size(&self) -> usize {
        1
    }
}

#[inline]
fn u32tou8abe(v: u32) -> [u8; 4] {
    [(v >> 24) as u8, (v >> 16) as u8, (v >> 8) as u8, v as u8]
}

// u32 is always big-endian on the wire
#[async_trait]
impl ReadProt for u32 {
    async fn read(stream: &mut (impl AsyncRead + Unpin + Send)) -> Result<Self, SectionError>
    where
        Self: Sized,
    {
        let mut buffer = [0; 4];
        stream.read_exact(&mut buffer).await?;
        let mut value: u32 = buffer[0] as u32;
        value <<= 8;
        value |= buffer[1] as u32;
        value <<= 8;
        value |= buffer[2] as u32;
        value <<= 8;
        value |= buffer[3] as u32;
        Ok(value)
    }
}

#[async_trait]
impl WriteProt for u32 {
    async fn write(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), SectionError> {
        stream.write_all(&u32tou8abe(*self)).await?;
        Ok(())
    }
}

impl SizedProt for u32 {
    fn prot_size(&self) -> usize {
        4
    }
}
