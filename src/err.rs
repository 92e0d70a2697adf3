use crate::protocol_types::compound::Position;

#[derive(Debug, thiserror::Error)]
pub enum SectionError {
    #[error("Index {index} out of range (capacity {capacity})")]
    IndexOutOfRange { index: usize, capacity: usize },
    #[error("Value {value} does not fit into {bits} bits")]
    ValueOutOfRange { value: u32, bits: u8 },
    #[error("Position {0:?} is outside of the section")]
    PositionOutOfBounds(Position),
    #[error("Invalid bits per value: {0}")]
    InvalidBitsPerValue(u8),
    #[error("Invalid section config: {0}")]
    InvalidConfig(String),
    #[error("Couldn't serialize section: {0}")]
    Serialization(String),
    #[error("Couldn't deserialize section: {0}")]
    Deserialization(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SectionError {
    /// Errors caused by corrupt input rather than a caller bug.
    pub fn is_data_error(&self) -> bool {
        match self {
            SectionError::Deserialization(_) | SectionError::Io(_) => true,
            SectionError::IndexOutOfRange { .. }
            | SectionError::ValueOutOfRange { .. }
            | SectionError::PositionOutOfBounds(_)
            | SectionError::InvalidBitsPerValue(_)
            | SectionError::InvalidConfig(_)
            | SectionError::Serialization(_) => false,
        }
    }
}

impl From<serde_json::Error> for SectionError {
    fn from(e: serde_json::Error) -> Self {
        SectionError::Deserialization(e.to_string())
    }
}
