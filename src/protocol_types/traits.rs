use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::err::SectionError;

#[async_trait]
pub trait ReadProt {
    async fn read(stream: &mut (impl AsyncRead + Unpin + Send)) -> Result<Self, SectionError>
    where
        Self: Sized;
}

#[async_trait]
pub trait WriteProt {
    async fn write(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), SectionError>;
}

pub trait SizedProt {
    fn prot_size(&self) -> usize;
}
