//! Readable-body union and normalizer.
//!
//! Backends hand back whatever their transport naturally produces: the
//! local backend an in-memory buffer, the S3 backend the SDK's streaming
//! body, tests or adapters a generic async chunk stream. Downstream code
//! sees exactly one type, [`ObjectBody`], and only this module inspects
//! the variant. The union is closed, so an "unsupported body type" is
//! unrepresentable rather than a runtime error.

use aws_sdk_s3::primitives::ByteStream;
use bytes::{Bytes, BytesMut};
use futures::stream::BoxStream;
use futures::StreamExt;

use crate::error::{Result, StorageError};

/// One readable representation for every backend.
pub enum ObjectBody {
    /// Fully materialized bytes.
    Bytes(Bytes),
    /// AWS SDK streaming body, pulled lazily off the network.
    Remote(ByteStream),
    /// Generic async chunk stream.
    Stream(BoxStream<'static, std::io::Result<Bytes>>),
}

impl ObjectBody {
    /// Materialize the whole body in memory.
    ///
    /// Decryption needs the entire envelope, so the facade calls this
    /// before the codec runs. Plaintext reads may keep the body as a
    /// forward-only stream instead.
    pub async fn into_bytes(self) -> Result<Bytes> {
        match self {
            ObjectBody::Bytes(bytes) => Ok(bytes),
            ObjectBody::Remote(stream) => {
                let aggregated = stream
                    .collect()
                    .await
                    .map_err(|e| StorageError::Unavailable(e.to_string()))?;
                Ok(aggregated.into_bytes())
            }
            ObjectBody::Stream(mut stream) => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok(buf.freeze())
            }
        }
    }

    /// Size of the body if known without pulling it.
    pub fn len_hint(&self) -> Option<u64> {
        match self {
            ObjectBody::Bytes(bytes) => Some(bytes.len() as u64),
            _ => None,
        }
    }
}

impl From<Bytes> for ObjectBody {
    fn from(bytes: Bytes) -> Self {
        ObjectBody::Bytes(bytes)
    }
}

impl From<Vec<u8>> for ObjectBody {
    fn from(bytes: Vec<u8>) -> Self {
        ObjectBody::Bytes(Bytes::from(bytes))
    }
}

impl From<ByteStream> for ObjectBody {
    fn from(stream: ByteStream) -> Self {
        ObjectBody::Remote(stream)
    }
}
