use std::fmt;
use std::io::SeekFrom;

use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};

const CHUNK_SIZE: usize = 8192;

/// Hex-encoded SHA-256 digest of a file's full byte stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hashes the source in fixed-size chunks and rewinds it to the start,
/// so the caller can still stream the same bytes to storage afterwards.
pub async fn fingerprint<R>(source: &mut R) -> std::io::Result<Fingerprint>
where
    R: AsyncRead + AsyncSeek + Unpin,
{
    let mut hasher = Sha256::new();
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = source.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    source.seek(SeekFrom::Start(0)).await?;
    Ok(Fingerprint(hex::encode(hasher.finalize())))
}
