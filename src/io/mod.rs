mod http;
mod local;
mod memory;

#[cfg(test)]
pub(crate) mod testing;

pub use http::HttpRangeReader;
pub use local::LocalFileReader;
pub use memory::MemoryReader;

use async_trait::async_trait;
use std::io;

/// Trait for random access reading from an archive's underlying bytes
#[async_trait]
pub trait ReadAt: Send + Sync {
    /// Read data at the specified offset into the buffer.
    ///
    /// May return fewer bytes than requested; `Ok(0)` means end of data.
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Get the total size of the data source
    fn size(&self) -> u64;
}

/// Read up to `len` bytes starting at `offset`, stopping early only at end of data.
pub async fn read_window<R: ReadAt + ?Sized>(
    reader: &R,
    offset: u64,
    len: usize,
) -> io::Result<Vec<u8>> {
    let available = reader.size().saturating_sub(offset);
    let len = len.min(usize::try_from(available).unwrap_or(usize::MAX));

    let mut buf = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        let n = reader.read_at(offset + filled as u64, &mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(buf)
}
