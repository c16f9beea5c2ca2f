//! Robust read/write loops over async byte streams.
//!
//! Both the socket and the staging file go through these helpers so that a
//! short transfer is treated as partial progress and `Interrupted` is
//! retried instead of surfacing as a session failure.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Performs a single read, retrying on `Interrupted`.
///
/// Returns 0 only at end of stream (or when `buf` is empty).
pub async fn read_some<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(buf).await {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Reads until `buf` is full or the stream ends.
///
/// Returns the number of bytes read; it is shorter than `buf` only when the
/// peer closed the stream early.
pub async fn read_full<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        let n = read_some(reader, &mut buf[total..]).await?;
        if n == 0 {
            break;
        }
        total += n;
    }
    Ok(total)
}

/// Writes every byte of `buf`, continuing after short writes.
///
/// A write that accepts zero bytes is reported as `WriteZero`.
pub async fn write_full<W: AsyncWrite + Unpin>(writer: &mut W, buf: &[u8]) -> io::Result<()> {
    let mut written = 0;
    while written < buf.len() {
        match writer.write(&buf[written..]).await {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "failed to write whole buffer",
                ));
            }
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
