//! TCP wire format for a transfer session.
//!
//! # Wire format
//!
//! ```text
//! HEADER (Sender -> Receiver):
//!   [2 bytes BE: name_len]          1..=MAX_NAME_LEN
//!   [name_len bytes: name UTF-8]
//!   [8 bytes BE: declared_size]
//!
//! OFFSET (Receiver -> Sender):      [8 bytes BE: resume_offset]
//!
//! PAYLOAD (Sender -> Receiver):
//!   [declared_size - resume_offset bytes, any chunking]
//!   terminated by the sender shutting down its write half
//! ```

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::error::TransferError;
use crate::io::{read_full, write_full};
use crate::{MAX_NAME_LEN, OFFSET_LEN};

/// Announces the file a sender is about to transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferHeader {
    /// Transfer name (UTF-8, relative to the receiver's destination root).
    pub name: String,
    /// Size of the sender's local file in bytes.
    pub size: u64,
}

fn check_name_len(len: usize) -> Result<(), TransferError> {
    if len == 0 {
        return Err(TransferError::Protocol("empty transfer name".into()));
    }
    if len > MAX_NAME_LEN {
        return Err(TransferError::Protocol(format!(
            "name too long: {len} bytes (max {MAX_NAME_LEN})"
        )));
    }
    Ok(())
}

/// Reads exactly `buf.len()` bytes; an early close is a protocol error.
async fn read_exact<R: AsyncRead + Unpin>(
    reader: &mut R,
    buf: &mut [u8],
    what: &str,
) -> Result<(), TransferError> {
    let n = read_full(reader, buf).await.map_err(TransferError::Read)?;
    if n < buf.len() {
        return Err(TransferError::Protocol(format!(
            "connection closed while reading {what} ({n} of {} bytes)",
            buf.len()
        )));
    }
    Ok(())
}

async fn write_and_flush<W: AsyncWrite + Unpin>(
    writer: &mut W,
    buf: &[u8],
) -> Result<(), TransferError> {
    write_full(writer, buf).await.map_err(TransferError::Write)?;
    writer.flush().await.map_err(TransferError::Write)
}

/// Writes the transfer header to the stream.
pub async fn write_header<W: AsyncWrite + Unpin>(
    writer: &mut W,
    header: &TransferHeader,
) -> Result<(), TransferError> {
    let name = header.name.as_bytes();
    check_name_len(name.len())?;

    let mut buf = Vec::with_capacity(2 + name.len() + 8);
    buf.extend_from_slice(&(name.len() as u16).to_be_bytes());
    buf.extend_from_slice(name);
    buf.extend_from_slice(&header.size.to_be_bytes());
    write_and_flush(writer, &buf).await
}

/// Reads the transfer header from the stream.
pub async fn read_header<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<TransferHeader, TransferError> {
    let mut len_buf = [0u8; 2];
    read_exact(reader, &mut len_buf, "name length").await?;
    let name_len = u16::from_be_bytes(len_buf) as usize;
    check_name_len(name_len)?;

    let mut name_buf = vec![0u8; name_len];
    read_exact(reader, &mut name_buf, "transfer name").await?;
    let name = String::from_utf8(name_buf)
        .map_err(|e| TransferError::Protocol(format!("invalid UTF-8 name: {e}")))?;

    let mut size_buf = [0u8; 8];
    read_exact(reader, &mut size_buf, "declared size").await?;

    Ok(TransferHeader {
        name,
        size: u64::from_be_bytes(size_buf),
    })
}

/// Writes the resume offset (receiver side of the negotiation).
pub async fn write_offset<W: AsyncWrite + Unpin>(
    writer: &mut W,
    offset: u64,
) -> Result<(), TransferError> {
    write_and_flush(writer, &offset.to_be_bytes()).await
}

/// Reads the resume offset (sender side of the negotiation).
pub async fn read_offset<R: AsyncRead + Unpin>(reader: &mut R) -> Result<u64, TransferError> {
    let mut buf = [0u8; OFFSET_LEN];
    read_exact(reader, &mut buf, "resume offset").await?;
    Ok(u64::from_be_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn header_roundtrip() {
        let header = TransferHeader {
            name: "backups/disk.img".into(),
            size: 1_048_576,
        };

        let mut buf = Vec::new();
        write_header(&mut buf, &header).await.unwrap();
        assert_eq!(buf.len(), 2 + header.name.len() + 8);

        let mut cursor = &buf[..];
        let parsed = read_header(&mut cursor).await.unwrap();
        assert_eq!(parsed, header);
        assert!(cursor.is_empty());
    }

    #[tokio::test]
    async fn offset_is_eight_bytes_big_endian() {
        let mut buf = Vec::new();
        write_offset(&mut buf, 11).await.unwrap();
        assert_eq!(buf, [0, 0, 0, 0, 0, 0, 0, 11]);

        let mut cursor = &buf[..];
        assert_eq!(read_offset(&mut cursor).await.unwrap(), 11);
    }

    #[tokio::test]
    async fn short_offset_is_protocol_error() {
        let buf = [0u8, 0, 0, 1];
        let mut cursor = &buf[..];
        let err = read_offset(&mut cursor).await.unwrap_err();
        assert!(matches!(err, TransferError::Protocol(_)));
    }

    #[tokio::test]
    async fn closed_before_offset_is_protocol_error() {
        let mut cursor: &[u8] = &[];
        let err = read_offset(&mut cursor).await.unwrap_err();
        assert!(matches!(err, TransferError::Protocol(_)));
    }

    #[tokio::test]
    async fn truncated_header_is_protocol_error() {
        let header = TransferHeader {
            name: "file.txt".into(),
            size: 42,
        };
        let mut buf = Vec::new();
        write_header(&mut buf, &header).await.unwrap();
        buf.truncate(buf.len() - 3);

        let mut cursor = &buf[..];
        let err = read_header(&mut cursor).await.unwrap_err();
        assert!(matches!(err, TransferError::Protocol(_)));
    }

    #[tokio::test]
    async fn empty_name_rejected_both_ways() {
        let header = TransferHeader {
            name: String::new(),
            size: 0,
        };
        let mut buf = Vec::new();
        assert!(write_header(&mut buf, &header).await.is_err());

        let raw = [0u8, 0];
        let mut cursor = &raw[..];
        assert!(matches!(
            read_header(&mut cursor).await,
            Err(TransferError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn name_too_long_rejected_both_ways() {
        let header = TransferHeader {
            name: "a".repeat(MAX_NAME_LEN + 1),
            size: 0,
        };
        let mut buf = Vec::new();
        assert!(write_header(&mut buf, &header).await.is_err());

        let raw = ((MAX_NAME_LEN + 1) as u16).to_be_bytes();
        let mut cursor = &raw[..];
        assert!(matches!(
            read_header(&mut cursor).await,
            Err(TransferError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn invalid_utf8_name_rejected() {
        let mut raw = vec![0u8, 2, 0xff, 0xfe];
        raw.extend_from_slice(&0u64.to_be_bytes());
        let mut cursor = &raw[..];
        assert!(matches!(
            read_header(&mut cursor).await,
            Err(TransferError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn header_followed_by_payload_is_not_consumed() {
        let header = TransferHeader {
            name: "a".into(),
            size: 3,
        };
        let mut buf = Vec::new();
        write_header(&mut buf, &header).await.unwrap();
        buf.extend_from_slice(b"xyz");

        let mut cursor = &buf[..];
        read_header(&mut cursor).await.unwrap();
        assert_eq!(cursor, b"xyz");
    }
}
