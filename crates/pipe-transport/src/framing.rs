//! # Message Framing
//!
//! Every message is a 4-byte big-endian length followed by the payload.
//! The reader collects the payload in fixed-size chunks into a growable
//! buffer until the declared length is reached, checking the cancellation
//! token before every chunk.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;
use crate::FRAME_HEADER_LEN;

/// Write one framed message and flush it.
pub async fn write_frame<W>(
    writer: &mut W,
    payload: &[u8],
    max_message_bytes: usize,
) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > max_message_bytes {
        return Err(TransportError::MessageTooLarge {
            size: payload.len(),
            max: max_message_bytes,
        });
    }
    let len = u32::try_from(payload.len()).map_err(|_| TransportError::MessageTooLarge {
        size: payload.len(),
        max: u32::MAX as usize,
    })?;

    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one framed message.
///
/// Returns [`TransportError::Cancelled`] as soon as the token fires, and
/// [`TransportError::Truncated`] if the peer hangs up mid-frame.
pub async fn read_frame<R>(
    reader: &mut R,
    chunk_size: usize,
    max_message_bytes: usize,
    token: &CancellationToken,
) -> Result<Vec<u8>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; FRAME_HEADER_LEN];
    let mut filled = 0;
    while filled < FRAME_HEADER_LEN {
        if token.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        let n = tokio::select! {
            _ = token.cancelled() => return Err(TransportError::Cancelled),
            read = reader.read(&mut header[filled..]) => read?,
        };
        if n == 0 && filled == 0 {
            return Err(TransportError::NoFrame);
        }
        if n == 0 {
            return Err(TransportError::Truncated {
                expected: FRAME_HEADER_LEN,
                received: filled,
            });
        }
        filled += n;
    }

    let expected = u32::from_be_bytes(header) as usize;
    if expected > max_message_bytes {
        return Err(TransportError::MessageTooLarge {
            size: expected,
            max: max_message_bytes,
        });
    }

    let chunk_size = chunk_size.max(1);
    let mut buffer = Vec::with_capacity(expected.min(chunk_size));
    let mut chunk = vec![0u8; chunk_size];

    while buffer.len() < expected {
        if token.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        let want = (expected - buffer.len()).min(chunk_size);
        let n = tokio::select! {
            _ = token.cancelled() => return Err(TransportError::Cancelled),
            read = reader.read(&mut chunk[..want]) => read?,
        };
        if n == 0 {
            return Err(TransportError::Truncated {
                expected,
                received: buffer.len(),
            });
        }
        buffer.extend_from_slice(&chunk[..n]);
    }

    Ok(buffer)
}
