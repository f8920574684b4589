//! Native-messaging frame codec
//!
//! Every message is a `u32` byte length in native byte order followed by
//! that many bytes of UTF-8 JSON.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{IpcError, IpcResult};

/// Largest frame the browser accepts from a native host
pub const MAX_OUTBOUND_FRAME: usize = 1024 * 1024;

/// Largest frame the browser sends to a native host
pub const MAX_INBOUND_FRAME: usize = 64 * 1024 * 1024;

/// Read one frame. Returns `Ok(None)` on a clean EOF between frames.
pub async fn read_frame<R>(reader: &mut R) -> IpcResult<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let size = u32::from_ne_bytes(len_buf) as usize;
    if size > MAX_INBOUND_FRAME {
        return Err(IpcError::FrameTooLarge {
            size,
            limit: MAX_INBOUND_FRAME,
        });
    }

    let mut body = vec![0u8; size];
    match reader.read_exact(&mut body).await {
        Ok(_) => Ok(Some(body)),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(IpcError::ConnectionClosed),
        Err(e) => Err(e.into()),
    }
}

/// Read and decode one message
pub async fn read_message<R, T>(reader: &mut R) -> IpcResult<Option<T>>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    match read_frame(reader).await? {
        Some(body) => Ok(Some(serde_json::from_slice(&body)?)),
        None => Ok(None),
    }
}

/// Encode and write one message, then flush
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> IpcResult<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize + ?Sized,
{
    let body = serde_json::to_vec(message)?;
    if body.len() > MAX_OUTBOUND_FRAME {
        return Err(IpcError::FrameTooLarge {
            size: body.len(),
            limit: MAX_OUTBOUND_FRAME,
        });
    }

    writer.write_all(&(body.len() as u32).to_ne_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}
