//! Local socket transport
//!
//! Frames are single JSON objects terminated by `\n`. The socket is a
//! filesystem path reached through the interprocess crate.

use std::io;
use std::path::Path;

use interprocess::local_socket::tokio::prelude::*;
pub use interprocess::local_socket::tokio::{Listener, Stream};
use interprocess::local_socket::{GenericFilePath, ListenerOptions};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum frame size (64 MB)
const MAX_FRAME_SIZE: u64 = 64 * 1024 * 1024;

/// Frame terminator
pub const TERMINATOR: u8 = b'\n';

/// Connect to a runtime socket
pub async fn connect(path: &Path) -> io::Result<Stream> {
    let name = path.to_fs_name::<GenericFilePath>()?;
    Stream::connect(name).await
}

/// Create a listener on a socket path, replacing a stale socket file
pub fn listen(path: &Path) -> io::Result<Listener> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    let name = path.to_fs_name::<GenericFilePath>()?;
    ListenerOptions::new().name(name).create_tokio()
}

/// Send one newline-terminated frame
pub async fn send_frame<W: AsyncWrite + Unpin>(writer: &mut W, data: &[u8]) -> io::Result<()> {
    if data.len() as u64 > MAX_FRAME_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "Frame too large",
        ));
    }
    if data.contains(&TERMINATOR) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "Frame contains a raw newline",
        ));
    }

    let mut frame = Vec::with_capacity(data.len() + 1);
    frame.extend_from_slice(data);
    frame.push(TERMINATOR);

    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Receive one frame, without its terminator
///
/// Returns `UnexpectedEof` when the peer closes before a terminator arrives,
/// including the zero-byte case.
pub async fn recv_frame<R: AsyncBufRead + Unpin>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut data = Vec::new();
    let read = (&mut *reader)
        .take(MAX_FRAME_SIZE + 1)
        .read_until(TERMINATOR, &mut data)
        .await?;

    if read == 0 || data.last() != Some(&TERMINATOR) {
        if data.len() as u64 > MAX_FRAME_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Frame too large: over {} bytes", MAX_FRAME_SIZE),
            ));
        }
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "Connection closed before frame terminator",
        ));
    }

    data.pop();
    Ok(data)
}
