use log::error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::core_transfer::progress::{ProgressSink, ProgressState};
use crate::error::{FtpError, Result};

/// Streams bytes from `src` to `dst` in fixed-size chunks, pushing a progress
/// update after every chunk. Returns the number of bytes moved.
///
/// Generic over the endpoints so the same loop serves file-to-socket uploads,
/// socket-to-file downloads, and tests over in-memory pipes.
pub async fn copy_chunked<R, W>(
    src: &mut R,
    dst: &mut W,
    chunk_size: usize,
    total_bytes: Option<u64>,
    label: &str,
    progress: &dyn ProgressSink,
) -> Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buffer = vec![0u8; chunk_size];
    let mut transferred: u64 = 0;

    loop {
        let n = match src.read(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                error!("Error reading during transfer {}: {}", label, e);
                return Err(FtpError::Transfer(format!(
                    "read failed mid-stream: {}",
                    e
                )));
            }
        };
        if let Err(e) = dst.write_all(&buffer[..n]).await {
            error!("Error writing during transfer {}: {}", label, e);
            return Err(FtpError::Transfer(format!("write failed mid-stream: {}", e)));
        }
        transferred += n as u64;
        progress.update(&ProgressState {
            label: label.to_string(),
            total_bytes,
            transferred_bytes: transferred,
        });
    }

    dst.flush()
        .await
        .map_err(|e| FtpError::Transfer(format!("flush failed: {}", e)))?;
    Ok(transferred)
}

/// Reads a directory listing off the data socket until EOF and returns the
/// concatenated text.
pub async fn read_listing<R>(src: &mut R, chunk_size: usize) -> Result<String>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buffer = vec![0u8; chunk_size];
    let mut listing = String::new();
    loop {
        let n = src
            .read(&mut buffer)
            .await
            .map_err(|e| FtpError::Transfer(format!("listing read failed: {}", e)))?;
        if n == 0 {
            break;
        }
        listing.push_str(&String::from_utf8_lossy(&buffer[..n]));
    }
    Ok(listing)
}

/// Closes the write side of a data connection so the server sees EOF.
pub async fn shutdown_data<W>(dst: &mut W) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    dst.shutdown()
        .await
        .map_err(|e| FtpError::Transfer(format!("failed to shut down data connection: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_transfer::progress::NullProgress;
    use std::sync::{Arc, Mutex};

    struct RecordingSink {
        updates: Arc<Mutex<Vec<u64>>>,
    }

    impl ProgressSink for RecordingSink {
        fn update(&self, state: &ProgressState) {
            self.updates.lock().unwrap().push(state.transferred_bytes);
        }
    }

    #[tokio::test]
    async fn round_trips_bytes_through_a_pipe() {
        let payload: Vec<u8> = (0..u8::MAX).cycle().take(10_000).collect();
        let (mut client, mut server) = tokio::io::duplex(64 * 1024);

        let mut src = std::io::Cursor::new(payload.clone());
        let sent = copy_chunked(&mut src, &mut client, 4096, Some(10_000), "up", &NullProgress)
            .await
            .unwrap();
        shutdown_data(&mut client).await.unwrap();
        drop(client);

        let mut received = Vec::new();
        server.read_to_end(&mut received).await.unwrap();
        assert_eq!(sent, 10_000);
        assert_eq!(received, payload);
    }

    #[tokio::test]
    async fn reports_progress_per_chunk() {
        let updates = Arc::new(Mutex::new(Vec::new()));
        let sink = RecordingSink {
            updates: Arc::clone(&updates),
        };

        let payload = vec![7u8; 4096 * 2 + 100];
        let (mut client, server) = tokio::io::duplex(64 * 1024);
        let mut src = std::io::Cursor::new(payload);
        copy_chunked(&mut src, &mut client, 4096, Some(8292), "up", &sink)
            .await
            .unwrap();
        drop(server);

        let seen = updates.lock().unwrap();
        assert_eq!(seen.as_slice(), &[4096, 8192, 8292]);
    }

    #[tokio::test]
    async fn collects_listing_until_eof() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        tokio::spawn(async move {
            client
                .write_all(b"drwxr-xr-x 2 ftp ftp 4096 Jan 1 00:00 sub\r\n")
                .await
                .unwrap();
            client
                .write_all(b"-rw-r--r-- 1 ftp ftp 12 Jan 1 00:00 a.txt\r\n")
                .await
                .unwrap();
        });
        let listing = read_listing(&mut server, 4096).await.unwrap();
        assert!(listing.contains("a.txt"));
        assert!(listing.contains("sub"));
    }
}
