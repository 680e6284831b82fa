use std::path::{Path, PathBuf};

use futures_util::{Stream, StreamExt};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::error::TransferError;
use crate::transfer::Chunk;

/// Appends chunks to a destination file in arrival order.
///
/// The destination is created (or truncated) on construction. If a write
/// fails, whatever was already written stays on disk; nothing is rolled back.
pub struct ChunkWriter {
    file: BufWriter<File>,
    path: PathBuf,
    written: u64,
}

impl ChunkWriter {
    pub async fn create(path: &Path) -> Result<Self, TransferError> {
        let file = File::create(path)
            .await
            .map_err(|source| TransferError::io(path, source))?;
        Ok(ChunkWriter {
            file: BufWriter::new(file),
            path: path.to_path_buf(),
            written: 0,
        })
    }

    pub async fn write_chunk(&mut self, data: &[u8]) -> Result<(), TransferError> {
        self.file
            .write_all(data)
            .await
            .map_err(|source| TransferError::io(&self.path, source))?;
        self.written += data.len() as u64;
        Ok(())
    }

    /// Flushes and closes the file, returning the total bytes written.
    pub async fn finish(mut self) -> Result<u64, TransferError> {
        self.file
            .flush()
            .await
            .map_err(|source| TransferError::io(&self.path, source))?;
        Ok(self.written)
    }

    /// Drains `chunks` into `path` and returns the total byte count.
    ///
    /// When the stream yields an error, the bytes received before it are
    /// flushed to disk before the error is returned.
    pub async fn write_all<S>(path: &Path, chunks: S) -> Result<u64, TransferError>
    where
        S: Stream<Item = Result<Chunk, TransferError>>,
    {
        let mut writer = ChunkWriter::create(path).await?;
        let mut chunks = std::pin::pin!(chunks);
        while let Some(chunk) = chunks.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    if let Err(flush_err) = writer.file.flush().await {
                        tracing::warn!(
                            path = %path.display(),
                            error = %flush_err,
                            "partial output not flushed"
                        );
                    }
                    return Err(err);
                }
            };
            writer.write_chunk(chunk.data()).await?;
        }
        writer.finish().await
    }
}
