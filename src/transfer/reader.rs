use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use futures_util::stream::{self, Stream};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio::sync::Notify;

use crate::error::TransferError;
use crate::proto::FileChunk;
use crate::transfer::Chunk;

/// Reads a file as a lazy, finite sequence of fixed-size chunks.
///
/// The file is opened up front so an unreadable input fails before any chunk
/// is produced. The handle lives as long as the reader (or the stream built
/// from it) and is released when either is exhausted or dropped. Restarting
/// means opening a new reader.
pub struct ChunkReader {
    file: File,
    path: PathBuf,
    chunk_size: usize,
    exhausted: bool,
}

impl ChunkReader {
    pub async fn open(path: &Path, chunk_size: usize) -> Result<Self, TransferError> {
        if chunk_size == 0 {
            return Err(TransferError::InvalidParameters(
                "chunk size must be positive".to_string(),
            ));
        }
        let file = File::open(path)
            .await
            .map_err(|source| TransferError::io(path, source))?;
        Ok(ChunkReader {
            file,
            path: path.to_path_buf(),
            chunk_size,
            exhausted: false,
        })
    }

    /// Reads the next chunk, `None` once the file is exhausted. Only the last
    /// chunk may be shorter than the chunk size and none is ever empty.
    pub async fn next_chunk(&mut self) -> Result<Option<Chunk>, TransferError> {
        if self.exhausted {
            return Ok(None);
        }

        let mut buf = vec![0u8; self.chunk_size];
        let mut filled = 0;
        while filled < buf.len() {
            let n = self
                .file
                .read(&mut buf[filled..])
                .await
                .map_err(|source| TransferError::io(&self.path, source))?;
            if n == 0 {
                self.exhausted = true;
                break;
            }
            filled += n;
        }

        if filled == 0 {
            return Ok(None);
        }
        buf.truncate(filled);
        Ok(Some(Chunk::new(buf)))
    }

    /// Turns the reader into a request stream for a streaming call.
    ///
    /// The stream item type cannot carry errors, so a read failure ends the
    /// stream early and is parked in `probe` for the session to pick up.
    pub fn into_stream(self, probe: UploadProbe) -> impl Stream<Item = FileChunk> + Send + 'static {
        stream::unfold(Some((self, probe)), |state| async move {
            let Some((mut reader, probe)) = state else {
                return None;
            };
            match reader.next_chunk().await {
                Ok(Some(chunk)) => {
                    probe.record_chunk(chunk.len());
                    Some((FileChunk::from(chunk), Some((reader, probe))))
                }
                Ok(None) => {
                    probe.finish();
                    None
                }
                Err(err) => {
                    tracing::warn!(
                        path = %reader.path.display(),
                        error = %err,
                        "upload read failed"
                    );
                    probe.fail(err);
                    None
                }
            }
        })
    }
}

/// Progress of an upload stream as seen from outside the transport.
#[derive(Clone, Debug, Default)]
pub struct UploadReport {
    pub chunks: u64,
    pub bytes: u64,
    /// Set when the last chunk has been handed to the transport
    pub finished_at: Option<Instant>,
}

/// Shared handle the upload stream reports into while tonic drives it.
#[derive(Clone, Default)]
pub struct UploadProbe {
    inner: Arc<Mutex<ProbeState>>,
    ended: Arc<Notify>,
}

#[derive(Default)]
struct ProbeState {
    report: UploadReport,
    error: Option<TransferError>,
}

impl UploadProbe {
    fn record_chunk(&self, len: usize) {
        if let Ok(mut state) = self.inner.lock() {
            state.report.chunks += 1;
            state.report.bytes += len as u64;
        }
    }

    fn finish(&self) {
        if let Ok(mut state) = self.inner.lock() {
            state.report.finished_at = Some(Instant::now());
        }
        self.ended.notify_one();
    }

    fn fail(&self, err: TransferError) {
        if let Ok(mut state) = self.inner.lock() {
            state.error = Some(err);
        }
        self.ended.notify_one();
    }

    /// Resolves once the upload stream has ended, exhausted or cut short by
    /// a read error. Never resolves for a stream that is dropped early.
    pub async fn ended(&self) {
        let done = self
            .inner
            .lock()
            .map(|state| state.report.finished_at.is_some() || state.error.is_some())
            .unwrap_or(false);
        if !done {
            self.ended.notified().await;
        }
    }

    pub fn report(&self) -> UploadReport {
        self.inner
            .lock()
            .map(|state| state.report.clone())
            .unwrap_or_default()
    }

    /// Takes the read error that cut the upload short, if any.
    pub fn take_error(&self) -> Option<TransferError> {
        self.inner.lock().ok().and_then(|mut state| state.error.take())
    }
}
