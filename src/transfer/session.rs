use std::fmt;
use std::io;
use std::time::{Duration, Instant};

use futures_util::{stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tonic::{Request, Status};

use crate::client::dispatcher::{self, Operation, OperationRequest};
use crate::client::ConnectionManager;
use crate::error::TransferError;
use crate::proto::FileChunk;
use crate::transfer::{Chunk, ChunkReader, ChunkWriter, UploadProbe};

/// Where a session is in its upload, process, download cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Validated,
    Uploading,
    AwaitingResponse,
    Downloading,
    Completed,
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Result of one session. Built once when the session ends.
#[derive(Debug)]
pub struct TransferOutcome {
    pub operation: Operation,
    pub input_size: u64,
    pub bytes_uploaded: u64,
    pub chunks_uploaded: u64,
    pub bytes_downloaded: u64,
    pub chunks_downloaded: u64,
    pub upload_duration: Duration,
    pub download_duration: Duration,
    /// State the session ended in: `Completed` or `Failed`
    pub state: SessionState,
    pub error: Option<TransferError>,
}

impl TransferOutcome {
    pub fn success(&self) -> bool {
        self.error.is_none()
    }

    pub fn total_duration(&self) -> Duration {
        self.upload_duration + self.download_duration
    }
}

/// Counters and clocks updated while the session runs.
struct Progress {
    state: SessionState,
    history: Vec<SessionState>,
    input_size: u64,
    probe: UploadProbe,
    upload_started: Option<Instant>,
    download_started: Option<Instant>,
    download_finished: Option<Instant>,
    bytes_downloaded: u64,
    chunks_downloaded: u64,
}

impl Progress {
    fn new() -> Self {
        Progress {
            state: SessionState::Idle,
            history: vec![SessionState::Idle],
            input_size: 0,
            probe: UploadProbe::default(),
            upload_started: None,
            download_started: None,
            download_finished: None,
            bytes_downloaded: 0,
            chunks_downloaded: 0,
        }
    }

    fn advance(&mut self, next: SessionState) {
        tracing::debug!(from = %self.state, to = %next, "session state");
        self.state = next;
        self.history.push(next);
    }
}

/// One upload, process, download cycle for a single file.
///
/// Failures never escape [`TransferSession::run`]; they end up in the
/// returned [`TransferOutcome`]. A failed download leaves whatever was
/// already written at the output path.
pub struct TransferSession<'a> {
    connection: &'a ConnectionManager,
    request: OperationRequest,
    chunk_size: usize,
    timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl<'a> TransferSession<'a> {
    pub fn new(
        connection: &'a ConnectionManager,
        request: OperationRequest,
        chunk_size: usize,
    ) -> Self {
        TransferSession {
            connection,
            request,
            chunk_size,
            timeout: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn run(self) -> TransferOutcome {
        tracing::info!(
            operation = %self.request.operation,
            input = %self.request.input.display(),
            output = %self.request.output.display(),
            "session started"
        );

        let mut progress = Progress::new();
        let shutdown = self.connection.shutdown_token();
        let deadline = async {
            match self.timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending().await,
            }
        };

        let result = tokio::select! {
            result = self.execute(&mut progress) => result,
            _ = self.cancel.cancelled() => Err(TransferError::Cancelled),
            _ = shutdown.cancelled() => Err(TransferError::Transport("channel closed".to_string())),
            _ = deadline => Err(TransferError::Timeout(self.timeout.unwrap_or_default())),
        };

        self.finish(progress, result)
    }

    async fn execute(&self, progress: &mut Progress) -> Result<(), TransferError> {
        let OperationRequest {
            operation,
            input,
            output,
        } = &self.request;

        operation.validate()?;
        let metadata = match tokio::fs::metadata(input).await {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => return Err(TransferError::InputNotFound(input.clone())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(TransferError::InputNotFound(input.clone()))
            }
            Err(e) => return Err(TransferError::io(input, e)),
        };
        progress.input_size = metadata.len();
        progress.advance(SessionState::Validated);

        let mut client = self.connection.client()?;
        let reader = ChunkReader::open(input, self.chunk_size).await?;
        let mut request = Request::new(reader.into_stream(progress.probe.clone()));
        operation.attach_parameters(request.metadata_mut())?;

        progress.advance(SessionState::Uploading);
        progress.upload_started = Some(Instant::now());
        let response = dispatcher::dispatch(&mut client, operation, request).await?;
        let mut inbound = response.into_inner();

        // The service may start answering before it has read the whole
        // upload; only a finished upload moves the session to awaiting.
        let probe = progress.probe.clone();
        let early = tokio::select! {
            biased;
            () = probe.ended() => None,
            message = inbound.message() => Some(message),
        };
        let first = match early {
            Some(message) => message,
            None => {
                progress.advance(SessionState::AwaitingResponse);
                inbound.message().await
            }
        };
        let first = first.transpose();
        let rest = match first {
            Some(Ok(_)) => Some(inbound),
            _ => None,
        };

        // The writer only creates the output here, once the call is accepted,
        // so a rejected call leaves an existing output untouched.
        let chunks = stream::iter(first)
            .chain(stream::iter(rest).flatten())
            .map(|message: Result<FileChunk, Status>| -> Result<Chunk, TransferError> {
                let message = message?;
                if progress.download_started.is_none() {
                    if let Some(err) = progress.probe.take_error() {
                        return Err(err);
                    }
                    progress.download_started = Some(Instant::now());
                    progress.advance(SessionState::Downloading);
                }
                progress.chunks_downloaded += 1;
                progress.bytes_downloaded += message.content.len() as u64;
                Ok(Chunk::new(message.content))
            });
        let total = match ChunkWriter::write_all(output, chunks).await {
            Ok(total) => total,
            Err(err) => return Err(progress.probe.take_error().unwrap_or(err)),
        };
        progress.download_finished = Some(Instant::now());

        if let Some(err) = progress.probe.take_error() {
            return Err(err);
        }
        progress.bytes_downloaded = total;
        Ok(())
    }

    fn finish(self, progress: Progress, result: Result<(), TransferError>) -> TransferOutcome {
        let now = Instant::now();
        let upload = progress.probe.report();
        let upload_ended = upload
            .finished_at
            .or(progress.download_started)
            .unwrap_or(now);
        let upload_duration = progress
            .upload_started
            .map(|started| upload_ended.saturating_duration_since(started))
            .unwrap_or_default();
        let download_duration = match progress.upload_started {
            Some(_) => {
                let started = progress.download_started.unwrap_or(upload_ended);
                progress
                    .download_finished
                    .unwrap_or(now)
                    .saturating_duration_since(started)
            }
            None => Duration::ZERO,
        };

        let (state, error) = match result {
            Ok(()) => (SessionState::Completed, None),
            Err(err) => (SessionState::Failed, Some(err)),
        };
        tracing::debug!(
            from = %progress.state,
            to = %state,
            path = ?progress.history,
            "session state"
        );

        let outcome = TransferOutcome {
            operation: self.request.operation,
            input_size: progress.input_size,
            bytes_uploaded: upload.bytes,
            chunks_uploaded: upload.chunks,
            bytes_downloaded: progress.bytes_downloaded,
            chunks_downloaded: progress.chunks_downloaded,
            upload_duration,
            download_duration,
            state,
            error,
        };

        match &outcome.error {
            None => tracing::info!(
                operation = %outcome.operation,
                uploaded = outcome.bytes_uploaded,
                chunks = outcome.chunks_uploaded,
                downloaded = outcome.bytes_downloaded,
                "session completed"
            ),
            Some(err) => tracing::warn!(
                operation = %outcome.operation,
                kind = ?err.kind(),
                error = %err,
                "session failed"
            ),
        }
        outcome
    }
}
