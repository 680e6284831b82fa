use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tonic::transport::{Channel, Endpoint};

use crate::config::ClientConfig;
use crate::error::TransferError;
use crate::proto::file_processor_service_client::FileProcessorServiceClient;

/// Owns the channel to the file processing service.
///
/// The channel is created once, shared by every session, and closed once.
/// Tonic connects lazily, so building a manager never fails just because the
/// server is down; the first call (or [`ConnectionManager::check_ready`])
/// finds out.
pub struct ConnectionManager {
    endpoint: Endpoint,
    channel: Channel,
    max_message_size: usize,
    shutdown: CancellationToken,
    closed: AtomicBool,
}

impl ConnectionManager {
    pub fn new(config: &ClientConfig) -> Result<Self, TransferError> {
        let endpoint = Endpoint::from_shared(config.endpoint_uri())
            .map_err(|e| {
                TransferError::Transport(format!(
                    "invalid server address {}: {}",
                    config.server_address, e
                ))
            })?
            .connect_timeout(config.connect_timeout);
        let channel = endpoint.connect_lazy();

        tracing::debug!(address = %config.server_address, "channel created");
        Ok(ConnectionManager {
            endpoint,
            channel,
            max_message_size: config.max_message_size,
            shutdown: CancellationToken::new(),
            closed: AtomicBool::new(false),
        })
    }

    /// A stub over the shared channel with the raised message limits.
    pub fn client(&self) -> Result<FileProcessorServiceClient<Channel>, TransferError> {
        if self.is_closed() {
            return Err(TransferError::Transport("channel closed".to_string()));
        }
        Ok(FileProcessorServiceClient::new(self.channel.clone())
            .max_decoding_message_size(self.max_message_size)
            .max_encoding_message_size(self.max_message_size))
    }

    /// Token cancelled when the channel is closed. Sessions watch it so a
    /// close in the middle of a transfer fails them instead of hanging.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Dials the server on a fresh connection and waits up to `wait` for it
    /// to come up.
    pub async fn check_ready(&self, wait: Duration) -> Result<(), TransferError> {
        if self.is_closed() {
            return Err(TransferError::Transport("channel closed".to_string()));
        }
        match tokio::time::timeout(wait, self.endpoint.connect()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(TransferError::Timeout(wait)),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Closes the channel. Sessions still in flight resolve as transport
    /// failures; later sessions are refused. Closing twice is a no-op.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            tracing::debug!("channel already closed");
            return;
        }
        self.shutdown.cancel();
        tracing::debug!("channel closed");
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.close();
    }
}
