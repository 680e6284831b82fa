use std::time::Duration;

/// Default service address, also used by the test harness when `GRPC_SERVER`
/// is not set.
pub const DEFAULT_SERVER_ADDRESS: &str = "localhost:50051";

/// Payload bytes per chunk message.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Send/receive limit for a single message. Files are never sent as one
/// message, so this only bounds individual chunks.
pub const MAX_MESSAGE_SIZE: usize = 100 * 1024 * 1024;

/// Settings shared by every session issued through one client.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Service address, `host:port` or a full `http://` URI
    pub server_address: String,

    pub chunk_size: usize,

    pub max_message_size: usize,

    pub connect_timeout: Duration,

    /// Per-session deadline; `None` waits indefinitely
    pub request_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SERVER_ADDRESS)
    }
}

impl ClientConfig {
    pub fn new(server_address: impl Into<String>) -> Self {
        ClientConfig {
            server_address: server_address.into(),
            chunk_size: CHUNK_SIZE,
            max_message_size: MAX_MESSAGE_SIZE,
            connect_timeout: Duration::from_secs(5),
            request_timeout: None,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// The address as a URI tonic can dial.
    pub fn endpoint_uri(&self) -> String {
        let address = self.server_address.trim();
        if address.starts_with("http://") || address.starts_with("https://") {
            address.to_string()
        } else {
            format!("http://{}", address)
        }
    }
}
