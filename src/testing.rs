//! In-process file processing service for tests.

use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::stream::{self, Stream, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tonic::{Code, Request, Response, Status, Streaming};

use crate::client::dispatcher::{FORMAT_KEY, HEIGHT_KEY, WIDTH_KEY};
use crate::config::CHUNK_SIZE;
use crate::proto::file_processor_service_server::{FileProcessorService, FileProcessorServiceServer};
use crate::proto::FileChunk;

type ChunkStream = Pin<Box<dyn Stream<Item = Result<FileChunk, Status>> + Send + 'static>>;

/// How the service answers once it has read the whole upload.
#[derive(Clone, Copy, Debug)]
pub enum Behavior {
    /// Streams the upload back unchanged
    Echo,
    /// Returns an internal error with this message
    Fail(&'static str),
    /// Returns this status instead of a response
    Reject(Code, &'static str),
    /// Streams back the first `bytes` of the upload as one chunk, then fails
    FailAfter {
        bytes: usize,
        code: Code,
        message: &'static str,
    },
    /// Sends response headers at once but holds the first chunk back
    DelayFirstChunk(Duration),
    /// Never answers
    Stall,
    /// Sends the first chunk of the echo, then never finishes
    Hang,
}

/// What the service saw for one call.
#[derive(Clone, Debug)]
pub struct RecordedCall {
    pub rpc: &'static str,
    pub chunk_sizes: Vec<usize>,
    pub received: Vec<u8>,
    pub format: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
}

#[derive(Clone)]
struct MockService {
    behavior: Behavior,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    stalled: Arc<Notify>,
}

impl MockService {
    async fn handle(
        &self,
        rpc: &'static str,
        request: Request<Streaming<FileChunk>>,
    ) -> Result<Response<ChunkStream>, Status> {
        let (format, width, height) = {
            let metadata = request.metadata();
            let header = |key: &str| {
                metadata
                    .get(key)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string)
            };
            (header(FORMAT_KEY), header(WIDTH_KEY), header(HEIGHT_KEY))
        };

        let mut inbound = request.into_inner();
        let mut chunk_sizes = vec![];
        let mut received = vec![];
        while let Some(chunk) = inbound.message().await? {
            chunk_sizes.push(chunk.content.len());
            received.extend_from_slice(&chunk.content);
        }

        self.calls.lock().unwrap().push(RecordedCall {
            rpc,
            chunk_sizes,
            received: received.clone(),
            format,
            width,
            height,
        });

        let echo: Vec<Result<FileChunk, Status>> = received
            .chunks(CHUNK_SIZE)
            .map(|c| Ok(FileChunk { content: c.to_vec() }))
            .collect();
        let reply: ChunkStream = match self.behavior {
            Behavior::Echo => Box::pin(stream::iter(echo)),
            Behavior::Fail(message) => return Err(Status::internal(message)),
            Behavior::Reject(code, message) => return Err(Status::new(code, message)),
            Behavior::FailAfter {
                bytes,
                code,
                message,
            } => {
                let head = received[..bytes.min(received.len())].to_vec();
                let items = vec![Ok(FileChunk { content: head }), Err(Status::new(code, message))];
                Box::pin(stream::iter(items))
            }
            Behavior::DelayFirstChunk(delay) => Box::pin(
                stream::once(async move {
                    tokio::time::sleep(delay).await;
                    stream::iter(echo)
                })
                .flatten(),
            ),
            Behavior::Stall => {
                self.stalled.notify_one();
                return std::future::pending().await;
            }
            Behavior::Hang => {
                let stalled = Arc::clone(&self.stalled);
                let first = echo.into_iter().take(1);
                Box::pin(stream::iter(first).chain(stream::once(async move {
                    stalled.notify_one();
                    std::future::pending::<Result<FileChunk, Status>>().await
                })))
            }
        };
        Ok(Response::new(reply))
    }
}

#[tonic::async_trait]
impl FileProcessorService for MockService {
    type CompressPDFStream = ChunkStream;
    type ConvertToTXTStream = ChunkStream;
    type ConvertImageFormatStream = ChunkStream;
    type ResizeImageStream = ChunkStream;

    async fn compress_pdf(
        &self,
        request: Request<Streaming<FileChunk>>,
    ) -> Result<Response<Self::CompressPDFStream>, Status> {
        self.handle("CompressPDF", request).await
    }

    async fn convert_to_txt(
        &self,
        request: Request<Streaming<FileChunk>>,
    ) -> Result<Response<Self::ConvertToTXTStream>, Status> {
        self.handle("ConvertToTXT", request).await
    }

    async fn convert_image_format(
        &self,
        request: Request<Streaming<FileChunk>>,
    ) -> Result<Response<Self::ConvertImageFormatStream>, Status> {
        self.handle("ConvertImageFormat", request).await
    }

    async fn resize_image(
        &self,
        request: Request<Streaming<FileChunk>>,
    ) -> Result<Response<Self::ResizeImageStream>, Status> {
        self.handle("ResizeImage", request).await
    }
}

/// A running mock service on an ephemeral localhost port. Stops on drop.
pub struct TestServer {
    address: SocketAddr,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    stalled: Arc<Notify>,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let service = MockService {
            behavior,
            calls: Arc::new(Mutex::new(vec![])),
            stalled: Arc::new(Notify::new()),
        };
        let calls = Arc::clone(&service.calls);
        let stalled = Arc::clone(&service.stalled);

        let incoming = Box::pin(stream::unfold(listener, |listener| async move {
            let conn = listener.accept().await.map(|(socket, _)| socket);
            Some((conn, listener))
        }));
        let handle = tokio::spawn(async move {
            let _ = Server::builder()
                .add_service(FileProcessorServiceServer::new(service))
                .serve_with_incoming(incoming)
                .await;
        });

        TestServer {
            address,
            calls,
            stalled,
            handle,
        }
    }

    pub fn address(&self) -> String {
        self.address.to_string()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_call(&self) -> Option<RecordedCall> {
        self.calls.lock().unwrap().last().cloned()
    }

    /// Notified once a stalling or hanging call stops making progress.
    pub fn stalled(&self) -> Arc<Notify> {
        Arc::clone(&self.stalled)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// TCP relay in front of a [`TestServer`] whose connections can be cut
/// without a goodbye, the way a dropped network link looks to the client.
pub struct CuttingProxy {
    address: SocketAddr,
    cut: CancellationToken,
    handle: JoinHandle<()>,
}

impl CuttingProxy {
    pub async fn start(target: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let target = target.to_string();
        let cut = CancellationToken::new();
        let token = cut.clone();

        let handle = tokio::spawn(async move {
            while let Ok((mut inbound, _)) = listener.accept().await {
                let target = target.clone();
                let token = token.clone();
                tokio::spawn(async move {
                    let Ok(mut outbound) = TcpStream::connect(target).await else {
                        return;
                    };
                    tokio::select! {
                        _ = tokio::io::copy_bidirectional(&mut inbound, &mut outbound) => {}
                        _ = token.cancelled() => {}
                    }
                });
            }
        });

        CuttingProxy {
            address,
            cut,
            handle,
        }
    }

    pub fn address(&self) -> String {
        self.address.to_string()
    }

    /// Drops every relayed connection.
    pub fn cut(&self) {
        self.cut.cancel();
    }
}

impl Drop for CuttingProxy {
    fn drop(&mut self) {
        self.cut.cancel();
        self.handle.abort();
    }
}
