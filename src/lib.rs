//! Client for a remote file processing service.
//!
//! Files are uploaded as a stream of bounded chunks over a bidirectional
//! streaming gRPC call, processed remotely (PDF compression, PDF to text,
//! image conversion, image resize) and the result is reassembled from the
//! chunk stream the service sends back.

pub mod client;
pub mod config;
pub mod error;
pub mod report;
pub mod shell;
pub mod size;
pub mod suite;
pub mod transfer;

#[cfg(test)]
mod testing;

pub mod proto {
    tonic::include_proto!("file_processor");
}
