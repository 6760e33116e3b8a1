//! Source-image acquisition for an image-serving gateway.
//!
//! # Architecture
//!
//! One [`Downloader`] per process composes the pieces of the acquisition
//! pipeline:
//!
//! - [`transport`] - scheme-dispatched fetch strategies behind one uniform
//!   response contract (`http`/`https` and `local` built in, object stores
//!   pluggable)
//! - [`cache`] - an adaptive-replacement cache of serialized raw responses,
//!   keyed by source URL
//! - [`pool`] - a fixed population of reusable download buffers whose
//!   blocking acquisition is the concurrency gate
//! - [`limit`] - a hard byte ceiling over the body stream
//! - [`sniff`] - format and dimension validation from the leading bytes,
//!   before the body is fully buffered
//!
//! # Key Properties
//!
//! - **Bounded memory**: at most `concurrency` buffers exist; an oversized
//!   or unsupported source is rejected after at most the probe window plus
//!   one chunk
//! - **Cache replay**: a cached response is served byte-identical to the
//!   original until evicted by capacity pressure
//! - **Guaranteed release**: pooled buffers return to the pool on drop, on
//!   every success and failure path

mod arc;
mod cache;
mod config;
mod download;
mod error;
mod image;
mod limit;
mod pool;
mod sniff;
mod transport;

pub use arc::AdaptiveCache;
pub use cache::ResponseCache;
pub use config::{Config, LoadSupport};
pub use download::{Downloader, RequestContext};
pub use error::{DownloadError, SetupError};
pub use image::{ImageData, ImageType};
pub use limit::LimitedBody;
pub use pool::{BufferPool, PooledBuf};
pub use transport::{
    BodyStream, FileTransport, HttpTransport, RegistryBuilder, SourceResponse, Transport,
    TransportError, TransportRegistry,
};
