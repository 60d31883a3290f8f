//! Port definitions (trait abstractions) for external systems.
//!
//! These traits define the boundaries between the engine and the outside
//! world: the music service (URL lookup), the network (HTTP client) and
//! the user interface (progress sink). Adapters implement them; the
//! engine and resolver depend only on the traits.

mod download_engine;
mod http_client;
mod progress_sink;
mod url_lookup;

pub use download_engine::{
    DEFAULT_CHUNK_SIZE, DEFAULT_RETRY_BASE_DELAY, DEFAULT_RETRY_LIMIT, DEFAULT_TIMEOUT,
    DEFAULT_WORKER_COUNT, EngineConfig, MAX_RETRY_DELAY,
};
pub use http_client::{ByteStream, HttpClientPort, HttpError, ProbeResponse, StreamResponse};
pub use progress_sink::{NoopProgressSink, ProgressSinkPort, RecordingProgressSink};
pub use url_lookup::{LookupError, UrlLookupPort, UrlMap};
