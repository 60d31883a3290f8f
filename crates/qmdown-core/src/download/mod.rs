//! Download domain types.
//!
//! Everything here is plain data: no I/O, no async. The engine and the
//! resolver in `qmdown-download` operate on these types.

mod completion;
mod errors;
mod events;
mod quality;
mod types;

pub use completion::{BatchSummary, FailedTask};
pub use errors::DownloadError;
pub use events::ProgressEvent;
pub use quality::{QualityTier, SongFileType, UnknownFileType};
pub use types::{TaskId, TaskSnapshot, TaskState};
