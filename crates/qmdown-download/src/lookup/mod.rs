//! URL lookup decorators.

mod cached;

pub use cached::CachedUrlLookup;
