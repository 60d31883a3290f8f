//! Progress rendering.

mod terminal;

pub use terminal::TerminalProgressSink;
