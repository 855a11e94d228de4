//! Sampler daemon actor
//!
//! The continuous-sampling side of the tool runs as a single async task
//! communicating over Tokio channels:
//!
//! ```text
//! Timer tick → assemble() → History::append → publish SampleEvent → [sinks]
//!     ↑
//!     └─── Commands (SampleNow, UpdateInterval, Range, Latest, Shutdown)
//! ```
//!
//! The actor is the sole owner of the history: it is constructed when the
//! actor spawns and dropped when the loop exits, and readers reach it only
//! through command messages that answer with copies.

pub mod messages;
pub mod sampler;

pub use sampler::SamplerHandle;
