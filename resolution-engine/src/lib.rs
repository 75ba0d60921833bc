//! Decides, for every datagram, whether to answer from the cache, forward
//! upstream, or relay an upstream answer back to the client that asked.

mod answer;
mod engine;
mod error;
mod transport;

pub use answer::{cached_answer, is_cacheable};
pub use engine::{DropReason, EngineSettings, Outcome, ResolutionEngine};
pub use error::EngineError;
pub use transport::Transport;
