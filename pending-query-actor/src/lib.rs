//! Table of queries forwarded upstream, owned by an actor task.

mod actor;
mod error;
mod pending_table;

pub use actor::ActorHandle;
pub use error::PendingError;
pub use pending_table::{DuplicatePolicy, PendingQuery, PendingTable};
