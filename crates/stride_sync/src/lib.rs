//! Stride Sync - local-first state synchronization and progress ledger
//!
//! Wires the local durable cache and the remote store together:
//! identity resolution, idempotent reward application, and debounced
//! replication of named state slices.

pub mod context;
pub mod identity;
pub mod ledger;
pub mod remote;
pub mod scheduler;
pub mod session;
pub mod slice;

pub use context::SyncContext;
pub use identity::{IdentityResolver, Resolution};
pub use ledger::{ProgressLedger, LEDGER_CHANNEL};
pub use remote::{HttpRemoteStore, MemoryRemoteStore, RemoteClient, RemoteError, RemoteStore};
pub use scheduler::{PushFn, SyncScheduler};
pub use session::Session;
pub use slice::{SlicePayload, SliceSync};
