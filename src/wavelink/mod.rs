//! Wave Link remote-control connection.

pub mod client;
pub mod context;
pub mod dispatch;
pub mod protocol;

pub use client::{ClientCommand, ClientError, ConnectionState, WaveLinkClient};
pub use context::SyncContext;
pub use dispatch::{Dispatcher, IdSource, Query, QueryKind, SequentialIds};
