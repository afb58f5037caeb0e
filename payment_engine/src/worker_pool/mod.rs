//! A fixed-size pool of async workers behind a bounded intake queue.
//!
//! `submit` never waits: when the queue is full the request is rejected with [`PoolError::PoolFull`] so callers see
//! backpressure instead of an ever-growing queue. Every accepted request gets exactly one reply.
mod pool;
mod read_requests;
mod request;

pub use pool::{PoolConfig, PoolHandler, WorkerPool};
#[cfg(feature = "sqlite")]
pub use read_requests::read_pool;
pub use read_requests::{ReadQuery, ReadResponse, ReadResult, ReadWorkerPool};
pub use request::{PoolError, PoolRequest, RequestContext, RequestKind};
