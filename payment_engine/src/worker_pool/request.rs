use std::{fmt::Display, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{
    sync::{oneshot, watch},
    time::Instant,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("The worker pool is full. Try again shortly.")]
    PoolFull,
    #[error("The worker pool is shutting down.")]
    ShuttingDown,
    #[error("The request was cancelled before it completed.")]
    Cancelled,
    #[error("The request did not complete before its deadline.")]
    Timeout,
    #[error("The request handler failed unexpectedly.")]
    HandlerFailed,
    #[error("No handler is registered for {0} requests.")]
    UnknownKind(RequestKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestKind {
    GetPayment,
    GetPaymentByOrder,
    ListUserPayments,
}

impl Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RequestKind::GetPayment => "get_payment",
            RequestKind::GetPaymentByOrder => "get_payment_by_order",
            RequestKind::ListUserPayments => "list_user_payments",
        };
        f.write_str(s)
    }
}

/// The deadline and cancel flag of one unit of work. Clones share the flag.
#[derive(Debug, Clone)]
pub struct RequestContext {
    deadline: Instant,
    cancelled: Arc<watch::Sender<bool>>,
}

impl RequestContext {
    pub fn with_timeout(timeout: Duration) -> Self {
        let (cancelled, _) = watch::channel(false);
        Self { deadline: Instant::now() + timeout, cancelled: Arc::new(cancelled) }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn cancel(&self) {
        self.cancelled.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow() || Instant::now() >= self.deadline
    }

    /// Resolves once [`RequestContext::cancel`] has been called on this context or any of its clones. The deadline is
    /// not considered.
    pub async fn cancelled(&self) {
        let mut flag = self.cancelled.subscribe();
        // The sender lives as long as `self`, so this only returns once the flag is set
        let _ = flag.wait_for(|cancelled| *cancelled).await;
    }
}

pub struct PoolRequest<Req, Resp> {
    pub ctx: RequestContext,
    pub kind: RequestKind,
    pub payload: Req,
    pub reply: oneshot::Sender<Result<Resp, PoolError>>,
}

impl<Req, Resp> PoolRequest<Req, Resp> {
    pub fn new(
        ctx: RequestContext,
        kind: RequestKind,
        payload: Req,
    ) -> (Self, oneshot::Receiver<Result<Resp, PoolError>>) {
        let (reply, receiver) = oneshot::channel();
        (Self { ctx, kind, payload, reply }, receiver)
    }
}
