//! The read paths of the payment service, served through a [`WorkerPool`].
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Payment, PaymentPage},
    flow_api::errors::PaymentFlowError,
    worker_pool::{RequestKind, WorkerPool},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadQuery {
    PaymentById(String),
    PaymentByOrder(String),
    UserPayments { user_id: String, page: u32, limit: u32 },
}

impl ReadQuery {
    pub fn kind(&self) -> RequestKind {
        match self {
            ReadQuery::PaymentById(_) => RequestKind::GetPayment,
            ReadQuery::PaymentByOrder(_) => RequestKind::GetPaymentByOrder,
            ReadQuery::UserPayments { .. } => RequestKind::ListUserPayments,
        }
    }

    fn mismatch(&self, kind: RequestKind) -> PaymentFlowError {
        PaymentFlowError::InvalidRequest(format!("{self:?} was submitted as a {kind} request"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReadResult {
    Payment(Payment),
    Page(PaymentPage),
}

pub type ReadResponse = Result<ReadResult, PaymentFlowError>;

pub type ReadWorkerPool = WorkerPool<ReadQuery, ReadResponse>;

#[cfg(feature = "sqlite")]
mod sqlite_pool {
    use std::{collections::HashMap, future::Future, sync::Arc};

    use super::*;
    use crate::{
        worker_pool::{PoolConfig, PoolHandler},
        PaymentFlowApi,
        SqliteDatabase,
    };

    type Api = PaymentFlowApi<SqliteDatabase>;

    fn handler<F, Fut>(api: &Api, f: F) -> PoolHandler<ReadQuery, ReadResponse>
    where
        F: Fn(Api, ReadQuery) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ReadResponse> + Send + 'static,
    {
        let api = api.clone();
        Arc::new(move |query| Box::pin(f(api.clone(), query)))
    }

    /// Starts a pool that serves the three read requests from `api`.
    pub fn read_pool(api: Api, config: PoolConfig) -> ReadWorkerPool {
        let mut handlers = HashMap::new();
        handlers.insert(
            RequestKind::GetPayment,
            handler(&api, |api, query| async move {
                match query {
                    ReadQuery::PaymentById(id) => api.get_payment(&id).await.map(ReadResult::Payment),
                    q => Err(q.mismatch(RequestKind::GetPayment)),
                }
            }),
        );
        handlers.insert(
            RequestKind::GetPaymentByOrder,
            handler(&api, |api, query| async move {
                match query {
                    ReadQuery::PaymentByOrder(order_id) => {
                        api.get_payment_by_order_id(&order_id).await.map(ReadResult::Payment)
                    },
                    q => Err(q.mismatch(RequestKind::GetPaymentByOrder)),
                }
            }),
        );
        handlers.insert(
            RequestKind::ListUserPayments,
            handler(&api, |api, query| async move {
                match query {
                    ReadQuery::UserPayments { user_id, page, limit } => {
                        api.payments_for_user(&user_id, page, limit).await.map(ReadResult::Page)
                    },
                    q => Err(q.mismatch(RequestKind::ListUserPayments)),
                }
            }),
        );
        WorkerPool::start(config, handlers)
    }
}

#[cfg(feature = "sqlite")]
pub use sqlite_pool::read_pool;
