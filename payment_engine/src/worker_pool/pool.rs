use std::{
    collections::HashMap,
    panic::AssertUnwindSafe,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
        Mutex,
        PoisonError,
    },
};

use futures_util::{future::BoxFuture, FutureExt};
use log::*;
use tokio::{
    sync::{
        mpsc::{self, error::TrySendError},
        oneshot,
        watch,
        Mutex as AsyncMutex,
    },
    task::JoinHandle,
    time::timeout_at,
};

use crate::worker_pool::request::{PoolError, PoolRequest, RequestContext, RequestKind};

/// A request handler. The returned future must own everything it needs.
pub type PoolHandler<Req, Resp> = Arc<dyn Fn(Req) -> BoxFuture<'static, Resp> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub workers: usize,
    /// The intake queue holds `workers * queue_multiplier` requests.
    pub queue_multiplier: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { workers: 8, queue_multiplier: 2 }
    }
}

impl PoolConfig {
    pub fn queue_capacity(&self) -> usize {
        (self.workers.max(1) * self.queue_multiplier).max(1)
    }
}

type Reply<Resp> = oneshot::Sender<Result<Resp, PoolError>>;

pub struct WorkerPool<Req, Resp> {
    config: PoolConfig,
    intake: Mutex<Option<mpsc::Sender<PoolRequest<Req, Resp>>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    active: Arc<AtomicUsize>,
    shutting_down: AtomicBool,
    cancel: watch::Sender<bool>,
}

impl<Req, Resp> WorkerPool<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    /// Spawns the workers. Must be called from within a tokio runtime.
    pub fn start(config: PoolConfig, handlers: HashMap<RequestKind, PoolHandler<Req, Resp>>) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity());
        let receiver = Arc::new(AsyncMutex::new(receiver));
        let handlers = Arc::new(handlers);
        let (cancel, _) = watch::channel(false);
        let active = Arc::new(AtomicUsize::new(0));
        let workers = (0..config.workers.max(1))
            .map(|id| {
                let worker = Worker {
                    id,
                    receiver: Arc::clone(&receiver),
                    handlers: Arc::clone(&handlers),
                    active: Arc::clone(&active),
                    cancel: cancel.subscribe(),
                };
                tokio::spawn(worker.run())
            })
            .collect::<Vec<_>>();
        info!(
            "👷️ Worker pool started with {} workers and room for {} queued requests",
            workers.len(),
            config.queue_capacity()
        );
        Self {
            config,
            intake: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            active,
            shutting_down: AtomicBool::new(false),
            cancel,
        }
    }

    pub fn config(&self) -> PoolConfig {
        self.config
    }

    /// The number of requests a worker is busy with right now.
    pub fn active_jobs(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Queues a request without waiting. A full queue is an immediate [`PoolError::PoolFull`].
    pub fn submit(&self, request: PoolRequest<Req, Resp>) -> Result<(), PoolError> {
        if self.is_shutting_down() {
            return Err(PoolError::ShuttingDown);
        }
        let intake = self.intake.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = intake.as_ref() else {
            return Err(PoolError::ShuttingDown);
        };
        match sender.try_send(request) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(request)) => {
                warn!("👷️ Worker pool queue is full. Rejecting a {} request.", request.kind);
                Err(PoolError::PoolFull)
            },
            Err(TrySendError::Closed(_)) => Err(PoolError::ShuttingDown),
        }
    }

    /// Submits a request and waits for its reply.
    pub async fn execute(&self, ctx: RequestContext, kind: RequestKind, payload: Req) -> Result<Resp, PoolError> {
        let (request, reply) = PoolRequest::new(ctx, kind, payload);
        self.submit(request)?;
        reply.await.unwrap_or(Err(PoolError::Cancelled))
    }

    /// Stops accepting work, cancels what is in flight and waits for every worker to finish. Requests still queued
    /// are answered with [`PoolError::Cancelled`].
    pub async fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            debug!("👷️ Worker pool shutdown already in progress");
            return;
        }
        info!("👷️ Shutting down the worker pool. {} jobs in flight.", self.active_jobs());
        self.cancel.send_replace(true);
        self.intake.lock().unwrap_or_else(PoisonError::into_inner).take();
        let workers = std::mem::take(&mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner));
        for worker in workers {
            if let Err(e) = worker.await {
                error!("👷️ A worker did not stop cleanly. {e}");
            }
        }
        info!("👷️ Worker pool has drained");
    }
}

struct Worker<Req, Resp> {
    id: usize,
    receiver: Arc<AsyncMutex<mpsc::Receiver<PoolRequest<Req, Resp>>>>,
    handlers: Arc<HashMap<RequestKind, PoolHandler<Req, Resp>>>,
    active: Arc<AtomicUsize>,
    cancel: watch::Receiver<bool>,
}

impl<Req, Resp> Worker<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    async fn run(mut self) {
        trace!("👷️ Worker {} ready", self.id);
        loop {
            let next = {
                let mut receiver = self.receiver.lock().await;
                receiver.recv().await
            };
            let Some(request) = next else { break };
            self.handle(request).await;
        }
        trace!("👷️ Worker {} stopped", self.id);
    }

    async fn handle(&mut self, request: PoolRequest<Req, Resp>) {
        let PoolRequest { ctx, kind, payload, reply } = request;
        if ctx.is_cancelled() || *self.cancel.borrow() {
            debug!("👷️ Worker {} skipping a cancelled {kind} request", self.id);
            respond(reply, Err(PoolError::Cancelled), kind);
            return;
        }
        let Some(handler) = self.handlers.get(&kind).cloned() else {
            warn!("👷️ No handler for {kind} requests");
            respond(reply, Err(PoolError::UnknownKind(kind)), kind);
            return;
        };
        self.active.fetch_add(1, Ordering::SeqCst);
        let work = AssertUnwindSafe(handler(payload)).catch_unwind();
        let result = tokio::select! {
            result = timeout_at(ctx.deadline(), work) => match result {
                Ok(Ok(resp)) => Ok(resp),
                Ok(Err(_)) => {
                    error!("👷️ Worker {} caught a panic in a {kind} handler", self.id);
                    Err(PoolError::HandlerFailed)
                },
                Err(_) => Err(PoolError::Timeout),
            },
            _ = ctx.cancelled() => {
                debug!("👷️ Worker {} abandoning a {kind} request that was cancelled mid-flight", self.id);
                Err(PoolError::Cancelled)
            },
            _ = cancelled(&mut self.cancel) => Err(PoolError::Cancelled),
        };
        self.active.fetch_sub(1, Ordering::SeqCst);
        respond(reply, result, kind);
    }
}

/// Resolves once the pool broadcasts cancellation.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    while !*cancel.borrow_and_update() {
        if cancel.changed().await.is_err() {
            // The pool is gone without shutting down. Nothing will ever cancel us.
            std::future::pending::<()>().await;
        }
    }
}

/// A oneshot send never blocks. A caller that stopped listening simply does not get the reply.
fn respond<Resp>(reply: Reply<Resp>, result: Result<Resp, PoolError>, kind: RequestKind) {
    if reply.send(result).is_err() {
        trace!("👷️ Nobody is waiting for the {kind} reply anymore");
    }
}
