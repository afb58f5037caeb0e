use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::Utc;
use log::*;
use payment_engine::{db_types::Payment, saga::ValidationCoordinator, PaymentFlowApi, SqliteDatabase};
use tokio::task::JoinHandle;

/// Starts the abandoned-validation sweeper. Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_validation_sweeper(coordinator: Arc<ValidationCoordinator>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        info!("🕰️ Validation sweeper started. Checkouts are abandoned after {}s", coordinator.timeout().as_secs());
        loop {
            timer.tick().await;
            trace!("🕰️ Running validation sweep");
            let abandoned = coordinator.sweep_expired(Instant::now());
            if !abandoned.is_empty() {
                warn!("🕰️ {} checkout validations timed out: {}", abandoned.len(), abandoned.join(", "));
            }
        }
    })
}

/// Starts the local payment expiry worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Each run expires pending payments that are past their gateway expiry time, then asks the gateway about payments
/// that have been pending for longer than `stale_age`, in case their webhook was lost.
pub fn start_expiry_worker(
    api: PaymentFlowApi<SqliteDatabase>,
    interval: Duration,
    stale_age: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        let stale_age = chrono::Duration::from_std(stale_age).unwrap_or_else(|_| chrono::Duration::hours(1));
        info!("🕰️ Payment expiry worker started");
        loop {
            timer.tick().await;
            trace!("🕰️ Running payment expiry job");
            match api.expire_overdue_payments(Utc::now()).await {
                Ok(expired) if expired.is_empty() => trace!("🕰️ No payments expired"),
                Ok(expired) => {
                    info!("🕰️ {} payments expired", expired.len());
                    debug!("🕰️ Expired payments: {}", payment_list(&expired));
                },
                Err(e) => {
                    error!("🕰️ Error running payment expiry job: {e}");
                },
            }
            match api.reconcile_stale_payments(Utc::now() - stale_age).await {
                Ok(changed) if changed.is_empty() => trace!("🕰️ No stale payments changed"),
                Ok(changed) => info!("🕰️ {} stale payments were settled by polling the gateway", changed.len()),
                Err(e) => error!("🕰️ Error polling stale payments: {e}"),
            }
        }
    })
}

fn payment_list(payments: &[Payment]) -> String {
    payments
        .iter()
        .map(|p| format!("[{}] order_id: {} user_id: {}", p.id, p.order_id, p.user_id))
        .collect::<Vec<String>>()
        .join(", ")
}
