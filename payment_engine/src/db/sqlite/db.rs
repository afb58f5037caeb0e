use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqlitePool;

use super::{db_url, new_pool, payments, SqliteDatabaseError};
use crate::{
    db::traits::{PaymentStore, PaymentStoreError},
    db_types::{GatewayFields, NewPayment, Payment, PaymentPage, PaymentStats, PaymentStatus},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SqliteDatabase ({})", self.url)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in `CPG_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let url = db_url();
        SqliteDatabase::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let pool = new_pool(url, max_connections).await?;
        trace!("🗃️ Created new Sqlite connection pool for {url}");
        Ok(Self { url: url.to_string(), pool })
    }

    /// Brings the schema up to date. Safe to call on every startup.
    pub async fn run_migrations(&self) -> Result<(), SqliteDatabaseError> {
        sqlx::migrate!("./src/db/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl PaymentStore for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::insert_payment(payment, &mut conn).await?;
        Ok(payment)
    }

    async fn fetch_payment(&self, id: &str) -> Result<Option<Payment>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::fetch_payment(id, &mut conn).await?;
        Ok(payment)
    }

    async fn fetch_payment_by_order_id(&self, order_id: &str) -> Result<Option<Payment>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::fetch_payment_by_order_id(order_id, &mut conn).await?;
        Ok(payment)
    }

    async fn fetch_payments_for_user(
        &self,
        user_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<PaymentPage, PaymentStoreError> {
        let mut tx = self.pool.begin().await?;
        let page = payments::fetch_payments_for_user(user_id, page, limit, &mut tx).await?;
        tx.commit().await?;
        Ok(page)
    }

    async fn merge_gateway_fields(
        &self,
        id: &str,
        fields: GatewayFields,
    ) -> Result<Option<Payment>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::merge_gateway_fields(id, fields, &mut conn).await?;
        Ok(payment)
    }

    async fn transition_status(
        &self,
        id: &str,
        from: PaymentStatus,
        to: PaymentStatus,
        fields: GatewayFields,
    ) -> Result<Option<Payment>, PaymentStoreError> {
        if !from.can_transition_to(to) {
            warn!("🗃️ Refusing to move payment {id} from {from} to {to}");
            return Ok(None);
        }
        let mut conn = self.pool.acquire().await?;
        let payment = payments::transition_status(id, from, to, fields, &mut conn).await?;
        Ok(payment)
    }

    async fn fetch_overdue_pending(&self, now: DateTime<Utc>) -> Result<Vec<Payment>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let overdue = payments::fetch_overdue_pending(now, &mut conn).await?;
        Ok(overdue)
    }

    async fn fetch_stale_pending(&self, older_than: DateTime<Utc>) -> Result<Vec<Payment>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let stale = payments::fetch_stale_pending(older_than, &mut conn).await?;
        Ok(stale)
    }

    async fn payment_stats(&self) -> Result<PaymentStats, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let stats = payments::payment_stats(&mut conn).await?;
        Ok(stats)
    }

    async fn close(&mut self) -> Result<(), PaymentStoreError> {
        self.pool.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use chrono::Duration;
    use cpg_common::{PaymentMethod, Rupiah};

    use super::*;

    async fn memory_db() -> SqliteDatabase {
        let _ = env_logger::try_init();
        let db = SqliteDatabase::new_with_url("sqlite::memory:", 1).await.expect("Error creating in-memory database");
        db.run_migrations().await.expect("Error running migrations");
        db
    }

    fn new_payment(order_id: &str, user_id: &str) -> NewPayment {
        NewPayment::new(
            order_id.to_string(),
            user_id.to_string(),
            Rupiah::from(100_000),
            Rupiah::from(2_500),
            PaymentMethod::BankTransfer,
        )
        .with_product_id("prod-1".to_string())
    }

    #[tokio::test]
    async fn insert_and_fetch() {
        let db = memory_db().await;
        let payment = db.insert_payment(new_payment("Order_1", "alice")).await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.total_amount, Rupiah::from(102_500));
        assert_eq!(payment.product_id.as_deref(), Some("prod-1"));
        let fetched = db.fetch_payment(&payment.id).await.unwrap().unwrap();
        assert_eq!(fetched.order_id, "Order_1");
        let by_order = db.fetch_payment_by_order_id("Order_1").await.unwrap().unwrap();
        assert_eq!(by_order.id, payment.id);
        assert!(db.fetch_payment("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_order_ids_are_rejected() {
        let db = memory_db().await;
        db.insert_payment(new_payment("Order_dup", "alice")).await.unwrap();
        let err = db.insert_payment(new_payment("Order_dup", "bob")).await.unwrap_err();
        assert!(matches!(err, PaymentStoreError::DuplicateOrder(id) if id == "Order_dup"));
    }

    #[tokio::test]
    async fn merge_never_erases_values() {
        let db = memory_db().await;
        let payment = db.insert_payment(new_payment("Order_2", "alice")).await.unwrap();
        let fields = GatewayFields {
            va_number: Some("9880123".to_string()),
            bank_type: Some("bni".to_string()),
            ..Default::default()
        };
        db.merge_gateway_fields(&payment.id, fields).await.unwrap();
        let fields = GatewayFields { transaction_status: Some("pending".to_string()), ..Default::default() };
        let merged = db.merge_gateway_fields(&payment.id, fields).await.unwrap().unwrap();
        assert_eq!(merged.va_number.as_deref(), Some("9880123"));
        assert_eq!(merged.bank_type.as_deref(), Some("bni"));
        assert_eq!(merged.transaction_status.as_deref(), Some("pending"));
        assert_eq!(merged.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn conditional_transition() {
        let db = memory_db().await;
        let payment = db.insert_payment(new_payment("Order_3", "alice")).await.unwrap();
        let paid_at = Utc::now();
        let fields = GatewayFields { paid_at: Some(paid_at), ..Default::default() };
        let updated = db
            .transition_status(&payment.id, PaymentStatus::Pending, PaymentStatus::Success, fields)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, PaymentStatus::Success);
        assert!(updated.paid_at.is_some());
        // The second writer loses
        let lost = db
            .transition_status(&payment.id, PaymentStatus::Pending, PaymentStatus::Failed, GatewayFields::default())
            .await
            .unwrap();
        assert!(lost.is_none());
        // Illegal transitions are refused outright
        let illegal = db
            .transition_status(&payment.id, PaymentStatus::Success, PaymentStatus::Pending, GatewayFields::default())
            .await
            .unwrap();
        assert!(illegal.is_none());
        let stored = db.fetch_payment(&payment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Success);
    }

    #[tokio::test]
    async fn pages_of_user_payments() {
        let db = memory_db().await;
        for i in 0..5 {
            db.insert_payment(new_payment(&format!("Order_a{i}"), "alice")).await.unwrap();
        }
        db.insert_payment(new_payment("Order_b0", "bob")).await.unwrap();
        let page = db.fetch_payments_for_user("alice", 1, 2).await.unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.payments.len(), 2);
        assert!(page.has_more);
        let page = db.fetch_payments_for_user("alice", 3, 2).await.unwrap();
        assert_eq!(page.payments.len(), 1);
        assert!(!page.has_more);
        assert!(page.payments.iter().all(|p| p.user_id == "alice"));
    }

    #[tokio::test]
    async fn overdue_and_stale_payments() {
        let db = memory_db().await;
        let now = Utc::now();
        let overdue = db.insert_payment(new_payment("Order_o", "alice")).await.unwrap();
        let fresh = db.insert_payment(new_payment("Order_f", "alice")).await.unwrap();
        let past = GatewayFields { expiry_time: Some(now - Duration::minutes(5)), ..Default::default() };
        let future = GatewayFields { expiry_time: Some(now + Duration::hours(24)), ..Default::default() };
        db.merge_gateway_fields(&overdue.id, past).await.unwrap();
        db.merge_gateway_fields(&fresh.id, future).await.unwrap();
        let result = db.fetch_overdue_pending(now).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, overdue.id);

        let stale = db.fetch_stale_pending(now + Duration::seconds(60)).await.unwrap();
        assert_eq!(stale.len(), 2);
        let stale = db.fetch_stale_pending(now - Duration::seconds(60)).await.unwrap();
        assert!(stale.is_empty());
    }

    #[tokio::test]
    async fn stats_per_status() {
        let db = memory_db().await;
        let a = db.insert_payment(new_payment("Order_s1", "alice")).await.unwrap();
        db.insert_payment(new_payment("Order_s2", "alice")).await.unwrap();
        db.transition_status(&a.id, PaymentStatus::Pending, PaymentStatus::Success, GatewayFields::default())
            .await
            .unwrap();
        let stats = db.payment_stats().await.unwrap();
        assert_eq!(stats.total_count, 2);
        let success = stats.status_counts.iter().find(|c| c.status == PaymentStatus::Success).unwrap();
        assert_eq!(success.count, 1);
        let amount = stats.amount_by_status.iter().find(|c| c.status == PaymentStatus::Pending).unwrap();
        assert_eq!(amount.amount, Rupiah::from(102_500));
    }
}
