use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{
        GatewayFields,
        NewPayment,
        Payment,
        PaymentPage,
        PaymentStats,
        PaymentStatus,
        Rupiah,
        StatusAmount,
        StatusCount,
    },
};

/// Inserts a new payment into the database using the given connection. This is not atomic. You can embed this call
/// inside a transaction if you need to ensure atomicity, and pass `&mut *tx` as the connection argument.
pub async fn insert_payment(payment: NewPayment, conn: &mut SqliteConnection) -> Result<Payment, SqliteDatabaseError> {
    let now = Utc::now();
    let order_id = payment.order_id.clone();
    let result = sqlx::query_as::<_, Payment>(
        r#"
            INSERT INTO payments (
                id,
                order_id,
                user_id,
                product_id,
                amount,
                admin_fee,
                total_amount,
                payment_method,
                payment_type,
                status,
                notes,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *;
        "#,
    )
    .bind(payment.id)
    .bind(payment.order_id)
    .bind(payment.user_id)
    .bind(payment.product_id)
    .bind(payment.amount)
    .bind(payment.admin_fee)
    .bind(payment.total_amount)
    .bind(payment.payment_method)
    .bind(payment.payment_type)
    .bind(PaymentStatus::Pending)
    .bind(payment.notes)
    .bind(now)
    .bind(now)
    .fetch_one(conn)
    .await;
    match result {
        Ok(p) => {
            debug!("🗃️ Payment {} for order {} saved with total {}", p.id, p.order_id, p.total_amount);
            Ok(p)
        },
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(SqliteDatabaseError::DuplicateOrder(order_id)),
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_payment(id: &str, conn: &mut SqliteConnection) -> Result<Option<Payment>, SqliteDatabaseError> {
    let payment =
        sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(payment)
}

pub async fn fetch_payment_by_order_id(
    order_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, SqliteDatabaseError> {
    let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE order_id = $1")
        .bind(order_id)
        .fetch_optional(conn)
        .await?;
    Ok(payment)
}

pub async fn fetch_payments_for_user(
    user_id: &str,
    page: u32,
    limit: u32,
    conn: &mut SqliteConnection,
) -> Result<PaymentPage, SqliteDatabaseError> {
    let page = page.max(1);
    let offset = i64::from(page - 1) * i64::from(limit);
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;
    let payments = sqlx::query_as::<_, Payment>(
        r#"
            SELECT * FROM payments
            WHERE user_id = $1
            ORDER BY julianday(created_at) DESC, id DESC
            LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(i64::from(limit))
    .bind(offset)
    .fetch_all(conn)
    .await?;
    trace!("🗃️ Fetched {} of {total} payments for user {user_id}", payments.len());
    Ok(PaymentPage::new(payments, total, page, limit))
}

pub async fn merge_gateway_fields(
    id: &str,
    fields: GatewayFields,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, SqliteDatabaseError> {
    let payment = sqlx::query_as::<_, Payment>(
        r#"
            UPDATE payments SET
                transaction_id = COALESCE($1, transaction_id),
                transaction_status = COALESCE($2, transaction_status),
                fraud_status = COALESCE($3, fraud_status),
                payment_type = COALESCE($4, payment_type),
                payment_code = COALESCE($5, payment_code),
                va_number = COALESCE($6, va_number),
                bank_type = COALESCE($7, bank_type),
                store_type = COALESCE($8, store_type),
                redirect_url = COALESCE($9, redirect_url),
                expiry_time = COALESCE($10, expiry_time),
                paid_at = COALESCE($11, paid_at),
                gateway_response = COALESCE($12, gateway_response),
                gateway_actions = COALESCE($13, gateway_actions),
                updated_at = $14
            WHERE id = $15
            RETURNING *;
        "#,
    )
    .bind(fields.transaction_id)
    .bind(fields.transaction_status)
    .bind(fields.fraud_status)
    .bind(fields.payment_type)
    .bind(fields.payment_code)
    .bind(fields.va_number)
    .bind(fields.bank_type)
    .bind(fields.store_type)
    .bind(fields.redirect_url)
    .bind(fields.expiry_time)
    .bind(fields.paid_at)
    .bind(fields.gateway_response)
    .bind(fields.gateway_actions)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(payment)
}

/// Changes the status only if it is still `from`. The gateway fields are merged in the same statement so that a status
/// change is never visible without the data that caused it.
pub async fn transition_status(
    id: &str,
    from: PaymentStatus,
    to: PaymentStatus,
    fields: GatewayFields,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, SqliteDatabaseError> {
    let payment = sqlx::query_as::<_, Payment>(
        r#"
            UPDATE payments SET
                status = $1,
                transaction_id = COALESCE($2, transaction_id),
                transaction_status = COALESCE($3, transaction_status),
                fraud_status = COALESCE($4, fraud_status),
                payment_type = COALESCE($5, payment_type),
                payment_code = COALESCE($6, payment_code),
                va_number = COALESCE($7, va_number),
                bank_type = COALESCE($8, bank_type),
                store_type = COALESCE($9, store_type),
                redirect_url = COALESCE($10, redirect_url),
                expiry_time = COALESCE($11, expiry_time),
                paid_at = COALESCE($12, paid_at),
                gateway_response = COALESCE($13, gateway_response),
                gateway_actions = COALESCE($14, gateway_actions),
                updated_at = $15
            WHERE id = $16 AND status = $17
            RETURNING *;
        "#,
    )
    .bind(to)
    .bind(fields.transaction_id)
    .bind(fields.transaction_status)
    .bind(fields.fraud_status)
    .bind(fields.payment_type)
    .bind(fields.payment_code)
    .bind(fields.va_number)
    .bind(fields.bank_type)
    .bind(fields.store_type)
    .bind(fields.redirect_url)
    .bind(fields.expiry_time)
    .bind(fields.paid_at)
    .bind(fields.gateway_response)
    .bind(fields.gateway_actions)
    .bind(Utc::now())
    .bind(id)
    .bind(from)
    .fetch_optional(conn)
    .await?;
    match &payment {
        Some(_) => debug!("🗃️ Payment {id} moved from {from} to {to}"),
        None => debug!("🗃️ Payment {id} is no longer {from}. Not moving it to {to}"),
    }
    Ok(payment)
}

pub async fn fetch_overdue_pending(
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Payment>, SqliteDatabaseError> {
    let payments = sqlx::query_as::<_, Payment>(
        r#"
            SELECT * FROM payments
            WHERE status = $1 AND expiry_time IS NOT NULL AND julianday(expiry_time) < julianday($2)
            ORDER BY julianday(expiry_time) ASC
        "#,
    )
    .bind(PaymentStatus::Pending)
    .bind(now)
    .fetch_all(conn)
    .await?;
    Ok(payments)
}

pub async fn fetch_stale_pending(
    older_than: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Payment>, SqliteDatabaseError> {
    let payments = sqlx::query_as::<_, Payment>(
        r#"
            SELECT * FROM payments
            WHERE status = $1 AND julianday(created_at) < julianday($2)
            ORDER BY julianday(created_at) ASC
        "#,
    )
    .bind(PaymentStatus::Pending)
    .bind(older_than)
    .fetch_all(conn)
    .await?;
    Ok(payments)
}

pub async fn payment_stats(conn: &mut SqliteConnection) -> Result<PaymentStats, SqliteDatabaseError> {
    let rows: Vec<(PaymentStatus, i64, Rupiah)> = sqlx::query_as(
        r#"
            SELECT status, COUNT(*), COALESCE(SUM(total_amount), 0)
            FROM payments
            GROUP BY status
            ORDER BY status
        "#,
    )
    .fetch_all(conn)
    .await?;
    let stats = rows.into_iter().fold(PaymentStats::default(), |mut stats, (status, count, amount)| {
        stats.total_count += count;
        stats.status_counts.push(StatusCount { status, count });
        stats.amount_by_status.push(StatusAmount { status, amount });
        stats
    });
    Ok(stats)
}
