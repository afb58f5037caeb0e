use chrono::{DateTime, Utc};
use mockall::mock;
use payment_engine::{
    db_types::{GatewayFields, NewPayment, Payment, PaymentPage, PaymentStats, PaymentStatus},
    PaymentStore,
    PaymentStoreError,
};

mock! {
    pub Store {}
    impl Clone for Store {
        fn clone(&self) -> Self;
    }
    impl PaymentStore for Store {
        fn url(&self) -> &str;
        async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, PaymentStoreError>;
        async fn fetch_payment(&self, id: &str) -> Result<Option<Payment>, PaymentStoreError>;
        async fn fetch_payment_by_order_id(&self, order_id: &str) -> Result<Option<Payment>, PaymentStoreError>;
        async fn fetch_payments_for_user(
            &self,
            user_id: &str,
            page: u32,
            limit: u32,
        ) -> Result<PaymentPage, PaymentStoreError>;
        async fn merge_gateway_fields(
            &self,
            id: &str,
            fields: GatewayFields,
        ) -> Result<Option<Payment>, PaymentStoreError>;
        async fn transition_status(
            &self,
            id: &str,
            from: PaymentStatus,
            to: PaymentStatus,
            fields: GatewayFields,
        ) -> Result<Option<Payment>, PaymentStoreError>;
        async fn fetch_overdue_pending(&self, now: DateTime<Utc>) -> Result<Vec<Payment>, PaymentStoreError>;
        async fn fetch_stale_pending(&self, older_than: DateTime<Utc>) -> Result<Vec<Payment>, PaymentStoreError>;
        async fn payment_stats(&self) -> Result<PaymentStats, PaymentStoreError>;
    }
}
