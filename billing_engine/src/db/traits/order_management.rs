use crate::{
    db::traits::{InsertOrderResult, OrderViewFilter},
    db_types::{AccountingEntry, Order, OrderId, OrderView},
};

/// The `OrderManagement` trait defines the behaviour for storing and querying orders and their derived views.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    type Error: std::error::Error;

    /// Stores a new order. If an order with the same id exists, nothing is written and `AlreadyExists` is returned.
    async fn insert_order(&self, order: &Order) -> Result<InsertOrderResult, Self::Error>;

    /// Replaces the stored order. Returns false if the order does not exist.
    async fn update_order(&self, order: &Order) -> Result<bool, Self::Error>;

    async fn fetch_order(&self, id: &OrderId) -> Result<Option<Order>, Self::Error>;

    /// Stores the view, replacing any previous view for the same order, and in the same transaction brings the order's
    /// ledger entries in line with `entries`.
    ///
    /// For every expected entry, whatever is missing from the amounts already posted for its type and source is posted
    /// as an adjustment (see [`crate::db_types::ledger_adjustment`]). Returns the entries that were posted.
    async fn save_order_view(
        &self,
        view: &OrderView,
        entries: &[AccountingEntry],
    ) -> Result<Vec<AccountingEntry>, Self::Error>;

    async fn fetch_order_view(&self, id: &OrderId) -> Result<Option<OrderView>, Self::Error>;

    /// Fetches views according to the filter, ordered by transaction date.
    ///
    /// When both a transaction window and a refund window are given, views matching *either* window are returned.
    async fn fetch_order_views(&self, filter: OrderViewFilter) -> Result<Vec<OrderView>, Self::Error>;
}
