use crate::{
    db::traits::{CreatePayoutResult, UpdateResult},
    db_types::{MerchantId, PayoutDocument, PayoutDocumentChange, PayoutId},
};

#[allow(async_fn_in_trait)]
pub trait PayoutManagement {
    type Error: std::error::Error;

    /// Takes a new payout document, and in a single atomic transaction,
    /// * marks every source report with the document id. A report that is not `accepted`, or is already attached to
    ///   a payout document, aborts the transaction and is returned as `ReportUnavailable`.
    /// * stores the document and its creation audit record.
    async fn create_payout_document(
        &self,
        document: &PayoutDocument,
        change: &PayoutDocumentChange,
    ) -> Result<CreatePayoutResult, Self::Error>;

    /// Writes `document` if the stored version still equals `expected_version`.
    ///
    /// If `release_reports` is true, the source reports are detached from the document in the same transaction so
    /// they can be paid out again.
    async fn update_payout_document(
        &self,
        document: &PayoutDocument,
        expected_version: i64,
        change: &PayoutDocumentChange,
        release_reports: bool,
    ) -> Result<UpdateResult<PayoutDocument>, Self::Error>;

    async fn fetch_payout_document(&self, id: &PayoutId) -> Result<Option<PayoutDocument>, Self::Error>;

    async fn fetch_payout_documents(&self, merchant_id: &MerchantId) -> Result<Vec<PayoutDocument>, Self::Error>;

    async fn fetch_payout_changes(&self, id: &PayoutId) -> Result<Vec<PayoutDocumentChange>, Self::Error>;
}
