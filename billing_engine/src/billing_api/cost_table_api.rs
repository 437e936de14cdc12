use std::fmt::Debug;

use log::*;

use crate::{
    billing_api::errors::CostTableApiError,
    db::traits::CostTableManagement,
    db_types::{CostRule, CostTableKind},
};

/// `CostTableApi` maintains the four cost tables.
///
/// Edits are visible to every fee computation that starts after the edit returns.
pub struct CostTableApi<B> {
    db: B,
}

impl<B> Debug for CostTableApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CostTableApi")
    }
}

impl<B> CostTableApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> CostTableApi<B>
where B: CostTableManagement
{
    /// Inserts a batch of rules. Either every rule is stored or none is.
    pub async fn add_rules<R: CostRule>(&self, rules: &[R]) -> Result<usize, CostTableApiError> {
        for rule in rules {
            validate(rule)?;
        }
        let count = self.db.insert_cost_rules(rules).await.map_err(|e| CostTableApiError::DatabaseError(e.to_string()))?;
        info!("🧾️ {count} {} rules added", R::KIND);
        Ok(count)
    }

    pub async fn update_rule<R: CostRule>(&self, rule: &R) -> Result<bool, CostTableApiError> {
        validate(rule)?;
        let updated = self.db.update_cost_rule(rule).await.map_err(|e| CostTableApiError::DatabaseError(e.to_string()))?;
        if updated {
            debug!("🧾️ {} rule {} updated", R::KIND, rule.id());
        }
        Ok(updated)
    }

    pub async fn delete_rule(&self, kind: CostTableKind, id: &str) -> Result<bool, CostTableApiError> {
        let deleted =
            self.db.delete_cost_rule(kind, id).await.map_err(|e| CostTableApiError::DatabaseError(e.to_string()))?;
        if deleted {
            debug!("🧾️ {kind} rule {id} deleted");
        }
        Ok(deleted)
    }

    pub async fn fetch_rule<R: CostRule>(&self, id: &str) -> Result<Option<R>, CostTableApiError> {
        self.db.fetch_cost_rule(id).await.map_err(|e| CostTableApiError::DatabaseError(e.to_string()))
    }

    pub async fn fetch_rules<R: CostRule>(&self) -> Result<Vec<R>, CostTableApiError> {
        self.db.fetch_cost_rules().await.map_err(|e| CostTableApiError::DatabaseError(e.to_string()))
    }
}

fn validate<R: CostRule>(rule: &R) -> Result<(), CostTableApiError> {
    if rule.id().trim().is_empty() {
        return Err(CostTableApiError::InvalidRule(format!("{} rules need an id", R::KIND)));
    }
    if rule.name().trim().is_empty() {
        return Err(CostTableApiError::InvalidRule(format!("{} rule {} has no payment method", R::KIND, rule.id())));
    }
    if rule.mcc_code().trim().is_empty() {
        return Err(CostTableApiError::InvalidRule(format!("{} rule {} has no MCC code", R::KIND, rule.id())));
    }
    if matches!(R::KIND, CostTableKind::PaymentChannelMerchant | CostTableKind::MoneyBackMerchant) &&
        rule.merchant_id().map_or(true, |m| m.as_str().is_empty())
    {
        return Err(CostTableApiError::InvalidRule(format!("{} rule {} has no merchant", R::KIND, rule.id())));
    }
    Ok(())
}
