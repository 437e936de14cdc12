use crate::db_types::{CostCriteria, CostRule, CostTableKind};

/// Administrative CRUD and criteria queries for the four cost tables.
///
/// All methods are generic over the rule type; the table is selected by [`CostRule::KIND`].
#[allow(async_fn_in_trait)]
pub trait CostTableManagement {
    type Error: std::error::Error;

    /// Inserts all rules in a single transaction. Returns the number of rules written.
    async fn insert_cost_rules<R: CostRule>(&self, rules: &[R]) -> Result<usize, Self::Error>;

    /// Returns false if no rule with this id exists in the rule's table.
    async fn update_cost_rule<R: CostRule>(&self, rule: &R) -> Result<bool, Self::Error>;

    async fn delete_cost_rule(&self, kind: CostTableKind, id: &str) -> Result<bool, Self::Error>;

    async fn fetch_cost_rule<R: CostRule>(&self, id: &str) -> Result<Option<R>, Self::Error>;

    /// All rules of a table, active or not.
    async fn fetch_cost_rules<R: CostRule>(&self) -> Result<Vec<R>, Self::Error>;

    /// The candidate rules for a lookup: active rules whose method name, MCC code and (for merchant tables)
    /// merchant id match the criteria. Geography and discriminators are left to the resolver.
    async fn find_cost_rules<R: CostRule>(&self, criteria: &CostCriteria) -> Result<Vec<R>, Self::Error>;
}
