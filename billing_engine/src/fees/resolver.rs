//! Cost and commission rule resolution.
//!
//! [`select_rule`] is the whole matching policy and is a pure function over a candidate list. [`CostResolver`] wraps
//! it with the store lookup, a per-batch candidate cache and the caller's timeout.
use std::{any::Any, collections::HashMap, fmt::Debug, sync::Arc, time::Duration};

use log::*;
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use crate::{
    db::traits::CostTableManagement,
    db_types::{CostCriteria, CostRule, GeoSpecificity},
    fees::CostResolutionError,
};

/// Picks the single most specific active rule for `criteria`.
///
/// A candidate is eligible when it is active, its exact-match keys agree with the criteria, its geography does not
/// name a different country or region, and its discriminator (amount band or days since payment) is in range.
/// Eligible rules are ranked by geographic specificity and then by discriminator. A tie at the top is an error:
/// a lookup never depends on the order rules happen to be stored in.
pub fn select_rule<R: CostRule>(candidates: &[R], criteria: &CostCriteria) -> Result<R, CostResolutionError> {
    let ranked = candidates
        .iter()
        .filter(|r| r.is_active() && r.applies_to(criteria))
        .filter_map(|r| {
            let geo = r.geography().specificity(&criteria.region, &criteria.country)?;
            let discriminator = r.discriminator(criteria)?;
            Some(((geo, discriminator), r))
        })
        .collect::<Vec<((GeoSpecificity, Decimal), &R)>>();
    let best = ranked.iter().map(|(rank, _)| *rank).max().ok_or_else(|| CostResolutionError::RuleNotFound {
        kind: R::KIND,
        criteria: criteria.to_string(),
    })?;
    let mut winners = ranked.into_iter().filter(|(rank, _)| *rank == best).map(|(_, r)| r).collect::<Vec<_>>();
    if winners.len() > 1 {
        let mut rule_ids = winners.iter().map(|r| r.id().to_string()).collect::<Vec<_>>();
        rule_ids.sort();
        warn!("💰️ Ambiguous {} rules for {criteria}: {}", R::KIND, rule_ids.join(", "));
        return Err(CostResolutionError::AmbiguousRule { kind: R::KIND, criteria: criteria.to_string(), rule_ids });
    }
    // Exactly one winner remains at this point
    winners.pop().cloned().ok_or_else(|| CostResolutionError::RuleNotFound {
        kind: R::KIND,
        criteria: criteria.to_string(),
    })
}

type CandidateCache = Arc<Mutex<HashMap<String, Arc<dyn Any + Send + Sync>>>>;

/// Resolves rules against a cost-table store, caching candidate lists for as long as the resolver lives.
///
/// A resolver belongs to one calculation batch. Edits to the cost tables are only seen by resolvers created after
/// the edit, so never keep one across batches.
#[derive(Clone)]
pub struct CostResolver<B> {
    db: B,
    cache: CandidateCache,
}

impl<B> Debug for CostResolver<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CostResolver")
    }
}

impl<B> CostResolver<B>
where B: CostTableManagement
{
    pub fn new(db: B) -> Self {
        Self { db, cache: Arc::new(Mutex::new(HashMap::new())) }
    }

    pub async fn resolve<R: CostRule>(
        &self,
        criteria: &CostCriteria,
        timeout: Duration,
    ) -> Result<R, CostResolutionError> {
        let candidates = self.candidates::<R>(criteria, timeout).await?;
        let rule = select_rule(candidates.as_slice(), criteria)?;
        trace!("💰️ Resolved {} rule {} for {criteria}", R::KIND, rule.id());
        Ok(rule)
    }

    async fn candidates<R: CostRule>(
        &self,
        criteria: &CostCriteria,
        timeout: Duration,
    ) -> Result<Arc<Vec<R>>, CostResolutionError> {
        let key = criteria.store_key(R::KIND);
        let cached = self.cache.lock().await.get(&key).cloned();
        if let Some(hit) = cached {
            if let Ok(rules) = hit.downcast::<Vec<R>>() {
                return Ok(rules);
            }
        }
        let rules = match tokio::time::timeout(timeout, self.db.find_cost_rules::<R>(criteria)).await {
            Ok(rules) => rules.map_err(|e| CostResolutionError::StoreError(e.to_string()))?,
            Err(_) => {
                warn!("💰️ Cost store timed out after {}ms looking up {} rules", timeout.as_millis(), R::KIND);
                return Err(CostResolutionError::Timeout(R::KIND));
            },
        };
        let rules = Arc::new(rules);
        self.cache.lock().await.insert(key, Arc::clone(&rules) as Arc<dyn Any + Send + Sync>);
        Ok(rules)
    }
}
