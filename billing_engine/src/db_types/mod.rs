//! Domain types shared by the engine and its storage backends.
//!
//! These are plain data types. The fee calculators, the report lifecycle and the payout builder operate on them
//! directly; storage backends serialize them through their own adapters and never expose storage-specific shapes.
mod cost_rules;
mod ledger;
mod merchant;
mod order;
mod order_view;
mod payout;
mod royalty_report;

pub use cost_rules::{
    CostCriteria,
    CostRule,
    CostTableKind,
    GeoSpecificity,
    MoneyBackCostMerchant,
    MoneyBackCostSystem,
    PaymentChannelCostMerchant,
    PaymentChannelCostSystem,
    RuleGeography,
};
pub use ledger::{ledger_adjustment, AccountingEntry, EntrySource, EntryType, MerchantBalance};
pub use merchant::{Merchant, MerchantBanking};
pub use order::{Order, OrderItem, OrderRefund, OrderStatus, OrderTax, PaymentMethod, PublicOrderStatus, UndoReason};
pub use order_view::{OrderView, OrderViewPublic, RefundBreakdown, SaleBreakdown};
pub use payout::{PayoutDocument, PayoutDocumentChange, PayoutStatus};
pub use royalty_report::{
    ChangeSource,
    ReportPeriod,
    ReportStatus,
    ReportSummary,
    ReportTotals,
    RoyaltyReport,
    RoyaltyReportChange,
    SummaryItem,
};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::convert::Infallible;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.to_string()))
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(
    /// The merchant's identifier, as assigned by the merchant onboarding service.
    MerchantId
);
string_id!(OrderId);
string_id!(
    /// Royalty report identifiers are random UUIDs, generated when the report is first created.
    ReportId
);
string_id!(PayoutId);

impl ReportId {
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl PayoutId {
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}
