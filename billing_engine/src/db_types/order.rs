use std::fmt::Display;

use billing_common::{CurrencyCode, Money};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{MerchantId, OrderId};

//--------------------------------------   OrderStatus   -------------------------------------------------------------
/// The private (internal) status of an order.
///
/// An order moves through the payment system first, and then through the merchant's project:
///
/// ```text
/// New ──> PaymentSystemCreate ──> PaymentSystemComplete ──> ProjectInProgress ──> ProjectComplete
///  │              │                        │                ProjectPending    ──> ProjectReject
///  │              ├──> PaymentSystemReject                  ProjectComplete
///  │              ├──> PaymentSystemDeclined                ProjectReject
///  ├──> PaymentSystemRejectOnCreate                         Refund / Chargeback
///  └──> PaymentSystemCanceled <───┘
/// ```
/// Any paid status (`PaymentSystemComplete` and the `Project*` statuses except `ProjectReject`) can move to `Refund`
/// or `Chargeback`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    New,
    PaymentSystemCreate,
    PaymentSystemRejectOnCreate,
    PaymentSystemReject,
    PaymentSystemComplete,
    PaymentSystemDeclined,
    PaymentSystemCanceled,
    ProjectInProgress,
    ProjectComplete,
    ProjectPending,
    ProjectReject,
    Refund,
    Chargeback,
}

/// The status of an order as shown to merchants and customers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublicOrderStatus {
    Created,
    Canceled,
    Rejected,
    Processed,
    Refunded,
    Chargeback,
    Pending,
}

impl OrderStatus {
    /// True once no further payment-flow transition can change the order's financial outcome.
    pub fn has_ended_status(&self) -> bool {
        matches!(
            self,
            OrderStatus::PaymentSystemReject |
                OrderStatus::ProjectComplete |
                OrderStatus::ProjectReject |
                OrderStatus::Refund |
                OrderStatus::Chargeback
        )
    }

    /// True if money has been collected for the order, i.e. it contributes a sale to royalty reports.
    pub fn is_paid(&self) -> bool {
        matches!(
            self,
            OrderStatus::PaymentSystemComplete |
                OrderStatus::ProjectInProgress |
                OrderStatus::ProjectComplete |
                OrderStatus::ProjectPending |
                OrderStatus::Refund |
                OrderStatus::Chargeback
        )
    }

    pub fn refund_allowed(&self) -> bool {
        matches!(
            self,
            OrderStatus::PaymentSystemComplete |
                OrderStatus::ProjectInProgress |
                OrderStatus::ProjectComplete |
                OrderStatus::ProjectPending
        )
    }

    pub fn public_status(&self) -> PublicOrderStatus {
        use OrderStatus::*;
        match self {
            New | PaymentSystemCreate => PublicOrderStatus::Created,
            PaymentSystemCanceled => PublicOrderStatus::Canceled,
            PaymentSystemRejectOnCreate | PaymentSystemReject | PaymentSystemDeclined | ProjectReject => {
                PublicOrderStatus::Rejected
            },
            PaymentSystemComplete | ProjectComplete => PublicOrderStatus::Processed,
            ProjectInProgress | ProjectPending => PublicOrderStatus::Pending,
            Refund => PublicOrderStatus::Refunded,
            Chargeback => PublicOrderStatus::Chargeback,
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (New, PaymentSystemCreate | PaymentSystemRejectOnCreate | PaymentSystemCanceled) => true,
            (
                PaymentSystemCreate,
                PaymentSystemComplete | PaymentSystemReject | PaymentSystemDeclined | PaymentSystemCanceled,
            ) => true,
            (
                PaymentSystemComplete,
                ProjectInProgress | ProjectPending | ProjectComplete | ProjectReject | Refund | Chargeback,
            ) => true,
            (ProjectInProgress | ProjectPending, ProjectComplete | ProjectReject | Refund | Chargeback) => true,
            (ProjectInProgress, ProjectPending) | (ProjectPending, ProjectInProgress) => true,
            (ProjectComplete, Refund | Chargeback) => true,
            _ => false,
        }
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::New => "new",
            OrderStatus::PaymentSystemCreate => "payment_system_create",
            OrderStatus::PaymentSystemRejectOnCreate => "payment_system_reject_on_create",
            OrderStatus::PaymentSystemReject => "payment_system_reject",
            OrderStatus::PaymentSystemComplete => "payment_system_complete",
            OrderStatus::PaymentSystemDeclined => "payment_system_declined",
            OrderStatus::PaymentSystemCanceled => "payment_system_canceled",
            OrderStatus::ProjectInProgress => "project_in_progress",
            OrderStatus::ProjectComplete => "project_complete",
            OrderStatus::ProjectPending => "project_pending",
            OrderStatus::ProjectReject => "project_reject",
            OrderStatus::Refund => "refund",
            OrderStatus::Chargeback => "chargeback",
        };
        write!(f, "{s}")
    }
}

//--------------------------------------   Order parts   -------------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: String,
    /// The method name used to look up cost rules, e.g. `"VISA"` or `"QIWI"`.
    pub name: String,
    pub group: String,
}

impl PaymentMethod {
    pub fn new(name: &str) -> Self {
        Self { id: name.to_ascii_lowercase(), name: name.to_string(), group: String::default() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: String,
    pub name: String,
    pub amount: Money,
}

/// Tax applied at checkout by the tax service. `amount` is included in the order total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTax {
    #[serde(rename = "type")]
    pub kind: String,
    pub rate: Decimal,
    pub amount: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndoReason {
    Refund,
    Chargeback,
}

impl Display for UndoReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UndoReason::Refund => write!(f, "refund"),
            UndoReason::Chargeback => write!(f, "chargeback"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRefund {
    pub amount: Money,
    pub reason: UndoReason,
    #[serde(default)]
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

impl OrderRefund {
    pub fn new(amount: Money, reason: UndoReason, created_at: DateTime<Utc>) -> Self {
        Self { amount, reason, comment: String::default(), created_at }
    }
}

//--------------------------------------       Order       -----------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub merchant_id: MerchantId,
    pub project_id: String,
    /// The total charged to the customer, in the payment currency. Includes tax.
    pub total: Money,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    /// ISO-3166 alpha-2 country of the customer.
    pub country: String,
    pub region: String,
    pub items: Vec<OrderItem>,
    pub tax: Option<OrderTax>,
    pub refund: Option<OrderRefund>,
    /// The time the payment system closed the payment. Fees are computed against the rates at this moment.
    pub transaction_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(id: OrderId, merchant_id: MerchantId, total: Money, method: PaymentMethod) -> Self {
        let now = Utc::now();
        Self {
            id,
            merchant_id,
            project_id: String::default(),
            total,
            payment_method: method,
            status: OrderStatus::New,
            country: String::default(),
            region: String::default(),
            items: vec![],
            tax: None,
            refund: None,
            transaction_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn currency(&self) -> CurrencyCode {
        self.total.currency
    }

    pub fn with_project(mut self, project_id: &str) -> Self {
        self.project_id = project_id.to_string();
        self
    }

    pub fn with_location(mut self, region: &str, country: &str) -> Self {
        self.region = region.to_string();
        self.country = country.to_string();
        self
    }

    pub fn with_item(mut self, id: &str, name: &str, amount: Money) -> Self {
        self.items.push(OrderItem { id: id.to_string(), name: name.to_string(), amount });
        self
    }

    pub fn with_tax(mut self, tax: OrderTax) -> Self {
        self.tax = Some(tax);
        self
    }

    /// Marks the order as paid at `paid_at`.
    pub fn completed_at(mut self, paid_at: DateTime<Utc>) -> Self {
        self.status = OrderStatus::PaymentSystemComplete;
        self.transaction_date = Some(paid_at);
        self.updated_at = paid_at;
        self
    }

    pub fn tax_amount(&self) -> Money {
        self.tax.as_ref().map(|t| t.amount).unwrap_or_else(|| Money::zero(self.currency()))
    }

    /// The name used for this order in per-product report lines: the first item's name, or the project id for
    /// item-less orders.
    pub fn product_name(&self) -> String {
        self.items.first().map(|i| i.name.clone()).unwrap_or_else(|| self.project_id.clone())
    }
}
