//! Invoices, payments, payment links and subscriptions.

use super::{de, status_key, Normalize};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Paid,
    Unpaid,
    Overdue,
    Unknown,
}

impl InvoiceStatus {
    pub fn parse(raw: &str) -> Self {
        match status_key(raw).as_str() {
            "PAID" => InvoiceStatus::Paid,
            "UNPAID" | "PENDING" | "SENT" => InvoiceStatus::Unpaid,
            "OVERDUE" => InvoiceStatus::Overdue,
            _ => InvoiceStatus::Unknown,
        }
    }

    /// Unpaid and overdue invoices both still owe money.
    pub fn is_outstanding(&self) -> bool {
        matches!(self, InvoiceStatus::Unpaid | InvoiceStatus::Overdue)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub status: InvoiceStatus,
    pub client_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawInvoice {
    #[serde(default, deserialize_with = "de::opt_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub total: Option<Decimal>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, alias = "client_id", deserialize_with = "de::opt_id")]
    pub client_id: Option<String>,
    #[serde(default, alias = "created_at", deserialize_with = "de::opt_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "due_date", deserialize_with = "de::opt_timestamp")]
    pub due_date: Option<DateTime<Utc>>,
}

impl Normalize for RawInvoice {
    type Output = Invoice;

    fn normalize(self) -> Option<Invoice> {
        Some(Invoice {
            id: self.id?,
            amount: self.amount.or(self.total).unwrap_or_default(),
            status: self
                .status
                .as_deref()
                .map(InvoiceStatus::parse)
                .unwrap_or(InvoiceStatus::Unknown),
            client_id: self.client_id,
            created_at: self.created_at,
            due_date: self.due_date,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
    Unknown,
}

impl PaymentStatus {
    pub fn parse(raw: &str) -> Self {
        match status_key(raw).as_str() {
            "PENDING" | "PROCESSING" => PaymentStatus::Pending,
            "COMPLETED" | "SUCCEEDED" | "SUCCESS" => PaymentStatus::Completed,
            "FAILED" | "DECLINED" => PaymentStatus::Failed,
            "REFUNDED" => PaymentStatus::Refunded,
            _ => PaymentStatus::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub payment_method: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub processing_fee: Decimal,
    pub client_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPayment {
    #[serde(default, deserialize_with = "de::opt_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, alias = "payment_method")]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default, alias = "processing_fee")]
    pub processing_fee: Option<Decimal>,
    #[serde(default, alias = "client_id", deserialize_with = "de::opt_id")]
    pub client_id: Option<String>,
    #[serde(default, alias = "created_at", deserialize_with = "de::opt_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Normalize for RawPayment {
    type Output = Payment;

    fn normalize(self) -> Option<Payment> {
        Some(Payment {
            id: self.id?,
            amount: self.amount.unwrap_or_default(),
            status: self
                .status
                .as_deref()
                .map(PaymentStatus::parse)
                .unwrap_or(PaymentStatus::Unknown),
            payment_method: self.payment_method.or(self.method),
            processing_fee: self.processing_fee.unwrap_or_default(),
            client_id: self.client_id,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentLinkStatus {
    Active,
    Used,
    Expired,
    Cancelled,
    Unknown,
}

impl PaymentLinkStatus {
    pub fn parse(raw: &str) -> Self {
        match status_key(raw).as_str() {
            "ACTIVE" => PaymentLinkStatus::Active,
            "USED" | "PAID" => PaymentLinkStatus::Used,
            "EXPIRED" => PaymentLinkStatus::Expired,
            "CANCELLED" | "CANCELED" => PaymentLinkStatus::Cancelled,
            _ => PaymentLinkStatus::Unknown,
        }
    }
}

/// Client reference embedded in a payment link.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkClient {
    pub id: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLink {
    pub id: String,
    pub token: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub status: PaymentLinkStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub client: Option<LinkClient>,
}

impl PaymentLink {
    /// Active and not yet past its expiry.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.status == PaymentLinkStatus::Active
            && self.expires_at.map_or(true, |expires| expires > now)
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client.as_ref().and_then(|client| client.id.as_deref())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLinkClient {
    #[serde(default, deserialize_with = "de::opt_id")]
    pub id: Option<String>,
    #[serde(default, alias = "full_name")]
    pub full_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPaymentLink {
    #[serde(default, deserialize_with = "de::opt_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default, alias = "secure_token")]
    pub secure_token: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, alias = "expires_at", deserialize_with = "de::opt_timestamp")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub client: Option<RawLinkClient>,
    #[serde(default, alias = "client_id", deserialize_with = "de::opt_id")]
    pub client_id: Option<String>,
}

impl Normalize for RawPaymentLink {
    type Output = PaymentLink;

    fn normalize(self) -> Option<PaymentLink> {
        let client = match (self.client, self.client_id) {
            (Some(raw), fallback_id) => Some(LinkClient {
                id: raw.id.or(fallback_id),
                full_name: raw.full_name.or(raw.name),
                email: raw.email,
            }),
            (None, Some(id)) => Some(LinkClient {
                id: Some(id),
                full_name: None,
                email: None,
            }),
            (None, None) => None,
        };
        Some(PaymentLink {
            id: self.id?,
            token: self.secure_token.or(self.token),
            amount: self.amount.unwrap_or_default(),
            status: self
                .status
                .as_deref()
                .map(PaymentLinkStatus::parse)
                .unwrap_or(PaymentLinkStatus::Unknown),
            expires_at: self.expires_at,
            client,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    Active,
    Paused,
    Cancelled,
    Expired,
    Unknown,
}

impl SubscriptionStatus {
    pub fn parse(raw: &str) -> Self {
        match status_key(raw).as_str() {
            "ACTIVE" | "TRIALING" => SubscriptionStatus::Active,
            "PAUSED" | "SUSPENDED" => SubscriptionStatus::Paused,
            "CANCELLED" | "CANCELED" => SubscriptionStatus::Cancelled,
            "EXPIRED" => SubscriptionStatus::Expired,
            _ => SubscriptionStatus::Unknown,
        }
    }
}

/// Sum of money amounts, clamped at the `Decimal` range.
pub fn money_total(amounts: impl IntoIterator<Item = Decimal>) -> Decimal {
    amounts
        .into_iter()
        .fold(Decimal::ZERO, |total, amount| total.saturating_add(amount))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingInterval {
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl BillingInterval {
    pub fn parse(raw: &str) -> Option<Self> {
        match status_key(raw).as_str() {
            "WEEKLY" | "WEEK" => Some(BillingInterval::Weekly),
            "MONTHLY" | "MONTH" => Some(BillingInterval::Monthly),
            "QUARTERLY" | "QUARTER" => Some(BillingInterval::Quarterly),
            "YEARLY" | "ANNUAL" | "ANNUALLY" | "YEAR" => Some(BillingInterval::Yearly),
            _ => None,
        }
    }

    /// Convert one period's charge into its monthly equivalent. Saturates
    /// instead of overflowing on absurd upstream amounts.
    pub fn monthly_equivalent(&self, amount: Decimal) -> Decimal {
        let (weeks, months) = (Decimal::from(52), Decimal::from(12));
        match self {
            BillingInterval::Weekly => amount
                .checked_mul(weeks)
                .map(|yearly| yearly / months)
                .unwrap_or_else(|| (amount / months).saturating_mul(weeks)),
            BillingInterval::Monthly => amount,
            BillingInterval::Quarterly => amount / Decimal::from(3),
            BillingInterval::Yearly => amount / Decimal::from(12),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    pub status: SubscriptionStatus,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub interval: BillingInterval,
    pub client_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSubscription {
    #[serde(default, deserialize_with = "de::opt_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub interval: Option<String>,
    #[serde(default, alias = "billing_cycle")]
    pub billing_cycle: Option<String>,
    #[serde(default, alias = "client_id", deserialize_with = "de::opt_id")]
    pub client_id: Option<String>,
}

impl Normalize for RawSubscription {
    type Output = Subscription;

    fn normalize(self) -> Option<Subscription> {
        let interval = self
            .interval
            .or(self.billing_cycle)
            .as_deref()
            .and_then(BillingInterval::parse)
            .unwrap_or(BillingInterval::Monthly);
        Some(Subscription {
            id: self.id?,
            status: self
                .status
                .as_deref()
                .map(SubscriptionStatus::parse)
                .unwrap_or(SubscriptionStatus::Unknown),
            amount: self.amount.or(self.price).unwrap_or_default(),
            interval,
            client_id: self.client_id,
        })
    }
}
