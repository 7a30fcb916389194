use super::billing::money_total;
use super::{de, status_key, Normalize};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceRequestStatus {
    Pending,
    Quoted,
    Approved,
    InProgress,
    OnHold,
    Completed,
    Cancelled,
    Rejected,
    Unknown,
}

impl ServiceRequestStatus {
    pub fn parse(raw: &str) -> Self {
        match status_key(raw).as_str() {
            "PENDING" | "SUBMITTED" | "NEW" => ServiceRequestStatus::Pending,
            "QUOTED" => ServiceRequestStatus::Quoted,
            "APPROVED" | "ACCEPTED" => ServiceRequestStatus::Approved,
            "IN_PROGRESS" => ServiceRequestStatus::InProgress,
            "ON_HOLD" => ServiceRequestStatus::OnHold,
            "COMPLETED" | "DONE" => ServiceRequestStatus::Completed,
            "CANCELLED" | "CANCELED" => ServiceRequestStatus::Cancelled,
            "REJECTED" | "DECLINED" => ServiceRequestStatus::Rejected,
            _ => ServiceRequestStatus::Unknown,
        }
    }

    /// Still needs work from an agent.
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            ServiceRequestStatus::Pending
                | ServiceRequestStatus::Quoted
                | ServiceRequestStatus::Approved
                | ServiceRequestStatus::InProgress
                | ServiceRequestStatus::OnHold
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceAdjustment {
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: Option<String>,
    pub file_name: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequest {
    pub id: String,
    pub title: Option<String>,
    pub status: ServiceRequestStatus,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub budget: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub quote_amount: Option<Decimal>,
    pub price_adjustments: Vec<PriceAdjustment>,
    pub attachments: Vec<Attachment>,
    pub client_id: Option<String>,
    pub agent_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl ServiceRequest {
    /// Quote plus every adjustment; `None` until a quote exists.
    pub fn effective_price(&self) -> Option<Decimal> {
        self.quote_amount.map(|quote| {
            money_total(
                std::iter::once(quote)
                    .chain(self.price_adjustments.iter().map(|adjustment| adjustment.amount)),
            )
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAttachment {
    #[serde(default, deserialize_with = "de::opt_id")]
    pub id: Option<String>,
    #[serde(default, alias = "file_name")]
    pub file_name: Option<String>,
    #[serde(default, alias = "original_name")]
    pub original_name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPriceAdjustment {
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawServiceRequest {
    #[serde(default, deserialize_with = "de::opt_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub budget: Option<Decimal>,
    #[serde(default, alias = "quote_amount")]
    pub quote_amount: Option<Decimal>,
    #[serde(default, alias = "price_adjustments")]
    pub price_adjustments: Option<Vec<RawPriceAdjustment>>,
    #[serde(default)]
    pub attachments: Option<Vec<RawAttachment>>,
    #[serde(default, alias = "client_id", deserialize_with = "de::opt_id")]
    pub client_id: Option<String>,
    #[serde(default, alias = "agent_id", deserialize_with = "de::opt_id")]
    pub agent_id: Option<String>,
    #[serde(default, alias = "assigned_agent_id", deserialize_with = "de::opt_id")]
    pub assigned_agent_id: Option<String>,
    #[serde(default, alias = "created_at", deserialize_with = "de::opt_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Normalize for RawServiceRequest {
    type Output = ServiceRequest;

    fn normalize(self) -> Option<ServiceRequest> {
        let price_adjustments = self
            .price_adjustments
            .unwrap_or_default()
            .into_iter()
            .filter_map(|adjustment| {
                adjustment.amount.map(|amount| PriceAdjustment {
                    amount,
                    reason: adjustment.reason,
                })
            })
            .collect();
        let attachments = self
            .attachments
            .unwrap_or_default()
            .into_iter()
            .map(|attachment| Attachment {
                id: attachment.id,
                file_name: attachment.file_name.or(attachment.original_name),
                url: attachment.url,
            })
            .collect();

        Some(ServiceRequest {
            id: self.id?,
            title: self.title,
            status: self
                .status
                .as_deref()
                .map(ServiceRequestStatus::parse)
                .unwrap_or(ServiceRequestStatus::Unknown),
            budget: self.budget,
            quote_amount: self.quote_amount,
            price_adjustments,
            attachments,
            client_id: self.client_id,
            agent_id: self.agent_id.or(self.assigned_agent_id),
            created_at: self.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::normalize_list;
    use serde_json::json;

    #[test]
    fn parses_all_eight_states() {
        let cases = [
            ("pending", ServiceRequestStatus::Pending),
            ("QUOTED", ServiceRequestStatus::Quoted),
            ("approved", ServiceRequestStatus::Approved),
            ("in_progress", ServiceRequestStatus::InProgress),
            ("ON-HOLD", ServiceRequestStatus::OnHold),
            ("completed", ServiceRequestStatus::Completed),
            ("CANCELLED", ServiceRequestStatus::Cancelled),
            ("rejected", ServiceRequestStatus::Rejected),
        ];
        for (raw, expected) in cases {
            assert_eq!(ServiceRequestStatus::parse(raw), expected, "{raw}");
        }
        assert!(ServiceRequestStatus::OnHold.is_open());
        assert!(!ServiceRequestStatus::Rejected.is_open());
    }

    #[test]
    fn effective_price_adds_adjustments() {
        let requests = normalize_list::<RawServiceRequest>(json!([{
            "id": "sr1",
            "status": "QUOTED",
            "budget": 500,
            "quoteAmount": "400.00",
            "priceAdjustments": [
                { "amount": 25.5, "reason": "rush" },
                { "amount": -10 },
                { "reason": "no amount" }
            ],
            "attachments": [{ "id": 3, "original_name": "scope.pdf" }],
            "assignedAgentId": "agent-7"
        }]));

        let request = &requests[0];
        assert_eq!(request.price_adjustments.len(), 2);
        assert_eq!(request.effective_price(), Some(Decimal::new(4155, 1)));
        assert_eq!(request.attachments[0].file_name.as_deref(), Some("scope.pdf"));
        assert_eq!(request.agent_id.as_deref(), Some("agent-7"));
    }

    #[test]
    fn no_quote_means_no_price() {
        let requests = normalize_list::<RawServiceRequest>(json!([{ "id": 1, "status": "pending" }]));
        assert_eq!(requests[0].effective_price(), None);
        assert!(requests[0].attachments.is_empty());
    }
}
