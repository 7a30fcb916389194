//! Dashboard figures computed from several upstream collections at once.
//!
//! Every source is fetched concurrently under its own timeout. A source that
//! fails or times out contributes an empty list; the figures are still
//! computed from whatever succeeded and a single generic warning is attached.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use crate::models::{
    money_total, Invoice, InvoiceStatus, Normalize, Payment, PaymentLink, PaymentStatus,
    RawInvoice, RawPayment, RawPaymentLink, RawServiceRequest, RawSubscription, RawUser, Role,
    ServiceRequest, ServiceRequestStatus, Subscription, SubscriptionStatus, User,
};
use crate::services::upstream::{fetch_list, record_failure, Backend, Resource};

pub const PARTIAL_DATA_WARNING: &str =
    "Some dashboard data could not be loaded. Figures may be incomplete.";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardLoad<T> {
    pub stats: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip)]
    pub failed: Vec<Resource>,
}

/// Collects per-source failures while unwrapping fetched lists.
#[derive(Default)]
struct Outcomes {
    failed: Vec<Resource>,
}

impl Outcomes {
    fn take<T>(&mut self, fetched: Result<Vec<T>, Resource>) -> Vec<T> {
        fetched.unwrap_or_else(|resource| {
            self.failed.push(resource);
            Vec::new()
        })
    }

    fn finish<T>(self, stats: T) -> DashboardLoad<T> {
        let warning = if self.failed.is_empty() {
            None
        } else {
            tracing::warn!(failed = ?self.failed, "Dashboard computed from partial data");
            Some(PARTIAL_DATA_WARNING.to_string())
        };
        DashboardLoad {
            stats,
            warning,
            failed: self.failed,
        }
    }
}

async fn fetch_within<R>(
    backend: &dyn Backend,
    resource: Resource,
    query: &[(&str, String)],
    limit: Duration,
) -> Result<Vec<R::Output>, Resource>
where
    R: DeserializeOwned + Normalize,
{
    match tokio::time::timeout(limit, fetch_list::<R>(backend, resource, query)).await {
        Ok(Ok(items)) => Ok(items),
        Ok(Err(_)) => Err(resource),
        Err(_) => {
            record_failure(resource);
            tracing::warn!(
                resource = resource.label(),
                timeout_ms = limit.as_millis() as u64,
                "Upstream fetch timed out"
            );
            Err(resource)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_users: usize,
    pub active_users: usize,
    pub total_clients: usize,
    pub total_agents: usize,
    pub total_invoices: usize,
    pub paid_invoices: usize,
    pub unpaid_invoices: usize,
    pub overdue_invoices: usize,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_revenue: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub outstanding_amount: Decimal,
    pub total_payments: usize,
    pub completed_payments: usize,
    pub pending_payments: usize,
    pub failed_payments: usize,
    pub refunded_payments: usize,
    #[serde(with = "rust_decimal::serde::float")]
    pub collected_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub processing_fees: Decimal,
    pub active_subscriptions: usize,
    #[serde(with = "rust_decimal::serde::float")]
    pub monthly_recurring_revenue: Decimal,
    pub open_service_requests: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientStats {
    pub total_invoices: usize,
    pub paid_invoices: usize,
    pub unpaid_invoices: usize,
    pub overdue_invoices: usize,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount_due: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount_paid: Decimal,
    pub active_subscriptions: usize,
    pub open_service_requests: usize,
    pub active_payment_links: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStats {
    pub assigned_requests: usize,
    pub pending_requests: usize,
    pub in_progress_requests: usize,
    pub completed_requests: usize,
    #[serde(with = "rust_decimal::serde::float")]
    pub quoted_value: Decimal,
    pub client_count: usize,
}

fn count_invoices(invoices: &[Invoice], status: InvoiceStatus) -> usize {
    invoices.iter().filter(|i| i.status == status).count()
}

fn sum_invoices(invoices: &[Invoice], keep: impl Fn(&Invoice) -> bool) -> Decimal {
    money_total(invoices.iter().filter(|i| keep(i)).map(|i| i.amount))
}

fn count_payments(payments: &[Payment], status: PaymentStatus) -> usize {
    payments.iter().filter(|p| p.status == status).count()
}

fn active_subscriptions(subscriptions: &[Subscription]) -> impl Iterator<Item = &Subscription> {
    subscriptions
        .iter()
        .filter(|s| s.status == SubscriptionStatus::Active)
}

pub fn admin_stats(
    users: &[User],
    invoices: &[Invoice],
    payments: &[Payment],
    subscriptions: &[Subscription],
    requests: &[ServiceRequest],
) -> AdminStats {
    let completed = || payments.iter().filter(|p| p.status == PaymentStatus::Completed);

    AdminStats {
        total_users: users.len(),
        active_users: users.iter().filter(|u| u.is_active).count(),
        total_clients: users.iter().filter(|u| u.role == Role::Client).count(),
        total_agents: users.iter().filter(|u| u.role == Role::Agent).count(),
        total_invoices: invoices.len(),
        paid_invoices: count_invoices(invoices, InvoiceStatus::Paid),
        unpaid_invoices: count_invoices(invoices, InvoiceStatus::Unpaid),
        overdue_invoices: count_invoices(invoices, InvoiceStatus::Overdue),
        total_revenue: sum_invoices(invoices, |i| i.status == InvoiceStatus::Paid),
        outstanding_amount: sum_invoices(invoices, |i| i.status.is_outstanding()),
        total_payments: payments.len(),
        completed_payments: count_payments(payments, PaymentStatus::Completed),
        pending_payments: count_payments(payments, PaymentStatus::Pending),
        failed_payments: count_payments(payments, PaymentStatus::Failed),
        refunded_payments: count_payments(payments, PaymentStatus::Refunded),
        collected_amount: money_total(completed().map(|p| p.amount)),
        processing_fees: money_total(completed().map(|p| p.processing_fee)),
        active_subscriptions: active_subscriptions(subscriptions).count(),
        monthly_recurring_revenue: money_total(
            active_subscriptions(subscriptions).map(|s| s.interval.monthly_equivalent(s.amount)),
        ),
        open_service_requests: requests.iter().filter(|r| r.status.is_open()).count(),
    }
}

pub fn client_stats(
    invoices: &[Invoice],
    payments: &[Payment],
    subscriptions: &[Subscription],
    requests: &[ServiceRequest],
    links: &[PaymentLink],
    now: DateTime<Utc>,
) -> ClientStats {
    ClientStats {
        total_invoices: invoices.len(),
        paid_invoices: count_invoices(invoices, InvoiceStatus::Paid),
        unpaid_invoices: count_invoices(invoices, InvoiceStatus::Unpaid),
        overdue_invoices: count_invoices(invoices, InvoiceStatus::Overdue),
        amount_due: sum_invoices(invoices, |i| i.status.is_outstanding()),
        amount_paid: money_total(
            payments
                .iter()
                .filter(|p| p.status == PaymentStatus::Completed)
                .map(|p| p.amount),
        ),
        active_subscriptions: active_subscriptions(subscriptions).count(),
        open_service_requests: requests.iter().filter(|r| r.status.is_open()).count(),
        active_payment_links: links.iter().filter(|l| l.is_usable(now)).count(),
    }
}

pub fn agent_stats(requests: &[ServiceRequest], clients: &[User]) -> AgentStats {
    let with_status =
        |status: ServiceRequestStatus| requests.iter().filter(|r| r.status == status).count();

    AgentStats {
        assigned_requests: requests.len(),
        pending_requests: with_status(ServiceRequestStatus::Pending),
        in_progress_requests: with_status(ServiceRequestStatus::InProgress),
        completed_requests: with_status(ServiceRequestStatus::Completed),
        quoted_value: money_total(
            requests
                .iter()
                .filter(|r| {
                    matches!(
                        r.status,
                        ServiceRequestStatus::Quoted
                            | ServiceRequestStatus::Approved
                            | ServiceRequestStatus::InProgress
                    )
                })
                .filter_map(ServiceRequest::effective_price),
        ),
        client_count: clients.len(),
    }
}

/// Keep records owned by `owner`, plus records the upstream did not attribute.
fn owned_by<T>(items: Vec<T>, owner: &str, id_of: impl Fn(&T) -> Option<&str>) -> Vec<T> {
    items
        .into_iter()
        .filter(|item| id_of(item).map_or(true, |id| id == owner))
        .collect()
}

pub async fn load_admin(backend: &dyn Backend, limit: Duration) -> DashboardLoad<AdminStats> {
    let (users, invoices, payments, subscriptions, requests) = tokio::join!(
        fetch_within::<RawUser>(backend, Resource::Users, &[], limit),
        fetch_within::<RawInvoice>(backend, Resource::Invoices, &[], limit),
        fetch_within::<RawPayment>(backend, Resource::Payments, &[], limit),
        fetch_within::<RawSubscription>(backend, Resource::Subscriptions, &[], limit),
        fetch_within::<RawServiceRequest>(backend, Resource::ServiceRequests, &[], limit),
    );

    let mut outcomes = Outcomes::default();
    let users = outcomes.take(users);
    let invoices = outcomes.take(invoices);
    let payments = outcomes.take(payments);
    let subscriptions = outcomes.take(subscriptions);
    let requests = outcomes.take(requests);

    outcomes.finish(admin_stats(
        &users,
        &invoices,
        &payments,
        &subscriptions,
        &requests,
    ))
}

pub async fn load_client(
    backend: &dyn Backend,
    client_id: &str,
    limit: Duration,
) -> DashboardLoad<ClientStats> {
    let query = [("clientId", client_id.to_string())];
    let (invoices, payments, subscriptions, requests, links) = tokio::join!(
        fetch_within::<RawInvoice>(backend, Resource::Invoices, &query, limit),
        fetch_within::<RawPayment>(backend, Resource::Payments, &query, limit),
        fetch_within::<RawSubscription>(backend, Resource::Subscriptions, &query, limit),
        fetch_within::<RawServiceRequest>(backend, Resource::ServiceRequests, &query, limit),
        fetch_within::<RawPaymentLink>(backend, Resource::PaymentLinks, &query, limit),
    );

    let mut outcomes = Outcomes::default();
    let invoices = owned_by(outcomes.take(invoices), client_id, |i: &Invoice| {
        i.client_id.as_deref()
    });
    let payments = owned_by(outcomes.take(payments), client_id, |p: &Payment| {
        p.client_id.as_deref()
    });
    let subscriptions = owned_by(outcomes.take(subscriptions), client_id, |s: &Subscription| {
        s.client_id.as_deref()
    });
    let requests = owned_by(outcomes.take(requests), client_id, |r: &ServiceRequest| {
        r.client_id.as_deref()
    });
    let links = owned_by(outcomes.take(links), client_id, PaymentLink::client_id);

    outcomes.finish(client_stats(
        &invoices,
        &payments,
        &subscriptions,
        &requests,
        &links,
        Utc::now(),
    ))
}

pub async fn load_agent(
    backend: &dyn Backend,
    agent_id: &str,
    limit: Duration,
) -> DashboardLoad<AgentStats> {
    let query = [("agentId", agent_id.to_string())];
    let (requests, clients) = tokio::join!(
        fetch_within::<RawServiceRequest>(backend, Resource::ServiceRequests, &query, limit),
        fetch_within::<RawUser>(backend, Resource::Clients, &[], limit),
    );

    let mut outcomes = Outcomes::default();
    let requests = owned_by(outcomes.take(requests), agent_id, |r: &ServiceRequest| {
        r.agent_id.as_deref()
    });
    let clients = outcomes.take(clients);

    outcomes.finish(agent_stats(&requests, &clients))
}
