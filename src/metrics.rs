use lazy_static::lazy_static;
use prometheus::*;

lazy_static! {
    static ref DOMAIN_PROVIDER_CALLS: CounterVec = register_counter_vec!(
        "domain_provider_calls_total",
        "Number of hosting provider API calls",
        &["operation", "outcome"]
    )
    .unwrap();
    static ref REVIEW_TRANSITIONS: CounterVec = register_counter_vec!(
        "prospect_review_transitions_total",
        "Number of prospect review status transitions",
        &["to_status"]
    )
    .unwrap();
    static ref EMAILS_SENT: CounterVec = register_counter_vec!(
        "emails_sent_total",
        "Number of notification emails attempted",
        &["kind", "outcome"]
    )
    .unwrap();
}

pub fn record_provider_call(operation: &str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    DOMAIN_PROVIDER_CALLS
        .with_label_values(&[operation, outcome])
        .inc();
}

pub fn record_review_transition(to_status: &str) {
    REVIEW_TRANSITIONS.with_label_values(&[to_status]).inc();
}

pub fn record_email(kind: &str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    EMAILS_SENT.with_label_values(&[kind, outcome]).inc();
}

pub fn register_all() -> Registry {
    default_registry().clone()
}
