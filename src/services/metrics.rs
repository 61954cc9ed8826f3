use lazy_static::lazy_static;
use prometheus::{register_counter_vec, CounterVec};

lazy_static! {
    pub static ref LOGINS_COUNTER: CounterVec = register_counter_vec!(
        "api_logins_total",
        "Login attempts by role and outcome",
        &["role", "status"]
    ).unwrap();

    pub static ref REGISTRATIONS_COUNTER: CounterVec = register_counter_vec!(
        "api_registrations_total",
        "Parent registrations by outcome",
        &["status"]
    ).unwrap();

    pub static ref PARENT_DECISIONS_COUNTER: CounterVec = register_counter_vec!(
        "api_parent_decisions_total",
        "Parent registrations approved or rejected by an admin",
        &["decision"]
    ).unwrap();

    pub static ref DOCUMENT_UPLOADS_COUNTER: CounterVec = register_counter_vec!(
        "api_document_uploads_total",
        "Documents uploaded by parents, by type",
        &["upload_type"]
    ).unwrap();

    pub static ref VERIFICATIONS_COUNTER: CounterVec = register_counter_vec!(
        "api_document_verifications_total",
        "Document reviews by resulting status",
        &["status"]
    ).unwrap();

    pub static ref VISITS_COUNTER: CounterVec = register_counter_vec!(
        "api_visit_events_total",
        "Home visit lifecycle events",
        &["event"]
    ).unwrap();

    pub static ref PASSWORD_RESETS_COUNTER: CounterVec = register_counter_vec!(
        "api_password_resets_total",
        "Password reset requests and completions",
        &["stage"]
    ).unwrap();
}
