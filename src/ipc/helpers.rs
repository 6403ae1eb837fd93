use crate::access::{self, Capability, StaffAccount};
use crate::ipc::error::err;
use crate::store::EventStore;
use serde_json::json;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        HandlerErr {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing {}", key)))
}

/// Resolve `params.actorEmail` through the access gate for one capability.
/// Takes and releases the store lock; callers must not already hold it.
pub fn require_actor(
    store: &EventStore,
    params: &serde_json::Value,
    cap: Capability,
) -> Result<StaffAccount, HandlerErr> {
    let actor = get_required_str(params, "actorEmail")?;
    let conn = store
        .lock()
        .map_err(|e| HandlerErr::new(e.code(), e.to_string()))?;
    access::require(&conn, &actor, cap).map_err(|e| {
        let mut h = HandlerErr::new(e.code(), e.to_string());
        if let access::AccessError::Forbidden(cap) = e {
            h.details = Some(json!({ "capability": cap.as_str() }));
        }
        h
    })
}
