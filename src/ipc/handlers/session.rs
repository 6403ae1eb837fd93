use crate::access::Capability;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::require_actor;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_gate(state: &mut AppState, req: &Request, open: Option<bool>) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let cap = if open.is_some() {
        Capability::ManageSession
    } else {
        Capability::ViewReports
    };
    if let Err(e) = require_actor(store, &req.params, cap) {
        return e.response(&req.id);
    }

    let result = match open {
        Some(true) => store.open_session(),
        Some(false) => store.close_session(),
        None => store.is_open(),
    };
    match result {
        Ok(is_open) => ok(&req.id, json!({ "isOpen": is_open })),
        Err(e) => err(&req.id, e.code(), e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "session.open" => Some(handle_gate(state, req, Some(true))),
        "session.close" => Some(handle_gate(state, req, Some(false))),
        "session.status" => Some(handle_gate(state, req, None)),
        _ => None,
    }
}
