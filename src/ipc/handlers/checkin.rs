use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::store::StoreError;
use chrono::{Local, NaiveDate};
use serde_json::json;

fn get_score(params: &serde_json::Value, key: &'static str) -> Result<i64, serde_json::Value> {
    params.get(key).and_then(|v| v.as_i64()).ok_or_else(|| {
        json!({
            "code": "invalid_event",
            "field": key,
            "message": format!("{} must be an integer", key),
        })
    })
}

fn handle_submit(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let name = req
        .params
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let morale = match get_score(&req.params, "morale") {
        Ok(v) => v,
        Err(detail) => {
            let message = detail
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("invalid score")
                .to_string();
            return err(&req.id, "invalid_event", message, Some(detail));
        }
    };
    let understanding = match get_score(&req.params, "understanding") {
        Ok(v) => v,
        Err(detail) => {
            let message = detail
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("invalid score")
                .to_string();
            return err(&req.id, "invalid_event", message, Some(detail));
        }
    };

    match store.submit(name, morale, understanding) {
        Ok(event) => ok(&req.id, json!({ "checkin": event })),
        Err(e) => {
            let details = match &e {
                StoreError::InvalidEvent { field, .. } => Some(json!({ "field": field })),
                _ => None,
            };
            err(&req.id, e.code(), e.to_string(), details)
        }
    }
}

// Public roster for the check-in page: names and scores accepted on one day.
fn handle_today(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let date = match req.params.get("date").and_then(|v| v.as_str()) {
        Some(raw) => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(d) => d,
            Err(_) => return err(&req.id, "bad_params", "date must be YYYY-MM-DD", None),
        },
        None => Local::now().date_naive(),
    };
    let events = match store.read_all() {
        Ok(v) => v,
        Err(e) => return err(&req.id, e.code(), e.to_string(), None),
    };
    let key = date.format("%Y-%m-%d").to_string();
    let todays: Vec<_> = events.iter().filter(|e| e.date_key() == key).collect();
    ok(&req.id, json!({ "date": key, "checkins": todays }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "checkin.submit" => Some(handle_submit(state, req)),
        "checkin.today" => Some(handle_today(state, req)),
        _ => None,
    }
}
