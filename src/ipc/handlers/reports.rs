use crate::access::Capability;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{require_actor, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::rollup;
use crate::store::{CheckinEvent, EventStore};
use chrono::{Local, NaiveDate};
use serde_json::json;

fn read_events(store: &EventStore) -> Result<Vec<CheckinEvent>, HandlerErr> {
    store
        .read_all()
        .map_err(|e| HandlerErr::new(e.code(), e.to_string()))
}

fn parse_date_param(params: &serde_json::Value, key: &str) -> Result<NaiveDate, HandlerErr> {
    match params.get(key).and_then(|v| v.as_str()) {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| HandlerErr::new("bad_params", format!("{} must be YYYY-MM-DD", key))),
        None => Ok(Local::now().date_naive()),
    }
}

fn summary_today(store: &EventStore, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let date = parse_date_param(params, "date")?;
    let events = read_events(store)?;
    let summary = rollup::todays_summary(&events, date);
    Ok(json!({
        "date": date.format("%Y-%m-%d").to_string(),
        "summary": summary,
    }))
}

fn calendar_month(store: &EventStore, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let year = params
        .get("year")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| HandlerErr::new("bad_params", "missing year"))?;
    let month = params
        .get("month")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| HandlerErr::new("bad_params", "missing month"))?;
    if !(1..=9999).contains(&year) || !(0..=u32::MAX as i64).contains(&month) {
        return Err(HandlerErr::new("invalid_range", "year/month out of range"));
    }
    let events = read_events(store)?;
    let weeks = rollup::month_calendar(&events, year as i32, month as u32)
        .map_err(|e| HandlerErr::new("invalid_range", e.to_string()))?;
    Ok(json!({
        "year": year,
        "month": month,
        "weeks": weeks,
    }))
}

fn student_histories(store: &EventStore) -> Result<serde_json::Value, HandlerErr> {
    let events = read_events(store)?;
    let histories = rollup::student_histories(&events);
    // BTreeMap iteration gives the stable ascending-identity order the
    // dashboard shows; keep it as an ordered array, not an object.
    let students: Vec<_> = histories.values().collect();
    Ok(json!({ "students": students }))
}

fn day_open(store: &EventStore, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let raw = params
        .get("date")
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerErr::new("bad_params", "missing date"))?;
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| HandlerErr::new("bad_params", "date must be YYYY-MM-DD"))?;
    let events = read_events(store)?;
    let rollup = rollup::todays_summary(&events, date);
    Ok(json!({
        "date": date.format("%Y-%m-%d").to_string(),
        "rollup": rollup,
    }))
}

fn dispatch(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(e) = require_actor(store, &req.params, Capability::ViewReports) {
        return e.response(&req.id);
    }
    let result = match req.method.as_str() {
        "summary.today" => summary_today(store, &req.params),
        "calendar.month" => calendar_month(store, &req.params),
        "students.histories" => student_histories(store),
        "day.open" => day_open(store, &req.params),
        _ => Err(HandlerErr::new("not_implemented", "unknown report")),
    };
    match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "summary.today" | "calendar.month" | "students.histories" | "day.open" => {
            Some(dispatch(state, req))
        }
        _ => None,
    }
}
