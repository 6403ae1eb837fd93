use crate::access::Capability;
use crate::export::{self, ExportError, ExportRecord, ExportScope};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{get_required_str, require_actor, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store::EventStore;
use serde_json::json;
use std::path::PathBuf;

fn build_records(
    store: &EventStore,
    params: &serde_json::Value,
) -> Result<(ExportScope, Vec<ExportRecord>), HandlerErr> {
    let raw_scope = get_required_str(params, "scope")?;
    let scope = ExportScope::parse(&raw_scope)
        .map_err(|e| HandlerErr::new(e.code(), e.to_string()))?;
    let events = store
        .read_all()
        .map_err(|e| HandlerErr::new(e.code(), e.to_string()))?;
    let records = export::build_export(&events, &scope).map_err(|e| match e {
        ExportError::Empty => HandlerErr::new(e.code(), e.to_string()),
        ExportError::InvalidRange(_) => HandlerErr::new(e.code(), e.to_string()),
    })?;
    Ok((scope, records))
}

fn handle_build(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(e) = require_actor(store, &req.params, Capability::ExportData) {
        return e.response(&req.id);
    }
    match build_records(store, &req.params) {
        Ok((_, records)) => ok(
            &req.id,
            json!({
                "columns": export::EXPORT_COLUMNS,
                "rows": records,
            }),
        ),
        Err(e) => e.response(&req.id),
    }
}

fn handle_file(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(e) = require_actor(store, &req.params, Capability::ExportData) {
        return e.response(&req.id);
    }
    let format = match get_required_str(&req.params, "format") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let out_path = match get_required_str(&req.params, "outPath") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let (scope, records) = match build_records(store, &req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };

    let bytes = match format.as_str() {
        "csv" => Ok(export::to_csv(&records).into_bytes()),
        "xlsx" => export::to_xlsx(&records),
        "ods" => export::to_ods(&records),
        other => {
            return err(
                &req.id,
                "bad_params",
                format!("unsupported format: {}", other),
                None,
            )
        }
    };
    let bytes = match bytes {
        Ok(v) => v,
        Err(e) => return err(&req.id, "export_failed", e.to_string(), None),
    };

    let out = PathBuf::from(&out_path);
    if let Some(parent) = out.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            return err(
                &req.id,
                "export_failed",
                e.to_string(),
                Some(json!({ "path": out_path })),
            );
        }
    }
    if let Err(e) = std::fs::write(&out, &bytes) {
        return err(
            &req.id,
            "export_failed",
            e.to_string(),
            Some(json!({ "path": out_path })),
        );
    }

    ok(
        &req.id,
        json!({
            "path": out_path,
            "rowCount": records.len(),
            "fileTag": scope.file_tag(),
            "byteCount": bytes.len(),
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "export.build" => Some(handle_build(state, req)),
        "export.file" => Some(handle_file(state, req)),
        _ => None,
    }
}
