use crate::access::{self, Capability, Role};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{get_required_str, require_actor, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store::EventStore;
use serde_json::json;
use uuid::Uuid;

fn insert_account(
    store: &EventStore,
    email: &str,
    password: &str,
    role: Role,
) -> Result<access::StaffAccount, HandlerErr> {
    let email = access::normalize_email(email);
    if email.is_empty() {
        return Err(HandlerErr::new("bad_params", "email must not be empty"));
    }
    if password.is_empty() {
        return Err(HandlerErr::new("bad_params", "password must not be empty"));
    }
    let conn = store
        .lock()
        .map_err(|e| HandlerErr::new(e.code(), e.to_string()))?;
    let exists = access::find_account(&conn, &email)
        .map_err(|e| HandlerErr::new(e.code(), e.to_string()))?
        .is_some();
    if exists {
        return Err(HandlerErr::new(
            "conflict",
            format!("account already exists: {}", email),
        ));
    }
    let id = Uuid::new_v4().to_string();
    let salt = access::new_salt();
    let digest = access::password_digest(password, &salt);
    conn.execute(
        "INSERT INTO staff(id, email, password_digest, salt, role) VALUES(?, ?, ?, ?, ?)",
        (&id, &email, &digest, &salt, role.as_str()),
    )
    .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;
    Ok(access::StaffAccount { id, email, role })
}

// First-run bootstrap: allowed exactly while the registry is empty.
fn handle_create_super_admin(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let email = match get_required_str(&req.params, "email") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let password = match get_required_str(&req.params, "password") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    {
        let conn = match store.lock() {
            Ok(c) => c,
            Err(e) => return err(&req.id, e.code(), e.to_string(), None),
        };
        let count: i64 = match conn.query_row("SELECT COUNT(*) FROM staff", [], |r| r.get(0)) {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        };
        if count > 0 {
            return err(
                &req.id,
                "already_initialized",
                "a staff registry already exists",
                None,
            );
        }
    }
    match insert_account(store, &email, &password, Role::SuperAdmin) {
        Ok(account) => ok(&req.id, json!({ "account": account })),
        Err(e) => e.response(&req.id),
    }
}

fn handle_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let email = match get_required_str(&req.params, "email") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let password = match get_required_str(&req.params, "password") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let conn = match store.lock() {
        Ok(c) => c,
        Err(e) => return err(&req.id, e.code(), e.to_string(), None),
    };
    match access::authenticate(&conn, &email, &password) {
        Ok(Some(account)) => ok(&req.id, json!({ "account": account })),
        Ok(None) => err(&req.id, "unauthorized", "invalid email or password", None),
        Err(e) => err(&req.id, e.code(), e.to_string(), None),
    }
}

fn handle_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(e) = require_actor(store, &req.params, Capability::ManageStaff) {
        return e.response(&req.id);
    }
    let email = match get_required_str(&req.params, "email") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let password = match get_required_str(&req.params, "password") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let raw_role = match get_required_str(&req.params, "role") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    // New accounts are instructors or staff; there is exactly one super admin.
    let role = match Role::parse(&raw_role) {
        Some(Role::Instructor) => Role::Instructor,
        Some(Role::Staff) => Role::Staff,
        _ => {
            return err(
                &req.id,
                "bad_params",
                "role must be instructor or staff",
                None,
            )
        }
    };
    match insert_account(store, &email, &password, role) {
        Ok(account) => ok(&req.id, json!({ "account": account })),
        Err(e) => e.response(&req.id),
    }
}

fn handle_remove(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(e) = require_actor(store, &req.params, Capability::ManageStaff) {
        return e.response(&req.id);
    }
    let email = match get_required_str(&req.params, "email") {
        Ok(v) => access::normalize_email(&v),
        Err(e) => return e.response(&req.id),
    };
    let conn = match store.lock() {
        Ok(c) => c,
        Err(e) => return err(&req.id, e.code(), e.to_string(), None),
    };
    let account = match access::find_account(&conn, &email) {
        Ok(v) => v,
        Err(e) => return err(&req.id, e.code(), e.to_string(), None),
    };
    let Some(account) = account else {
        return err(&req.id, "not_found", "no such staff account", None);
    };
    if account.role == Role::SuperAdmin {
        return err(
            &req.id,
            "forbidden",
            "super admin accounts cannot be removed",
            None,
        );
    }
    if let Err(e) = conn.execute("DELETE FROM staff WHERE email = ?", [&email]) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "removed": email }))
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(e) = require_actor(store, &req.params, Capability::ManageStaff) {
        return e.response(&req.id);
    }
    let conn = match store.lock() {
        Ok(c) => c,
        Err(e) => return err(&req.id, e.code(), e.to_string(), None),
    };
    let mut stmt = match conn.prepare("SELECT id, email, role FROM staff ORDER BY email") {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let accounts = stmt
        .query_map([], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "email": r.get::<_, String>(1)?,
                "role": r.get::<_, String>(2)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match accounts {
        Ok(accounts) => ok(&req.id, json!({ "accounts": accounts })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.createSuperAdmin" => Some(handle_create_super_admin(state, req)),
        "auth.login" => Some(handle_login(state, req)),
        "staff.add" => Some(handle_add(state, req)),
        "staff.remove" => Some(handle_remove(state, req)),
        "staff.list" => Some(handle_list(state, req)),
        _ => None,
    }
}
