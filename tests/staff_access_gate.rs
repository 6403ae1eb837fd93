mod test_support;

use serde_json::json;
use test_support::{bootstrap_admin, request_err, request_ok, spawn_sidecar, temp_dir};

#[test]
fn super_admin_setup_runs_exactly_once() {
    let workspace = temp_dir("checkind-setup-once");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _admin = bootstrap_admin(&mut stdin, &mut reader, &workspace);

    let _ = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "setup.createSuperAdmin",
        json!({ "email": "second@example.edu", "password": "nope" }),
        "already_initialized",
    );
}

#[test]
fn login_checks_credentials_and_normalizes_email() {
    let workspace = temp_dir("checkind-login");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _admin = bootstrap_admin(&mut stdin, &mut reader, &workspace);

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "auth.login",
        json!({ "email": "  ROOT@Example.EDU ", "password": "correct horse" }),
    );
    let account = result.get("account").expect("account in login result");
    assert_eq!(
        account.get("email").and_then(|v| v.as_str()),
        Some("root@example.edu")
    );
    assert_eq!(
        account.get("role").and_then(|v| v.as_str()),
        Some("super_admin")
    );

    let _ = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "auth.login",
        json!({ "email": "root@example.edu", "password": "wrong" }),
        "unauthorized",
    );
    let _ = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "auth.login",
        json!({ "email": "nobody@example.edu", "password": "correct horse" }),
        "unauthorized",
    );
}

#[test]
fn only_the_super_admin_manages_staff() {
    let workspace = temp_dir("checkind-staff-matrix");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let admin = bootstrap_admin(&mut stdin, &mut reader, &workspace);

    let added = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "staff.add",
        json!({
            "actorEmail": admin,
            "email": "teach@example.edu",
            "password": "chalkboard",
            "role": "instructor",
        }),
    );
    assert_eq!(
        added
            .get("account")
            .and_then(|a| a.get("role"))
            .and_then(|v| v.as_str()),
        Some("instructor")
    );

    // An instructor can run sessions and read reports but not touch staff.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "session.open",
        json!({ "actorEmail": "teach@example.edu" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "students.histories",
        json!({ "actorEmail": "teach@example.edu" }),
    );
    let error = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "staff.add",
        json!({
            "actorEmail": "teach@example.edu",
            "email": "aide@example.edu",
            "password": "pencils",
            "role": "staff",
        }),
        "forbidden",
    );
    assert_eq!(
        error
            .get("details")
            .and_then(|d| d.get("capability"))
            .and_then(|v| v.as_str()),
        Some("manage_staff")
    );
    let _ = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "staff.list",
        json!({ "actorEmail": "teach@example.edu" }),
        "forbidden",
    );
}

#[test]
fn staff_add_rejects_duplicates_and_extra_super_admins() {
    let workspace = temp_dir("checkind-staff-add");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let admin = bootstrap_admin(&mut stdin, &mut reader, &workspace);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "staff.add",
        json!({
            "actorEmail": admin,
            "email": "aide@example.edu",
            "password": "pencils",
            "role": "staff",
        }),
    );
    let _ = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "staff.add",
        json!({
            "actorEmail": admin,
            "email": "AIDE@example.edu",
            "password": "pencils",
            "role": "staff",
        }),
        "conflict",
    );
    let _ = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "staff.add",
        json!({
            "actorEmail": admin,
            "email": "boss@example.edu",
            "password": "pencils",
            "role": "super_admin",
        }),
        "bad_params",
    );
}

#[test]
fn staff_remove_spares_the_super_admin() {
    let workspace = temp_dir("checkind-staff-remove");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let admin = bootstrap_admin(&mut stdin, &mut reader, &workspace);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "staff.add",
        json!({
            "actorEmail": admin,
            "email": "teach@example.edu",
            "password": "chalkboard",
            "role": "instructor",
        }),
    );

    let _ = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "staff.remove",
        json!({ "actorEmail": admin, "email": admin }),
        "forbidden",
    );
    let _ = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "staff.remove",
        json!({ "actorEmail": admin, "email": "ghost@example.edu" }),
        "not_found",
    );

    let removed = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "staff.remove",
        json!({ "actorEmail": admin, "email": "teach@example.edu" }),
    );
    assert_eq!(
        removed.get("removed").and_then(|v| v.as_str()),
        Some("teach@example.edu")
    );

    // Removed accounts lose access immediately.
    let _ = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "session.open",
        json!({ "actorEmail": "teach@example.edu" }),
        "unauthorized",
    );
}

#[test]
fn staff_list_is_ordered_by_email() {
    let workspace = temp_dir("checkind-staff-list");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let admin = bootstrap_admin(&mut stdin, &mut reader, &workspace);

    for (id, email) in [("1", "zoe@example.edu"), ("2", "amy@example.edu")] {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            id,
            "staff.add",
            json!({
                "actorEmail": admin,
                "email": email,
                "password": "pencils",
                "role": "staff",
            }),
        );
    }

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "staff.list",
        json!({ "actorEmail": admin }),
    );
    let emails: Vec<&str> = listed
        .get("accounts")
        .and_then(|v| v.as_array())
        .map(|a| {
            a.iter()
                .filter_map(|acc| acc.get("email").and_then(|v| v.as_str()))
                .collect()
        })
        .unwrap_or_default();
    assert_eq!(
        emails,
        vec!["amy@example.edu", "root@example.edu", "zoe@example.edu"]
    );
}
