use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

/// Staff roles, in the forms the registry stores them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    SuperAdmin,
    Instructor,
    Staff,
}

impl Role {
    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "super_admin" => Some(Role::SuperAdmin),
            "instructor" => Some(Role::Instructor),
            "staff" => Some(Role::Staff),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::Instructor => "instructor",
            Role::Staff => "staff",
        }
    }

    /// The capability matrix. Every administrative operation funnels through
    /// this one check; handlers never branch on role names themselves.
    pub fn allows(&self, cap: Capability) -> bool {
        match cap {
            Capability::ManageStaff => matches!(self, Role::SuperAdmin),
            Capability::ManageSession | Capability::ViewReports | Capability::ExportData => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ManageSession,
    ManageStaff,
    ViewReports,
    ExportData,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::ManageSession => "manage_session",
            Capability::ManageStaff => "manage_staff",
            Capability::ViewReports => "view_reports",
            Capability::ExportData => "export_data",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffAccount {
    pub id: String,
    pub email: String,
    #[serde(serialize_with = "serialize_role")]
    pub role: Role,
}

fn serialize_role<S: serde::Serializer>(role: &Role, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(role.as_str())
}

#[derive(Debug)]
pub enum AccessError {
    /// No account matches the actor email.
    Unauthorized,
    /// The account exists but its role lacks the capability.
    Forbidden(Capability),
    Db(String),
}

impl AccessError {
    pub fn code(&self) -> &'static str {
        match self {
            AccessError::Unauthorized => "unauthorized",
            AccessError::Forbidden(_) => "forbidden",
            AccessError::Db(_) => "db_query_failed",
        }
    }
}

impl fmt::Display for AccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessError::Unauthorized => write!(f, "unknown staff account"),
            AccessError::Forbidden(cap) => write!(f, "role does not allow {}", cap.as_str()),
            AccessError::Db(m) => write!(f, "{}", m),
        }
    }
}

impl From<rusqlite::Error> for AccessError {
    fn from(e: rusqlite::Error) -> Self {
        AccessError::Db(e.to_string())
    }
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub fn new_salt() -> String {
    Uuid::new_v4().to_string()
}

pub fn password_digest(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

pub fn find_account(conn: &Connection, email: &str) -> Result<Option<StaffAccount>, AccessError> {
    let email = normalize_email(email);
    let account = conn
        .query_row(
            "SELECT id, email, role FROM staff WHERE email = ?",
            [&email],
            |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                ))
            },
        )
        .optional()?;
    Ok(account.and_then(|(id, email, role)| {
        Role::parse(&role).map(|role| StaffAccount { id, email, role })
    }))
}

/// Credential check for `auth.login`; constant shape regardless of whether the
/// email or the password was wrong.
pub fn authenticate(
    conn: &Connection,
    email: &str,
    password: &str,
) -> Result<Option<StaffAccount>, AccessError> {
    let email = normalize_email(email);
    let row = conn
        .query_row(
            "SELECT id, email, role, password_digest, salt FROM staff WHERE email = ?",
            [&email],
            |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, String>(3)?,
                    r.get::<_, String>(4)?,
                ))
            },
        )
        .optional()?;
    let Some((id, email, role, digest, salt)) = row else {
        return Ok(None);
    };
    if password_digest(password, &salt) != digest {
        return Ok(None);
    }
    Ok(Role::parse(&role).map(|role| StaffAccount { id, email, role }))
}

/// The Access Control Gate: resolve the actor and answer yes/no for one
/// capability. Returns the account so handlers can echo who acted.
pub fn require(
    conn: &Connection,
    actor_email: &str,
    cap: Capability,
) -> Result<StaffAccount, AccessError> {
    let account = find_account(conn, actor_email)?.ok_or(AccessError::Unauthorized)?;
    if !account.role.allows(cap) {
        return Err(AccessError::Forbidden(cap));
    }
    Ok(account)
}
