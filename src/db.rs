use rusqlite::Connection;
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("checkin.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS checkins(
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            morale INTEGER NOT NULL,
            understanding INTEGER NOT NULL,
            submitted_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_checkins_submitted_at ON checkins(submitted_at)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_checkins_name ON checkins(name)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS session_state(
            id INTEGER PRIMARY KEY CHECK(id = 1),
            is_open INTEGER NOT NULL
        )",
        [],
    )?;
    // The gate starts CLOSED the first time a workspace is opened.
    conn.execute(
        "INSERT OR IGNORE INTO session_state(id, is_open) VALUES(1, 0)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS staff(
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            password_digest TEXT NOT NULL,
            salt TEXT NOT NULL,
            role TEXT NOT NULL
        )",
        [],
    )?;

    // Existing workspaces may predate per-account salts. Add and backfill if needed.
    ensure_staff_salt(&conn)?;

    Ok(conn)
}

fn ensure_staff_salt(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "staff", "salt")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE staff ADD COLUMN salt TEXT NOT NULL DEFAULT ''",
        [],
    )?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
