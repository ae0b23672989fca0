use rusqlite::{params, Connection, OptionalExtension};

// ── Auth token ──

pub fn save_auth_token(conn: &Connection, token: &str) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO auth_token (id, token) VALUES (1, ?1)
         ON CONFLICT(id) DO UPDATE SET token = excluded.token, saved_at = datetime('now')",
        params![token],
    )?;
    Ok(())
}

pub fn load_auth_token(conn: &Connection) -> anyhow::Result<Option<String>> {
    let token = conn
        .query_row("SELECT token FROM auth_token WHERE id = 1", [], |row| row.get(0))
        .optional()?;
    Ok(token)
}

pub fn clear_auth_token(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("DELETE FROM auth_token", [])?;
    Ok(())
}
