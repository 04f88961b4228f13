use anyhow::{bail, Context, Result};
use rusqlite::Connection;

/// Schema steps in order; entry `n` upgrades a store at version `n` to `n + 1`.
const MIGRATIONS: [&str; 3] = [
    // v1: files and closed sessions
    include_str!("schemas/schema_v1.sql"),
    // v2: keyword cluster assignment
    include_str!("schemas/schema_v2.sql"),
    // v3: searchable text for indexing
    include_str!("schemas/schema_v3.sql"),
];

const CURRENT_SCHEMA_VERSION: i32 = MIGRATIONS.len() as i32;

fn user_version(conn: &Connection) -> Result<i32> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read user_version pragma")
}

/// Bring the store up to `CURRENT_SCHEMA_VERSION` in a single transaction.
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let found = user_version(conn)?;
    if found > CURRENT_SCHEMA_VERSION {
        bail!("record store schema v{found} is newer than this build understands (v{CURRENT_SCHEMA_VERSION})");
    }
    if found == CURRENT_SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn
        .transaction()
        .context("failed to begin schema upgrade")?;
    for (step, sql) in MIGRATIONS.iter().enumerate().skip(found.max(0) as usize) {
        let target = step as i32 + 1;
        tx.execute_batch(sql)
            .with_context(|| format!("schema upgrade to v{target} failed"))?;
        log::info!("Record store upgraded to schema v{target}");
    }
    tx.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)
        .context("failed to record schema version")?;
    tx.commit().context("failed to commit schema upgrade")?;

    Ok(())
}
