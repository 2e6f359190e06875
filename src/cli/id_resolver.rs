//! Short ID prefix resolution for CLI commands.
//!
//! Allows users to specify any unique prefix of a UUID instead of the full
//! 36-char ID, similar to git short hashes. Deleted entities still resolve so
//! that their audit history stays reachable.

use anyhow::{bail, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

const TASK_QUERY: &str = "SELECT id FROM tasks WHERE id LIKE ? ORDER BY id";
const CHECKLIST_QUERY: &str = "SELECT id FROM checklists WHERE id LIKE ? ORDER BY id";
const ENTITY_QUERY: &str =
    "SELECT id FROM tasks WHERE id LIKE ? UNION SELECT id FROM checklists WHERE id LIKE ? ORDER BY id";

/// Resolve a task ID prefix to a full UUID.
pub async fn resolve_task_id(pool: &SqlitePool, prefix: &str) -> Result<Uuid> {
    resolve_prefix(pool, prefix, "task", TASK_QUERY).await
}

/// Resolve a checklist ID prefix to a full UUID.
pub async fn resolve_checklist_id(pool: &SqlitePool, prefix: &str) -> Result<Uuid> {
    resolve_prefix(pool, prefix, "checklist", CHECKLIST_QUERY).await
}

/// Resolve a prefix that may name either a task or a checklist.
pub async fn resolve_entity_id(pool: &SqlitePool, prefix: &str) -> Result<Uuid> {
    resolve_prefix(pool, prefix, "task or checklist", ENTITY_QUERY).await
}

fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.is_empty() {
        bail!("ID prefix must not be empty");
    }
    if !prefix.chars().all(|c| c.is_ascii_hexdigit() || c == '-') {
        bail!("Invalid ID prefix '{prefix}': must contain only hex characters and dashes");
    }
    Ok(())
}

async fn resolve_prefix(pool: &SqlitePool, prefix: &str, entity: &str, query: &str) -> Result<Uuid> {
    // Fast path: a full UUID needs no lookup
    if let Ok(uuid) = Uuid::parse_str(prefix) {
        return Ok(uuid);
    }

    validate_prefix(prefix)?;
    let pattern = format!("{}%", prefix.to_ascii_lowercase());

    let mut q = sqlx::query_as::<_, (String,)>(query).bind(&pattern);
    if query == ENTITY_QUERY {
        q = q.bind(&pattern);
    }
    let rows = q.fetch_all(pool).await?;

    match rows.as_slice() {
        [] => bail!("No {entity} found matching '{prefix}'"),
        [(id,)] => Ok(Uuid::parse_str(id)?),
        many => {
            let mut msg = format!("Ambiguous prefix '{prefix}': matches {} {entity}s:", many.len());
            for (id,) in many {
                msg.push_str(&format!("\n  {id}"));
            }
            bail!("{msg}")
        }
    }
}
