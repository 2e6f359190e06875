//! Audit history CLI command.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use uuid::Uuid;

use crate::cli::id_resolver::resolve_entity_id;
use crate::cli::output::{audit_table, output, CommandOutput};
use crate::cli::CliContext;
use crate::domain::models::FieldChange;

#[derive(Args, Debug)]
pub struct AuditArgs {
    /// Task or checklist ID or unique prefix
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct AuditOutput {
    pub entity_id: Uuid,
    pub changes: Vec<FieldChange>,
}

impl CommandOutput for AuditOutput {
    fn to_human(&self) -> String {
        if self.changes.is_empty() {
            return format!("No recorded changes for {}.", self.entity_id);
        }
        format!("History of {}:\n{}", self.entity_id, audit_table(&self.changes))
    }
}

pub async fn execute(args: AuditArgs, ctx: &CliContext, json_mode: bool) -> Result<()> {
    let entity_id = resolve_entity_id(&ctx.pool, &args.id).await?;
    let changes = ctx.service.history(entity_id).await?;
    output(&AuditOutput { entity_id, changes }, json_mode);
    Ok(())
}
