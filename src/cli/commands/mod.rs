//! CLI command implementations.

pub mod audit;
pub mod checklist;
pub mod delete;
pub mod review;
pub mod task;

use clap::Args;
use serde::Serialize;

use crate::cli::output::CommandOutput;
use crate::domain::models::ActorId;

/// Identity recorded on every change a command makes.
#[derive(Args, Debug, Clone)]
pub struct ActorArg {
    /// Who is making the change
    #[arg(long)]
    pub actor: String,
}

impl ActorArg {
    pub fn actor_id(&self) -> ActorId {
        ActorId::new(self.actor.trim())
    }
}

/// Plain acknowledgement for commands with nothing else to show.
#[derive(Debug, Serialize)]
pub struct ActionOutput {
    pub success: bool,
    pub message: String,
}

impl ActionOutput {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

impl CommandOutput for ActionOutput {
    fn to_human(&self) -> String {
        self.message.clone()
    }
}
