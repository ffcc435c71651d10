//! # CLI Commands
//!
//! One module per operator workflow. Every command takes the open
//! [`Session`] and returns the JSON document to print.
//!
//! ## Command Categories
//! - `search`: Card and product lookup at the register
//! - `sale`: Checkout (card, cash, mixed, external)
//! - `card`: Assign, regenerate, toggle and recharge family cards
//! - `invoice`: Generate, void and show fiscal documents
//! - `report`: Dashboard, consumption, best sellers, income, daily, stock
//!
//! ## Pattern
//! ```rust,ignore
//! pub async fn command_name(session: &Session, args: CommandArgs) -> CommandResult {
//!     let operator = session.operator().await?;
//!     let result = session.db.some_repo().operation(..., &operator).await?;
//!     output(&result)
//! }
//! ```

pub mod card;
pub mod invoice;
pub mod report;
pub mod sale;
pub mod search;

use cantina_core::{Child, CoreError, Operator};
use cantina_db::Database;
use clap::Args;
use serde::Serialize;
use serde_json::Value;

use crate::config::Settings;
use crate::error::CliError;

pub type CommandResult = Result<Value, CliError>;

/// Open database plus the settings it was opened with.
pub struct Session {
    pub db: Database,
    pub settings: Settings,
}

impl Session {
    /// The operator acting at this terminal, from `--operator` or settings.
    pub async fn operator(&self) -> Result<Operator, CliError> {
        let id = self.settings.operator.as_deref().ok_or_else(|| {
            CliError::config("No operator set: pass --operator or set CANTINA_OPERATOR")
        })?;
        Ok(self.db.families().find_active_operator(id).await?)
    }

    pub async fn child(&self, target: &ChildTarget) -> Result<Child, CliError> {
        let families = self.db.families();
        let (child, key) = match (&target.child, &target.card) {
            (Some(id), _) => (families.get_child(id).await?, id),
            (None, Some(card)) => (families.get_child_by_card(card).await?, card),
            (None, None) => return Err(CliError::validation("Pass --child or --card")),
        };
        child.ok_or_else(|| CoreError::ChildNotFound(key.clone()).into())
    }
}

/// Selects a card holder by id or by card number.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct ChildTarget {
    /// Child id
    #[arg(long)]
    pub child: Option<String>,

    /// Card number, with or without separators
    #[arg(long)]
    pub card: Option<String>,
}

pub fn output<T: Serialize>(value: &T) -> CommandResult {
    Ok(serde_json::to_value(value)?)
}
