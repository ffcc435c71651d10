//! Family card commands: administration, recharge and ledger history.

use cantina_core::Money;
use clap::{Args, Subcommand};
use serde::Serialize;

use super::{output, ChildTarget, CommandResult, Session};

#[derive(Subcommand, Debug)]
pub enum CardCommand {
    /// Give a child a card (number and code generated unless supplied)
    Assign {
        #[command(flatten)]
        target: ChildTarget,

        /// Card number to use instead of a generated one
        #[arg(long)]
        number: Option<String>,

        /// 4-digit security code to use instead of a generated one
        #[arg(long)]
        code: Option<String>,
    },
    /// Replace the card number and security code (admin)
    Regenerate {
        #[command(flatten)]
        target: ChildTarget,
    },
    /// Re-enable a card
    Activate {
        #[command(flatten)]
        target: ChildTarget,
    },
    /// Block a card for purchases
    Deactivate {
        #[command(flatten)]
        target: ChildTarget,
    },
    /// Manual balance correction, positive or negative (admin)
    Adjust {
        #[command(flatten)]
        target: ChildTarget,

        /// Signed amount in guaraníes
        #[arg(long, allow_negative_numbers = true, value_parser = Money::parse_guaranies)]
        amount: Money,

        #[arg(long)]
        note: String,
    },
    /// Ledger rows and recharges, newest first
    History {
        #[command(flatten)]
        target: ChildTarget,

        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

#[derive(Args, Debug)]
pub struct RechargeArgs {
    #[command(flatten)]
    pub target: ChildTarget,

    /// Amount in guaraníes (minimum 1.000)
    #[arg(long, value_parser = Money::parse_guaranies)]
    pub amount: Money,

    #[arg(long)]
    pub note: Option<String>,
}

pub async fn run(session: &Session, command: CardCommand) -> CommandResult {
    let actor = session.operator().await?;
    let cards = session.db.cards();

    match command {
        CardCommand::Assign {
            target,
            number,
            code,
        } => {
            let child = session.child(&target).await?;
            let child = cards
                .assign_card(&child.id, number.as_deref(), code.as_deref(), &actor)
                .await?;
            output(&child)
        }
        CardCommand::Regenerate { target } => {
            let child = session.child(&target).await?;
            output(&cards.regenerate_card(&child.id, &actor).await?)
        }
        CardCommand::Activate { target } => {
            let child = session.child(&target).await?;
            output(&cards.set_card_active(&child.id, true, &actor).await?)
        }
        CardCommand::Deactivate { target } => {
            let child = session.child(&target).await?;
            output(&cards.set_card_active(&child.id, false, &actor).await?)
        }
        CardCommand::Adjust {
            target,
            amount,
            note,
        } => {
            let child = session.child(&target).await?;
            let row = cards
                .adjust(&child.id, amount, &note, &actor)
                .await?;
            output(&row)
        }
        CardCommand::History { target, limit } => {
            #[derive(Serialize)]
            struct History<T, R> {
                child_id: String,
                balance: Money,
                transactions: T,
                recharges: R,
            }

            let child = session.child(&target).await?;
            output(&History {
                transactions: cards.transactions(&child.id, limit).await?,
                recharges: cards.recharges(&child.id, limit).await?,
                balance: child.balance(),
                child_id: child.id,
            })
        }
    }
}

pub async fn recharge(session: &Session, args: RechargeArgs) -> CommandResult {
    let actor = session.operator().await?;
    let child = session.child(&args.target).await?;
    let receipt = session
        .db
        .cards()
        .recharge(
            &child.id,
            args.amount,
            &actor,
            args.note.as_deref(),
        )
        .await?;
    output(&receipt)
}
