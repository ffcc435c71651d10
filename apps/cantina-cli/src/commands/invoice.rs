//! Invoice commands.

use std::str::FromStr;

use cantina_core::invoice::effective_tax_percent;
use cantina_core::{InvoiceKind, InvoiceStatus, Money};
use cantina_db::{CustomerInfo, InvoiceFilter};
use chrono::NaiveDate;
use clap::Subcommand;
use serde::Serialize;

use super::{output, CommandResult, Session};
use crate::error::CliError;

#[derive(Subcommand, Debug)]
pub enum InvoiceCommand {
    /// Issue a document for a paid sale
    Generate {
        /// Sale id
        #[arg(long)]
        sale: String,

        /// boleta, factura or factura_afecta
        #[arg(long, value_parser = InvoiceKind::from_str, default_value = "boleta")]
        kind: InvoiceKind,

        #[arg(long)]
        customer_name: Option<String>,

        /// Customer RUC
        #[arg(long)]
        tax_id: Option<String>,

        #[arg(long)]
        address: Option<String>,

        #[arg(long)]
        phone: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        note: Option<String>,
    },
    /// Void an issued document (admin)
    Void {
        number: String,

        #[arg(long, default_value = "")]
        reason: String,
    },
    /// Document and its history
    Show { number: String },
    /// Documents matching the filters, with totals
    List {
        #[arg(long, value_parser = InvoiceKind::from_str)]
        kind: Option<InvoiceKind>,

        /// issued or voided
        #[arg(long)]
        status: Option<String>,

        /// First day, YYYY-MM-DD
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Last day, YYYY-MM-DD
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Number or customer name
        #[arg(long)]
        search: Option<String>,

        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
    /// Current billing configuration and counters
    Config,
}

pub async fn run(session: &Session, command: InvoiceCommand) -> CommandResult {
    let invoices = session.db.invoices();

    match command {
        InvoiceCommand::Generate {
            sale,
            kind,
            customer_name,
            tax_id,
            address,
            phone,
            email,
            note,
        } => {
            let actor = session.operator().await?;
            let customer = CustomerInfo {
                name: customer_name,
                tax_id,
                address,
                phone,
                email,
                note,
            };
            output(&invoices.generate(&sale, kind, customer, &actor).await?)
        }
        InvoiceCommand::Void { number, reason } => {
            let actor = session.operator().await?;
            output(&invoices.void(&number, &reason, &actor).await?)
        }
        InvoiceCommand::Show { number } => {
            #[derive(Serialize)]
            struct Shown<I, H> {
                invoice: I,
                tax_percent: f64,
                history: H,
            }

            let invoice = invoices
                .get(&number)
                .await?
                .ok_or_else(|| CliError::not_found("Invoice", &number))?;
            let history = invoices.history(&invoice.number).await?;
            let tax_percent = effective_tax_percent(
                Money::from_cents(invoice.subtotal_cents),
                Money::from_cents(invoice.tax_cents),
            );
            output(&Shown {
                invoice,
                tax_percent,
                history,
            })
        }
        InvoiceCommand::List {
            kind,
            status,
            from,
            to,
            search,
            limit,
        } => {
            #[derive(Serialize)]
            struct Listed<L, S> {
                invoices: L,
                summary: S,
            }

            let status = match status.as_deref() {
                None => None,
                Some("issued") => Some(InvoiceStatus::Issued),
                Some("voided") => Some(InvoiceStatus::Voided),
                Some(other) => {
                    return Err(CliError::validation(format!(
                        "status must be issued or voided, got '{other}'"
                    )))
                }
            };
            let filter = InvoiceFilter {
                kind,
                status,
                from: from.and_then(|d| d.and_hms_opt(0, 0, 0)).map(|d| d.and_utc()),
                to: to.and_then(|d| d.and_hms_opt(23, 59, 59)).map(|d| d.and_utc()),
                search,
                limit,
            };
            output(&Listed {
                invoices: invoices.list(&filter).await?,
                summary: invoices.summary(&filter).await?,
            })
        }
        InvoiceCommand::Config => output(&invoices.billing_config().await?),
    }
}
