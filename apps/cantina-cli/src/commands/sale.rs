//! # Sale Commands
//!
//! `cantina sell` builds a [`CheckoutRequest`] from flags and runs the
//! atomic checkout. `cantina sale show|cancel` looks up or reverses a sale.
//!
//! ## Tender Flags
//! ```text
//! --pay card                                         card pays everything
//! --pay cash --received 10000                        cash, change computed
//! --pay mixed --external 3000 [--method efectivo]    card pays the rest
//! --pay external --method pos [--reference 123]      non-cash method
//! ```

use std::str::FromStr;

use cantina_core::tender::Tender;
use cantina_core::{InvoiceKind, Money, CASH_METHOD};
use cantina_db::{CheckoutLine, CheckoutRequest, CustomerInfo, InvoiceRequest, SaleDetail};
use clap::{Args, ValueEnum};
use serde::Serialize;
use tracing::info;

use super::{output, CommandResult, Session};
use crate::error::CliError;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PayWith {
    Card,
    Cash,
    Mixed,
    External,
}

#[derive(Args, Debug)]
pub struct SellArgs {
    /// Product lines as CODE or CODE:QTY (repeatable)
    #[arg(long = "item", required = true, value_parser = parse_line)]
    pub items: Vec<CheckoutLine>,

    #[arg(long, value_enum, default_value_t = PayWith::Card)]
    pub pay: PayWith,

    /// Child id of the card holder
    #[arg(long, conflicts_with = "card")]
    pub child: Option<String>,

    /// Card number of the card holder
    #[arg(long)]
    pub card: Option<String>,

    /// Cash handed over, in guaraníes (10000 or 10.000)
    #[arg(long, value_parser = Money::parse_guaranies)]
    pub received: Option<Money>,

    /// External part of a mixed payment, in guaraníes
    #[arg(long, value_parser = Money::parse_guaranies)]
    pub external: Option<Money>,

    /// Payment method code for mixed or external payments
    #[arg(long)]
    pub method: Option<String>,

    /// Voucher or transfer reference for external payments
    #[arg(long)]
    pub reference: Option<String>,

    /// Issue a document with the sale: boleta, factura or factura_afecta
    #[arg(long, value_parser = InvoiceKind::from_str)]
    pub invoice: Option<InvoiceKind>,

    #[arg(long)]
    pub customer_name: Option<String>,

    /// Customer RUC for invoices
    #[arg(long)]
    pub tax_id: Option<String>,

    #[arg(long)]
    pub note: Option<String>,
}

/// `CODE` or `CODE:QTY`.
fn parse_line(raw: &str) -> Result<CheckoutLine, String> {
    match raw.rsplit_once(':') {
        Some((code, qty)) => {
            let quantity = qty
                .trim()
                .parse::<i64>()
                .map_err(|_| format!("invalid quantity in '{raw}'"))?;
            Ok(CheckoutLine::new(code.trim(), quantity))
        }
        None => Ok(CheckoutLine::new(raw.trim(), 1)),
    }
}

impl SellArgs {
    fn tender(&self) -> Result<Tender, CliError> {
        match self.pay {
            PayWith::Card => Ok(Tender::Card),
            PayWith::Cash => {
                let received = self
                    .received
                    .ok_or_else(|| CliError::validation("--pay cash needs --received"))?;
                Ok(Tender::Cash { received })
            }
            PayWith::Mixed => {
                let external = self
                    .external
                    .ok_or_else(|| CliError::validation("--pay mixed needs --external"))?;
                Ok(Tender::Mixed {
                    method_code: self.method.clone().unwrap_or_else(|| CASH_METHOD.to_string()),
                    external_amount: external,
                    received: self.received,
                })
            }
            PayWith::External => {
                let method_code = self
                    .method
                    .clone()
                    .ok_or_else(|| CliError::validation("--pay external needs --method"))?;
                Ok(Tender::External {
                    method_code,
                    reference: self.reference.clone(),
                })
            }
        }
    }
}

/// Receipt plus the store header.
#[derive(Serialize)]
struct SaleOutput<T: Serialize> {
    store: String,
    station: String,
    #[serde(flatten)]
    receipt: T,
}

pub async fn sell(session: &Session, args: SellArgs) -> CommandResult {
    let cashier = session.operator().await?;
    let tender = args.tender()?;

    let child_id = match (&args.child, &args.card) {
        (Some(id), _) => Some(id.clone()),
        (None, Some(card)) => {
            let child = session
                .db
                .families()
                .get_child_by_card(card)
                .await?
                .ok_or_else(|| CliError::not_found("Card", card))?;
            Some(child.id)
        }
        (None, None) => None,
    };

    let invoice = args.invoice.map(|kind| InvoiceRequest {
        kind,
        customer: CustomerInfo {
            name: args.customer_name.clone(),
            tax_id: args.tax_id.clone(),
            ..CustomerInfo::default()
        },
    });

    let request = CheckoutRequest {
        station_code: session.settings.station_code.clone(),
        cashier_id: cashier.id.clone(),
        child_id,
        customer_name: args.customer_name,
        lines: args.items,
        tender,
        invoice,
        note: args.note,
    };

    let receipt = session.db.checkout(request).await?;
    info!(
        sale = %receipt.sale.sale_number,
        total = receipt.sale.total_cents,
        cashier = %cashier.username,
        "Sale recorded"
    );

    output(&SaleOutput {
        store: session.settings.store_name.clone(),
        station: session.settings.station_code.clone(),
        receipt,
    })
}

#[derive(Args, Debug)]
pub struct CancelArgs {
    /// Sale id or sale number (V20260309...)
    pub sale: String,

    #[arg(long, default_value = "")]
    pub reason: String,
}

/// Looks a sale up by number first, then by id.
async fn find_sale(session: &Session, key: &str) -> Result<SaleDetail, CliError> {
    let sales = session.db.sales();
    if let Some(detail) = sales.get_by_number(key).await? {
        return Ok(detail);
    }
    sales
        .get(key)
        .await?
        .ok_or_else(|| CliError::not_found("Sale", key))
}

pub async fn show(session: &Session, sale: &str) -> CommandResult {
    output(&find_sale(session, sale).await?)
}

pub async fn cancel(session: &Session, args: CancelArgs) -> CommandResult {
    let actor = session.operator().await?;
    let sale = find_sale(session, &args.sale).await?.sale;
    let detail = session.db.sales().cancel(&sale.id, &args.reason, &actor).await?;
    output(&detail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line() {
        let line = parse_line("EMP-01:3").unwrap();
        assert_eq!(line.code, "EMP-01");
        assert_eq!(line.quantity, 3);

        let line = parse_line("AGUA").unwrap();
        assert_eq!(line.quantity, 1);

        assert!(parse_line("EMP-01:dos").is_err());
    }

    #[test]
    fn test_cash_needs_received() {
        let args = SellArgs {
            items: vec![CheckoutLine::new("EMP-01", 1)],
            pay: PayWith::Cash,
            child: None,
            card: None,
            received: None,
            external: None,
            method: None,
            reference: None,
            invoice: None,
            customer_name: None,
            tax_id: None,
            note: None,
        };
        assert!(args.tender().is_err());
    }

    #[derive(clap::Parser)]
    struct Register {
        #[command(flatten)]
        sell: SellArgs,
    }

    #[test]
    fn test_amounts_are_parsed_as_guaranies() {
        use clap::Parser;

        let args = Register::try_parse_from([
            "sell", "--item", "EMP-01", "--pay", "mixed", "--external", "3.000", "--received",
            "5000",
        ])
        .unwrap()
        .sell;
        match args.tender().unwrap() {
            Tender::Mixed {
                external_amount,
                received,
                ..
            } => {
                assert_eq!(external_amount, Money::from_guaranies(3_000));
                assert_eq!(received, Some(Money::from_guaranies(5_000)));
            }
            other => panic!("unexpected tender {other:?}"),
        }

        // would overflow once converted to céntimos
        assert!(Register::try_parse_from([
            "sell", "--item", "EMP-01", "--pay", "cash", "--received", "99999999999999999",
        ])
        .is_err());
        assert!(Register::try_parse_from(["sell", "--item", "EMP-01", "--received", "mucho"]).is_err());
    }
}
