//! Report commands. All ranges are inclusive calendar days.

use cantina_core::permissions::{self, Action};
use cantina_core::UserRole;
use cantina_db::DateRange;
use chrono::{NaiveDate, Utc};
use clap::{Args, Subcommand};

use super::{output, CommandResult, Session};

#[derive(Args, Debug, Clone, Copy)]
pub struct RangeArgs {
    /// First day, YYYY-MM-DD (default: everything)
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Last day, YYYY-MM-DD (default: everything)
    #[arg(long)]
    pub to: Option<NaiveDate>,
}

impl From<RangeArgs> for DateRange {
    fn from(args: RangeArgs) -> Self {
        DateRange::new(args.from, args.to)
    }
}

#[derive(Subcommand, Debug)]
pub enum ReportKind {
    /// Today, last 7 and last 30 days, plus stock alerts
    Dashboard,
    /// Spending per child with favourite products
    Consumption {
        #[command(flatten)]
        range: RangeArgs,

        #[arg(long)]
        child: Option<String>,

        /// Only the children of this guardian
        #[arg(long)]
        guardian: Option<String>,
    },
    /// Products ranked by quantity sold
    BestSellers {
        #[command(flatten)]
        range: RangeArgs,

        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    /// Income and commissions per payment method
    Income {
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Sale count and total per day
    Daily {
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Low and out-of-stock products, inventory value at cost
    Stock,
    /// Stock alerts by severity
    Alerts,
}

pub async fn run(session: &Session, kind: ReportKind) -> CommandResult {
    let operator = session.operator().await?;
    // Guardians may see their own family's consumption and nothing else.
    let own_family = operator.role == UserRole::Guardian;
    if !(own_family && matches!(kind, ReportKind::Consumption { .. })) {
        permissions::require(operator.role, Action::ViewReports)?;
    }

    let reports = session.db.reports();
    match kind {
        ReportKind::Dashboard => output(&reports.dashboard(Utc::now().date_naive()).await?),
        ReportKind::Consumption {
            range,
            child,
            guardian,
        } => {
            let guardian = if own_family { Some(operator.id.clone()) } else { guardian };
            output(
                &reports
                    .child_consumption(range.into(), child.as_deref(), guardian.as_deref())
                    .await?,
            )
        }
        ReportKind::BestSellers { range, limit } => {
            output(&reports.best_sellers(range.into(), limit).await?)
        }
        ReportKind::Income { range } => output(&reports.income_by_method(range.into()).await?),
        ReportKind::Daily { range } => output(&reports.daily_sales(range.into()).await?),
        ReportKind::Stock => output(&reports.stock_report().await?),
        ReportKind::Alerts => output(&reports.stock_alerts().await?),
    }
}
