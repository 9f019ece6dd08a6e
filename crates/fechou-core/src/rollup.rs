//! Precomputed aggregates
//!
//! The same numbers the dashboard formulas produce, evaluated in Rust. They
//! fill the cached result of every formula cell, drive the static-values
//! output mode, and fix the order of the client ranking (which has to be
//! decided at generation time).
//!
//! All averages and ratios are zero when their denominator is zero.

use std::collections::BTreeSet;

use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::config::{ReportConfig, StatusLabels};
use crate::DerivedRow;

/// Global KPI block
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Kpis {
    /// Sum of sold values
    pub total_revenue: Decimal,
    pub sold: usize,
    pub pending: usize,
    pub cancelled: usize,
    /// Revenue per sale
    pub average_ticket: Decimal,
    /// sold / (sold + pending + cancelled)
    pub conversion_rate: f64,
}

impl Kpis {
    pub fn compute(rows: &[DerivedRow], statuses: &StatusLabels) -> Self {
        let mut kpis = Self::default();
        for row in rows {
            if row.has_status(&statuses.sold) {
                kpis.total_revenue += row.value;
                kpis.sold += 1;
            } else if row.has_status(&statuses.pending) {
                kpis.pending += 1;
            } else if row.has_status(&statuses.cancelled) {
                kpis.cancelled += 1;
            }
        }
        kpis.average_ticket = average(kpis.total_revenue, kpis.sold);
        kpis.conversion_rate = ratio(kpis.sold, kpis.status_total());
        kpis
    }

    /// Rows carrying one of the three known statuses
    pub fn status_total(&self) -> usize {
        self.sold + self.pending + self.cancelled
    }
}

/// One line of the per-client sheet
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClientRollup {
    pub name: String,
    pub revenue: Decimal,
    pub sold: usize,
    pub pending: usize,
    pub cancelled: usize,
    pub average_ticket: Decimal,
    /// Latest sold date; `None` when the client never bought
    pub last_sale: Option<NaiveDate>,
}

impl ClientRollup {
    pub fn compute(name: &str, rows: &[DerivedRow], statuses: &StatusLabels) -> Self {
        let mut rollup = Self {
            name: name.to_string(),
            revenue: Decimal::ZERO,
            sold: 0,
            pending: 0,
            cancelled: 0,
            average_ticket: Decimal::ZERO,
            last_sale: None,
        };

        for row in rows.iter().filter(|r| r.client_name == name) {
            if row.has_status(&statuses.sold) {
                rollup.revenue += row.value;
                rollup.sold += 1;
                rollup.last_sale = rollup.last_sale.max(Some(row.date));
            } else if row.has_status(&statuses.pending) {
                rollup.pending += 1;
            } else if row.has_status(&statuses.cancelled) {
                rollup.cancelled += 1;
            }
        }
        rollup.average_ticket = average(rollup.revenue, rollup.sold);
        rollup
    }

    /// One rollup per roster entry, in roster order
    pub fn compute_all(rows: &[DerivedRow], roster: &[String], statuses: &StatusLabels) -> Vec<Self> {
        roster
            .iter()
            .map(|name| Self::compute(name, rows, statuses))
            .collect()
    }
}

/// Distinct non-empty client names, sorted lexicographically
pub fn client_roster(rows: &[DerivedRow]) -> Vec<String> {
    rows.iter()
        .filter(|row| !row.client_name.is_empty())
        .map(|row| row.client_name.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// One month of the trailing trend table
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MonthBucket {
    /// `yyyy-mm`
    pub label: String,
    pub year: i32,
    pub month: u32,
    pub revenue: Decimal,
    pub sold: usize,
    pub pending: usize,
    pub cancelled: usize,
    /// Sold revenue through the Pix channel
    pub pix_revenue: Decimal,
}

impl MonthBucket {
    pub fn compute(
        rows: &[DerivedRow],
        year: i32,
        month: u32,
        statuses: &StatusLabels,
        pix_channel: &str,
    ) -> Self {
        let mut bucket = Self {
            label: month_label(year, month),
            year,
            month,
            revenue: Decimal::ZERO,
            sold: 0,
            pending: 0,
            cancelled: 0,
            pix_revenue: Decimal::ZERO,
        };

        for row in rows.iter().filter(|r| r.in_month(year, month)) {
            if row.has_status(&statuses.sold) {
                bucket.revenue += row.value;
                bucket.sold += 1;
                if row.channel == pix_channel {
                    bucket.pix_revenue += row.value;
                }
            } else if row.has_status(&statuses.pending) {
                bucket.pending += 1;
            } else if row.has_status(&statuses.cancelled) {
                bucket.cancelled += 1;
            }
        }
        bucket
    }

    /// The `months` calendar months ending at the month of `today`, oldest first
    pub fn trailing(
        rows: &[DerivedRow],
        today: NaiveDate,
        months: u32,
        statuses: &StatusLabels,
        pix_channel: &str,
    ) -> Vec<Self> {
        (0..months)
            .rev()
            .filter_map(|back| month_start(today, back))
            .map(|start| Self::compute(rows, start.year(), start.month(), statuses, pix_channel))
            .collect()
    }
}

/// First day of the month `back` months before `today`'s month
pub fn month_start(today: NaiveDate, back: u32) -> Option<NaiveDate> {
    today.with_day(1)?.checked_sub_months(Months::new(back))
}

pub fn month_label(year: i32, month: u32) -> String {
    format!("{year:04}-{month:02}")
}

/// Entry of the top-clients ranking
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RankedClient {
    pub name: String,
    pub revenue: Decimal,
    pub sold: usize,
}

/// Rank the roster by sold revenue, highest first.
///
/// The sort is stable, so clients with equal revenue keep roster order.
/// At most `limit` entries are returned.
pub fn rank_clients(
    rows: &[DerivedRow],
    roster: &[String],
    limit: usize,
    statuses: &StatusLabels,
) -> Vec<RankedClient> {
    let mut ranked: Vec<RankedClient> = roster
        .iter()
        .map(|name| {
            let sold_rows = rows
                .iter()
                .filter(|r| r.client_name == *name && r.has_status(&statuses.sold));
            let (revenue, sold) = sold_rows.fold((Decimal::ZERO, 0), |(sum, n), r| (sum + r.value, n + 1));
            RankedClient {
                name: name.clone(),
                revenue,
                sold,
            }
        })
        .collect();

    ranked.sort_by(|a, b| b.revenue.cmp(&a.revenue));
    ranked.truncate(limit);
    ranked
}

/// Every aggregate shown in the workbook
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Rollup {
    pub kpis: Kpis,
    /// Lexicographic roster order
    pub clients: Vec<ClientRollup>,
    /// Oldest month first
    pub months: Vec<MonthBucket>,
    /// Highest revenue first
    pub top_clients: Vec<RankedClient>,
}

impl Rollup {
    pub fn compute(rows: &[DerivedRow], config: &ReportConfig, today: NaiveDate) -> Self {
        let statuses = &config.statuses;
        let roster = client_roster(rows);
        Self {
            kpis: Kpis::compute(rows, statuses),
            clients: ClientRollup::compute_all(rows, &roster, statuses),
            months: MonthBucket::trailing(
                rows,
                today,
                config.period_months,
                statuses,
                &config.pix_channel,
            ),
            top_clients: rank_clients(rows, &roster, config.top_clients, statuses),
        }
    }

    /// Sum over the per-client lines (the TOTAL row of the client sheet)
    pub fn client_totals(&self) -> ClientRollup {
        let mut total = ClientRollup {
            name: "TOTAL".into(),
            revenue: Decimal::ZERO,
            sold: 0,
            pending: 0,
            cancelled: 0,
            average_ticket: Decimal::ZERO,
            last_sale: None,
        };
        for client in &self.clients {
            total.revenue += client.revenue;
            total.sold += client.sold;
            total.pending += client.pending;
            total.cancelled += client.cancelled;
        }
        total.average_ticket = average(total.revenue, total.sold);
        total
    }
}

fn average(total: Decimal, count: usize) -> Decimal {
    if count == 0 {
        Decimal::ZERO
    } else {
        total / Decimal::from(count)
    }
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}
