//! Row deriver: proposals in, normalized rows out
//!
//! Every field has a default, so derivation never fails. Fields the input
//! does not carry (channel, seller, category, region) come from the lookup
//! tables, indexed by proposal id.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::debug;

use crate::config::ReportConfig;
use crate::parse::{parse_date, parse_value_field, try_parse_date, RawDate};
use crate::{Clock, DerivedRow, ProposalInput};

/// Derive one row per proposal, sorted by date ascending (stable)
pub fn derive_rows(
    proposals: &[ProposalInput],
    config: &ReportConfig,
    clock: &dyn Clock,
) -> Vec<DerivedRow> {
    let today = clock.today();
    let mut rows: Vec<DerivedRow> = proposals
        .iter()
        .map(|proposal| derive_row(proposal, config, today))
        .collect();
    rows.sort_by_key(|row| row.date);
    rows
}

/// Derive a single row; `today` replaces unreadable dates
pub fn derive_row(proposal: &ProposalInput, config: &ReportConfig, today: NaiveDate) -> DerivedRow {
    let id = proposal.numeric_id();
    let lookups = &config.lookups;
    let status = proposal
        .status_text()
        .unwrap_or_else(|| config.statuses.pending.clone());

    let date = derive_date(proposal, id, today);

    let value = match parse_value_field(proposal.value.as_ref()) {
        Ok(value) => value.round_dp(2).max(Decimal::ZERO),
        Err(err) => {
            debug!(proposal = id, %err, "value unreadable, using 0");
            Decimal::ZERO
        }
    };

    DerivedRow {
        date,
        client_name: proposal.client_text().unwrap_or_default(),
        title: proposal
            .title_text()
            .unwrap_or_else(|| format!("Contrato #{id}")),
        paid: status == config.statuses.sold,
        status,
        channel: lookups.channel_for(id).to_string(),
        value,
        seller: lookups.seller_for(id).to_string(),
        category: lookups.category_for(id).to_string(),
        region: lookups.region_for(id).to_string(),
    }
}

fn derive_date(proposal: &ProposalInput, id: i64, today: NaiveDate) -> NaiveDate {
    match RawDate::from(proposal.created_at.as_ref()) {
        RawDate::Text(text) => try_parse_date(text).unwrap_or_else(|err| {
            debug!(proposal = id, %err, "date unreadable, using today");
            today
        }),
        other => parse_date(other, today),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FixedClock;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    fn proposal(value: Value) -> ProposalInput {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn full_record_maps_every_field() {
        let config = ReportConfig::default();
        let row = derive_row(
            &proposal(json!({
                "id": 5,
                "status": "vendida",
                "createdAt": "2024-03-01T12:00:00Z",
                "value": "1.234,567",
                "clientName": "ACME",
                "title": "Site novo"
            })),
            &config,
            today(),
        );

        assert_eq!(row.date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(row.client_name, "ACME");
        assert_eq!(row.title, "Site novo");
        assert_eq!(row.status, "vendida");
        assert_eq!(row.channel, "Boleto");
        assert_eq!(row.value, dec!(1234.57));
        assert!(row.paid);
        assert_eq!(row.seller, "João");
        assert_eq!(row.category, "Setup");
        assert_eq!(row.region, "SP");
    }

    #[test]
    fn empty_record_gets_defaults() {
        let row = derive_row(&ProposalInput::default(), &ReportConfig::default(), today());

        assert_eq!(row.date, today());
        assert_eq!(row.client_name, "");
        assert_eq!(row.title, "Contrato #0");
        assert_eq!(row.status, "pendente");
        assert_eq!(row.value, Decimal::ZERO);
        assert!(!row.paid);
        assert_eq!(row.channel, "Pix");
    }

    #[test]
    fn bad_value_and_date_are_absorbed() {
        let row = derive_row(
            &proposal(json!({"id": 9, "value": "abc", "createdAt": "not-a-date"})),
            &ReportConfig::default(),
            today(),
        );
        assert_eq!(row.value, Decimal::ZERO);
        assert_eq!(row.date, today());
        assert_eq!(row.title, "Contrato #9");
    }

    #[test]
    fn oversized_values_fall_back_to_zero() {
        let huge = "79.228.162.514.264.337.593.543.950.335";
        let proposals = vec![
            proposal(json!({"id": 1, "status": "vendida", "value": huge, "clientName": "A"})),
            proposal(json!({"id": 2, "status": "vendida", "value": huge, "clientName": "A"})),
        ];

        let rows = derive_rows(&proposals, &ReportConfig::default(), &FixedClock(today()));
        assert!(rows.iter().all(|row| row.value == Decimal::ZERO));

        let kpis = crate::Kpis::compute(&rows, &crate::StatusLabels::default());
        assert_eq!(kpis.sold, 2);
        assert_eq!(kpis.total_revenue, Decimal::ZERO);
    }

    #[test]
    fn negative_value_is_clamped() {
        let row = derive_row(
            &proposal(json!({"id": 1, "value": "-10,00"})),
            &ReportConfig::default(),
            today(),
        );
        assert_eq!(row.value, Decimal::ZERO);
    }

    #[test]
    fn synthetic_fields_depend_only_on_id() {
        let config = ReportConfig::default();
        let a = derive_row(
            &proposal(json!({"id": 42, "status": "vendida", "value": "10,00", "clientName": "A"})),
            &config,
            today(),
        );
        let b = derive_row(
            &proposal(json!({"id": 42, "status": "cancelada", "createdAt": "2020-01-01", "clientName": "B"})),
            &config,
            today(),
        );

        assert_eq!(a.channel, b.channel);
        assert_eq!(a.seller, b.seller);
        assert_eq!(a.category, b.category);
        assert_eq!(a.region, b.region);
    }

    #[test]
    fn paid_only_for_sold_status() {
        let config = ReportConfig::default();
        for (status, paid) in [("vendida", true), ("pendente", false), ("Vendida", false), ("cancelada", false)] {
            let row = derive_row(&proposal(json!({"status": status})), &config, today());
            assert_eq!(row.paid, paid, "status {status}");
        }
    }

    #[test]
    fn rows_sorted_by_date_with_stable_ties() {
        let proposals = vec![
            proposal(json!({"id": 1, "createdAt": "2024-05-01", "title": "late"})),
            proposal(json!({"id": 2, "createdAt": "2024-01-01", "title": "first-tie"})),
            proposal(json!({"id": 3, "createdAt": "2024-03-01", "title": "middle"})),
            proposal(json!({"id": 4, "createdAt": "2024-01-01", "title": "second-tie"})),
        ];

        let rows = derive_rows(&proposals, &ReportConfig::default(), &FixedClock(today()));
        let titles: Vec<&str> = rows.iter().map(|r| r.title.as_str()).collect();

        assert_eq!(titles, vec!["first-tie", "second-tie", "middle", "late"]);
        assert!(rows.windows(2).all(|pair| pair[0].date <= pair[1].date));
    }

    #[test]
    fn malformed_dates_do_not_abort_and_sort_as_today() {
        let proposals = vec![
            proposal(json!({"id": 1, "createdAt": "garbage"})),
            proposal(json!({"id": 2, "createdAt": "2024-01-01"})),
        ];

        let rows = derive_rows(&proposals, &ReportConfig::default(), &FixedClock(today()));

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(rows[1].date, today());
    }
}
