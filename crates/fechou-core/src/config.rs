//! Report configuration
//!
//! Lookup tables, status literals and report metadata are passed explicitly
//! to the deriver and the renderer. Defaults reproduce the stock "Fechou!"
//! report; a TOML file may override any subset of keys:
//!
//! ```toml
//! currency = "BRL"
//! period_months = 6
//!
//! [lookups]
//! sellers = ["Ana", "Bea"]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Longest trend window accepted
pub const MAX_PERIOD_MONTHS: u32 = 120;

/// Complete report configuration
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportConfig {
    /// ISO currency code shown on the Config sheet
    pub currency: String,
    /// Symbol used in number formats
    pub currency_symbol: String,
    /// Length of the trailing monthly trend
    pub period_months: u32,
    /// Size of the client ranking table
    pub top_clients: usize,
    /// Channel whose sold revenue gets its own trend column
    pub pix_channel: String,
    pub lookups: LookupTables,
    pub statuses: StatusLabels,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            currency: "BRL".into(),
            currency_symbol: "R$".into(),
            period_months: 12,
            top_clients: 10,
            pix_channel: "Pix".into(),
            lookups: LookupTables::default(),
            statuses: StatusLabels::default(),
        }
    }
}

impl ReportConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.lookups.validate()?;

        if self.period_months == 0 || self.period_months > MAX_PERIOD_MONTHS {
            return Err(ConfigError::Invalid {
                field: "period_months",
                reason: format!("expected 1..={MAX_PERIOD_MONTHS}, got {}", self.period_months),
            });
        }
        if self.top_clients == 0 {
            return Err(ConfigError::Invalid {
                field: "top_clients",
                reason: "must be at least 1".into(),
            });
        }
        if self.statuses.sold.is_empty()
            || self.statuses.pending.is_empty()
            || self.statuses.cancelled.is_empty()
        {
            return Err(ConfigError::Invalid {
                field: "statuses",
                reason: "status literals must not be empty".into(),
            });
        }
        Ok(())
    }
}

/// Fixed tables behind the synthetic per-row fields.
///
/// These are placeholders for data the input does not carry: each row picks
/// an entry by its proposal id, so the assignment is deterministic but says
/// nothing about the real sale.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LookupTables {
    pub channels: Vec<String>,
    pub sellers: Vec<String>,
    pub categories: Vec<String>,
    pub regions: Vec<String>,
}

impl Default for LookupTables {
    fn default() -> Self {
        let owned = |items: &[&str]| -> Vec<String> {
            items.iter().map(|s| (*s).to_string()).collect()
        };
        Self {
            channels: owned(&["Pix", "Cartão", "Boleto"]),
            sellers: owned(&["Razi", "Ana", "João", "Bea"]),
            categories: owned(&["Serviço", "Produto", "Mensalidade", "Setup"]),
            regions: owned(&["SP", "RJ", "MG", "PR"]),
        }
    }
}

impl LookupTables {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let tables = [
            ("channels", &self.channels),
            ("sellers", &self.sellers),
            ("categories", &self.categories),
            ("regions", &self.regions),
        ];
        for (name, table) in tables {
            if table.is_empty() {
                return Err(ConfigError::EmptyTable(name));
            }
        }
        Ok(())
    }

    /// `channels[id mod len]`
    pub fn channel_for(&self, id: i64) -> &str {
        pick(&self.channels, id, 0)
    }

    /// `sellers[(id + 1) mod len]`
    pub fn seller_for(&self, id: i64) -> &str {
        pick(&self.sellers, id, 1)
    }

    /// `categories[(id + 2) mod len]`
    pub fn category_for(&self, id: i64) -> &str {
        pick(&self.categories, id, 2)
    }

    /// `regions[(id + 3) mod len]`
    pub fn region_for(&self, id: i64) -> &str {
        pick(&self.regions, id, 3)
    }
}

/// Euclidean modulo keeps negative ids inside the table
fn pick(table: &[String], id: i64, offset: i64) -> &str {
    if table.is_empty() {
        return "";
    }
    let index = (i128::from(id) + i128::from(offset)).rem_euclid(table.len() as i128);
    &table[index as usize]
}

/// Status literals as they appear in the input
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StatusLabels {
    pub sold: String,
    pub pending: String,
    pub cancelled: String,
}

impl Default for StatusLabels {
    fn default() -> Self {
        Self {
            sold: "vendida".into(),
            pending: "pendente".into(),
            cancelled: "cancelada".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_are_valid() {
        assert!(ReportConfig::default().validate().is_ok());
    }

    #[test]
    fn modular_lookup_matches_offsets() {
        let lookups = LookupTables::default();
        assert_eq!(lookups.channel_for(0), "Pix");
        assert_eq!(lookups.channel_for(4), "Cartão");
        assert_eq!(lookups.seller_for(0), "Ana");
        assert_eq!(lookups.seller_for(3), "Razi");
        assert_eq!(lookups.category_for(0), "Mensalidade");
        assert_eq!(lookups.region_for(0), "PR");
        assert_eq!(lookups.region_for(1), "SP");
    }

    #[test]
    fn negative_ids_stay_in_range() {
        let lookups = LookupTables::default();
        assert_eq!(lookups.channel_for(-1), "Boleto");
        assert_eq!(lookups.seller_for(-2), "Bea");
        assert_eq!(lookups.region_for(i64::MAX), "MG");
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = ReportConfig::from_toml_str(
            r#"
            period_months = 6

            [lookups]
            sellers = ["Ana", "Bea"]
            "#,
        )
        .unwrap();

        assert_eq!(config.period_months, 6);
        assert_eq!(config.lookups.sellers, vec!["Ana", "Bea"]);
        assert_eq!(config.lookups.channels.len(), 3);
        assert_eq!(config.currency, "BRL");
        assert_eq!(config.statuses.sold, "vendida");
    }

    #[test]
    fn empty_lookup_table_is_rejected() {
        let result = ReportConfig::from_toml_str("[lookups]\nchannels = []\n");
        assert!(matches!(result, Err(ConfigError::EmptyTable("channels"))));
    }

    #[test]
    fn out_of_range_period_is_rejected() {
        let result = ReportConfig::from_toml_str("period_months = 0\n");
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                field: "period_months",
                ..
            })
        ));
    }

    #[test]
    fn invalid_toml_is_reported() {
        let result = ReportConfig::from_toml_str("period_months = \"twelve\"\n");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }
}
