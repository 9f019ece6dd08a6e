//! # fechou-render
//!
//! Workbook rendering for fechou.
//!
//! This crate provides:
//! - The aggregation formula builder ([`formulas`]), which emits the
//!   cross-sheet SUMIFS/COUNTIF/SUMPRODUCT text over bounded data ranges
//! - Dashboard geometry ([`layout`])
//! - The XLSX dashboard renderer ([`DashboardRenderer`])
//!
//! ## Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use fechou_core::{derive_rows, FixedClock, ProposalBatch, ReportConfig, Renderer};
//! use fechou_render::DashboardRenderer;
//!
//! let batch = ProposalBatch::from_json(
//!     r#"{"proposals": [{"id": 1, "status": "vendida", "value": "99,90", "clientName": "ACME"}]}"#,
//! )
//! .unwrap();
//! let clock = FixedClock(NaiveDate::from_ymd_opt(2025, 1, 31).unwrap());
//! let rows = derive_rows(&batch.proposals, &ReportConfig::default(), &clock);
//!
//! let xlsx = DashboardRenderer::new().clock(&clock).render(&rows).unwrap();
//! assert_eq!(&xlsx[0..2], b"PK");
//! ```

pub mod excel;
pub mod formulas;
pub mod layout;

pub use excel::DashboardRenderer;
pub use formulas::{DataColumn, DataTable, FormulaBuilder};
pub use layout::{Kpi, Layout};
