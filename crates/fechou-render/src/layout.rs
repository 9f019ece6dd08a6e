//! Dashboard geometry
//!
//! All coordinates are zero-based `(row, col)` as `rust_xlsxwriter` expects.
//! With the default twelve-month window the layout is:
//!
//! ```text
//! rows 1-4     banner
//! S6:S11       KPI source cells (hidden column)
//! B6, G6, L6   KPI tiles, first row
//! B14, G14, L14 KPI tiles, second row
//! B22          trend title, header on row 23, months on rows 24-35
//! I23          line chart (sold revenue per month)
//! I36          column chart (status counts per month)
//! B36          status breakdown title, table B37:C40
//! E37          doughnut chart
//! I42          top clients title, header I43:K43, slots I44:K53
//! ```
//!
//! A longer window pushes everything below the trend table down. Shorter
//! windows keep the twelve-row block so the charts never overlap.

use crate::formulas::{sheet_cell_ref, DASHBOARD_SHEET};

/// Column holding the KPI source cells (S)
pub const KPI_COLUMN: u16 = 18;

/// Rows reserved for the trend block regardless of window length
const MIN_TREND_BLOCK: u32 = 12;

/// Global KPIs, in the order of their source cells S6..S11
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kpi {
    Revenue,
    Sold,
    Pending,
    Cancelled,
    AverageTicket,
    Conversion,
}

impl Kpi {
    pub const ALL: [Kpi; 6] = [
        Kpi::Revenue,
        Kpi::Sold,
        Kpi::Pending,
        Kpi::Cancelled,
        Kpi::AverageTicket,
        Kpi::Conversion,
    ];

    /// Source cell row (S6 is row 5)
    pub fn row(self) -> u32 {
        5 + self as u32
    }

    /// `S6`-style reference on the dashboard itself
    pub fn local_ref(self) -> String {
        format!("S{}", self.row() + 1)
    }

    /// `Dashboard!$S$6`-style reference
    pub fn sheet_ref(self) -> String {
        sheet_cell_ref(DASHBOARD_SHEET, self.row(), KPI_COLUMN)
    }

    /// Tile caption, icon included
    pub fn caption(self) -> &'static str {
        match self {
            Kpi::Revenue => "💰  Receita total",
            Kpi::Sold => "✅  Vendas (qtd)",
            Kpi::Pending => "⏳  Pendentes (qtd)",
            Kpi::Cancelled => "🧯  Canceladas (qtd)",
            Kpi::AverageTicket => "📈  Ticket médio",
            Kpi::Conversion => "🎯  Conversão",
        }
    }

    /// Top-left corner of the tile
    pub fn tile_origin(self) -> (u32, u16) {
        match self {
            Kpi::Revenue => (5, 1),
            Kpi::Sold => (5, 6),
            Kpi::Pending => (5, 11),
            Kpi::AverageTicket => (13, 1),
            Kpi::Conversion => (13, 6),
            Kpi::Cancelled => (13, 11),
        }
    }
}

/// Height of a KPI tile in rows
pub const TILE_ROWS: u32 = 7;
/// Width of a KPI tile in columns
pub const TILE_COLS: u16 = 4;

/// Row and anchor positions derived from the window length and ranking size
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Layout {
    months: u32,
    top_slots: u32,
}

impl Layout {
    pub fn new(months: u32, top_slots: usize) -> Self {
        Self {
            months,
            top_slots: u32::try_from(top_slots).unwrap_or(u32::MAX),
        }
    }

    pub fn months(&self) -> u32 {
        self.months
    }

    pub fn top_slots(&self) -> u32 {
        self.top_slots
    }

    // ------------------------------------------------------------------------
    // Trend table (columns B..G)
    // ------------------------------------------------------------------------

    pub fn trend_title_row(&self) -> u32 {
        21
    }

    pub fn trend_header_row(&self) -> u32 {
        22
    }

    /// Row of the `index`-th month, oldest first
    pub fn trend_row(&self, index: u32) -> u32 {
        self.trend_header_row() + 1 + index
    }

    pub fn trend_last_row(&self) -> u32 {
        self.trend_header_row() + self.months
    }

    fn trend_block_end(&self) -> u32 {
        self.trend_header_row() + self.months.max(MIN_TREND_BLOCK)
    }

    // ------------------------------------------------------------------------
    // Status breakdown (columns B..C)
    // ------------------------------------------------------------------------

    pub fn status_title_row(&self) -> u32 {
        self.trend_block_end() + 1
    }

    pub fn status_header_row(&self) -> u32 {
        self.status_title_row() + 1
    }

    /// Rows of the sold / pending / cancelled lines
    pub fn status_rows(&self) -> [u32; 3] {
        let first = self.status_header_row() + 1;
        [first, first + 1, first + 2]
    }

    // ------------------------------------------------------------------------
    // Top clients (columns I..K)
    // ------------------------------------------------------------------------

    pub fn top_title_row(&self) -> u32 {
        self.status_header_row() + 5
    }

    pub fn top_header_row(&self) -> u32 {
        self.top_title_row() + 1
    }

    pub fn top_row(&self, slot: u32) -> u32 {
        self.top_header_row() + 1 + slot
    }

    // ------------------------------------------------------------------------
    // Charts
    // ------------------------------------------------------------------------

    pub fn line_chart_anchor(&self) -> (u32, u16) {
        (self.trend_header_row(), 8)
    }

    pub fn column_chart_anchor(&self) -> (u32, u16) {
        (self.status_title_row(), 8)
    }

    pub fn doughnut_anchor(&self) -> (u32, u16) {
        (self.status_header_row(), 4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formulas::cell_ref;
    use pretty_assertions::assert_eq;

    #[test]
    fn kpi_cells_are_s6_to_s11() {
        let refs: Vec<String> = Kpi::ALL.iter().map(|k| k.local_ref()).collect();
        assert_eq!(refs, vec!["S6", "S7", "S8", "S9", "S10", "S11"]);
        assert_eq!(Kpi::Conversion.sheet_ref(), "Dashboard!$S$11");
    }

    #[test]
    fn tiles_do_not_overlap_kpi_column() {
        for kpi in Kpi::ALL {
            let (_, col) = kpi.tile_origin();
            assert!(col + TILE_COLS <= KPI_COLUMN);
        }
    }

    #[test]
    fn default_window_matches_reference_layout() {
        let layout = Layout::new(12, 10);

        assert_eq!(cell_ref(layout.trend_header_row(), 1), "B23");
        assert_eq!(cell_ref(layout.trend_row(0), 1), "B24");
        assert_eq!(cell_ref(layout.trend_last_row(), 1), "B35");
        assert_eq!(cell_ref(layout.status_title_row(), 1), "B36");
        assert_eq!(cell_ref(layout.status_header_row(), 1), "B37");
        assert_eq!(cell_ref(layout.status_rows()[2], 2), "C40");
        assert_eq!(cell_ref(layout.top_title_row(), 8), "I42");
        assert_eq!(cell_ref(layout.top_header_row(), 8), "I43");
        assert_eq!(cell_ref(layout.top_row(9), 10), "K53");

        let (r, c) = layout.line_chart_anchor();
        assert_eq!(cell_ref(r, c), "I23");
        let (r, c) = layout.column_chart_anchor();
        assert_eq!(cell_ref(r, c), "I36");
        let (r, c) = layout.doughnut_anchor();
        assert_eq!(cell_ref(r, c), "E37");
    }

    #[test]
    fn longer_window_pushes_sections_down() {
        let layout = Layout::new(24, 10);
        assert_eq!(layout.trend_last_row(), 22 + 24);
        assert_eq!(layout.status_title_row(), layout.trend_last_row() + 1);
        assert!(layout.top_title_row() > layout.status_rows()[2]);
    }

    #[test]
    fn shorter_window_keeps_reserved_block() {
        let short = Layout::new(3, 10);
        let default = Layout::new(12, 10);
        assert_eq!(short.trend_last_row(), 25);
        assert_eq!(short.status_title_row(), default.status_title_row());
    }
}
