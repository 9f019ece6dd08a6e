//! Aggregation formula builder
//!
//! Emits the formula text for every aggregate cell of the workbook. All data
//! references point at the raw data sheet through bounded absolute ranges
//! (`Dados!$F$2:$F$<last>`), where `<last>` is the last data row clamped to at
//! least 2. An empty table therefore references one blank row and every
//! SUM/COUNT evaluates to zero.
//!
//! The builder produces text only; the numbers come from
//! [`fechou_core::Rollup`].
//!
//! ## Matching
//!
//! SUMIFS/COUNTIF criteria treat `*`, `?` and `~` as wildcards. Status
//! literals are escaped here and client-name cells are escaped in the formula
//! (`SUBSTITUTE`), so both match exactly like the rollup does. Excel still
//! compares text case-insensitively: `"Vendida"` and `"vendida"`, or clients
//! `"ACME"` and `"acme"`, merge after a recalculation while the cached
//! results keep them apart.

use fechou_core::StatusLabels;

/// Raw data sheet
pub const DATA_SHEET: &str = "Dados";
/// Per-client rollup sheet
pub const CLIENTS_SHEET: &str = "Clientes";
/// Executive dashboard
pub const DASHBOARD_SHEET: &str = "Dashboard";
/// Static configuration sheet
pub const CONFIG_SHEET: &str = "Config";

/// Columns of the raw data sheet, in sheet order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataColumn {
    Date,
    Client,
    Title,
    Status,
    Channel,
    Value,
    Paid,
    Seller,
    Category,
    Region,
}

impl DataColumn {
    pub const ALL: [DataColumn; 10] = [
        DataColumn::Date,
        DataColumn::Client,
        DataColumn::Title,
        DataColumn::Status,
        DataColumn::Channel,
        DataColumn::Value,
        DataColumn::Paid,
        DataColumn::Seller,
        DataColumn::Category,
        DataColumn::Region,
    ];

    /// Zero-based column index
    pub fn index(self) -> u16 {
        self as u16
    }

    pub fn letter(self) -> String {
        column_letter(self.index())
    }

    /// Header text; the value column carries the currency symbol
    pub fn header(self, currency_symbol: &str) -> String {
        match self {
            DataColumn::Date => "Data".into(),
            DataColumn::Client => "Cliente".into(),
            DataColumn::Title => "Proposta".into(),
            DataColumn::Status => "Status".into(),
            DataColumn::Channel => "Canal".into(),
            DataColumn::Value => format!("Valor ({currency_symbol})"),
            DataColumn::Paid => "Pago?".into(),
            DataColumn::Seller => "Vendedor".into(),
            DataColumn::Category => "Categoria".into(),
            DataColumn::Region => "UF".into(),
        }
    }

    /// Column width in characters
    pub fn width(self) -> f64 {
        match self {
            DataColumn::Date => 12.0,
            DataColumn::Client => 20.0,
            DataColumn::Title => 18.0,
            DataColumn::Status => 12.0,
            DataColumn::Channel => 10.0,
            DataColumn::Value => 14.0,
            DataColumn::Paid => 8.0,
            DataColumn::Seller => 12.0,
            DataColumn::Category => 14.0,
            DataColumn::Region => 6.0,
        }
    }
}

/// Convert a zero-based column index to its letter (0 = A, 26 = AA)
pub fn column_letter(col: u16) -> String {
    let mut result = String::new();
    let mut n = u32::from(col);
    loop {
        result.insert(0, char::from(b'A' + (n % 26) as u8));
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    result
}

/// Relative A1 reference for zero-based coordinates
pub fn cell_ref(row: u32, col: u16) -> String {
    format!("{}{}", column_letter(col), row + 1)
}

/// Absolute reference qualified with its sheet, e.g. `Dashboard!$S$6`
pub fn sheet_cell_ref(sheet: &str, row: u32, col: u16) -> String {
    format!("{sheet}!${}${}", column_letter(col), row + 1)
}

/// Quote a string literal for use inside a formula
pub fn quoted(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

/// Quoted SUMIFS/COUNTIF criterion matching `text` literally
pub fn criterion(text: &str) -> String {
    let escaped = text
        .replace('~', "~~")
        .replace('*', "~*")
        .replace('?', "~?");
    quoted(&escaped)
}

/// Criterion expression matching the text of `cell` literally
pub fn cell_criterion(cell: &str) -> String {
    format!(
        "SUBSTITUTE(SUBSTITUTE(SUBSTITUTE({cell},\"~\",\"~~\"),\"*\",\"~*\"),\"?\",\"~?\")"
    )
}

/// Extent of the raw data table
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DataTable {
    rows: usize,
}

impl DataTable {
    /// First data row (1-based; row 1 is the header)
    pub const FIRST_ROW: u32 = 2;

    pub fn new(rows: usize) -> Self {
        Self { rows }
    }

    /// Last referenced row (1-based), never above the first data row
    pub fn last_row(&self) -> u32 {
        let last = u32::try_from(self.rows).map_or(u32::MAX, |n| n.saturating_add(1));
        last.max(Self::FIRST_ROW)
    }

    /// `Dados!$X$2:$X$<last>`
    pub fn range(&self, column: DataColumn) -> String {
        let letter = column.letter();
        format!(
            "{DATA_SHEET}!${letter}${}:${letter}${}",
            Self::FIRST_ROW,
            self.last_row()
        )
    }
}

/// Builds the aggregate formulas for one data table
#[derive(Clone, Debug)]
pub struct FormulaBuilder<'a> {
    table: DataTable,
    statuses: &'a StatusLabels,
    pix_channel: &'a str,
}

impl<'a> FormulaBuilder<'a> {
    pub fn new(rows: usize, statuses: &'a StatusLabels, pix_channel: &'a str) -> Self {
        Self {
            table: DataTable::new(rows),
            statuses,
            pix_channel,
        }
    }

    pub fn table(&self) -> DataTable {
        self.table
    }

    pub fn statuses(&self) -> &StatusLabels {
        self.statuses
    }

    fn range(&self, column: DataColumn) -> String {
        self.table.range(column)
    }

    // ------------------------------------------------------------------------
    // Global KPIs
    // ------------------------------------------------------------------------

    /// Sum of sold values
    pub fn total_revenue(&self) -> String {
        format!(
            "=SUMIFS({},{},{})",
            self.range(DataColumn::Value),
            self.range(DataColumn::Status),
            criterion(&self.statuses.sold)
        )
    }

    /// Number of rows with the given status literal
    pub fn status_count(&self, status: &str) -> String {
        format!("=COUNTIF({},{})", self.range(DataColumn::Status), criterion(status))
    }

    /// `numerator / denominator`, zero when the division fails
    pub fn ratio(&self, numerator: &str, denominator: &str) -> String {
        format!("=IFERROR({numerator}/{denominator},0)")
    }

    /// `sold / (sold + pending + cancelled)`, zero on an empty denominator
    pub fn conversion_rate(&self, sold: &str, pending: &str, cancelled: &str) -> String {
        format!("=IFERROR({sold}/({sold}+{pending}+{cancelled}),0)")
    }

    // ------------------------------------------------------------------------
    // Per client
    // ------------------------------------------------------------------------

    /// Sold revenue for the client named in `client_cell`
    pub fn client_revenue(&self, client_cell: &str) -> String {
        format!(
            "=SUMIFS({},{},{},{},{})",
            self.range(DataColumn::Value),
            self.range(DataColumn::Client),
            cell_criterion(client_cell),
            self.range(DataColumn::Status),
            criterion(&self.statuses.sold)
        )
    }

    /// Rows of one client with the given status
    pub fn client_status_count(&self, client_cell: &str, status: &str) -> String {
        format!(
            "=COUNTIFS({},{},{},{})",
            self.range(DataColumn::Client),
            cell_criterion(client_cell),
            self.range(DataColumn::Status),
            criterion(status)
        )
    }

    /// Latest sold date of a client, blank when it has no sales.
    ///
    /// MAXIFS returns 0 rather than an error when nothing matches, so the
    /// sold count in `sold_count_cell` guards it.
    pub fn client_last_sale(&self, client_cell: &str, sold_count_cell: &str) -> String {
        format!(
            "=IFERROR(IF({sold_count_cell}=0,\"\",_xlfn.MAXIFS({},{},{},{},{})),\"\")",
            self.range(DataColumn::Date),
            self.range(DataColumn::Client),
            cell_criterion(client_cell),
            self.range(DataColumn::Status),
            criterion(&self.statuses.sold)
        )
    }

    // ------------------------------------------------------------------------
    // Monthly trend
    // ------------------------------------------------------------------------

    /// `yyyy-mm` label of the month `back` months before the current one
    pub fn month_label(&self, back: u32) -> String {
        format!("=TEXT(EDATE(TODAY(),-{back}),\"yyyy-mm\")")
    }

    fn month_match(&self, label_cell: &str) -> String {
        format!(
            "(TEXT({},\"yyyy-mm\")={label_cell})",
            self.range(DataColumn::Date)
        )
    }

    fn status_match(&self, status: &str) -> String {
        format!("({}={})", self.range(DataColumn::Status), quoted(status))
    }

    /// Sold revenue of the month labelled in `label_cell`
    pub fn month_revenue(&self, label_cell: &str) -> String {
        format!(
            "=SUMPRODUCT({}*{}*({}))",
            self.month_match(label_cell),
            self.status_match(&self.statuses.sold),
            self.range(DataColumn::Value)
        )
    }

    /// Rows of the month with the given status
    pub fn month_status_count(&self, label_cell: &str, status: &str) -> String {
        format!(
            "=SUMPRODUCT({}*{})",
            self.month_match(label_cell),
            self.status_match(status)
        )
    }

    /// Sold revenue of the month through the Pix channel
    pub fn month_pix_revenue(&self, label_cell: &str) -> String {
        format!(
            "=SUMPRODUCT({}*{}*({}={})*({}))",
            self.month_match(label_cell),
            self.status_match(&self.statuses.sold),
            self.range(DataColumn::Channel),
            quoted(self.pix_channel),
            self.range(DataColumn::Value)
        )
    }

    // ------------------------------------------------------------------------
    // Sheet-local helpers
    // ------------------------------------------------------------------------

    /// `=SUM(X<first>:X<last>)` over 1-based rows; `None` for an empty span
    pub fn column_sum(&self, col: u16, first_row: u32, last_row: u32) -> Option<String> {
        if last_row < first_row {
            return None;
        }
        let letter = column_letter(col);
        Some(format!("=SUM({letter}{first_row}:{letter}{last_row})"))
    }

    /// `=<reference>`
    pub fn reference(&self, target: &str) -> String {
        format!("={target}")
    }
}
