//! XLSX dashboard renderer
//!
//! Generates the four-sheet sales workbook:
//! - Dashboard: banner, KPI tiles, monthly trend, status breakdown, charts and
//!   the top clients ranking
//! - Dados: one row per derived proposal
//! - Clientes: per-client revenue and status counts
//! - Config: currency, window length and base year
//!
//! ## Formula mode
//!
//! By default every aggregate is a live formula over the Dados sheet, so
//! editing a row updates the whole dashboard. Each formula also carries its
//! cached result, computed here by [`Rollup`], so viewers that never
//! recalculate still show the right numbers.
//!
//! [`DashboardRenderer::static_values`] writes the same numbers as plain
//! values instead.
//!
//! The client ranking is the one thing a formula cannot keep live: its order
//! is fixed at generation time.

use chrono::{Datelike, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_xlsxwriter::{
    Chart, ChartDataLabel, ChartType, ConditionalFormatFormula, ExcelDateTime, Format,
    FormatAlign, FormatBorder, Formula, Workbook, Worksheet, XlsxError,
};
use tracing::{debug, info};

use fechou_core::{
    Clock, DerivedRow, RenderError, Renderer, ReportConfig, Rollup, SystemClock,
};

use crate::formulas::{
    cell_ref, quoted, DataColumn, DataTable, FormulaBuilder, CLIENTS_SHEET, CONFIG_SHEET,
    DASHBOARD_SHEET, DATA_SHEET,
};
use crate::layout::{Kpi, Layout, KPI_COLUMN, TILE_COLS};

const BRAND_ORANGE: u32 = 0xFF6600;
const BRAND_DARK: u32 = 0x0B1220;
const BRAND_DARK2: u32 = 0x111827;
const BRAND_GRAY: u32 = 0xF3F4F6;
const BRAND_TEXT: u32 = 0x111827;
const BRAND_WHITE: u32 = 0xFFFFFF;
const LIGHT_BORDER: u32 = 0xE5E7EB;
const MUTED_TEXT: u32 = 0x6B7280;

/// Column widths of the dashboard, A..T
const DASHBOARD_WIDTHS: [f64; 20] = [
    2.0, 16.0, 16.0, 16.0, 2.0, 16.0, 16.0, 16.0, 2.0, 16.0, 16.0, 16.0, 2.0, 16.0, 16.0, 16.0,
    2.0, 16.0, 16.0, 16.0,
];

/// Column widths of the client sheet, A..G
const CLIENT_WIDTHS: [f64; 7] = [22.0, 16.0, 10.0, 12.0, 14.0, 16.0, 14.0];

/// First client row on the client sheet (row 5)
const FIRST_CLIENT_ROW: u32 = 4;

/// Chart sizes in pixels
const TREND_CHART_SIZE: (u32, u32) = (907, 378);
const DOUGHNUT_SIZE: (u32, u32) = (454, 340);

/// Sales dashboard workbook renderer
#[derive(Clone, Debug)]
pub struct DashboardRenderer {
    /// Lookup tables, status literals and report metadata
    pub config: ReportConfig,
    /// Whether to write formulas (vs static values)
    pub use_formulas: bool,
    /// Pinned "today"; the system clock when unset
    today: Option<NaiveDate>,
}

impl Default for DashboardRenderer {
    fn default() -> Self {
        Self {
            config: ReportConfig::default(),
            use_formulas: true,
            today: None,
        }
    }
}

impl DashboardRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole report configuration
    pub fn with_config(mut self, config: ReportConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the ISO currency code shown on the Config sheet
    pub fn currency(mut self, currency: impl Into<String>) -> Self {
        self.config.currency = currency.into();
        self
    }

    /// Set the symbol used in money formats and headers
    pub fn currency_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.config.currency_symbol = symbol.into();
        self
    }

    /// Set the length of the trailing monthly trend
    pub fn months(mut self, months: u32) -> Self {
        self.config.period_months = months;
        self
    }

    /// Set the size of the client ranking
    pub fn top_clients(mut self, count: usize) -> Self {
        self.config.top_clients = count;
        self
    }

    /// Use static values instead of formulas
    pub fn static_values(mut self) -> Self {
        self.use_formulas = false;
        self
    }

    /// Pin "today" to the given clock
    pub fn clock(mut self, clock: &dyn Clock) -> Self {
        self.today = Some(clock.today());
        self
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| SystemClock.today())
    }

    /// Generate Excel workbook bytes
    pub fn render_to_bytes(&self, rows: &[DerivedRow]) -> Result<Vec<u8>, RenderError> {
        self.config
            .validate()
            .map_err(|e| RenderError::InvalidData(e.to_string()))?;

        let today = self.today();
        let report = Report {
            rows,
            rollup: Rollup::compute(rows, &self.config, today),
            formulas: FormulaBuilder::new(rows.len(), &self.config.statuses, &self.config.pix_channel),
            layout: Layout::new(self.config.period_months, self.config.top_clients),
            today,
        };
        let formats = self.create_formats();

        let mut workbook = Workbook::new();
        self.add_dashboard_sheet(&mut workbook, &report, &formats)?;
        self.add_data_sheet(&mut workbook, &report, &formats)?;
        self.add_clients_sheet(&mut workbook, &report, &formats)?;
        self.add_config_sheet(&mut workbook, &report, &formats)?;

        let buffer = workbook
            .save_to_buffer()
            .map_err(|e| RenderError::Format(format!("Failed to create Excel: {e}")))?;

        info!(
            rows = rows.len(),
            clients = report.rollup.clients.len(),
            bytes = buffer.len(),
            "workbook rendered"
        );
        Ok(buffer)
    }

    /// Create reusable formats
    fn create_formats(&self) -> DashboardFormats {
        let money_format = format!("\"{}\" #,##0.00", self.config.currency_symbol);

        let light_cell = || {
            Format::new()
                .set_align(FormatAlign::Left)
                .set_align(FormatAlign::VerticalCenter)
                .set_border(FormatBorder::Thin)
                .set_border_color(LIGHT_BORDER)
        };

        let header = Format::new()
            .set_bold()
            .set_font_color(BRAND_WHITE)
            .set_background_color(BRAND_DARK2)
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter)
            .set_border(FormatBorder::Thin)
            .set_border_color(BRAND_DARK2);

        let table_header = Format::new()
            .set_bold()
            .set_font_color(BRAND_TEXT)
            .set_background_color(BRAND_GRAY)
            .set_align(FormatAlign::Center)
            .set_border(FormatBorder::Thin)
            .set_border_color(LIGHT_BORDER);

        let total = light_cell().set_bold().set_background_color(BRAND_GRAY);

        let tile_value = Format::new()
            .set_bold()
            .set_font_size(20)
            .set_font_color(BRAND_ORANGE)
            .set_background_color(BRAND_WHITE)
            .set_align(FormatAlign::Left)
            .set_align(FormatAlign::VerticalCenter)
            .set_border(FormatBorder::Thin)
            .set_border_color(LIGHT_BORDER);

        let banner = Format::new()
            .set_background_color(BRAND_DARK)
            .set_border(FormatBorder::Thin)
            .set_border_color(BRAND_DARK);

        DashboardFormats {
            text: light_cell(),
            date: light_cell().set_num_format("yyyy-mm-dd"),
            money: light_cell().set_num_format(&money_format),
            count: light_cell().set_num_format("0"),
            total_text: total.clone(),
            total_money: total.clone().set_num_format(&money_format),
            total_count: total.set_num_format("0"),
            header,
            table_header,
            sheet_title: Format::new()
                .set_bold()
                .set_font_size(16)
                .set_font_color(BRAND_TEXT),
            subtitle: Format::new()
                .set_font_size(10)
                .set_font_color(MUTED_TEXT)
                .set_align(FormatAlign::Left),
            section_title: Format::new()
                .set_bold()
                .set_font_size(12)
                .set_font_color(BRAND_TEXT),
            banner_logo: banner
                .clone()
                .set_bold()
                .set_font_size(40)
                .set_font_color(BRAND_ORANGE)
                .set_align(FormatAlign::Left)
                .set_align(FormatAlign::VerticalCenter),
            banner_title: banner
                .clone()
                .set_bold()
                .set_font_size(20)
                .set_font_color(BRAND_WHITE)
                .set_align(FormatAlign::Left)
                .set_align(FormatAlign::VerticalCenter),
            banner_subtitle: banner
                .clone()
                .set_font_size(10)
                .set_font_color(0xCBD5E1)
                .set_align(FormatAlign::Left)
                .set_align(FormatAlign::VerticalCenter),
            banner,
            tile_caption: Format::new()
                .set_bold()
                .set_font_size(11)
                .set_font_color(BRAND_TEXT)
                .set_background_color(BRAND_GRAY)
                .set_align(FormatAlign::Left)
                .set_align(FormatAlign::VerticalCenter)
                .set_border(FormatBorder::Thin)
                .set_border_color(LIGHT_BORDER),
            tile_money: tile_value.clone().set_num_format(&money_format),
            tile_count: tile_value.clone().set_num_format("0"),
            tile_percent: tile_value.set_num_format("0.0%"),
            tile_note: Format::new()
                .set_font_size(9)
                .set_font_color(MUTED_TEXT)
                .set_background_color(BRAND_WHITE)
                .set_align(FormatAlign::Left)
                .set_align(FormatAlign::Top)
                .set_text_wrap()
                .set_border(FormatBorder::Thin)
                .set_border_color(LIGHT_BORDER),
            kpi_money: Format::new().set_num_format(&money_format),
            kpi_count: Format::new().set_num_format("0"),
            kpi_percent: Format::new().set_num_format("0.0%"),
            config_title: Format::new()
                .set_bold()
                .set_font_size(14)
                .set_font_color(BRAND_TEXT),
            config_label: Format::new().set_bold().set_font_color(BRAND_TEXT),
            config_value: Format::new().set_font_color(0x2563EB),
            status_sold: Format::new().set_background_color(0xD1FAE5),
            status_pending: Format::new().set_background_color(0xFEF3C7),
            status_cancelled: Format::new().set_background_color(0xFEE2E2),
        }
    }

    // ========================================================================
    // Dashboard
    // ========================================================================

    fn add_dashboard_sheet(
        &self,
        workbook: &mut Workbook,
        report: &Report<'_>,
        formats: &DashboardFormats,
    ) -> Result<(), RenderError> {
        let sheet = workbook.add_worksheet();
        sheet.set_name(DASHBOARD_SHEET).map_err(xlsx_err)?;
        sheet.set_screen_gridlines(false);

        for (col, width) in DASHBOARD_WIDTHS.iter().enumerate() {
            sheet.set_column_width(col as u16, *width).ok();
        }

        self.write_banner(sheet, formats)?;
        self.write_kpi_cells(sheet, report, formats)?;
        for kpi in Kpi::ALL {
            self.write_kpi_tile(sheet, kpi, report, formats)?;
        }
        self.write_trend_table(sheet, report, formats)?;
        self.write_status_breakdown(sheet, report, formats)?;
        self.write_top_clients(sheet, report, formats)?;
        self.insert_charts(sheet, report)?;

        sheet.set_freeze_panes(4, 0).ok();

        info!(sheet = DASHBOARD_SHEET, months = report.layout.months(), "sheet written");
        Ok(())
    }

    fn write_banner(&self, sheet: &mut Worksheet, formats: &DashboardFormats) -> Result<(), RenderError> {
        for row in 0..4 {
            for col in 0..DASHBOARD_WIDTHS.len() as u16 {
                sheet.write_blank(row, col, &formats.banner).map_err(xlsx_err)?;
            }
        }
        sheet
            .merge_range(1, 1, 2, 2, "F!", &formats.banner_logo)
            .map_err(xlsx_err)?;
        sheet
            .merge_range(1, 3, 1, 18, "Relatório Executivo — Fechou!", &formats.banner_title)
            .map_err(xlsx_err)?;
        sheet
            .merge_range(
                2,
                3,
                2,
                18,
                "KPIs • gráficos • ranking de clientes",
                &formats.banner_subtitle,
            )
            .map_err(xlsx_err)?;
        Ok(())
    }

    /// Hidden source cells the tiles and the status table point at
    fn write_kpi_cells(
        &self,
        sheet: &mut Worksheet,
        report: &Report<'_>,
        formats: &DashboardFormats,
    ) -> Result<(), RenderError> {
        for kpi in Kpi::ALL {
            let format = match kpi {
                Kpi::Revenue | Kpi::AverageTicket => &formats.kpi_money,
                Kpi::Conversion => &formats.kpi_percent,
                _ => &formats.kpi_count,
            };
            let formula = kpi_formula(kpi, &report.formulas);
            self.write_aggregate(sheet, kpi.row(), KPI_COLUMN, &formula, &kpi_value(kpi, &report.rollup), format)?;
        }
        sheet.set_column_hidden(KPI_COLUMN).map_err(xlsx_err)?;
        Ok(())
    }

    fn write_kpi_tile(
        &self,
        sheet: &mut Worksheet,
        kpi: Kpi,
        report: &Report<'_>,
        formats: &DashboardFormats,
    ) -> Result<(), RenderError> {
        let (top, left) = kpi.tile_origin();
        let right = left + TILE_COLS - 1;
        let value_format = match kpi {
            Kpi::Revenue | Kpi::AverageTicket => &formats.tile_money,
            Kpi::Conversion => &formats.tile_percent,
            _ => &formats.tile_count,
        };
        let note = if self.use_formulas {
            "Auto (aba Dados)."
        } else {
            "Valor fixo, calculado na geração."
        };

        sheet
            .merge_range(top, left, top, right, kpi.caption(), &formats.tile_caption)
            .map_err(xlsx_err)?;
        sheet
            .merge_range(top + 1, left, top + 3, right, "", value_format)
            .map_err(xlsx_err)?;
        self.write_aggregate(
            sheet,
            top + 1,
            left,
            &report.formulas.reference(&kpi.sheet_ref()),
            &kpi_value(kpi, &report.rollup),
            value_format,
        )?;
        sheet
            .merge_range(top + 4, left, top + 6, right, note, &formats.tile_note)
            .map_err(xlsx_err)?;

        sheet.set_row_height(top, 20).ok();
        for row in top + 1..top + 4 {
            sheet.set_row_height(row, 22).ok();
        }
        for row in top + 4..top + 7 {
            sheet.set_row_height(row, 16).ok();
        }
        Ok(())
    }

    /// Month label plus sold revenue, status counts and Pix revenue (B..G)
    fn write_trend_table(
        &self,
        sheet: &mut Worksheet,
        report: &Report<'_>,
        formats: &DashboardFormats,
    ) -> Result<(), RenderError> {
        let layout = &report.layout;
        let formulas = &report.formulas;
        let statuses = &self.config.statuses;
        let symbol = &self.config.currency_symbol;

        let title = format!("Tendência — últimos {} meses", layout.months());
        let title_row = layout.trend_title_row();
        sheet
            .merge_range(title_row, 1, title_row, 8, &title, &formats.section_title)
            .map_err(xlsx_err)?;

        let headers = [
            "Mês".to_string(),
            format!("Receita ({symbol})"),
            "Vendidas".to_string(),
            "Pendentes".to_string(),
            "Canceladas".to_string(),
            format!("{} ({symbol})", self.config.pix_channel),
        ];
        for (offset, header) in headers.iter().enumerate() {
            sheet
                .write_with_format(layout.trend_header_row(), 1 + offset as u16, header.as_str(), &formats.table_header)
                .map_err(xlsx_err)?;
        }

        let count = report.rollup.months.len() as u32;
        for (index, bucket) in report.rollup.months.iter().enumerate() {
            let index = index as u32;
            let row = layout.trend_row(index);
            let label_cell = cell_ref(row, 1);
            let back = count - 1 - index;

            self.write_aggregate(
                sheet,
                row,
                1,
                &formulas.month_label(back),
                &Cached::Text(bucket.label.clone()),
                &formats.text,
            )?;
            self.write_aggregate(
                sheet,
                row,
                2,
                &formulas.month_revenue(&label_cell),
                &Cached::Money(bucket.revenue),
                &formats.money,
            )?;
            let counts = [
                (3, &statuses.sold, bucket.sold),
                (4, &statuses.pending, bucket.pending),
                (5, &statuses.cancelled, bucket.cancelled),
            ];
            for (col, status, value) in counts {
                self.write_aggregate(
                    sheet,
                    row,
                    col,
                    &formulas.month_status_count(&label_cell, status),
                    &Cached::Count(value),
                    &formats.count,
                )?;
            }
            self.write_aggregate(
                sheet,
                row,
                6,
                &formulas.month_pix_revenue(&label_cell),
                &Cached::Money(bucket.pix_revenue),
                &formats.money,
            )?;
        }
        Ok(())
    }

    /// Sold / pending / cancelled counts feeding the doughnut chart (B..C)
    fn write_status_breakdown(
        &self,
        sheet: &mut Worksheet,
        report: &Report<'_>,
        formats: &DashboardFormats,
    ) -> Result<(), RenderError> {
        let layout = &report.layout;
        let title_row = layout.status_title_row();
        sheet
            .merge_range(title_row, 1, title_row, 7, "Distribuição geral", &formats.section_title)
            .map_err(xlsx_err)?;

        let header_row = layout.status_header_row();
        sheet
            .write_with_format(header_row, 1, "Status", &formats.table_header)
            .map_err(xlsx_err)?;
        sheet
            .write_with_format(header_row, 2, "Qtd", &formats.table_header)
            .map_err(xlsx_err)?;

        let lines = [
            ("Vendida", Kpi::Sold),
            ("Pendente", Kpi::Pending),
            ("Cancelada", Kpi::Cancelled),
        ];
        for (row, (label, kpi)) in layout.status_rows().into_iter().zip(lines) {
            sheet
                .write_with_format(row, 1, label, &formats.text)
                .map_err(xlsx_err)?;
            self.write_aggregate(
                sheet,
                row,
                2,
                &report.formulas.reference(&kpi.sheet_ref()),
                &kpi_value(kpi, &report.rollup),
                &formats.count,
            )?;
        }
        Ok(())
    }

    /// Ranked client names with live revenue and sale counts (I..K)
    fn write_top_clients(
        &self,
        sheet: &mut Worksheet,
        report: &Report<'_>,
        formats: &DashboardFormats,
    ) -> Result<(), RenderError> {
        let layout = &report.layout;
        let formulas = &report.formulas;
        let sold = &self.config.statuses.sold;

        let title_row = layout.top_title_row();
        let title = format!("Top {} clientes por receita", layout.top_slots());
        sheet
            .merge_range(title_row, 8, title_row, 15, &title, &formats.section_title)
            .map_err(xlsx_err)?;

        let headers = [
            "Cliente".to_string(),
            format!("Receita ({})", self.config.currency_symbol),
            "Vendas".to_string(),
        ];
        for (offset, header) in headers.iter().enumerate() {
            sheet
                .write_with_format(layout.top_header_row(), 8 + offset as u16, header.as_str(), &formats.table_header)
                .map_err(xlsx_err)?;
        }

        for slot in 0..layout.top_slots() {
            let row = layout.top_row(slot);
            let Some(client) = report.rollup.top_clients.get(slot as usize) else {
                for col in 8..11 {
                    sheet.write_blank(row, col, &formats.text).map_err(xlsx_err)?;
                }
                continue;
            };

            let name_cell = format!("$I{}", row + 1);
            sheet
                .write_with_format(row, 8, client.name.as_str(), &formats.text)
                .map_err(xlsx_err)?;
            self.write_aggregate(
                sheet,
                row,
                9,
                &formulas.client_revenue(&name_cell),
                &Cached::Money(client.revenue),
                &formats.money,
            )?;
            self.write_aggregate(
                sheet,
                row,
                10,
                &formulas.client_status_count(&name_cell, sold),
                &Cached::Count(client.sold),
                &formats.count,
            )?;
        }
        Ok(())
    }

    fn insert_charts(&self, sheet: &mut Worksheet, report: &Report<'_>) -> Result<(), RenderError> {
        let layout = &report.layout;
        let first = layout.trend_row(0);
        let last = layout.trend_last_row();
        let header = layout.trend_header_row();
        let categories: (&str, u32, u16, u32, u16) = (DASHBOARD_SHEET, first, 1, last, 1);

        let mut line = Chart::new(ChartType::Line);
        line.title().set_name("Receita por mês (vendidas)");
        line.add_series()
            .set_categories(categories)
            .set_values((DASHBOARD_SHEET, first, 2u16, last, 2u16))
            .set_name((DASHBOARD_SHEET, header, 2u16));
        line.x_axis().set_name("Mês");
        line.y_axis().set_name(self.config.currency_symbol.as_str());
        line.set_width(TREND_CHART_SIZE.0).set_height(TREND_CHART_SIZE.1);
        let (row, col) = layout.line_chart_anchor();
        sheet.insert_chart(row, col, &line).map_err(xlsx_err)?;

        let mut columns = Chart::new(ChartType::Column);
        columns.title().set_name("Volume por status (qtd)");
        for col in 3u16..=5 {
            columns
                .add_series()
                .set_categories(categories)
                .set_values((DASHBOARD_SHEET, first, col, last, col))
                .set_name((DASHBOARD_SHEET, header, col));
        }
        columns.x_axis().set_name("Mês");
        columns.y_axis().set_name("Qtd");
        columns.set_width(TREND_CHART_SIZE.0).set_height(TREND_CHART_SIZE.1);
        let (row, col) = layout.column_chart_anchor();
        sheet.insert_chart(row, col, &columns).map_err(xlsx_err)?;

        let [first_status, _, last_status] = layout.status_rows();
        let mut percentages = ChartDataLabel::new();
        percentages.show_percentage();

        let mut doughnut = Chart::new(ChartType::Doughnut);
        doughnut.title().set_name("Status (geral)");
        doughnut
            .add_series()
            .set_categories((DASHBOARD_SHEET, first_status, 1u16, last_status, 1u16))
            .set_values((DASHBOARD_SHEET, first_status, 2u16, last_status, 2u16))
            .set_name((DASHBOARD_SHEET, layout.status_header_row(), 2u16))
            .set_data_label(&percentages);
        doughnut.set_width(DOUGHNUT_SIZE.0).set_height(DOUGHNUT_SIZE.1);
        let (row, col) = layout.doughnut_anchor();
        sheet.insert_chart(row, col, &doughnut).map_err(xlsx_err)?;

        Ok(())
    }

    // ========================================================================
    // Dados
    // ========================================================================

    fn add_data_sheet(
        &self,
        workbook: &mut Workbook,
        report: &Report<'_>,
        formats: &DashboardFormats,
    ) -> Result<(), RenderError> {
        let sheet = workbook.add_worksheet();
        sheet.set_name(DATA_SHEET).map_err(xlsx_err)?;
        sheet.set_screen_gridlines(false);

        for column in DataColumn::ALL {
            sheet
                .write_with_format(0, column.index(), column.header(&self.config.currency_symbol), &formats.header)
                .map_err(xlsx_err)?;
            sheet.set_column_width(column.index(), column.width()).ok();
        }

        for (offset, data) in report.rows.iter().enumerate() {
            let row = offset as u32 + 1;
            write_date(sheet, row, DataColumn::Date.index(), data.date, &formats.date)?;
            let texts = [
                (DataColumn::Client, data.client_name.as_str()),
                (DataColumn::Title, data.title.as_str()),
                (DataColumn::Status, data.status.as_str()),
                (DataColumn::Channel, data.channel.as_str()),
                (DataColumn::Paid, data.paid_label()),
                (DataColumn::Seller, data.seller.as_str()),
                (DataColumn::Category, data.category.as_str()),
                (DataColumn::Region, data.region.as_str()),
            ];
            for (column, text) in texts {
                sheet
                    .write_string_with_format(row, column.index(), text, &formats.text)
                    .map_err(xlsx_err)?;
            }
            sheet
                .write_number_with_format(row, DataColumn::Value.index(), decimal_to_f64(data.value), &formats.money)
                .map_err(xlsx_err)?;
        }

        if !report.rows.is_empty() {
            self.add_status_highlights(sheet, report.formulas.table(), formats)?;
        }

        sheet.set_freeze_panes(1, 0).ok();

        info!(sheet = DATA_SHEET, rows = report.rows.len(), "sheet written");
        Ok(())
    }

    /// Status column fills, one rule per status literal
    fn add_status_highlights(
        &self,
        sheet: &mut Worksheet,
        table: DataTable,
        formats: &DashboardFormats,
    ) -> Result<(), RenderError> {
        let statuses = &self.config.statuses;
        let col = DataColumn::Status.index();
        let first = DataTable::FIRST_ROW - 1;
        let last = table.last_row() - 1;

        let rules = [
            (&statuses.sold, &formats.status_sold),
            (&statuses.pending, &formats.status_pending),
            (&statuses.cancelled, &formats.status_cancelled),
        ];
        for (status, format) in rules {
            let rule = format!(
                "=${}{}={}",
                DataColumn::Status.letter(),
                DataTable::FIRST_ROW,
                quoted(status)
            );
            let highlight = ConditionalFormatFormula::new()
                .set_rule(rule.as_str())
                .set_format(format.clone());
            sheet
                .add_conditional_format(first, col, last, col, &highlight)
                .map_err(xlsx_err)?;
        }
        Ok(())
    }

    // ========================================================================
    // Clientes
    // ========================================================================

    fn add_clients_sheet(
        &self,
        workbook: &mut Workbook,
        report: &Report<'_>,
        formats: &DashboardFormats,
    ) -> Result<(), RenderError> {
        let formulas = &report.formulas;
        let statuses = &self.config.statuses;
        let symbol = &self.config.currency_symbol;

        let sheet = workbook.add_worksheet();
        sheet.set_name(CLIENTS_SHEET).map_err(xlsx_err)?;
        sheet.set_screen_gridlines(false);

        sheet
            .merge_range(0, 0, 0, 6, "Clientes — Ranking e Métricas", &formats.sheet_title)
            .map_err(xlsx_err)?;
        sheet
            .merge_range(
                1,
                0,
                1,
                6,
                "Baseado na aba Dados. Ideal para priorizar follow-up e ver receita por cliente.",
                &formats.subtitle,
            )
            .map_err(xlsx_err)?;

        let headers = [
            "Cliente".to_string(),
            format!("Receita ({symbol})"),
            "Vendas".to_string(),
            "Pendentes".to_string(),
            "Canceladas".to_string(),
            format!("Ticket Médio ({symbol})"),
            "Última Venda".to_string(),
        ];
        for (col, header) in headers.iter().enumerate() {
            sheet
                .write_with_format(FIRST_CLIENT_ROW - 1, col as u16, header.as_str(), &formats.header)
                .map_err(xlsx_err)?;
        }

        for (offset, client) in report.rollup.clients.iter().enumerate() {
            let row = FIRST_CLIENT_ROW + offset as u32;
            let r = row + 1;
            let name_cell = format!("$A{r}");
            let sold_cell = format!("$C{r}");

            sheet
                .write_with_format(row, 0, client.name.as_str(), &formats.text)
                .map_err(xlsx_err)?;
            self.write_aggregate(
                sheet,
                row,
                1,
                &formulas.client_revenue(&name_cell),
                &Cached::Money(client.revenue),
                &formats.money,
            )?;
            let counts = [
                (2, &statuses.sold, client.sold),
                (3, &statuses.pending, client.pending),
                (4, &statuses.cancelled, client.cancelled),
            ];
            for (col, status, value) in counts {
                self.write_aggregate(
                    sheet,
                    row,
                    col,
                    &formulas.client_status_count(&name_cell, status),
                    &Cached::Count(value),
                    &formats.count,
                )?;
            }
            self.write_aggregate(
                sheet,
                row,
                5,
                &formulas.ratio(&format!("$B{r}"), &sold_cell),
                &Cached::Money(client.average_ticket),
                &formats.money,
            )?;
            self.write_aggregate(
                sheet,
                row,
                6,
                &formulas.client_last_sale(&name_cell, &sold_cell),
                &Cached::Date(client.last_sale),
                &formats.date,
            )?;
        }

        self.write_client_totals(sheet, report, formats)?;

        for (col, width) in CLIENT_WIDTHS.iter().enumerate() {
            sheet.set_column_width(col as u16, *width).ok();
        }
        sheet.set_freeze_panes(FIRST_CLIENT_ROW, 0).ok();

        info!(sheet = CLIENTS_SHEET, clients = report.rollup.clients.len(), "sheet written");
        Ok(())
    }

    /// TOTAL row; literal zeros when there are no clients
    fn write_client_totals(
        &self,
        sheet: &mut Worksheet,
        report: &Report<'_>,
        formats: &DashboardFormats,
    ) -> Result<(), RenderError> {
        let formulas = &report.formulas;
        let totals = report.rollup.client_totals();
        let row = FIRST_CLIENT_ROW + report.rollup.clients.len() as u32;
        let r = row + 1;

        sheet
            .write_with_format(row, 0, "TOTAL", &formats.total_text)
            .map_err(xlsx_err)?;

        let sums = [
            (1, Cached::Money(totals.revenue), &formats.total_money),
            (2, Cached::Count(totals.sold), &formats.total_count),
            (3, Cached::Count(totals.pending), &formats.total_count),
            (4, Cached::Count(totals.cancelled), &formats.total_count),
        ];
        for (col, value, format) in sums {
            match formulas.column_sum(col, FIRST_CLIENT_ROW + 1, r - 1) {
                Some(formula) => self.write_aggregate(sheet, row, col, &formula, &value, format)?,
                None => write_value(sheet, row, col, &value, format)?,
            }
        }

        self.write_aggregate(
            sheet,
            row,
            5,
            &formulas.ratio(&format!("B{r}"), &format!("C{r}")),
            &Cached::Money(totals.average_ticket),
            &formats.total_money,
        )?;
        sheet.write_blank(row, 6, &formats.total_text).map_err(xlsx_err)?;
        Ok(())
    }

    // ========================================================================
    // Config
    // ========================================================================

    fn add_config_sheet(
        &self,
        workbook: &mut Workbook,
        report: &Report<'_>,
        formats: &DashboardFormats,
    ) -> Result<(), RenderError> {
        let sheet = workbook.add_worksheet();
        sheet.set_name(CONFIG_SHEET).map_err(xlsx_err)?;
        sheet.set_screen_gridlines(false);

        sheet
            .merge_range(0, 0, 0, 3, "Configurações — Fechou!", &formats.config_title)
            .map_err(xlsx_err)?;

        sheet
            .write_with_format(2, 0, "Moeda", &formats.config_label)
            .map_err(xlsx_err)?;
        sheet
            .write_with_format(2, 1, self.config.currency.as_str(), &formats.config_value)
            .map_err(xlsx_err)?;
        sheet
            .write_with_format(3, 0, "Período (meses)", &formats.config_label)
            .map_err(xlsx_err)?;
        sheet
            .write_with_format(3, 1, self.config.period_months, &formats.config_value)
            .map_err(xlsx_err)?;
        sheet
            .write_with_format(4, 0, "Ano base", &formats.config_label)
            .map_err(xlsx_err)?;
        sheet
            .write_with_format(4, 1, report.today.year(), &formats.config_value)
            .map_err(xlsx_err)?;

        sheet.set_column_width(0, 22).ok();
        sheet.set_column_width(1, 14).ok();

        info!(sheet = CONFIG_SHEET, "sheet written");
        Ok(())
    }

    // ========================================================================
    // Cell helpers
    // ========================================================================

    /// Write a formula with its cached result, or just the value in static mode
    fn write_aggregate(
        &self,
        sheet: &mut Worksheet,
        row: u32,
        col: u16,
        formula: &str,
        value: &Cached,
        format: &Format,
    ) -> Result<(), RenderError> {
        if self.use_formulas {
            let formula = Formula::new(formula).set_result(value.result());
            sheet
                .write_formula_with_format(row, col, formula, format)
                .map_err(xlsx_err)?;
            Ok(())
        } else {
            write_value(sheet, row, col, value, format)
        }
    }
}

impl Renderer for DashboardRenderer {
    type Output = Vec<u8>;

    fn render(&self, rows: &[DerivedRow]) -> Result<Vec<u8>, RenderError> {
        self.render_to_bytes(rows)
    }
}

/// Everything the sheet writers read
struct Report<'a> {
    rows: &'a [DerivedRow],
    rollup: Rollup,
    formulas: FormulaBuilder<'a>,
    layout: Layout,
    today: NaiveDate,
}

/// Precomputed value of an aggregate cell
#[derive(Clone, Debug, PartialEq)]
enum Cached {
    Money(Decimal),
    Count(usize),
    Ratio(f64),
    Date(Option<NaiveDate>),
    Text(String),
}

impl Cached {
    /// Text stored as the formula's cached result
    fn result(&self) -> String {
        match self {
            Cached::Money(value) => value.normalize().to_string(),
            Cached::Count(count) => count.to_string(),
            Cached::Ratio(ratio) => ratio.to_string(),
            Cached::Date(Some(date)) => excel_serial(*date).map(|serial| serial.to_string()).unwrap_or_default(),
            Cached::Date(None) => String::new(),
            Cached::Text(text) => text.clone(),
        }
    }
}

fn kpi_formula(kpi: Kpi, formulas: &FormulaBuilder<'_>) -> String {
    let statuses = formulas.statuses();
    match kpi {
        Kpi::Revenue => formulas.total_revenue(),
        Kpi::Sold => formulas.status_count(&statuses.sold),
        Kpi::Pending => formulas.status_count(&statuses.pending),
        Kpi::Cancelled => formulas.status_count(&statuses.cancelled),
        Kpi::AverageTicket => formulas.ratio(&Kpi::Revenue.local_ref(), &Kpi::Sold.local_ref()),
        Kpi::Conversion => formulas.conversion_rate(
            &Kpi::Sold.local_ref(),
            &Kpi::Pending.local_ref(),
            &Kpi::Cancelled.local_ref(),
        ),
    }
}

fn kpi_value(kpi: Kpi, rollup: &Rollup) -> Cached {
    let kpis = &rollup.kpis;
    match kpi {
        Kpi::Revenue => Cached::Money(kpis.total_revenue),
        Kpi::Sold => Cached::Count(kpis.sold),
        Kpi::Pending => Cached::Count(kpis.pending),
        Kpi::Cancelled => Cached::Count(kpis.cancelled),
        Kpi::AverageTicket => Cached::Money(kpis.average_ticket),
        Kpi::Conversion => Cached::Ratio(kpis.conversion_rate),
    }
}

fn write_value(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: &Cached,
    format: &Format,
) -> Result<(), RenderError> {
    let written = match value {
        Cached::Money(amount) => sheet.write_number_with_format(row, col, decimal_to_f64(*amount), format),
        Cached::Count(count) => sheet.write_number_with_format(row, col, *count as f64, format),
        Cached::Ratio(ratio) => sheet.write_number_with_format(row, col, *ratio, format),
        Cached::Date(Some(date)) => return write_date(sheet, row, col, *date, format),
        Cached::Date(None) => sheet.write_blank(row, col, format),
        Cached::Text(text) => sheet.write_string_with_format(row, col, text.as_str(), format),
    };
    written.map_err(xlsx_err)?;
    Ok(())
}

/// Real Excel date when representable, a blank cell otherwise.
///
/// Text would turn every `TEXT(date,"yyyy-mm")` over the column into #VALUE!.
fn write_date(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    date: NaiveDate,
    format: &Format,
) -> Result<(), RenderError> {
    let written = match excel_date(date) {
        Some(datetime) => sheet.write_datetime_with_format(row, col, &datetime, format),
        None => {
            debug!(%date, "date outside the Excel range, leaving the cell blank");
            sheet.write_blank(row, col, format)
        }
    };
    written.map_err(xlsx_err)?;
    Ok(())
}

/// Excel stores dates from 1900-01-01 to 9999-12-31
fn excel_date(date: NaiveDate) -> Option<ExcelDateTime> {
    let year = u16::try_from(date.year()).ok()?;
    ExcelDateTime::from_ymd(year, date.month() as u8, date.day() as u8).ok()
}

/// Excel serial of `date`; `None` outside the Excel range.
///
/// Serials count from 1899-12-30 after February 1900 and are one lower
/// before it, where Excel's phantom 1900-02-29 has not been counted yet.
fn excel_serial(date: NaiveDate) -> Option<i32> {
    excel_date(date)?;
    let serial = date.num_days_from_ce() - 693_594;
    if (date.year(), date.month()) < (1900, 3) {
        Some(serial - 1)
    } else {
        Some(serial)
    }
}

fn decimal_to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

fn xlsx_err(e: XlsxError) -> RenderError {
    RenderError::Format(e.to_string())
}

/// Reusable cell formats
struct DashboardFormats {
    text: Format,
    date: Format,
    money: Format,
    count: Format,
    total_text: Format,
    total_money: Format,
    total_count: Format,
    header: Format,
    table_header: Format,
    sheet_title: Format,
    subtitle: Format,
    section_title: Format,
    banner: Format,
    banner_logo: Format,
    banner_title: Format,
    banner_subtitle: Format,
    tile_caption: Format,
    tile_money: Format,
    tile_count: Format,
    tile_percent: Format,
    tile_note: Format,
    kpi_money: Format,
    kpi_count: Format,
    kpi_percent: Format,
    config_title: Format,
    config_label: Format,
    config_value: Format,
    status_sold: Format,
    status_pending: Format,
    status_cancelled: Format,
}
