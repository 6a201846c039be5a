use crossterm::event::KeyCode;
use ratatui::{
    layout::{Constraint, Layout},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Bar, BarChart, BarGroup, Block, Borders, Cell, Paragraph, Row, Table},
    Frame,
};

use crate::error::Result;
use crate::fmt::{money, percent};
use crate::metrics::{self, CategoryShare, MonthTotals, YearMonth};
use crate::models::{Transaction, TxnType};
use crate::tui::{
    self, money_span, ReportView, ReportViewAction, AMOUNT_NEG_STYLE, AMOUNT_POS_STYLE,
    FOOTER_STYLE, HEADER_STYLE,
};

const SERIES_MONTHS: usize = 6;
const BAR_WIDTH: usize = 24;

/// Month-by-month analytics: category breakdown and a six-month trend.
pub struct AnalyticsView {
    transactions: Vec<Transaction>,
    month: YearMonth,
    kind: TxnType,
    totals: MonthTotals,
    breakdown: Vec<CategoryShare>,
    series: Vec<MonthTotals>,
}

impl AnalyticsView {
    pub fn new(transactions: Vec<Transaction>, month: YearMonth) -> Self {
        let mut view = Self {
            totals: metrics::month_totals(&[], month),
            transactions,
            month,
            kind: TxnType::Expense,
            breakdown: Vec::new(),
            series: Vec::new(),
        };
        view.recompute();
        view
    }

    pub fn month(&self) -> YearMonth {
        self.month
    }

    fn recompute(&mut self) {
        self.totals = metrics::month_totals(&self.transactions, self.month);
        self.breakdown = metrics::category_breakdown(&self.transactions, self.month, self.kind);
        self.series = metrics::monthly_series(&self.transactions, self.month, SERIES_MONTHS);
    }

    fn draw_breakdown(&self, frame: &mut Frame, area: ratatui::layout::Rect) {
        let title = match self.kind {
            TxnType::Income => " Income by category",
            _ => " Spending by category",
        };
        let bar_style = if self.kind == TxnType::Income {
            AMOUNT_POS_STYLE
        } else {
            AMOUNT_NEG_STYLE
        };
        let max = self
            .breakdown
            .iter()
            .map(|c| c.total)
            .fold(0.0_f64, f64::max);

        let rows: Vec<Row> = self
            .breakdown
            .iter()
            .map(|c| {
                Row::new(vec![
                    Cell::from(c.name.clone()),
                    Cell::from(Line::from(money(c.total)).right_aligned()),
                    Cell::from(Line::from(percent(c.pct)).right_aligned()),
                    Cell::from(c.count.to_string()),
                    Cell::from(Span::styled(share_bar(c.total, max, BAR_WIDTH), bar_style)),
                ])
            })
            .collect();

        let table = Table::new(
            rows,
            [
                Constraint::Length(22),
                Constraint::Length(14),
                Constraint::Length(7),
                Constraint::Length(4),
                Constraint::Fill(1),
            ],
        )
        .header(
            Row::new(vec!["Category", "Total", "Share", "#", ""])
                .style(HEADER_STYLE)
                .bottom_margin(1),
        )
        .column_spacing(1)
        .block(
            Block::default()
                .title(title)
                .title_style(Style::default().add_modifier(Modifier::BOLD))
                .borders(Borders::NONE),
        );
        frame.render_widget(table, area);

        if self.breakdown.is_empty() {
            frame.render_widget(
                Paragraph::new("\n\n   Nothing recorded this month.").style(FOOTER_STYLE),
                area,
            );
        }
    }

    fn draw_trend(&self, frame: &mut Frame, area: ratatui::layout::Rect) {
        let groups: Vec<BarGroup> = self
            .series
            .iter()
            .map(|m| {
                let bars = vec![
                    Bar::default().value(m.income.max(0.0) as u64).style(AMOUNT_POS_STYLE),
                    Bar::default().value(m.expense.max(0.0) as u64).style(AMOUNT_NEG_STYLE),
                ];
                BarGroup::default()
                    .label(Line::from(m.month.short_label()))
                    .bars(&bars)
            })
            .collect();

        let mut chart = BarChart::default()
            .block(
                Block::default()
                    .title(" Last six months")
                    .title_style(Style::default().add_modifier(Modifier::BOLD))
                    .borders(Borders::NONE),
            )
            .bar_width(3)
            .bar_gap(0)
            .group_gap(2);
        for group in &groups {
            chart = chart.data(group.clone());
        }
        frame.render_widget(chart, area);
    }
}

/// A text bar proportional to `value / max`.
pub fn share_bar(value: f64, max: f64, width: usize) -> String {
    if max <= 0.0 || value <= 0.0 {
        return String::new();
    }
    let filled = ((value / max) * width as f64).round().max(1.0) as usize;
    "\u{2588}".repeat(filled.min(width))
}

impl ReportView for AnalyticsView {
    fn draw(&mut self, frame: &mut Frame) {
        let [title_area, summary_area, body_area, keys_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Fill(1),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        frame.render_widget(
            Paragraph::new(format!(" Analytics \u{00b7} {}", self.month.label())).style(HEADER_STYLE),
            title_area,
        );

        let net = self.totals.net();
        let summary = vec![
            Line::from(""),
            Line::from(vec![
                Span::raw(" Income "),
                money_span(self.totals.income),
                Span::raw("   Expenses "),
                money_span(-self.totals.expense),
                Span::raw("   Net "),
                money_span(net),
                Span::raw(format!(
                    "   Savings rate {}",
                    percent(metrics::savings_rate(self.totals.income, self.totals.expense))
                )),
            ]),
        ];
        frame.render_widget(Paragraph::new(summary), summary_area);

        let [left, right] =
            Layout::horizontal([Constraint::Percentage(55), Constraint::Percentage(45)])
                .areas(body_area);
        self.draw_breakdown(frame, left);
        self.draw_trend(frame, right);

        frame.render_widget(
            Paragraph::new(" \u{2190}/\u{2192}:month  t:income/expense  q:back").style(FOOTER_STYLE),
            keys_area,
        );
    }

    fn handle_key(&mut self, code: KeyCode) -> ReportViewAction {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return ReportViewAction::Close,
            KeyCode::Left | KeyCode::Char('h') => {
                self.month = self.month.prev();
                self.recompute();
            }
            KeyCode::Right | KeyCode::Char('l') => {
                self.month = self.month.next();
                self.recompute();
            }
            KeyCode::Char('t') => {
                self.kind = if self.kind == TxnType::Expense {
                    TxnType::Income
                } else {
                    TxnType::Expense
                };
                self.recompute();
            }
            _ => {}
        }
        ReportViewAction::Continue
    }
}

/// `sheetledger analytics [--month]`: open the analytics view on its own.
pub fn run(month: Option<String>) -> Result<()> {
    let month = match month {
        Some(m) => m.parse()?,
        None => YearMonth::current(),
    };
    let (_conn, state, _settings) = super::open_state()?;
    let mut view = AnalyticsView::new(state.transactions, month);
    tui::run_report_view(&mut view)
}
