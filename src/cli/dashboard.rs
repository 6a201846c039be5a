use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use rand::seq::SliceRandom;
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Bar, BarChart, BarGroup, Block, Borders, Paragraph},
    Frame,
};
use rusqlite::Connection;

use crate::browser::{BrowseAction, TransactionBrowser};
use crate::error::{AppError, Result};
use crate::fmt::{compact, number, percent};
use crate::form::{FormAction, TransactionForm};
use crate::metrics::{monthly_series, DashboardMetrics, MonthTotals, YearMonth};
use crate::models::AccountBalance;
use crate::settings::Settings;
use crate::sheets::SheetsApi;
use crate::store::{AppState, Outcome};
use crate::tui::{money_span, ReportView, ReportViewAction, FOOTER_STYLE, HEADER_STYLE, WARN_STYLE};

use super::analytics::AnalyticsView;
use super::{open_state, sync, try_connect};

const GREETINGS: &[&str] = &[
    "Let's see where the money went.",
    "Receipts at the ready?",
    "The spreadsheet sends its regards.",
    "Every dollar accounted for. Nearly.",
    "Back again? Good.",
    "Pull up a chair.",
    "Right then, where were we?",
    "Another day, another coffee on the card.",
    "Numbers don't lie. They do hide, though.",
    "Shall we tidy the ledger?",
];

const MENU_ITEMS: &[&str] = &[
    "Browse transactions",
    "Add a transaction",
    "Analytics",
    "Sync with Google Sheets",
    "Quit",
];

const MENU_SYNC: usize = 3;
const CHART_MONTHS: usize = 6;

enum DashboardScreen {
    Home,
    Browse(TransactionBrowser),
    Analytics(AnalyticsView),
}

struct HomeData {
    revision: u64,
    metrics: DashboardMetrics,
    balances: Vec<AccountBalance>,
    series: Vec<MonthTotals>,
}

struct Dashboard {
    screen: DashboardScreen,
    greeting: String,
    menu_selection: usize,
    state: AppState,
    conn: Connection,
    settings: Settings,
    api: Option<Box<dyn SheetsApi>>,
    home_data: Option<HomeData>,
    status_message: Option<String>,
}

fn api_mut(api: &mut Option<Box<dyn SheetsApi>>) -> Option<&mut dyn SheetsApi> {
    match api {
        Some(a) => Some(a.as_mut()),
        None => None,
    }
}

fn greeting_for(user_name: &str, line: &str) -> String {
    match user_name.split_whitespace().next() {
        Some(first) => format!("Hello, {first}. {line}"),
        None => format!("sheetledger: {line}"),
    }
}

fn outcome_message(verb: &str, outcome: &Outcome) -> String {
    match &outcome.warning {
        Some(w) => format!("{verb} {}. {w}", outcome.id),
        None if outcome.synced => format!("{verb} {} and saved to the sheet.", outcome.id),
        None => format!("{verb} {} locally (offline).", outcome.id),
    }
}

impl Dashboard {
    fn new(
        conn: Connection,
        state: AppState,
        settings: Settings,
        api: Option<Box<dyn SheetsApi>>,
    ) -> Self {
        let mut rng = rand::thread_rng();
        let line = GREETINGS.choose(&mut rng).unwrap_or(&"Hello.");
        let greeting = greeting_for(&settings.user_name, line);
        let mut dashboard = Self {
            screen: DashboardScreen::Home,
            greeting,
            menu_selection: 0,
            state,
            conn,
            settings,
            api,
            home_data: None,
            status_message: None,
        };
        dashboard.state.connected = dashboard.api.is_some();
        dashboard
    }

    fn refresh_home(&mut self) {
        let revision = self.state.revision();
        if matches!(&self.home_data, Some(d) if d.revision == revision) {
            return;
        }
        let month = YearMonth::current();
        let metrics = self.state.metrics(month).clone();
        self.home_data = Some(HomeData {
            revision,
            metrics,
            balances: self.state.projected_balances(),
            series: monthly_series(&self.state.transactions, month, CHART_MONTHS),
        });
    }

    fn browser_rows(&self) -> Vec<crate::models::Transaction> {
        self.state.filtered().into_iter().cloned().collect()
    }

    fn reload_browser(&mut self) {
        let rows = self.browser_rows();
        let filter = self.state.filter.clone();
        if let DashboardScreen::Browse(browser) = &mut self.screen {
            browser.reload(rows, filter);
        }
    }

    /// Route a message to the browser status line when it is showing.
    fn notify(&mut self, msg: String) {
        match &mut self.screen {
            DashboardScreen::Browse(browser) => browser.set_status(msg),
            _ => self.status_message = Some(msg),
        }
    }

    fn draw(&mut self, frame: &mut Frame) {
        match self.screen {
            DashboardScreen::Browse(ref mut browser) => browser.draw_frame(frame),
            DashboardScreen::Analytics(ref mut view) => view.draw(frame),
            DashboardScreen::Home => {
                self.refresh_home();
                self.draw_home(frame);
            }
        }
        if let Some(form) = &self.state.form {
            form.draw(frame);
        }
    }

    fn draw_home(&self, frame: &mut Frame) {
        let area = frame.area();
        let border_style = Style::default().fg(Color::DarkGray);

        let [header_area, sep1, stats_area, sep2, charts_area, sep3, menu_area, hints_area] =
            Layout::vertical([
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(6),
                Constraint::Length(1),
                Constraint::Fill(1),
                Constraint::Length(1),
                Constraint::Length(MENU_ITEMS.len() as u16 + 1),
                Constraint::Length(1),
            ])
            .areas(area);

        let link = if self.state.connected {
            Span::styled("  ● online", Style::default().fg(Color::Green))
        } else {
            Span::styled("  ○ offline", FOOTER_STYLE)
        };
        frame.render_widget(
            Paragraph::new(Line::from(vec![
                Span::styled(format!(" {}", self.greeting), HEADER_STYLE),
                link,
            ])),
            header_area,
        );

        let sep_line = "━".repeat(area.width as usize);
        let sep_widget = Paragraph::new(sep_line.as_str()).style(border_style);
        frame.render_widget(sep_widget.clone(), sep1);
        frame.render_widget(sep_widget.clone(), sep2);
        frame.render_widget(sep_widget, sep3);

        if let Some(data) = &self.home_data {
            let [left_area, right_area] =
                Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)])
                    .areas(stats_area);
            frame.render_widget(Paragraph::new(stats_lines(&data.metrics)), left_area);

            let mut balance_lines = vec![Line::from(Span::styled(
                " Account Balances",
                Style::default().add_modifier(Modifier::BOLD),
            ))];
            for b in &data.balances {
                balance_lines.push(Line::from(vec![
                    Span::raw(format!(" {:<20}", b.name)),
                    money_span(b.balance),
                ]));
            }
            frame.render_widget(Paragraph::new(balance_lines), right_area);

            let [chart_left, chart_right] =
                Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)])
                    .areas(charts_area);
            draw_cash_flow(frame, chart_left, &data.series);

            if !data.metrics.top_categories.is_empty() {
                let name_width = data
                    .metrics
                    .top_categories
                    .iter()
                    .map(|c| c.name.len())
                    .max()
                    .unwrap_or(10);
                let mut lines = vec![Line::from(Span::styled(
                    " Top Spending",
                    Style::default().add_modifier(Modifier::BOLD),
                ))];
                for c in &data.metrics.top_categories {
                    lines.push(Line::from(vec![
                        Span::raw(format!(" {:<width$}  ", c.name, width = name_width)),
                        money_span(-c.total),
                        Span::styled(format!("  {}", percent(c.pct)), FOOTER_STYLE),
                    ]));
                }
                frame.render_widget(Paragraph::new(lines), chart_right);
            }
        }

        let [menu_title_area, menu_list_area] =
            Layout::vertical([Constraint::Length(1), Constraint::Fill(1)]).areas(menu_area);
        frame.render_widget(
            Paragraph::new(Span::styled(
                " What would you like to do?",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            menu_title_area,
        );
        let unsynced = self.state.unsynced_count();
        let lines: Vec<Line> = (0..MENU_ITEMS.len())
            .map(|i| self.menu_item_line(i, unsynced))
            .collect();
        frame.render_widget(Paragraph::new(lines), menu_list_area);

        if let Some(msg) = &self.status_message {
            frame.render_widget(Paragraph::new(format!(" {msg}")).style(WARN_STYLE), hints_area);
        } else {
            frame.render_widget(
                Paragraph::new(" Up/Down=navigate  Enter=select  r=refresh  q=quit")
                    .style(FOOTER_STYLE),
                hints_area,
            );
        }
    }

    fn menu_item_line(&self, i: usize, unsynced: usize) -> Line<'static> {
        let marker = if i == self.menu_selection { ">" } else { " " };
        let item = MENU_ITEMS[i];
        let label = if i == MENU_SYNC && unsynced > 0 {
            format!(" {marker} {item} ({unsynced} pending)")
        } else {
            format!(" {marker} {item}")
        };
        let style = if i == self.menu_selection {
            Style::default().add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        Line::from(Span::styled(label, style))
    }

    /// Returns true when the dashboard should exit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        if self.state.form.is_some() {
            self.handle_form_key(code);
            return false;
        }
        let mut return_home = false;
        let quit = match &mut self.screen {
            DashboardScreen::Home => return self.handle_home_key(code),
            DashboardScreen::Browse(browser) => {
                let action = browser.handle_key_event(code);
                self.handle_browse_action(action);
                false
            }
            DashboardScreen::Analytics(view) => {
                if let ReportViewAction::Close = view.handle_key(code) {
                    return_home = true;
                }
                false
            }
        };
        if return_home {
            self.screen = DashboardScreen::Home;
        }
        quit
    }

    fn handle_home_key(&mut self, code: KeyCode) -> bool {
        self.status_message = None;
        match code {
            KeyCode::Up => self.menu_selection = self.menu_selection.saturating_sub(1),
            KeyCode::Down => {
                self.menu_selection = (self.menu_selection + 1).min(MENU_ITEMS.len() - 1);
            }
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Char('r') => self.refresh(),
            KeyCode::Char('n') => self.open_new_form(),
            KeyCode::Enter => match self.menu_selection {
                0 => self.enter_browse(),
                1 => self.open_new_form(),
                2 => {
                    let view =
                        AnalyticsView::new(self.state.transactions.clone(), YearMonth::current());
                    self.screen = DashboardScreen::Analytics(view);
                }
                3 => self.sync(),
                _ => return true,
            },
            _ => {}
        }
        false
    }

    fn enter_browse(&mut self) {
        let browser = TransactionBrowser::new(
            self.browser_rows(),
            self.state.filter.clone(),
            self.state.master.accounts.clone(),
        );
        self.screen = DashboardScreen::Browse(browser);
    }

    fn open_new_form(&mut self) {
        let today = chrono::Local::now().date_naive();
        self.state.form = Some(TransactionForm::new_entry(&self.state.master, today));
    }

    fn handle_browse_action(&mut self, action: BrowseAction) {
        match action {
            BrowseAction::Continue => {}
            BrowseAction::Close => self.screen = DashboardScreen::Home,
            BrowseAction::Add => self.open_new_form(),
            BrowseAction::Edit(id) => {
                if let Some(txn) = self.state.find(&id) {
                    self.state.form = Some(TransactionForm::edit(txn, &self.state.master));
                }
            }
            BrowseAction::Delete(id) => {
                let result =
                    self.state
                        .delete_transaction(&self.conn, api_mut(&mut self.api), &id);
                self.reload_browser();
                match result {
                    Ok(()) => self.notify(format!("Deleted {id}.")),
                    Err(e) => self.notify(format!("Delete failed: {e}")),
                }
            }
            BrowseAction::Filter(filter) => {
                self.state.filter = filter;
                self.reload_browser();
            }
            BrowseAction::Sync => self.sync(),
        }
    }

    fn handle_form_key(&mut self, code: KeyCode) {
        let Some(form) = self.state.form.as_mut() else {
            return;
        };
        let editing = form.editing.clone();
        match form.handle_key(code) {
            FormAction::Continue => {}
            FormAction::Cancel => self.state.form = None,
            FormAction::Submit(draft) => {
                let api = api_mut(&mut self.api);
                let result = match &editing {
                    Some(id) => self.state.update_transaction(&self.conn, api, id, draft),
                    None => self.state.add_transaction(&self.conn, api, draft),
                };
                match result {
                    Ok(outcome) => {
                        self.state.form = None;
                        let verb = if editing.is_some() { "Updated" } else { "Added" };
                        self.reload_browser();
                        self.notify(outcome_message(verb, &outcome));
                    }
                    Err(e) => {
                        if let Some(form) = self.state.form.as_mut() {
                            form.set_error(e.to_string());
                        }
                    }
                }
            }
        }
    }

    fn ensure_connected(&mut self) -> bool {
        if self.api.is_none() {
            self.api = try_connect(&self.settings).map(|a| Box::new(a) as Box<dyn SheetsApi>);
        }
        self.state.connected = self.api.is_some();
        self.state.connected
    }

    fn sync(&mut self) {
        if !self.ensure_connected() {
            self.notify("Offline. Run `sheetledger auth login` to connect.".to_string());
            return;
        }
        let Some(api) = self.api.as_mut() else {
            return;
        };
        let result = sync::sync_state(&self.conn, &mut self.state, api.as_mut());
        if let Err(AppError::AuthRequired) = result {
            self.api = None;
            self.state.connected = false;
        }
        self.reload_browser();
        match result {
            Ok(msg) => self.notify(msg),
            Err(e) => self.notify(format!("Sync failed: {e}")),
        }
    }

    fn refresh(&mut self) {
        let result = match api_mut(&mut self.api) {
            Some(api) => self
                .state
                .refresh_from_sheets(&self.conn, api)
                .map(|r| format!("Refreshed {} rows from the sheet.", r.remote)),
            None => self
                .state
                .load(&self.conn)
                .map(|()| "Reloaded local data.".to_string()),
        };
        self.home_data = None;
        match result {
            Ok(msg) => self.status_message = Some(msg),
            Err(e) => self.status_message = Some(format!("Refresh failed: {e}")),
        }
    }
}

fn stats_lines(m: &DashboardMetrics) -> Vec<Line<'static>> {
    vec![
        Line::from(Span::styled(
            format!(" {}", m.month.label()),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(vec![Span::raw(" Income         "), money_span(m.income)]),
        Line::from(vec![Span::raw(" Expenses       "), money_span(-m.expense)]),
        Line::from(vec![Span::raw(" Net            "), money_span(m.net)]),
        Line::from(format!(" Savings rate   {}", percent(m.savings_rate))),
        Line::from(format!(
            " Transactions   {}  ({} unsynced)",
            number(m.txn_count as i64),
            m.unsynced_count
        )),
    ]
}

fn draw_cash_flow(frame: &mut Frame, area: Rect, series: &[MonthTotals]) {
    if series.is_empty() {
        return;
    }
    let income_style = Style::default().fg(Color::Rgb(80, 220, 100));
    let expense_style = Style::default().fg(Color::Red);

    let max_val = series
        .iter()
        .flat_map(|m| [m.income, m.expense])
        .fold(0.0_f64, f64::max);
    let (top_tick, mid_tick) = y_axis_ticks(max_val);
    let top_label = compact(top_tick);
    let mid_label = compact(mid_tick);
    let y_label_width = top_label.len().max(mid_label.len()) as u16 + 1;

    let [y_axis_area, bar_area] =
        Layout::horizontal([Constraint::Length(y_label_width), Constraint::Fill(1)]).areas(area);

    // Rows: title, bars, month labels.
    let inner_height = bar_area.height.saturating_sub(2);
    let mid_row = inner_height / 2;
    let mut y_lines: Vec<Line> = vec![Line::from("")];
    for row in 0..inner_height {
        let label = if row == 0 {
            top_label.as_str()
        } else if row == mid_row {
            mid_label.as_str()
        } else {
            ""
        };
        y_lines.push(Line::from(Span::styled(
            format!("{:>width$}", label, width = y_label_width as usize),
            FOOTER_STYLE,
        )));
    }
    frame.render_widget(Paragraph::new(y_lines), y_axis_area);

    let groups: Vec<BarGroup> = series
        .iter()
        .map(|m| {
            let bars = vec![
                Bar::default().value(m.income.max(0.0) as u64).style(income_style),
                Bar::default().value(m.expense.max(0.0) as u64).style(expense_style),
            ];
            BarGroup::default()
                .label(Line::from(m.month.short_label()))
                .bars(&bars)
        })
        .collect();

    let block = Block::default()
        .title("Monthly Cash Flow")
        .title_style(Style::default().add_modifier(Modifier::BOLD))
        .borders(Borders::NONE);
    let mut chart = BarChart::default()
        .block(block)
        .bar_width(2)
        .bar_gap(0)
        .group_gap(1)
        .max(top_tick as u64);
    for group in &groups {
        chart = chart.data(group.clone());
    }
    frame.render_widget(chart, bar_area);
}

/// Pick round y-axis tick values (top and mid) given a max data value.
fn y_axis_ticks(max_val: f64) -> (f64, f64) {
    let steps = [
        100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, 25000.0, 50000.0, 100000.0,
        250000.0, 500000.0, 1000000.0, 2500000.0, 5000000.0, 10000000.0,
    ];
    let top = steps
        .iter()
        .copied()
        .find(|&s| s >= max_val)
        .unwrap_or(max_val);
    (top, top / 2.0)
}

pub fn run() -> Result<()> {
    let (conn, state, settings) = open_state()?;
    let api = try_connect(&settings).map(|a| Box::new(a) as Box<dyn SheetsApi>);
    let mut dashboard = Dashboard::new(conn, state, settings, api);
    if dashboard.api.is_some() {
        // Start from the sheet, but keep going on the cached copy if that fails.
        let result = match api_mut(&mut dashboard.api) {
            Some(api) => dashboard.state.refresh_from_sheets(&dashboard.conn, api).map(|_| ()),
            None => Ok(()),
        };
        if let Err(e) = result {
            log::warn!("initial refresh failed: {e}");
            dashboard.status_message = Some(format!("Using cached data: {e}"));
        }
    }

    let hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        ratatui::restore();
        hook(info);
    }));

    let mut terminal = ratatui::init();
    let result: Result<()> = loop {
        if let Err(e) = terminal.draw(|frame| dashboard.draw(frame)) {
            break Err(e.into());
        }
        match event::read() {
            Err(e) => break Err(e.into()),
            Ok(Event::Key(key)) => {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c')
                {
                    break Ok(());
                }
                if dashboard.handle_key(key.code) {
                    break Ok(());
                }
            }
            _ => {}
        }
    };

    drop(terminal);
    ratatui::restore();
    result
}
