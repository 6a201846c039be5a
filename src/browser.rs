use ratatui::{
    layout::{Constraint, Layout},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Cell, Paragraph, Row, Table, TableState},
    Frame,
};

use crossterm::event::KeyCode;

use crate::fmt::money;
use crate::models::{Transaction, TxnType};
use crate::store::TransactionFilter;
use crate::tui::{self, FOOTER_STYLE, HEADER_STYLE, SELECTED_STYLE, WARN_STYLE};

const PAGE_SIZE: usize = 20;

/// Marker shown next to records that have not reached the sheet yet.
const UNSYNCED_MARK: &str = "\u{2022}";

enum BrowseMode {
    Normal,
    Search(String),
    ConfirmDelete(String),
}

pub enum BrowseAction {
    Continue,
    Close,
    Add,
    Edit(String),
    Delete(String),
    Filter(TransactionFilter),
    Sync,
}

pub struct TransactionBrowser {
    rows: Vec<Transaction>,
    filter: TransactionFilter,
    accounts: Vec<String>,
    offset: usize,
    visible_count: usize,
    selected: usize,
    mode: BrowseMode,
    status_message: Option<String>,
    table_state: TableState,
}

impl TransactionBrowser {
    pub fn new(rows: Vec<Transaction>, filter: TransactionFilter, accounts: Vec<String>) -> Self {
        Self {
            rows,
            filter,
            accounts,
            offset: 0,
            visible_count: PAGE_SIZE,
            selected: 0,
            mode: BrowseMode::Normal,
            status_message: None,
            table_state: TableState::default(),
        }
    }

    /// Swap in a fresh row set, keeping the cursor where it was when possible.
    pub fn reload(&mut self, rows: Vec<Transaction>, filter: TransactionFilter) {
        let keep = self.selected_row().map(|t| t.id.clone());
        self.rows = rows;
        self.filter = filter;
        match keep.and_then(|id| self.rows.iter().position(|t| t.id == id)) {
            Some(idx) if idx >= self.offset && idx < self.offset + self.visible_count => {
                self.selected = idx - self.offset;
            }
            Some(idx) => {
                self.offset = idx;
                self.selected = 0;
            }
            None => {
                let max = self.rows.len().saturating_sub(1);
                self.offset = self.offset.min(max);
                self.selected = self.selected.min(max - self.offset);
            }
        }
    }

    pub fn selected_row(&self) -> Option<&Transaction> {
        self.rows.get(self.offset + self.selected)
    }

    pub fn set_status(&mut self, msg: String) {
        self.status_message = Some(msg);
    }

    /// Draw the browser into the given frame.
    pub fn draw_frame(&mut self, frame: &mut Frame) {
        let area = frame.area();
        let narrow = area.width < 110;

        let prompt_height: u16 = match self.mode {
            BrowseMode::Normal => 0,
            _ => 1,
        };

        let [title_area, table_area, prompt_area, status_area, keys_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Fill(1),
            Constraint::Length(prompt_height),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .areas(area);

        frame.render_widget(
            Paragraph::new(format!("Transactions ({})", self.filter.describe())).style(HEADER_STYLE),
            title_area,
        );

        let (fixed_cols, num_cols): (u16, u16) = if narrow {
            (1 + 10 + 24 + 14, 5)
        } else {
            (1 + 10 + 24 + 16 + 14 + 9, 7)
        };
        let spacing = num_cols - 1;
        let desc_width = table_area
            .width
            .saturating_sub(fixed_cols + spacing) as usize;
        let desc_width = desc_width.max(10);

        let header_overhead = 2u16;
        let available_height = table_area.height.saturating_sub(header_overhead) as usize;
        let mut rendered_rows = Vec::new();
        let mut total_height = 0usize;
        let mut vis = 0usize;

        for txn in self.rows.iter().skip(self.offset) {
            let (wrapped_desc, line_count) = tui::wrap_text(&txn.description, desc_width);
            let h = line_count as usize;
            if total_height + h > available_height && vis > 0 {
                break;
            }

            let mark = Cell::from(Span::styled(
                if txn.synced { "" } else { UNSYNCED_MARK },
                WARN_STYLE,
            ));
            let amount = Cell::from(Line::from(tui::kind_money_span(txn.amount, txn.kind)).right_aligned());
            let date = Cell::from(txn.date.format("%Y-%m-%d").to_string());
            let category = Cell::from(txn.category.clone());

            let cells: Vec<Cell> = if narrow {
                vec![mark, date, Cell::from(wrapped_desc), category, amount]
            } else {
                vec![
                    mark,
                    date,
                    Cell::from(wrapped_desc),
                    category,
                    Cell::from(txn.account.clone()),
                    amount,
                    Cell::from(Span::styled(txn.kind.as_str(), tui::kind_style(txn.kind))),
                ]
            };

            rendered_rows.push(Row::new(cells).height(line_count));
            total_height += h;
            vis += 1;
        }

        self.visible_count = vis.max(1);

        let widths: Vec<Constraint> = if narrow {
            vec![
                Constraint::Length(1),
                Constraint::Length(10),
                Constraint::Fill(1),
                Constraint::Length(24),
                Constraint::Length(14),
            ]
        } else {
            vec![
                Constraint::Length(1),
                Constraint::Length(10),
                Constraint::Fill(1),
                Constraint::Length(24),
                Constraint::Length(16),
                Constraint::Length(14),
                Constraint::Length(9),
            ]
        };

        let header_cells: Vec<&str> = if narrow {
            vec!["", "Date", "Description", "Category", "Amount"]
        } else {
            vec!["", "Date", "Description", "Category", "Account", "Amount", "Type"]
        };

        self.table_state.select(if self.rows.is_empty() {
            None
        } else {
            Some(self.selected)
        });
        let table = Table::new(rendered_rows, widths)
            .header(Row::new(header_cells).style(HEADER_STYLE).bottom_margin(1))
            .column_spacing(1)
            .row_highlight_style(SELECTED_STYLE);
        frame.render_stateful_widget(table, table_area, &mut self.table_state);

        if self.rows.is_empty() {
            frame.render_widget(
                Paragraph::new("\n  No transactions match.").style(FOOTER_STYLE),
                table_area,
            );
        }

        match &self.mode {
            BrowseMode::Search(query) => frame.render_widget(
                Paragraph::new(format!("Search: {query}\u{2588}")),
                prompt_area,
            ),
            BrowseMode::ConfirmDelete(id) => {
                let desc = self
                    .rows
                    .iter()
                    .find(|t| &t.id == id)
                    .map(|t| t.description.as_str())
                    .unwrap_or("");
                frame.render_widget(
                    Paragraph::new(Line::from(vec![
                        Span::styled("Delete ", Style::default().fg(Color::Red)),
                        Span::raw(format!("\"{desc}\"? (y/n)")),
                    ])),
                    prompt_area,
                );
            }
            BrowseMode::Normal => {}
        }

        let (income, expense) = self.totals();
        let end_row = (self.offset + self.visible_count).min(self.rows.len());
        let mut status = format!(
            "Rows {}-{} of {} | In: {} | Out: {}",
            if self.rows.is_empty() { 0 } else { self.offset + 1 },
            end_row,
            self.rows.len(),
            money(income),
            money(expense),
        );
        let pending = self.rows.iter().filter(|t| !t.synced).count();
        if pending > 0 {
            status.push_str(&format!(" | {pending} unsynced"));
        }
        if let Some(msg) = &self.status_message {
            status.push_str(&format!(" | {msg}"));
        }
        frame.render_widget(Paragraph::new(status).style(FOOTER_STYLE), status_area);

        let keys = match self.mode {
            BrowseMode::Normal => {
                "\u{2191}/\u{2193}:select  n:new  e:edit  x:delete  /:search  t:type  a:account  c:clear  s:sync  q:back"
            }
            BrowseMode::Search(_) => "Type to filter, Enter=done, Esc=clear",
            BrowseMode::ConfirmDelete(_) => "y=delete  n/Esc=keep",
        };
        frame.render_widget(Paragraph::new(keys).style(FOOTER_STYLE), keys_area);
    }

    fn totals(&self) -> (f64, f64) {
        self.rows.iter().fold((0.0, 0.0), |(inc, exp), t| match t.kind {
            TxnType::Income => (inc + t.amount.abs(), exp),
            TxnType::Expense => (inc, exp + t.amount.abs()),
            TxnType::Transfer => (inc, exp),
        })
    }

    /// Handle a key event. Returns a BrowseAction indicating what the caller should do.
    pub fn handle_key_event(&mut self, code: KeyCode) -> BrowseAction {
        self.status_message = None;

        match &self.mode {
            BrowseMode::Normal => match code {
                KeyCode::Char('q') | KeyCode::Esc => return BrowseAction::Close,
                KeyCode::Down => {
                    let on_screen = self.visible_count.min(self.rows.len().saturating_sub(self.offset));
                    if self.selected + 1 < on_screen {
                        self.selected += 1;
                    } else if self.offset + self.visible_count < self.rows.len() {
                        self.offset += 1;
                    }
                }
                KeyCode::Up => {
                    if self.selected > 0 {
                        self.selected -= 1;
                    } else if self.offset > 0 {
                        self.offset -= 1;
                    }
                }
                KeyCode::Right | KeyCode::PageDown => {
                    self.scroll_down();
                    self.selected = 0;
                }
                KeyCode::Left | KeyCode::PageUp => {
                    self.scroll_up();
                    self.selected = 0;
                }
                KeyCode::Home => {
                    self.offset = 0;
                    self.selected = 0;
                }
                KeyCode::End => {
                    self.scroll_to_end();
                    self.selected = 0;
                }
                KeyCode::Char('n') => return BrowseAction::Add,
                KeyCode::Char('e') | KeyCode::Enter => {
                    if let Some(t) = self.selected_row() {
                        return BrowseAction::Edit(t.id.clone());
                    }
                }
                KeyCode::Char('x') | KeyCode::Delete => {
                    if let Some(t) = self.selected_row() {
                        self.mode = BrowseMode::ConfirmDelete(t.id.clone());
                    }
                }
                KeyCode::Char('/') => {
                    self.mode = BrowseMode::Search(self.filter.search.clone());
                }
                KeyCode::Char('t') => {
                    let mut filter = self.filter.clone();
                    filter.kind = next_kind(filter.kind);
                    return self.refilter(filter);
                }
                KeyCode::Char('a') => {
                    let mut filter = self.filter.clone();
                    filter.account = next_account(&self.accounts, filter.account.as_deref());
                    return self.refilter(filter);
                }
                KeyCode::Char('c') => {
                    if !self.filter.is_empty() {
                        return self.refilter(TransactionFilter::default());
                    }
                }
                KeyCode::Char('s') => return BrowseAction::Sync,
                _ => {}
            },
            BrowseMode::Search(_) => return self.handle_search_key(code),
            BrowseMode::ConfirmDelete(id) => {
                let id = id.clone();
                self.mode = BrowseMode::Normal;
                if matches!(code, KeyCode::Char('y') | KeyCode::Char('Y')) {
                    return BrowseAction::Delete(id);
                }
                self.status_message = Some("Delete cancelled".to_string());
            }
        }
        BrowseAction::Continue
    }

    fn handle_search_key(&mut self, code: KeyCode) -> BrowseAction {
        let query = match &mut self.mode {
            BrowseMode::Search(q) => q,
            _ => return BrowseAction::Continue,
        };
        match code {
            KeyCode::Char(c) => query.push(c),
            KeyCode::Backspace => {
                query.pop();
            }
            KeyCode::Enter => {
                self.mode = BrowseMode::Normal;
                return BrowseAction::Continue;
            }
            KeyCode::Esc => query.clear(),
            _ => return BrowseAction::Continue,
        }
        let mut filter = self.filter.clone();
        filter.search = query.clone();
        if code == KeyCode::Esc {
            self.mode = BrowseMode::Normal;
        }
        self.refilter(filter)
    }

    fn refilter(&mut self, filter: TransactionFilter) -> BrowseAction {
        self.offset = 0;
        self.selected = 0;
        BrowseAction::Filter(filter)
    }

    fn scroll_down(&mut self) {
        let new_offset = self.offset + self.visible_count;
        if new_offset < self.rows.len() {
            self.offset = new_offset;
        }
    }

    fn scroll_up(&mut self) {
        self.offset = self.offset.saturating_sub(self.visible_count);
    }

    fn scroll_to_end(&mut self) {
        self.offset = self.rows.len().saturating_sub(PAGE_SIZE);
    }
}

fn next_kind(current: Option<TxnType>) -> Option<TxnType> {
    match current {
        None => Some(TxnType::Income),
        Some(TxnType::Income) => Some(TxnType::Expense),
        Some(TxnType::Expense) => Some(TxnType::Transfer),
        Some(TxnType::Transfer) => None,
    }
}

fn next_account(accounts: &[String], current: Option<&str>) -> Option<String> {
    match current {
        None => accounts.first().cloned(),
        Some(name) => {
            let idx = accounts.iter().position(|a| a == name)?;
            accounts.get(idx + 1).cloned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Source;
    use chrono::NaiveDate;

    fn make_rows(n: usize) -> Vec<Transaction> {
        (0..n)
            .map(|i| Transaction {
                id: format!("t{}", i + 1),
                date: NaiveDate::from_ymd_opt(2025, 1, (i % 28) as u32 + 1).unwrap(),
                description: format!("Transaction {}", i + 1),
                amount: if i % 2 == 0 { 100.0 } else { -50.0 },
                category: "Food > Groceries".to_string(),
                account: "Checking".to_string(),
                tag: None,
                kind: if i % 2 == 0 { TxnType::Income } else { TxnType::Expense },
                synced: i % 3 != 0,
                source: Source::Sheets,
                sheet_row: Some(i as u32 + 2),
                created_at: None,
            })
            .collect()
    }

    fn browser(n: usize) -> TransactionBrowser {
        TransactionBrowser::new(
            make_rows(n),
            TransactionFilter::default(),
            vec!["Checking".into(), "Cash".into()],
        )
    }

    #[test]
    fn test_scroll_down() {
        let mut b = browser(50);
        b.scroll_down();
        assert_eq!(b.offset, PAGE_SIZE);
        b.scroll_down();
        assert_eq!(b.offset, PAGE_SIZE * 2);
    }

    #[test]
    fn test_scroll_down_stops_at_end() {
        let mut b = browser(10);
        b.scroll_down();
        assert_eq!(b.offset, 0);
    }

    #[test]
    fn test_scroll_up() {
        let mut b = browser(50);
        b.offset = PAGE_SIZE * 2;
        b.scroll_up();
        assert_eq!(b.offset, PAGE_SIZE);
        b.scroll_up();
        b.scroll_up();
        assert_eq!(b.offset, 0);
    }

    #[test]
    fn test_scroll_to_end() {
        let mut b = browser(50);
        b.scroll_to_end();
        assert_eq!(b.offset, 50 - PAGE_SIZE);
    }

    #[test]
    fn test_selected_row_up_down() {
        let mut b = browser(50);
        b.handle_key_event(KeyCode::Down);
        b.handle_key_event(KeyCode::Down);
        assert_eq!(b.selected, 2);
        b.handle_key_event(KeyCode::Up);
        assert_eq!(b.selected_row().unwrap().id, "t2");
        b.handle_key_event(KeyCode::Up);
        b.handle_key_event(KeyCode::Up);
        assert_eq!(b.selected, 0);
    }

    #[test]
    fn test_down_on_empty_list() {
        let mut b = browser(0);
        b.handle_key_event(KeyCode::Down);
        assert_eq!(b.selected, 0);
        assert!(matches!(b.handle_key_event(KeyCode::Char('e')), BrowseAction::Continue));
    }

    #[test]
    fn test_close_on_q() {
        let mut b = browser(5);
        assert!(matches!(b.handle_key_event(KeyCode::Char('q')), BrowseAction::Close));
    }

    #[test]
    fn test_add_and_edit_actions() {
        let mut b = browser(5);
        assert!(matches!(b.handle_key_event(KeyCode::Char('n')), BrowseAction::Add));
        b.handle_key_event(KeyCode::Down);
        match b.handle_key_event(KeyCode::Char('e')) {
            BrowseAction::Edit(id) => assert_eq!(id, "t2"),
            _ => panic!("expected edit"),
        }
    }

    #[test]
    fn test_delete_requires_confirmation() {
        let mut b = browser(5);
        b.handle_key_event(KeyCode::Char('x'));
        assert!(matches!(b.mode, BrowseMode::ConfirmDelete(_)));
        assert!(matches!(b.handle_key_event(KeyCode::Char('n')), BrowseAction::Continue));
        assert!(matches!(b.mode, BrowseMode::Normal));
        assert!(b.status_message.as_deref().unwrap().contains("cancelled"));

        b.handle_key_event(KeyCode::Char('x'));
        match b.handle_key_event(KeyCode::Char('y')) {
            BrowseAction::Delete(id) => assert_eq!(id, "t1"),
            _ => panic!("expected delete"),
        }
    }

    #[test]
    fn test_type_filter_cycles() {
        let mut b = browser(5);
        let BrowseAction::Filter(f) = b.handle_key_event(KeyCode::Char('t')) else {
            panic!("expected filter");
        };
        assert_eq!(f.kind, Some(TxnType::Income));
        b.filter = f;
        b.filter.kind = Some(TxnType::Transfer);
        let BrowseAction::Filter(f) = b.handle_key_event(KeyCode::Char('t')) else {
            panic!("expected filter");
        };
        assert_eq!(f.kind, None);
    }

    #[test]
    fn test_account_filter_cycles() {
        let mut b = browser(5);
        let BrowseAction::Filter(f) = b.handle_key_event(KeyCode::Char('a')) else {
            panic!("expected filter");
        };
        assert_eq!(f.account.as_deref(), Some("Checking"));
        b.filter = f;
        let BrowseAction::Filter(f) = b.handle_key_event(KeyCode::Char('a')) else {
            panic!("expected filter");
        };
        assert_eq!(f.account.as_deref(), Some("Cash"));
        b.filter = f;
        let BrowseAction::Filter(f) = b.handle_key_event(KeyCode::Char('a')) else {
            panic!("expected filter");
        };
        assert_eq!(f.account, None);
    }

    #[test]
    fn test_search_updates_filter_live() {
        let mut b = browser(5);
        b.offset = 2;
        b.handle_key_event(KeyCode::Char('/'));
        b.handle_key_event(KeyCode::Char('r'));
        let BrowseAction::Filter(f) = b.handle_key_event(KeyCode::Char('e')) else {
            panic!("expected filter");
        };
        assert_eq!(f.search, "re");
        assert_eq!(b.offset, 0);
        b.handle_key_event(KeyCode::Enter);
        assert!(matches!(b.mode, BrowseMode::Normal));

        b.handle_key_event(KeyCode::Char('/'));
        let BrowseAction::Filter(f) = b.handle_key_event(KeyCode::Esc) else {
            panic!("expected filter");
        };
        assert!(f.search.is_empty());
        assert!(matches!(b.mode, BrowseMode::Normal));
    }

    #[test]
    fn test_reload_keeps_selection() {
        let mut b = browser(10);
        b.selected = 3;
        let mut rows = make_rows(10);
        rows.remove(0);
        b.reload(rows, TransactionFilter::default());
        assert_eq!(b.selected_row().unwrap().id, "t4");
    }

    #[test]
    fn test_reload_after_last_row_removed() {
        let mut b = browser(3);
        b.selected = 2;
        let mut rows = make_rows(3);
        rows.pop();
        b.reload(rows, TransactionFilter::default());
        assert_eq!(b.selected_row().unwrap().id, "t2");
    }

    #[test]
    fn test_totals_by_kind() {
        let b = browser(4);
        assert_eq!(b.totals(), (200.0, 100.0));
    }
}
