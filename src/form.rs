//! Add/edit modal for a single transaction.

use chrono::NaiveDate;
use crossterm::event::KeyCode;
use ratatui::{
    layout::{Constraint, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use crate::amount::{display_format, parse_amount, AmountFormat};
use crate::category::infer_type;
use crate::error::{AppError, Result};
use crate::mapper::normalize_date;
use crate::models::{MasterData, Transaction, TransactionDraft, TxnType};
use crate::tui::{centered_rect, kind_style, FOOTER_STYLE, HEADER_STYLE, WARN_STYLE};

const PICKER_ROWS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Date,
    Description,
    Amount,
    Category,
    Account,
    Tag,
    Type,
}

impl Field {
    const ORDER: [Field; 7] = [
        Field::Date,
        Field::Description,
        Field::Amount,
        Field::Category,
        Field::Account,
        Field::Tag,
        Field::Type,
    ];

    fn label(self) -> &'static str {
        match self {
            Field::Date => "Date",
            Field::Description => "Description",
            Field::Amount => "Amount",
            Field::Category => "Category",
            Field::Account => "Account",
            Field::Tag => "Tag",
            Field::Type => "Type",
        }
    }

    fn index(self) -> usize {
        Self::ORDER.iter().position(|f| *f == self).unwrap_or(0)
    }

    fn next(self) -> Field {
        Self::ORDER[(self.index() + 1) % Self::ORDER.len()]
    }

    fn prev(self) -> Field {
        Self::ORDER[(self.index() + Self::ORDER.len() - 1) % Self::ORDER.len()]
    }

    fn is_picker(self) -> bool {
        matches!(self, Field::Category | Field::Account)
    }
}

pub enum FormAction {
    Continue,
    Cancel,
    Submit(TransactionDraft),
}

#[derive(Debug, Clone)]
pub struct TransactionForm {
    /// Id of the record being edited; `None` for a new one.
    pub editing: Option<String>,
    pub date: String,
    pub description: String,
    pub amount: String,
    pub category: String,
    pub account: String,
    pub tag: String,
    /// Explicit type; `None` shows and uses the inferred one.
    pub kind: Option<TxnType>,
    pub focus: Field,
    selection: usize,
    error: Option<String>,
    categories: Vec<String>,
    accounts: Vec<String>,
}

impl TransactionForm {
    pub fn new_entry(master: &MasterData, today: NaiveDate) -> Self {
        Self {
            editing: None,
            date: today.format("%Y-%m-%d").to_string(),
            description: String::new(),
            amount: String::new(),
            category: String::new(),
            account: master.accounts.first().cloned().unwrap_or_default(),
            tag: String::new(),
            kind: None,
            focus: Field::Date,
            selection: 0,
            error: None,
            categories: master.categories.iter().map(|c| c.display.clone()).collect(),
            accounts: master.accounts.clone(),
        }
    }

    pub fn edit(txn: &Transaction, master: &MasterData) -> Self {
        let inferred = infer_type(&txn.category);
        Self {
            editing: Some(txn.id.clone()),
            date: txn.date.format("%Y-%m-%d").to_string(),
            description: txn.description.clone(),
            amount: format!("{:.2}", txn.amount),
            category: txn.category.clone(),
            account: txn.account.clone(),
            tag: txn.tag.clone().unwrap_or_default(),
            kind: (txn.kind != inferred).then_some(txn.kind),
            focus: Field::Description,
            selection: 0,
            error: None,
            categories: master.categories.iter().map(|c| c.display.clone()).collect(),
            accounts: master.accounts.clone(),
        }
    }

    pub fn effective_type(&self) -> TxnType {
        self.kind.unwrap_or_else(|| infer_type(&self.category))
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn set_error(&mut self, msg: String) {
        self.error = Some(msg);
    }

    fn value_mut(&mut self, field: Field) -> Option<&mut String> {
        match field {
            Field::Date => Some(&mut self.date),
            Field::Description => Some(&mut self.description),
            Field::Amount => Some(&mut self.amount),
            Field::Category => Some(&mut self.category),
            Field::Account => Some(&mut self.account),
            Field::Tag => Some(&mut self.tag),
            Field::Type => None,
        }
    }

    fn value(&self, field: Field) -> String {
        match field {
            Field::Date => self.date.clone(),
            Field::Description => self.description.clone(),
            Field::Amount => self.amount.clone(),
            Field::Category => self.category.clone(),
            Field::Account => self.account.clone(),
            Field::Tag => self.tag.clone(),
            Field::Type => match self.kind {
                Some(k) => k.to_string(),
                None => format!("Auto ({})", self.effective_type()),
            },
        }
    }

    /// Picker entries for the focused field whose label contains its text.
    pub fn suggestions(&self) -> Vec<&str> {
        let (source, query) = match self.focus {
            Field::Category => (&self.categories, &self.category),
            Field::Account => (&self.accounts, &self.account),
            _ => return vec![],
        };
        let q = query.trim().to_lowercase();
        source
            .iter()
            .filter(|label| q.is_empty() || label.to_lowercase().contains(&q))
            .filter(|label| !label.eq_ignore_ascii_case(query.trim()))
            .map(String::as_str)
            .take(PICKER_ROWS)
            .collect()
    }

    fn move_focus(&mut self, to: Field) {
        self.focus = to;
        self.selection = 0;
    }

    fn cycle_type(&mut self, forward: bool) {
        // Auto -> Income -> Expense -> Transfer -> Auto
        let options: [Option<TxnType>; 4] = [
            None,
            Some(TxnType::Income),
            Some(TxnType::Expense),
            Some(TxnType::Transfer),
        ];
        let idx = options.iter().position(|o| *o == self.kind).unwrap_or(0);
        let next = if forward { idx + 1 } else { idx + options.len() - 1 };
        self.kind = options[next % options.len()];
    }

    pub fn handle_key(&mut self, code: KeyCode) -> FormAction {
        self.error = None;
        match code {
            KeyCode::Esc => return FormAction::Cancel,
            KeyCode::Tab => self.move_focus(self.focus.next()),
            KeyCode::BackTab => self.move_focus(self.focus.prev()),
            KeyCode::Up if self.focus.is_picker() => {
                self.selection = self.selection.saturating_sub(1);
            }
            KeyCode::Down if self.focus.is_picker() => {
                let count = self.suggestions().len();
                if self.selection + 1 < count {
                    self.selection += 1;
                }
            }
            KeyCode::Up => self.move_focus(self.focus.prev()),
            KeyCode::Down => self.move_focus(self.focus.next()),
            KeyCode::Left | KeyCode::Right if self.focus == Field::Type => {
                self.cycle_type(code == KeyCode::Right);
            }
            KeyCode::Char(' ') if self.focus == Field::Type => self.cycle_type(true),
            KeyCode::Enter => {
                if self.focus.is_picker() {
                    let pick = self
                        .suggestions()
                        .get(self.selection)
                        .map(|s| s.to_string());
                    if let Some(pick) = pick {
                        let focus = self.focus;
                        if let Some(v) = self.value_mut(focus) {
                            *v = pick;
                        }
                        self.move_focus(focus.next());
                        return FormAction::Continue;
                    }
                }
                if self.focus == Field::Type {
                    return match self.to_draft(display_format()) {
                        Ok(draft) => FormAction::Submit(draft),
                        Err(e) => {
                            self.error = Some(e.to_string());
                            FormAction::Continue
                        }
                    };
                }
                self.move_focus(self.focus.next());
            }
            KeyCode::Backspace => {
                let focus = self.focus;
                if let Some(v) = self.value_mut(focus) {
                    v.pop();
                }
                self.selection = 0;
            }
            KeyCode::Char(c) => {
                let focus = self.focus;
                if let Some(v) = self.value_mut(focus) {
                    v.push(c);
                }
                self.selection = 0;
            }
            _ => {}
        }
        FormAction::Continue
    }

    /// Parse and check the fields.
    pub fn to_draft(&self, format: &AmountFormat) -> Result<TransactionDraft> {
        let date = normalize_date(&self.date)
            .map_err(|_| AppError::Invalid(format!("date {:?} is not a date", self.date)))?;
        let amount = parse_amount(&self.amount, format)
            .map_err(|_| AppError::Invalid(format!("amount {:?} is not a number", self.amount)))?;
        let draft = TransactionDraft {
            date,
            amount,
            category: self.category.trim().to_string(),
            description: self.description.trim().to_string(),
            account: self.account.trim().to_string(),
            tag: Some(self.tag.trim().to_string()).filter(|t| !t.is_empty()),
            kind: self.kind,
        };
        draft.validate()?;
        Ok(draft)
    }

    pub fn draw(&self, frame: &mut Frame) {
        let picker_height = if self.focus.is_picker() {
            PICKER_ROWS as u16
        } else {
            0
        };
        let height = Field::ORDER.len() as u16 + picker_height + 6;
        let area = centered_rect(64, height, frame.area());
        frame.render_widget(Clear, area);

        let title = if self.editing.is_some() {
            " Edit transaction "
        } else {
            " New transaction "
        };
        let block = Block::default()
            .title(Span::styled(title, HEADER_STYLE))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let [fields_area, picker_area, error_area, keys_area] = Layout::vertical([
            Constraint::Length(Field::ORDER.len() as u16 + 1),
            Constraint::Length(picker_height),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .areas(inner);

        let mut lines = vec![Line::from("")];
        for field in Field::ORDER {
            let focused = field == self.focus;
            let marker = if focused { ">" } else { " " };
            let mut value = self.value(field);
            if focused && field != Field::Type {
                value.push('\u{2588}');
            }
            let value_style = if field == Field::Type {
                kind_style(self.effective_type())
            } else if focused {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            lines.push(Line::from(vec![
                Span::raw(format!(" {marker} {:<12}", field.label())),
                Span::styled(value, value_style),
            ]));
        }
        frame.render_widget(Paragraph::new(lines), fields_area);

        if picker_height > 0 {
            let picks: Vec<Line> = self
                .suggestions()
                .iter()
                .enumerate()
                .map(|(i, label)| {
                    let marker = if i == self.selection { ">" } else { " " };
                    Line::from(Span::styled(
                        format!("                {marker} {label}"),
                        if i == self.selection {
                            Style::default().add_modifier(Modifier::BOLD)
                        } else {
                            FOOTER_STYLE
                        },
                    ))
                })
                .collect();
            frame.render_widget(Paragraph::new(picks), picker_area);
        }

        if let Some(err) = &self.error {
            frame.render_widget(
                Paragraph::new(format!(" {err}")).style(WARN_STYLE),
                error_area,
            );
        }

        let keys = match self.focus {
            Field::Type => " \u{2190}/\u{2192}:change type  Enter:save  Tab:next  Esc:cancel",
            f if f.is_picker() => " \u{2191}/\u{2193}:pick  Enter:accept  Tab:next  Esc:cancel",
            _ => " Tab/Enter:next  Shift-Tab:prev  Esc:cancel",
        };
        frame.render_widget(Paragraph::new(keys).style(FOOTER_STYLE), keys_area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Source};

    fn master() -> MasterData {
        MasterData {
            accounts: vec!["Checking".into(), "Cash".into(), "Savings".into()],
            categories: vec![
                Category::from_parts("Food", Some("Groceries")),
                Category::from_parts("Food", Some("Dining Out")),
                Category::from_parts("Income", Some("Salary")),
                Category::from_parts("Transfer", None),
            ],
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    fn type_text(form: &mut TransactionForm, text: &str) {
        for c in text.chars() {
            form.handle_key(KeyCode::Char(c));
        }
    }

    #[test]
    fn test_new_entry_defaults() {
        let form = TransactionForm::new_entry(&master(), today());
        assert_eq!(form.date, "2025-03-14");
        assert_eq!(form.account, "Checking");
        assert_eq!(form.focus, Field::Date);
        assert!(form.editing.is_none());
    }

    #[test]
    fn test_focus_cycles() {
        let mut form = TransactionForm::new_entry(&master(), today());
        form.handle_key(KeyCode::Tab);
        assert_eq!(form.focus, Field::Description);
        form.handle_key(KeyCode::BackTab);
        form.handle_key(KeyCode::BackTab);
        assert_eq!(form.focus, Field::Type);
    }

    #[test]
    fn test_category_picker_filters_and_accepts() {
        let mut form = TransactionForm::new_entry(&master(), today());
        form.focus = Field::Category;
        type_text(&mut form, "food");
        assert_eq!(form.suggestions(), vec!["Food > Groceries", "Food > Dining Out"]);
        form.handle_key(KeyCode::Down);
        form.handle_key(KeyCode::Enter);
        assert_eq!(form.category, "Food > Dining Out");
        assert_eq!(form.focus, Field::Account);
        assert_eq!(form.effective_type(), TxnType::Expense);
    }

    #[test]
    fn test_type_follows_category_until_overridden() {
        let mut form = TransactionForm::new_entry(&master(), today());
        form.category = "Income > Salary".into();
        assert_eq!(form.effective_type(), TxnType::Income);
        form.focus = Field::Type;
        form.handle_key(KeyCode::Right);
        form.handle_key(KeyCode::Right);
        assert_eq!(form.kind, Some(TxnType::Expense));
        form.handle_key(KeyCode::Left);
        form.handle_key(KeyCode::Left);
        assert_eq!(form.kind, None);
    }

    #[test]
    fn test_submit_validates() {
        let mut form = TransactionForm::new_entry(&master(), today());
        form.focus = Field::Type;
        assert!(matches!(form.handle_key(KeyCode::Enter), FormAction::Continue));
        assert!(form.error().unwrap().contains("amount"));

        form.amount = "1,250.50".into();
        form.description = "Weekly shop".into();
        form.category = "Food > Groceries".into();
        match form.handle_key(KeyCode::Enter) {
            FormAction::Submit(draft) => {
                assert_eq!(draft.amount, 1250.5);
                assert_eq!(draft.date, today());
                assert_eq!(draft.kind, None);
                assert_eq!(draft.tag, None);
            }
            _ => panic!("expected submit"),
        }
    }

    #[test]
    fn test_bad_date_rejected() {
        let mut form = TransactionForm::new_entry(&master(), today());
        form.date = "someday".into();
        form.amount = "5".into();
        form.description = "x".into();
        form.category = "Food".into();
        let err = form.to_draft(&AmountFormat::default()).unwrap_err();
        assert!(err.to_string().contains("date"));
    }

    #[test]
    fn test_edit_prefills_and_keeps_explicit_type() {
        let txn = Transaction {
            id: "t9".into(),
            date: today(),
            amount: 40.0,
            category: "Food > Groceries".into(),
            description: "Refund for eggs".into(),
            account: "Cash".into(),
            tag: Some("trip".into()),
            kind: TxnType::Income,
            synced: true,
            source: Source::Sheets,
            sheet_row: Some(8),
            created_at: None,
        };
        let form = TransactionForm::edit(&txn, &master());
        assert_eq!(form.editing.as_deref(), Some("t9"));
        assert_eq!(form.amount, "40.00");
        assert_eq!(form.kind, Some(TxnType::Income));
        assert_eq!(form.tag, "trip");
        let draft = form.to_draft(&AmountFormat::default()).unwrap();
        assert_eq!(draft.kind, Some(TxnType::Income));
    }

    #[test]
    fn test_esc_cancels() {
        let mut form = TransactionForm::new_entry(&master(), today());
        assert!(matches!(form.handle_key(KeyCode::Esc), FormAction::Cancel));
    }
}
