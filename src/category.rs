use crate::models::{Category, TxnType};

pub const SEPARATOR: &str = ">";

const TRANSFER_KEYWORDS: &[&str] = &["transfer", "pindah", "mutasi"];

const INCOME_KEYWORDS: &[&str] = &[
    "income",
    "salary",
    "gaji",
    "bonus",
    "pendapatan",
    "pemasukan",
    "interest",
    "dividend",
    "refund",
];

/// Split "Food > Groceries" into ("Food", Some("Groceries")).
pub fn split_category(category: &str) -> (&str, Option<&str>) {
    match category.split_once(SEPARATOR) {
        Some((main, sub)) => {
            let sub = sub.trim();
            (main.trim(), if sub.is_empty() { None } else { Some(sub) })
        }
        None => (category.trim(), None),
    }
}

pub fn join_category(main: &str, sub: Option<&str>) -> String {
    match sub.map(str::trim).filter(|s| !s.is_empty()) {
        Some(sub) => format!("{} {SEPARATOR} {}", main.trim(), sub),
        None => main.trim().to_string(),
    }
}

/// Infer a transaction type from its category by keyword.
///
/// Every path that needs a type from a category goes through here, so the
/// add form, row mapping and list display always agree.
pub fn infer_type(category: &str) -> TxnType {
    let lower = category.to_lowercase();
    if TRANSFER_KEYWORDS.iter().any(|k| lower.contains(k)) {
        TxnType::Transfer
    } else if INCOME_KEYWORDS.iter().any(|k| lower.contains(k)) {
        TxnType::Income
    } else {
        TxnType::Expense
    }
}

/// An explicit type wins; otherwise fall back to [`infer_type`].
pub fn resolve_type(explicit: Option<&str>, category: &str) -> TxnType {
    explicit
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| infer_type(category))
}

impl Category {
    pub fn from_parts(main: &str, sub: Option<&str>) -> Self {
        let sub = sub.map(str::trim).filter(|s| !s.is_empty()).map(String::from);
        Self {
            main: main.trim().to_string(),
            display: join_category(main, sub.as_deref()),
            sub,
        }
    }

    pub fn kind(&self) -> TxnType {
        infer_type(&self.display)
    }
}
