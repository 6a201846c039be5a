use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::metrics::YearMonth;
use crate::models::Transaction;
use crate::store::TransactionFilter;

use super::open_state;

const HEADER: &[&str] = &[
    "id",
    "date",
    "description",
    "category",
    "amount",
    "account",
    "tag",
    "type",
    "synced",
];

fn default_path(data_dir: &Path) -> PathBuf {
    let date = chrono::Local::now().format("%Y-%m-%d").to_string();
    data_dir
        .join("exports")
        .join(format!("transactions-{date}.csv"))
}

/// Write transactions as CSV, oldest first.
pub fn write_csv<W: Write>(out: W, txns: &[&Transaction]) -> Result<usize> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(HEADER)?;
    for t in txns.iter().rev() {
        let date = t.date.format("%Y-%m-%d").to_string();
        let amount = format!("{:.2}", t.amount);
        writer.write_record([
            t.id.as_str(),
            date.as_str(),
            t.description.as_str(),
            t.category.as_str(),
            amount.as_str(),
            t.account.as_str(),
            t.tag.as_deref().unwrap_or(""),
            t.kind.as_str(),
            if t.synced { "yes" } else { "no" },
        ])?;
    }
    writer.flush()?;
    Ok(txns.len())
}

pub fn run(output: Option<String>, month: Option<String>) -> Result<()> {
    let (_conn, mut state, settings) = open_state()?;
    let month: Option<YearMonth> = month.as_deref().map(str::parse).transpose()?;
    state.filter = TransactionFilter {
        month,
        ..Default::default()
    };
    let path = output
        .map(PathBuf::from)
        .unwrap_or_else(|| default_path(Path::new(&settings.data_dir)));
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(&path)?;
    let count = write_csv(file, &state.filtered())?;
    println!("Wrote {count} transaction(s) to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Source, TxnType};
    use chrono::NaiveDate;

    #[test]
    fn test_write_csv_quotes_and_orders() {
        let newer = Transaction {
            id: "b".into(),
            date: NaiveDate::from_ymd_opt(2025, 3, 2).unwrap(),
            amount: -4.5,
            category: "Food > Coffee".into(),
            description: "Coffee, large".into(),
            account: "Cash".into(),
            tag: None,
            kind: TxnType::Expense,
            synced: false,
            source: Source::Local,
            sheet_row: None,
            created_at: None,
        };
        let older = Transaction {
            id: "a".into(),
            date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            description: "Pay".into(),
            category: "Income".into(),
            amount: 100.0,
            kind: TxnType::Income,
            synced: true,
            ..newer.clone()
        };
        let mut buf = Vec::new();
        let n = write_csv(&mut buf, &[&newer, &older]).unwrap();
        assert_eq!(n, 2);
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "id,date,description,category,amount,account,tag,type,synced");
        assert!(lines[1].starts_with("a,2025-03-01,Pay,Income,100.00"));
        assert_eq!(
            lines[2],
            "b,2025-03-02,\"Coffee, large\",Food > Coffee,-4.50,Cash,,Expense,no"
        );
    }
}
