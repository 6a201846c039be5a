use std::collections::HashMap;

use super::{A1Range, AppendResult, SheetsApi};
use crate::error::{AppError, Result};

/// In-memory spreadsheet used by tests. Each sheet is a grid of rows.
#[derive(Default)]
pub struct MemorySheets {
    pub sheets: HashMap<String, Vec<Vec<String>>>,
    pub fail_writes: bool,
    pub calls: Vec<String>,
}

impl MemorySheets {
    pub fn with_sheet(mut self, name: &str, rows: Vec<Vec<&str>>) -> Self {
        self.sheets.insert(
            name.to_string(),
            rows.into_iter()
                .map(|r| r.into_iter().map(String::from).collect())
                .collect(),
        );
        self
    }

    pub fn row(&self, sheet: &str, row: u32) -> Vec<String> {
        self.sheets
            .get(sheet)
            .and_then(|rows| rows.get(row as usize - 1))
            .cloned()
            .unwrap_or_default()
    }

    fn check_write(&self) -> Result<()> {
        if self.fail_writes {
            Err(AppError::Sheets {
                status: 503,
                message: "unavailable".into(),
            })
        } else {
            Ok(())
        }
    }
}

impl SheetsApi for MemorySheets {
    fn get_range(&mut self, range: &str) -> Result<Vec<Vec<String>>> {
        self.calls.push(format!("get {range}"));
        let r = A1Range::parse(range)?;
        let rows = self.sheets.get(&r.sheet).cloned().unwrap_or_default();
        let start = r.start_row.unwrap_or(1) as usize - 1;
        let end = r.end_row.map(|e| e as usize).unwrap_or(rows.len()).min(rows.len());
        let mut out: Vec<Vec<String>> = rows
            .get(start..end)
            .unwrap_or_default()
            .iter()
            .map(|row| {
                let mut cells: Vec<String> = row
                    .iter()
                    .skip(r.start_col)
                    .take(r.end_col - r.start_col + 1)
                    .cloned()
                    .collect();
                while cells.last().is_some_and(|c| c.is_empty()) {
                    cells.pop();
                }
                cells
            })
            .collect();
        while out.last().is_some_and(|r| r.is_empty()) {
            out.pop();
        }
        Ok(out)
    }

    fn append_rows(&mut self, range: &str, rows: &[Vec<String>]) -> Result<AppendResult> {
        self.check_write()?;
        self.calls.push(format!("append {range}"));
        let r = A1Range::parse(range)?;
        let sheet = self.sheets.entry(r.sheet.clone()).or_default();
        let first = sheet.len() as u32 + 1;
        sheet.extend(rows.iter().cloned());
        let last = sheet.len() as u32;
        let updated_range = format!("{}!A{first}:I{last}", r.sheet);
        Ok(AppendResult {
            first_row: Some(first),
            updated_range,
        })
    }

    fn update_range(&mut self, range: &str, rows: &[Vec<String>]) -> Result<()> {
        self.check_write()?;
        self.calls.push(format!("update {range}"));
        let r = A1Range::parse(range)?;
        let start = r.start_row.unwrap_or(1) as usize - 1;
        let sheet = self.sheets.entry(r.sheet.clone()).or_default();
        for (i, row) in rows.iter().enumerate() {
            let idx = start + i;
            if sheet.len() <= idx {
                sheet.resize(idx + 1, Vec::new());
            }
            sheet[idx] = row.clone();
        }
        Ok(())
    }

    fn delete_row(&mut self, sheet: &str, row: u32) -> Result<()> {
        self.check_write()?;
        self.calls.push(format!("delete {sheet} {row}"));
        let rows = self.sheets.get_mut(sheet).ok_or_else(|| AppError::Other(sheet.into()))?;
        let idx = row as usize - 1;
        if idx < rows.len() {
            rows.remove(idx);
        }
        Ok(())
    }
}
