use comfy_table::{Cell, Table};

use crate::error::Result;
use crate::models::Category;

use super::open_state;

pub fn list() -> Result<()> {
    let (_conn, state, _settings) = open_state()?;
    println!("{}", format_categories(&state.master.categories));
    Ok(())
}

pub fn format_categories(categories: &[Category]) -> String {
    if categories.is_empty() {
        return "No categories found.".to_string();
    }
    let mut table = Table::new();
    table.set_header(vec!["Category", "Main", "Sub", "Type"]);
    for c in categories {
        table.add_row(vec![
            Cell::new(&c.display),
            Cell::new(&c.main),
            Cell::new(c.sub.as_deref().unwrap_or("")),
            Cell::new(c.kind().as_str()),
        ]);
    }
    format!("Categories ({})\n{table}", categories.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_categories_shows_inferred_type() {
        let cats = vec![
            Category::from_parts("Income", Some("Salary")),
            Category::from_parts("Food", Some("Groceries")),
        ];
        let out = format_categories(&cats);
        assert!(out.contains("Categories (2)"));
        assert!(out.contains("Income > Salary"));
        assert!(out.contains("Expense"));
    }
}
