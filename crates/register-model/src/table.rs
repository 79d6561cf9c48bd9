//! Plain-text grid used by register and register file dumps.

use std::fmt;

/// Row-oriented text table framed with `+`, `-` and `|`.
#[derive(Debug, Clone, Default)]
pub(crate) struct TextTable {
    rows: Vec<Vec<String>>,
    current: Vec<String>,
}

impl TextTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, cell: impl Into<String>) {
        self.current.push(cell.into());
    }

    pub(crate) fn end_row(&mut self) {
        self.rows.push(std::mem::take(&mut self.current));
    }

    fn column_widths(&self) -> Vec<usize> {
        let columns = self.rows.iter().map(Vec::len).max().unwrap_or(0);
        (0..columns)
            .map(|column| {
                self.rows
                    .iter()
                    .filter_map(|row| row.get(column))
                    .map(|cell| cell.chars().count())
                    .max()
                    .unwrap_or(0)
            })
            .collect()
    }
}

fn write_rule(f: &mut fmt::Formatter<'_>, widths: &[usize]) -> fmt::Result {
    f.write_str("+")?;
    for width in widths {
        write!(f, "{}+", "-".repeat(*width))?;
    }
    writeln!(f)
}

impl fmt::Display for TextTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths = self.column_widths();
        if widths.is_empty() {
            return Ok(());
        }
        write_rule(f, &widths)?;
        for row in &self.rows {
            f.write_str("|")?;
            for (column, &width) in widths.iter().enumerate() {
                let cell = row.get(column).map_or("", String::as_str);
                write!(f, "{cell:<width$}|")?;
            }
            writeln!(f)?;
            write_rule(f, &widths)?;
        }
        Ok(())
    }
}
