use std::cmp::Ordering;

use crate::parser::is_numeric_price;
use crate::types::{Column, Grade, PriceRecord};

#[derive(Debug, Clone, Copy)]
pub struct SortSpec {
    pub column: Column,
    pub reverse: bool,
}

impl SortSpec {
    pub fn apply(self, records: &mut [PriceRecord]) {
        records.sort_by(|a, b| {
            let ordering = compare_cells(a.value(self.column), b.value(self.column));
            if self.reverse {
                ordering.reverse()
            } else {
                ordering
            }
        });
    }
}

/// Numbers sort before text, blanks go last.
fn compare_cells(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (cell_key(a), cell_key(b)) {
        (CellKey::Number(x), CellKey::Number(y)) => x.total_cmp(&y),
        (CellKey::Text(x), CellKey::Text(y)) => x.cmp(y),
        (x, y) => x.rank().cmp(&y.rank()),
    }
}

enum CellKey<'a> {
    Number(f64),
    Text(&'a str),
    Blank,
}

impl CellKey<'_> {
    fn rank(&self) -> u8 {
        match self {
            CellKey::Number(_) => 0,
            CellKey::Text(_) => 1,
            CellKey::Blank => 2,
        }
    }
}

fn cell_key(value: Option<&str>) -> CellKey<'_> {
    match value.map(str::trim) {
        None | Some("") => CellKey::Blank,
        Some(s) if is_numeric_price(s) => s
            .parse::<f64>()
            .map(CellKey::Number)
            .unwrap_or(CellKey::Text(s)),
        Some(s) => CellKey::Text(s),
    }
}

/// Renders records as an aligned text table.
pub struct RecordTable<'a>(pub &'a [PriceRecord]);

impl RecordTable<'_> {
    const EMPTY: &'static str = "-";

    fn cell(record: &PriceRecord, column: Column) -> &str {
        record
            .value(column)
            .filter(|s| !s.is_empty())
            .unwrap_or(Self::EMPTY)
    }
}

impl std::fmt::Display for RecordTable<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let columns: Vec<Column> = Column::all().collect();
        let widths: Vec<usize> = columns
            .iter()
            .map(|&column| {
                self.0
                    .iter()
                    .map(|r| Self::cell(r, column).chars().count())
                    .chain(std::iter::once(column.to_string().chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let header: Vec<String> = columns
            .iter()
            .zip(&widths)
            .map(|(column, width)| format!("{:<width$}", column.to_string(), width = width))
            .collect();
        writeln!(f, "{}", header.join("  ").trim_end())?;

        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        writeln!(f, "{}", rule.join("  "))?;

        for record in self.0 {
            let line: Vec<String> = columns
                .iter()
                .zip(&widths)
                .map(|(&column, width)| match column {
                    Column::Price(_) => {
                        format!("{:>width$}", Self::cell(record, column), width = width)
                    }
                    _ => format!("{:<width$}", Self::cell(record, column), width = width),
                })
                .collect();
            writeln!(f, "{}", line.join("  ").trim_end())?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct RecordStats {
    pub total: usize,
    pub priced: usize,
    pub ungraded_total: f64,
}

impl RecordStats {
    pub fn from_records(records: &[PriceRecord]) -> RecordStats {
        RecordStats {
            total: records.len(),
            priced: records.iter().filter(|r| r.prices.has_any()).count(),
            ungraded_total: records
                .iter()
                .filter_map(|r| r.prices.get(Grade::Ungraded))
                .filter(|p| is_numeric_price(p))
                .filter_map(|p| p.parse::<f64>().ok())
                .sum(),
        }
    }
}

impl std::fmt::Display for RecordStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\nStatistics:")?;
        writeln!(f, "  Items:            {}", self.total)?;
        writeln!(f, "  Items with price: {}", self.priced)?;
        writeln!(f, "  Ungraded total:   ${:.2}", self.ungraded_total)
    }
}
