//! Column-oriented table normalization for ragged spreadsheet grids.
//!
//! The values endpoint hands back loosely-typed rows that can be shorter
//! than the header. `Table::from_grid` turns that into columns of equal
//! length with explicit sentinels, so downstream aggregation never crashes
//! on dirty data: a short row becomes [`Cell::Absent`] padding, a cell that
//! fails numeric coercion becomes [`Cell::NotANumber`]. Nothing in this
//! module performs I/O or raises — malformed input degrades into sentinels.

/// Unprocessed grid from a spreadsheet read: first row is the header, data
/// rows may be ragged-short.
pub type RawGrid = Vec<Vec<String>>;

/// A typed cell. `Absent` marks a cell missing from a short source row and
/// is distinct from `Text("")`, an empty string the source actually supplied.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Absent,
    NotANumber,
}

impl Cell {
    /// The numeric value, if this cell holds one.
    pub fn number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The text value, if this cell holds one.
    pub fn text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Cell::Absent)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Column {
    name: String,
    cells: Vec<Cell>,
}

/// A normalized table: ordered, lower-case-named columns of equal length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    /// Normalize a raw grid.
    ///
    /// The first row (lower-cased) names the columns and fixes the width.
    /// Short rows are right-padded with [`Cell::Absent`]; rows longer than
    /// the header lose their extra cells (lossy, logged). Rows that are
    /// entirely absent are kept so row indices still line up with the
    /// source. An empty grid yields an empty table, not an error.
    ///
    /// Duplicate header names after lower-casing: the last occurrence wins,
    /// both for position and for cell content.
    pub fn from_grid(grid: &RawGrid) -> Table {
        let Some(header) = grid.first() else {
            return Table::default();
        };
        let width = header.len();

        let mut table = Table::default();
        for (idx, raw_name) in header.iter().enumerate() {
            let cells = grid[1..]
                .iter()
                .map(|row| match row.get(idx) {
                    Some(value) => Cell::Text(value.clone()),
                    None => Cell::Absent,
                })
                .collect();
            table.set_column(raw_name.to_lowercase(), cells);
        }

        let overlong = grid[1..].iter().filter(|row| row.len() > width).count();
        if overlong > 0 {
            log::debug!(
                "dropped trailing cells from {} row(s) wider than the {}-column header",
                overlong,
                width
            );
        }

        table
    }

    /// Number of data rows (header excluded). Every column has this length.
    pub fn row_count(&self) -> usize {
        self.columns.first().map(|c| c.cells.len()).unwrap_or(0)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column names in table order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Cells of the named column, in row order.
    pub fn column(&self, name: &str) -> Option<&[Cell]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.cells.as_slice())
    }

    /// Coerce every cell of the named column to a number.
    ///
    /// Parseable, finite text becomes [`Cell::Number`]; everything else —
    /// absent cells, empty strings, non-numeric text — becomes
    /// [`Cell::NotANumber`]. No zero-substitution happens here; filling
    /// gaps with zeros is a presentation decision (see `insights`).
    /// An unknown column name is a no-op.
    pub fn coerce_numeric(&mut self, name: &str) {
        let Some(column) = self.columns.iter_mut().find(|c| c.name == name) else {
            return;
        };
        for cell in &mut column.cells {
            let coerced = match &*cell {
                Cell::Number(n) => Cell::Number(*n),
                Cell::Text(s) => match parse_number(s) {
                    Some(n) => Cell::Number(n),
                    None => Cell::NotANumber,
                },
                Cell::Absent | Cell::NotANumber => Cell::NotANumber,
            };
            *cell = coerced;
        }
    }

    /// Append a column computed element-wise as `minuend - subtrahend`.
    ///
    /// Any position where either input is not a number propagates
    /// [`Cell::NotANumber`] — never a silent zero. A missing source column
    /// behaves as all-`NotANumber`. If the new name already exists, the
    /// derived column replaces it (last-wins identity).
    pub fn derive_difference(&mut self, minuend: &str, subtrahend: &str, new_name: &str) {
        let rows = self.row_count();
        let cells: Vec<Cell> = (0..rows)
            .map(|i| {
                let a = self.column(minuend).and_then(|c| c[i].number());
                let b = self.column(subtrahend).and_then(|c| c[i].number());
                match (a, b) {
                    (Some(a), Some(b)) => Cell::Number(a - b),
                    _ => Cell::NotANumber,
                }
            })
            .collect();
        self.set_column(new_name.to_lowercase(), cells);
    }

    /// Sum of the numeric cells in a column; non-numbers are skipped.
    pub fn sum_numeric(&self, name: &str) -> f64 {
        self.column(name)
            .map(|cells| cells.iter().filter_map(Cell::number).sum())
            .unwrap_or(0.0)
    }

    /// Insert or replace a column. A replaced column moves to the end,
    /// which is what gives duplicate headers last-occurrence identity.
    fn set_column(&mut self, name: String, cells: Vec<Cell>) {
        self.columns.retain(|c| c.name != name);
        self.columns.push(Column { name, cells });
    }
}

fn parse_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}
