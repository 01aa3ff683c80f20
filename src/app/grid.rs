use super::catalog::Product;
use super::schema::Schema;

pub const NAME_CAPTION: &str = "Name";
pub const CHARACTERISTICS_CAPTION: &str = "Characteristics";

/// Caption row, then the schema header row, then one row per product.
pub const HEADER_ROWS: usize = 2;
/// Product names sit in the first column.
pub const HEADER_COLS: usize = 1;

/// Dense table of strings addressed by zero-based `(row, col)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportGrid {
    rows: usize,
    cols: usize,
    cells: Vec<String>,
}

impl ExportGrid {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![String::new(); rows * cols],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn set(&mut self, row: usize, col: usize, value: impl Into<String>) {
        if let Some(idx) = self.index(row, col) {
            self.cells[idx] = value.into();
        }
    }

    pub fn row(&self, row: usize) -> &[String] {
        if row >= self.rows {
            return &[];
        }
        &self.cells[row * self.cols..(row + 1) * self.cols]
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[String]> {
        (0..self.rows).map(|row| self.row(row))
    }

    fn index(&self, row: usize, col: usize) -> Option<usize> {
        (row < self.rows && col < self.cols).then(|| row * self.cols + col)
    }
}

/// Project every product onto the schema. Missing characteristics stay blank.
pub fn assemble(products: &[Product], schema: &Schema) -> ExportGrid {
    let cols = HEADER_COLS + schema.len().max(1);
    let mut grid = ExportGrid::new(HEADER_ROWS + products.len(), cols);

    grid.set(0, 0, NAME_CAPTION);
    grid.set(0, HEADER_COLS, CHARACTERISTICS_CAPTION);

    for (key_idx, key) in schema.keys().iter().enumerate() {
        grid.set(1, HEADER_COLS + key_idx, key.as_str());
    }

    for (product_idx, product) in products.iter().enumerate() {
        let row = HEADER_ROWS + product_idx;
        grid.set(row, 0, product.name.as_str());
        for (key_idx, key) in schema.keys().iter().enumerate() {
            if let Some(value) = product.characteristics.get(key) {
                grid.set(row, HEADER_COLS + key_idx, value.as_str());
            }
        }
    }

    grid
}

/// Spreadsheet column label for a zero-based index: 0 -> A, 25 -> Z, 26 -> AA.
pub fn column_label(col: usize) -> String {
    let mut n = col + 1;
    let mut label = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        label.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    label.reverse();
    String::from_utf8_lossy(&label).into_owned()
}

/// `A1`-style reference for a zero-based `(row, col)`.
pub fn cell_reference(row: usize, col: usize) -> String {
    format!("{}{}", column_label(col), row + 1)
}
