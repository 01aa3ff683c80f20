use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use super::error::ExportError;
use super::grid::{ExportGrid, cell_reference};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DataFormat {
    Csv,
    Json,
}

impl DataFormat {
    pub fn extension(self) -> &'static str {
        match self {
            DataFormat::Csv => "csv",
            DataFormat::Json => "json",
        }
    }
}

pub fn detect_data_format(path: &str, fallback: DataFormat) -> DataFormat {
    let lower = path.to_ascii_lowercase();
    if lower.ends_with(".json") {
        DataFormat::Json
    } else if lower.ends_with(".csv") {
        DataFormat::Csv
    } else {
        fallback
    }
}

/// Destination for a finished table. Cells may arrive in any order; nothing
/// reaches disk before `persist`.
pub trait TableSink {
    fn begin_sheet(&mut self, name: &str) -> Result<(), ExportError>;
    fn write_cell(&mut self, row: usize, col: usize, value: &str) -> Result<(), ExportError>;
    fn persist(&mut self) -> Result<PathBuf, ExportError>;
}

/// Cells collected per sheet, grown on demand.
#[derive(Debug, Default)]
struct SheetBuffer {
    name: Option<String>,
    rows: Vec<Vec<String>>,
}

impl SheetBuffer {
    fn begin(&mut self, name: &str) {
        self.name = Some(name.to_string());
        self.rows.clear();
    }

    fn put(&mut self, row: usize, col: usize, value: &str) -> Result<(), ExportError> {
        if self.name.is_none() {
            return Err(ExportError::NoSheet);
        }
        if self.rows.len() <= row {
            self.rows.resize_with(row + 1, Vec::new);
        }
        let cells = &mut self.rows[row];
        if cells.len() <= col {
            cells.resize(col + 1, String::new());
        }
        cells[col] = value.to_string();
        Ok(())
    }

    /// Rows padded to a common width so every record has the same field count.
    fn dense_rows(&self) -> Vec<Vec<String>> {
        let width = self.rows.iter().map(Vec::len).max().unwrap_or(0);
        self.rows
            .iter()
            .map(|row| {
                let mut row = row.clone();
                row.resize(width, String::new());
                row
            })
            .collect()
    }
}

/// Plain CSV. The sheet name is accepted but has nowhere to go.
pub struct CsvSink {
    path: PathBuf,
    sheet: SheetBuffer,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sheet: SheetBuffer::default(),
        }
    }
}

impl TableSink for CsvSink {
    fn begin_sheet(&mut self, name: &str) -> Result<(), ExportError> {
        self.sheet.begin(name);
        Ok(())
    }

    fn write_cell(&mut self, row: usize, col: usize, value: &str) -> Result<(), ExportError> {
        self.sheet.put(row, col, value)
    }

    fn persist(&mut self) -> Result<PathBuf, ExportError> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(false)
            .from_path(&self.path)?;
        for row in self.sheet.dense_rows() {
            writer.write_record(&row)?;
        }
        writer.flush().map_err(|source| ExportError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(self.path.clone())
    }
}

#[derive(Serialize)]
struct JsonCell<'a> {
    #[serde(rename = "ref")]
    reference: String,
    row: usize,
    col: usize,
    value: &'a str,
}

#[derive(Serialize)]
struct JsonSheet<'a> {
    sheet: &'a str,
    rows: usize,
    cols: usize,
    cells: Vec<JsonCell<'a>>,
}

/// Writes the sheet as a list of non-empty cells keyed by `A1` references.
pub struct JsonSink {
    path: PathBuf,
    sheet: SheetBuffer,
}

impl JsonSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sheet: SheetBuffer::default(),
        }
    }
}

impl TableSink for JsonSink {
    fn begin_sheet(&mut self, name: &str) -> Result<(), ExportError> {
        self.sheet.begin(name);
        Ok(())
    }

    fn write_cell(&mut self, row: usize, col: usize, value: &str) -> Result<(), ExportError> {
        self.sheet.put(row, col, value)
    }

    fn persist(&mut self) -> Result<PathBuf, ExportError> {
        let rows = self.sheet.dense_rows();
        let mut cells = Vec::new();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                if !value.is_empty() {
                    cells.push(JsonCell {
                        reference: cell_reference(r, c),
                        row: r,
                        col: c,
                        value,
                    });
                }
            }
        }
        let doc = JsonSheet {
            sheet: self.sheet.name.as_deref().unwrap_or_default(),
            rows: rows.len(),
            cols: rows.first().map(Vec::len).unwrap_or(0),
            cells,
        };

        let io_err = |source: std::io::Error| ExportError::Io {
            path: self.path.clone(),
            source,
        };
        let file = File::create(&self.path).map_err(io_err)?;
        let mut out = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut out, &doc)?;
        out.write_all(b"\n").map_err(io_err)?;
        out.flush().map_err(io_err)?;
        Ok(self.path.clone())
    }
}

pub enum OutputSink {
    Csv(CsvSink),
    Json(JsonSink),
}

impl OutputSink {
    pub fn new(output_path: &Path, format: DataFormat) -> Self {
        match format {
            DataFormat::Csv => OutputSink::Csv(CsvSink::new(output_path)),
            DataFormat::Json => OutputSink::Json(JsonSink::new(output_path)),
        }
    }
}

impl TableSink for OutputSink {
    fn begin_sheet(&mut self, name: &str) -> Result<(), ExportError> {
        match self {
            OutputSink::Csv(sink) => sink.begin_sheet(name),
            OutputSink::Json(sink) => sink.begin_sheet(name),
        }
    }

    fn write_cell(&mut self, row: usize, col: usize, value: &str) -> Result<(), ExportError> {
        match self {
            OutputSink::Csv(sink) => sink.write_cell(row, col, value),
            OutputSink::Json(sink) => sink.write_cell(row, col, value),
        }
    }

    fn persist(&mut self) -> Result<PathBuf, ExportError> {
        match self {
            OutputSink::Csv(sink) => sink.persist(),
            OutputSink::Json(sink) => sink.persist(),
        }
    }
}

/// Hand the whole grid to `sink` and persist it.
pub fn export_grid(
    grid: &ExportGrid,
    sheet: &str,
    sink: &mut dyn TableSink,
) -> Result<PathBuf, ExportError> {
    debug!(sheet, rows = grid.rows(), cols = grid.cols(), "exporting sheet");
    sink.begin_sheet(sheet)?;
    for (row, cells) in grid.iter_rows().enumerate() {
        for (col, value) in cells.iter().enumerate() {
            sink.write_cell(row, col, value)?;
        }
    }
    sink.persist()
}
