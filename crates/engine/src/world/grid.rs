use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Cell value for an empty grid position.
pub const EMPTY_CELL: i32 = -1;

/// One authored layer: a rectangular table of tile codes, row-major, with
/// row 0 at the top of the level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerGrid {
    width: usize,
    height: usize,
    cells: Vec<i32>,
}

#[derive(Debug, Error)]
pub enum GridError {
    #[error("cell count mismatch: expected {expected}, got {actual}")]
    CellCountMismatch { expected: usize, actual: usize },
    #[error("grid has no rows")]
    Empty,
    #[error("row {row} has {actual} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("row {row}, column {column}: '{value}' is not an integer tile code")]
    InvalidCell {
        row: usize,
        column: usize,
        value: String,
    },
    #[error("failed to read grid file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("grid file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<GridError>,
    },
}

impl LayerGrid {
    pub fn new(width: usize, height: usize, cells: Vec<i32>) -> Result<Self, GridError> {
        let expected = width * height;
        let actual = cells.len();
        if expected != actual {
            return Err(GridError::CellCountMismatch { expected, actual });
        }
        Ok(Self {
            width,
            height,
            cells,
        })
    }

    pub fn empty(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![EMPTY_CELL; width * height],
        }
    }

    /// Parses comma separated rows. Blank lines are skipped and cells are
    /// trimmed, so trailing newlines and `\r\n` files load unchanged.
    pub fn parse_csv(raw: &str) -> Result<Self, GridError> {
        let mut width: Option<usize> = None;
        let mut cells = Vec::<i32>::new();
        let mut height = 0usize;

        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut row_len = 0usize;
            for (column, value) in line.split(',').enumerate() {
                let value = value.trim();
                let code = value.parse::<i32>().map_err(|_| GridError::InvalidCell {
                    row: height,
                    column,
                    value: value.to_string(),
                })?;
                cells.push(code);
                row_len += 1;
            }
            match width {
                None => width = Some(row_len),
                Some(expected) if expected != row_len => {
                    return Err(GridError::RaggedRow {
                        row: height,
                        expected,
                        actual: row_len,
                    })
                }
                Some(_) => {}
            }
            height += 1;
        }

        let Some(width) = width else {
            return Err(GridError::Empty);
        };
        Self::new(width, height, cells)
    }

    pub fn load_csv(path: &Path) -> Result<Self, GridError> {
        let raw = fs::read_to_string(path).map_err(|source| GridError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_csv(&raw).map_err(|source| GridError::Parse {
            path: path.to_path_buf(),
            source: Box::new(source),
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn cell(&self, column: usize, row: usize) -> Option<i32> {
        if column >= self.width || row >= self.height {
            return None;
        }
        self.cells.get(row * self.width + column).copied()
    }

    /// Yields `(column, row, code)` for every cell, empty ones included.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, i32)> + '_ {
        self.cells.iter().enumerate().map(move |(index, code)| {
            let column = index % self.width.max(1);
            let row = index / self.width.max(1);
            (column, row, *code)
        })
    }
}
