//! Row windows for chunked raster sweeps
//!
//! Per-pixel detectors need no neighbourhood, so a raster is split into
//! contiguous bands of whole rows without overlap. A caller driving a sweep
//! window by window can stop between windows.

/// A contiguous band of rows within a raster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowWindow {
    /// First row of the window
    pub row_start: usize,
    /// Number of rows in the window
    pub rows: usize,
}

impl RowWindow {
    pub fn new(row_start: usize, rows: usize) -> Self {
        Self { row_start, rows }
    }

    /// Window covering every row of a raster
    pub fn full(rows: usize) -> Self {
        Self::new(0, rows)
    }

    /// One past the last row of the window
    pub fn row_end(&self) -> usize {
        self.row_start + self.rows
    }

    pub fn contains_row(&self, row: usize) -> bool {
        row >= self.row_start && row < self.row_end()
    }
}

/// Iterator over the row windows of a raster with `total_rows` rows
#[derive(Debug, Clone)]
pub struct RowWindows {
    total_rows: usize,
    window_rows: usize,
    next_row: usize,
}

impl RowWindows {
    /// Split `total_rows` into windows of at most `window_rows` rows.
    /// A zero window size is treated as one row per window.
    pub fn new(total_rows: usize, window_rows: usize) -> Self {
        Self {
            total_rows,
            window_rows: window_rows.max(1),
            next_row: 0,
        }
    }

    /// Total number of windows
    pub fn count_windows(&self) -> usize {
        self.total_rows.div_ceil(self.window_rows)
    }
}

impl Iterator for RowWindows {
    type Item = RowWindow;

    fn next(&mut self) -> Option<RowWindow> {
        if self.next_row >= self.total_rows {
            return None;
        }
        let rows = self.window_rows.min(self.total_rows - self.next_row);
        let window = RowWindow::new(self.next_row, rows);
        self.next_row += rows;
        Some(window)
    }
}
