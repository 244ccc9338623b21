//! Fixed-width bordered text tables.
//!
//! ```text
//! +---------------------------------------------+
//! | Name                 |   Status | Exec Time |
//! +---------------------------------------------+
//! | vgauth_check_service |   Passed | 00:03:02  |
//! +---------------------------------------------+
//! ```
//!
//! Each column is exactly as wide as its longest line (header included when
//! a header row is shown). A cell may hold several lines; they are stacked
//! as sub-rows with blank padding in the other columns. A border line opens
//! the table and closes every row.

/// Horizontal alignment of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    #[default]
    Left,
    Right,
}

/// A column definition.
#[derive(Debug, Clone)]
pub struct Column {
    /// Header text
    pub header: String,
    /// Alignment of header and cells
    pub align: Align,
}

impl Column {
    /// A left-aligned column.
    pub fn left(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            align: Align::Left,
        }
    }

    /// A right-aligned column.
    pub fn right(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            align: Align::Right,
        }
    }
}

/// One cell: its pre-wrapped lines.
pub type Cell = Vec<String>;

/// A text table built from rows of pre-wrapped cells.
#[derive(Debug, Clone)]
pub struct TextTable {
    columns: Vec<Column>,
    rows: Vec<Vec<Cell>>,
    show_header: bool,
}

impl TextTable {
    /// Creates a table with a header row.
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            show_header: true,
        }
    }

    /// Creates a two-column table without a header row, one row per
    /// (name, lines) pair in the given order.
    pub fn key_value<I>(record: I) -> Self
    where
        I: IntoIterator<Item = (String, Cell)>,
    {
        let mut table = Self {
            columns: vec![Column::left(""), Column::left("")],
            rows: Vec::new(),
            show_header: false,
        };
        for (name, lines) in record {
            table.push_row(vec![vec![name], lines]);
        }
        table
    }

    /// Appends a row. Missing cells render blank, extra cells are dropped.
    pub fn push_row(&mut self, mut cells: Vec<Cell>) {
        cells.resize_with(self.columns.len(), Vec::new);
        for cell in &mut cells {
            if cell.is_empty() {
                cell.push(String::new());
            }
        }
        self.rows.push(cells);
    }

    /// Appends a row of single-line cells.
    pub fn push_line_row<S: Into<String>>(&mut self, cells: Vec<S>) {
        self.push_row(cells.into_iter().map(|c| vec![c.into()]).collect());
    }

    /// Number of content rows, header included.
    pub fn content_rows(&self) -> usize {
        self.rows.len() + usize::from(self.show_header)
    }

    /// Width of each column.
    pub fn column_widths(&self) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                let header = if self.show_header {
                    text_width(&column.header)
                } else {
                    0
                };
                self.rows
                    .iter()
                    .flat_map(|row| row[idx].iter())
                    .map(|line| text_width(line))
                    .fold(header, usize::max)
            })
            .collect()
    }

    /// Visible width of every line of the rendered table.
    pub fn total_width(&self) -> usize {
        let widths = self.column_widths();
        widths.iter().sum::<usize>() + 3 * widths.len() + 1
    }

    /// Renders the table. Every line ends with a newline.
    pub fn render(&self) -> String {
        let widths = self.column_widths();
        let border = format!("+{}+\n", "-".repeat(self.total_width() - 2));

        let mut out = String::new();
        out.push_str(&border);

        if self.show_header {
            let header: Vec<Cell> = self
                .columns
                .iter()
                .map(|c| vec![c.header.clone()])
                .collect();
            self.render_row(&mut out, &header, &widths);
            out.push_str(&border);
        }

        for row in &self.rows {
            self.render_row(&mut out, row, &widths);
            out.push_str(&border);
        }

        out
    }

    fn render_row(&self, out: &mut String, row: &[Cell], widths: &[usize]) {
        let height = row.iter().map(Vec::len).max().unwrap_or(1);
        for line_idx in 0..height {
            let parts: Vec<String> = row
                .iter()
                .zip(&self.columns)
                .zip(widths)
                .map(|((cell, column), width)| {
                    let text = cell.get(line_idx).map(String::as_str).unwrap_or("");
                    pad(text, *width, column.align)
                })
                .collect();
            out.push_str("| ");
            out.push_str(&parts.join(" | "));
            out.push_str(" |\n");
        }
    }
}

fn text_width(text: &str) -> usize {
    text.chars().count()
}

fn pad(text: &str, width: usize, align: Align) -> String {
    match align {
        Align::Left => format!("{:<width$}", text, width = width),
        Align::Right => format!("{:>width$}", text, width = width),
    }
}

/// Greedy word wrap at `width` characters.
///
/// Whitespace runs separate words; a word longer than `width` is broken
/// across lines. Text that fits is returned as a single line.
pub fn wrap_words(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    if text_width(text) <= width {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        loop {
            let current_len = text_width(&current);
            let needed = if current.is_empty() {
                word.len()
            } else {
                current_len + 1 + word.len()
            };

            if needed <= width {
                if !current.is_empty() {
                    current.push(' ');
                }
                current.extend(word.iter());
                break;
            }

            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
                continue;
            }

            let rest = word.split_off(width);
            lines.push(word.iter().collect());
            word = rest;
            if word.is_empty() {
                break;
            }
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}
