//! Table detection over positioned text runs.
//!
//! pdfium gives us text segments with bounding boxes but no notion of a
//! table. Lab reports lay results out in aligned columns, so a table here is
//! a run of at least two consecutive lines that split into the same number
//! (≥ 2) of cells whose horizontal extents line up.
//!
//! Everything in this module is pure geometry so it can be tested without a
//! PDF library.

/// A piece of text with its bounding box in PDF user space (y grows upwards).
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl TextRun {
    pub fn new(text: impl Into<String>, left: f32, bottom: f32, right: f32, top: f32) -> Self {
        Self {
            text: text.into(),
            left,
            right,
            top,
            bottom,
        }
    }

    fn centre_y(&self) -> f32 {
        (self.top + self.bottom) / 2.0
    }

    fn height(&self) -> f32 {
        (self.top - self.bottom).abs()
    }
}

/// Rows of cell strings, top to bottom.
pub type Table = Vec<Vec<String>>;

#[derive(Debug)]
struct Cell {
    text: String,
    left: f32,
    right: f32,
}

/// Detect column-aligned tables among `runs`.
///
/// `column_gap` is the minimum horizontal whitespace (points) between two
/// runs for them to count as separate cells.
pub fn detect_tables(runs: &[TextRun], column_gap: f32) -> Vec<Table> {
    let lines = group_lines(runs);
    let rows: Vec<Vec<Cell>> = lines.iter().map(|l| split_cells(l, column_gap)).collect();

    let mut tables = Vec::new();
    let mut block: Vec<&Vec<Cell>> = Vec::new();
    let mut columns: Vec<(f32, f32)> = Vec::new();

    for row in &rows {
        let fits = !block.is_empty()
            && row.len() == columns.len()
            && row
                .iter()
                .zip(&columns)
                .all(|(cell, &(l, r))| overlaps(cell.left, cell.right, l, r, column_gap / 2.0));

        if fits {
            for (col, cell) in columns.iter_mut().zip(row) {
                col.0 = col.0.min(cell.left);
                col.1 = col.1.max(cell.right);
            }
            block.push(row);
            continue;
        }

        flush(&mut block, &mut tables);
        columns.clear();
        if row.len() >= 2 {
            columns = row.iter().map(|c| (c.left, c.right)).collect();
            block.push(row);
        }
    }
    flush(&mut block, &mut tables);

    tables
}

/// Flatten a table into tab-separated rows joined by newlines.
pub fn flatten_table(table: &Table) -> String {
    table
        .iter()
        .map(|row| row.join("\t"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn flush(block: &mut Vec<&Vec<Cell>>, tables: &mut Vec<Table>) {
    if block.len() >= 2 {
        tables.push(
            block
                .iter()
                .map(|row| row.iter().map(|c| c.text.clone()).collect())
                .collect(),
        );
    }
    block.clear();
}

fn overlaps(a_left: f32, a_right: f32, b_left: f32, b_right: f32, slack: f32) -> bool {
    a_left <= b_right + slack && a_right >= b_left - slack
}

/// Group runs into lines, top of the page first.
fn group_lines(runs: &[TextRun]) -> Vec<Vec<&TextRun>> {
    let mut sorted: Vec<&TextRun> = runs.iter().filter(|r| !r.text.trim().is_empty()).collect();
    sorted.sort_by(|a, b| {
        b.centre_y()
            .partial_cmp(&a.centre_y())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.left.partial_cmp(&b.left).unwrap_or(std::cmp::Ordering::Equal))
    });

    let mut lines: Vec<Vec<&TextRun>> = Vec::new();
    for run in sorted {
        let joins = lines.last().is_some_and(|line| {
            let anchor = line[0];
            let tolerance = (anchor.height().min(run.height()) / 2.0).max(1.0);
            (anchor.centre_y() - run.centre_y()).abs() <= tolerance
        });
        match lines.last_mut() {
            Some(line) if joins => line.push(run),
            _ => lines.push(vec![run]),
        }
    }

    for line in &mut lines {
        line.sort_by(|a, b| a.left.partial_cmp(&b.left).unwrap_or(std::cmp::Ordering::Equal));
    }
    lines
}

/// Merge runs on one line into cells separated by gaps of at least `column_gap`.
fn split_cells(line: &[&TextRun], column_gap: f32) -> Vec<Cell> {
    let mut cells: Vec<Cell> = Vec::new();
    for run in line {
        let text = run.text.trim();
        match cells.last_mut() {
            Some(cell) if run.left - cell.right < column_gap => {
                if run.left - cell.right > 0.5 {
                    cell.text.push(' ');
                }
                cell.text.push_str(text);
                cell.right = cell.right.max(run.right);
            }
            _ => cells.push(Cell {
                text: text.to_string(),
                left: run.left,
                right: run.right,
            }),
        }
    }
    cells
}
