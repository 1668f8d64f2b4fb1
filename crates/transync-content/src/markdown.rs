//! Markdown rendering of spreadsheet tabs
//!
//! The translation prompt builder consumes spreadsheet references as one
//! Markdown document: a `##` heading per tab followed by a pipe table.

/// One tab of a spreadsheet with its used range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetTab {
    /// Tab title
    pub title: String,
    /// Cell grid, row-major
    pub rows: Vec<Vec<String>>,
}

impl SheetTab {
    /// Create tab
    #[must_use]
    pub fn new(title: impl Into<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            title: title.into(),
            rows,
        }
    }
}

/// Drop fully empty rows and trailing empty columns
///
/// Every returned row has the same width.
#[must_use]
pub fn compact_grid(rows: &[Vec<String>]) -> Vec<Vec<String>> {
    let kept: Vec<&Vec<String>> = rows
        .iter()
        .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
        .collect();

    let width = kept
        .iter()
        .filter_map(|row| row.iter().rposition(|cell| !cell.trim().is_empty()))
        .max()
        .map_or(0, |last| last + 1);

    kept.into_iter()
        .map(|row| {
            (0..width)
                .map(|i| row.get(i).map(|c| c.trim().to_string()).unwrap_or_default())
                .collect()
        })
        .collect()
}

fn escape_cell(cell: &str) -> String {
    cell.replace('|', "\\|")
        .replace("\r\n", "<br>")
        .replace('\n', "<br>")
}

fn render_row(row: &[String]) -> String {
    let cells: Vec<String> = row.iter().map(|c| escape_cell(c)).collect();
    format!("| {} |", cells.join(" | "))
}

/// Render one tab as a Markdown section
///
/// The first non-empty row is the table header. Tabs with no used cells
/// render as the heading alone.
#[must_use]
pub fn render_tab(tab: &SheetTab) -> String {
    let grid = compact_grid(&tab.rows);
    let mut out = format!("## {}\n", tab.title.trim());
    let Some((header, body)) = grid.split_first() else {
        return out;
    };

    out.push('\n');
    out.push_str(&render_row(header));
    out.push('\n');
    out.push_str(&format!("|{}", " --- |".repeat(header.len())));
    out.push('\n');
    for row in body {
        out.push_str(&render_row(row));
        out.push('\n');
    }
    out
}

/// Render every tab as a single Markdown document
#[must_use]
pub fn render_markdown(tabs: &[SheetTab]) -> String {
    tabs.iter()
        .map(render_tab)
        .collect::<Vec<_>>()
        .join("\n")
        .trim_end()
        .to_string()
}
