//! Head/tail windowing over rendered dataframe tables.
//!
//! The document is parsed into a header block and `</tr>`-delimited row
//! fragments first; the two views are then assembled from those parts. The
//! joins are asymmetric: the head view closes fragments with
//! `</tr>`, the tail view opens them with `<tr>` and lists them newest-first.
//! Browser code renders both shapes as-is.

use crate::errors::ExplorerError;

pub const DEFAULT_WINDOW_ROWS: usize = 25;

const THEAD_CLOSE: &str = "</thead>";
const TBODY_OPEN: &str = "<tbody>";
const TBODY_CLOSE: &str = "</tbody>";
const TR_OPEN: &str = "<tr>";
const TR_CLOSE: &str = "</tr>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableParts {
    /// Everything up to and including `</thead>`.
    pub header: String,
    pub rows: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableWindow {
    pub full: String,
    pub head: String,
    pub tail: String,
}

pub fn parse(document: &str) -> Result<TableParts, ExplorerError> {
    let header_end = document
        .find(THEAD_CLOSE)
        .ok_or(ExplorerError::MalformedDocument("missing </thead>"))?
        + THEAD_CLOSE.len();
    let (header, remainder) = document.split_at(header_end);

    let remainder = remainder.replace(TBODY_OPEN, "");
    let body_end = remainder
        .find(TBODY_CLOSE)
        .ok_or(ExplorerError::MalformedDocument("missing </tbody>"))?;
    let body = &remainder[..body_end];

    let mut rows: Vec<String> = body.split(TR_CLOSE).map(str::to_string).collect();
    // Text after the final </tr> is layout whitespace, not a row.
    if rows.last().is_some_and(|last| last.trim().is_empty()) {
        rows.pop();
    }

    Ok(TableParts {
        header: header.to_string(),
        rows,
    })
}

impl TableParts {
    pub fn head(&self, rows: usize) -> String {
        let take = rows.min(self.rows.len());
        format!(
            "{}{}{TR_CLOSE}{TBODY_CLOSE}",
            self.header,
            self.rows[..take].join(TR_CLOSE)
        )
    }

    pub fn tail(&self, rows: usize) -> String {
        let start = self.rows.len().saturating_sub(rows);
        let fragments: Vec<&str> = self.rows[start..].iter().rev().map(String::as_str).collect();
        format!(
            "{}{TR_OPEN}{}{TBODY_CLOSE}",
            self.header,
            fragments.join(TR_OPEN)
        )
    }
}

pub fn window(document: &str, rows: usize) -> Result<TableWindow, ExplorerError> {
    let parts = parse(document)?;
    Ok(TableWindow {
        full: document.to_string(),
        head: parts.head(rows),
        tail: parts.tail(rows),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "<table><thead><tr><th>i</th></tr></thead>";

    fn document(rows: usize) -> String {
        let body: String = (1..=rows).map(|i| format!("<tr><td>{i}</td></tr>")).collect();
        format!("{HEADER}<tbody>{body}</tbody></table>")
    }

    #[test]
    fn head_keeps_first_rows_in_order() {
        let window = window(&document(5), 2).expect("window");
        assert_eq!(
            window.head,
            format!("{HEADER}<tr><td>1</td></tr><tr><td>2</td></tr></tbody>")
        );
    }

    #[test]
    fn tail_keeps_last_rows_reversed_with_open_tag_join() {
        let window = window(&document(5), 2).expect("window");
        assert_eq!(
            window.tail,
            format!("{HEADER}<tr><tr><td>5</td><tr><tr><td>4</td></tbody>")
        );
    }

    #[test]
    fn full_is_the_untouched_document() {
        let doc = document(3);
        assert_eq!(window(&doc, 1).expect("window").full, doc);
    }

    #[test]
    fn oversized_window_returns_every_row() {
        let parts = parse(&document(3)).expect("parse");
        assert_eq!(parts.rows.len(), 3);
        assert_eq!(
            parts.head(25),
            format!("{HEADER}<tr><td>1</td></tr><tr><td>2</td></tr><tr><td>3</td></tr></tbody>")
        );
        assert_eq!(
            parts.tail(25),
            format!("{HEADER}<tr><tr><td>3</td><tr><tr><td>2</td><tr><tr><td>1</td></tbody>")
        );
    }

    #[test]
    fn zero_rows_yields_empty_views() {
        let parts = parse(&document(3)).expect("parse");
        assert_eq!(parts.head(0), format!("{HEADER}</tr></tbody>"));
        assert_eq!(parts.tail(0), format!("{HEADER}<tr></tbody>"));
    }

    #[test]
    fn dataframe_layout_with_newlines() {
        let doc = "<table border=\"1\" class=\"dataframe\">\n  <thead>\n    <tr><th></th><th>PC1</th></tr>\n  </thead>\n  <tbody>\n    <tr><th>0</th><td>a</td></tr>\n    <tr><th>1</th><td>b</td></tr>\n  </tbody>\n</table>";
        let parts = parse(doc).expect("parse");
        assert!(parts.header.ends_with("</thead>"));
        assert_eq!(parts.rows.len(), 2);
        assert_eq!(parts.rows[0], "\n  \n    <tr><th>0</th><td>a</td>");
        assert_eq!(parts.rows[1], "\n    <tr><th>1</th><td>b</td>");
    }

    #[test]
    fn missing_markers_are_rejected() {
        assert!(matches!(
            parse("<table><tbody><tr><td>1</td></tr></tbody></table>"),
            Err(ExplorerError::MalformedDocument(_))
        ));
        assert!(matches!(
            parse(&format!("{HEADER}<tbody><tr><td>1</td></tr></table>")),
            Err(ExplorerError::MalformedDocument(_))
        ));
    }
}
