use std::path::Path;

use serde::Serialize;

use crate::errors::ExplorerError;
use crate::pages::escape_html;

pub const COMPONENT_COUNT: usize = 8;
pub const SUMMARY_ROWS: usize = 200;
/// Separator used when summaries are built straight from a finished task.
pub const TASK_SUMMARY_SEPARATOR: &str = " ";
/// Separator used when summaries are rebuilt from a stored CSV.
pub const STORED_SUMMARY_SEPARATOR: &str = "  ";

/// Tabular PCA output. Column 0 is the row index, columns 1.. are the
/// ranked components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentSummary {
    pub name: String,
    pub top: String,
    pub bottom: String,
}

impl ResultTable {
    pub fn from_csv_reader<R: std::io::Read>(reader: R) -> Result<Self, ExplorerError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(reader);
        let columns = reader
            .headers()
            .map_err(|err| ExplorerError::InvalidTable(format!("csv header: {err}")))?
            .iter()
            .map(str::to_string)
            .collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record =
                record.map_err(|err| ExplorerError::InvalidTable(format!("csv record: {err}")))?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(Self { columns, rows })
    }

    pub async fn load_csv(path: &Path) -> Result<Self, ExplorerError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(ExplorerError::NotFound(path.display().to_string()));
            }
            Err(err) => return Err(err.into()),
        };
        Self::from_csv_reader(bytes.as_slice())
    }

    fn cells(&self, index: usize) -> Vec<&str> {
        self.rows
            .iter()
            .map(|row| row.get(index).map(String::as_str).unwrap_or_default())
            .collect()
    }

    /// One summary per principal component: the first `SUMMARY_ROWS` cells
    /// in order, and the last `SUMMARY_ROWS` cells from the bottom up.
    pub fn component_summaries(
        &self,
        separator: &str,
    ) -> Result<Vec<ComponentSummary>, ExplorerError> {
        if self.columns.len() <= COMPONENT_COUNT {
            return Err(ExplorerError::InvalidTable(format!(
                "expected an index plus {COMPONENT_COUNT} component columns, found {} columns",
                self.columns.len()
            )));
        }

        let mut components = Vec::with_capacity(COMPONENT_COUNT);
        for index in 1..=COMPONENT_COUNT {
            let cells = self.cells(index);
            let top: Vec<&str> = cells.iter().take(SUMMARY_ROWS).copied().collect();
            let bottom: Vec<&str> = cells.iter().rev().take(SUMMARY_ROWS).copied().collect();
            components.push(ComponentSummary {
                name: format!("PC{index}"),
                top: top.join(separator),
                bottom: bottom.join(separator),
            });
        }
        Ok(components)
    }

    /// Render in the dataframe layout (`thead` then `tbody`, index cells as
    /// `th`) that the table windower reads back.
    pub fn to_html(&self) -> String {
        let mut html = String::from("<table border=\"1\" class=\"dataframe\">\n  <thead>\n    <tr style=\"text-align: right;\">\n");
        for column in &self.columns {
            html.push_str(&format!("      <th>{}</th>\n", escape_html(column)));
        }
        html.push_str("    </tr>\n  </thead>\n  <tbody>\n");
        for row in &self.rows {
            html.push_str("    <tr>\n");
            for (position, cell) in row.iter().enumerate() {
                let tag = if position == 0 { "th" } else { "td" };
                html.push_str(&format!("      <{tag}>{}</{tag}>\n", escape_html(cell)));
            }
            html.push_str("    </tr>\n");
        }
        html.push_str("  </tbody>\n</table>");
        html
    }
}
