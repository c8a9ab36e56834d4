use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

use unicode_normalization::UnicodeNormalization;

use crate::errors::ExplorerError;

const RESULT_EXTENSION: &str = ".html";
/// How many trailing characters are inspected when deciding whether a name
/// already carries an extension.
const EXTENSION_LOOKBACK: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUpload {
    pub name: String,
    pub upload_path: PathBuf,
    pub result_path: PathBuf,
}

impl ResolvedUpload {
    /// Result path without the `.html` suffix; the PCA routine appends its
    /// own extensions to it.
    pub fn result_base(&self) -> PathBuf {
        let text = self.result_path.to_string_lossy();
        PathBuf::from(text.strip_suffix(RESULT_EXTENSION).unwrap_or(&text))
    }
}

#[derive(Debug, Clone)]
pub struct UploadStore {
    upload_dir: PathBuf,
    results_dir: PathBuf,
    allowed_extensions: BTreeSet<String>,
}

impl UploadStore {
    pub fn new(
        upload_dir: impl Into<PathBuf>,
        results_dir: impl Into<PathBuf>,
        allowed_extensions: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            results_dir: results_dir.into(),
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    pub async fn ensure_dirs(&self) -> Result<(), ExplorerError> {
        tokio::fs::create_dir_all(&self.upload_dir).await?;
        tokio::fs::create_dir_all(&self.results_dir).await?;
        Ok(())
    }

    pub fn resolve(&self, raw_filename: &str) -> Result<ResolvedUpload, ExplorerError> {
        let name = sanitize_filename(raw_filename)
            .ok_or_else(|| ExplorerError::InvalidFilename(raw_filename.to_string()))?;
        let upload_path = self.upload_dir.join(&name);
        let result_path = self.results_dir.join(result_file_name(&name));
        Ok(ResolvedUpload {
            name,
            upload_path,
            result_path,
        })
    }

    pub fn ensure_allowed(&self, name: &str) -> Result<(), ExplorerError> {
        let allowed = name
            .rsplit_once('.')
            .map(|(_, ext)| self.allowed_extensions.contains(&ext.to_ascii_lowercase()))
            .unwrap_or(false);
        if allowed {
            Ok(())
        } else {
            Err(ExplorerError::UnsupportedFileType(name.to_string()))
        }
    }

    /// Path of an existing artifact in the results directory. Only bare,
    /// already-safe names are accepted.
    pub fn results_path(&self, filename: &str) -> Result<PathBuf, ExplorerError> {
        match sanitize_filename(filename) {
            Some(name) if name == filename => Ok(self.results_dir.join(name)),
            _ => Err(ExplorerError::InvalidFilename(filename.to_string())),
        }
    }

    pub async fn list_results(&self) -> Result<Vec<String>, ExplorerError> {
        let mut entries = tokio::fs::read_dir(&self.results_dir).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if name.contains('.') {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Reduce a client-supplied name to a flat ASCII file name. Accented letters
/// are folded to their base letter. Returns `None` when nothing usable is left.
pub fn sanitize_filename(raw: &str) -> Option<String> {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let folded: String = last.nfkd().filter(char::is_ascii).collect();
    let cleaned: String = folded
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    let trimmed = cleaned.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn result_file_name(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let window_start = chars.len().saturating_sub(EXTENSION_LOOKBACK);
    let has_extension = chars[window_start..].contains(&'.');
    match name.rsplit_once('.') {
        Some((stem, _)) if has_extension => format!("{stem}{RESULT_EXTENSION}"),
        _ => format!("{name}{RESULT_EXTENSION}"),
    }
}
