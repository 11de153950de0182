use std::{collections::HashSet, fs, path::PathBuf};

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;

use super::{IndicatorEntry, IndicatorRepository, IndicatorTable};

/// Loads indicator phrases from an `indicators.txt` file located under a base
/// directory. When the file is absent, the built-in table is served instead.
///
/// File format: one `category|phrase` pair per line, `#` for comments.
pub struct FileIndicatorRepository {
    base_path: PathBuf,
    cache: OnceCell<Vec<IndicatorEntry>>,
}

impl FileIndicatorRepository {
    /// Create a repository rooted at the given directory.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            cache: OnceCell::new(),
        }
    }

    fn indicators_path(&self) -> PathBuf {
        self.base_path.join("indicators.txt")
    }

    fn load_file(&self) -> Result<Vec<IndicatorEntry>> {
        let path = self.indicators_path();
        if !path.exists() {
            return Ok(IndicatorTable::builtin().entries().to_vec());
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read indicator file at {}", path.display()))?;
        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let (category, phrase) = trimmed.split_once('|').ok_or_else(|| {
                anyhow::anyhow!(
                    "invalid indicator format at {}:{} (expected category|phrase)",
                    path.display(),
                    idx + 1
                )
            })?;
            let entry = IndicatorEntry::new(category, phrase).with_context(|| {
                format!("invalid indicator at {}:{}", path.display(), idx + 1)
            })?;
            if !seen.insert((entry.category.clone(), entry.phrase.clone())) {
                return Err(anyhow::anyhow!(
                    "duplicate indicator `{}|{}` at {}:{}",
                    entry.category,
                    entry.phrase,
                    path.display(),
                    idx + 1
                ));
            }
            entries.push(entry);
        }
        Ok(entries)
    }
}

#[async_trait::async_trait]
impl IndicatorRepository for FileIndicatorRepository {
    async fn load_indicators(&self) -> Result<Vec<IndicatorEntry>> {
        let entries = self.cache.get_or_try_init(|| self.load_file())?;
        Ok(entries.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn write(path: &Path, contents: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn loads_indicator_file() {
        let temp = tempfile::tempdir().unwrap();
        write(
            &temp.path().join("indicators.txt"),
            r#"
# stock urgency phrases
urgency|act now
threats|Account Suspended
"#,
        );

        let repo = FileIndicatorRepository::new(temp.path());
        let entries =
            futures::executor::block_on(IndicatorRepository::load_indicators(&repo)).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].category, "urgency");
        assert_eq!(entries[0].phrase, "act now");
        assert_eq!(entries[1].phrase, "account suspended");
    }

    #[test]
    fn missing_file_falls_back_to_builtin_table() {
        let temp = tempfile::tempdir().unwrap();
        let repo = FileIndicatorRepository::new(temp.path());
        let entries =
            futures::executor::block_on(IndicatorRepository::load_indicators(&repo)).unwrap();
        assert!(entries
            .iter()
            .any(|e| e.category == "requests" && e.phrase == "verify your account"));
    }

    #[test]
    fn duplicate_pairs_error() {
        let temp = tempfile::tempdir().unwrap();
        write(
            &temp.path().join("indicators.txt"),
            "urgency|act now\nurgency|act now\n",
        );
        let repo = FileIndicatorRepository::new(temp.path());
        let err =
            futures::executor::block_on(IndicatorRepository::load_indicators(&repo)).unwrap_err();
        assert!(err.to_string().contains("duplicate indicator"));
    }

    #[test]
    fn malformed_line_errors_with_location() {
        let temp = tempfile::tempdir().unwrap();
        write(&temp.path().join("indicators.txt"), "no delimiter here\n");
        let repo = FileIndicatorRepository::new(temp.path());
        let err =
            futures::executor::block_on(IndicatorRepository::load_indicators(&repo)).unwrap_err();
        assert!(err.to_string().contains("expected category|phrase"));
    }
}
