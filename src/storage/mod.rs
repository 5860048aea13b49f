// src/storage/mod.rs
use crate::extractors::Extraction;
use crate::statement::Statement;
use crate::utils::error::StorageError;
use std::fs;
use std::path::{Path, PathBuf};

pub struct StorageManager {
    base_dir: PathBuf,
}

impl StorageManager {
    /// Creates a new StorageManager with the specified base directory
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self, StorageError> {
        let base_path = base_dir.as_ref().to_path_buf();

        // Create the base directory if it doesn't exist
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(StorageError::IoError)?;
        }

        Ok(Self { base_dir: base_path })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Saves the statement as `<stem>.json`
    pub fn save_statement(&self, stem: &str, statement: &Statement) -> Result<PathBuf, StorageError> {
        let file_path = self.base_dir.join(format!("{}.json", stem));

        let json = serde_json::to_string_pretty(statement)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        fs::write(&file_path, json).map_err(StorageError::IoError)?;

        tracing::info!("Saved statement to {}", file_path.display());
        Ok(file_path)
    }

    /// Saves metadata about the extraction as `<stem>_meta.json`
    pub fn save_statement_metadata(
        &self,
        stem: &str,
        source: &Path,
        extraction: &Extraction,
    ) -> Result<PathBuf, StorageError> {
        let file_path = self.base_dir.join(format!("{}_meta.json", stem));

        let metadata = serde_json::json!({
            "source": source.display().to_string(),
            "fragment_count": extraction.fragments.len(),
            "warnings": extraction.warnings,
            "warning_messages": extraction.warnings.iter().map(|w| w.to_string()).collect::<Vec<_>>(),
            "extraction_timestamp": chrono::Utc::now().to_rfc3339(),
        });

        let metadata_str = serde_json::to_string_pretty(&metadata)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        fs::write(&file_path, metadata_str).map_err(StorageError::IoError)?;

        tracing::info!("Saved metadata to {}", file_path.display());
        Ok(file_path)
    }

    /// Where the fragment dump for `stem` goes
    pub fn fragment_dump_path(&self, stem: &str) -> PathBuf {
        self.base_dir.join(format!("{}_fragments.txt", stem))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::ExtractWarning;
    use rust_decimal::Decimal;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("statement_extractor_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_creates_base_dir() {
        let dir = scratch_dir("create").join("nested");
        let storage = StorageManager::new(&dir).unwrap();
        assert!(storage.base_dir().is_dir());
        fs::remove_dir_all(dir.parent().unwrap()).unwrap();
    }

    #[test]
    fn test_saves_statement_and_metadata() {
        let dir = scratch_dir("save");
        let storage = StorageManager::new(&dir).unwrap();

        let mut statement = Statement::default();
        statement.asx_code = Some("XYZ".to_string());
        statement.bind(crate::statement::Field::FrankedAmount, Decimal::new(3600, 2));
        let extraction = Extraction {
            statement: statement.clone(),
            warnings: vec![ExtractWarning::DateParse {
                text: "soon".to_string(),
                reason: "input contains invalid characters".to_string(),
            }],
            fragments: vec!["Franked Amount: ".to_string(), "$36.00".to_string()],
        };

        let path = storage.save_statement("dividend", &statement).unwrap();
        assert_eq!(path, dir.join("dividend.json"));
        let saved: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved["ASXCode"], "XYZ");
        assert_eq!(saved["FrankedAmount"].to_string(), "36.00");
        assert!(saved["Entity"].is_null());

        let meta_path = storage
            .save_statement_metadata("dividend", Path::new("in/dividend.pdf"), &extraction)
            .unwrap();
        let meta: serde_json::Value = serde_json::from_str(&fs::read_to_string(&meta_path).unwrap()).unwrap();
        assert_eq!(meta["fragment_count"], 2);
        assert_eq!(meta["warnings"][0]["DateParse"]["text"], "soon");
        assert!(meta["extraction_timestamp"].is_string());

        assert_eq!(storage.fragment_dump_path("dividend"), dir.join("dividend_fragments.txt"));
        fs::remove_dir_all(&dir).unwrap();
    }
}
