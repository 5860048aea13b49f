// src/main.rs
use clap::Parser;
use statement_extractor::config::{ExtractorConfig, DEFAULT_LOOKAHEAD_SENTENCES, DEFAULT_NUMERAL_WINDOW};
use statement_extractor::extractors::{extract_pdf_bytes, Extraction};
use statement_extractor::storage::StorageManager;
use statement_extractor::utils::{self, fragment_debug, AppError};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Command Line Interface for the dividend statement extractor
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Statement PDFs to process
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// File of known account holder names, one per line
    #[arg(long)]
    holders: Option<PathBuf>,

    /// Write statements and metadata here instead of printing JSON to stdout
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Debug mode - save the reconstructed text fragments of each document
    #[arg(short, long, requires = "output_dir")]
    debug: bool,

    /// Word positions after a sentence start in which a label's value may appear
    #[arg(long, default_value_t = DEFAULT_NUMERAL_WINDOW)]
    numeral_window: usize,

    /// Sentences joined when looking for labels split across lines
    #[arg(long, default_value_t = DEFAULT_LOOKAHEAD_SENTENCES)]
    lookahead: usize,

    /// Read at most this many pages of each document
    #[arg(long)]
    max_pages: Option<usize>,
}

impl Args {
    fn extractor_config(&self) -> Result<ExtractorConfig, AppError> {
        if self.numeral_window == 0 {
            return Err(AppError::Config("--numeral-window must be at least 1".to_string()));
        }
        if self.lookahead == 0 {
            return Err(AppError::Config("--lookahead must be at least 1".to_string()));
        }
        Ok(ExtractorConfig {
            numeral_window: self.numeral_window,
            lookahead_sentences: self.lookahead,
            max_pages: self.max_pages,
        })
    }
}

/// One name per line; surrounding whitespace and blank lines are ignored.
fn parse_holders(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

async fn load_holders(path: &Path) -> Result<Vec<String>, AppError> {
    let text = tokio::fs::read_to_string(path).await.map_err(|e| {
        AppError::Config(format!("Failed to read holders file {}: {}", path.display(), e))
    })?;
    let holders = parse_holders(&text);
    tracing::info!("Loaded {} account holder names from {}", holders.len(), path.display());
    Ok(holders)
}

async fn process_file(
    path: PathBuf,
    holders: Arc<Vec<String>>,
    config: ExtractorConfig,
) -> Result<Extraction, AppError> {
    let bytes = tokio::fs::read(&path).await?;
    tracing::debug!("Read {} ({} bytes)", path.display(), bytes.len());

    let extraction = tokio::task::spawn_blocking(move || extract_pdf_bytes(&bytes, &holders, &config))
        .await
        .map_err(|e| AppError::Processing(format!("Extraction task failed: {}", e)))??;
    Ok(extraction)
}

/// Processes every file concurrently; results come back in input order.
async fn process_all(
    files: &[PathBuf],
    holders: Arc<Vec<String>>,
    config: ExtractorConfig,
) -> Vec<(PathBuf, Result<Extraction, AppError>)> {
    let tasks: Vec<_> = files
        .iter()
        .map(|path| {
            let task = tokio::spawn(process_file(path.clone(), Arc::clone(&holders), config));
            (path.clone(), task)
        })
        .collect();

    let mut results = Vec::with_capacity(tasks.len());
    for (path, task) in tasks {
        let result = match task.await {
            Ok(result) => result,
            Err(e) => Err(AppError::Processing(format!("Task for {} failed: {}", path.display(), e))),
        };
        results.push((path, result));
    }
    results
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "statement".to_string())
}

fn save_outputs(storage: &StorageManager, path: &Path, extraction: &Extraction, debug: bool) {
    let stem = file_stem(path);

    match storage.save_statement(&stem, &extraction.statement) {
        Ok(saved) => tracing::info!("Saved statement for {} to: {}", path.display(), saved.display()),
        Err(e) => tracing::error!("Failed to save statement for {}: {}", path.display(), e),
    }

    match storage.save_statement_metadata(&stem, path, extraction) {
        Ok(saved) => tracing::info!("Saved statement metadata to: {}", saved.display()),
        Err(e) => tracing::error!("Failed to save statement metadata: {}", e),
    }

    if debug {
        let dump_path = storage.fragment_dump_path(&stem);
        if let Err(e) = fragment_debug::save_fragment_dump(&extraction.fragments, &dump_path) {
            tracing::warn!("Failed to save fragment dump: {}", e);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Setup Logging (reads RUST_LOG env var)
    utils::logging::setup_logging();

    // 2. Parse CLI Arguments
    let args = Args::parse();
    tracing::info!("Starting processing for args: {:?}", args);
    let config = args.extractor_config()?;

    // 3. Load known account holders
    let holders = match &args.holders {
        Some(path) => load_holders(path).await?,
        None => Vec::new(),
    };

    // 4. Initialize storage, if writing to a directory
    let storage = match &args.output_dir {
        Some(dir) => Some(StorageManager::new(dir)?),
        None => None,
    };

    // 5. Process each document
    let results = process_all(&args.files, Arc::new(holders), config).await;

    let mut success_count = 0;
    let mut failure_count = 0;
    for (path, result) in results {
        match result {
            Ok(extraction) => {
                success_count += 1;
                tracing::info!(
                    "Extracted statement from {} ({} fragments, {} warnings)",
                    path.display(),
                    extraction.fragments.len(),
                    extraction.warnings.len()
                );
                match &storage {
                    Some(storage) => save_outputs(storage, &path, &extraction, args.debug),
                    None => println!("{}", serde_json::to_string_pretty(&extraction.statement)?),
                }
            }
            Err(e) => {
                tracing::error!("Failed to process {}: {}", path.display(), e);
                failure_count += 1;
            }
        }
    }

    tracing::info!("Processing finished. Success: {}, Failures: {}", success_count, failure_count);

    if success_count == 0 && failure_count > 0 {
        return Err(AppError::Processing(format!(
            "Failed to extract a statement from any of {} documents",
            failure_count
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Document, Object, Stream};

    fn one_page_pdf(content: &[u8]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::from(page_id)],
                "Count" => 1i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).expect("failed to save test PDF");
        buf
    }

    #[test]
    fn test_parse_holders() {
        let holders = parse_holders("  Jane Citizen \n\nJohn Citizen\r\n   \n");
        assert_eq!(holders, vec!["Jane Citizen", "John Citizen"]);
    }

    #[test]
    fn test_config_rejects_zero_window() {
        let args = Args::parse_from(["statement_extractor", "a.pdf", "--numeral-window", "0"]);
        assert!(matches!(args.extractor_config(), Err(AppError::Config(_))));

        let args = Args::parse_from(["statement_extractor", "a.pdf", "--max-pages", "2"]);
        let config = args.extractor_config().unwrap();
        assert_eq!(config.numeral_window, DEFAULT_NUMERAL_WINDOW);
        assert_eq!(config.max_pages, Some(2));
    }

    #[test]
    fn test_debug_requires_output_dir() {
        assert!(Args::try_parse_from(["statement_extractor", "a.pdf", "--debug"]).is_err());
    }

    #[test]
    fn test_batch_continues_past_failures() {
        let dir = std::env::temp_dir().join(format!("statement_extractor_batch_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let good = dir.join("good.pdf");
        let garbage = dir.join("garbage.pdf");
        std::fs::write(&good, one_page_pdf(b"BT (Franked Amount: ) Tj ($36.00) Tj ET")).unwrap();
        std::fs::write(&garbage, b"not a pdf").unwrap();
        let missing = dir.join("missing.pdf");

        let files = vec![missing.clone(), garbage.clone(), good.clone()];
        let results = tokio_test::block_on(process_all(
            &files,
            Arc::new(Vec::new()),
            ExtractorConfig::default(),
        ));

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].0, missing);
        assert!(matches!(results[0].1, Err(AppError::Io(_))));
        assert!(matches!(results[1].1, Err(AppError::Extraction(_))));
        let extraction = results[2].1.as_ref().unwrap();
        assert_eq!(extraction.statement.franked_amount.cents, 3600);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
