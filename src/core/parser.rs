use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::Result;
use super::cache::ContentCache;
use super::indexer::RepoIndex;
use super::languages::{ExtractContext, ParserSet};
use super::model::ModuleRecord;

/// Scanning pass: reads every indexed module and extracts its symbols and facts
pub struct CodeParser {
    config: Config,
    cache: Arc<ContentCache>,
}

impl CodeParser {
    pub fn new(config: &Config, cache: Arc<ContentCache>) -> Self {
        Self {
            config: config.clone(),
            cache,
        }
    }

    /// Populate skeletal records produced by the indexer.
    ///
    /// Each record is handed to exactly one worker and comes back filled in;
    /// the returned map has the same keys as `modules`.
    pub fn scan(
        &self,
        root: &Path,
        modules: BTreeMap<String, ModuleRecord>,
    ) -> Result<BTreeMap<String, ModuleRecord>> {
        let index = RepoIndex::build(&modules);
        let context = ExtractContext {
            heuristics: &self.config.heuristics,
            index: &index,
        };
        let records: Vec<ModuleRecord> = modules.into_values().collect();

        let scanned: Vec<ModuleRecord> =
            if records.len() < self.config.performance.min_files_for_parallel {
                let mut parsers = ParserSet::default();
                records
                    .into_iter()
                    .map(|module| self.scan_module(root, module, &mut parsers, &context))
                    .collect::<Result<Vec<_>>>()?
            } else {
                let pool = worker_pool(self.config.performance.max_workers)?;
                pool.install(|| {
                    records
                        .into_par_iter()
                        .map_init(ParserSet::default, |parsers, module| {
                            self.scan_module(root, module, parsers, &context)
                        })
                        .collect::<Result<Vec<_>>>()
                })?
            };

        Ok(scanned
            .into_iter()
            .map(|module| (module.path.clone(), module))
            .collect())
    }

    /// Fill one record; per-file failures leave it with only its anchor
    fn scan_module(
        &self,
        root: &Path,
        mut module: ModuleRecord,
        parsers: &mut ParserSet,
        context: &ExtractContext<'_>,
    ) -> Result<ModuleRecord> {
        let Some(parser) = parsers.get(&module.language)? else {
            return Ok(module);
        };

        let path = root.join(&module.path);
        match std::fs::metadata(&path) {
            Ok(metadata) if metadata.len() > self.config.scanning.max_file_size => {
                debug!(
                    "Skipping {}: {} bytes exceeds maximum size limit",
                    module.path,
                    metadata.len()
                );
                return Ok(module);
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Cannot stat {}: {}", module.path, e);
                return Ok(module);
            }
        }

        let source = match self.cache.read(&path) {
            Ok(source) => source,
            Err(e) => {
                warn!("Failed to read {}: {}", module.path, e);
                return Ok(module);
            }
        };
        module.content_hash = Some(calculate_hash(&source));

        match parser.extract(&source, &mut module, context) {
            Ok(true) => {}
            Ok(false) => debug!("Syntax errors in {}, keeping the module anchor only", module.path),
            Err(e) => warn!("Failed to parse {}: {}", module.path, e),
        }
        Ok(module)
    }
}

/// Hex SHA-256 of a file's contents
pub fn calculate_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Dedicated pool so a run never exceeds the configured worker count
pub(crate) fn worker_pool(max_workers: usize) -> Result<ThreadPool> {
    let pool = ThreadPoolBuilder::new()
        .num_threads(max_workers.max(1))
        .thread_name(|i| format!("codecard-worker-{}", i))
        .build()?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::indexer::ModuleIndexer;
    use crate::core::walker::{PathFilter, SourceWalker};
    use tempfile::TempDir;

    fn write(dir: &TempDir, rel: &str, content: &str) {
        let path = dir.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn scan_with(dir: &TempDir, config: &Config) -> BTreeMap<String, ModuleRecord> {
        let filter = PathFilter::new(None, None).unwrap();
        let outcome = SourceWalker::new(&config.scanning)
            .walk(dir.path(), &filter)
            .unwrap();
        let modules = ModuleIndexer::new(&config.heuristics).index(&outcome.files);
        CodeParser::new(config, Arc::new(ContentCache::new(16)))
            .scan(dir.path(), modules)
            .unwrap()
    }

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(&dir, "pkg/__init__.py", "from .util import helper\n");
        write(&dir, "pkg/util.py", "def helper():\n    return 1\n");
        write(&dir, "broken.py", "def broken(:\n");
        write(&dir, "web/app.ts", "export const x = 1;\n");
        dir
    }

    #[test]
    fn test_calculate_hash() {
        assert_eq!(
            calculate_hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_scan_fills_python_modules() {
        let dir = fixture();
        let modules = scan_with(&dir, &Config::default());

        assert_eq!(modules.len(), 4);
        let util = &modules["pkg/util.py"];
        assert!(util.parsed);
        assert!(util.content_hash.is_some());
        assert!(util.functions.contains_key("helper"));

        let init = &modules["pkg/__init__.py"];
        assert_eq!(
            init.reexports.get("pkg.helper").map(String::as_str),
            Some("pkg.util.helper")
        );

        let broken = &modules["broken.py"];
        assert!(!broken.parsed);
        assert_eq!(broken.symbols.len(), 1);

        let script = &modules["web/app.ts"];
        assert!(!script.parsed);
        assert!(script.content_hash.is_none());
    }

    #[test]
    fn test_parallel_scan_matches_sequential() {
        let dir = fixture();
        let sequential = scan_with(&dir, &Config::default());

        let mut config = Config::default();
        config.performance.min_files_for_parallel = 0;
        config.performance.max_workers = 3;
        let parallel = scan_with(&dir, &config);

        assert_eq!(
            serde_json::to_string(&sequential).unwrap(),
            serde_json::to_string(&parallel).unwrap()
        );
    }

    #[test]
    fn test_oversized_files_are_indexed_only() {
        let dir = TempDir::new().unwrap();
        write(&dir, "big.py", "def a():\n    pass\n");

        let mut config = Config::default();
        config.scanning.max_file_size = 4;
        let modules = scan_with(&dir, &config);

        let big = &modules["big.py"];
        assert!(!big.parsed);
        assert!(big.functions.is_empty());
        assert!(big.content_hash.is_none());
    }
}
