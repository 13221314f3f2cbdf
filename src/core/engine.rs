// src/core/engine.rs
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{CodecardError, Result};
use super::cache::ContentCache;
use super::call_graph::CallResolver;
use super::indexer::ModuleIndexer;
use super::languages::ParserSet;
use super::model::{AnalysisResult, CallEdge, ModuleRecord};
use super::parser::{worker_pool, CodeParser};
use super::validator::ResultValidator;
use super::walker::{PathFilter, SourceWalker};

/// Main orchestration engine: walk, index, scan, then resolve calls
#[derive(Clone)]
pub struct Engine {
    config: Config,
    cache: Arc<ContentCache>,
}

impl Engine {
    pub fn new(config: Config) -> Self {
        let cache = Arc::new(ContentCache::new(config.performance.cache_size));
        Self { config, cache }
    }

    /// Engine configured from a file, or the default locations
    pub fn from_config_path(config_path: Option<&Path>) -> Result<Self> {
        let config = Config::load_or_default(config_path)?;
        debug!("Loaded configuration: {:?}", config);
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Scanning pass: every module indexed, symbols and facts extracted, no edges yet
    pub fn analyze(
        &self,
        root: &Path,
        include: Option<&str>,
        exclude: Option<&str>,
    ) -> Result<AnalysisResult> {
        SourceWalker::check_root(root)?;
        let filter = PathFilter::new(include, exclude)?;

        info!("Scanning {}", root.display());
        let outcome = SourceWalker::new(&self.config.scanning).walk(root, &filter)?;
        info!(
            "Found {} candidate files ({})",
            outcome.files.len(),
            outcome.languages.join(", ")
        );

        let modules = ModuleIndexer::new(&self.config.heuristics).index(&outcome.files);
        let modules = CodeParser::new(&self.config, Arc::clone(&self.cache)).scan(root, modules)?;

        let result = AnalysisResult {
            modules,
            languages: outcome.languages,
        };
        info!("Scanning pass complete: {}", result.stats());
        Ok(result)
    }

    /// Resolution pass: replace the call edges of every parsed module
    pub fn resolve_calls(&self, root: &Path, result: &mut AnalysisResult) -> Result<()> {
        SourceWalker::check_root(root)?;

        let resolver = CallResolver::new(&result.modules);
        let parsed: Vec<&ModuleRecord> = result.modules.values().filter(|m| m.parsed).collect();

        let edges: Vec<(String, Vec<CallEdge>)> =
            if parsed.len() < self.config.performance.min_files_for_parallel {
                let mut parsers = ParserSet::default();
                parsed
                    .iter()
                    .map(|module| self.module_edges(root, module, &mut parsers, &resolver))
                    .collect::<Result<Vec<_>>>()?
            } else {
                let pool = worker_pool(self.config.performance.max_workers)?;
                pool.install(|| {
                    parsed
                        .par_iter()
                        .map_init(ParserSet::default, |parsers, module| {
                            self.module_edges(root, module, parsers, &resolver)
                        })
                        .collect::<Result<Vec<_>>>()
                })?
            };

        for (path, calls) in edges {
            if let Some(module) = result.modules.get_mut(&path) {
                module.calls = calls;
            }
        }

        info!("Resolution pass complete: {} call edges", result.total_calls());
        Ok(())
    }

    /// Both passes followed by a consistency check of the result
    pub fn run(
        &self,
        root: &Path,
        include: Option<&str>,
        exclude: Option<&str>,
    ) -> Result<AnalysisResult> {
        let mut result = self.analyze(root, include, exclude)?;
        self.resolve_calls(root, &mut result)?;
        ResultValidator::validate(&result).into_result()?;
        Ok(result)
    }

    /// [`Engine::run`] on the blocking pool, bounded by `performance.timeout_secs`
    pub async fn run_with_deadline(
        &self,
        root: PathBuf,
        include: Option<String>,
        exclude: Option<String>,
    ) -> Result<AnalysisResult> {
        let engine = self.clone();
        let task = tokio::task::spawn_blocking(move || {
            engine.run(&root, include.as_deref(), exclude.as_deref())
        });

        let Some(secs) = self.config.performance.timeout_secs else {
            return task.await?;
        };
        match tokio::time::timeout(Duration::from_secs(secs), task).await {
            Ok(joined) => joined?,
            Err(_) => Err(CodecardError::Timeout(secs)),
        }
    }

    fn module_edges(
        &self,
        root: &Path,
        module: &ModuleRecord,
        parsers: &mut ParserSet,
        resolver: &CallResolver<'_>,
    ) -> Result<(String, Vec<CallEdge>)> {
        let no_edges = || (module.path.clone(), Vec::new());

        let Some(parser) = parsers.get(&module.language)? else {
            return Ok(no_edges());
        };
        let source = match self.cache.read(&root.join(&module.path)) {
            Ok(source) => source,
            Err(e) => {
                warn!("Failed to re-read {}: {}", module.path, e);
                return Ok(no_edges());
            }
        };

        let sites = match parser.call_sites(&source) {
            Ok(Some(sites)) => sites,
            Ok(None) => {
                debug!("{} no longer parses, skipping call resolution", module.path);
                return Ok(no_edges());
            }
            Err(e) => {
                warn!("Failed to parse {}: {}", module.path, e);
                return Ok(no_edges());
            }
        };

        Ok((module.path.clone(), resolver.resolve_module(module, &sites)))
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(Config::default())
    }
}
