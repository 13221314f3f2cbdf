// src/core/walker.rs
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobMatcher};
use ignore::WalkBuilder;
use tracing::debug;

use crate::config::ScanningConfig;
use crate::error::{CodecardError, Result};

/// A candidate source file found under the analysis root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Posix-style path relative to the root
    pub rel_path: String,
    pub abs_path: PathBuf,
    /// Short language tag for the extension
    pub language: String,
}

/// Everything one walk of the tree produces
#[derive(Debug, Clone, Default)]
pub struct WalkOutcome {
    /// Candidates sorted by relative path, without duplicates
    pub files: Vec<SourceFile>,
    /// Language tags of every non-ignored file, sorted; `unknown` if none
    pub languages: Vec<String>,
}

/// Include/exclude globs matched against relative paths.
///
/// A pattern matches when it matches the whole path or any trailing run of
/// path segments, so `*.py` and `tests/*.py` behave the same at any depth.
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    include: Option<GlobMatcher>,
    exclude: Option<GlobMatcher>,
}

impl PathFilter {
    pub fn new(include: Option<&str>, exclude: Option<&str>) -> Result<Self> {
        Ok(Self {
            include: include.map(compile_glob).transpose()?,
            exclude: exclude.map(compile_glob).transpose()?,
        })
    }

    /// Inclusion is checked first, exclusion is applied to what remains
    pub fn accepts(&self, rel_path: &str) -> bool {
        if let Some(include) = &self.include {
            if !matches_from_right(include, rel_path) {
                return false;
            }
        }
        if let Some(exclude) = &self.exclude {
            if matches_from_right(exclude, rel_path) {
                return false;
            }
        }
        true
    }
}

fn compile_glob(pattern: &str) -> Result<GlobMatcher> {
    let glob = Glob::new(pattern).map_err(|e| CodecardError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;
    Ok(glob.compile_matcher())
}

fn matches_from_right(matcher: &GlobMatcher, rel_path: &str) -> bool {
    if matcher.is_match(rel_path) {
        return true;
    }
    let mut rest = rel_path;
    while let Some(slash) = rest.find('/') {
        rest = &rest[slash + 1..];
        if matcher.is_match(rest) {
            return true;
        }
    }
    false
}

/// Enumerates candidate source files under a root
pub struct SourceWalker {
    config: ScanningConfig,
}

impl SourceWalker {
    pub fn new(config: &ScanningConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Fail before any scanning when the root is unusable
    pub fn check_root(root: &Path) -> Result<()> {
        if !root.exists() {
            return Err(CodecardError::RootNotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(CodecardError::NotADirectory(root.to_path_buf()));
        }
        Ok(())
    }

    pub fn walk(&self, root: &Path, filter: &PathFilter) -> Result<WalkOutcome> {
        Self::check_root(root)?;

        let walker = WalkBuilder::new(root)
            .hidden(!self.config.include_hidden)
            .git_ignore(self.config.respect_gitignore)
            .git_exclude(self.config.respect_gitignore)
            .require_git(false)
            .parents(false)
            .follow_links(false)
            .add_custom_ignore_filename(&self.config.ignore_file)
            .build();

        let mut candidates: BTreeMap<String, SourceFile> = BTreeMap::new();
        let mut languages: BTreeSet<String> = BTreeSet::new();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Skipping unreadable walk entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().map_or(false, |ft| ft.is_file()) {
                continue;
            }

            let path = entry.path();
            let Some(language) = path
                .extension()
                .and_then(|ext| ext.to_str())
                .and_then(|ext| self.config.language_for(ext))
            else {
                continue;
            };
            languages.insert(language.to_string());

            let Some(rel_path) = relative_posix(path, root) else {
                continue;
            };
            if !filter.accepts(&rel_path) {
                continue;
            }
            if is_probably_binary(path, self.config.binary_sniff_bytes) {
                debug!("Skipping binary file {}", rel_path);
                continue;
            }

            candidates.insert(
                rel_path.clone(),
                SourceFile {
                    rel_path,
                    abs_path: path.to_path_buf(),
                    language: language.to_string(),
                },
            );
        }

        let languages = if languages.is_empty() {
            vec!["unknown".to_string()]
        } else {
            languages.into_iter().collect()
        };

        Ok(WalkOutcome {
            files: candidates.into_values().collect(),
            languages,
        })
    }
}

/// Posix-style relative path, `None` when `path` is not under `root`
pub fn relative_posix(path: &Path, root: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// NUL byte in the leading bytes means binary; unreadable files count as binary
pub fn is_probably_binary(path: &Path, sniff_bytes: usize) -> bool {
    let mut buffer = Vec::with_capacity(sniff_bytes);
    match File::open(path).and_then(|file| file.take(sniff_bytes as u64).read_to_end(&mut buffer)) {
        Ok(_) => buffer.contains(&0),
        Err(_) => true,
    }
}
