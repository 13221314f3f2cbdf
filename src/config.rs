use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{CodecardError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Project configuration
    pub project: ProjectConfig,

    /// Source discovery settings
    pub scanning: ScanningConfig,

    /// Worker pool and cache sizing
    pub performance: PerformanceConfig,

    /// Marker-name tables used to classify definitions
    pub heuristics: HeuristicsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Project name, stamped into reports
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanningConfig {
    /// Per-directory ignore file honoured during the walk
    pub ignore_file: String,

    /// Whether .gitignore rules apply
    pub respect_gitignore: bool,

    /// Whether hidden files and directories are walked
    pub include_hidden: bool,

    /// Number of leading bytes inspected for NUL when sniffing binaries
    pub binary_sniff_bytes: usize,

    /// Files larger than this (in bytes) are indexed but never parsed
    pub max_file_size: u64,

    /// Recognized source extensions mapped to their short language tag
    pub extensions: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Size of the scanning/resolution worker pool
    pub max_workers: usize,

    /// Number of file contents kept between the two passes
    pub cache_size: usize,

    /// Below this many files both passes run on the calling thread
    pub min_files_for_parallel: usize,

    /// Optional deadline for a whole run
    pub timeout_secs: Option<u64>,
}

/// One `(keyword, tag)` row of the role classification table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleKeyword {
    pub keyword: String,
    pub tag: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicsConfig {
    /// Tag used when no keyword matches
    pub default_role: String,

    /// Decorator tails that mark a data-shape class
    pub dataclass_markers: Vec<String>,

    /// Base-class tails that mark a data-shape class
    pub model_bases: Vec<String>,

    /// Base-class tails that mark an error type
    pub exception_suffixes: Vec<String>,

    /// Base-class tails that mark an enumeration
    pub enum_suffixes: Vec<String>,

    /// Verb attributes recognized on `receiver.verb("/path")` decorators
    pub http_verbs: Vec<String>,

    /// Attribute name of `x.route("/path", methods=[...])` decorators
    pub route_attribute: String,

    /// Verb recorded when a route decorator lists no methods
    pub default_verb: String,

    /// Status codes attached to every detected route
    pub default_status_codes: Vec<String>,

    /// Ordered path-substring table for role tags (matched case-insensitively)
    pub role_keywords: Vec<RoleKeyword>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "Unnamed Project".to_string(),
        }
    }
}

impl Default for ScanningConfig {
    fn default() -> Self {
        let mut extensions = BTreeMap::new();
        for (ext, lang) in [
            ("py", "py"),
            ("ts", "ts"),
            ("tsx", "tsx"),
            ("js", "js"),
            ("jsx", "jsx"),
            ("go", "go"),
            ("rs", "rs"),
            ("java", "java"),
            ("kt", "kt"),
            ("swift", "swift"),
            ("c", "c"),
            ("h", "c-h"),
            ("cpp", "cpp"),
            ("hpp", "cpp-h"),
            ("cs", "cs"),
        ] {
            extensions.insert(ext.to_string(), lang.to_string());
        }

        Self {
            extensions,
            ignore_file: ".ctxignore".to_string(),
            respect_gitignore: true,
            include_hidden: false,
            binary_sniff_bytes: 2048,
            max_file_size: 1024 * 1024, // 1MB
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            cache_size: 1000,
            min_files_for_parallel: 50,
            timeout_secs: None,
        }
    }
}

impl Default for HeuristicsConfig {
    fn default() -> Self {
        let role_keywords = [
            ("test", "test"),
            ("auth", "auth"),
            ("api", "api"),
            ("repo", "repo"),
            ("repository", "repo"),
            ("service", "svc"),
            ("svc", "svc"),
        ]
        .into_iter()
        .map(|(keyword, tag)| RoleKeyword {
            keyword: keyword.to_string(),
            tag: tag.to_string(),
        })
        .collect();

        Self {
            role_keywords,
            default_role: "mod".to_string(),
            dataclass_markers: vec!["dataclass".to_string()],
            model_bases: vec!["BaseModel".to_string()],
            exception_suffixes: vec!["Exception".to_string()],
            enum_suffixes: vec!["Enum".to_string()],
            http_verbs: ["get", "post", "put", "delete"]
                .iter()
                .map(|v| v.to_string())
                .collect(),
            route_attribute: "route".to_string(),
            default_verb: "GET".to_string(),
            default_status_codes: vec!["200".to_string()],
        }
    }
}

impl ScanningConfig {
    /// Language tag for a file extension (case-insensitive, without the dot)
    pub fn language_for(&self, extension: &str) -> Option<&str> {
        self.extensions
            .get(&extension.to_ascii_lowercase())
            .map(String::as_str)
    }
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| CodecardError::Config(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| CodecardError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration with fallback to default
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => {
                if p.as_ref().exists() {
                    Self::load(p)
                } else {
                    Ok(Self::default())
                }
            }
            None => {
                // Try common config file locations
                let candidates = ["Codecard.toml", "codecard.toml", ".codecard.toml"];

                for candidate in &candidates {
                    if Path::new(candidate).exists() {
                        return Self::load(candidate);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    fn check(&self) -> Result<()> {
        if self.performance.max_workers == 0 {
            return Err(CodecardError::Config(
                "performance.max_workers must be at least 1".to_string(),
            ));
        }
        if self.scanning.extensions.is_empty() {
            return Err(CodecardError::Config(
                "scanning.extensions must list at least one extension".to_string(),
            ));
        }
        Ok(())
    }
}
