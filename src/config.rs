//! Process configuration: TOML file merged with CLI overrides, CLI winning
//! only when the flag was actually passed. Grounded on the teacher's
//! `utils::nefaxer_toml` (`apply_file_opt!`) + `engine::arg_parser`/
//! `engine::cli` (`apply_cli_opt!`) merge discipline.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::cli::Cli;
use crate::hashing::{HashAlgo, HashStageSpec, StageKind};

/// Deserialized `dupfinder.toml`. Every field optional: only present keys
/// override the built-in defaults, mirroring `NefaxerToml`/`IndexSection`.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub roots: Option<Vec<PathBuf>>,
    #[serde(default)]
    pub patterns: Option<Vec<String>>,
    pub min_size: Option<u64>,
    pub max_size: Option<i64>,
    pub slink_enabled: Option<bool>,
    pub meta_groups: Option<String>,
    pub head_hashing: Option<String>,
    pub tail_hashing: Option<String>,
    pub full_hashing: Option<String>,
    pub size_in_blocks: Option<bool>,
    pub output_dir: Option<PathBuf>,
    pub output_file_prefix: Option<String>,
    pub output_groups_per_file: Option<usize>,
    pub is_dry: Option<bool>,
    pub stats_update_rate_secs: Option<u64>,
    pub cancel_on_critical: Option<bool>,
    pub verbose: Option<bool>,
}

/// Overwrite a Config field from the file when present. Analogue of the
/// teacher's `apply_file_opt!`.
macro_rules! apply_file_opt {
    ($file:expr, $config:expr, $field:ident) => {
        if let Some(v) = $file.$field.clone() {
            $config.$field = v;
        }
    };
}

/// Overwrite a Config field from a CLI flag only when the user actually
/// passed it (a bare `Option`, not a `clap` default). Analogue of the
/// teacher's `apply_cli_opt!`.
macro_rules! apply_cli_opt {
    ($cli_value:expr, $config:expr, $field:ident) => {
        if let Some(v) = $cli_value.clone() {
            $config.$field = v;
        }
    };
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("root directory {0:?} does not exist or is not readable")]
    UnreadableRoot(PathBuf),
    #[error("malformed hash spec {0:?}: expected \"algo\" or \"algo;size\"")]
    MalformedHashSpec(String),
    #[error("unknown hash algorithm {0:?}")]
    UnknownAlgo(String),
    #[error("min_size ({min}) is greater than max_size ({max})")]
    SizeBoundsInverted { min: u64, max: i64 },
    #[error("at least one root and one pattern must be configured")]
    EmptyRootsOrPatterns,
}

/// Fully resolved configuration the pipeline is built from.
#[derive(Debug, Clone)]
pub struct Config {
    pub roots: Vec<PathBuf>,
    pub patterns: Vec<String>,
    pub min_size: u64,
    pub max_size: i64,
    pub slink_enabled: bool,
    pub meta_groups: String,
    pub hash_stages: Vec<HashStageSpec>,
    pub size_in_blocks: bool,
    pub output_dir: PathBuf,
    pub output_file_prefix: String,
    pub output_groups_per_file: usize,
    pub is_dry: bool,
    pub stats_update_rate: Duration,
    pub cancel_on_critical: bool,
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            roots: Vec::new(),
            patterns: vec!["**".to_string()],
            min_size: 0,
            max_size: -1,
            slink_enabled: false,
            meta_groups: String::new(),
            hash_stages: Vec::new(),
            size_in_blocks: false,
            output_dir: PathBuf::from("."),
            output_file_prefix: "dupfinder".to_string(),
            output_groups_per_file: 1000,
            is_dry: false,
            stats_update_rate: Duration::from_secs(2),
            cancel_on_critical: false,
            verbose: false,
        }
    }
}

/// Parses `"algo"` or `"algo;size"` into a hash stage spec. `size` is
/// required for head/tail stages and rejected for full.
fn parse_prefilter_spec(name: &str, spec: &str, kind_from_size: impl Fn(u64) -> StageKind) -> Result<HashStageSpec, ConfigError> {
    let mut parts = spec.splitn(2, ';');
    let algo_name = parts.next().unwrap_or("").trim();
    let size_str = parts
        .next()
        .ok_or_else(|| ConfigError::MalformedHashSpec(spec.to_string()))?;
    let size: u64 = size_str
        .trim()
        .parse()
        .map_err(|_| ConfigError::MalformedHashSpec(spec.to_string()))?;
    let algo = HashAlgo::parse(algo_name).ok_or_else(|| ConfigError::UnknownAlgo(algo_name.to_string()))?;
    Ok(HashStageSpec {
        name: name.to_string(),
        kind: kind_from_size(size),
        algo,
    })
}

fn parse_full_spec(spec: &str) -> Result<HashStageSpec, ConfigError> {
    let algo = HashAlgo::parse(spec.trim()).ok_or_else(|| ConfigError::UnknownAlgo(spec.to_string()))?;
    Ok(HashStageSpec {
        name: "full".to_string(),
        kind: StageKind::Full,
        algo,
    })
}

impl Config {
    /// Merges `file` then `cli` on top of defaults and validates the
    /// result. Fatal per spec.md §6: callers surface the error and exit 1.
    pub fn build(file: Option<ConfigFile>, cli: &Cli) -> Result<Config, ConfigError> {
        let mut config = Config::default();

        if let Some(file) = &file {
            apply_file_opt!(file, config, min_size);
            apply_file_opt!(file, config, max_size);
            apply_file_opt!(file, config, slink_enabled);
            apply_file_opt!(file, config, meta_groups);
            apply_file_opt!(file, config, size_in_blocks);
            apply_file_opt!(file, config, output_dir);
            apply_file_opt!(file, config, output_file_prefix);
            apply_file_opt!(file, config, output_groups_per_file);
            apply_file_opt!(file, config, is_dry);
            apply_file_opt!(file, config, cancel_on_critical);
            apply_file_opt!(file, config, verbose);
            if let Some(roots) = &file.roots {
                config.roots = roots.clone();
            }
            if let Some(patterns) = &file.patterns {
                config.patterns = patterns.clone();
            }
            if let Some(secs) = file.stats_update_rate_secs {
                config.stats_update_rate = Duration::from_secs(secs);
            }
        }

        if !cli.roots.is_empty() {
            config.roots = cli.roots.clone();
        }
        if !cli.patterns.is_empty() {
            config.patterns = cli.patterns.clone();
        }
        apply_cli_opt!(cli.min_size, config, min_size);
        apply_cli_opt!(cli.max_size, config, max_size);
        apply_cli_opt!(cli.meta_groups, config, meta_groups);
        apply_cli_opt!(cli.output_dir, config, output_dir);
        apply_cli_opt!(cli.output_file_prefix, config, output_file_prefix);
        apply_cli_opt!(cli.output_groups_per_file, config, output_groups_per_file);
        if let Some(secs) = cli.stats_update_rate_secs {
            config.stats_update_rate = Duration::from_secs(secs);
        }
        // Plain boolean flags only ever turn a setting on, the same
        // convention the teacher's own `Cli` uses for `verbose`/`strict`/
        // `paranoid` — there is no "explicitly false" to express on a CLI.
        config.slink_enabled |= cli.slink_enabled;
        config.size_in_blocks |= cli.size_in_blocks;
        config.is_dry |= cli.is_dry;
        config.cancel_on_critical |= cli.cancel_on_critical;
        config.verbose |= cli.verbose;

        let head_spec = file
            .as_ref()
            .and_then(|f| f.head_hashing.clone())
            .or_else(|| cli.head_hashing.clone());
        let tail_spec = file
            .as_ref()
            .and_then(|f| f.tail_hashing.clone())
            .or_else(|| cli.tail_hashing.clone());
        let full_spec = cli
            .full_hashing
            .clone()
            .or_else(|| file.as_ref().and_then(|f| f.full_hashing.clone()))
            .unwrap_or_else(|| "sha256".to_string());

        let mut hash_stages = Vec::new();
        if let Some(spec) = head_spec {
            hash_stages.push(parse_prefilter_spec("head", &spec, StageKind::Head)?);
        }
        if let Some(spec) = tail_spec {
            hash_stages.push(parse_prefilter_spec("tail", &spec, StageKind::Tail)?);
        }
        hash_stages.push(parse_full_spec(&full_spec)?);
        config.hash_stages = hash_stages;

        config.validate()
    }

    fn validate(self) -> Result<Config, ConfigError> {
        if self.roots.is_empty() || self.patterns.is_empty() {
            return Err(ConfigError::EmptyRootsOrPatterns);
        }
        for root in &self.roots {
            if !root.exists() {
                return Err(ConfigError::UnreadableRoot(root.clone()));
            }
        }
        if self.max_size >= 0 && self.min_size > self.max_size as u64 {
            return Err(ConfigError::SizeBoundsInverted {
                min: self.min_size,
                max: self.max_size,
            });
        }
        Ok(self)
    }

    /// Combined size of the prefilter windows (head + tail), used by the
    /// small-file bypass predicate. Zero when no prefilter stage exists.
    pub fn prefilter_window_sum(&self) -> u64 {
        self.hash_stages
            .iter()
            .filter_map(|s| match s.kind {
                StageKind::Head(n) | StageKind::Tail(n) => Some(n),
                StageKind::Full => None,
            })
            .sum()
    }
}

/// Loads and parses `path` as TOML, returning `None` if it does not exist.
pub fn load_config_file(path: &std::path::Path) -> anyhow::Result<Option<ConfigFile>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(toml::from_str(&contents)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
