//! Command-line flags. Grounded on the teacher's `engine::arg_parser::Cli`
//! (`clap`, derive API) — same shape of a positional/optional value mixed
//! with plain boolean switches, scaled to this crate's config surface.

use std::path::PathBuf;

use clap::Parser;

/// Finds duplicate files across one or more directory trees via a staged
/// search/validate/meta/content hashing pipeline.
#[derive(Clone, Parser)]
#[command(name = "dupfinder")]
#[command(about = "Find duplicate files across one or more directory trees.")]
pub struct Cli {
    /// Root directories to search, highest priority last. Default: current
    /// directory. Overrides `roots` in the config file when given.
    #[arg(value_name = "ROOT")]
    pub roots: Vec<PathBuf>,

    /// Path to the TOML config file. Default: `dupfinder.toml` in the
    /// current directory (silently skipped if absent).
    #[arg(long, default_value = "dupfinder.toml")]
    pub config: PathBuf,

    /// Glob patterns to search for (`*`, `?`, `[...]`, `**`, `{a,b,c}`).
    /// Can be given multiple times. Overrides `patterns` in the file.
    #[arg(long, short = 'p')]
    pub patterns: Vec<String>,

    /// Minimum file size in bytes.
    #[arg(long)]
    pub min_size: Option<u64>,

    /// Maximum file size in bytes; `-1` means unbounded.
    #[arg(long)]
    pub max_size: Option<i64>,

    /// Follow symlinks, pairing a link with its target's content identity.
    #[arg(long)]
    pub slink_enabled: bool,

    /// Metadata fields beyond size to fold into the meta key: any of
    /// `n` (name) `m` (mtime) `p` (perm) `u` (uid) `g` (gid).
    #[arg(long)]
    pub meta_groups: Option<String>,

    /// Head prefilter stage as `algo;size`, e.g. `sha256;4096`.
    #[arg(long)]
    pub head_hashing: Option<String>,

    /// Tail prefilter stage as `algo;size`.
    #[arg(long)]
    pub tail_hashing: Option<String>,

    /// Final, mandatory full-file hash algorithm. Default: `sha256`.
    #[arg(long)]
    pub full_hashing: Option<String>,

    /// Interpret prefilter sizes and the small-file bypass threshold as
    /// block counts instead of byte counts.
    #[arg(long)]
    pub size_in_blocks: bool,

    /// Directory report files are written to.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Filename prefix for report files.
    #[arg(long)]
    pub output_file_prefix: Option<String>,

    /// Duplicate groups per report file before rolling over to a new one.
    #[arg(long)]
    pub output_groups_per_file: Option<usize>,

    /// Suppress report writing; still prints the final monitor snapshot.
    #[arg(long)]
    pub is_dry: bool,

    /// Monitor redraw interval in seconds.
    #[arg(long)]
    pub stats_update_rate_secs: Option<u64>,

    /// Cancel the whole pipeline on the first critical-severity error.
    #[arg(long)]
    pub cancel_on_critical: bool,

    /// Verbose logging (debug level; captures error stack frames).
    #[arg(long, short = 'v')]
    pub verbose: bool,
}
