//! File-stat data model: the `FileStat` record, its `meta_key` projection,
//! and the priority/sort-key helpers derived once per Validator hit.

pub mod filestat;
pub mod meta_key;

pub use filestat::{FileStat, FileStatData, Inode, build_file_stat};
pub use meta_key::MetaKeyBuilder;
