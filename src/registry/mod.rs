//! Shared, concurrently-accessed registries coordinating the pipeline:
//! metadata buckets, per-stage content buckets, per-stage single-flight
//! hashing state, and the one-shot latch they wait on. Each registry owns
//! its map behind a narrow `check_in`/`snapshot`/`counter` surface, never
//! an ambient lock at the call site, per spec.md's DESIGN NOTES.

pub mod inode_checksum;
pub mod latch;
pub mod meta_register;
pub mod stage_register;

pub use inode_checksum::{CheckIn, InodeChecksumTable};
pub use latch::Latch;
pub use meta_register::MetaRegister;
pub use stage_register::{McKey, StageRegister};
