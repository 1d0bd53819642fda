//! Builds a FileStat's `meta_key`: a string projection over a configurable
//! subset of {size, mtime, uid, gid, perm, name}, with disabled fields
//! rendered as `*`. Grounded on
//! `original_source/filestat/fs_meta.go::NewMetaKeyFunc` — field order
//! (size, mtime, uid, gid, perm, name) is kept identical to the original so
//! the resulting key format is a direct, readable analogue.

use super::filestat::FileStatData;

/// Which optional fields participate in the meta key. `size` has no flag:
/// spec.md requires it always on.
#[derive(Debug, Clone, Copy)]
pub struct MetaKeyBuilder {
    pub mtime: bool,
    pub uid: bool,
    pub gid: bool,
    pub perm: bool,
    pub name: bool,
}

impl MetaKeyBuilder {
    /// Parses the `meta_groups` config string over `{n,m,p,u,g}`.
    pub fn from_groups(groups: &str) -> Self {
        MetaKeyBuilder {
            mtime: groups.contains('m'),
            uid: groups.contains('u'),
            gid: groups.contains('g'),
            perm: groups.contains('p'),
            name: groups.contains('n'),
        }
    }

    pub fn build(&self, fs: &FileStatData) -> String {
        let mtime = if self.mtime {
            fs.mtime_unix_nanos().to_string()
        } else {
            "*".to_string()
        };
        let uid = if self.uid {
            fs.uid.to_string()
        } else {
            "*".to_string()
        };
        let gid = if self.gid {
            fs.gid.to_string()
        } else {
            "*".to_string()
        };
        let perm = if self.perm {
            format!("0{:o}", fs.perm)
        } else {
            "*".to_string()
        };
        let name = if self.name {
            match &fs.symlink {
                Some(link) => link.base_name.clone(),
                None => fs.base_name.clone(),
            }
        } else {
            "*".to_string()
        };
        format!(
            "size:{:>12};mt:{};uid:{};gid:{};perm:{};name:{}",
            fs.size, mtime, uid, gid, perm, name
        )
    }
}
