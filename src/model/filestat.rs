//! `FileStat`: the immutable record the Validator produces for every path
//! that survives stat resolution. Grounded on
//! `original_source/filestat/{fs,fs_unix,fs_meta,fs_priority}.go`. Unlike
//! the Go original's interface-behind-a-constructor-function split, this is
//! a concrete struct shared via `Arc` — sharing-without-mutation is the
//! invariant spec.md calls for, and Rust gives us that for free once the
//! struct has no interior mutability.

use std::ffi::CStr;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::{Error, Kind, OperationPath, Severity};
use crate::model::meta_key::MetaKeyBuilder;

/// Filesystem identity shared by every hardlink to the same content.
pub type Inode = u64;

#[derive(Debug)]
pub struct FileStatData {
    pub path: PathBuf,
    pub base_name: String,
    pub inode: Inode,
    pub size: u64,
    pub blksize: i64,
    pub blocks: u64,
    pub perm: u32,
    pub uid: u32,
    pub gid: u32,
    pub user: String,
    pub group: String,
    pub mtime: SystemTime,
    pub is_regular: bool,
    pub nlink: u64,
    /// The original symlink's own (path, name, priority) view, present only
    /// when this FileStat was built by resolving a symlink target.
    pub symlink: Option<Arc<FileStatData>>,
    pub meta_key: String,
    pub priority_tag: String,
    pub sort_key: String,
}

pub type FileStat = Arc<FileStatData>;

impl FileStatData {
    pub fn mtime_unix_nanos(&self) -> i128 {
        self.mtime
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as i128)
            .unwrap_or(0)
    }

    /// `ceil(size, blksize)`, computed with integer arithmetic so large
    /// files never lose precision through a float round-trip. Replaces the
    /// Go original's `math.Ceil(float64(size/blksize))`, which applies
    /// `Ceil` to an already-truncated integer division and is therefore
    /// always a no-op.
    pub fn blocks_ceil(size: u64, blksize: i64) -> u64 {
        let blksize = blksize.max(1) as u64;
        (size + blksize - 1) / blksize
    }

    /// The path/name that should be displayed: the link's, when this
    /// FileStat describes a resolved symlink target.
    pub fn display_path(&self) -> &Path {
        match &self.symlink {
            Some(link) => &link.path,
            None => &self.path,
        }
    }
}

impl std::fmt::Display for FileStatData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (inode, nlink) = match &self.symlink {
            Some(link) => (link.inode, link.nlink),
            None => (self.inode, self.nlink),
        };
        let mtime = format_mtime(self.mtime);
        let path = match &self.symlink {
            Some(link) => format!("{} -> {}", self.path.display(), link.path.display()),
            None => self.path.display().to_string(),
        };
        write!(
            f,
            "{:>10}({:>2})|{:>10o}|{:>12}|{:>26}|{}:{}|{}",
            inode, nlink, self.perm, self.size, mtime, self.user, self.group, path
        )
    }
}

/// Two-digit string equal to the index of the highest-indexed root the
/// path falls under, falling back to `0` when no root matches.
pub fn priority_tag(path: &Path, roots: &[PathBuf]) -> String {
    let mut prior = 0usize;
    for (idx, root) in roots.iter().enumerate().rev() {
        if path.starts_with(root) {
            prior = idx;
            break;
        }
    }
    format!("{:02}", prior)
}

fn build_sort_key(fs: &FileStatData) -> String {
    let symlink_flag = if fs.symlink.is_some() { "1" } else { "0" };
    format!(
        "{}{}{:020}{:>8}{:>8}{}",
        fs.priority_tag,
        symlink_flag,
        fs.mtime_unix_nanos(),
        fs.uid,
        fs.gid,
        fs.display_path().display()
    )
}

fn lookup_user(uid: u32) -> Result<String, Error> {
    unsafe {
        let mut buf = vec![0i8; 16384];
        let mut pwd: libc::passwd = std::mem::zeroed();
        let mut result: *mut libc::passwd = std::ptr::null_mut();
        let rc = libc::getpwuid_r(uid, &mut pwd, buf.as_mut_ptr(), buf.len(), &mut result);
        if rc == 0 && !result.is_null() {
            Ok(CStr::from_ptr(pwd.pw_name).to_string_lossy().into_owned())
        } else {
            Err(Error::new(
                Kind::UserLookup,
                Severity::Warning,
                OperationPath::new(),
                format!("no passwd entry for uid {uid}"),
            ))
        }
    }
}

fn lookup_group(gid: u32) -> Result<String, Error> {
    unsafe {
        let mut buf = vec![0i8; 16384];
        let mut grp: libc::group = std::mem::zeroed();
        let mut result: *mut libc::group = std::ptr::null_mut();
        let rc = libc::getgrgid_r(gid, &mut grp, buf.as_mut_ptr(), buf.len(), &mut result);
        if rc == 0 && !result.is_null() {
            Ok(CStr::from_ptr(grp.gr_name).to_string_lossy().into_owned())
        } else {
            Err(Error::new(
                Kind::UserLookup,
                Severity::Warning,
                OperationPath::new(),
                format!("no group entry for gid {gid}"),
            ))
        }
    }
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or_else(|| path.as_os_str())
        .to_string_lossy()
        .into_owned()
}

/// Minimal RFC1123-ish rendering of a `SystemTime` with no extra date-time
/// dependency: civil calendar conversion from days-since-epoch, the same
/// technique `time`/`chrono` use internally.
fn format_mtime(t: SystemTime) -> String {
    let secs = t
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs() as i64;
    let days = secs.div_euclid(86400);
    let rem = secs.rem_euclid(86400);
    let (hour, minute, second) = (rem / 3600, (rem % 3600) / 60, rem % 60);

    // Civil-from-days algorithm (Howard Hinnant's `civil_from_days`).
    let z = days + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as i64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = if month <= 2 { y + 1 } else { y };

    format!(
        "{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02} UTC"
    )
}

fn raw_file_stat(
    path: PathBuf,
    meta: &std::fs::Metadata,
    meta_key: &MetaKeyBuilder,
    compute_meta_key: bool,
    roots: &[PathBuf],
    prior_path: &Path,
    symlink: Option<Arc<FileStatData>>,
) -> Result<Arc<FileStatData>, Error> {
    let uid = meta.uid();
    let gid = meta.gid();
    let user = lookup_user(uid)?;
    let group = lookup_group(gid)?;
    let blocks = FileStatData::blocks_ceil(meta.len(), meta.blksize() as i64);

    let mut fs = FileStatData {
        base_name: base_name(&path),
        path,
        inode: meta.ino(),
        size: meta.len(),
        blksize: meta.blksize() as i64,
        blocks,
        perm: meta.mode() & 0o777,
        uid,
        gid,
        user,
        group,
        mtime: meta.modified().unwrap_or(UNIX_EPOCH),
        is_regular: meta.is_file(),
        nlink: meta.nlink(),
        symlink,
        meta_key: String::new(),
        priority_tag: priority_tag(prior_path, roots),
        sort_key: String::new(),
    };
    if compute_meta_key {
        fs.meta_key = meta_key.build(&fs);
    }
    fs.sort_key = build_sort_key(&fs);
    Ok(Arc::new(fs))
}

/// Builds a FileStat for `path`. `lstat`s first; if the entry is a symlink
/// and `symlinks_enabled`, resolves the target and returns a FileStat whose
/// identity/metadata come from the target but whose displayed path, name
/// and priority tag come from the link, per spec.md's symlink invariant.
pub fn build_file_stat(
    path: &Path,
    symlinks_enabled: bool,
    meta_key: &MetaKeyBuilder,
    roots: &[PathBuf],
) -> Result<Arc<FileStatData>, Error> {
    let lstat = std::fs::symlink_metadata(path).map_err(|e| {
        Error::new(
            Kind::Stat,
            Severity::Warning,
            OperationPath::new(),
            format!("lstat {} failed: {e}", path.display()),
        )
        .with_source(e)
    })?;

    if lstat.file_type().is_symlink() {
        if !symlinks_enabled {
            return Err(Error::new(
                Kind::FileStat,
                Severity::Info,
                OperationPath::new(),
                format!("symlink processing is disabled [{}]", path.display()),
            ));
        }
        let target_path = std::fs::canonicalize(path).map_err(|e| {
            Error::new(
                Kind::Stat,
                Severity::Warning,
                OperationPath::new(),
                format!("unresolved symlink [{}]: {e}", path.display()),
            )
            .with_source(e)
        })?;
        let target_meta = std::fs::metadata(&target_path).map_err(|e| {
            Error::new(
                Kind::Stat,
                Severity::Warning,
                OperationPath::new(),
                format!(
                    "stat of symlink target [{}] for [{}] failed: {e}",
                    target_path.display(),
                    path.display()
                ),
            )
            .with_source(e)
        })?;

        let link_stat = raw_file_stat(
            path.to_path_buf(),
            &lstat,
            meta_key,
            false,
            roots,
            path,
            None,
        )?;
        raw_file_stat(
            target_path,
            &target_meta,
            meta_key,
            true,
            roots,
            path,
            Some(link_stat),
        )
    } else {
        raw_file_stat(path.to_path_buf(), &lstat, meta_key, true, roots, path, None)
    }
}

/// `is_regular ∧ min_size ≤ size ≤ max_size`. `max_size < 0` means
/// unbounded, per spec.md's config table.
pub fn validate_regular_size(fs: &FileStatData, min_size: u64, max_size: i64) -> bool {
    if !fs.is_regular {
        return false;
    }
    if fs.size < min_size {
        return false;
    }
    if max_size >= 0 && fs.size > max_size as u64 {
        return false;
    }
    true
}

/// The spec's "small-file bypass" predicate: does this FileStat's size (or
/// block count, when `in_blocks`) fall below the prefilter threshold.
pub fn below_prefilter_threshold(fs: &FileStatData, threshold: u64, in_blocks: bool) -> bool {
    if in_blocks {
        fs.blocks < threshold
    } else {
        fs.size < threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_ceil_rounds_up() {
        assert_eq!(FileStatData::blocks_ceil(4096, 4096), 1);
        assert_eq!(FileStatData::blocks_ceil(4097, 4096), 2);
        assert_eq!(FileStatData::blocks_ceil(0, 4096), 0);
    }

    #[test]
    fn priority_tag_picks_highest_matching_root_falling_back_to_zero() {
        let roots = vec![PathBuf::from("/a"), PathBuf::from("/b"), PathBuf::from("/a/c")];
        assert_eq!(priority_tag(Path::new("/a/c/x"), &roots), "02");
        assert_eq!(priority_tag(Path::new("/b/x"), &roots), "01");
        assert_eq!(priority_tag(Path::new("/elsewhere"), &roots), "00");
    }
}
