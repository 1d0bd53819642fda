//! Report writer: renders duplicate groups to batched `.dat` files. Grounded
//! on `original_source/output/results.go::SaveDupsResults` — a worker pool
//! of one goroutine per output file, a `#<index>: <file_count>(<inode_count>)
//! <MCKey>` header per group followed by one line per sorted `FileStat`, and
//! the `<prefix>_<p|f>_<timestamp>_<N>.dat` naming scheme from spec.md §6.
//! Each file is written to a `.tmp` sibling and renamed into place,
//! following the teacher's `utils::tempfiles::rename_temp_to_final` atomic-
//! write idiom.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use rayon::prelude::*;

use crate::pipeline::DuplicateGroup;

#[derive(Debug)]
pub struct WrittenFile {
    pub path: PathBuf,
    pub groups_written: usize,
    pub files_written: usize,
    pub bytes_written: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("creating output directory {0:?}: {1}")]
    CreateDir(PathBuf, std::io::Error),
    #[error("writing report file {0:?}: {1}")]
    Write(PathBuf, std::io::Error),
}

/// Writes `groups` to `output_dir`, `output_groups_per_file` groups per
/// file, named `<prefix>_<p|f>_<timestamp>_<n>.dat` (`p` for a cancelled/
/// partial run, `f` for a completed one, matching spec.md §6). Groups are
/// sorted by MCKey string (`GetKeysSortedByMid` in the original) so output
/// ordering is stable across runs given the same input. Returns the files
/// actually written, one entry per worker, mirroring `SaveDupsReport`.
pub fn write_report(
    groups: &[DuplicateGroup],
    output_dir: &Path,
    output_file_prefix: &str,
    groups_per_file: usize,
    completed: bool,
    now: SystemTime,
) -> Result<Vec<WrittenFile>, ReportError> {
    if groups.is_empty() {
        return Ok(Vec::new());
    }
    std::fs::create_dir_all(output_dir)
        .map_err(|e| ReportError::CreateDir(output_dir.to_path_buf(), e))?;

    let mut sorted: Vec<&DuplicateGroup> = groups.iter().collect();
    sorted.sort_by(|a, b| a.mckey.to_string().cmp(&b.mckey.to_string()));

    let marker = if completed { "f" } else { "p" };
    let ts = format_timestamp(now);
    let groups_per_file = groups_per_file.max(1);

    let chunks: Vec<(usize, &[&DuplicateGroup])> = sorted.chunks(groups_per_file).enumerate().collect();

    chunks
        .into_par_iter()
        .map(|(file_num, chunk)| {
            let file_path = output_dir.join(format!(
                "{output_file_prefix}_{marker}_{ts}_{}.dat",
                file_num + 1
            ));
            write_one_file(&file_path, chunk, file_num * groups_per_file)
        })
        .collect()
}

fn write_one_file(
    final_path: &Path,
    chunk: &[&DuplicateGroup],
    index_from: usize,
) -> Result<WrittenFile, ReportError> {
    let temp_path = final_path.with_extension("dat.tmp");
    let file = File::create(&temp_path).map_err(|e| ReportError::Write(temp_path.clone(), e))?;
    let mut writer = BufWriter::new(file);
    let mut bytes_written = 0u64;
    let mut files_written = 0usize;

    for (i, group) in chunk.iter().enumerate() {
        let inode_count: HashSet<_> = group.files.iter().map(|fs| fs.inode).collect();
        let header = format!(
            "#{}: {}({}) {}\n",
            index_from + i + 1,
            group.files.len(),
            inode_count.len(),
            group.mckey
        );
        write_bytes(&mut writer, &header, &temp_path)?;
        bytes_written += header.len() as u64;
        for fs in &group.files {
            let line = format!("{fs}\n");
            write_bytes(&mut writer, &line, &temp_path)?;
            bytes_written += line.len() as u64;
            files_written += 1;
        }
    }
    writer
        .flush()
        .map_err(|e| ReportError::Write(temp_path.clone(), e))?;
    drop(writer);
    std::fs::rename(&temp_path, final_path).map_err(|e| ReportError::Write(final_path.to_path_buf(), e))?;

    Ok(WrittenFile {
        path: final_path.to_path_buf(),
        groups_written: chunk.len(),
        files_written,
        bytes_written,
    })
}

fn write_bytes(writer: &mut impl Write, s: &str, path: &Path) -> Result<(), ReportError> {
    writer
        .write_all(s.as_bytes())
        .map_err(|e| ReportError::Write(path.to_path_buf(), e))
}

/// `yyyyMMdd_HHmmss`, matching the Go original's `time.Now().Format("20060102_150405")`.
fn format_timestamp(t: SystemTime) -> String {
    let secs = t.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64;
    let days = secs.div_euclid(86400);
    let rem = secs.rem_euclid(86400);
    let (hour, minute, second) = (rem / 3600, (rem % 3600) / 60, rem % 60);

    let z = days + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = z - era * 146097;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = if month <= 2 { y + 1 } else { y };

    format!("{year:04}{month:02}{day:02}_{hour:02}{minute:02}{second:02}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::McKey;
    use std::sync::Arc;

    fn group(checksum: &str, inode: u64) -> DuplicateGroup {
        DuplicateGroup {
            mckey: McKey {
                meta_key: "k".into(),
                checksum: checksum.into(),
            },
            files: vec![Arc::new(crate::model::FileStatData {
                path: PathBuf::from(format!("/tmp/{inode}")),
                base_name: inode.to_string(),
                inode,
                size: 10,
                blksize: 4096,
                blocks: 1,
                perm: 0o644,
                uid: 0,
                gid: 0,
                user: "root".into(),
                group: "root".into(),
                mtime: UNIX_EPOCH,
                is_regular: true,
                nlink: 1,
                symlink: None,
                meta_key: "k".into(),
                priority_tag: "00".into(),
                sort_key: format!("{inode:020}"),
            })],
        }
    }

    #[test]
    fn no_groups_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let written = write_report(&[], dir.path(), "dup", 10, true, UNIX_EPOCH).unwrap();
        assert!(written.is_empty());
        assert!(!dir.path().join("dup_f_19700101_000000_1.dat").exists());
    }

    #[test]
    fn batches_groups_per_file_and_names_by_completion() {
        let dir = tempfile::tempdir().unwrap();
        let groups = vec![group("a", 1), group("b", 2), group("c", 3)];
        let written = write_report(&groups, dir.path(), "dup", 2, false, UNIX_EPOCH).unwrap();
        assert_eq!(written.len(), 2);
        assert!(written[0].path.file_name().unwrap().to_string_lossy().contains("_p_"));
        let contents = std::fs::read_to_string(&written[0].path).unwrap();
        assert!(contents.starts_with("#1: 1(1)"));
    }

    #[test]
    fn format_timestamp_epoch() {
        assert_eq!(format_timestamp(UNIX_EPOCH), "19700101_000000");
    }
}
