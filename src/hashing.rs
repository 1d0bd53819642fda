//! Content digests for the ContentFilter cascade: head, tail and full-file
//! windows, each producing `(hex digest, bytes read)`. Grounded on the
//! teacher's `engine::hashing::hash_file` for the chunked-read shape, and
//! on `original_source/filestat/fs_idle_hasher.go` for the disabled/`none`
//! pseudo-digest.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use sha2::{Digest, Sha256};

/// Chunk size for buffered reads, kept in step with the teacher's
/// `HashingConsts::HASH_READ_CHUNK_SIZE`.
const READ_CHUNK_SIZE: usize = 1024 * 1024;

/// Pseudo-digest returned by the disabled hash algorithm, mirroring the Go
/// original's `idleHasher`.
pub const EMPTY_CHECKSUM: &str = "-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgo {
    Sha256,
    Blake3,
    /// Disabled: reads nothing, returns `EMPTY_CHECKSUM`.
    None,
}

impl HashAlgo {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "sha256" => Some(HashAlgo::Sha256),
            "blake3" => Some(HashAlgo::Blake3),
            "" | "none" => Some(HashAlgo::None),
            _ => None,
        }
    }
}

/// One stage in the head/tail/full cascade.
#[derive(Debug, Clone)]
pub struct HashStageSpec {
    pub name: String,
    pub kind: StageKind,
    pub algo: HashAlgo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Head(u64),
    Tail(u64),
    Full,
}

enum Digester {
    Sha256(Sha256),
    Blake3(blake3::Hasher),
}

impl Digester {
    fn new(algo: HashAlgo) -> Self {
        match algo {
            HashAlgo::Sha256 => Digester::Sha256(Sha256::new()),
            HashAlgo::Blake3 => Digester::Blake3(blake3::Hasher::new()),
            HashAlgo::None => unreachable!("idle hash short-circuits before a digester is built"),
        }
    }

    fn update(&mut self, chunk: &[u8]) {
        match self {
            Digester::Sha256(h) => h.update(chunk),
            Digester::Blake3(h) => {
                h.update(chunk);
            }
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            Digester::Sha256(h) => to_hex(&h.finalize()),
            Digester::Blake3(h) => h.finalize().to_hex().to_string(),
        }
    }
}

fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(s, "{b:02x}").unwrap();
    }
    s
}

/// Computes `kind` over `path` with `algo`, returning `(hex digest, bytes
/// read)`. The idle algorithm short-circuits to `EMPTY_CHECKSUM` without
/// opening the file, matching `idleHasher`'s no-op `Write`.
pub fn hash_range(path: &Path, kind: StageKind, algo: HashAlgo) -> std::io::Result<(String, u64)> {
    if algo == HashAlgo::None {
        return Ok((EMPTY_CHECKSUM.to_string(), 0));
    }

    let mut file = File::open(path)?;
    let file_len = file.metadata()?.len();
    let mut digester = Digester::new(algo);
    let mut buf = vec![0u8; READ_CHUNK_SIZE];
    let mut bytes_read: u64 = 0;

    match kind {
        StageKind::Full => loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            digester.update(&buf[..n]);
            bytes_read += n as u64;
        },
        StageKind::Head(window) => {
            let mut remaining = window.min(file_len);
            while remaining > 0 {
                let want = remaining.min(buf.len() as u64) as usize;
                let n = file.read(&mut buf[..want])?;
                if n == 0 {
                    break;
                }
                digester.update(&buf[..n]);
                bytes_read += n as u64;
                remaining -= n as u64;
            }
        }
        StageKind::Tail(window) => {
            let window = window.min(file_len);
            file.seek(SeekFrom::End(-(window as i64)))?;
            let mut remaining = window;
            while remaining > 0 {
                let want = remaining.min(buf.len() as u64) as usize;
                let n = file.read(&mut buf[..want])?;
                if n == 0 {
                    break;
                }
                digester.update(&buf[..n]);
                bytes_read += n as u64;
                remaining -= n as u64;
            }
        }
    }

    Ok((digester.finalize_hex(), bytes_read))
}

/// Extends the accumulated checksum with a new stage digest, `&`-joined per
/// spec.md's ContentChecksum definition; an empty accumulator becomes just
/// the new digest.
pub fn extend_checksum(acc: &str, digest: &str) -> String {
    if acc.is_empty() {
        digest.to_string()
    } else {
        format!("{acc}&{digest}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn idle_hash_never_opens_the_file() {
        let (digest, bytes) =
            hash_range(Path::new("/does/not/exist"), StageKind::Full, HashAlgo::None).unwrap();
        assert_eq!(digest, EMPTY_CHECKSUM);
        assert_eq!(bytes, 0);
    }

    #[test]
    fn head_and_tail_read_only_their_window() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"0123456789").unwrap();
        let path = file.path();

        let (_digest, bytes) = hash_range(path, StageKind::Head(4), HashAlgo::Sha256).unwrap();
        assert_eq!(bytes, 4);

        let (_digest, bytes) = hash_range(path, StageKind::Tail(4), HashAlgo::Sha256).unwrap();
        assert_eq!(bytes, 4);

        let (_digest, bytes) = hash_range(path, StageKind::Full, HashAlgo::Sha256).unwrap();
        assert_eq!(bytes, 10);
    }

    #[test]
    fn extend_checksum_joins_with_ampersand() {
        assert_eq!(extend_checksum("", "a"), "a");
        assert_eq!(extend_checksum("a", "b"), "a&b");
    }

    #[test]
    fn blake3_and_sha256_disagree_on_same_input() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();
        let path = file.path();
        let (sha, _) = hash_range(path, StageKind::Full, HashAlgo::Sha256).unwrap();
        let (b3, _) = hash_range(path, StageKind::Full, HashAlgo::Blake3).unwrap();
        assert_ne!(sha, b3);
    }
}
