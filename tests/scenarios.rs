//! Integration tests exercising the pipeline end to end through the public
//! library API, one per spec scenario (S1-S6).

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use dupfinder::cancel::CancellationToken;
use dupfinder::config::Config;
use dupfinder::hashing::{HashAlgo, HashStageSpec, StageKind};

fn base_config(dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.roots = vec![dir.to_path_buf()];
    config.patterns = vec!["*".to_string()];
    config.hash_stages = vec![HashStageSpec {
        name: "full".into(),
        kind: StageKind::Full,
        algo: HashAlgo::Sha256,
    }];
    config
}

fn write_file(path: &std::path::Path, contents: &[u8]) {
    std::fs::File::create(path).unwrap().write_all(contents).unwrap();
}

#[test]
fn s1_identical_twins_form_one_group() {
    let dir = tempfile::tempdir().unwrap();
    write_file(&dir.path().join("a.bin"), &[9u8; 1024]);
    write_file(&dir.path().join("b.bin"), &[9u8; 1024]);

    let config = Arc::new(base_config(dir.path()));
    let outcome = dupfinder::find_duplicates(config, CancellationToken::new());

    assert!(outcome.completed);
    assert_eq!(outcome.groups.len(), 1);
    assert_eq!(outcome.groups[0].files.len(), 2);
}

#[test]
fn s2_meta_split_by_permission_yields_no_groups() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.bin");
    let b = dir.path().join("b.bin");
    write_file(&a, &[3u8; 64]);
    write_file(&b, &[3u8; 64]);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&a, std::fs::Permissions::from_mode(0o644)).unwrap();
        std::fs::set_permissions(&b, std::fs::Permissions::from_mode(0o600)).unwrap();
    }

    let mut config = base_config(dir.path());
    config.meta_groups = "p".to_string();
    let outcome = dupfinder::find_duplicates(Arc::new(config), CancellationToken::new());

    assert!(outcome.groups.is_empty());
}

#[test]
#[cfg(unix)]
fn s3_hardlink_pair_forms_one_group_of_two_paths() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.bin");
    let b = dir.path().join("b.bin");
    write_file(&a, &[5u8; 256]);
    std::fs::hard_link(&a, &b).unwrap();

    let config = Arc::new(base_config(dir.path()));
    let outcome = dupfinder::find_duplicates(config, CancellationToken::new());

    assert_eq!(outcome.groups.len(), 1);
    let group = &outcome.groups[0];
    assert_eq!(group.files.len(), 2);
    let inode = group.files[0].inode;
    assert!(group.files.iter().all(|f| f.inode == inode));
    let mut paths: Vec<_> = group.files.iter().map(|f| f.path.clone()).collect();
    paths.sort();
    let mut expected = vec![a, b];
    expected.sort();
    assert_eq!(paths, expected);
}

#[test]
fn s4_prefilter_prune_keeps_only_shared_prefix_pair() {
    let dir = tempfile::tempdir().unwrap();
    let shared_head = vec![1u8; 512];
    let shared_tail = vec![2u8; 512];
    let mut a = shared_head.clone();
    a.extend(vec![9u8; 4096 - 1024]);
    a.extend(shared_tail.clone());
    let b = a.clone();

    // C shares only the head window with A/B; its tail and full content differ.
    let mut c = shared_head.clone();
    c.extend(vec![8u8; 4096 - 1024]);
    c.extend(vec![7u8; 512]);

    write_file(&dir.path().join("a.bin"), &a);
    write_file(&dir.path().join("b.bin"), &b);
    write_file(&dir.path().join("c.bin"), &c);

    let mut config = base_config(dir.path());
    config.hash_stages = vec![
        HashStageSpec {
            name: "head".into(),
            kind: StageKind::Head(512),
            algo: HashAlgo::Sha256,
        },
        HashStageSpec {
            name: "tail".into(),
            kind: StageKind::Tail(512),
            algo: HashAlgo::Sha256,
        },
        HashStageSpec {
            name: "full".into(),
            kind: StageKind::Full,
            algo: HashAlgo::Sha256,
        },
    ];
    let outcome = dupfinder::find_duplicates(Arc::new(config), CancellationToken::new());

    assert_eq!(outcome.groups.len(), 1);
    assert_eq!(outcome.groups[0].files.len(), 2);
    let names: Vec<String> = outcome.groups[0]
        .files
        .iter()
        .map(|f| f.base_name.clone())
        .collect();
    assert!(names.contains(&"a.bin".to_string()));
    assert!(names.contains(&"b.bin".to_string()));
    assert!(!names.contains(&"c.bin".to_string()));
}

#[test]
fn s5_small_file_bypasses_prefilter_stages() {
    let dir = tempfile::tempdir().unwrap();
    write_file(&dir.path().join("a.bin"), &[4u8; 100]);
    write_file(&dir.path().join("b.bin"), &[4u8; 100]);

    let mut config = base_config(dir.path());
    config.hash_stages = vec![
        HashStageSpec {
            name: "head".into(),
            kind: StageKind::Head(512),
            algo: HashAlgo::Sha256,
        },
        HashStageSpec {
            name: "tail".into(),
            kind: StageKind::Tail(512),
            algo: HashAlgo::Sha256,
        },
        HashStageSpec {
            name: "full".into(),
            kind: StageKind::Full,
            algo: HashAlgo::Sha256,
        },
    ];
    let outcome = dupfinder::find_duplicates(Arc::new(config), CancellationToken::new());

    assert_eq!(outcome.groups.len(), 1);
    assert_eq!(outcome.groups[0].files.len(), 2);
}

#[test]
fn s6_cancellation_reaches_quiescence_and_marks_partial() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..50 {
        write_file(&dir.path().join(format!("f{i}.bin")), &vec![i as u8; 4096]);
    }

    let config = Arc::new(base_config(dir.path()));
    let cancel = CancellationToken::new();
    let (_meta, handle) = dupfinder::find_duplicates_with_handle(config, cancel.clone());

    cancel.cancel();
    let outcome = handle
        .join()
        .expect("pipeline thread must not panic or deadlock under cancellation");

    assert!(!outcome.completed);
}

#[test]
fn no_duplicates_among_distinct_files_yields_no_groups() {
    let dir = tempfile::tempdir().unwrap();
    write_file(&dir.path().join("a.bin"), &[1u8; 32]);
    write_file(&dir.path().join("b.bin"), &[2u8; 32]);
    write_file(&dir.path().join("c.bin"), &[3u8; 32]);

    let config = Arc::new(base_config(dir.path()));
    let outcome = dupfinder::find_duplicates(config, CancellationToken::new());

    assert!(outcome.groups.is_empty());
}

#[test]
fn overlapping_patterns_do_not_duplicate_a_path_in_a_group() {
    let dir = tempfile::tempdir().unwrap();
    write_file(&dir.path().join("a.bin"), &[6u8; 128]);
    write_file(&dir.path().join("b.bin"), &[6u8; 128]);

    let mut config = base_config(dir.path());
    config.patterns = vec!["*".to_string(), "*.bin".to_string(), "a*".to_string()];
    let outcome = dupfinder::find_duplicates(Arc::new(config), CancellationToken::new());

    assert_eq!(outcome.groups.len(), 1);
    assert_eq!(outcome.groups[0].files.len(), 2);
}

#[test]
fn symlink_disabled_excludes_links_entirely() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("target.bin");
    write_file(&target, &[2u8; 64]);
    let link = dir.path().join("link.bin");
    #[cfg(unix)]
    std::os::unix::fs::symlink(&target, &link).unwrap();

    let mut config = base_config(dir.path());
    config.slink_enabled = false;
    let outcome = dupfinder::find_duplicates(Arc::new(config), CancellationToken::new());

    // Only the target exists as a regular file candidate; no duplicate group
    // since there's exactly one real file.
    assert!(outcome.groups.is_empty());
}

#[allow(dead_code)]
fn assert_send<T: Send>() {}

#[test]
fn runs_complete_within_a_generous_timeout() {
    let dir = tempfile::tempdir().unwrap();
    write_file(&dir.path().join("a.bin"), &[1u8; 16]);

    let config = Arc::new(base_config(dir.path()));
    let start = std::time::Instant::now();
    let _ = dupfinder::find_duplicates(config, CancellationToken::new());
    assert!(start.elapsed() < Duration::from_secs(10));
}
