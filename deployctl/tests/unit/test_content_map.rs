//! Content map tests

use deployctl::errors::ClientError;
use deployctl::files::{content_hash, ContentMap};
use tokio_test::{assert_err, assert_ok};

use crate::mock_api::tree;

#[test]
fn test_build_is_deterministic() {
    let (dir, first) = tree(&[
        ("index.html", "<html></html>"),
        ("assets/app.js", "console.log(1)"),
        ("assets/copy.js", "console.log(1)"),
    ]);
    let second = assert_ok!(ContentMap::build(dir.path(), &[], &[]));
    assert_eq!(first, second);
    assert_eq!(first.manifest(), second.manifest());
}

#[test]
fn test_hash_depends_on_bytes_only() {
    let (_a, left) = tree(&[("one/name.txt", "same bytes")]);
    let (_b, right) = tree(&[("other.bin", "same bytes")]);

    let left: Vec<&str> = left.hashes().collect();
    let right: Vec<&str> = right.hashes().collect();
    assert_eq!(left, right);
    assert_eq!(left[0], content_hash(b"same bytes"));
}

#[test]
fn test_names_use_forward_slashes() {
    let (_dir, content) = tree(&[("a/b/c.txt", "nested")]);
    let entry = content.get(&content_hash(b"nested")).unwrap();
    assert_eq!(entry.names.iter().next().map(String::as_str), Some("a/b/c.txt"));
}

#[test]
fn test_names_cover_duplicated_contents() {
    let (_dir, content) = tree(&[("b.txt", "same"), ("a.txt", "same"), ("c.txt", "other")]);
    assert_eq!(content.len(), 2);
    assert_eq!(content.names(), vec!["a.txt", "b.txt", "c.txt"]);
}

#[test]
fn test_totals() {
    let (_dir, content) = tree(&[("a", "12345"), ("b", "12345"), ("c", "123")]);
    assert_eq!(content.len(), 2);
    assert_eq!(content.file_count(), 3);
    assert_eq!(content.total_size(), 8);
}

#[test]
fn test_build_off_the_executor() {
    let (dir, expected) = tree(&[("a.txt", "alpha"), ("sub/b.txt", "beta")]);
    let built = tokio_test::block_on(async {
        ContentMap::build_async(dir.path().to_path_buf(), Vec::new(), vec!["sub".to_string()]).await
    });
    let built = assert_ok!(built);
    assert_eq!(built.len(), 1);
    assert!(expected.contains(&content_hash(b"beta")));
    assert!(!built.contains(&content_hash(b"beta")));
}

#[test]
fn test_missing_root_is_a_file_system_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = assert_err!(ContentMap::build(&dir.path().join("gone"), &[], &[]));
    assert!(matches!(err, ClientError::FileSystem { .. }));
}
