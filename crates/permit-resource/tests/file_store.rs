//! File-backed claims: the whole file is rewritten and keeps its shape,
//! byte-for-byte outside the claimed line.

use permit_core::NodeId;
use permit_resource::{normalize, FileStore, LineStore, SharedResource};
use std::path::PathBuf;

fn scratch_file(name: &str, content: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("permit-{}-{}.txt", name, std::process::id()));
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn claim_rewrites_file_in_full() {
    let original = "hello\nw o w\nlevel\n12321\n";
    let path = scratch_file("claim", original);
    let store = FileStore::new(&path);

    let mut resource = SharedResource::new(store.load().unwrap());
    let claim = resource.claim_first(NodeId(4)).unwrap();
    store.persist(resource.lines()).unwrap();

    let written = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = written.lines().collect();

    assert_eq!(lines, vec!["hello", "4 4 4 ", "level", "12321"]);
    assert!(written.ends_with('\n'));
    assert_eq!(claim.index, 1);
    assert_eq!(normalize(lines[1]).len(), normalize("w o w").len());

    std::fs::remove_file(&path).unwrap();
}

#[test]
fn shorter_rewrite_leaves_no_trailing_bytes() {
    // The marker is shorter than the padded original line.
    let path = scratch_file("truncate", "a       a\n");
    let store = FileStore::new(&path);

    let mut resource = SharedResource::new(store.load().unwrap());
    resource.claim_first(NodeId(1)).unwrap();
    store.persist(resource.lines()).unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "1 1 \n");
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn file_without_target_is_not_modified() {
    let original = "abc\n0110\n\n";
    let path = scratch_file("untouched", original);
    let store = FileStore::new(&path);

    let mut resource = SharedResource::new(store.load().unwrap());
    assert!(resource.claim_first(NodeId(2)).is_none());
    assert_eq!(resource.len(), 3);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), original);

    std::fs::remove_file(&path).unwrap();
}

#[test]
fn crlf_line_endings_are_accepted() {
    let path = scratch_file("crlf", "abc\r\nxx\r\n");
    let store = FileStore::new(&path);

    let lines = store.load().unwrap();
    assert_eq!(lines, vec!["abc", "xx"]);
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn invalid_utf8_line_does_not_block_the_search() {
    let path = std::env::temp_dir().join(format!("permit-latin1-{}.txt", std::process::id()));
    std::fs::write(&path, b"caf\xe9\nanna\nna\xefve\n").unwrap();
    let store = FileStore::new(&path);

    let mut resource = SharedResource::new(store.load().unwrap());
    let claim = resource.claim_first(NodeId(3)).unwrap();
    store.persist(resource.lines()).unwrap();

    assert_eq!(claim.index, 1);
    assert_eq!(claim.matched, "anna");
    assert_eq!(
        std::fs::read(&path).unwrap(),
        b"caf\xe9\n3 3 3 3 \nna\xefve\n".to_vec()
    );
    std::fs::remove_file(&path).unwrap();
}
