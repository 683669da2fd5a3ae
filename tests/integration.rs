//! End-to-end scenarios exercising the public engine/bulk surface against a real
//! temporary repository directory, mirroring how the CLI drives the crate.

use efs_vault::config::KdfParams;
use efs_vault::{bulk, engine, error::VaultError, gc};
use tempfile::tempdir;

fn fast_params() -> KdfParams {
    KdfParams {
        t_cost: 1,
        m_cost_kib: 8,
        parallelism: 1,
    }
}

#[test]
fn init_creates_header_and_unlocks_to_an_empty_catalog() {
    let dir = tempdir().unwrap();
    engine::init(dir.path(), "correct horse", fast_params(), false).unwrap();

    let catalog_bytes = std::fs::read(dir.path().join("vault.enc")).unwrap();
    assert!(catalog_bytes.len() > 45);

    let unlocked = engine::unlock(dir.path(), "correct horse").unwrap();
    assert!(unlocked.catalog.files.is_empty());
}

#[test]
fn add_then_extract_recovers_original_bytes() {
    let dir = tempdir().unwrap();
    engine::init(dir.path(), "correct horse", fast_params(), false).unwrap();

    let src = dir.path().join("hello.txt");
    std::fs::write(&src, b"hello").unwrap();
    let id = engine::add(dir.path(), "correct horse", &src, None).unwrap();

    let blob_count = std::fs::read_dir(dir.path().join("blobs")).unwrap().count();
    assert_eq!(blob_count, 1);

    let out = dir.path().join("out.txt");
    engine::extract(dir.path(), "correct horse", &id, &out).unwrap();
    assert_eq!(std::fs::read(&out).unwrap(), b"hello");
}

#[test]
fn wrong_passphrase_fails_and_leaves_catalog_byte_identical() {
    let dir = tempdir().unwrap();
    engine::init(dir.path(), "correct horse", fast_params(), false).unwrap();

    let before = std::fs::read(dir.path().join("vault.enc")).unwrap();
    assert!(matches!(
        engine::unlock(dir.path(), "wrong"),
        Err(VaultError::AuthenticationFailure)
    ));
    let after = std::fs::read(dir.path().join("vault.enc")).unwrap();
    assert_eq!(before, after);
}

#[test]
fn bulk_add_of_one_hundred_files_commits_once() {
    let dir = tempdir().unwrap();
    engine::init(dir.path(), "correct horse", fast_params(), false).unwrap();

    let mut tasks = Vec::new();
    for i in 0..100 {
        let path = dir.path().join(format!("f{i}.bin"));
        std::fs::write(&path, [i as u8]).unwrap();
        tasks.push(bulk::AddTask {
            source_path: path,
            relpath: format!("f{i}.bin"),
        });
    }

    let report = bulk::bulk_add(dir.path(), "correct horse", tasks, None).unwrap();
    assert_eq!(report.added_ids.len(), 100);
    assert!(report.failures.is_empty());

    let unlocked = engine::unlock(dir.path(), "correct horse").unwrap();
    assert_eq!(unlocked.catalog.files.len(), 100);

    let blob_count = std::fs::read_dir(dir.path().join("blobs")).unwrap().count();
    assert_eq!(blob_count, 100);

    // the catalog itself round-trips through the codec via unlock succeeding at all
    let ids: std::collections::HashSet<_> =
        unlocked.catalog.files.iter().map(|f| f.id.clone()).collect();
    assert_eq!(ids.len(), 100);
}

#[test]
fn rotate_master_changes_salt_and_wraps_but_blobs_and_plaintext_survive() {
    let dir = tempdir().unwrap();
    engine::init(dir.path(), "correct horse", fast_params(), false).unwrap();

    let src = dir.path().join("a.txt");
    std::fs::write(&src, b"top secret").unwrap();
    let id = engine::add(dir.path(), "correct horse", &src, None).unwrap();

    engine::rotate_master(dir.path(), "correct horse", Some("tr0ub4dor"), None).unwrap();

    assert!(matches!(
        engine::unlock(dir.path(), "correct horse"),
        Err(VaultError::AuthenticationFailure)
    ));

    let out = dir.path().join("out.txt");
    engine::extract(dir.path(), "tr0ub4dor", &id, &out).unwrap();
    assert_eq!(std::fs::read(&out).unwrap(), b"top secret");
}

#[test]
fn interrupted_add_leaves_the_pre_add_catalog_valid() {
    // Simulates "kill the process between writing a blob and the atomic catalog swap":
    // write an orphan blob by hand, without ever touching the catalog, and confirm the
    // vault is still fully usable and the orphan is invisible until gc is run.
    let dir = tempdir().unwrap();
    engine::init(dir.path(), "correct horse", fast_params(), false).unwrap();

    std::fs::write(dir.path().join("blobs").join("orphan.bin"), b"leftover").unwrap();

    let unlocked = engine::unlock(dir.path(), "correct horse").unwrap();
    assert!(unlocked.catalog.files.is_empty());

    let removed = gc::gc(dir.path(), "correct horse").unwrap();
    assert_eq!(removed, vec!["orphan".to_string()]);
}

#[test]
fn corrupted_blob_byte_is_reported_as_corrupt_blob() {
    let dir = tempdir().unwrap();
    engine::init(dir.path(), "correct horse", fast_params(), false).unwrap();

    let src = dir.path().join("a.txt");
    std::fs::write(&src, b"secret bytes").unwrap();
    let id = engine::add(dir.path(), "correct horse", &src, None).unwrap();

    let blob_path = dir.path().join("blobs").join(format!("{id}.bin"));
    let mut bytes = std::fs::read(&blob_path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    std::fs::write(&blob_path, bytes).unwrap();

    let out = dir.path().join("out.txt");
    assert!(matches!(
        engine::extract(dir.path(), "correct horse", &id, &out),
        Err(VaultError::CorruptBlob)
    ));
}
