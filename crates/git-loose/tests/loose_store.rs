use std::fs;
use std::io::Write;

use flate2::write::ZlibEncoder;
use git_hash::ObjectId;
use git_loose::{LooseError, LooseObjectStore};
use git_object::ObjectType;

fn store() -> (tempfile::TempDir, LooseObjectStore) {
    let dir = tempfile::tempdir().unwrap();
    let objects = dir.path().join("objects");
    fs::create_dir_all(&objects).unwrap();
    let store = LooseObjectStore::open(&objects);
    (dir, store)
}

fn write_compressed(path: &std::path::Path, raw: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut enc = ZlibEncoder::new(fs::File::create(path).unwrap(), flate2::Compression::default());
    enc.write_all(raw).unwrap();
    enc.finish().unwrap();
}

#[test]
fn write_then_read() {
    let (_dir, store) = store();
    let oid = store.write_raw(ObjectType::Blob, b"hello").unwrap();
    assert_eq!(oid.to_hex(), "b6fc4c620b67d95f953a5c1c1230aaab5db5a1b0");
    assert!(store.contains(&oid));
    assert!(store.exists_nonempty(&oid));

    let (t, data) = store.read(&oid).unwrap().unwrap();
    assert_eq!(t, ObjectType::Blob);
    assert_eq!(data, b"hello");
}

#[test]
fn rewrite_is_a_no_op() {
    let (_dir, store) = store();
    let a = store.write_raw(ObjectType::Blob, b"same").unwrap();
    let mtime = fs::metadata(store.object_path(&a)).unwrap().modified().unwrap();
    let b = store.write_raw(ObjectType::Blob, b"same").unwrap();
    assert_eq!(a, b);
    assert_eq!(fs::metadata(store.object_path(&a)).unwrap().modified().unwrap(), mtime);

    let leftovers: Vec<_> = fs::read_dir(store.objects_dir())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("tmp_obj_"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn missing_object_reads_as_none() {
    let (_dir, store) = store();
    assert!(store.read(&ObjectId::NULL).unwrap().is_none());
    assert!(!store.exists_nonempty(&ObjectId::NULL));
}

#[test]
fn empty_file_is_not_counted() {
    let (_dir, store) = store();
    let oid = ObjectType::Blob.hash(b"x").unwrap();
    let path = store.object_path(&oid);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, b"").unwrap();
    assert!(store.contains(&oid));
    assert!(!store.exists_nonempty(&oid));

    store.write_raw(ObjectType::Blob, b"x").unwrap();
    assert_eq!(store.read(&oid).unwrap().unwrap().1, b"x");
}

#[test]
fn size_mismatch_is_corrupt() {
    let (_dir, store) = store();
    let oid = ObjectType::Blob.hash(b"abc").unwrap();
    write_compressed(&store.object_path(&oid), b"blob 5\0abc");
    let err = store.read(&oid).unwrap_err();
    assert!(matches!(err, LooseError::Corrupt { .. }));
}

#[test]
fn garbage_is_a_decompress_error() {
    let (_dir, store) = store();
    let oid = ObjectType::Blob.hash(b"abc").unwrap();
    let path = store.object_path(&oid);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, b"not zlib at all").unwrap();
    assert!(matches!(store.read(&oid).unwrap_err(), LooseError::Decompress { .. }));
}

#[test]
fn concurrent_writers_agree() {
    let (_dir, store) = store();
    let store = std::sync::Arc::new(store);
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let s = store.clone();
            std::thread::spawn(move || s.write_raw(ObjectType::Blob, b"contended").unwrap())
        })
        .collect();
    let oids: Vec<ObjectId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(oids.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(store.read(&oids[0]).unwrap().unwrap().1, b"contended");
}
