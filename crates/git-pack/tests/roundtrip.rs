use std::collections::HashMap;
use std::io::Write;

use git_hash::hasher::Hasher;
use git_hash::ObjectId;
use git_object::{Object, ObjectType, Tree, TreeEntry};
use git_pack::delta::{apply_delta, DeltaBuilder};
use git_pack::entry::encode_entry_header;
use git_pack::index::{pack_name, write_pack_idx};
use git_pack::writer::build_pack;
use git_pack::{
    CancellationToken, EntryKind, PackError, PackFile, PackIndex, PackReader, PackSource, PackWriter,
};
use proptest::prelude::*;

const COMMIT_HEADER: &str = "author A U Thor <a@example.com> 1700000000 +0000\n\
committer A U Thor <a@example.com> 1700000000 +0000\n\nmessage\n";

fn no_base(_: &ObjectId) -> Option<(ObjectType, Vec<u8>)> {
    None
}

fn commit_body(tree: ObjectId, parent: Option<ObjectId>) -> Vec<u8> {
    let mut s = format!("tree {tree}\n");
    if let Some(p) = parent {
        s.push_str(&format!("parent {p}\n"));
    }
    s.push_str(COMMIT_HEADER);
    s.into_bytes()
}

#[derive(Default)]
struct MemSource {
    objects: HashMap<ObjectId, (ObjectType, Vec<u8>)>,
    packed: Vec<ObjectId>,
}

impl MemSource {
    fn put(&mut self, t: ObjectType, data: &[u8]) -> ObjectId {
        let oid = t.hash(data).unwrap();
        self.objects.insert(oid, (t, data.to_vec()));
        oid
    }
}

impl PackSource for MemSource {
    fn read_raw(&self, oid: &ObjectId) -> Result<(ObjectType, Vec<u8>), PackError> {
        self.objects.get(oid).cloned().ok_or(PackError::MissingObject(*oid))
    }

    fn is_packed(&self, oid: &ObjectId) -> bool {
        self.packed.contains(oid)
    }
}

#[test]
fn single_commit_pack_holds_three_objects() {
    let mut src = MemSource::default();
    let blob = src.put(ObjectType::Blob, b"hello");
    let tree = Tree::new(vec![TreeEntry::file("a.txt", blob)]);
    let tree_oid = src.put(ObjectType::Tree, &tree.serialize());
    let commit = commit_body(tree_oid, None);

    let pack = build_pack(&[commit.clone()], &src, &CancellationToken::new()).unwrap();
    let parsed = PackReader::new(&pack.data)
        .unwrap()
        .parse_all(&no_base, &CancellationToken::new())
        .unwrap();

    assert_eq!(parsed.objects.len(), 3);
    assert_eq!(parsed.objects[0].obj_type, ObjectType::Commit);
    assert_eq!(parsed.objects[0].data, commit);
    // Blob before the tree that contains it.
    assert_eq!(parsed.objects[1].sha, blob);
    assert_eq!(parsed.objects[2].sha, tree_oid);

    let Object::Commit(decoded) = parsed.objects[0].decode().unwrap() else {
        panic!("first object is not a commit");
    };
    assert_eq!(decoded.tree, parsed.objects[2].sha);
    match parsed.objects[1].decode().unwrap() {
        Object::Blob(b) => assert_eq!(b.data, b"hello"),
        other => panic!("expected blob, got {other:?}"),
    }
    let reparsed = parsed.objects[2].decode().unwrap();
    let tree = reparsed.as_tree().unwrap();
    assert_eq!(tree.entries[0].name, "a.txt");
    assert_eq!(ObjectType::Tree.hash(&tree.serialize()).unwrap(), tree_oid);
}

#[test]
fn packed_and_shared_objects_are_skipped() {
    let mut src = MemSource::default();
    let shared = src.put(ObjectType::Blob, b"shared");
    let old = src.put(ObjectType::Blob, b"already on remote");
    let sub = src.put(
        ObjectType::Tree,
        &Tree::new(vec![TreeEntry::file("x", shared)]).serialize(),
    );
    let mut root = Tree::new(vec![
        TreeEntry::file("copy", shared),
        TreeEntry::file("old", old),
        TreeEntry::dir("sub", sub),
    ]);
    root.sort();
    let root_oid = src.put(ObjectType::Tree, &root.serialize());
    src.packed.push(old);

    let c1 = commit_body(root_oid, None);
    let c2 = commit_body(root_oid, Some(ObjectType::Commit.hash(&c1).unwrap()));
    let pack = build_pack(&[c2, c1], &src, &CancellationToken::new()).unwrap();

    let oids: Vec<ObjectId> = pack.entries.iter().map(|e| e.oid).collect();
    // two commits, one blob, subtree, root
    assert_eq!(oids.len(), 5);
    assert!(!oids.contains(&old));
    assert_eq!(oids.iter().filter(|o| **o == shared).count(), 1);
    let sub_pos = oids.iter().position(|o| *o == sub).unwrap();
    let root_pos = oids.iter().position(|o| *o == root_oid).unwrap();
    assert!(sub_pos < root_pos);
}

#[test]
fn packed_root_tree_is_not_resent() {
    let mut src = MemSource::default();
    let blob = src.put(ObjectType::Blob, b"unchanged");
    let tree = src.put(ObjectType::Tree, &Tree::new(vec![TreeEntry::file("f", blob)]).serialize());
    src.packed.extend([blob, tree]);

    let commit = commit_body(tree, None);
    let pack = build_pack(&[commit.clone()], &src, &CancellationToken::new()).unwrap();

    let oids: Vec<ObjectId> = pack.entries.iter().map(|e| e.oid).collect();
    assert_eq!(oids, vec![ObjectType::Commit.hash(&commit).unwrap()]);
}

#[test]
fn build_pack_stops_when_cancelled() {
    let mut src = MemSource::default();
    let blob = src.put(ObjectType::Blob, b"x");
    let tree = src.put(ObjectType::Tree, &Tree::new(vec![TreeEntry::file("x", blob)]).serialize());
    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = build_pack(&[commit_body(tree, None)], &src, &cancel).unwrap_err();
    assert!(matches!(err, PackError::Cancelled));
}

#[test]
fn ofs_delta_chain_resolves() {
    let a = b"the quick brown fox jumps over the lazy dog".to_vec();
    let b = [&a[..], b" again"].concat();
    let c = [&b"so "[..], &b[..]].concat();
    let b_oid = ObjectType::Blob.hash(&b).unwrap();
    let c_oid = ObjectType::Blob.hash(&c).unwrap();

    let d_ab = DeltaBuilder::new(a.len(), b.len()).copy(0, a.len()).insert(b" again").build();
    let d_bc = DeltaBuilder::new(b.len(), c.len()).insert(b"so ").copy(0, b.len()).build();
    assert_eq!(apply_delta(&a, &d_ab).unwrap(), b);

    let mut w = PackWriter::new();
    let (a_oid, a_off) = w.add_object(ObjectType::Blob, &a).unwrap();
    let b_off = w.add_ofs_delta(a_off, &d_ab, b_oid).unwrap();
    w.add_ofs_delta(b_off, &d_bc, c_oid).unwrap();
    let pack = w.finish().unwrap();

    let parsed = PackReader::new(&pack.data)
        .unwrap()
        .parse_all(&no_base, &CancellationToken::new())
        .unwrap();
    let shas: Vec<ObjectId> = parsed.objects.iter().map(|o| o.sha).collect();
    assert_eq!(shas, vec![a_oid, b_oid, c_oid]);
    assert_eq!(parsed.objects[2].data, c);
    assert!(parsed.objects.iter().all(|o| o.obj_type == ObjectType::Blob));

    // Same answers through the index-backed single object path.
    let idx = write_pack_idx(&pack.entries, &pack.checksum).unwrap();
    let file = PackFile::from_parts(pack.data, PackIndex::parse(idx).unwrap()).unwrap();
    let (t, data) = file.read_object(&c_oid, &no_base).unwrap().unwrap();
    assert_eq!((t, data), (ObjectType::Blob, c));
}

#[test]
fn ref_delta_with_missing_base_aborts() {
    let base = b"base content".to_vec();
    let base_oid = ObjectType::Blob.hash(&base).unwrap();
    let target = b"base content!".to_vec();
    let delta = DeltaBuilder::new(base.len(), target.len())
        .copy(0, base.len())
        .insert(b"!")
        .build();

    let mut w = PackWriter::new();
    w.add_object(ObjectType::Blob, b"unrelated").unwrap();
    w.add_ref_delta(&base_oid, &delta, ObjectType::Blob.hash(&target).unwrap())
        .unwrap();
    let pack = w.finish().unwrap();
    let reader = PackReader::new(&pack.data).unwrap();

    let err = reader.parse_all(&no_base, &CancellationToken::new()).unwrap_err();
    assert!(matches!(err, PackError::MissingBase(oid) if oid == base_oid));

    let external = |oid: &ObjectId| (*oid == base_oid).then(|| (ObjectType::Blob, base.clone()));
    let parsed = reader.parse_all(&external, &CancellationToken::new()).unwrap();
    assert_eq!(parsed.objects[1].data, target);
}

#[test]
fn corrupted_trailer_is_rejected() {
    let mut w = PackWriter::new();
    w.add_object(ObjectType::Blob, b"payload").unwrap();
    let mut data = w.finish().unwrap().data;
    let last = data.len() - 1;
    data[last] ^= 0xff;
    let err = PackReader::new(&data)
        .unwrap()
        .parse_all(&no_base, &CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, PackError::ChecksumMismatch { .. }));
}

/// A one-entry pack whose blob header declares `declared` bytes.
fn single_entry_pack(declared: u64, content: &[u8]) -> Vec<u8> {
    let mut data = b"PACK".to_vec();
    data.extend_from_slice(&2u32.to_be_bytes());
    data.extend_from_slice(&1u32.to_be_bytes());
    data.extend_from_slice(&encode_entry_header(EntryKind::Blob, declared));
    let mut zlib = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    zlib.write_all(content).unwrap();
    data.extend_from_slice(&zlib.finish().unwrap());
    let trailer = Hasher::digest(&data).unwrap();
    data.extend_from_slice(trailer.as_bytes());
    data
}

#[test]
fn entry_inflating_past_its_declared_size_is_corrupt() {
    let data = single_entry_pack(4, &[b'x'; 4096]);
    let err = PackReader::new(&data)
        .unwrap()
        .parse_all(&no_base, &CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, PackError::Corrupt { reason, .. } if reason.contains("inflates past")));
}

#[test]
fn huge_declared_size_fails_without_allocating_it() {
    let data = single_entry_pack(1 << 40, b"tiny");
    let err = PackReader::new(&data)
        .unwrap()
        .parse_all(&no_base, &CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, PackError::Corrupt { reason, .. } if reason.contains("declared")));
}

#[test]
fn pack_and_index_open_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let mut w = PackWriter::new();
    let (oid, _) = w.add_object(ObjectType::Blob, b"on disk").unwrap();
    let pack = w.finish().unwrap();
    let name = pack_name(&pack.entries).unwrap();
    assert!(name.starts_with("pack-") && name.len() == 45);

    let pack_path = dir.path().join(format!("{name}.pack"));
    std::fs::write(&pack_path, &pack.data).unwrap();
    std::fs::write(
        pack_path.with_extension("idx"),
        write_pack_idx(&pack.entries, &pack.checksum).unwrap(),
    )
    .unwrap();

    let file = PackFile::open(&pack_path).unwrap();
    assert!(file.contains(&oid));
    assert_eq!(file.index().pack_checksum(), pack.checksum);
    let (t, data) = file.read_object(&oid, &no_base).unwrap().unwrap();
    assert_eq!(t, ObjectType::Blob);
    assert_eq!(data, b"on disk");
    assert!(file.read_object(&ObjectId::NULL, &no_base).unwrap().is_none());
}

proptest! {
    #[test]
    fn index_finds_every_written_object(blobs in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 1..40)) {
        let mut w = PackWriter::new();
        let mut written = Vec::new();
        for (i, b) in blobs.iter().enumerate() {
            let unique = [&(i as u32).to_be_bytes()[..], b].concat();
            written.push(w.add_object(ObjectType::Blob, &unique).unwrap());
        }
        let pack = w.finish().unwrap();
        let idx = PackIndex::parse(write_pack_idx(&pack.entries, &pack.checksum).unwrap()).unwrap();

        let total = idx.fanout().total() as usize;
        prop_assert_eq!(total, idx.len());
        for (oid, offset) in &written {
            prop_assert_eq!(idx.object_offset(oid).unwrap(), Some(*offset));
        }
        for i in 1..idx.len() {
            prop_assert!(idx.oid_at(i - 1) <= idx.oid_at(i));
        }
    }

    #[test]
    fn delta_reproduces_target(base in prop::collection::vec(any::<u8>(), 1..300),
                               cut in 0usize..300,
                               tail in prop::collection::vec(any::<u8>(), 0..300)) {
        let cut = cut.min(base.len());
        let target = [&base[..cut], &tail[..]].concat();
        let delta = DeltaBuilder::new(base.len(), target.len())
            .copy(0, cut)
            .insert(&tail)
            .build();
        prop_assert_eq!(apply_delta(&base, &delta).unwrap(), target);
    }
}
