//! Tree objects and git's canonical entry order.

use std::cmp::Ordering;

use git_hash::{ObjectId, SHA1_LEN};

use crate::ObjectError;

/// Mode written for regular files.
pub const MODE_FILE: u32 = 0o100644;
/// Mode written for subdirectories.
pub const MODE_TREE: u32 = 0o40000;

/// One `"<mode> <name>\0<sha>"` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub mode: u32,
    pub name: String,
    pub oid: ObjectId,
}

impl TreeEntry {
    pub fn file(name: impl Into<String>, oid: ObjectId) -> Self {
        Self { mode: MODE_FILE, name: name.into(), oid }
    }

    pub fn dir(name: impl Into<String>, oid: ObjectId) -> Self {
        Self { mode: MODE_TREE, name: name.into(), oid }
    }

    /// Any mode whose octal text starts with `1` (files, symlinks and
    /// gitlinks) is treated as a blob; everything else is a subtree.
    pub fn is_blob(&self) -> bool {
        self.mode >> 15 == 1
    }
}

/// Compare two entries the way git orders them inside a tree: byte-wise on
/// the name, with directory names compared as if they ended in `/`.
pub fn entry_compare(a: &TreeEntry, b: &TreeEntry) -> Ordering {
    let suffix = |e: &TreeEntry| if e.is_blob() { None } else { Some(b'/') };
    let an = a.name.as_bytes().iter().copied().chain(suffix(a));
    let bn = b.name.as_bytes().iter().copied().chain(suffix(b));
    an.cmp(bn)
}

impl PartialOrd for TreeEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TreeEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        entry_compare(self, other)
    }
}

/// A directory listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    pub fn new(entries: Vec<TreeEntry>) -> Self {
        Self { entries }
    }

    /// Decode every entry up front.
    pub fn parse(content: &[u8]) -> Result<Self, ObjectError> {
        let mut entries = Vec::new();
        let mut pos = 0;

        while pos < content.len() {
            let rest = &content[pos..];
            let nul = rest
                .iter()
                .position(|&b| b == 0)
                .ok_or(ObjectError::MalformedTree {
                    offset: pos,
                    reason: "missing NUL after entry name",
                })?;
            let head = &rest[..nul];
            let space = head
                .iter()
                .position(|&b| b == b' ')
                .ok_or(ObjectError::MalformedTree {
                    offset: pos,
                    reason: "missing space after mode",
                })?;

            let mode = parse_octal(&head[..space]).ok_or(ObjectError::MalformedTree {
                offset: pos,
                reason: "mode is not octal",
            })?;
            let name = std::str::from_utf8(&head[space + 1..])
                .map_err(|_| ObjectError::MalformedTree {
                    offset: pos + space + 1,
                    reason: "entry name is not UTF-8",
                })?
                .to_owned();

            let sha_start = nul + 1;
            let sha = rest
                .get(sha_start..sha_start + SHA1_LEN)
                .ok_or(ObjectError::MalformedTree {
                    offset: pos + sha_start,
                    reason: "truncated entry sha",
                })?;

            entries.push(TreeEntry {
                mode,
                name,
                oid: ObjectId::from_bytes(sha)?,
            });
            pos += sha_start + SHA1_LEN;
        }

        Ok(Self { entries })
    }

    /// Encode in canonical order.
    pub fn serialize(&self) -> Vec<u8> {
        let mut sorted: Vec<&TreeEntry> = self.entries.iter().collect();
        sorted.sort();

        let mut out = Vec::new();
        for e in sorted {
            out.extend_from_slice(format!("{:o} {}\0", e.mode, e.name).as_bytes());
            out.extend_from_slice(e.oid.as_bytes());
        }
        out
    }

    pub fn sort(&mut self) {
        self.entries.sort();
    }

    pub fn find(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TreeEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_octal(s: &[u8]) -> Option<u32> {
    if s.is_empty() {
        return None;
    }
    s.iter().try_fold(0u32, |acc, &b| match b {
        b'0'..=b'7' => acc.checked_mul(8)?.checked_add(u32::from(b - b'0')),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_entry(mode: &str, name: &str, oid: &ObjectId) -> Vec<u8> {
        let mut v = format!("{mode} {name}\0").into_bytes();
        v.extend_from_slice(oid.as_bytes());
        v
    }

    #[test]
    fn blob_detection_follows_leading_digit() {
        let oid = ObjectId::NULL;
        let mut data = raw_entry("100644", "a.txt", &oid);
        data.extend(raw_entry("40000", "src", &oid));
        data.extend(raw_entry("120000", "link", &oid));
        data.extend(raw_entry("160000", "module", &oid));

        let tree = Tree::parse(&data).unwrap();
        let blobs: Vec<bool> = tree.iter().map(TreeEntry::is_blob).collect();
        assert_eq!(blobs, [true, false, true, true]);
    }

    #[test]
    fn utf8_names_decode() {
        let data = raw_entry("100644", "caf\u{e9}.md", &ObjectId::NULL);
        let tree = Tree::parse(&data).unwrap();
        assert_eq!(tree.entries[0].name, "café.md");
    }

    #[test]
    fn missing_nul_is_malformed() {
        let err = Tree::parse(b"100644 never-terminated").unwrap_err();
        assert!(matches!(err, ObjectError::MalformedTree { offset: 0, .. }));
    }

    #[test]
    fn truncated_sha_is_malformed() {
        let mut data = b"100644 a\0".to_vec();
        data.extend_from_slice(&[1, 2, 3]);
        assert!(matches!(
            Tree::parse(&data),
            Err(ObjectError::MalformedTree { reason: "truncated entry sha", .. })
        ));
    }

    #[test]
    fn serialize_sorts_and_parses_back() {
        let a = ObjectId::new([1; 20]);
        let b = ObjectId::new([2; 20]);
        let tree = Tree::new(vec![TreeEntry::file("b.txt", a), TreeEntry::dir("a", b)]);
        let parsed = Tree::parse(&tree.serialize()).unwrap();
        assert_eq!(parsed.entries[0], TreeEntry::dir("a", b));
        assert_eq!(parsed.entries[1], TreeEntry::file("b.txt", a));
    }

    #[test]
    fn serialized_empty_tree_has_known_id() {
        let bytes = Tree::default().serialize();
        assert_eq!(
            crate::ObjectType::Tree.hash(&bytes).unwrap().to_hex(),
            "4b825dc642cb6eb9a060e54bf8d69288fbee4904"
        );
    }
}
