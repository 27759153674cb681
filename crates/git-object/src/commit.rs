use git_hash::ObjectId;

use crate::{ObjectError, Signature};

/// A commit.
///
/// Locally created history is linear, so most callers only look at
/// `parents[0]`; the full list is kept for commits fetched from remotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub tree: ObjectId,
    pub parents: Vec<ObjectId>,
    pub author: Signature,
    pub committer: Signature,
    pub encoding: Option<String>,
    /// Non-blank message lines joined with `\n`.
    pub message: String,
}

fn header_sha(line: &str, key: &str) -> Result<ObjectId, ObjectError> {
    let hex = line
        .strip_prefix(key)
        .and_then(|rest| rest.strip_prefix(' '))
        .ok_or_else(|| ObjectError::MalformedCommit(format!("expected '{key}' line, got {line:?}")))?;
    Ok(ObjectId::from_hex(hex)?)
}

impl Commit {
    pub fn parse(content: &[u8]) -> Result<Self, ObjectError> {
        let text = String::from_utf8_lossy(content);
        let mut lines = text.split('\n').peekable();

        let tree = header_sha(lines.next().unwrap_or_default(), "tree")?;

        let mut parents = Vec::new();
        while let Some(line) = lines.next_if(|l| l.starts_with("parent ")) {
            parents.push(header_sha(line, "parent")?);
        }

        let mut identity = |key: &str| -> Result<Signature, ObjectError> {
            let line = lines.next().unwrap_or_default();
            let rest = line
                .strip_prefix(key)
                .and_then(|r| r.strip_prefix(' '))
                .ok_or_else(|| ObjectError::MalformedCommit(format!("missing {key} line")))?;
            Signature::parse(rest)
        };
        let author = identity("author")?;
        let committer = identity("committer")?;

        let encoding = lines
            .next_if(|l| l.starts_with("encoding "))
            .map(|l| l["encoding ".len()..].to_owned());

        // Remaining headers (gpgsig, mergetag and their continuation lines)
        // run up to the first blank line.
        while lines.next_if(|l| !l.is_empty()).is_some() {}

        let message = lines
            .filter(|l| !l.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        Ok(Self {
            tree,
            parents,
            author,
            committer,
            encoding,
            message,
        })
    }

    /// Canonical encoding, suitable for hashing a locally created commit.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = format!("tree {}\n", self.tree);
        for p in &self.parents {
            out.push_str(&format!("parent {p}\n"));
        }
        out.push_str(&format!("author {}\n", self.author.to_line()));
        out.push_str(&format!("committer {}\n", self.committer.to_line()));
        if let Some(enc) = &self.encoding {
            out.push_str(&format!("encoding {enc}\n"));
        }
        out.push('\n');
        out.push_str(&self.message);
        out.push('\n');
        out.into_bytes()
    }

    pub fn first_parent(&self) -> Option<&ObjectId> {
        self.parents.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TREE: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";
    const PARENT: &str = "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391";

    fn sample() -> String {
        format!(
            "tree {TREE}\nparent {PARENT}\n\
             author Ann <ann@example.com> 1700000000 +0100\n\
             committer Bob <bob@example.com> 1700000100 +0000\n\
             encoding ISO-8859-1\n\
             \n\
             Subject line\n\
             \n\
             Body text\n"
        )
    }

    #[test]
    fn parses_all_fields() {
        let c = Commit::parse(sample().as_bytes()).unwrap();
        assert_eq!(c.tree.to_hex(), TREE);
        assert_eq!(c.parents.len(), 1);
        assert_eq!(c.author.name, "Ann");
        assert_eq!(c.author.tz_offset_minutes, 60);
        assert_eq!(c.committer.timestamp, 1_700_000_100);
        assert_eq!(c.encoding.as_deref(), Some("ISO-8859-1"));
        assert_eq!(c.message, "Subject line\nBody text");
    }

    #[test]
    fn root_commit_has_no_parents() {
        let raw = format!(
            "tree {TREE}\nauthor A <a@b> 1 +0000\ncommitter A <a@b> 1 +0000\n\nroot\n"
        );
        let c = Commit::parse(raw.as_bytes()).unwrap();
        assert!(c.parents.is_empty());
        assert!(c.first_parent().is_none());
        assert_eq!(c.message, "root");
    }

    #[test]
    fn signed_commit_skips_signature_block() {
        let raw = format!(
            "tree {TREE}\nauthor A <a@b> 1 +0000\ncommitter A <a@b> 1 +0000\n\
             gpgsig -----BEGIN PGP SIGNATURE-----\n abc\n -----END PGP SIGNATURE-----\n\nmsg\n"
        );
        assert_eq!(Commit::parse(raw.as_bytes()).unwrap().message, "msg");
    }

    #[test]
    fn bad_author_is_malformed() {
        let raw = format!("tree {TREE}\nauthor nobody\ncommitter A <a@b> 1 +0000\n\nx\n");
        assert!(matches!(
            Commit::parse(raw.as_bytes()),
            Err(ObjectError::MalformedCommit(_))
        ));
    }

    #[test]
    fn missing_tree_is_malformed() {
        assert!(Commit::parse(b"author A <a@b> 1 +0000\n").is_err());
    }

    #[test]
    fn serialize_parses_back() {
        let c = Commit::parse(sample().as_bytes()).unwrap();
        let again = Commit::parse(&c.serialize()).unwrap();
        assert_eq!(again, c);
    }
}
