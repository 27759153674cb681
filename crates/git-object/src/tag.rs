use git_hash::ObjectId;

use crate::{ObjectError, ObjectType, Signature};

/// An annotated tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub target: ObjectId,
    pub target_type: ObjectType,
    pub name: String,
    /// Absent on some very old tags.
    pub tagger: Option<Signature>,
    pub message: String,
}

impl Tag {
    pub fn parse(content: &[u8]) -> Result<Self, ObjectError> {
        let text = String::from_utf8_lossy(content);
        let text: &str = &text;
        let (headers, message) = text.split_once("\n\n").unwrap_or((text, ""));

        let mut target = None;
        let mut target_type = None;
        let mut name = None;
        let mut tagger = None;
        for line in headers.lines() {
            let Some((key, value)) = line.split_once(' ') else {
                continue;
            };
            match key {
                "object" => target = Some(ObjectId::from_hex(value)?),
                "type" => target_type = Some(value.parse()?),
                "tag" => name = Some(value.to_owned()),
                "tagger" => tagger = Some(Signature::parse(value)?),
                _ => {}
            }
        }

        let missing = |f: &str| ObjectError::MalformedTag(format!("missing '{f}' header"));
        Ok(Self {
            target: target.ok_or_else(|| missing("object"))?,
            target_type: target_type.ok_or_else(|| missing("type"))?,
            name: name.ok_or_else(|| missing("tag"))?,
            tagger,
            message: message.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_annotated_tag() {
        let raw = "object e69de29bb2d1d6434b8b29ae775ad8c2e48c5391\ntype commit\ntag v1.0\n\
                   tagger T <t@example.com> 1700000000 +0000\n\nrelease\n";
        let tag = Tag::parse(raw.as_bytes()).unwrap();
        assert_eq!(tag.target_type, ObjectType::Commit);
        assert_eq!(tag.name, "v1.0");
        assert_eq!(tag.tagger.unwrap().email, "t@example.com");
        assert_eq!(tag.message, "release\n");
    }

    #[test]
    fn missing_object_header() {
        assert!(matches!(
            Tag::parse(b"type commit\ntag v1\n\nx"),
            Err(ObjectError::MalformedTag(_))
        ));
    }
}
