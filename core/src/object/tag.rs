use super::parse_utils::{header, split_headers, utf8};
use super::{Attribution, DecodeError, Id, Kind, Object};

/// An annotated tag: a named, immutable pointer to another object.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Tag {
    object: Id,
    kind: Kind,
    name: String,
    tagger: Option<Attribution>,
    message: String,
}

impl Tag {
    pub fn new(
        object: Id,
        kind: Kind,
        name: &str,
        tagger: Option<Attribution>,
        message: &str,
    ) -> Tag {
        Tag {
            object,
            kind,
            name: name.to_string(),
            tagger,
            message: message.to_string(),
        }
    }

    /// Returns the ID of the tagged object.
    pub fn object(&self) -> &Id {
        &self.object
    }

    /// Returns the kind of the tagged object.
    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tagger(&self) -> Option<&Attribution> {
        self.tagger.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = format!(
            "object {}\ntype {}\ntag {}\n",
            self.object, self.kind, self.name
        );
        if let Some(tagger) = &self.tagger {
            out.push_str(&format!("tagger {}\n", tagger));
        }
        out.push('\n');
        out.push_str(&self.message);
        out.into_bytes()
    }

    pub fn to_object(&self) -> Object {
        Object::new(Kind::Tag, self.to_bytes())
    }

    pub fn parse(content: &[u8]) -> Result<Tag, DecodeError> {
        let (headers, message) = split_headers(content);
        let mut headers = headers.into_iter();

        let object = headers
            .next()
            .and_then(|line| header(line, b"object"))
            .ok_or(DecodeError::MissingHeader("object"))?;
        let object = Id::from_hex(object)?;

        let kind = headers
            .next()
            .and_then(|line| header(line, b"type"))
            .ok_or(DecodeError::MissingHeader("type"))?;
        let kind = utf8(kind)?
            .parse::<Kind>()
            .map_err(DecodeError::UnknownKind)?;

        let name = headers
            .next()
            .and_then(|line| header(line, b"tag"))
            .ok_or(DecodeError::MissingHeader("tag"))?;
        let name = utf8(name)?.to_string();

        // tagger line does not need to be present
        let tagger = match headers.next().and_then(|line| header(line, b"tagger")) {
            Some(value) => Some(Attribution::parse(value).ok_or(DecodeError::InvalidAttribution)?),
            None => None,
        };

        Ok(Tag {
            object,
            kind,
            name,
            tagger,
            message: utf8(message)?.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid() {
        let cs = b"object be9bfa841874ccc9f2ef7c48d0c76226f89b7189\n\
                   type commit\n\
                   tag test-tag\n\
                   tagger A. U. Thor <tagger@localhost> 1 +0000\n\
                   \n\
                   release\n";

        let tag = Tag::parse(cs).unwrap();
        assert_eq!(
            tag.object().to_string(),
            "be9bfa841874ccc9f2ef7c48d0c76226f89b7189"
        );
        assert_eq!(tag.kind(), Kind::Commit);
        assert_eq!(tag.name(), "test-tag");
        assert_eq!(tag.tagger().unwrap().email(), "tagger@localhost");
        assert_eq!(tag.message(), "release\n");
        assert_eq!(tag.to_bytes(), cs.to_vec());
    }

    #[test]
    fn without_tagger() {
        let cs = b"object be9bfa841874ccc9f2ef7c48d0c76226f89b7189\n\
                   type commit\n\
                   tag test-tag\n";

        let tag = Tag::parse(cs).unwrap();
        assert!(tag.tagger().is_none());
        assert_eq!(tag.message(), "");
    }

    #[test]
    fn invalid() {
        assert_eq!(
            Tag::parse(b"").unwrap_err(),
            DecodeError::MissingHeader("object")
        );

        let cs = b"object be9bfa841874ccc9f2ef7c48d0c76226f89b7189\n\
                   type\tcommit\n";
        assert_eq!(
            Tag::parse(cs).unwrap_err(),
            DecodeError::MissingHeader("type")
        );

        let cs = b"object be9bfa841874ccc9f2ef7c48d0c76226f89b7189\n\
                   type widget\n\
                   tag x\n";
        assert_eq!(
            Tag::parse(cs).unwrap_err(),
            DecodeError::UnknownKind("widget".to_string())
        );
    }
}
