//! Extensions and shorthands for the JSON values normalized payloads are made of.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
pub use serde_json_bytes::Value;
use serde_json_bytes::{ByteString, Map};

/// A JSON object.
pub type Object = Map<ByteString, Value>;

/// One element of a response [`Path`].
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathElement {
    /// An index path element for entries of plural fields.
    Index(usize),

    /// A key path element, i.e. the response key of a field.
    Key(String),
}

/// A path into the response payload.
///
/// Incremental (deferred or streamed) payloads address the position they must
/// be merged at with such a path.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Path(pub Vec<PathElement>);

impl Path {
    pub fn empty() -> Path {
        Path(Vec::new())
    }

    pub fn from_slice<T: AsRef<str>>(s: &[T]) -> Self {
        Self(
            s.iter()
                .map(|x| x.as_ref())
                .map(|s| {
                    if let Ok(index) = s.parse::<usize>() {
                        PathElement::Index(index)
                    } else {
                        PathElement::Key(s.to_string())
                    }
                })
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathElement> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn push(&mut self, element: PathElement) {
        self.0.push(element)
    }

    pub fn pop(&mut self) -> Option<PathElement> {
        self.0.pop()
    }
}

impl<T> From<T> for Path
where
    T: AsRef<str>,
{
    fn from(s: T) -> Self {
        Self(
            s.as_ref()
                .split('/')
                .filter(|s| !s.is_empty())
                .map(|s| {
                    if let Ok(index) = s.parse::<usize>() {
                        PathElement::Index(index)
                    } else {
                        PathElement::Key(s.to_string())
                    }
                })
                .collect(),
        )
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for element in self.iter() {
            write!(f, "/")?;
            match element {
                PathElement::Index(index) => write!(f, "{}", index)?,
                PathElement::Key(key) => write!(f, "{}", key)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_from_string_parses_keys_and_indices() {
        let path = Path::from("viewer/friends/2/name");
        assert_eq!(
            path,
            Path(vec![
                PathElement::Key("viewer".to_string()),
                PathElement::Key("friends".to_string()),
                PathElement::Index(2),
                PathElement::Key("name".to_string()),
            ])
        );
        assert_eq!(path.to_string(), "/viewer/friends/2/name");
    }

    #[test]
    fn path_serializes_as_json_array() {
        let path = Path::from("user/0");
        let serialized = serde_json::to_string(&path).unwrap();
        assert_eq!(serialized, r#"["user",0]"#);
        let back: Path = serde_json::from_str(&serialized).unwrap();
        assert_eq!(back, path);
    }
}
