use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display};

/// Address of one cached result set: an ordered sequence of scalar segments.
///
/// Two keys address the same entry iff their segments are equal element-wise. Keys are meant to be produced by
/// [`KeyFactory`](crate::key_factory::KeyFactory) implementations only; use the [`cache_key!`](crate::cache_key) macro
/// inside a factory.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(Vec<String>);

impl CacheKey {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Unambiguous string form of the key, used to index snapshots.
    ///
    /// Every segment is written as `<byte length>:<bytes>`, so segment contents may hold any character, including the
    /// digits and colons of the framing itself.
    pub fn encode(&self) -> String {
        let mut encoded = String::with_capacity(self.0.iter().map(|s| s.len() + 4).sum());
        for segment in &self.0 {
            encoded.push_str(&segment.len().to_string());
            encoded.push(':');
            encoded.push_str(segment);
        }
        encoded
    }

    pub fn decode(encoded: &str) -> Result<Self> {
        let bytes = encoded.as_bytes();
        let mut segments = Vec::new();
        let mut pos = 0;

        while pos < bytes.len() {
            let len_start = pos;
            while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                pos += 1;
            }

            if pos == len_start {
                return Err(Error::MalformedKey {
                    encoded: encoded.to_string(),
                    position: pos,
                    reason: "expected segment length",
                });
            }
            if pos >= bytes.len() || bytes[pos] != b':' {
                return Err(Error::MalformedKey {
                    encoded: encoded.to_string(),
                    position: pos,
                    reason: "expected ':' after segment length",
                });
            }

            let len: usize = encoded[len_start..pos].parse().map_err(|_| Error::MalformedKey {
                encoded:  encoded.to_string(),
                position: len_start,
                reason:   "segment length out of range",
            })?;
            pos += 1;

            let available = bytes.len() - pos;
            if len > available {
                return Err(Error::TruncatedKey {
                    encoded: encoded.to_string(),
                    expected: len,
                    available,
                });
            }

            let segment = encoded.get(pos..pos + len).ok_or_else(|| Error::MalformedKey {
                encoded:  encoded.to_string(),
                position: pos,
                reason:   "segment does not end on a character boundary",
            })?;
            segments.push(segment.to_string());
            pos += len;
        }

        Ok(Self(segments))
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

impl Debug for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("CacheKey").field(&self.0).finish()
    }
}

impl<S: Into<String>> FromIterator<S> for CacheKey {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl From<Vec<String>> for CacheKey {
    fn from(segments: Vec<String>) -> Self {
        Self(segments)
    }
}

/// Build a [`CacheKey`] from anything displayable.
///
/// ```
/// use optimistic_cache::cache_key;
/// let key = cache_key!["comment_likes", "c1"];
/// assert_eq!(key.segments(), ["comment_likes", "c1"]);
/// ```
#[macro_export]
macro_rules! cache_key {
    ($($segment:expr),* $(,)?) => {
        $crate::key::CacheKey::new([$(::std::string::ToString::to_string(&$segment)),*])
    };
}
