//! Document background references and their wire format.
//!
//! A [`Background`] says where the background image data comes from; it is a
//! pure domain value. Turning it into pixels is the resolver's job (see
//! [`crate::resolver`]), and the two are deliberately separate concepts.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use url::Url;

/// Where the document background comes from. Exactly one case is active.
///
/// Equality is structural: swapping cases or the payload inside a case counts
/// as a change for re-resolution purposes.
#[derive(Clone, Default, PartialEq, Eq)]
pub enum Background {
    /// No background.
    #[default]
    Blank,
    /// Background fetched from a remote location.
    Url(Url),
    /// Background embedded directly in the document (camera capture, drops).
    Bytes(Vec<u8>),
}

impl Background {
    /// True if this is [`Background::Blank`].
    #[must_use]
    pub const fn is_blank(&self) -> bool {
        matches!(self, Self::Blank)
    }

    /// Coerce a dropped or pasted string into a background reference.
    ///
    /// `data:image/...;base64,` URIs have their payload decoded into embedded
    /// bytes, `http(s)` URLs become remote references, and anything else is
    /// not an image source (`None`).
    #[must_use]
    pub fn from_input(input: &str) -> Option<Self> {
        let input = input.trim();
        if let Some(bytes) = data_uri_bytes(input) {
            return Some(Self::Bytes(bytes));
        }
        Url::parse(input).ok().and_then(Self::from_url)
    }

    /// Coerce a URL into a background reference.
    ///
    /// Applies the same data-scheme rule as [`Background::from_input`], and
    /// unwraps search-engine style URLs that carry the real image URL in a
    /// query parameter (`...?imgurl=https://actual.jpg`).
    #[must_use]
    pub fn from_url(url: Url) -> Option<Self> {
        if let Some(bytes) = data_uri_bytes(url.as_str()) {
            return Some(Self::Bytes(bytes));
        }
        match url.scheme() {
            "http" | "https" => Some(Self::Url(extract_image_url(url))),
            _ => None,
        }
    }
}

// Embedded payloads can be large; keep them out of debug output.
impl std::fmt::Debug for Background {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blank => write!(f, "Blank"),
            Self::Url(url) => f.debug_tuple("Url").field(url).finish(),
            Self::Bytes(data) => write!(f, "Bytes({} bytes)", data.len()),
        }
    }
}

/// Extract the embedded image bytes from a `data:image/...;base64,` URI.
fn data_uri_bytes(input: &str) -> Option<Vec<u8>> {
    let body = input.strip_prefix("data:")?;
    let (meta, payload) = body.split_once(',')?;
    if !meta.starts_with("image/") || !meta.ends_with("base64") {
        return None;
    }
    BASE64.decode(payload).ok()
}

/// Some search engines hand out a URL that embeds the actual image URL in a
/// query parameter. Returns the first embedded URL found, or the input
/// unchanged.
fn extract_image_url(url: Url) -> Url {
    for (_, value) in url.query_pairs() {
        if value.starts_with("http") {
            if let Ok(embedded) = Url::parse(&value) {
                return embedded;
            }
        }
    }
    url
}

/// Wire shape: `"blank"` | `{"url": ...}` | `{"imageData": <base64>}`.
#[derive(Serialize)]
#[serde(untagged)]
enum WireBackground<'a> {
    Tag(&'a str),
    Url {
        url: &'a str,
    },
    Bytes {
        #[serde(rename = "imageData")]
        image_data: String,
    },
}

impl Serialize for Background {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            Self::Blank => WireBackground::Tag("blank"),
            Self::Url(url) => WireBackground::Url { url: url.as_str() },
            Self::Bytes(data) => WireBackground::Bytes {
                image_data: BASE64.encode(data),
            },
        };
        wire.serialize(serializer)
    }
}

/// Decoding counterpart of [`WireBackground`]. The trailing catch-all makes
/// unknown variants decode to blank instead of failing the whole document.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireBackgroundIn {
    Url {
        url: String,
    },
    Bytes {
        #[serde(rename = "imageData")]
        image_data: String,
    },
    Tag(String),
    Unknown(IgnoredAny),
}

impl<'de> Deserialize<'de> for Background {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match WireBackgroundIn::deserialize(deserializer)? {
            WireBackgroundIn::Url { url } => match Url::parse(&url) {
                Ok(url) => Self::Url(url),
                Err(e) => {
                    tracing::warn!("unreadable background url {url:?}: {e}");
                    Self::Blank
                }
            },
            WireBackgroundIn::Bytes { image_data } => match BASE64.decode(&image_data) {
                Ok(data) => Self::Bytes(data),
                Err(e) => {
                    tracing::warn!("unreadable background image data: {e}");
                    Self::Blank
                }
            },
            WireBackgroundIn::Tag(tag) => {
                if tag != "blank" {
                    tracing::debug!("unknown background variant {tag:?}, treating as blank");
                }
                Self::Blank
            }
            WireBackgroundIn::Unknown(IgnoredAny) => Self::Blank,
        })
    }
}
