use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

pub const ATTACHMENT_NAME: &str = "relationshipmenu.json";
pub const ATTACHMENT_MIME: &str = "application/json";
pub const SCHEMA_VERSION: u32 = 1;

const SCHEMA_VERSION_KEY: &str = "schemaVersion";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    Must,
    Like,
    Maybe,
    PreferNot,
    OffLimit,
    Talk,
    #[default]
    Unset,
}

impl Status {
    /// Legend order.
    pub const ALL: [Status; 7] = [
        Status::Must,
        Status::Like,
        Status::Maybe,
        Status::PreferNot,
        Status::OffLimit,
        Status::Talk,
        Status::Unset,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Must => "must",
            Status::Like => "like",
            Status::Maybe => "maybe",
            Status::PreferNot => "prefer-not",
            Status::OffLimit => "off-limit",
            Status::Talk => "talk",
            Status::Unset => "unset",
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Status::Unset)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn parse_hex(raw: &str) -> Option<Rgb> {
        let hex = raw.strip_prefix('#')?;
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |idx: usize| u8::from_str_radix(&hex[idx..idx + 2], 16).ok();
        Some(Rgb::new(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Rgb::parse_hex(&raw)
            .ok_or_else(|| de::Error::custom(format!("invalid color {raw:?}, expected #rrggbb")))
    }
}

/// A span of note text sharing one formatting set. Flags are tri-state: `None`
/// means the run does not say, which renders like `Some(false)`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Run {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub underline: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strikethrough: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Rgb>,
}

impl Run {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn bold(mut self) -> Self {
        self.bold = Some(true);
        self
    }

    pub fn italic(mut self) -> Self {
        self.italic = Some(true);
        self
    }

    pub fn underline(mut self) -> Self {
        self.underline = Some(true);
        self
    }

    pub fn strikethrough(mut self) -> Self {
        self.strikethrough = Some(true);
        self
    }

    pub fn color(mut self, color: Rgb) -> Self {
        self.color = Some(color);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Note {
    pub runs: Vec<Run>,
}

impl Note {
    pub fn new(runs: Vec<Run>) -> Self {
        Self { runs }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(vec![Run::plain(text)])
    }

    pub fn is_blank(&self) -> bool {
        self.runs.iter().all(|run| run.text.trim().is_empty())
    }

    pub fn plain_text(&self) -> String {
        self.runs.iter().map(|run| run.text.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    #[serde(default, skip_serializing_if = "Status::is_unset")]
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<Note>,
}

impl Item {
    pub fn new(name: impl Into<String>, status: Status) -> Self {
        Self {
            name: name.into(),
            status,
            note: None,
        }
    }

    pub fn with_note(mut self, note: Note) -> Self {
        self.note = Some(note);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    #[serde(default)]
    pub items: Vec<Item>,
}

impl Section {
    pub fn new(name: impl Into<String>, items: Vec<Item>) -> Self {
        Self {
            name: name.into(),
            items,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub sections: Vec<Section>,
}

impl Document {
    pub fn item_count(&self) -> usize {
        self.sections.iter().map(|section| section.items.len()).sum()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DocumentParseError {
    #[error("malformed document json: {0}")]
    MalformedJson(String),
    #[error("document schema version {found} is newer than supported version {supported}")]
    SchemaTooNew { found: u64, supported: u32 },
}

#[derive(Serialize)]
struct CanonicalDocument<'a> {
    #[serde(rename = "schemaVersion")]
    schema_version: u32,
    #[serde(flatten)]
    document: &'a Document,
}

/// Serializes `document` into the canonical attachment form: compact JSON with the
/// schema version leading the document fields.
pub fn to_canonical_json(document: &Document) -> Result<String, serde_json::Error> {
    serde_json::to_string(&CanonicalDocument {
        schema_version: SCHEMA_VERSION,
        document,
    })
}

pub fn from_canonical_json(bytes: &[u8]) -> Result<Document, DocumentParseError> {
    let mut value: Value = serde_json::from_slice(bytes)
        .map_err(|err| DocumentParseError::MalformedJson(err.to_string()))?;
    let Some(object) = value.as_object_mut() else {
        return Err(DocumentParseError::MalformedJson(
            "top-level value is not an object".to_string(),
        ));
    };
    let version = match object.remove(SCHEMA_VERSION_KEY) {
        Some(Value::Number(number)) => number.as_u64().ok_or_else(|| {
            DocumentParseError::MalformedJson(format!("invalid {SCHEMA_VERSION_KEY}: {number}"))
        })?,
        Some(other) => {
            return Err(DocumentParseError::MalformedJson(format!(
                "invalid {SCHEMA_VERSION_KEY}: {other}"
            )));
        }
        None => {
            return Err(DocumentParseError::MalformedJson(format!(
                "missing {SCHEMA_VERSION_KEY}"
            )));
        }
    };
    if version > u64::from(SCHEMA_VERSION) {
        return Err(DocumentParseError::SchemaTooNew {
            found: version,
            supported: SCHEMA_VERSION,
        });
    }
    serde_json::from_value(value).map_err(|err| DocumentParseError::MalformedJson(err.to_string()))
}

fn hex_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        use std::fmt::Write;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

pub fn canonical_bytes_sha256(bytes: &[u8]) -> String {
    hex_sha256(bytes)
}

pub fn fingerprint_sha256(document: &Document) -> Result<String, serde_json::Error> {
    Ok(hex_sha256(to_canonical_json(document)?.as_bytes()))
}
