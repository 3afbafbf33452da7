// Avatar metadata record: wire format, persistence encoding and staleness rules.

use std::fmt;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Duration, OffsetDateTime, PrimitiveDateTime, UtcOffset};
use tracing::debug;

use crate::config::METADATA_TIME_FORMAT;
use crate::error::{AvatarError, AvatarResult, FailureType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BodyType {
    /// Parse failure sentinel. Never present on a successfully parsed record.
    #[default]
    None,
    FullBody,
    HalfBody,
}

impl BodyType {
    fn from_index(index: i64) -> Self {
        match index {
            1 => BodyType::FullBody,
            2 => BodyType::HalfBody,
            _ => BodyType::None,
        }
    }

    fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "fullbody" | "full-body" => BodyType::FullBody,
            "halfbody" | "half-body" => BodyType::HalfBody,
            _ => BodyType::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BodyType::None => "none",
            BodyType::FullBody => "fullbody",
            BodyType::HalfBody => "halfbody",
        }
    }
}

impl fmt::Display for BodyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for BodyType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for BodyType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Accept both the numeric and the named encodings; anything else is the sentinel.
        Ok(match Value::deserialize(deserializer)? {
            Value::Number(n) => n.as_i64().map(BodyType::from_index).unwrap_or_default(),
            Value::String(s) => BodyType::from_name(&s),
            _ => BodyType::None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutfitGender {
    #[default]
    None,
    Masculine,
    Feminine,
    Neutral,
}

impl OutfitGender {
    fn from_index(index: i64) -> Self {
        match index {
            1 => OutfitGender::Masculine,
            2 => OutfitGender::Feminine,
            3 => OutfitGender::Neutral,
            _ => OutfitGender::None,
        }
    }

    fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "masculine" => OutfitGender::Masculine,
            "feminine" => OutfitGender::Feminine,
            "neutral" => OutfitGender::Neutral,
            _ => OutfitGender::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutfitGender::None => "none",
            OutfitGender::Masculine => "masculine",
            OutfitGender::Feminine => "feminine",
            OutfitGender::Neutral => "neutral",
        }
    }
}

impl Serialize for OutfitGender {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OutfitGender {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Number(n) => n.as_i64().map(OutfitGender::from_index).unwrap_or_default(),
            Value::String(s) => OutfitGender::from_name(&s),
            _ => OutfitGender::None,
        })
    }
}

/// Layout of [`METADATA_TIME_FORMAT`].
const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z");

/// Drop everything below a millisecond, the finest unit the cache encoding keeps.
fn truncate_to_millis(ts: OffsetDateTime) -> OffsetDateTime {
    ts - Duration::nanoseconds(i64::from(ts.nanosecond() % 1_000_000))
}

/// Format a timestamp as `yyyy-MM-dd'T'HH:mm:ss.fff'Z'` in UTC.
pub fn format_timestamp(ts: OffsetDateTime) -> Result<String> {
    ts.to_offset(UtcOffset::UTC)
        .format(TIMESTAMP_FORMAT)
        .context("format metadata timestamp")
}

/// Parse a metadata timestamp. The fixed millisecond layout is expected;
/// any RFC 3339 timestamp is accepted as well and cut to whole milliseconds.
pub fn parse_timestamp(text: &str) -> Result<OffsetDateTime> {
    if let Ok(primitive) = PrimitiveDateTime::parse(text, TIMESTAMP_FORMAT) {
        return Ok(primitive.assume_utc());
    }
    OffsetDateTime::parse(text, &Rfc3339)
        .map(truncate_to_millis)
        .with_context(|| {
            format!(
                "invalid metadata timestamp '{}', expected {}",
                text, METADATA_TIME_FORMAT
            )
        })
}

mod timestamp {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::OffsetDateTime;

    pub fn serialize<S: Serializer>(ts: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        let text = super::format_timestamp(*ts).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<OffsetDateTime, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(text) => super::parse_timestamp(&text).map_err(serde::de::Error::custom),
            None => Ok(OffsetDateTime::UNIX_EPOCH),
        }
    }
}

fn unix_epoch() -> OffsetDateTime {
    OffsetDateTime::UNIX_EPOCH
}

/// Metadata describing a remote avatar. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvatarMetadata {
    #[serde(default)]
    body_type: BodyType,
    #[serde(default)]
    outfit_gender: OutfitGender,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    skin_tone: Option<String>,
    #[serde(default = "unix_epoch", with = "timestamp")]
    last_modified: OffsetDateTime,
}

impl AvatarMetadata {
    pub fn new(body_type: BodyType, last_modified: OffsetDateTime) -> Self {
        Self {
            body_type,
            outfit_gender: OutfitGender::None,
            skin_tone: None,
            last_modified: truncate_to_millis(last_modified),
        }
    }

    pub fn with_outfit_gender(self, outfit_gender: OutfitGender) -> Self {
        Self {
            outfit_gender,
            ..self
        }
    }

    pub fn with_skin_tone(self, skin_tone: impl Into<String>) -> Self {
        Self {
            skin_tone: Some(skin_tone.into()),
            ..self
        }
    }

    pub fn from_json(json: &str) -> AvatarResult<Self> {
        Self::from_slice(json.as_bytes())
    }

    /// Decode a raw metadata payload.
    ///
    /// Fails with `MetadataParseError` on malformed JSON, invalid UTF-8, or
    /// when the body type is missing or unrecognised.
    pub fn from_slice(data: &[u8]) -> AvatarResult<Self> {
        let metadata: AvatarMetadata = serde_json::from_slice(data).map_err(|e| {
            AvatarError::new(
                FailureType::MetadataParseError,
                format!("Failed to parse metadata. {}", e),
            )
        })?;

        if !metadata.is_valid() {
            return Err(AvatarError::new(
                FailureType::MetadataParseError,
                "Failed to parse metadata. Unexpected body type.",
            ));
        }

        debug!("{} metadata parsed", metadata.body_type);
        Ok(metadata)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("serialize avatar metadata")
    }

    pub fn is_valid(&self) -> bool {
        self.body_type != BodyType::None
    }

    /// Whether `self` supersedes `previous`.
    ///
    /// True when there is no previous record, when the timestamp is strictly
    /// newer, or when the body type or outfit gender changed.
    pub fn is_updated(&self, previous: Option<&AvatarMetadata>) -> bool {
        match previous {
            None => true,
            Some(previous) => {
                self.last_modified > previous.last_modified
                    || self.body_type != previous.body_type
                    || self.outfit_gender != previous.outfit_gender
            }
        }
    }

    pub fn body_type(&self) -> BodyType {
        self.body_type
    }

    pub fn outfit_gender(&self) -> OutfitGender {
        self.outfit_gender
    }

    pub fn skin_tone(&self) -> Option<&str> {
        self.skin_tone.as_deref()
    }

    pub fn last_modified(&self) -> OffsetDateTime {
        self.last_modified
    }
}
