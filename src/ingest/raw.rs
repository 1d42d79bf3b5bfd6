//! Raw collector records and their validation into `SemanticAtom`s

use crate::atom::{atom_id, ProvenanceRecord, SemanticAtom, SourceType};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Why a raw record was rejected. Neither kind is retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IngestError {
    #[error("invalid provenance: {field}: {reason}")]
    InvalidProvenance { field: &'static str, reason: String },

    #[error("malformed atom: {0}")]
    MalformedAtom(String),
}

impl IngestError {
    fn provenance(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidProvenance {
            field,
            reason: reason.into(),
        }
    }
}

/// Recoverable oddities noticed while ingesting a valid record.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestWarning {
    DefinitionTruncated { original_bytes: usize, cap: usize },
    ConfidenceClamped { original: f64 },
}

impl std::fmt::Display for IngestWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DefinitionTruncated { original_bytes, cap } => {
                write!(f, "definition truncated from {} to {} bytes", original_bytes, cap)
            }
            Self::ConfidenceClamped { original } => {
                write!(f, "extraction_confidence {} clamped into [0, 1]", original)
            }
        }
    }
}

/// One record as a collector emitted it: an open JSON mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawAtom(pub Value);

impl RawAtom {
    pub fn new(value: Value) -> Self {
        Self(value)
    }
}

impl From<Value> for RawAtom {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// A valid atom plus whatever warnings ingestion raised.
#[derive(Debug, Clone, PartialEq)]
pub struct Ingested {
    pub atom: SemanticAtom,
    pub warnings: Vec<IngestWarning>,
}

/// Validates raw records for one declared source type.
#[derive(Debug, Clone)]
pub struct AtomIngestor {
    source_type: SourceType,
    definition_byte_cap: usize,
}

impl AtomIngestor {
    pub fn new(source_type: SourceType, definition_byte_cap: usize) -> Self {
        Self {
            source_type,
            definition_byte_cap,
        }
    }

    pub fn source_type(&self) -> SourceType {
        self.source_type
    }

    /// Turn a raw record into a SemanticAtom.
    ///
    /// Provenance is all-or-nothing: a missing or malformed field rejects
    /// the record. Confidence is clamped into [0, 1]; an over-long
    /// definition is truncated at a char boundary. Both raise warnings.
    pub fn ingest(&self, raw: &RawAtom) -> Result<Ingested, IngestError> {
        let obj = raw
            .0
            .as_object()
            .ok_or_else(|| IngestError::MalformedAtom("record is not a JSON object".into()))?;
        let mut warnings = Vec::new();

        let concept = required_text(obj, "concept")?;
        if concept.trim().is_empty() {
            return Err(IngestError::MalformedAtom("concept is empty".into()));
        }
        let definition = required_text(obj, "definition")?;
        let definition = match truncate_to_bytes(definition, self.definition_byte_cap) {
            (text, true) => {
                warnings.push(IngestWarning::DefinitionTruncated {
                    original_bytes: definition.len(),
                    cap: self.definition_byte_cap,
                });
                text
            }
            (text, false) => text,
        };

        let context = optional_text(obj, "context")?;
        let category = optional_text(obj, "category")?;
        let metadata = match obj.get("metadata") {
            None | Some(Value::Null) => BTreeMap::new(),
            Some(Value::Object(m)) => m.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            Some(_) => return Err(IngestError::MalformedAtom("metadata is not a mapping".into())),
        };

        if let Some(tag) = obj.get("source_type") {
            let declared = tag
                .as_str()
                .ok_or_else(|| IngestError::MalformedAtom("source_type is not a string".into()))?
                .parse::<SourceType>()
                .map_err(IngestError::MalformedAtom)?;
            if declared != self.source_type {
                return Err(IngestError::MalformedAtom(format!(
                    "record declares source_type {} but store is {}",
                    declared, self.source_type
                )));
            }
        }

        let (provenance, clamp_warning) = parse_provenance(obj)?;
        warnings.extend(clamp_warning);

        Ok(Ingested {
            atom: SemanticAtom {
                id: atom_id(concept, &provenance.source_url, &provenance.timestamp),
                concept: concept.to_string(),
                definition,
                context,
                source_type: self.source_type,
                category,
                metadata,
                provenance,
            },
            warnings,
        })
    }
}

fn required_text<'a>(obj: &'a Map<String, Value>, field: &str) -> Result<&'a str, IngestError> {
    match obj.get(field) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(IngestError::MalformedAtom(format!("{} is not a string", field))),
        None => Err(IngestError::MalformedAtom(format!("{} is missing", field))),
    }
}

fn optional_text(obj: &Map<String, Value>, field: &str) -> Result<Option<String>, IngestError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(IngestError::MalformedAtom(format!("{} is not a string", field))),
    }
}

fn parse_provenance(
    obj: &Map<String, Value>,
) -> Result<(ProvenanceRecord, Option<IngestWarning>), IngestError> {
    let prov = match obj.get("provenance") {
        Some(Value::Object(p)) => p,
        Some(_) => return Err(IngestError::provenance("provenance", "not a mapping")),
        None => return Err(IngestError::provenance("provenance", "missing")),
    };

    let text = |field: &'static str| -> Result<String, IngestError> {
        match prov.get(field) {
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
            Some(Value::String(_)) => Err(IngestError::provenance(field, "empty")),
            Some(_) => Err(IngestError::provenance(field, "not a string")),
            None => Err(IngestError::provenance(field, "missing")),
        }
    };

    let source_agent = text("source_agent")?;
    let timestamp_text = text("timestamp")?;
    let timestamp = parse_timestamp(&timestamp_text).ok_or_else(|| {
        IngestError::provenance("timestamp", format!("not ISO-8601: {}", timestamp_text))
    })?;
    let method = text("method")?;
    let source_url = text("source_url")?;

    let raw_confidence = match prov.get("extraction_confidence") {
        Some(Value::Number(n)) => n
            .as_f64()
            .filter(|c| c.is_finite())
            .ok_or_else(|| {
                IngestError::provenance("extraction_confidence", "not a finite number")
            })?,
        Some(_) => return Err(IngestError::provenance("extraction_confidence", "not a number")),
        None => return Err(IngestError::provenance("extraction_confidence", "missing")),
    };
    let extraction_confidence = raw_confidence.clamp(0.0, 1.0);
    let warning =
        (extraction_confidence != raw_confidence).then_some(IngestWarning::ConfidenceClamped {
            original: raw_confidence,
        });

    let parent_sources = match prov.get("parent_sources") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| match v {
                Value::String(s) if !s.trim().is_empty() => Ok(s.clone()),
                _ => Err(IngestError::provenance(
                    "parent_sources",
                    "entries must be non-empty strings",
                )),
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => return Err(IngestError::provenance("parent_sources", "not a list")),
        None => return Err(IngestError::provenance("parent_sources", "missing")),
    };
    if parent_sources.is_empty() {
        return Err(IngestError::provenance("parent_sources", "empty"));
    }

    Ok((
        ProvenanceRecord {
            source_agent,
            timestamp,
            method,
            source_url,
            extraction_confidence,
            parent_sources,
        },
        warning,
    ))
}

/// Accepts RFC 3339, naive `YYYY-MM-DDTHH:MM:SS[.f]` (read as UTC) and bare dates.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Cut `text` to at most `cap` bytes without splitting a character.
fn truncate_to_bytes(text: &str, cap: usize) -> (String, bool) {
    if text.len() <= cap {
        return (text.to_string(), false);
    }
    let mut end = cap;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    (text[..end].to_string(), true)
}
