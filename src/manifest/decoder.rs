//! Manifest decoder.
//!
//! Turns one rendered manifest (YAML, possibly `---`-separated, or a stream
//! of JSON objects) into [`ResourceDescriptor`]s, one document at a time.

use serde::Deserialize;
use serde_json::Value;
use serde_json::de::StrRead;
use tracing::{debug, trace};

use crate::error::DecodeError;

use super::resource::{DEFAULT_NAMESPACE, ResourceDescriptor, ResourceKind};

/// Lazy, single-pass decoder over a manifest stream.
///
/// Yields one `Result` per non-empty document, in order. After the first
/// error the decoder is exhausted; descriptors yielded before it stay valid.
pub struct ManifestDecoder<'a> {
    /// Kind every document is projected into.
    kind: ResourceKind,
    /// Namespace given to documents that do not set one.
    default_namespace: String,
    /// Underlying document splitter.
    documents: Documents<'a>,
    /// Number of non-empty documents seen so far.
    position: usize,
    /// Set after an error.
    finished: bool,
}

/// Decodes `text` into descriptors of `kind`, defaulting the namespace to
/// `"default"`.
#[must_use]
pub fn decode(text: &str, kind: ResourceKind) -> ManifestDecoder<'_> {
    ManifestDecoder::new(text, kind)
}

impl<'a> ManifestDecoder<'a> {
    /// Creates a decoder over `text`.
    #[must_use]
    pub fn new(text: &'a str, kind: ResourceKind) -> Self {
        let documents = if text.trim_start().starts_with('{') {
            Documents::Json {
                text,
                stream: serde_json::Deserializer::from_str(text).into_iter(),
            }
        } else {
            Documents::Yaml(YamlDocuments { rest: Some(text) })
        };

        Self {
            kind,
            default_namespace: String::from(DEFAULT_NAMESPACE),
            documents,
            position: 0,
            finished: false,
        }
    }

    /// Sets the namespace given to documents without `metadata.namespace`.
    #[must_use]
    pub fn with_default_namespace(mut self, namespace: &str) -> Self {
        if !namespace.trim().is_empty() {
            namespace.trim().clone_into(&mut self.default_namespace);
        }
        self
    }

    /// Projects a normalized document into a descriptor.
    fn project(&self, raw: &str, value: Value) -> Result<ResourceDescriptor, DecodeError> {
        let document = self.position;

        let head: ManifestHead =
            serde_json::from_value(value.clone()).map_err(|e| DecodeError::Schema {
                document,
                kind: self.kind,
                message: e.to_string(),
            })?;

        if let Some(found) = head.kind.as_deref() {
            let expected = self.kind.manifest_kind();
            if !found.eq_ignore_ascii_case(expected) {
                return Err(DecodeError::KindMismatch {
                    document,
                    expected: expected.to_string(),
                    found: found.to_string(),
                });
            }
        }

        // Name and namespace are used verbatim, as sent in the body.
        let metadata = head.metadata.unwrap_or_default();
        let name = metadata
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or(DecodeError::MissingName { document })?;

        let namespace = metadata
            .namespace
            .filter(|ns| !ns.trim().is_empty())
            .unwrap_or_else(|| self.default_namespace.clone());

        debug!(
            "Decoded {} '{}/{}' from document {}",
            self.kind, namespace, name, document
        );

        Ok(ResourceDescriptor {
            kind: self.kind,
            name,
            namespace,
            desired_state: value,
            raw_text: raw.trim().to_string(),
            document,
        })
    }
}

impl Iterator for ManifestDecoder<'_> {
    type Item = Result<ResourceDescriptor, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            let Some(RawDocument { raw, parsed }) = self.documents.next_document() else {
                self.finished = true;
                return None;
            };

            if parsed.as_ref().is_ok_and(Value::is_null) {
                trace!("Skipping empty document");
                continue;
            }

            self.position += 1;

            let result = parsed
                .map_err(|message| DecodeError::Malformed {
                    document: self.position,
                    message,
                })
                .and_then(|value| self.project(raw, value));

            if result.is_err() {
                self.finished = true;
            }
            return Some(result);
        }
    }
}

/// Minimal schema shared by all supported kinds.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestHead {
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    metadata: Option<ObjectMeta>,
    #[serde(default, rename = "spec")]
    _spec: Option<serde_json::Map<String, Value>>,
}

/// The identity part of `metadata`.
#[derive(Debug, Default, Deserialize)]
struct ObjectMeta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    namespace: Option<String>,
}

/// One document as split from the stream, normalized to JSON.
struct RawDocument<'a> {
    /// Text of this document alone.
    raw: &'a str,
    /// Parsed form, or the parser message.
    parsed: Result<Value, String>,
}

/// Splits the input into documents.
enum Documents<'a> {
    /// `---`-separated YAML.
    Yaml(YamlDocuments<'a>),
    /// Concatenated JSON objects.
    Json {
        text: &'a str,
        stream: serde_json::StreamDeserializer<'a, StrRead<'a>, Value>,
    },
}

impl<'a> Documents<'a> {
    fn next_document(&mut self) -> Option<RawDocument<'a>> {
        match self {
            Self::Yaml(documents) => {
                let raw = documents.next()?;
                let parsed = if is_blank_yaml(raw) {
                    Ok(Value::Null)
                } else {
                    serde_yaml::from_str::<Value>(raw).map_err(|e| e.to_string())
                };
                Some(RawDocument { raw, parsed })
            }
            Self::Json { text, stream } => {
                let text: &'a str = *text;
                let start = stream.byte_offset();
                let parsed = stream.next()?.map_err(|e| e.to_string());
                let end = stream.byte_offset();
                let raw = text.get(start..end).unwrap_or_default();
                Some(RawDocument { raw, parsed })
            }
        }
    }
}

/// Iterator over the raw text of `---`-separated YAML documents.
struct YamlDocuments<'a> {
    rest: Option<&'a str>,
}

impl<'a> Iterator for YamlDocuments<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let rest = self.rest?;
        let mut offset = 0;

        for line in rest.split_inclusive('\n') {
            if is_document_start(line) {
                // Anything after the marker on the same line belongs to the
                // next document.
                self.rest = Some(&rest[offset + 3..]);
                return Some(&rest[..offset]);
            }
            offset += line.len();
        }

        self.rest = None;
        Some(rest)
    }
}

/// Whether a line is a `---` document marker.
fn is_document_start(line: &str) -> bool {
    line.strip_prefix("---")
        .is_some_and(|tail| tail.is_empty() || tail.starts_with(char::is_whitespace))
}

/// Whether a document holds nothing but whitespace, comments, directives,
/// or end markers.
fn is_blank_yaml(text: &str) -> bool {
    text.lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line.starts_with('#') || line.starts_with('%') || line == "..."
    })
}
