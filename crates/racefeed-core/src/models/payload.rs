use serde_json::Value;

/// Data for one (entity type, key) pair, as stored in the cache.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Records(Value),
    Text(String),
}

impl Payload {
    /// Empty lists, maps, strings and nulls count as "no data".
    pub fn is_empty(&self) -> bool {
        match self {
            Payload::Records(Value::Null) => true,
            Payload::Records(Value::Array(rows)) => rows.is_empty(),
            Payload::Records(Value::Object(map)) => map.is_empty(),
            Payload::Records(Value::String(s)) => s.is_empty(),
            Payload::Records(_) => false,
            Payload::Text(text) => text.is_empty(),
        }
    }

    pub fn as_records(&self) -> Option<&Value> {
        match self {
            Payload::Records(value) => Some(value),
            Payload::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            Payload::Records(_) => None,
        }
    }

    pub fn into_records(self) -> Option<Value> {
        match self {
            Payload::Records(value) => Some(value),
            Payload::Text(_) => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            Payload::Text(text) => Some(text),
            Payload::Records(_) => None,
        }
    }
}

/// Where the data behind an outcome came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Cache,
    Remote,
}

/// Result of resolving one key.
///
/// `source == None` means no data is available for the key; this is a normal
/// outcome, not an error. In discard mode `source` is set but `payload` is
/// left empty.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    pub key: String,
    pub payload: Option<Payload>,
    pub source: Option<Source>,
}

impl FetchOutcome {
    pub fn empty(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            payload: None,
            source: None,
        }
    }

    pub fn found(key: impl Into<String>, payload: Payload, source: Source) -> Self {
        Self {
            key: key.into(),
            payload: Some(payload),
            source: Some(source),
        }
    }

    /// Data exists but was not kept in memory.
    pub fn discarded(key: impl Into<String>, source: Source) -> Self {
        Self {
            key: key.into(),
            payload: None,
            source: Some(source),
        }
    }

    pub fn is_available(&self) -> bool {
        self.source.is_some()
    }

    /// True when the outcome carries a payload with actual content.
    pub fn has_data(&self) -> bool {
        self.payload.as_ref().is_some_and(|p| !p.is_empty())
    }
}
