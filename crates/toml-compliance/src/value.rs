//! Typed-value model: the JSON encoding of a TOML document.
//!
//! JSON cannot tell an integer from a float, or a date from a string, so every
//! TOML scalar is wrapped as `{"type": "<tag>", "value": "<text>"}`. Arrays are
//! plain JSON arrays and tables are plain JSON objects:
//!
//! ```json
//! {
//!   "title": {"type": "string", "value": "TOML"},
//!   "ports": [{"type": "integer", "value": "8000"}, {"type": "integer", "value": "8001"}],
//!   "owner": {"dob": {"type": "datetime", "value": "1979-05-27T07:32:00-08:00"}}
//! }
//! ```
//!
//! A JSON object is a *leaf* as soon as one of its members is a JSON scalar.
//! Table members are always objects or arrays, so a leaf can never be mistaken
//! for a table that happens to contain `type` and `value` keys.
//!
//! Scalars keep their original text. Deciding whether `"+42"` and `"42"` are
//! the same integer is the comparator's job, not the parser's.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value as Json};

use crate::error::{HarnessError, Result};

/// A TOML table: key → item. Sorted so iteration and serialization are stable.
pub type Table = BTreeMap<String, Item>;

/// Anything that can sit under a table key or inside an array.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Value(TypedValue),
    Table(Table),
}

/// A tagged TOML value. Scalars carry their textual representation verbatim.
///
/// `PartialEq` here is raw structural equality (texts must match byte for
/// byte). Use [`crate::compare`] for TOML-semantic equality.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    String(String),
    Integer(String),
    Float(String),
    Boolean(String),
    OffsetDateTime(String),
    LocalDateTime(String),
    LocalDate(String),
    LocalTime(String),
    Array(Vec<Item>),
}

/// The discriminant of a [`TypedValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tag {
    String,
    Integer,
    Float,
    Boolean,
    OffsetDateTime,
    LocalDateTime,
    LocalDate,
    LocalTime,
    Array,
}

impl Tag {
    /// Every tag, in declaration order.
    pub const ALL: [Tag; 9] = [
        Tag::String,
        Tag::Integer,
        Tag::Float,
        Tag::Boolean,
        Tag::OffsetDateTime,
        Tag::LocalDateTime,
        Tag::LocalDate,
        Tag::LocalTime,
        Tag::Array,
    ];

    /// Canonical tag name, as emitted by [`TypedValue::to_json`].
    pub fn name(self) -> &'static str {
        match self {
            Tag::String => "string",
            Tag::Integer => "integer",
            Tag::Float => "float",
            Tag::Boolean => "bool",
            Tag::OffsetDateTime => "datetime",
            Tag::LocalDateTime => "datetime-local",
            Tag::LocalDate => "date-local",
            Tag::LocalTime => "time-local",
            Tag::Array => "array",
        }
    }

    /// Resolve a tag name, accepting the aliases decoders commonly emit.
    pub fn from_name(name: &str) -> Option<Tag> {
        let tag = match name {
            "string" => Tag::String,
            "integer" => Tag::Integer,
            "float" => Tag::Float,
            "bool" | "boolean" => Tag::Boolean,
            "datetime" | "offset-datetime" => Tag::OffsetDateTime,
            "datetime-local" | "local-datetime" => Tag::LocalDateTime,
            "date-local" | "local-date" | "date" => Tag::LocalDate,
            "time-local" | "local-time" | "time" => Tag::LocalTime,
            "array" => Tag::Array,
            _ => return None,
        };
        Some(tag)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TypedValue {
    /// Build a scalar from its tag and text. Returns `None` for [`Tag::Array`].
    pub fn scalar(tag: Tag, text: impl Into<String>) -> Option<TypedValue> {
        let text = text.into();
        let value = match tag {
            Tag::String => TypedValue::String(text),
            Tag::Integer => TypedValue::Integer(text),
            Tag::Float => TypedValue::Float(text),
            Tag::Boolean => TypedValue::Boolean(text),
            Tag::OffsetDateTime => TypedValue::OffsetDateTime(text),
            Tag::LocalDateTime => TypedValue::LocalDateTime(text),
            Tag::LocalDate => TypedValue::LocalDate(text),
            Tag::LocalTime => TypedValue::LocalTime(text),
            Tag::Array => return None,
        };
        Some(value)
    }

    pub fn tag(&self) -> Tag {
        match self {
            TypedValue::String(_) => Tag::String,
            TypedValue::Integer(_) => Tag::Integer,
            TypedValue::Float(_) => Tag::Float,
            TypedValue::Boolean(_) => Tag::Boolean,
            TypedValue::OffsetDateTime(_) => Tag::OffsetDateTime,
            TypedValue::LocalDateTime(_) => Tag::LocalDateTime,
            TypedValue::LocalDate(_) => Tag::LocalDate,
            TypedValue::LocalTime(_) => Tag::LocalTime,
            TypedValue::Array(_) => Tag::Array,
        }
    }

    /// The scalar text, or `None` for arrays.
    pub fn text(&self) -> Option<&str> {
        match self {
            TypedValue::String(text)
            | TypedValue::Integer(text)
            | TypedValue::Float(text)
            | TypedValue::Boolean(text)
            | TypedValue::OffsetDateTime(text)
            | TypedValue::LocalDateTime(text)
            | TypedValue::LocalDate(text)
            | TypedValue::LocalTime(text) => Some(text),
            TypedValue::Array(_) => None,
        }
    }

    /// Canonical JSON encoding: `{"type", "value"}` for scalars, a raw array otherwise.
    pub fn to_json(&self) -> Json {
        match self {
            TypedValue::Array(items) => Json::Array(items.iter().map(Item::to_json).collect()),
            scalar => {
                let mut map = Map::new();
                map.insert("type".into(), Json::String(scalar.tag().name().into()));
                map.insert(
                    "value".into(),
                    Json::String(scalar.text().unwrap_or_default().into()),
                );
                Json::Object(map)
            }
        }
    }
}

impl Item {
    pub fn to_json(&self) -> Json {
        match self {
            Item::Value(value) => value.to_json(),
            Item::Table(table) => table_to_json(table),
        }
    }

    /// Short human-readable rendering used in mismatch diagnostics,
    /// e.g. `integer "42"`, `array of 3 items`, `table {a, b}`.
    pub fn describe(&self) -> String {
        match self {
            Item::Value(TypedValue::Array(items)) => match items.len() {
                1 => "array of 1 item".to_string(),
                n => format!("array of {n} items"),
            },
            Item::Value(value) => {
                let text = Json::String(value.text().unwrap_or_default().to_string());
                format!("{} {}", value.tag(), text)
            }
            Item::Table(table) => {
                let keys: Vec<&str> = table.keys().map(String::as_str).collect();
                format!("table {{{}}}", keys.join(", "))
            }
        }
    }
}

impl From<TypedValue> for Item {
    fn from(value: TypedValue) -> Self {
        Item::Value(value)
    }
}

impl From<Table> for Item {
    fn from(table: Table) -> Self {
        Item::Table(table)
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse a typed-value JSON document from raw bytes.
///
/// `origin` names the document in error messages ("decoder output",
/// "expected fixture", ...). The document root must be a JSON object.
pub fn parse_document(bytes: &[u8], origin: &str) -> Result<Table> {
    let json: Json =
        serde_json::from_slice(bytes).map_err(|err| HarnessError::malformed(origin, err))?;
    table_from_json(&json, origin)
}

/// Convert an already-parsed JSON value into a table.
pub fn table_from_json(json: &Json, origin: &str) -> Result<Table> {
    let mut path = KeyPath::root();
    match json {
        Json::Object(map) if !is_leaf(map) => parse_table(map, &mut path, origin),
        Json::Object(_) => Err(HarnessError::malformed(
            origin,
            "document root must be a table, found a typed value",
        )),
        other => Err(HarnessError::malformed(
            origin,
            format!("document root must be a table, found {}", json_kind(other)),
        )),
    }
}

fn parse_item(json: &Json, path: &mut KeyPath, origin: &str) -> Result<Item> {
    match json {
        Json::Object(map) if is_leaf(map) => parse_leaf(map, path, origin).map(Item::Value),
        Json::Object(map) => parse_table(map, path, origin).map(Item::Table),
        Json::Array(items) => parse_array(items, path, origin).map(Item::Value),
        other => Err(malformed_at(
            origin,
            path,
            format!(
                "expected a table, an array or a typed value, found {}",
                json_kind(other)
            ),
        )),
    }
}

fn parse_table(map: &Map<String, Json>, path: &mut KeyPath, origin: &str) -> Result<Table> {
    let mut table = Table::new();
    for (key, member) in map {
        path.push_key(key);
        let item = parse_item(member, path, origin);
        path.pop();
        table.insert(key.clone(), item?);
    }
    Ok(table)
}

fn parse_array(items: &[Json], path: &mut KeyPath, origin: &str) -> Result<TypedValue> {
    let mut parsed = Vec::with_capacity(items.len());
    for (index, member) in items.iter().enumerate() {
        path.push_index(index);
        let item = parse_item(member, path, origin);
        path.pop();
        parsed.push(item?);
    }
    Ok(TypedValue::Array(parsed))
}

fn parse_leaf(map: &Map<String, Json>, path: &mut KeyPath, origin: &str) -> Result<TypedValue> {
    let tag_json = map
        .get("type")
        .ok_or_else(|| malformed_at(origin, path, "typed value is missing `type`"))?;
    let value = map
        .get("value")
        .ok_or_else(|| malformed_at(origin, path, "typed value is missing `value`"))?;

    if let Some(extra) = map.keys().find(|k| *k != "type" && *k != "value") {
        return Err(malformed_at(
            origin,
            path,
            format!("unexpected member `{extra}` in typed value"),
        ));
    }

    let Json::String(tag_name) = tag_json else {
        return Err(malformed_at(origin, path, "`type` must be a string"));
    };
    let tag = Tag::from_name(tag_name).ok_or_else(|| {
        malformed_at(origin, path, format!("unrecognized type tag `{tag_name}`"))
    })?;

    match (tag, value) {
        // Legacy encoding: {"type": "array", "value": [...]}.
        (Tag::Array, Json::Array(items)) => parse_array(items, path, origin),
        (Tag::Array, other) => Err(malformed_at(
            origin,
            path,
            format!("`value` of an array must be a JSON array, found {}", json_kind(other)),
        )),
        (tag, Json::String(text)) => {
            // `scalar` only refuses Tag::Array, handled above.
            TypedValue::scalar(tag, text.clone())
                .ok_or_else(|| malformed_at(origin, path, "array tag on a scalar"))
        }
        (tag, other) => Err(malformed_at(
            origin,
            path,
            format!("`value` of a {tag} must be a string, found {}", json_kind(other)),
        )),
    }
}

/// An object is a leaf when any member is a JSON scalar.
fn is_leaf(map: &Map<String, Json>) -> bool {
    map.values()
        .any(|member| !matches!(member, Json::Object(_) | Json::Array(_)))
}

fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "an array",
        Json::Object(_) => "an object",
    }
}

fn malformed_at(origin: &str, path: &KeyPath, message: impl fmt::Display) -> HarnessError {
    HarnessError::malformed(origin, format!("at {path}: {message}"))
}

// ============================================================================
// Serialization
// ============================================================================

/// Canonical JSON encoding of a table.
pub fn table_to_json(table: &Table) -> Json {
    let map: Map<String, Json> = table
        .iter()
        .map(|(key, item)| (key.clone(), item.to_json()))
        .collect();
    Json::Object(map)
}

/// Pretty-printed canonical JSON encoding of a table.
pub fn to_string_pretty(table: &Table) -> String {
    format!("{:#}", table_to_json(table))
}

// ============================================================================
// Paths
// ============================================================================

/// One step from a table into its children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// A key/index chain locating a node in a document, e.g. `servers.alpha.ports[1]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPath {
    segments: Vec<Segment>,
}

impl KeyPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn push_key(&mut self, key: &str) {
        self.segments.push(Segment::Key(key.to_string()));
    }

    pub fn push_index(&mut self, index: usize) {
        self.segments.push(Segment::Index(index));
    }

    pub fn pop(&mut self) {
        self.segments.pop();
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("(root)");
        }
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Index(index) => write!(f, "[{index}]")?,
                Segment::Key(key) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    if is_bare_key(key) {
                        f.write_str(key)?;
                    } else {
                        write!(f, "{}", Json::String(key.clone()))?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// TOML bare keys: `A-Za-z0-9_-`, non-empty.
fn is_bare_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}
