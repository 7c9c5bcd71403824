//! Crumb nodes and the values they record.
//!
//! A [`Crumb`] is a shared handle: cloning it yields another reference to the
//! same node, which is how the active crumb, its parent's trail and the caller
//! can all observe one record while it is being filled in.

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::warn;
use uuid::Uuid;

use crate::sentinel::NamedSentinel;
use crate::trail::{Trail, TrailCapable};

/// Recorded value mapping used for both `info` and `extra`.
pub type Fields = BTreeMap<String, Field>;

// ============================================================================
// Field
// ============================================================================

/// A single recorded value.
///
/// Cloning deep-copies structured data while keeping sentinels identical, so a
/// snapshot of captured arguments never aliases the caller's data but still
/// compares equal to [`REDACTED`](crate::REDACTED).
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Value(Value),
    Sentinel(NamedSentinel),
}

impl Field {
    /// Serialize any value into a field.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Field::Value)
    }

    /// Serialize `value` for recording under `name`.
    ///
    /// A value that cannot be serialized becomes a `"<unrecorded: ...>"`
    /// placeholder string, so recording never fails the caller.
    pub fn capture<T: Serialize + ?Sized>(name: &str, value: &T) -> Self {
        Self::from_serialize(value).unwrap_or_else(|err| {
            warn!(field = name, error = %err, "value not recorded");
            Field::from(format!("<unrecorded: {}>", err))
        })
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Field::Value(v) => Some(v),
            Field::Sentinel(_) => None,
        }
    }

    pub fn is_sentinel(&self, sentinel: &NamedSentinel) -> bool {
        matches!(self, Field::Sentinel(s) if s == sentinel)
    }
}

impl From<Value> for Field {
    fn from(value: Value) -> Self {
        Field::Value(value)
    }
}

impl From<NamedSentinel> for Field {
    fn from(sentinel: NamedSentinel) -> Self {
        Field::Sentinel(sentinel)
    }
}

impl From<&NamedSentinel> for Field {
    fn from(sentinel: &NamedSentinel) -> Self {
        Field::Sentinel(sentinel.clone())
    }
}

impl From<&str> for Field {
    fn from(s: &str) -> Self {
        Field::Value(Value::from(s))
    }
}

impl From<String> for Field {
    fn from(s: String) -> Self {
        Field::Value(Value::from(s))
    }
}

impl From<bool> for Field {
    fn from(b: bool) -> Self {
        Field::Value(Value::from(b))
    }
}

impl From<i64> for Field {
    fn from(n: i64) -> Self {
        Field::Value(Value::from(n))
    }
}

impl From<f64> for Field {
    fn from(n: f64) -> Self {
        Field::Value(Value::from(n))
    }
}

impl PartialEq<NamedSentinel> for Field {
    fn eq(&self, other: &NamedSentinel) -> bool {
        self.is_sentinel(other)
    }
}

impl PartialEq<Value> for Field {
    fn eq(&self, other: &Value) -> bool {
        self.as_value() == Some(other)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Value(v) => write!(f, "{}", v),
            Field::Sentinel(s) => write!(f, "{}", s),
        }
    }
}

impl Serialize for Field {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Field::Value(v) => v.serialize(serializer),
            Field::Sentinel(s) => s.serialize(serializer),
        }
    }
}

// ============================================================================
// Crumb
// ============================================================================

/// Short hex identifier for a crumb, used in logs and rendered output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CrumbId([u8; 8]);

impl CrumbId {
    fn generate() -> Self {
        let uuid = Uuid::now_v7();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&uuid.as_bytes()[8..16]);
        CrumbId(bytes)
    }
}

impl fmt::Display for CrumbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

#[derive(Default)]
struct CrumbFields {
    info: Fields,
    extra: Fields,
}

struct CrumbInner {
    id: CrumbId,
    title: String,
    created_at: DateTime<Utc>,
    fields: Mutex<CrumbFields>,
    trail: Trail,
}

/// A node in the trace tree.
///
/// Equality compares title, info, extra and the trail recursively; use
/// [`Crumb::ptr_eq`] to ask whether two handles are the same node.
#[derive(Clone)]
pub struct Crumb {
    inner: Arc<CrumbInner>,
}

impl Crumb {
    pub fn new(title: impl Into<String>) -> Self {
        Self::with_fields(title, Fields::new(), Fields::new())
    }

    pub fn with_info(title: impl Into<String>, info: Fields) -> Self {
        Self::with_fields(title, info, Fields::new())
    }

    pub fn with_fields(title: impl Into<String>, info: Fields, extra: Fields) -> Self {
        Self {
            inner: Arc::new(CrumbInner {
                id: CrumbId::generate(),
                title: title.into(),
                created_at: Utc::now(),
                fields: Mutex::new(CrumbFields { info, extra }),
                trail: Trail::new(),
            }),
        }
    }

    pub fn id(&self) -> CrumbId {
        self.inner.id
    }

    pub fn title(&self) -> &str {
        &self.inner.title
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }

    /// Snapshot of the `info` mapping.
    pub fn info(&self) -> Fields {
        self.fields().info.clone()
    }

    /// Snapshot of the `extra` mapping.
    pub fn extra(&self) -> Fields {
        self.fields().extra.clone()
    }

    pub fn info_field(&self, key: &str) -> Option<Field> {
        self.fields().info.get(key).cloned()
    }

    pub fn extra_field(&self, key: &str) -> Option<Field> {
        self.fields().extra.get(key).cloned()
    }

    /// Merge entries into `info`, overwriting keys that already exist.
    pub fn update_info<I, K, V>(&self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Field>,
    {
        let mut fields = self.fields();
        for (key, value) in entries {
            fields.info.insert(key.into(), value.into());
        }
    }

    /// Merge entries into `extra`, overwriting keys that already exist.
    pub fn update_extra<I, K, V>(&self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Field>,
    {
        let mut fields = self.fields();
        for (key, value) in entries {
            fields.extra.insert(key.into(), value.into());
        }
    }

    /// Child crumbs in attachment order.
    pub fn children(&self) -> Vec<Crumb> {
        self.trail()
    }

    /// Whether both handles refer to the same node.
    pub fn ptr_eq(&self, other: &Crumb) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn fields(&self) -> MutexGuard<'_, CrumbFields> {
        self.inner
            .fields
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl TrailCapable for Crumb {
    fn trail_slot(&self) -> &Trail {
        &self.inner.trail
    }
}

impl PartialEq for Crumb {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        if self.title() != other.title() {
            return false;
        }
        // Snapshot before comparing so the two locks are never held together.
        let (info, extra) = {
            let fields = self.fields();
            (fields.info.clone(), fields.extra.clone())
        };
        {
            let theirs = other.fields();
            if info != theirs.info || extra != theirs.extra {
                return false;
            }
        }
        self.trail() == other.trail()
    }
}

impl fmt::Debug for Crumb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = self.fields();
        f.debug_struct("Crumb")
            .field("id", &self.inner.id.to_string())
            .field("title", &self.inner.title)
            .field("info", &fields.info)
            .field("extra", &fields.extra)
            .field("trail", &self.inner.trail)
            .finish()
    }
}

impl Serialize for Crumb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (info, extra) = {
            let fields = self.fields();
            (fields.info.clone(), fields.extra.clone())
        };
        let mut state = serializer.serialize_struct("Crumb", 6)?;
        state.serialize_field("id", &self.inner.id.to_string())?;
        state.serialize_field("title", &self.inner.title)?;
        state.serialize_field("created_at", &self.inner.created_at)?;
        state.serialize_field("info", &info)?;
        state.serialize_field("extra", &extra)?;
        state.serialize_field("trail", &self.trail())?;
        state.end()
    }
}
