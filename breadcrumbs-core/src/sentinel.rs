//! Named sentinels with identity semantics.

use once_cell::sync::Lazy;
use serde::{Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A marker value that is only ever equal to itself.
///
/// Two sentinels built from the same name are distinct. Cloning hands back the
/// same instance, so a sentinel stored in a captured-argument map survives any
/// number of copies of that map and can still be recognised with `==`.
#[derive(Clone)]
pub struct NamedSentinel {
    name: Arc<str>,
}

impl NamedSentinel {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: Arc::from(name.as_ref()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for NamedSentinel {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.name, &other.name)
    }
}

impl Eq for NamedSentinel {}

impl Hash for NamedSentinel {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.name) as *const u8 as usize).hash(state);
    }
}

impl fmt::Display for NamedSentinel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Debug for NamedSentinel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl Serialize for NamedSentinel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name)
    }
}

/// Placeholder substituted for redacted parameters in captured arguments.
pub static REDACTED: Lazy<NamedSentinel> = Lazy::new(|| NamedSentinel::new("REDACTED"));

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_display_and_debug_yield_name() {
        let s = NamedSentinel::new("MISSING");
        assert_eq!(s.to_string(), "MISSING");
        assert_eq!(format!("{:?}", s), "MISSING");
        assert_eq!(s.name(), "MISSING");
    }

    #[test]
    fn test_equality_is_identity() {
        let a = NamedSentinel::new("X");
        let b = NamedSentinel::new("X");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_hash_follows_identity() {
        let a = NamedSentinel::new("X");
        let b = NamedSentinel::new("X");

        let mut set = HashSet::new();
        set.insert(a.clone());
        set.insert(a.clone());
        set.insert(b);
        assert_eq!(set.len(), 2);
        assert!(set.contains(&a));
    }

    #[test]
    fn test_redacted_is_shared() {
        let first = REDACTED.clone();
        let second = (*REDACTED).clone();
        assert_eq!(first, second);
        assert_ne!(first, NamedSentinel::new("REDACTED"));
        assert_eq!(serde_json::to_string(&first).unwrap(), "\"REDACTED\"");
    }
}
