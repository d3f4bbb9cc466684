use lasso::{Spur, ThreadedRodeo};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;
use ulid::Ulid;

/// Global string interner for stable ids.
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::default);

/// Editor-generated identity of a tracked node.
///
/// Persisted on the node as an attribute and interned here so the id is
/// `Copy` and hashes in O(1). Two ids are equal iff their strings are equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct StableId(Spur);

impl StableId {
    /// Intern a string as a StableId, or return the existing one.
    pub fn intern(s: &str) -> Self {
        StableId(INTERNER.get_or_intern(s))
    }

    /// Look up an already-interned id without growing the interner.
    pub fn existing(s: &str) -> Option<Self> {
        INTERNER.get(s).map(StableId)
    }

    /// Resolve back to a string slice.
    pub fn as_str(&self) -> &str {
        INTERNER.resolve(&self.0)
    }

    /// Generate a fresh collision-resistant id (`ld-<ulid>`).
    pub fn generate() -> Self {
        Self::with_prefix("ld")
    }

    /// Generate a fresh id with a custom prefix, e.g. `oid-01j9...`.
    pub fn with_prefix(prefix: &str) -> Self {
        let token = Ulid::new().to_string().to_ascii_lowercase();
        Self::intern(&format!("{prefix}-{token}"))
    }
}

impl fmt::Debug for StableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.as_str())
    }
}

impl fmt::Display for StableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for StableId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for StableId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(StableId::intern(&s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_roundtrip() {
        let a = StableId::intern("ld-hero");
        let b = StableId::intern("ld-hero");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "ld-hero");
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = StableId::generate();
        let b = StableId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("ld-"));
    }

    #[test]
    fn existing_does_not_intern() {
        assert!(StableId::existing("ld-never-interned-anywhere").is_none());
        let id = StableId::intern("ld-seen");
        assert_eq!(StableId::existing("ld-seen"), Some(id));
    }
}
