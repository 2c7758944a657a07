//! Typed identifiers.
//!
//! `TenantId` wraps UUIDv7 (time-ordered, globally unique) and is used as the
//! internal cache key for per-tenant components — it is opaque, derived once
//! from whatever external tenant identifier (hostname, `X-Tenant-Id` header)
//! resolution produced.
//!
//! `ElementId` is different: elements are addressed by a caller-supplied or
//! kind-prefixed *string* (`Task-…`, `Action-…`), never a bare UUID, because
//! the manual task-extraction path lets callers supply their own id
//! (`gen_ai.task.id`). `ElementId::generate` produces the auto form.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A tenant identifier (UUIDv7). Internal cache key only — never sent on the wire.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(uuid::Uuid);

macro_rules! impl_typed_id {
    ($T:ident, $name:literal) => {
        impl $T {
            /// Create a new time-ordered ID (UUIDv7).
            pub fn new() -> Self {
                Self(uuid::Uuid::now_v7())
            }

            /// First 8 hex characters — for human display only, not lookup.
            pub fn short(&self) -> String {
                self.0.as_simple().to_string()[..8].to_string()
            }

            /// Full 32-character hex string (no hyphens).
            pub fn to_hex(&self) -> String {
                self.0.as_simple().to_string()
            }

            /// Reconstruct from 16 bytes.
            pub fn from_bytes(b: [u8; 16]) -> Self {
                Self(uuid::Uuid::from_bytes(b))
            }

            /// Parse from a hex string (32 chars, no hyphens) or standard UUID format.
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                uuid::Uuid::parse_str(s).map(Self)
            }
        }

        impl Default for $T {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<uuid::Uuid> for $T {
            fn from(u: uuid::Uuid) -> Self {
                Self(u)
            }
        }

        impl From<$T> for uuid::Uuid {
            fn from(id: $T) -> uuid::Uuid {
                id.0
            }
        }

        impl fmt::Display for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $name, self.short())
            }
        }
    };
}

impl_typed_id!(TenantId, "TenantId");

/// Fixed namespace for deriving a deterministic `TenantId` from a tenant's external name.
const TENANT_NS: uuid::Uuid = uuid::uuid!("7a2e9b10-4f3c-4a6d-9e21-2b8f6c7d1a90");

impl TenantId {
    /// Derive a stable internal id from the external tenant identifier (hostname,
    /// `X-Tenant-Id` header value, ...). Same input always yields the same id, so
    /// the per-tenant component cache (§5) can use it as a lookup key without a
    /// prior registration step.
    pub fn from_external(name: &str) -> Self {
        Self(uuid::Uuid::new_v5(&TENANT_NS, name.as_bytes()))
    }
}

/// Process-wide unique identifier for a persisted [`Element`](crate::element::Element).
///
/// Caller-supplied (a manual task's `gen_ai.task.id`) or auto-generated with a
/// kind prefix (`Task-…`, `Action-…`, `Metric-…`, ...).
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(String);

impl ElementId {
    /// Generate a new id with the given kind prefix, e.g. `ElementId::generate("Task")`.
    pub fn generate(kind_prefix: &str) -> Self {
        Self(format!("{kind_prefix}-{}", uuid::Uuid::now_v7().simple()))
    }

    /// Wrap a caller-supplied or otherwise already-formed id string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The kind prefix before the first `-`, if this id has the generated shape.
    pub fn kind_prefix(&self) -> Option<&str> {
        self.0.split('-').next().filter(|p| *p != self.0.as_str())
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ElementId({})", self.0)
    }
}

impl From<String> for ElementId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ElementId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_id_generate_has_prefix() {
        let id = ElementId::generate("Task");
        assert!(id.as_str().starts_with("Task-"));
        assert_eq!(id.kind_prefix(), Some("Task"));
    }

    #[test]
    fn element_id_from_caller_has_no_prefix_if_no_dash() {
        let id = ElementId::from_string("Task-A");
        assert_eq!(id.kind_prefix(), Some("Task"));
        let id2 = ElementId::from_string("abc");
        assert_eq!(id2.kind_prefix(), None);
    }

    #[test]
    fn tenant_id_from_external_is_deterministic() {
        let a = TenantId::from_external("acme-corp");
        let b = TenantId::from_external("acme-corp");
        assert_eq!(a, b);
        let c = TenantId::from_external("other-corp");
        assert_ne!(a, c);
    }

    #[test]
    fn element_id_serde_roundtrip() {
        let id = ElementId::generate("Metric");
        let json = serde_json::to_string(&id).unwrap();
        let back: ElementId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
