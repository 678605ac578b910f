//! Per-module compiler session identity
//!
//! The compiler service keys per-module caches and state by session id, so
//! the id must be stable: the same module name maps to the same session on
//! every invocation and across process restarts. It is therefore derived by
//! hashing a fixed namespace plus the module name, never generated randomly.

use std::fmt;

use sha2::{Digest, Sha256};

/// Namespace prefix keeping these ids distinct from any other SHA-256 use.
const SESSION_NAMESPACE: &[u8] = b"kotbuild.compiler.session/v1";

/// Deterministic UUID-style session key for one module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId([u8; 16]);

impl SessionId {
    /// Derive the session id for a module name. Idempotent.
    pub fn for_module(module_name: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(SESSION_NAMESPACE);
        hasher.update(module_name.as_bytes());
        let digest = hasher.finalize();

        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);
        // Shape the bytes like a name-based UUID: version nibble 5,
        // RFC 4122 variant bits.
        bytes[6] = (bytes[6] & 0x0f) | 0x50;
        bytes[8] = (bytes[8] & 0x3f) | 0x80;
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
            b[8], b[9], b[10], b[11], b[12], b[13], b[14], b[15]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_same_module_same_id() {
        let a = SessionId::for_module("lib_core");
        let b = SessionId::for_module("lib_core");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), b.to_string());
    }

    #[test]
    fn test_different_modules_differ() {
        assert_ne!(
            SessionId::for_module("lib_core"),
            SessionId::for_module("lib_api")
        );
    }

    #[test]
    fn test_uuid_shape() {
        let id = SessionId::for_module("lib_core").to_string();
        assert_eq!(id.len(), 36);
        let groups: Vec<&str> = id.split('-').collect();
        assert_eq!(
            groups.iter().map(|g| g.len()).collect::<Vec<_>>(),
            vec![8, 4, 4, 4, 12]
        );
        // Version nibble is fixed by derivation
        assert!(groups[2].starts_with('5'));
    }
}
