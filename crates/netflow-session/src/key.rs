//! Session and template identifiers.

use std::fmt;

/// Template identifier as announced by the exporter.
///
/// Unique within one session only; two exporters may reuse the same ID for
/// unrelated layouts.
pub type TemplateId = u16;

/// Lookup key for a session: exporter address plus observation domain.
///
/// When templates are shared across exporters the address is left out, so
/// every packet carrying the same source ID maps onto the same session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    addr: Option<String>,
    source_id: u32,
}

impl SessionKey {
    /// Build a key for `addr` and `source_id`.
    pub fn new(addr: impl fmt::Display, source_id: u32, shared_templates: bool) -> Self {
        if shared_templates {
            return Self::shared(source_id);
        }
        Self {
            addr: Some(addr.to_string()),
            source_id,
        }
    }

    /// Build an address-less key used in shared-templates mode.
    pub fn shared(source_id: u32) -> Self {
        Self {
            addr: None,
            source_id,
        }
    }

    /// Exporter address, or `None` for a shared key.
    pub fn addr(&self) -> Option<&str> {
        self.addr.as_deref()
    }

    /// Source ID (v9) or observation domain ID (IPFIX).
    pub fn source_id(&self) -> u32 {
        self.source_id
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.addr {
            Some(addr) => write!(f, "{}/{}", addr, self.source_id),
            None => write!(f, "*/{}", self.source_id),
        }
    }
}
