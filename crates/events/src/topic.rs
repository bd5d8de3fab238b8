//! Topic naming for the co-editing bus.

use std::fmt;

use atelier_core::types::ResourceKey;

// ---------------------------------------------------------------------------
// TopicFamily
// ---------------------------------------------------------------------------

/// The three message families every resource gets a topic for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicFamily {
    /// Durable-store lifecycle events (created / updated / deleted).
    Lifecycle,
    /// Fine-grained unsaved form-state snapshots.
    Form,
    /// Membership-change notifications.
    Presence,
}

impl TopicFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            TopicFamily::Lifecycle => "lifecycle",
            TopicFamily::Form => "form",
            TopicFamily::Presence => "presence",
        }
    }
}

// ---------------------------------------------------------------------------
// Topic
// ---------------------------------------------------------------------------

/// A named topic: one family scoped to one resource.
///
/// Renders as `{family}:{resource_type}:{resource_id}`, e.g.
/// `form:record:42`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic {
    pub family: TopicFamily,
    pub key: ResourceKey,
}

impl Topic {
    pub fn lifecycle(key: ResourceKey) -> Self {
        Self {
            family: TopicFamily::Lifecycle,
            key,
        }
    }

    pub fn form(key: ResourceKey) -> Self {
        Self {
            family: TopicFamily::Form,
            key,
        }
    }

    pub fn presence(key: ResourceKey) -> Self {
        Self {
            family: TopicFamily::Presence,
            key,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.family.as_str(), self.key)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
