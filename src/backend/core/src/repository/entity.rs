//! Entity marker trait and the optional auditable capability.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A record type managed by a repository.
///
/// Entities that carry audit timestamps override [`Entity::auditable_mut`];
/// everything else uses the default and is stored untouched.
///
/// ```rust,ignore
/// #[derive(Clone)]
/// struct Note {
///     id: u64,
///     body: String,
///     audit: AuditStamps,
/// }
///
/// impl Entity for Note {
///     fn auditable_mut(&mut self) -> Option<&mut dyn Auditable> {
///         Some(&mut self.audit)
///     }
/// }
/// ```
pub trait Entity: Clone + Send + Sync + 'static {
    /// Access to the entity's audit timestamps, if it has any.
    fn auditable_mut(&mut self) -> Option<&mut dyn Auditable> {
        None
    }
}

/// Creation and last-update timestamps maintained by the repository.
pub trait Auditable: Send + Sync {
    fn created_at(&self) -> Option<DateTime<Utc>>;
    fn set_created_at(&mut self, at: DateTime<Utc>);
    fn updated_at(&self) -> Option<DateTime<Utc>>;
    fn set_updated_at(&mut self, at: DateTime<Utc>);
}

/// Embeddable pair of audit timestamps.
///
/// Both are `None` until the entity is first persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditStamps {
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Auditable for AuditStamps {
    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    fn set_created_at(&mut self, at: DateTime<Utc>) {
        self.created_at = Some(at);
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = Some(at);
    }
}
