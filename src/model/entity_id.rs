use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// The closed set of entity kinds carried in the derived view.
///
/// Variant order is the canonical kind ordering (alphabetical); `all()`
/// and the entity store rely on it for deterministic kind-then-id
/// enumeration. Adding a kind means adding a variant plus a collection
/// handler, not editing a central conditional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    Annotation,
    Application,
    Machine,
    Relation,
    Unit,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Annotation => "annotation",
            EntityKind::Application => "application",
            EntityKind::Machine => "machine",
            EntityKind::Relation => "relation",
            EntityKind::Unit => "unit",
        }
    }
}

/// Uniquely addresses one logical entity in the derived view.
/// Immutable once assigned; ordered by (kind, id).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId {
    pub kind: EntityKind,
    pub id: String,
}

impl EntityId {
    pub fn new(
        kind: EntityKind,
        id: impl Into<String>,
    ) -> Self {
        Self { kind, id: id.into() }
    }

    pub fn machine(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Machine, id)
    }

    pub fn unit(name: impl Into<String>) -> Self {
        Self::new(EntityKind::Unit, name)
    }

    pub fn application(name: impl Into<String>) -> Self {
        Self::new(EntityKind::Application, name)
    }

    pub fn relation(key: impl Into<String>) -> Self {
        Self::new(EntityKind::Relation, key)
    }

    pub fn annotation(tag: impl Into<String>) -> Self {
        Self::new(EntityKind::Annotation, tag)
    }
}

impl fmt::Display for EntityId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}-{}", self.kind.as_str(), self.id)
    }
}
