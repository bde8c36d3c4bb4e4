use crate::value::Value;
use derive_more::Display;
use serde::Serialize;
use std::sync::Arc;

///
/// EntityKey
/// Canonical (entity, identifier) pair identifying one entity instance.
///

#[derive(Clone, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[display("{entity}#{identifier}")]
pub struct EntityKey {
    pub entity: String,
    pub identifier: Value,
}

impl EntityKey {
    #[must_use]
    pub fn new(entity: impl Into<String>, identifier: Value) -> Self {
        Self {
            entity: entity.into(),
            identifier,
        }
    }
}

///
/// ResolutionPhase
///
/// Per-reference, per-row progress. Phases only move forward within a row;
/// `finish_up_row` starts every reference over at `Unvisited`.
///

#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
pub enum ResolutionPhase {
    #[default]
    Unvisited,
    Hydrating,
    Hydrated,
    Resolving,
    Resolved,
}

///
/// HydrationSource
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HydrationSource {
    /// Read from the row cursor.
    Row,
    /// Pulled out of the owning reference's hydrated identifier.
    Extracted,
    /// Supplied by the row processor before hydration ran.
    Registered,
}

///
/// ReferenceProcessingState
///

#[derive(Clone, Debug, Default)]
pub struct ReferenceProcessingState {
    pub(crate) phase: ResolutionPhase,
    pub(crate) hydrated_form: Option<Value>,
    pub(crate) hydrated_via: Option<HydrationSource>,
    pub(crate) entity_key: Option<Arc<EntityKey>>,
    pub(crate) missing_identifier: bool,
}

impl ReferenceProcessingState {
    #[must_use]
    pub const fn phase(&self) -> ResolutionPhase {
        self.phase
    }

    #[must_use]
    pub const fn hydrated_form(&self) -> Option<&Value> {
        self.hydrated_form.as_ref()
    }

    #[must_use]
    pub const fn hydrated_via(&self) -> Option<HydrationSource> {
        self.hydrated_via
    }

    #[must_use]
    pub const fn entity_key(&self) -> Option<&Arc<EntityKey>> {
        self.entity_key.as_ref()
    }

    /// True when the reference resolved to no row (all-null identifier).
    #[must_use]
    pub const fn is_missing_identifier(&self) -> bool {
        self.missing_identifier
    }
}
