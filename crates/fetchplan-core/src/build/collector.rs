use crate::{
    error::InternalError,
    model::{AttributeDescriptor, AttributeType, CompositeType, EntityDescriptor},
    path::PropertyPath,
    plan::{HydratedValueExtractor, IdentifierDescription, NodeId, TableGroupId},
};
use std::{collections::BTreeMap, sync::Arc};

///
/// CollectorKind
///

#[derive(Debug)]
pub(crate) enum CollectorKind {
    /// One attribute carries the whole identifier.
    Encapsulated,
    /// Identifier properties are declared directly; components are located
    /// by name in this composite.
    NonEncapsulated { composite: Arc<CompositeType> },
}

///
/// IdentifierCollector
///
/// Transient fetch owner used while the walk is inside an entity's
/// identifier subtree. Fetches built here are detached from the entity's
/// regular children and handed over as an `IdentifierDescription` once the
/// subtree is left.
///

#[derive(Debug)]
pub(crate) struct IdentifierCollector {
    kind: CollectorKind,
    reference: NodeId,
    entity: Arc<EntityDescriptor>,
    path: PropertyPath,
    table_group: TableGroupId,
    fetches: Vec<NodeId>,
    extractors: BTreeMap<NodeId, HydratedValueExtractor>,
}

impl IdentifierCollector {
    pub(crate) fn new(
        reference: NodeId,
        entity: Arc<EntityDescriptor>,
        reference_path: &PropertyPath,
        table_group: TableGroupId,
    ) -> Self {
        let identifier = &entity.identifier;
        let (kind, path) = match (identifier.is_encapsulated(), &identifier.attribute.ty) {
            (false, AttributeType::Composite(composite)) => (
                CollectorKind::NonEncapsulated {
                    composite: Arc::clone(composite),
                },
                reference_path.append(PropertyPath::IDENTIFIER_SEGMENT),
            ),
            _ => (CollectorKind::Encapsulated, reference_path.clone()),
        };

        Self {
            kind,
            reference,
            entity,
            path,
            table_group,
            fetches: Vec::new(),
            extractors: BTreeMap::new(),
        }
    }

    /// Real entity reference this collector stands in for.
    pub(crate) const fn reference(&self) -> NodeId {
        self.reference
    }

    pub(crate) const fn entity(&self) -> &Arc<EntityDescriptor> {
        &self.entity
    }

    pub(crate) const fn path(&self) -> &PropertyPath {
        &self.path
    }

    pub(crate) const fn table_group(&self) -> TableGroupId {
        self.table_group
    }

    pub(crate) fn fetches(&self) -> &[NodeId] {
        &self.fetches
    }

    pub(crate) const fn is_encapsulated(&self) -> bool {
        matches!(self.kind, CollectorKind::Encapsulated)
    }

    /// Check a fetch attached directly to this collector.
    pub(crate) fn validate_fetch(&self, attribute: &AttributeDescriptor) -> Result<(), InternalError> {
        self.validate_nested(attribute)?;

        if self.is_encapsulated() {
            let expected = self.entity.identifier.property_name();
            if attribute.name != expected {
                return Err(InternalError::metadata_lookup(format!(
                    "encapsulated identifier of '{}' is '{expected}', not '{}'",
                    self.entity.name, attribute.name
                )));
            }
            if !self.fetches.is_empty() {
                return Err(self.second_fetch_error(&attribute.name));
            }
        }

        Ok(())
    }

    /// Check a fetch built anywhere below this collector, including inside
    /// composites of the identifier type.
    pub(crate) fn validate_nested(&self, attribute: &AttributeDescriptor) -> Result<(), InternalError> {
        if attribute.is_collection() {
            return Err(InternalError::identifier_protocol(format!(
                "identifier cannot contain persistent collections ('{}' on '{}')",
                attribute.name, self.entity.name
            )));
        }

        Ok(())
    }

    /// Extractor for a key-many-to-one component named by `attribute`.
    pub(crate) fn extractor_for(
        &self,
        attribute: &AttributeDescriptor,
    ) -> Result<HydratedValueExtractor, InternalError> {
        match &self.kind {
            CollectorKind::Encapsulated => Ok(HydratedValueExtractor::Whole),
            CollectorKind::NonEncapsulated { composite } => composite
                .position_of(&attribute.name)
                .map(|index| HydratedValueExtractor::Component {
                    index,
                    property: attribute.name.clone(),
                })
                .ok_or_else(|| {
                    InternalError::metadata_lookup(format!(
                        "'{}' is not a property of identifier type '{}' ({})",
                        attribute.name,
                        composite.name,
                        composite.property_names().collect::<Vec<_>>().join(", ")
                    ))
                }),
        }
    }

    pub(crate) fn record(
        &mut self,
        fetch: NodeId,
        extractor: Option<HydratedValueExtractor>,
    ) -> Result<(), InternalError> {
        if self.is_encapsulated() && !self.fetches.is_empty() {
            return Err(self.second_fetch_error(&fetch.to_string()));
        }
        self.fetches.push(fetch);
        if let Some(extractor) = extractor {
            self.extractors.insert(fetch, extractor);
        }

        Ok(())
    }

    fn second_fetch_error(&self, name: &str) -> InternalError {
        InternalError::identifier_protocol(format!(
            "encapsulated identifier of '{}' already holds its single fetch; '{name}' is a second one",
            self.entity.name
        ))
    }

    pub(crate) fn extractor_count(&self) -> usize {
        self.extractors.len()
    }

    pub(crate) fn into_description(self) -> IdentifierDescription {
        let extractors = match self.kind {
            CollectorKind::Encapsulated => None,
            CollectorKind::NonEncapsulated { .. } => Some(self.extractors),
        };

        IdentifierDescription::new(self.fetches, extractors)
    }
}
