use crate::{
    error::{ErrorOrigin, InternalError},
    model::{
        AttributeDescriptor, AttributeType, CollectionDescriptor, CompositeType, EntityDescriptor,
        FetchStrategy, LockMode,
    },
    path::PropertyPath,
    plan::{IdentifierDescription, NodeId, TableGroupId},
};
use std::sync::Arc;

///
/// PlanNode
///
/// One node of the load-plan arena. `fetches` is the ordered child list and
/// is only ever populated on fetch owners.
///

#[derive(Clone, Debug)]
pub struct PlanNode {
    pub(crate) id: NodeId,
    pub(crate) path: PropertyPath,
    pub(crate) table_group: TableGroupId,
    pub(crate) fetches: Vec<NodeId>,
    pub(crate) kind: NodeKind,
}

impl PlanNode {
    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    #[must_use]
    pub const fn path(&self) -> &PropertyPath {
        &self.path
    }

    #[must_use]
    pub const fn table_group(&self) -> TableGroupId {
        self.table_group
    }

    /// Child fetches in visitation order.
    #[must_use]
    pub fn fetches(&self) -> &[NodeId] {
        &self.fetches
    }

    #[must_use]
    pub const fn kind(&self) -> &NodeKind {
        &self.kind
    }

    #[must_use]
    pub const fn as_fetch(&self) -> Option<&Fetch> {
        match &self.kind {
            NodeKind::Fetch(fetch) => Some(fetch),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_entity_reference(&self) -> Option<&EntityReference> {
        match &self.kind {
            NodeKind::EntityReturn(reference)
            | NodeKind::Fetch(Fetch::Entity(EntityFetch { reference, .. }))
            | NodeKind::EntityElementGraph { reference, .. } => Some(reference),
            _ => None,
        }
    }

    pub(crate) const fn as_entity_reference_mut(&mut self) -> Option<&mut EntityReference> {
        match &mut self.kind {
            NodeKind::EntityReturn(reference)
            | NodeKind::Fetch(Fetch::Entity(EntityFetch { reference, .. }))
            | NodeKind::EntityElementGraph { reference, .. } => Some(reference),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_collection_reference(&self) -> Option<&CollectionReference> {
        match &self.kind {
            NodeKind::CollectionReturn(reference)
            | NodeKind::Fetch(Fetch::Collection(CollectionFetch { reference, .. })) => {
                Some(reference)
            }
            _ => None,
        }
    }

    /// Collection references parent graphs, not fetches. Bidirectional
    /// links own nothing.
    #[must_use]
    pub const fn is_fetch_owner(&self) -> bool {
        !matches!(
            self.kind,
            NodeKind::CollectionReturn(_)
                | NodeKind::Fetch(Fetch::Collection(_) | Fetch::BidirectionalEntity(_))
        )
    }

    #[must_use]
    pub const fn is_return(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::EntityReturn(_) | NodeKind::CollectionReturn(_)
        )
    }

    /// Logical parent: the owner of a fetch or the collection of a graph.
    #[must_use]
    pub const fn parent(&self) -> Option<NodeId> {
        match &self.kind {
            NodeKind::Fetch(fetch) => Some(fetch.info().owner),
            NodeKind::EntityElementGraph { collection, .. }
            | NodeKind::CompositeElementGraph { collection, .. } => Some(*collection),
            NodeKind::EntityReturn(_) | NodeKind::CollectionReturn(_) => None,
        }
    }

    #[must_use]
    pub const fn kind_label(&self) -> &'static str {
        match &self.kind {
            NodeKind::EntityReturn(_) => "entity-return",
            NodeKind::CollectionReturn(_) => "collection-return",
            NodeKind::Fetch(Fetch::Entity(_)) => "entity-fetch",
            NodeKind::Fetch(Fetch::Collection(_)) => "collection-fetch",
            NodeKind::Fetch(Fetch::Composite(_)) => "composite-fetch",
            NodeKind::Fetch(Fetch::BidirectionalEntity(_)) => "bidirectional-entity-fetch",
            NodeKind::EntityElementGraph { .. } => "entity-element-graph",
            NodeKind::CompositeElementGraph { .. } => "composite-element-graph",
        }
    }
}

///
/// NodeKind
///

#[derive(Clone, Debug)]
pub enum NodeKind {
    EntityReturn(EntityReference),
    CollectionReturn(CollectionReference),
    Fetch(Fetch),
    EntityElementGraph {
        collection: NodeId,
        role: GraphRole,
        reference: EntityReference,
    },
    CompositeElementGraph {
        collection: NodeId,
        role: GraphRole,
        composite: Arc<CompositeType>,
    },
}

///
/// GraphRole
/// Which side of a collection a graph node describes.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum GraphRole {
    Element,
    Index,
}

///
/// Fetch
///

#[derive(Clone, Debug)]
pub enum Fetch {
    Entity(EntityFetch),
    Collection(CollectionFetch),
    Composite(CompositeFetch),
    BidirectionalEntity(BidirectionalEntityFetch),
}

impl Fetch {
    #[must_use]
    pub const fn info(&self) -> &FetchInfo {
        match self {
            Self::Entity(fetch) => &fetch.info,
            Self::Collection(fetch) => &fetch.info,
            Self::Composite(fetch) => &fetch.info,
            Self::BidirectionalEntity(fetch) => &fetch.info,
        }
    }

    #[must_use]
    pub const fn owner(&self) -> NodeId {
        self.info().owner
    }
}

///
/// FetchInfo
/// State shared by every fetch variant.
///

#[derive(Clone, Debug)]
pub struct FetchInfo {
    /// Logical owner; set once at construction.
    pub owner: NodeId,
    pub attribute: AttributeDescriptor,
    pub strategy: FetchStrategy,
}

impl FetchInfo {
    #[must_use]
    pub const fn nullable(&self) -> bool {
        self.attribute.nullable
    }

    #[must_use]
    pub const fn fetched_type(&self) -> &AttributeType {
        &self.attribute.ty
    }
}

///
/// EntityFetch
///

#[derive(Clone, Debug)]
pub struct EntityFetch {
    pub info: FetchInfo,
    pub reference: EntityReference,
}

///
/// CollectionFetch
///

#[derive(Clone, Debug)]
pub struct CollectionFetch {
    pub info: FetchInfo,
    pub reference: CollectionReference,
}

///
/// CompositeFetch
///

#[derive(Clone, Debug)]
pub struct CompositeFetch {
    pub info: FetchInfo,
    pub composite: Arc<CompositeType>,
}

///
/// BidirectionalEntityFetch
///
/// Key-many-to-one inside an identifier that points back at the entity
/// owning the referencing fetch. It links to that existing reference and is
/// never walked into, so the owner is not fetched a second time.
///

#[derive(Clone, Debug)]
pub struct BidirectionalEntityFetch {
    pub info: FetchInfo,
    /// Entity reference already present in the plan.
    pub target: NodeId,
}

///
/// EntityReference
///
/// Capability carried by entity returns, entity fetches, and entity element
/// graphs. The identifier description slot starts empty and is written once.
///

#[derive(Clone, Debug)]
pub struct EntityReference {
    entity: Arc<EntityDescriptor>,
    lock_mode: LockMode,
    identifier: Option<IdentifierDescription>,
}

impl EntityReference {
    pub(crate) const fn new(entity: Arc<EntityDescriptor>, lock_mode: LockMode) -> Self {
        Self {
            entity,
            lock_mode,
            identifier: None,
        }
    }

    #[must_use]
    pub const fn entity(&self) -> &Arc<EntityDescriptor> {
        &self.entity
    }

    #[must_use]
    pub const fn lock_mode(&self) -> LockMode {
        self.lock_mode
    }

    #[must_use]
    pub const fn identifier_description(&self) -> Option<&IdentifierDescription> {
        self.identifier.as_ref()
    }

    pub(crate) fn inject_identifier_description(
        &mut self,
        description: IdentifierDescription,
    ) -> Result<(), InternalError> {
        if self.identifier.is_some() {
            return Err(InternalError::double_injection(
                ErrorOrigin::Identifier,
                format!(
                    "identifier description for '{}' was already injected",
                    self.entity.name
                ),
            ));
        }
        self.identifier = Some(description);

        Ok(())
    }
}

///
/// CollectionReference
///
/// Capability carried by collection returns and collection fetches. Graphs
/// exist only for associative or composite element/index types.
///

#[derive(Clone, Debug)]
pub struct CollectionReference {
    pub(crate) collection: Arc<CollectionDescriptor>,
    pub(crate) element_graph: Option<NodeId>,
    pub(crate) index_graph: Option<NodeId>,
}

impl CollectionReference {
    pub(crate) const fn new(collection: Arc<CollectionDescriptor>) -> Self {
        Self {
            collection,
            element_graph: None,
            index_graph: None,
        }
    }

    #[must_use]
    pub const fn collection(&self) -> &Arc<CollectionDescriptor> {
        &self.collection
    }

    #[must_use]
    pub const fn element_graph(&self) -> Option<NodeId> {
        self.element_graph
    }

    #[must_use]
    pub const fn index_graph(&self) -> Option<NodeId> {
        self.index_graph
    }
}
