use crate::{
    build::{
        association::AssociationKey,
        collector::IdentifierCollector,
        stacks::{OwnerFrame, WalkStacks},
        strategy::{FetchDecisionContext, LoadPlanBuildingStrategy},
    },
    error::{ErrorOrigin, InternalError},
    model::{
        AttributeDescriptor, AttributeType, CollectionDescriptor, EntityDescriptor, FetchStrategy,
        MetadataRegistry,
    },
    obs::{self, PlanTraceEvent, PlanTraceSink, TraceFrame},
    path::PropertyPath,
    plan::{
        BidirectionalEntityFetch, CollectionFetch, CollectionReference, CompositeFetch,
        EntityFetch, EntityReference, Fetch, FetchInfo, GraphRole, HydratedValueExtractor,
        LoadPlan, NodeId, NodeKind, TableGroupId,
    },
};
use std::{collections::BTreeSet, sync::Arc};

///
/// FetchParent
/// Where a new fetch attaches and whom it names as its logical owner.
///

struct FetchParent {
    attach: Attach,
    owner: NodeId,
    path: PropertyPath,
    table_group: TableGroupId,
}

enum Attach {
    Node(NodeId),
    Identifier,
}

///
/// LoadPlanBuilder
///
/// Walk controller. Receives depth-first metadata events, keeps the
/// fetch-owner and collection-reference stacks, and grows a `LoadPlan`.
///
/// One instance serves one walk at a time; `start` refuses to run while
/// frames from another walk are still open. Any error poisons the builder
/// and `into_load_plan` will refuse to hand out the partial plan.
///

pub struct LoadPlanBuilder<'a, S> {
    registry: &'a MetadataRegistry,
    strategy: S,
    trace: Option<&'a dyn PlanTraceSink>,
    plan: LoadPlan,
    stacks: WalkStacks,
    association_keys: BTreeSet<AssociationKey>,
    joined_collections: usize,
    failure: Option<InternalError>,
}

impl<'a, S: LoadPlanBuildingStrategy> LoadPlanBuilder<'a, S> {
    #[must_use]
    pub fn new(registry: &'a MetadataRegistry, strategy: S) -> Self {
        Self {
            registry,
            strategy,
            trace: None,
            plan: LoadPlan::default(),
            stacks: WalkStacks::default(),
            association_keys: BTreeSet::new(),
            joined_collections: 0,
            failure: None,
        }
    }

    #[must_use]
    pub fn with_trace(mut self, sink: &'a dyn PlanTraceSink) -> Self {
        self.trace = Some(sink);
        self
    }

    #[must_use]
    pub const fn registry(&self) -> &'a MetadataRegistry {
        self.registry
    }

    #[must_use]
    pub const fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Plan built so far.
    #[must_use]
    pub const fn plan(&self) -> &LoadPlan {
        &self.plan
    }

    #[must_use]
    pub const fn owner_depth(&self) -> usize {
        self.stacks.owner_depth()
    }

    #[must_use]
    pub const fn collection_depth(&self) -> usize {
        self.stacks.collection_depth()
    }

    #[must_use]
    pub const fn path_depth(&self) -> usize {
        self.stacks.paths().depth()
    }

    #[must_use]
    pub fn current_path(&self) -> Option<&PropertyPath> {
        self.stacks.paths().current()
    }

    #[must_use]
    pub const fn is_poisoned(&self) -> bool {
        self.failure.is_some()
    }

    /// Hand out the finished plan.
    pub fn into_load_plan(self) -> Result<LoadPlan, InternalError> {
        if let Some(err) = self.failure {
            return Err(err);
        }
        if !self.stacks.is_at_root() {
            return Err(InternalError::walk_protocol(format!(
                "walk left open (owner depth {}, collection depth {})",
                self.stacks.owner_depth(),
                self.stacks.collection_depth()
            )));
        }

        Ok(self.plan)
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    pub fn start(&mut self) -> Result<(), InternalError> {
        let result = if self.stacks.is_at_root() {
            self.stacks.clear();
            self.association_keys.clear();
            self.joined_collections = 0;
            obs::emit(self.trace, || PlanTraceEvent::WalkStarted);
            Ok(())
        } else {
            Err(InternalError::walk_protocol(
                "walk already in progress; a builder cannot be re-entered",
            ))
        };

        self.guard(result)
    }

    /// Release all walk state. Always safe, including after a failure.
    pub fn finish(&mut self) {
        self.stacks.clear();
        self.association_keys.clear();
        obs::emit(self.trace, || PlanTraceEvent::WalkFinished {
            returns: self.plan.returns().len(),
            nodes: self.plan.len(),
        });
    }

    // ------------------------------------------------------------------
    // Entities
    // ------------------------------------------------------------------

    pub fn entering_entity(&mut self, entity: &EntityDescriptor) -> Result<(), InternalError> {
        let result = self.try_entering_entity(entity);
        self.guard(result)
    }

    fn try_entering_entity(&mut self, entity: &EntityDescriptor) -> Result<(), InternalError> {
        if !self.stacks.is_at_root() {
            // Nested entities were pushed by the association that reached them.
            return self.current_entity_reference(entity, "entering").map(|_| ());
        }
        if !self.strategy.supports_root_entity_returns() {
            return Err(InternalError::unsupported(
                ErrorOrigin::Walk,
                format!("root entity returns are not supported ('{}')", entity.name),
            ));
        }

        let entity = Arc::clone(self.registry.entity(&entity.name)?);
        let path = PropertyPath::root(entity.name.clone());
        let table_group = self.plan.allocate_table_group();
        let reference = EntityReference::new(entity, self.strategy.lock_mode());
        let id = self
            .plan
            .add_return(path, table_group, NodeKind::EntityReturn(reference));
        self.push_node(id);

        Ok(())
    }

    pub fn exiting_entity(&mut self, entity: &EntityDescriptor) -> Result<(), InternalError> {
        let result = self
            .current_entity_reference(entity, "exiting")
            .and_then(|_| self.pop_owner(TraceFrame::Owner).map(|_| ()));
        self.guard(result)
    }

    /// Top-of-stack entity reference, checked against `entity`'s hierarchy.
    fn current_entity_reference(
        &self,
        entity: &EntityDescriptor,
        action: &str,
    ) -> Result<NodeId, InternalError> {
        let id = match self.stacks.top_owner() {
            Some(OwnerFrame::Node(id)) => *id,
            Some(frame) => {
                return Err(InternalError::walk_protocol(format!(
                    "{action} entity '{}' but the current owner is an {}",
                    entity.name,
                    frame.label()
                )));
            }
            None => {
                return Err(InternalError::walk_protocol(format!(
                    "{action} entity '{}' with no entity reference on the fetch-owner stack",
                    entity.name
                )));
            }
        };

        let Some(reference) = self.plan.entity_reference(id) else {
            return Err(InternalError::walk_protocol(format!(
                "{action} entity '{}' but the current owner is a {}",
                entity.name,
                self.plan.node(id).kind_label()
            )));
        };
        if !self
            .registry
            .is_hierarchy_related(&reference.entity().name, &entity.name)
        {
            return Err(InternalError::walk_protocol(format!(
                "{action} entity '{}' but the current entity reference is '{}'",
                entity.name,
                reference.entity().name
            )));
        }

        Ok(id)
    }

    // ------------------------------------------------------------------
    // Identifiers
    // ------------------------------------------------------------------

    pub fn entering_entity_identifier(
        &mut self,
        entity: &EntityDescriptor,
    ) -> Result<(), InternalError> {
        let result = self.try_entering_entity_identifier(entity);
        self.guard(result)
    }

    fn try_entering_entity_identifier(
        &mut self,
        entity: &EntityDescriptor,
    ) -> Result<(), InternalError> {
        let id = self.current_entity_reference(entity, "entering identifier of")?;
        let node = self.plan.node(id);
        let Some(reference) = node.as_entity_reference() else {
            return Err(InternalError::walk_protocol("identifier owner is not an entity reference"));
        };

        let collector = IdentifierCollector::new(
            id,
            Arc::clone(reference.entity()),
            node.path(),
            node.table_group(),
        );
        let path = collector.path().clone();
        self.stacks
            .push_owner(OwnerFrame::Identifier(collector), path.clone());
        self.trace_push(TraceFrame::Identifier, &path);

        Ok(())
    }

    pub fn exiting_entity_identifier(
        &mut self,
        entity: &EntityDescriptor,
    ) -> Result<(), InternalError> {
        let result = self.try_exiting_entity_identifier(entity);
        self.guard(result)
    }

    fn try_exiting_entity_identifier(
        &mut self,
        entity: &EntityDescriptor,
    ) -> Result<(), InternalError> {
        match self.stacks.top_owner() {
            Some(OwnerFrame::Identifier(collector))
                if self
                    .registry
                    .is_hierarchy_related(&collector.entity().name, &entity.name) => {}
            Some(OwnerFrame::Identifier(collector)) => {
                return Err(InternalError::walk_protocol(format!(
                    "exiting identifier of '{}' but the open collector belongs to '{}'",
                    entity.name,
                    collector.entity().name
                )));
            }
            Some(frame) => {
                return Err(InternalError::walk_protocol(format!(
                    "exiting identifier of '{}' but the current owner is a {}",
                    entity.name,
                    frame.label()
                )));
            }
            None => {
                return Err(InternalError::walk_protocol(format!(
                    "exiting identifier of '{}' with an empty fetch-owner stack",
                    entity.name
                )));
            }
        }

        let OwnerFrame::Identifier(collector) = self.pop_owner(TraceFrame::Identifier)? else {
            return Err(InternalError::walk_protocol("identifier collector frame vanished"));
        };

        let reference = collector.reference();
        if !matches!(self.stacks.top_owner(), Some(OwnerFrame::Node(id)) if *id == reference) {
            return Err(InternalError::walk_protocol(format!(
                "identifier collector for '{}' was not stacked on its entity reference",
                collector.entity().name
            )));
        }

        let entity_name = collector.entity().name.clone();
        let fetches = collector.fetches().len();
        let extractors = collector.extractor_count();
        let description = collector.into_description();

        self.plan
            .node_mut(reference)
            .as_entity_reference_mut()
            .ok_or_else(|| InternalError::walk_protocol("identifier owner is not an entity reference"))?
            .inject_identifier_description(description)?;

        obs::emit(self.trace, || PlanTraceEvent::IdentifierInjected {
            reference,
            entity: entity_name,
            fetches,
            extractors,
        });

        Ok(())
    }

    // ------------------------------------------------------------------
    // Collections
    // ------------------------------------------------------------------

    pub fn entering_collection(
        &mut self,
        collection: &CollectionDescriptor,
    ) -> Result<(), InternalError> {
        let result = self.try_entering_collection(collection);
        self.guard(result)
    }

    fn try_entering_collection(
        &mut self,
        collection: &CollectionDescriptor,
    ) -> Result<(), InternalError> {
        if !self.stacks.is_at_root() {
            // Nested collections were pushed by the attribute that reached them.
            return self.current_collection(collection, "entering").map(|_| ());
        }
        if !self.strategy.supports_root_collection_returns() {
            return Err(InternalError::unsupported(
                ErrorOrigin::Walk,
                format!(
                    "root collection returns are not supported ('{}')",
                    collection.role
                ),
            ));
        }

        let collection = Arc::clone(self.registry.collection(&collection.role)?);
        let path = PropertyPath::root(collection.role.clone());
        let table_group = self.plan.allocate_table_group();
        let id = self.plan.add_return(
            path,
            table_group,
            NodeKind::CollectionReturn(CollectionReference::new(collection)),
        );
        self.build_collection_graphs(id)?;
        self.push_collection(id);

        Ok(())
    }

    pub fn exiting_collection(
        &mut self,
        collection: &CollectionDescriptor,
    ) -> Result<(), InternalError> {
        let result = self
            .current_collection(collection, "exiting")
            .and_then(|_| self.stacks.pop_collection())
            .map(|(_, path)| self.trace_pop(TraceFrame::Collection, &path));
        self.guard(result)
    }

    pub fn entering_collection_index(
        &mut self,
        collection: &CollectionDescriptor,
    ) -> Result<(), InternalError> {
        let result = self.entering_graph(collection, GraphRole::Index);
        self.guard(result)
    }

    pub fn exiting_collection_index(
        &mut self,
        collection: &CollectionDescriptor,
    ) -> Result<(), InternalError> {
        let result = self.exiting_graph(collection, GraphRole::Index);
        self.guard(result)
    }

    pub fn entering_collection_elements(
        &mut self,
        collection: &CollectionDescriptor,
    ) -> Result<(), InternalError> {
        let result = self.entering_graph(collection, GraphRole::Element);
        self.guard(result)
    }

    pub fn exiting_collection_elements(
        &mut self,
        collection: &CollectionDescriptor,
    ) -> Result<(), InternalError> {
        let result = self.exiting_graph(collection, GraphRole::Element);
        self.guard(result)
    }

    fn current_collection(
        &self,
        collection: &CollectionDescriptor,
        action: &str,
    ) -> Result<NodeId, InternalError> {
        let Some(id) = self.stacks.top_collection() else {
            return Err(InternalError::walk_protocol(format!(
                "{action} collection '{}' with an empty collection-reference stack",
                collection.role
            )));
        };
        let open = self
            .plan
            .collection_reference(id)
            .map(|reference| reference.collection().role.as_str());
        if open != Some(collection.role.as_str()) {
            return Err(InternalError::walk_protocol(format!(
                "{action} collection '{}' but the open collection is '{}'",
                collection.role,
                open.unwrap_or("<none>")
            )));
        }

        Ok(id)
    }

    fn graph_of(&self, collection: NodeId, role: GraphRole) -> Option<NodeId> {
        let reference = self.plan.collection_reference(collection)?;
        match role {
            GraphRole::Element => reference.element_graph(),
            GraphRole::Index => reference.index_graph(),
        }
    }

    fn entering_graph(
        &mut self,
        collection: &CollectionDescriptor,
        role: GraphRole,
    ) -> Result<(), InternalError> {
        let id = self.current_collection(collection, "entering part of")?;
        if let Some(graph) = self.graph_of(id, role) {
            self.push_node(graph);
        }

        Ok(())
    }

    fn exiting_graph(
        &mut self,
        collection: &CollectionDescriptor,
        role: GraphRole,
    ) -> Result<(), InternalError> {
        let id = self.current_collection(collection, "exiting part of")?;
        let Some(graph) = self.graph_of(id, role) else {
            return Ok(());
        };
        let on_top = matches!(self.stacks.top_owner(), Some(OwnerFrame::Node(top)) if *top == graph);
        let composite = matches!(
            self.plan.node(graph).kind(),
            NodeKind::CompositeElementGraph { .. }
        );

        match (composite, on_top) {
            (true, true) => {
                self.pop_owner(TraceFrame::Owner)?;
                Ok(())
            }
            (true, false) => Err(InternalError::walk_protocol(format!(
                "composite graph of '{}' is not the current owner",
                collection.role
            ))),
            // Entity graphs are closed by `exiting_entity`.
            (false, true) => Err(InternalError::walk_protocol(format!(
                "entity graph of '{}' was never exited",
                collection.role
            ))),
            (false, false) => Ok(()),
        }
    }

    fn build_collection_graphs(&mut self, collection: NodeId) -> Result<(), InternalError> {
        let node = self.plan.node(collection);
        let Some(reference) = node.as_collection_reference() else {
            return Err(InternalError::walk_protocol("graph owner is not a collection reference"));
        };
        let descriptor = Arc::clone(reference.collection());
        let path = node.path().clone();
        let table_group = node.table_group();

        if let Some(index) = &descriptor.index
            && let Some(graph) =
                self.build_graph(collection, &path, table_group, GraphRole::Index, index)?
        {
            self.plan.set_collection_graph(collection, GraphRole::Index, graph);
        }
        if let Some(graph) = self.build_graph(
            collection,
            &path,
            table_group,
            GraphRole::Element,
            &descriptor.element,
        )? {
            self.plan
                .set_collection_graph(collection, GraphRole::Element, graph);
        }

        Ok(())
    }

    fn build_graph(
        &mut self,
        collection: NodeId,
        collection_path: &PropertyPath,
        table_group: TableGroupId,
        role: GraphRole,
        ty: &AttributeType,
    ) -> Result<Option<NodeId>, InternalError> {
        let path = collection_path.append(match role {
            GraphRole::Element => PropertyPath::ELEMENTS_SEGMENT,
            GraphRole::Index => PropertyPath::INDEX_SEGMENT,
        });

        let graph = match ty {
            AttributeType::Basic(_) => return Ok(None),
            AttributeType::Entity { target } => {
                let entity = Arc::clone(self.registry.entity(target)?);
                let table_group = self.plan.allocate_table_group();
                self.plan.add_graph(
                    path,
                    table_group,
                    NodeKind::EntityElementGraph {
                        collection,
                        role,
                        reference: EntityReference::new(entity, self.strategy.lock_mode()),
                    },
                )
            }
            AttributeType::Composite(composite) => self.plan.add_graph(
                path,
                table_group,
                NodeKind::CompositeElementGraph {
                    collection,
                    role,
                    composite: Arc::clone(composite),
                },
            ),
            AttributeType::Collection(nested) => {
                return Err(InternalError::unsupported(
                    ErrorOrigin::Walk,
                    format!("collection of collections ('{}')", nested.role),
                ));
            }
        };

        Ok(Some(graph))
    }

    // ------------------------------------------------------------------
    // Composites
    // ------------------------------------------------------------------

    pub fn entering_composite(
        &mut self,
        attribute: &AttributeDescriptor,
    ) -> Result<(), InternalError> {
        let result = self.try_entering_composite(attribute);
        self.guard(result)
    }

    fn try_entering_composite(
        &mut self,
        attribute: &AttributeDescriptor,
    ) -> Result<(), InternalError> {
        let AttributeType::Composite(composite) = &attribute.ty else {
            return Err(InternalError::walk_protocol(format!(
                "'{}' is not a composite ({})",
                attribute.name,
                attribute.ty.label()
            )));
        };
        if self.stacks.top_owner().is_none() {
            return Err(InternalError::walk_protocol(format!(
                "composite '{}' cannot be a root return",
                attribute.name
            )));
        }

        let parent = self.fetch_parent(attribute)?;
        let fetch = Fetch::Composite(CompositeFetch {
            info: FetchInfo {
                owner: parent.owner,
                attribute: attribute.clone(),
                strategy: attribute.fetch,
            },
            composite: Arc::clone(composite),
        });
        let table_group = parent.table_group;
        let id = self.attach_fetch(parent, table_group, fetch, None)?;
        self.trace_fetch(id, attribute.fetch);
        self.push_node(id);

        Ok(())
    }

    pub fn exiting_composite(
        &mut self,
        attribute: &AttributeDescriptor,
    ) -> Result<(), InternalError> {
        let result = self.try_exiting_composite(attribute);
        self.guard(result)
    }

    fn try_exiting_composite(&mut self, attribute: &AttributeDescriptor) -> Result<(), InternalError> {
        let open = match self.stacks.top_owner() {
            Some(OwnerFrame::Node(id)) => match self.plan.node(*id).as_fetch() {
                Some(Fetch::Composite(fetch)) => Some(fetch.info.attribute.name.as_str()),
                _ => None,
            },
            _ => None,
        };
        if open != Some(attribute.name.as_str()) {
            return Err(InternalError::walk_protocol(format!(
                "exiting composite '{}' but the current owner is not that composite",
                attribute.name
            )));
        }
        self.pop_owner(TraceFrame::Owner)?;

        Ok(())
    }

    // ------------------------------------------------------------------
    // Attributes
    // ------------------------------------------------------------------

    /// Classify one attribute and build its fetch if it is loaded in-plan.
    ///
    /// Returns `false` when the attribute is left out of the plan or only
    /// links back to a reference already in it; the caller must not descend
    /// into it then. Composite and immediate
    /// association fetches are pushed and stay open until their exit event.
    pub fn visiting_attribute(
        &mut self,
        attribute: &AttributeDescriptor,
    ) -> Result<bool, InternalError> {
        let result = match &attribute.ty {
            AttributeType::Basic(_) => Ok(true),
            AttributeType::Composite(_) => self.try_entering_composite(attribute).map(|()| true),
            AttributeType::Entity { .. } | AttributeType::Collection(_) => {
                self.visiting_association(attribute)
            }
        };
        self.guard(result)
    }

    fn visiting_association(&mut self, attribute: &AttributeDescriptor) -> Result<bool, InternalError> {
        let path = self.attribute_path(attribute);
        let context = FetchDecisionContext {
            depth: self.association_depth(),
            joined_collections: self.joined_collections,
            path: &path,
        };
        let strategy = self.strategy.decide_fetch_strategy(attribute, &context);
        if !strategy.is_immediate() {
            obs::emit(self.trace, || PlanTraceEvent::AttributeDeferred {
                path: path.full_path(),
                strategy,
            });
            return Ok(false);
        }

        let parent = self.fetch_parent(attribute)?;
        let info = FetchInfo {
            owner: parent.owner,
            attribute: attribute.clone(),
            strategy,
        };

        match &attribute.ty {
            AttributeType::Entity { target } => {
                let extractor = self.identifier_extractor(attribute)?;
                if let Some(linked) = self.key_many_to_one_target(target) {
                    let table_group = self.plan.node(linked).table_group();
                    let fetch = Fetch::BidirectionalEntity(BidirectionalEntityFetch {
                        info,
                        target: linked,
                    });
                    let id = self.attach_fetch(parent, table_group, fetch, extractor)?;
                    self.trace_fetch(id, strategy);

                    return Ok(false);
                }

                let entity = Arc::clone(self.registry.entity(target)?);
                let table_group = self.plan.allocate_table_group();
                let fetch = Fetch::Entity(EntityFetch {
                    info,
                    reference: EntityReference::new(entity, self.strategy.lock_mode()),
                });
                let id = self.attach_fetch(parent, table_group, fetch, extractor)?;
                self.trace_fetch(id, strategy);
                self.push_node(id);
            }
            AttributeType::Collection(collection) => {
                let table_group = self.plan.allocate_table_group();
                let fetch = Fetch::Collection(CollectionFetch {
                    info,
                    reference: CollectionReference::new(Arc::clone(collection)),
                });
                let id = self.attach_fetch(parent, table_group, fetch, None)?;
                self.build_collection_graphs(id)?;
                self.joined_collections += 1;
                self.trace_fetch(id, strategy);
                self.push_collection(id);
            }
            AttributeType::Basic(_) | AttributeType::Composite(_) => {
                return Err(InternalError::walk_protocol(format!(
                    "'{}' is not an association",
                    attribute.name
                )));
            }
        }

        Ok(true)
    }

    fn fetch_parent(&self, attribute: &AttributeDescriptor) -> Result<FetchParent, InternalError> {
        match self.stacks.top_owner() {
            Some(OwnerFrame::Node(id)) => {
                let node = self.plan.node(*id);
                if !node.is_fetch_owner() {
                    return Err(InternalError::walk_protocol(format!(
                        "{} at '{}' cannot own '{}'",
                        node.kind_label(),
                        node.path(),
                        attribute.name
                    )));
                }

                if let Some(collector) = self.enclosing_identifier() {
                    collector.validate_nested(attribute)?;
                }

                Ok(FetchParent {
                    attach: Attach::Node(*id),
                    owner: *id,
                    path: node.path().append(attribute.name.clone()),
                    table_group: node.table_group(),
                })
            }
            Some(OwnerFrame::Identifier(collector)) => {
                collector.validate_fetch(attribute)?;

                Ok(FetchParent {
                    attach: Attach::Identifier,
                    owner: collector.reference(),
                    path: collector.path().append(attribute.name.clone()),
                    table_group: collector.table_group(),
                })
            }
            None => Err(InternalError::walk_protocol(format!(
                "'{}' has no fetch owner",
                attribute.name
            ))),
        }
    }

    /// Collector whose identifier subtree the walk is in. Composite fetches
    /// are looked through; entity references end the search.
    fn enclosing_identifier(&self) -> Option<&IdentifierCollector> {
        for frame in self.stacks.owners().rev() {
            match frame {
                OwnerFrame::Identifier(collector) => return Some(collector),
                OwnerFrame::Node(id)
                    if matches!(self.plan.node(*id).as_fetch(), Some(Fetch::Composite(_))) => {}
                OwnerFrame::Node(_) => return None,
            }
        }

        None
    }

    /// Existing reference a key-many-to-one should link to: the entity
    /// owning the fetch (or collection) whose identifier is being collected,
    /// when `target` is in that entity's hierarchy.
    fn key_many_to_one_target(&self, target: &str) -> Option<NodeId> {
        let Some(OwnerFrame::Identifier(collector)) = self.stacks.top_owner() else {
            return None;
        };
        let above = match self.plan.node(collector.reference()).kind() {
            NodeKind::Fetch(fetch @ Fetch::Entity(_)) => fetch.owner(),
            NodeKind::EntityElementGraph { collection, .. } => self.plan.node(*collection).parent()?,
            _ => return None,
        };
        let owner = self.plan.owning_entity_reference(above)?;
        let entity = &self.plan.entity_reference(owner)?.entity().name;

        self.registry
            .is_hierarchy_related(entity, target)
            .then_some(owner)
    }

    fn identifier_extractor(
        &self,
        attribute: &AttributeDescriptor,
    ) -> Result<Option<HydratedValueExtractor>, InternalError> {
        match self.stacks.top_owner() {
            Some(OwnerFrame::Identifier(collector)) => collector.extractor_for(attribute).map(Some),
            _ => Ok(None),
        }
    }

    fn attach_fetch(
        &mut self,
        parent: FetchParent,
        table_group: TableGroupId,
        fetch: Fetch,
        extractor: Option<HydratedValueExtractor>,
    ) -> Result<NodeId, InternalError> {
        match parent.attach {
            Attach::Node(owner) => self.plan.add_fetch(owner, parent.path, table_group, fetch),
            Attach::Identifier => {
                let Some(OwnerFrame::Identifier(collector)) = self.stacks.top_owner_mut() else {
                    return Err(InternalError::walk_protocol("identifier collector is not open"));
                };
                let id = self.plan.add_detached_fetch(parent.path, table_group, fetch);
                collector.record(id, extractor)?;

                Ok(id)
            }
        }
    }

    fn attribute_path(&self, attribute: &AttributeDescriptor) -> PropertyPath {
        match self.stacks.top_owner() {
            Some(OwnerFrame::Node(id)) => self.plan.node(*id).path().append(attribute.name.clone()),
            Some(OwnerFrame::Identifier(collector)) => {
                collector.path().append(attribute.name.clone())
            }
            None => PropertyPath::root(attribute.name.clone()),
        }
    }

    /// Association levels below the root, counting the one being decided.
    fn association_depth(&self) -> usize {
        let entity_fetches = self
            .stacks
            .owners()
            .filter(|frame| {
                matches!(frame, OwnerFrame::Node(id)
                    if matches!(self.plan.node(*id).as_fetch(), Some(Fetch::Entity(_))))
            })
            .count();

        entity_fetches + self.stacks.collection_depth() + 1
    }

    // ------------------------------------------------------------------
    // Association keys
    // ------------------------------------------------------------------

    #[must_use]
    pub fn is_duplicate_association_key(&self, key: &AssociationKey) -> bool {
        self.association_keys.contains(key)
    }

    pub fn association_key_registered(&mut self, key: AssociationKey) {
        self.association_keys.insert(key);
    }

    /// Record that `attribute` was skipped because its key was seen already.
    pub fn found_circular_association(&self, attribute: &AttributeDescriptor) {
        obs::emit(self.trace, || PlanTraceEvent::CircularAssociationSkipped {
            path: self.attribute_path(attribute).full_path(),
        });
    }

    // ------------------------------------------------------------------
    // Stack plumbing
    // ------------------------------------------------------------------

    fn push_node(&mut self, id: NodeId) {
        let path = self.plan.node(id).path().clone();
        self.stacks.push_owner(OwnerFrame::Node(id), path.clone());
        self.trace_push(TraceFrame::Owner, &path);
    }

    fn push_collection(&mut self, id: NodeId) {
        let path = self.plan.node(id).path().clone();
        self.stacks.push_collection(id, path.clone());
        self.trace_push(TraceFrame::Collection, &path);
    }

    fn pop_owner(&mut self, frame: TraceFrame) -> Result<OwnerFrame, InternalError> {
        let (popped, path) = self.stacks.pop_owner()?;
        self.trace_pop(frame, &path);

        Ok(popped)
    }

    fn trace_push(&self, frame: TraceFrame, path: &PropertyPath) {
        obs::emit(self.trace, || PlanTraceEvent::FramePushed {
            frame,
            path: path.full_path(),
            depth: self.stacks.paths().depth(),
        });
    }

    fn trace_pop(&self, frame: TraceFrame, path: &PropertyPath) {
        obs::emit(self.trace, || PlanTraceEvent::FramePopped {
            frame,
            path: path.full_path(),
            depth: self.stacks.paths().depth(),
        });
    }

    fn trace_fetch(&self, id: NodeId, strategy: FetchStrategy) {
        obs::emit(self.trace, || {
            let node = self.plan.node(id);
            PlanTraceEvent::FetchBuilt {
                node: id,
                kind: node.kind_label(),
                path: node.path().full_path(),
                strategy,
            }
        });
    }

    /// Attach the walk path to a failure and poison the builder.
    fn guard<T>(&mut self, result: Result<T, InternalError>) -> Result<T, InternalError> {
        result.map_err(|err| {
            let err = err.with_path(self.stacks.paths().current_label());
            obs::emit(self.trace, || PlanTraceEvent::WalkFailed {
                class: err.class,
                origin: err.origin,
                path: err.path.clone(),
            });
            if self.failure.is_none() {
                self.failure = Some(err.clone());
            }

            err
        })
    }
}
