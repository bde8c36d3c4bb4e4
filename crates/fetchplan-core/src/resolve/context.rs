use crate::{
    error::{ErrorOrigin, InternalError},
    model::{AttributeDescriptor, AttributeType, EntityDescriptor},
    obs::{self, PlanTraceEvent, PlanTraceSink},
    plan::{EntityReference, Fetch, IdentifierDescription, LoadPlan, NodeId, TableGroupId, suffixed_alias},
    resolve::{
        row::RowSource,
        state::{EntityKey, HydrationSource, ReferenceProcessingState, ResolutionPhase},
    },
    value::Value,
};
use std::{collections::BTreeMap, sync::Arc};

///
/// RowProcessingContext
///
/// Per-row resolution state for every entity reference of one plan.
/// Hydration reads identifier columns at most once and prefers values
/// already decoded from an owner's identifier; resolution turns hydrated
/// forms into cached `EntityKey`s.
///

pub struct RowProcessingContext<'p> {
    plan: &'p LoadPlan,
    states: BTreeMap<NodeId, ReferenceProcessingState>,
    trace: Option<&'p dyn PlanTraceSink>,
}

impl<'p> RowProcessingContext<'p> {
    #[must_use]
    pub const fn new(plan: &'p LoadPlan) -> Self {
        Self {
            plan,
            states: BTreeMap::new(),
            trace: None,
        }
    }

    #[must_use]
    pub const fn with_trace(mut self, sink: &'p dyn PlanTraceSink) -> Self {
        self.trace = Some(sink);
        self
    }

    #[must_use]
    pub const fn plan(&self) -> &'p LoadPlan {
        self.plan
    }

    #[must_use]
    pub fn processing_state(&self, reference: NodeId) -> Option<&ReferenceProcessingState> {
        self.states.get(&reference)
    }

    #[must_use]
    pub fn phase(&self, reference: NodeId) -> ResolutionPhase {
        self.states
            .get(&reference)
            .map_or(ResolutionPhase::Unvisited, ReferenceProcessingState::phase)
    }

    /// Drop all per-row state before the cursor advances.
    pub fn finish_up_row(&mut self) {
        self.states.clear();
    }

    /// Record an identifier form decoded elsewhere for `reference`.
    /// Hydration then reads no identifier columns for it.
    pub fn register_hydrated_form(
        &mut self,
        reference: NodeId,
        form: Value,
    ) -> Result<(), InternalError> {
        let entity = self.reference(reference)?.entity();
        let state = self.states.entry(reference).or_default();
        if state.hydrated_form.is_some() {
            return Err(InternalError::double_injection(
                ErrorOrigin::Resolve,
                format!("identifier of '{}' at {reference} is already hydrated", entity.name),
            ));
        }
        state.hydrated_form = Some(form);
        state.hydrated_via = Some(HydrationSource::Registered);

        Ok(())
    }

    // ------------------------------------------------------------------
    // Hydrate
    // ------------------------------------------------------------------

    /// Produce the raw identifier form of `reference` and of every entity
    /// fetch composing it.
    pub fn hydrate(&mut self, reference: NodeId, row: &mut dyn RowSource) -> Result<(), InternalError> {
        let entity_reference = self.reference(reference)?;
        match self.phase(reference) {
            ResolutionPhase::Unvisited => {}
            ResolutionPhase::Hydrating => {
                return Err(self.cycle_error(reference, entity_reference));
            }
            ResolutionPhase::Hydrated | ResolutionPhase::Resolving | ResolutionPhase::Resolved => {
                return Ok(());
            }
        }
        self.state_mut(reference).phase = ResolutionPhase::Hydrating;

        if self.hydrated_form(reference).is_none() {
            let table_group = self.plan.node(reference).table_group();
            let form = read_identifier(entity_reference.entity(), table_group, row)?;
            let state = self.state_mut(reference);
            state.hydrated_form = Some(form);
            state.hydrated_via = Some(HydrationSource::Row);
        }

        if let Some(description) = entity_reference.identifier_description() {
            for &fetch in description.fetches() {
                match self.linked_target(fetch)? {
                    Some(target) => self.hydrate(target, row)?,
                    None => self.hydrate_identifier_fetch(reference, description, fetch, row)?,
                }
            }
        }

        let state = self.state_mut(reference);
        state.phase = ResolutionPhase::Hydrated;
        let source = state.hydrated_via.unwrap_or(HydrationSource::Row);
        obs::emit(self.trace, || PlanTraceEvent::IdentifierHydrated { reference, source });

        Ok(())
    }

    fn hydrate_identifier_fetch(
        &mut self,
        owner: NodeId,
        description: &IdentifierDescription,
        fetch: NodeId,
        row: &mut dyn RowSource,
    ) -> Result<(), InternalError> {
        // Reuse a form produced earlier in this row, else extract it from
        // the owner's tuple; hydrating the fetch reads the row only if
        // neither applies.
        if self.hydrated_form(fetch).is_none()
            && let Some(extractor) = description.extractor_for(fetch)
            && let Some(owner_form) = self.hydrated_form(owner)
        {
            let value = extractor.extract(owner_form)?;
            let state = self.state_mut(fetch);
            state.hydrated_form = Some(value);
            state.hydrated_via = Some(HydrationSource::Extracted);
        }

        self.hydrate(fetch, row)
    }

    // ------------------------------------------------------------------
    // Resolve
    // ------------------------------------------------------------------

    /// Resolve `reference` to its entity key, hydrating first if needed.
    ///
    /// Returns `None` for a fetched reference whose identifier is entirely
    /// null (no associated row). Repeated calls within one row return the
    /// cached key.
    pub fn resolve(
        &mut self,
        reference: NodeId,
        row: &mut dyn RowSource,
    ) -> Result<Option<Arc<EntityKey>>, InternalError> {
        let entity_reference = self.reference(reference)?;
        match self.phase(reference) {
            ResolutionPhase::Resolved => {
                return Ok(self
                    .states
                    .get(&reference)
                    .and_then(|state| state.entity_key.clone()));
            }
            ResolutionPhase::Resolving => {
                return Err(self.cycle_error(reference, entity_reference));
            }
            ResolutionPhase::Unvisited | ResolutionPhase::Hydrating => {
                self.hydrate(reference, row)?;
            }
            ResolutionPhase::Hydrated => {}
        }
        self.state_mut(reference).phase = ResolutionPhase::Resolving;

        if let Some(description) = entity_reference.identifier_description() {
            for &fetch in description.fetches() {
                let target = self.linked_target(fetch)?.unwrap_or(fetch);
                self.resolve(target, row)?;
            }
        }

        let entity = entity_reference.entity();
        let form = self.hydrated_form(reference).cloned().ok_or_else(|| {
            InternalError::resolve_protocol(format!(
                "identifier of '{}' at {reference} was never hydrated",
                entity.name
            ))
        })?;

        let key = if form.is_null() {
            if self.plan.node(reference).is_return() {
                return Err(InternalError::invalid_row(format!(
                    "root return '{}' has a null identifier",
                    entity.name
                )));
            }
            None
        } else {
            let identifier = normalize_identifier(entity, form)?;
            Some(Arc::new(EntityKey::new(entity.name.clone(), identifier)))
        };

        let state = self.state_mut(reference);
        state.missing_identifier = key.is_none();
        state.entity_key.clone_from(&key);
        state.phase = ResolutionPhase::Resolved;
        obs::emit(self.trace, || PlanTraceEvent::IdentifierResolved {
            reference,
            missing: key.is_none(),
        });

        Ok(key)
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn reference(&self, id: NodeId) -> Result<&'p EntityReference, InternalError> {
        let plan = self.plan;
        plan.entity_reference(id).ok_or_else(|| {
            InternalError::resolve_protocol(format!("{id} is not an entity reference"))
        })
    }

    /// Reference a bidirectional identifier fetch links to; `None` for a
    /// plain entity fetch.
    fn linked_target(&self, fetch: NodeId) -> Result<Option<NodeId>, InternalError> {
        self.check_identifier_fetch(fetch)?;
        match self.plan.node(fetch).as_fetch() {
            Some(Fetch::BidirectionalEntity(link)) => Ok(Some(link.target)),
            _ => Ok(None),
        }
    }

    /// Only entity fetches and links to existing entity references may
    /// compose an identifier here.
    fn check_identifier_fetch(&self, fetch: NodeId) -> Result<(), InternalError> {
        let node = self.plan.node(fetch);
        match node.as_fetch() {
            Some(Fetch::Entity(_) | Fetch::BidirectionalEntity(_)) => Ok(()),
            Some(Fetch::Composite(_)) => Err(InternalError::unsupported(
                ErrorOrigin::Resolve,
                format!(
                    "composite fetch '{}' inside an identifier is not supported",
                    node.path()
                ),
            )),
            _ => Err(InternalError::resolve_protocol(format!(
                "{} at '{}' cannot compose an identifier",
                node.kind_label(),
                node.path()
            ))),
        }
    }

    fn hydrated_form(&self, id: NodeId) -> Option<&Value> {
        self.states
            .get(&id)
            .and_then(|state| state.hydrated_form.as_ref())
    }

    fn state_mut(&mut self, id: NodeId) -> &mut ReferenceProcessingState {
        self.states.entry(id).or_default()
    }

    fn cycle_error(&self, id: NodeId, reference: &EntityReference) -> InternalError {
        InternalError::resolve_protocol(format!(
            "identifier of '{}' at '{}' depends on itself",
            reference.entity().name,
            self.plan.node(id).path()
        ))
    }
}

fn read_identifier(
    entity: &EntityDescriptor,
    table_group: TableGroupId,
    row: &mut dyn RowSource,
) -> Result<Value, InternalError> {
    read_attribute(&entity.identifier.attribute, table_group, row)
}

/// Composite values read as a tuple in property order; attributes mapped
/// to several columns read as a tuple in column order.
fn read_attribute(
    attribute: &AttributeDescriptor,
    table_group: TableGroupId,
    row: &mut dyn RowSource,
) -> Result<Value, InternalError> {
    match &attribute.ty {
        AttributeType::Composite(composite) => composite
            .properties
            .iter()
            .map(|property| read_attribute(property, table_group, row))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Tuple),
        AttributeType::Collection(collection) => Err(InternalError::unsupported(
            ErrorOrigin::Resolve,
            format!("collection '{}' cannot be read as an identifier", collection.role),
        )),
        AttributeType::Basic(_) | AttributeType::Entity { .. } => match attribute.columns.as_slice() {
            [] => Err(InternalError::metadata_lookup(format!(
                "'{}' maps no columns",
                attribute.name
            ))),
            [column] => row.read(&suffixed_alias(column, table_group)),
            columns => columns
                .iter()
                .map(|column| row.read(&suffixed_alias(column, table_group)))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Tuple),
        },
    }
}

fn normalize_identifier(entity: &EntityDescriptor, form: Value) -> Result<Value, InternalError> {
    let Some(composite) = entity.identifier.composite() else {
        return Ok(form);
    };

    match form.as_tuple() {
        Some(items) if items.len() == composite.properties.len() => Ok(form),
        _ => Err(InternalError::invalid_row(format!(
            "identifier {form} of '{}' does not match composite '{}' ({} properties)",
            entity.name,
            composite.name,
            composite.properties.len()
        ))),
    }
}
