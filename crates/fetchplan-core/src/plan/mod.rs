//! Load-plan node model.
//!
//! A `LoadPlan` is an arena of `PlanNode`s. Parent to child edges are the
//! ordered `fetches` lists on fetch owners; the only back-edge is the logical
//! owner recorded on each fetch. Nodes are appended by the builder and never
//! removed or reordered.

mod identifier;
mod node;

#[cfg(test)]
mod tests;

pub use identifier::{HydratedValueExtractor, IdentifierDescription};
pub use node::{
    BidirectionalEntityFetch, CollectionFetch, CollectionReference, CompositeFetch, EntityFetch,
    EntityReference, Fetch, FetchInfo, GraphRole, NodeKind, PlanNode,
};

use crate::{error::InternalError, path::PropertyPath};
use derive_more::Display;
use serde::Serialize;

///
/// NodeId
/// Index of one node inside its owning `LoadPlan`.
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[display("n{_0}")]
pub struct NodeId(u32);

impl NodeId {
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

///
/// TableGroupId
///
/// Correlates a plan node with its physical row source. Every entity
/// reference and collection reference gets a fresh group; composite fetches
/// share their owner's group.
///

#[derive(Clone, Copy, Debug, Default, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[display("t{_0}")]
pub struct TableGroupId(u32);

impl TableGroupId {
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

/// Result-set alias of `column` within `table_group`.
#[must_use]
pub fn suffixed_alias(column: &str, table_group: TableGroupId) -> String {
    format!("{column}_{}", table_group.get())
}

///
/// LoadPlanDisposition
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadPlanDisposition {
    /// Exactly one entity return.
    EntityLoader,
    /// Exactly one collection return.
    CollectionInitializer,
    Mixed,
}

///
/// LoadPlan
///

#[derive(Clone, Debug, Default)]
pub struct LoadPlan {
    nodes: Vec<PlanNode>,
    returns: Vec<NodeId>,
    table_groups: u32,
}

impl LoadPlan {
    /// Root returns in creation order.
    #[must_use]
    pub fn returns(&self) -> &[NodeId] {
        &self.returns
    }

    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&PlanNode> {
        self.nodes.get(id.index())
    }

    /// Node lookup for ids minted by this plan.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &PlanNode {
        &self.nodes[id.index()]
    }

    pub fn nodes(&self) -> impl Iterator<Item = &PlanNode> {
        self.nodes.iter()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Child fetches of `owner`; `None` for ids this plan never minted.
    #[must_use]
    pub fn fetches(&self, owner: NodeId) -> Option<&[NodeId]> {
        self.get(owner).map(PlanNode::fetches)
    }

    #[must_use]
    pub fn entity_reference(&self, id: NodeId) -> Option<&EntityReference> {
        self.get(id).and_then(PlanNode::as_entity_reference)
    }

    #[must_use]
    pub fn collection_reference(&self, id: NodeId) -> Option<&CollectionReference> {
        self.get(id).and_then(PlanNode::as_collection_reference)
    }

    #[must_use]
    pub fn identifier_description(&self, id: NodeId) -> Option<&IdentifierDescription> {
        self.entity_reference(id)
            .and_then(EntityReference::identifier_description)
    }

    /// Find the node at `path`, if the walk produced one.
    #[must_use]
    pub fn find(&self, path: &PropertyPath) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|node| node.path() == path)
            .map(PlanNode::id)
    }

    /// Nearest entity reference at or above `id`, following composite
    /// owners upward.
    #[must_use]
    pub fn owning_entity_reference(&self, id: NodeId) -> Option<NodeId> {
        let mut current = Some(id);
        while let Some(candidate) = current {
            let node = self.get(candidate)?;
            if node.as_entity_reference().is_some() {
                return Some(candidate);
            }
            current = node.parent();
        }

        None
    }

    #[must_use]
    pub fn disposition(&self) -> LoadPlanDisposition {
        match self.returns.as_slice() {
            [single] => match self.node(*single).kind() {
                NodeKind::EntityReturn(_) => LoadPlanDisposition::EntityLoader,
                NodeKind::CollectionReturn(_) => LoadPlanDisposition::CollectionInitializer,
                _ => LoadPlanDisposition::Mixed,
            },
            _ => LoadPlanDisposition::Mixed,
        }
    }

    // ------------------------------------------------------------------
    // Construction (builder only)
    // ------------------------------------------------------------------

    pub(crate) fn allocate_table_group(&mut self) -> TableGroupId {
        let group = TableGroupId(self.table_groups);
        self.table_groups += 1;

        group
    }

    fn push_node(&mut self, path: PropertyPath, table_group: TableGroupId, kind: NodeKind) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(PlanNode {
            id,
            path,
            table_group,
            fetches: Vec::new(),
            kind,
        });

        id
    }

    pub(crate) fn add_return(
        &mut self,
        path: PropertyPath,
        table_group: TableGroupId,
        kind: NodeKind,
    ) -> NodeId {
        let id = self.push_node(path, table_group, kind);
        self.returns.push(id);

        id
    }

    /// Add a fetch and append it to `parent`'s children.
    pub(crate) fn add_fetch(
        &mut self,
        parent: NodeId,
        path: PropertyPath,
        table_group: TableGroupId,
        fetch: Fetch,
    ) -> Result<NodeId, InternalError> {
        if !self.node(parent).is_fetch_owner() {
            return Err(InternalError::walk_protocol(format!(
                "{} at '{}' cannot own fetches",
                self.node(parent).kind_label(),
                self.node(parent).path()
            )));
        }
        let id = self.push_node(path, table_group, NodeKind::Fetch(fetch));
        self.nodes[parent.index()].fetches.push(id);

        Ok(id)
    }

    /// Add a fetch whose logical owner does not list it as a child.
    /// Identifier sub-fetches live here; they are reachable only through the
    /// owner's identifier description.
    pub(crate) fn add_detached_fetch(
        &mut self,
        path: PropertyPath,
        table_group: TableGroupId,
        fetch: Fetch,
    ) -> NodeId {
        self.push_node(path, table_group, NodeKind::Fetch(fetch))
    }

    pub(crate) fn add_graph(
        &mut self,
        path: PropertyPath,
        table_group: TableGroupId,
        kind: NodeKind,
    ) -> NodeId {
        self.push_node(path, table_group, kind)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut PlanNode {
        &mut self.nodes[id.index()]
    }

    pub(crate) fn set_collection_graph(&mut self, collection: NodeId, role: GraphRole, graph: NodeId) {
        let node = self.node_mut(collection);
        let reference = match &mut node.kind {
            NodeKind::CollectionReturn(reference)
            | NodeKind::Fetch(Fetch::Collection(CollectionFetch { reference, .. })) => reference,
            _ => return,
        };
        match role {
            GraphRole::Element => reference.element_graph = Some(graph),
            GraphRole::Index => reference.index_graph = Some(graph),
        }
    }
}
