//! Deterministic, read-only explanation of load plans; must not walk or
//! resolve anything.

mod fingerprint;


pub use fingerprint::LoadPlanFingerprint;

use crate::{
    model::{FetchStrategy, LockMode},
    path::PropertyPath,
    plan::{
        Fetch, HydratedValueExtractor, LoadPlan, LoadPlanDisposition, NodeId, NodeKind, PlanNode,
        TableGroupId,
    },
};
use serde::Serialize;
use std::fmt::Write as _;

///
/// ExplainLoadPlan
///
/// Stable tree projection of a `LoadPlan` for observability and tests.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ExplainLoadPlan {
    pub disposition: LoadPlanDisposition,
    pub returns: Vec<ExplainNode>,
}

///
/// ExplainNode
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ExplainNode {
    pub id: NodeId,
    pub kind: &'static str,
    pub path: PropertyPath,
    pub table_group: TableGroupId,
    /// Entity name, collection role, or composite type name.
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<FetchStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_mode: Option<LockMode>,
    /// Existing reference a bidirectional fetch stands for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links_to: Option<NodeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<ExplainIdentifier>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fetches: Vec<Self>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_graph: Option<Box<Self>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_graph: Option<Box<Self>>,
}

///
/// ExplainIdentifier
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ExplainIdentifier {
    pub fetches: Vec<ExplainNode>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extractors: Vec<ExplainExtractor>,
}

///
/// ExplainExtractor
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ExplainExtractor {
    Whole { fetch: NodeId },
    Component { fetch: NodeId, index: usize, property: String },
}

impl LoadPlan {
    /// Produce a stable, deterministic explanation of this load plan.
    #[must_use]
    pub fn explain(&self) -> ExplainLoadPlan {
        ExplainLoadPlan {
            disposition: self.disposition(),
            returns: self
                .returns()
                .iter()
                .map(|id| explain_node(self, self.node(*id)))
                .collect(),
        }
    }

    /// Indented text rendering of `explain()`.
    #[must_use]
    pub fn render_text(&self) -> String {
        self.explain().render_text()
    }

    #[must_use]
    pub fn fingerprint(&self) -> LoadPlanFingerprint {
        self.explain().fingerprint()
    }
}

fn explain_node(plan: &LoadPlan, node: &PlanNode) -> ExplainNode {
    let (target, strategy) = match node.kind() {
        NodeKind::EntityReturn(reference) | NodeKind::EntityElementGraph { reference, .. } => {
            (reference.entity().name.clone(), None)
        }
        NodeKind::CollectionReturn(reference) => (reference.collection().role.clone(), None),
        NodeKind::CompositeElementGraph { composite, .. } => (composite.name.clone(), None),
        NodeKind::Fetch(fetch) => (
            fetch.info().fetched_type().label(),
            Some(fetch.info().strategy),
        ),
    };

    let entity = node.as_entity_reference();
    let collection = node.as_collection_reference();

    ExplainNode {
        id: node.id(),
        kind: node.kind_label(),
        path: node.path().clone(),
        table_group: node.table_group(),
        target,
        strategy,
        lock_mode: entity.map(|reference| reference.lock_mode()),
        links_to: match node.as_fetch() {
            Some(Fetch::BidirectionalEntity(link)) => Some(link.target),
            _ => None,
        },
        identifier: entity
            .and_then(|reference| reference.identifier_description())
            .map(|description| ExplainIdentifier {
                fetches: description
                    .fetches()
                    .iter()
                    .map(|id| explain_node(plan, plan.node(*id)))
                    .collect(),
                extractors: description
                    .fetches()
                    .iter()
                    .filter_map(|id| {
                        description
                            .extractor_for(*id)
                            .map(|extractor| explain_extractor(*id, extractor))
                    })
                    .collect(),
            }),
        fetches: node
            .fetches()
            .iter()
            .map(|id| explain_node(plan, plan.node(*id)))
            .collect(),
        index_graph: collection
            .and_then(|reference| reference.index_graph())
            .map(|id| Box::new(explain_node(plan, plan.node(id)))),
        element_graph: collection
            .and_then(|reference| reference.element_graph())
            .map(|id| Box::new(explain_node(plan, plan.node(id)))),
    }
}

fn explain_extractor(fetch: NodeId, extractor: &HydratedValueExtractor) -> ExplainExtractor {
    match extractor {
        HydratedValueExtractor::Whole => ExplainExtractor::Whole { fetch },
        HydratedValueExtractor::Component { index, property } => ExplainExtractor::Component {
            fetch,
            index: *index,
            property: property.clone(),
        },
    }
}

impl ExplainLoadPlan {
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "disposition {:?}", self.disposition);
        for node in &self.returns {
            node.render_into(&mut out, 1);
        }

        out
    }
}

impl ExplainNode {
    fn render_into(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        let _ = write!(
            out,
            "{indent}{} {} -> {} [{}]",
            self.kind, self.path, self.target, self.table_group
        );
        if let Some(strategy) = self.strategy {
            let _ = write!(out, " {strategy}");
        }
        if let Some(target) = self.links_to {
            let _ = write!(out, " links {target}");
        }
        out.push('\n');

        if let Some(identifier) = &self.identifier
            && !identifier.fetches.is_empty()
        {
            let _ = writeln!(
                out,
                "{indent}  identifier ({} fetches, {} extractors)",
                identifier.fetches.len(),
                identifier.extractors.len()
            );
            for fetch in &identifier.fetches {
                fetch.render_into(out, depth + 2);
            }
        }
        if let Some(graph) = &self.index_graph {
            graph.render_into(out, depth + 1);
        }
        if let Some(graph) = &self.element_graph {
            graph.render_into(out, depth + 1);
        }
        for fetch in &self.fetches {
            fetch.render_into(out, depth + 1);
        }
    }
}
