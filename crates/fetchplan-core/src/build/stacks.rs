use crate::{
    build::collector::IdentifierCollector, error::InternalError, path::PropertyPath, plan::NodeId,
};

///
/// OwnerFrame
///
/// One entry of the fetch-owner stack: either a real plan node or the
/// transient collector standing in for an entity while its identifier
/// subtree is walked.
///

#[derive(Debug)]
pub(crate) enum OwnerFrame {
    Node(NodeId),
    Identifier(IdentifierCollector),
}

impl OwnerFrame {
    pub(crate) const fn label(&self) -> &'static str {
        match self {
            Self::Node(_) => "plan node",
            Self::Identifier(_) => "identifier collector",
        }
    }
}

///
/// PathStack
/// Diagnostic mirror of both structural stacks.
///

#[derive(Debug, Default)]
pub(crate) struct PathStack {
    paths: Vec<PropertyPath>,
}

impl PathStack {
    const NO_PATH: &'static str = "<no-path>";

    fn push(&mut self, path: PropertyPath) {
        self.paths.push(path);
    }

    fn pop(&mut self) -> Option<PropertyPath> {
        self.paths.pop()
    }

    pub(crate) fn current(&self) -> Option<&PropertyPath> {
        self.paths.last()
    }

    pub(crate) fn current_label(&self) -> String {
        self.current()
            .map_or_else(|| Self::NO_PATH.to_string(), PropertyPath::full_path)
    }

    pub(crate) const fn depth(&self) -> usize {
        self.paths.len()
    }

    fn clear(&mut self) {
        self.paths.clear();
    }
}

///
/// WalkStacks
///
/// Fetch-owner stack, collection-reference stack, and the path stack. Every
/// push and pop goes through here so the path depth always equals the sum
/// of the two structural depths.
///

#[derive(Debug, Default)]
pub(crate) struct WalkStacks {
    owners: Vec<OwnerFrame>,
    collections: Vec<NodeId>,
    paths: PathStack,
}

impl WalkStacks {
    pub(crate) fn push_owner(&mut self, frame: OwnerFrame, path: PropertyPath) {
        self.owners.push(frame);
        self.paths.push(path);
    }

    pub(crate) fn pop_owner(&mut self) -> Result<(OwnerFrame, PropertyPath), InternalError> {
        let frame = self
            .owners
            .pop()
            .ok_or_else(|| InternalError::walk_protocol("fetch-owner stack is empty"))?;
        let path = self.pop_path()?;

        Ok((frame, path))
    }

    pub(crate) fn top_owner(&self) -> Option<&OwnerFrame> {
        self.owners.last()
    }

    pub(crate) fn top_owner_mut(&mut self) -> Option<&mut OwnerFrame> {
        self.owners.last_mut()
    }

    pub(crate) fn owners(&self) -> impl DoubleEndedIterator<Item = &OwnerFrame> {
        self.owners.iter()
    }

    pub(crate) fn push_collection(&mut self, collection: NodeId, path: PropertyPath) {
        self.collections.push(collection);
        self.paths.push(path);
    }

    pub(crate) fn pop_collection(&mut self) -> Result<(NodeId, PropertyPath), InternalError> {
        let collection = self
            .collections
            .pop()
            .ok_or_else(|| InternalError::walk_protocol("collection-reference stack is empty"))?;
        let path = self.pop_path()?;

        Ok((collection, path))
    }

    pub(crate) fn top_collection(&self) -> Option<NodeId> {
        self.collections.last().copied()
    }

    fn pop_path(&mut self) -> Result<PropertyPath, InternalError> {
        self.paths
            .pop()
            .ok_or_else(|| InternalError::walk_protocol("path stack underflow"))
    }

    pub(crate) const fn paths(&self) -> &PathStack {
        &self.paths
    }

    pub(crate) const fn owner_depth(&self) -> usize {
        self.owners.len()
    }

    pub(crate) const fn collection_depth(&self) -> usize {
        self.collections.len()
    }

    /// True when no structural frame is open (the walk is at the root).
    pub(crate) const fn is_at_root(&self) -> bool {
        self.owners.is_empty() && self.collections.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.owners.clear();
        self.collections.clear();
        self.paths.clear();
    }
}
