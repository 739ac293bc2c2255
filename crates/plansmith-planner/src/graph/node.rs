use std::hash::{Hash, Hasher};

/// Index of a node inside the graph that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// A scope variable in the dependency graph.
///
/// Identity is the variable name. `outputs` lists the nodes some agent
/// produces by consuming this one.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    name: String,
    outputs: Vec<NodeId>,
}

impl Node {
    pub fn new(id: NodeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            outputs: vec![],
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Record a directed edge to `other`. Duplicates are ignored.
    pub fn add_output(&mut self, other: NodeId) {
        if !self.outputs.contains(&other) {
            self.outputs.push(other);
        }
    }

    /// Outgoing edges, in insertion order.
    pub fn outputs(&self) -> &[NodeId] {
        &self.outputs
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}
