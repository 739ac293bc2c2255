use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use plansmith_core::error::{PlannerError, Result};
use plansmith_core::traits::AgentRef;

use super::node::{Node, NodeId};
use super::search::{DependencyGraphSearch, Producer};

/// An edge as seen from outside the graph: `from -> to`, owned by `agent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub agent: String,
}

/// Variable dependency graph built from a fixed set of agents.
///
/// For every agent and every argument `x` of it, the edge
/// `x -> output_key` is recorded. A pair of nodes maps to exactly one agent;
/// when two agents share a pair, the one registered last owns it. Agents
/// without arguments are recorded as sources of their output.
pub struct GoalOrientedSearchGraph {
    nodes: Vec<Node>,
    index: HashMap<String, NodeId>,
    edges: HashMap<(NodeId, NodeId), usize>,
    sources: HashMap<NodeId, usize>,
    agents: Vec<AgentRef>,
    producers: Vec<Producer>,
}

impl GoalOrientedSearchGraph {
    pub fn new(agents: &[AgentRef]) -> Self {
        let mut graph = Self {
            nodes: vec![],
            index: HashMap::new(),
            edges: HashMap::new(),
            sources: HashMap::new(),
            agents: agents.to_vec(),
            producers: vec![],
        };

        for (agent_index, agent) in agents.iter().enumerate() {
            let output = graph.node_id(agent.output_key());
            if agent.arguments().is_empty() {
                if let Some(previous) = graph.sources.insert(output, agent_index) {
                    warn!(
                        output = %agent.output_key(),
                        replaced = %graph.agents[previous].name(),
                        agent = %agent.name(),
                        "Source agent overwritten"
                    );
                }
                continue;
            }
            for argument in agent.arguments() {
                let input = graph.node_id(argument);
                graph.nodes[input.0].add_output(output);
                if let Some(previous) = graph.edges.insert((input, output), agent_index) {
                    if previous != agent_index {
                        warn!(
                            from = %argument,
                            to = %agent.output_key(),
                            replaced = %graph.agents[previous].name(),
                            agent = %agent.name(),
                            "Edge overwritten, last registered agent wins"
                        );
                    }
                }
            }
        }

        graph.producers = graph.collect_producers();
        debug!(
            agents = graph.agents.len(),
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "Dependency graph built"
        );
        graph
    }

    /// Resolve or create the node for `name`.
    fn node_id(&mut self, name: &str) -> NodeId {
        if let Some(id) = self.index.get(name) {
            return *id;
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(id, name));
        self.index.insert(name.to_string(), id);
        id
    }

    /// Agents that still own at least one edge (or source slot), in
    /// registration order.
    fn collect_producers(&self) -> Vec<Producer> {
        let mut producers = vec![];
        for (agent_index, agent) in self.agents.iter().enumerate() {
            let output = self.index[agent.output_key()];
            let mut inputs: Vec<NodeId> = vec![];
            for argument in agent.arguments() {
                let input = self.index[argument.as_str()];
                if !inputs.contains(&input) {
                    inputs.push(input);
                }
            }

            let owns_slot = if inputs.is_empty() {
                self.sources.get(&output) == Some(&agent_index)
            } else {
                inputs
                    .iter()
                    .any(|input| self.edges.get(&(*input, output)) == Some(&agent_index))
            };

            if owns_slot {
                producers.push(Producer {
                    agent: agent_index,
                    output,
                    inputs,
                });
            }
        }
        producers
    }

    /// Compute the ordered list of agents that produces `goal` from the
    /// variables named in `preconditions`.
    ///
    /// Unknown precondition names are ignored. An empty list means the goal
    /// is unreachable (or already satisfied); an empty goal name is an
    /// invalid argument.
    pub fn search<I, S>(&self, preconditions: I, goal: &str) -> Result<Vec<AgentRef>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if goal.trim().is_empty() {
            return Err(PlannerError::InvalidArgument("goal must not be empty".into()));
        }

        let Some(&goal_id) = self.index.get(goal) else {
            debug!(goal, "Goal is not produced by any agent");
            return Ok(vec![]);
        };

        let available: HashSet<NodeId> = preconditions
            .into_iter()
            .filter_map(|name| self.index.get(name.as_ref()).copied())
            .collect();

        let search = DependencyGraphSearch::new(self.nodes.len(), &self.producers);
        let Some(path) = search.search(available.iter().copied(), goal_id) else {
            debug!(goal, "No derivation from available preconditions");
            return Ok(vec![]);
        };

        self.agents_along(&path, &available, goal_id)
    }

    /// Translate a node path into the agents that produce each non-available node.
    fn agents_along(
        &self,
        path: &[NodeId],
        available: &HashSet<NodeId>,
        goal: NodeId,
    ) -> Result<Vec<AgentRef>> {
        if path.last() != Some(&goal) {
            return Err(PlannerError::GraphInconsistency(format!(
                "search path does not end at goal '{}'",
                self.nodes[goal.0].name()
            )));
        }

        let mut placed: HashSet<NodeId> = HashSet::new();
        let mut used: HashSet<usize> = HashSet::new();
        let mut plan: Vec<AgentRef> = vec![];
        let mut produced = 0usize;

        for (position, node) in path.iter().enumerate() {
            if available.contains(node) {
                placed.insert(*node);
                continue;
            }
            produced += 1;
            let agent_index = self.agent_for(&path[..position], *node, &placed)?;
            placed.insert(*node);
            if used.insert(agent_index) {
                plan.push(self.agents[agent_index].clone());
            }
        }

        if plan.len() != produced {
            return Err(PlannerError::GraphInconsistency(format!(
                "{} agents for {} produced nodes on the path to '{}'",
                plan.len(),
                produced,
                self.nodes[goal.0].name()
            )));
        }

        Ok(plan)
    }

    /// Find the agent producing `node`: try the edge from the immediately
    /// preceding node first, then every earlier node, accepting only agents
    /// whose inputs are all placed already.
    fn agent_for(&self, previous: &[NodeId], node: NodeId, placed: &HashSet<NodeId>) -> Result<usize> {
        for prev in previous.iter().rev() {
            if let Some(&agent_index) = self.edges.get(&(*prev, node)) {
                if self.inputs_placed(agent_index, placed) {
                    return Ok(agent_index);
                }
            }
        }

        if let Some(&agent_index) = self.sources.get(&node) {
            return Ok(agent_index);
        }

        Err(PlannerError::GraphInconsistency(format!(
            "no agent produces '{}' from the preceding path nodes",
            self.nodes[node.0].name()
        )))
    }

    fn inputs_placed(&self, agent_index: usize, placed: &HashSet<NodeId>) -> bool {
        self.agents[agent_index]
            .arguments()
            .iter()
            .all(|argument| {
                self.index
                    .get(argument.as_str())
                    .is_some_and(|id| placed.contains(id))
            })
    }

    /// All nodes, in creation order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.index.get(name).map(|id| &self.nodes[id.0])
    }

    /// Registered agents, in registration order.
    pub fn agents(&self) -> &[AgentRef] {
        &self.agents
    }

    /// Edges with their owning agent, sorted by (from, to).
    pub fn edges(&self) -> Vec<GraphEdge> {
        let mut edges: Vec<GraphEdge> = self
            .edges
            .iter()
            .map(|((from, to), agent_index)| GraphEdge {
                from: self.nodes[from.0].name().to_string(),
                to: self.nodes[to.0].name().to_string(),
                agent: self.agents[*agent_index].name().to_string(),
            })
            .collect();
        edges.sort_by(|a, b| (&a.from, &a.to).cmp(&(&b.from, &b.to)));
        edges
    }

    /// Agents the search may use to produce `name`, in registration order.
    pub fn producers_of(&self, name: &str) -> Vec<AgentRef> {
        let Some(id) = self.index.get(name) else {
            return vec![];
        };
        self.producers
            .iter()
            .filter(|producer| producer.output == *id)
            .map(|producer| self.agents[producer.agent].clone())
            .collect()
    }
}
