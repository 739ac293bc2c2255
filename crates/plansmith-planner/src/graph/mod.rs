//! Variable dependency graph for goal-oriented planning.
//!
//! Every scope variable is a `Node`. An agent reading `x` and writing `y`
//! contributes the edge `x -> y`, and the graph remembers which agent owns
//! each edge. `DependencyGraphSearch` finds the fewest-invocation derivation of a goal
//! node from the variables already present; `GoalOrientedSearchGraph` turns
//! the resulting node path back into an ordered list of agents.

pub mod goal_graph;
pub mod node;
pub mod search;

pub use goal_graph::{GoalOrientedSearchGraph, GraphEdge};
pub use node::{Node, NodeId};
pub use search::{DependencyGraphSearch, Producer};
