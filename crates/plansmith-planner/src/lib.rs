pub mod declarative;
pub mod executor;
pub mod graph;
pub mod journal;
pub mod planner;

pub use declarative::{build_agents, ConfiguredAgent};
pub use executor::{ExecutionResult, InvocationRecord, PlanExecutor};
pub use graph::{DependencyGraphSearch, GoalOrientedSearchGraph, GraphEdge, Node, NodeId};
pub use journal::{JournalEntry, RunJournal};
pub use planner::{
    build_planner, planner_agent, Action, GoalOrientedPlanner, InitPlanningContext, P2PPlanner,
    Planner, ReplayingPlanner, SequentialPlanner, Topology,
};
