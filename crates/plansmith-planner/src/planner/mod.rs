//! Planners decide which agents run next; they never invoke agents.
//!
//! A planner is stepped by the executor: `init` once, then `first_action`,
//! then `next_action` after every completed invocation until it answers
//! `Action::Done`.

pub mod goal_oriented;
pub mod p2p;
pub mod replay;
pub mod sequence;

use std::fmt;

use serde::Serialize;

use plansmith_core::config::{PlannerKind, PlansmithConfig};
use plansmith_core::error::Result;
use plansmith_core::scope::AgenticScope;
use plansmith_core::traits::AgentRef;
use plansmith_core::types::{AgentInvocation, PlannerAgent};

pub use goal_oriented::GoalOrientedPlanner;
pub use p2p::{never_complete, score_at_least, CompletionPredicate, P2PPlanner};
pub use replay::ReplayingPlanner;
pub use sequence::SequentialPlanner;

/// What the planner wants done next.
#[derive(Clone)]
pub enum Action {
    /// Invoke these agents. More than one agent means they may run concurrently.
    Call(Vec<AgentRef>),
    /// Nothing left to do.
    Done,
}

impl Action {
    pub fn call(agent: AgentRef) -> Self {
        Action::Call(vec![agent])
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Action::Done)
    }

    /// Agents to invoke; empty for `Done`.
    pub fn agents(&self) -> &[AgentRef] {
        match self {
            Action::Call(agents) => agents,
            Action::Done => &[],
        }
    }

    /// Merge two follow-up actions. A pending call absorbs `Done`; two calls
    /// are concatenated.
    pub fn compose(self, other: Action) -> Action {
        match (self, other) {
            (Action::Done, other) => other,
            (this, Action::Done) => this,
            (Action::Call(mut first), Action::Call(second)) => {
                first.extend(second);
                Action::Call(first)
            }
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Call(agents) => f
                .debug_tuple("Call")
                .field(&agents.iter().map(|a| a.name()).collect::<Vec<_>>())
                .finish(),
            Action::Done => write!(f, "Done"),
        }
    }
}

/// Shape of the agentic system a planner drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    Sequence,
    Parallel,
    Loop,
    GoalOriented,
    PeerToPeer,
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Topology::Sequence => "sequence",
            Topology::Parallel => "parallel",
            Topology::Loop => "loop",
            Topology::GoalOriented => "goal_oriented",
            Topology::PeerToPeer => "p2p",
        };
        f.write_str(name)
    }
}

/// Everything a planner sees once, before stepping starts.
#[derive(Clone, Copy)]
pub struct InitPlanningContext<'a> {
    pub scope: &'a AgenticScope,
    pub planner_agent: &'a PlannerAgent,
    pub subagents: &'a [AgentRef],
}

/// The stepping contract shared by every planner.
pub trait Planner: Send {
    fn init(&mut self, ctx: InitPlanningContext<'_>) -> Result<()>;

    /// First action of a run. Takes the scope mutably so a planner may seed
    /// state (replay does).
    fn first_action(&mut self, scope: &mut AgenticScope) -> Result<Action>;

    /// Action following the completed invocation `last`.
    fn next_action(&mut self, scope: &AgenticScope, last: &AgentInvocation) -> Result<Action>;

    fn topology(&self) -> Topology;

    /// Whether this planner has answered `Done`.
    fn terminated(&self) -> bool;
}

/// Build the planner selected in configuration.
pub fn build_planner(config: &PlansmithConfig) -> Box<dyn Planner> {
    match config.planner.kind {
        PlannerKind::GoalOriented => Box::new(GoalOrientedPlanner::new()),
        PlannerKind::Sequence => Box::new(SequentialPlanner::new()),
        PlannerKind::PeerToPeer => {
            let p2p = &config.p2p;
            let planner = match &p2p.exit {
                Some(exit) => P2PPlanner::new(
                    p2p.max_invocations,
                    score_at_least(exit.key.clone(), exit.threshold),
                ),
                None => P2PPlanner::new(p2p.max_invocations, never_complete()),
            };
            Box::new(planner.with_selection(p2p.selection))
        }
    }
}

/// The planner agent described by configuration; its output key is the goal.
pub fn planner_agent(config: &PlansmithConfig) -> PlannerAgent {
    let agent = PlannerAgent::new(config.planner.name.clone());
    match &config.planner.goal {
        Some(goal) => agent.with_output_key(goal.clone()),
        None => agent,
    }
}
