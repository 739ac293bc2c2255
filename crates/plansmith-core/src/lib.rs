pub mod config;
pub mod error;
pub mod event;
pub mod scope;
pub mod traits;
pub mod types;

pub use config::PlansmithConfig;
pub use error::{PlannerError, Result};
pub use event::EventBus;
pub use scope::AgenticScope;
pub use traits::{Agent, AgentInput, AgentRef};
pub use types::*;
