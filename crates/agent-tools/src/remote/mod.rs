//! REMOTE protocol: agents reached over a task-oriented RPC protocol that
//! carries its own task and context identifiers.

pub mod connector;
pub mod events;
pub mod tracker;

pub use connector::{
    AgentCard, AgentSkill, RemoteAgentClient, RemoteAgentConnector, RemoteEventStream,
    RemoteMessageRequest,
};
pub use events::RemoteEvent;
pub use tracker::{InMemorySessionStore, RemoteSession, SessionStore, TaskTracker, TaskTrackerState};
