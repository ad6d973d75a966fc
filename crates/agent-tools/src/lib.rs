//! Tool connectors for the two external-tool protocols and the dispatch
//! table the fulfillment loop invokes them through.

pub mod context;
pub mod local;
pub mod remote;
pub mod set;

pub use context::ToolContext;
pub use local::{ContentItem, LocalCallResult, LocalConnector, LocalToolProvider, LocalToolSpec};
pub use remote::{
    AgentCard, AgentSkill, InMemorySessionStore, RemoteAgentClient, RemoteAgentConnector,
    RemoteEvent, RemoteEventStream, RemoteMessageRequest, RemoteSession, SessionStore,
    TaskTracker, TaskTrackerState,
};
pub use set::ConnectorSet;
