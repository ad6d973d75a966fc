use agent_core::TaskState;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::events::RemoteEvent;

/// Remote protocol identifiers tracked for one conversation thread.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteSession {
    /// Outstanding remote task, at most one per thread.
    pub task_id: Option<String>,
    /// Remote conversation context; kept across tasks.
    pub context_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskTrackerState {
    NoTask,
    Open {
        task_id: String,
        context_id: Option<String>,
    },
}

/// Storage for per-thread remote sessions.
///
/// Implementations must apply `update` atomically per thread; concurrent
/// updates for the same thread are serialized and the last one wins.
pub trait SessionStore: Send + Sync {
    fn get(&self, thread_id: &str) -> Option<RemoteSession>;
    fn update(&self, thread_id: &str, apply: &mut dyn FnMut(&mut RemoteSession));
    fn remove(&self, thread_id: &str);
}

#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, RemoteSession>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, thread_id: &str) -> Option<RemoteSession> {
        self.sessions.get(thread_id).map(|entry| entry.value().clone())
    }

    fn update(&self, thread_id: &str, apply: &mut dyn FnMut(&mut RemoteSession)) {
        let mut entry = self.sessions.entry(thread_id.to_string()).or_default();
        apply(entry.value_mut());
    }

    fn remove(&self, thread_id: &str) {
        self.sessions.remove(thread_id);
    }
}

/// How long a cancel mark waits for its task before being dropped.
const DEFAULT_CANCEL_TTL: Duration = Duration::from_secs(600);

/// Keeps remote conversations coherent across calls and carries
/// cooperative cancellation of remote tasks.
pub struct TaskTracker {
    store: Arc<dyn SessionStore>,
    canceled: DashMap<String, Instant>,
    cancel_ttl: Duration,
}

impl TaskTracker {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            canceled: DashMap::new(),
            cancel_ttl: DEFAULT_CANCEL_TTL,
        }
    }

    pub fn with_cancel_ttl(mut self, ttl: Duration) -> Self {
        self.cancel_ttl = ttl;
        self
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemorySessionStore::new()))
    }

    pub fn session(&self, thread_id: &str) -> RemoteSession {
        self.store.get(thread_id).unwrap_or_default()
    }

    pub fn state(&self, thread_id: &str) -> TaskTrackerState {
        match self.session(thread_id) {
            RemoteSession {
                task_id: Some(task_id),
                context_id,
            } => TaskTrackerState::Open {
                task_id,
                context_id,
            },
            RemoteSession { task_id: None, .. } => TaskTrackerState::NoTask,
        }
    }

    /// Folds one inbound event into the thread's session.
    pub fn apply(&self, thread_id: &str, event: &RemoteEvent) {
        let (task_id, state, is_final) = match event {
            RemoteEvent::StatusUpdate {
                task_id,
                state,
                is_final,
                ..
            } => (Some(task_id.as_str()), Some(*state), *is_final),
            RemoteEvent::Task { task_id, state, .. } => (Some(task_id.as_str()), Some(*state), false),
            RemoteEvent::Message { task_id, .. } => (task_id.as_deref(), None, false),
            RemoteEvent::Unrecognized(value) => {
                log::debug!("[{}] Ignoring unrecognized remote event: {}", thread_id, value);
                return;
            }
        };
        let context_id = event.context_id();

        self.store.update(thread_id, &mut |session: &mut RemoteSession| {
            if let Some(context_id) = context_id {
                session.context_id = Some(context_id.to_string());
            }
            if let Some(task_id) = task_id {
                session.task_id = Some(task_id.to_string());
            }
            if let Some(state) = state {
                if closes_task(state, is_final) {
                    session.task_id = None;
                }
            }
        });
    }

    /// Marks a task as canceled; the connector executing it stops at its
    /// next event boundary. Marks for tasks that never reach this tracker
    /// expire after the cancel TTL.
    pub fn cancel(&self, task_id: &str) {
        log::info!("Cancellation requested for remote task {}", task_id);
        let ttl = self.cancel_ttl;
        self.canceled.retain(|_, marked_at| marked_at.elapsed() < ttl);
        self.canceled.insert(task_id.to_string(), Instant::now());
    }

    pub fn is_canceled(&self, task_id: &str) -> bool {
        self.canceled.contains_key(task_id)
    }

    /// Called once a cancellation has been honoured.
    pub fn finish_cancel(&self, thread_id: &str, task_id: &str) {
        self.canceled.remove(task_id);
        self.store.update(thread_id, &mut |session: &mut RemoteSession| {
            if session.task_id.as_deref() == Some(task_id) {
                session.task_id = None;
            }
        });
    }

    pub fn clear(&self, thread_id: &str) {
        self.store.remove(thread_id);
    }
}

impl Default for TaskTracker {
    fn default() -> Self {
        Self::in_memory()
    }
}

fn closes_task(state: TaskState, is_final: bool) -> bool {
    state != TaskState::InputRequired && (is_final || state.is_terminal())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(task_id: &str, state: TaskState, is_final: bool) -> RemoteEvent {
        RemoteEvent::StatusUpdate {
            task_id: task_id.to_string(),
            context_id: Some("ctx-1".to_string()),
            state,
            text: None,
            is_final,
        }
    }

    #[test]
    fn threads_start_without_task() {
        let tracker = TaskTracker::in_memory();
        assert_eq!(tracker.state("thread-1"), TaskTrackerState::NoTask);
    }

    #[test]
    fn task_opens_and_closes_on_terminal_status() {
        let tracker = TaskTracker::in_memory();

        tracker.apply("thread-1", &status("task-1", TaskState::Working, false));
        assert_eq!(
            tracker.state("thread-1"),
            TaskTrackerState::Open {
                task_id: "task-1".to_string(),
                context_id: Some("ctx-1".to_string()),
            }
        );

        tracker.apply("thread-1", &status("task-1", TaskState::Completed, true));
        assert_eq!(tracker.state("thread-1"), TaskTrackerState::NoTask);
        assert_eq!(
            tracker.session("thread-1").context_id.as_deref(),
            Some("ctx-1")
        );
    }

    #[test]
    fn input_required_keeps_task_open() {
        let tracker = TaskTracker::in_memory();
        tracker.apply("thread-1", &status("task-1", TaskState::InputRequired, true));

        assert!(matches!(
            tracker.state("thread-1"),
            TaskTrackerState::Open { ref task_id, .. } if task_id == "task-1"
        ));
    }

    #[test]
    fn message_updates_context_only_when_present() {
        let tracker = TaskTracker::in_memory();
        tracker.apply(
            "thread-1",
            &RemoteEvent::Message {
                task_id: None,
                context_id: Some("ctx-2".to_string()),
                text: "hi".to_string(),
            },
        );

        let session = tracker.session("thread-1");
        assert_eq!(session.task_id, None);
        assert_eq!(session.context_id.as_deref(), Some("ctx-2"));
    }

    #[test]
    fn unrecognized_events_leave_state_untouched() {
        let store = Arc::new(InMemorySessionStore::new());
        let tracker = TaskTracker::new(store.clone());
        tracker.apply("thread-1", &RemoteEvent::Unrecognized(serde_json::json!({})));
        assert!(store.is_empty());
    }

    #[test]
    fn finish_cancel_clears_task_and_cancel_mark() {
        let tracker = TaskTracker::in_memory();
        tracker.apply("thread-1", &status("task-1", TaskState::Working, false));
        tracker.cancel("task-1");
        assert!(tracker.is_canceled("task-1"));

        tracker.finish_cancel("thread-1", "task-1");
        assert!(!tracker.is_canceled("task-1"));
        assert_eq!(tracker.state("thread-1"), TaskTrackerState::NoTask);
    }

    #[test]
    fn stale_cancel_marks_are_pruned() {
        let tracker = TaskTracker::in_memory().with_cancel_ttl(Duration::ZERO);
        tracker.cancel("task-a");
        tracker.cancel("task-b");

        assert!(!tracker.is_canceled("task-a"));
        assert!(tracker.is_canceled("task-b"));
    }

    #[test]
    fn threads_are_tracked_independently() {
        let tracker = TaskTracker::in_memory();
        tracker.apply("a", &status("task-a", TaskState::Working, false));
        tracker.apply("b", &status("task-b", TaskState::Submitted, false));
        tracker.clear("a");

        assert_eq!(tracker.state("a"), TaskTrackerState::NoTask);
        assert!(matches!(tracker.state("b"), TaskTrackerState::Open { .. }));
    }
}
