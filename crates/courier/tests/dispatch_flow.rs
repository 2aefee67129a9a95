//! End-to-end dispatch flows through the public API: command routing,
//! the confirm/cancel gate, and usage accounting across a session.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde_json::json;

use courier::backend::{DeployPlan, ResourcePayload, TaskBoard};
use courier::{
    ActionsBackend, AssistantBackend, BackendResult, Error, InboundMessage, InMemoryUsageStore,
    Outbox, Router,
};

#[derive(Default)]
struct Replies {
    sent: Mutex<Vec<String>>,
}

impl Replies {
    fn all(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    fn last(&self) -> String {
        self.sent.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

impl Outbox for Replies {
    async fn send(&self, text: &str) -> Result<(), Error> {
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

struct StubActions;

impl ActionsBackend for StubActions {
    async fn task_board(&self) -> Result<TaskBoard, Error> {
        Ok(serde_json::from_value(json!({
            "data": {"backlog": ["a"], "in_progress": ["b", "c"], "done": []}
        }))
        .unwrap())
    }

    async fn orders(&self, status: Option<&str>) -> Result<u64, Error> {
        Ok(if status.is_some() { 4 } else { 20 })
    }

    async fn deploy(&self, phase: Option<&str>) -> Result<DeployPlan, Error> {
        Ok(DeployPlan {
            phase: phase.map(str::to_string),
            actions: vec!["build image".into(), "roll out".into()],
        })
    }

    async fn resource(&self, _name: &str) -> Result<ResourcePayload, Error> {
        Ok(ResourcePayload::Link("https://dash.example.com".into()))
    }

    async fn ping(&self) -> Result<(), Error> {
        Ok(())
    }
}

/// Returns scripted results in order; panics when the script runs dry so a
/// test failing on call count fails loudly.
struct ScriptedAssistant {
    script: Mutex<VecDeque<BackendResult>>,
}

impl ScriptedAssistant {
    fn new(results: impl IntoIterator<Item = BackendResult>) -> Self {
        Self {
            script: Mutex::new(results.into_iter().collect()),
        }
    }
}

impl AssistantBackend for ScriptedAssistant {
    async fn ask(&self, _prompt: &str, _confirmed: bool) -> BackendResult {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .expect("assistant called more times than scripted")
    }
}

fn message(conversation_id: i64, text: &str) -> InboundMessage {
    InboundMessage {
        conversation_id,
        sender_id: conversation_id,
        message_id: 1,
        text: text.into(),
    }
}

#[tokio::test]
async fn full_session_with_confirmation_gate() {
    let assistant = ScriptedAssistant::new([
        BackendResult::Text("The board looks healthy.".into()),
        BackendResult::RequiresConfirmation(vec!["production_deploy".into()]),
        BackendResult::Text("Deployment started.".into()),
    ]);
    let router = Router::new(StubActions, assistant, InMemoryUsageStore::new());
    let replies = Replies::default();

    router.handle(&message(1, "/start"), &replies).await.unwrap();
    assert!(replies.last().contains("/help"));

    router.handle(&message(1, "/tasks"), &replies).await.unwrap();
    assert!(replies.last().contains("- in_progress: 2"));

    router
        .handle(&message(1, "how does the board look?"), &replies)
        .await
        .unwrap();
    assert_eq!(replies.last(), "The board looks healthy.");

    router
        .handle(&message(1, "/nova deploy to production"), &replies)
        .await
        .unwrap();
    assert!(replies.last().contains("production_deploy"));
    assert!(router.confirmations().get(1).is_some());

    router.handle(&message(1, "/confirm"), &replies).await.unwrap();
    assert_eq!(replies.last(), "Deployment started.");
    assert!(router.confirmations().is_empty());

    router.handle(&message(1, "/stats"), &replies).await.unwrap();
    let stats = replies.last();
    assert!(stats.contains("Messages: 6"));
    assert!(stats.contains("Commands: 5"));
}

#[tokio::test]
async fn pending_confirmations_are_per_conversation() {
    let assistant = ScriptedAssistant::new([
        BackendResult::RequiresConfirmation(vec![]),
        BackendResult::RequiresConfirmation(vec![]),
        BackendResult::Text("First action done.".into()),
    ]);
    let router = Router::new(StubActions, assistant, InMemoryUsageStore::new());
    let replies_a = Replies::default();
    let replies_b = Replies::default();

    router
        .handle(&message(100, "/nova first action"), &replies_a)
        .await
        .unwrap();
    router
        .handle(&message(200, "/nova second action"), &replies_b)
        .await
        .unwrap();
    assert_eq!(router.confirmations().len(), 2);

    // Cancelling in one conversation leaves the other pending
    router.handle(&message(200, "/cancel"), &replies_b).await.unwrap();
    assert_eq!(replies_b.last(), "Action cancelled.");
    assert_eq!(router.confirmations().len(), 1);

    router.handle(&message(100, "/confirm"), &replies_a).await.unwrap();
    assert_eq!(replies_a.last(), "First action done.");
    assert!(router.confirmations().is_empty());
}

#[tokio::test]
async fn structured_commands_never_touch_the_assistant() {
    // Empty script: any assistant call panics
    let assistant = ScriptedAssistant::new([]);
    let router = Router::new(StubActions, assistant, InMemoryUsageStore::new());
    let replies = Replies::default();

    for text in [
        "/tasks",
        "/orders shipped",
        "/deploy staging",
        "/dashboard",
        "/ping",
        "/help",
        "/xyz",
    ] {
        router.handle(&message(1, text), &replies).await.unwrap();
    }

    let all = replies.all();
    assert!(all.iter().any(|r| r.contains("Total: 4")));
    assert!(all.iter().any(|r| r.contains("Deployment: staging")));
    assert!(all.iter().any(|r| r.contains("https://dash.example.com")));
    assert!(all.iter().any(|r| r.contains("actions backend: ok")));
}

#[tokio::test]
async fn license_flow_records_validations() {
    let assistant = ScriptedAssistant::new([]);
    let store = InMemoryUsageStore::new();
    store.register_license("STL-A3F2", "pro", None, vec!["automation".into()]);
    let router = Router::new(StubActions, assistant, store);
    let replies = Replies::default();

    router
        .handle(&message(7, "/license STL-A3F2"), &replies)
        .await
        .unwrap();
    assert!(replies.last().contains("License valid"));

    router
        .handle(&message(7, "/validar STL-BOGUS"), &replies)
        .await
        .unwrap();
    assert!(replies.last().contains("License invalid"));

    router.handle(&message(7, "/mylicenses"), &replies).await.unwrap();
    let recent = replies.last();
    assert!(recent.contains("STL-A3F2"));
    assert!(recent.contains("STL-BOGUS"));
}
