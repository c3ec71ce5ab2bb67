//! End-to-end pipeline test: inbound events through the orchestrator, plus
//! a scheduler tick firing proactive outreach, against one shared store.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};

use ember::config::CompanionConfig;
use ember::dispatch::OutboundDispatcher;
use ember::error::{GatewayError, LlmError};
use ember::gateway::DeliveryGateway;
use ember::journal::JournalManager;
use ember::llm::{CompletionRequest, CompletionResponse, LlmProvider};
use ember::orchestrator::{ConversationOrchestrator, InboundEvent, OrchestratorDeps};
use ember::risk::RiskAssessor;
use ember::scheduler::{ProactiveScheduler, ScheduleManager, SchedulerDeps};
use ember::session::{MessageKind, SessionManager};
use ember::store::{LibSqlStore, StateStore};

struct RecordingGateway {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingGateway {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
        })
    }

    fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, t)| t.clone())
            .collect()
    }
}

#[async_trait]
impl DeliveryGateway for RecordingGateway {
    async fn send(&self, identity: &str, text: &str) -> Result<(), GatewayError> {
        self.sent
            .lock()
            .unwrap()
            .push((identity.to_string(), text.to_string()));
        Ok(())
    }
}

/// Always answers with a fixed conversational reply; the risk layer sees
/// unparseable output and degrades to the keyword floor.
struct PlainLlm;

#[async_trait]
impl LlmProvider for PlainLlm {
    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        Ok(CompletionResponse {
            content: "I hear you. Tell me more?".to_string(),
        })
    }

    fn model_name(&self) -> &str {
        "plain"
    }
}

struct Harness {
    orchestrator: Arc<ConversationOrchestrator>,
    scheduler: Arc<ProactiveScheduler>,
    gateway: Arc<RecordingGateway>,
    sessions: Arc<SessionManager>,
    schedules: Arc<ScheduleManager>,
}

async fn harness() -> Harness {
    let store: Arc<dyn StateStore> = Arc::new(LibSqlStore::new_memory().await.unwrap());
    let config = CompanionConfig::default();
    let gateway = RecordingGateway::new();
    let llm: Arc<dyn LlmProvider> = Arc::new(PlainLlm);

    let sessions = Arc::new(SessionManager::new(store.clone(), config.history_cap));
    let schedules = Arc::new(ScheduleManager::new(store.clone()));
    let journal = Arc::new(JournalManager::new(store.clone(), config.journal_ttl));
    let dispatcher = Arc::new(OutboundDispatcher::new(
        gateway.clone(),
        config.max_segment_len,
        Duration::from_millis(1),
    ));
    let risk = Arc::new(RiskAssessor::new(
        llm.clone(),
        store.clone(),
        schedules.clone(),
        config.crisis_log_ttl,
    ));

    let orchestrator = Arc::new(ConversationOrchestrator::new(OrchestratorDeps {
        config: config.clone(),
        store: store.clone(),
        sessions: sessions.clone(),
        schedules: schedules.clone(),
        journal,
        risk,
        llm: llm.clone(),
        dispatcher: dispatcher.clone(),
    }));

    let scheduler = Arc::new(ProactiveScheduler::new(SchedulerDeps {
        config,
        store,
        sessions: sessions.clone(),
        schedules: schedules.clone(),
        llm,
        dispatcher,
    }));

    Harness {
        orchestrator,
        scheduler,
        gateway,
        sessions,
        schedules,
    }
}

#[tokio::test]
async fn conversation_onboarding_and_proactive_outreach() {
    let h = harness().await;

    // A new user talks through onboarding to completion.
    let script = [
        ("evt-1", "hi"),
        ("evt-2", "been feeling a bit lonely"),
        ("evt-3", "I'm Noor"),
        ("evt-4", "just need someone to talk to"),
        ("evt-5", "yes"),
    ];
    for (id, text) in script {
        h.orchestrator
            .handle_event(InboundEvent::text(id, "+15550001111", text))
            .await
            .unwrap();
    }

    let profile = h.sessions.load("+15550001111").await.unwrap().unwrap();
    assert_eq!(profile.name.as_deref(), Some("Noor"));
    assert!(profile.preferences.check_ins_enabled);
    assert_eq!(profile.message_count, 5);

    // Consent armed the schedule; pull the check-in into the past so the
    // next tick fires it.
    let mut record = h.schedules.load("+15550001111").await.unwrap().unwrap();
    record.next_check_in = Some(Utc::now() - ChronoDuration::minutes(1));
    record.next_journal_prompt = Some(Utc::now() + ChronoDuration::hours(6));
    h.schedules.save("+15550001111", &record).await.unwrap();

    assert!(h.scheduler.tick().await.unwrap());

    let texts = h.gateway.texts();
    let outreach = texts.last().unwrap();
    assert!(outreach.contains("Tell me more?") || outreach.contains("Good morning"));

    // The outreach is in history as an assistant message, and the slot
    // advanced so a second tick does not re-fire it.
    let history = h.sessions.recent_history("+15550001111").await.unwrap();
    assert_eq!(history.last().unwrap().kind, MessageKind::Proactive);

    let sent_before = h.gateway.texts().len();
    assert!(h.scheduler.tick().await.unwrap());
    assert_eq!(h.gateway.texts().len(), sent_before);

    let record = h.schedules.load("+15550001111").await.unwrap().unwrap();
    assert!(record.next_check_in.unwrap() > Utc::now());
}

#[tokio::test]
async fn journal_and_stop_flow_share_the_store() {
    let h = harness().await;
    let id = "+15550002222";

    h.orchestrator
        .handle_event(InboundEvent::text("evt-a", id, "hello"))
        .await
        .unwrap();
    h.orchestrator
        .handle_event(InboundEvent::text("evt-b", id, "j: slept better last night"))
        .await
        .unwrap();

    let profile = h.sessions.load(id).await.unwrap().unwrap();
    assert_eq!(profile.journal_count, 1);

    // Arm then stop; the scheduler must find nothing to fire.
    h.orchestrator
        .handle_event(InboundEvent::text("evt-c", id, "resume"))
        .await
        .unwrap();
    h.orchestrator
        .handle_event(InboundEvent::text("evt-d", id, "stop"))
        .await
        .unwrap();
    assert!(h.schedules.load(id).await.unwrap().is_none());

    let sent_before = h.gateway.texts().len();
    assert!(h.scheduler.tick().await.unwrap());
    assert_eq!(h.gateway.texts().len(), sent_before);
}

#[tokio::test]
async fn duplicate_delivery_across_components_is_idempotent() {
    let h = harness().await;
    let id = "+15550003333";
    let event = InboundEvent::text("evt-dup", id, "hello there");

    h.orchestrator.handle_event(event.clone()).await.unwrap();
    h.orchestrator.handle_event(event).await.unwrap();

    assert_eq!(h.gateway.texts().len(), 1);
    let profile = h.sessions.load(id).await.unwrap().unwrap();
    assert_eq!(profile.message_count, 1);
}

#[tokio::test]
async fn scheduler_replicas_elect_a_single_leader() {
    let h = harness().await;
    let second = harness().await; // independent store, sanity only

    // Two schedulers over the same store: one leader.
    let store: Arc<dyn StateStore> = Arc::new(LibSqlStore::new_memory().await.unwrap());
    let config = CompanionConfig::default();
    let gateway = RecordingGateway::new();
    let llm: Arc<dyn LlmProvider> = Arc::new(PlainLlm);
    let mk = |store: Arc<dyn StateStore>| {
        let sessions = Arc::new(SessionManager::new(store.clone(), config.history_cap));
        let schedules = Arc::new(ScheduleManager::new(store.clone()));
        let dispatcher = Arc::new(OutboundDispatcher::new(
            gateway.clone(),
            config.max_segment_len,
            Duration::from_millis(1),
        ));
        ProactiveScheduler::new(SchedulerDeps {
            config: config.clone(),
            store,
            sessions,
            schedules,
            llm: llm.clone(),
            dispatcher,
        })
    };
    let a = mk(store.clone());
    let b = mk(store);

    let a_leads = a.tick().await.unwrap();
    let b_leads = b.tick().await.unwrap();
    assert!(a_leads);
    assert!(!b_leads);

    // Unrelated harnesses are unaffected.
    assert!(h.scheduler.tick().await.unwrap());
    assert!(second.scheduler.tick().await.unwrap());
}
