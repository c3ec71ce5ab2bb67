//! Conversation orchestrator — routes each inbound event through
//! idempotency, commands, journaling, risk assessment, onboarding, and
//! response composition.

pub mod commands;
pub mod event;
pub mod replies;

pub use commands::Command;
pub use event::{EventKind, InboundEvent};
pub use replies::WeightedReplies;

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::CompanionConfig;
use crate::dispatch::OutboundDispatcher;
use crate::error::Result;
use crate::idempotency::IdempotencyGuard;
use crate::journal::{self, JournalManager};
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider, fallback_reply};
use crate::onboarding;
use crate::risk::{RiskAssessor, RiskLevel, resource_text};
use crate::scheduler::schedule::ScheduleManager;
use crate::session::{ConversationMessage, MessageKind, SessionManager, UserProfile};
use crate::store::StateStore;

const REPLY_MAX_TOKENS: u32 = 512;

const APOLOGY_TEXT: &str = "Sorry — something went wrong on my end while saving \
    that. Mind trying again in a moment?";

const VOICE_TEXT: &str = "I can't listen to voice notes yet — could you type it \
    out for me?";

/// Everything the orchestrator composes over. Constructed once at process
/// start and passed in explicitly.
pub struct OrchestratorDeps {
    pub config: CompanionConfig,
    pub store: Arc<dyn StateStore>,
    pub sessions: Arc<SessionManager>,
    pub schedules: Arc<ScheduleManager>,
    pub journal: Arc<JournalManager>,
    pub risk: Arc<RiskAssessor>,
    pub llm: Arc<dyn LlmProvider>,
    pub dispatcher: Arc<OutboundDispatcher>,
}

/// Top-level inbound pipeline.
pub struct ConversationOrchestrator {
    config: CompanionConfig,
    sessions: Arc<SessionManager>,
    schedules: Arc<ScheduleManager>,
    journal: Arc<JournalManager>,
    risk: Arc<RiskAssessor>,
    llm: Arc<dyn LlmProvider>,
    dispatcher: Arc<OutboundDispatcher>,
    guard: IdempotencyGuard,
    encouragements: WeightedReplies,
}

impl ConversationOrchestrator {
    pub fn new(deps: OrchestratorDeps) -> Self {
        let guard = IdempotencyGuard::new(deps.store.clone(), deps.config.idempotency_ttl);
        Self {
            config: deps.config,
            sessions: deps.sessions,
            schedules: deps.schedules,
            journal: deps.journal,
            risk: deps.risk,
            llm: deps.llm,
            dispatcher: deps.dispatcher,
            guard,
            encouragements: replies::journal_encouragements(),
        }
    }

    /// Process one inbound event end to end.
    pub async fn handle_event(&self, event: InboundEvent) -> Result<()> {
        if event.identity.trim().is_empty() || event.content.trim().is_empty() {
            warn!(event_id = %event.event_id, "Dropping malformed inbound event");
            return Ok(());
        }

        match self.guard.claim(&event.event_id).await {
            Ok(claim) if claim.already_claimed => {
                debug!(event_id = %event.event_id, "Duplicate event, skipping");
                return Ok(());
            }
            Ok(_) => {}
            // A failed claim means "process conservatively", never drop.
            Err(e) => {
                warn!(event_id = %event.event_id, error = %e, "Idempotency claim failed, processing anyway")
            }
        }

        match event.kind {
            EventKind::Text => self.handle_text(&event).await,
            EventKind::Reaction => {
                debug!(identity = %event.identity, "Reaction received, no reply");
                Ok(())
            }
            EventKind::Voice => {
                self.finish(
                    &event.identity,
                    ConversationMessage::assistant(VOICE_TEXT).with_kind(MessageKind::Voice),
                )
                .await;
                Ok(())
            }
            EventKind::Status => Ok(()),
        }
    }

    async fn handle_text(&self, event: &InboundEvent) -> Result<()> {
        let identity = event.identity.as_str();
        let text = event.content.trim();

        let (mut profile, was_created) = self.sessions.load_or_create(identity).await?;

        if let Some(command) = commands::parse(text) {
            return self.handle_command(command, profile, text).await;
        }

        if journal::is_entry(text) {
            return self.handle_journal(&mut profile, text).await;
        }

        profile.touch(event.timestamp);

        let history = match self.sessions.recent_history(identity).await {
            Ok(history) => history,
            Err(e) => {
                warn!(identity, error = %e, "History unavailable, replying without context");
                Vec::new()
            }
        };

        let mut reply = if was_created {
            let normal = self.generate_reply(&profile, &[], text).await;
            format!("{}\n\n{normal}", commands::WELCOME_TEXT)
        } else {
            let assessment = self.risk.assess(identity, text, &history).await;
            if let Some(mood) = &assessment.mood {
                profile.emotional_state.record(mood, event.timestamp);
            }

            // Critical short-circuits everything else, onboarding included.
            if assessment.level == RiskLevel::Critical {
                info!(identity, "Critical risk, crisis response only");
                let crisis = assessment.response.unwrap_or_else(|| {
                    resource_text(RiskLevel::Critical).unwrap_or_default().to_string()
                });
                self.save_profile(&profile).await;
                self.record_user_message(identity, text).await;
                self.finish(
                    identity,
                    ConversationMessage::assistant(&crisis).with_kind(MessageKind::Crisis),
                )
                .await;
                return Ok(());
            }

            let normal = self.generate_reply(&profile, &history, text).await;
            match assessment.response {
                Some(resources) => format!("{resources}\n\n{normal}"),
                None => normal,
            }
        };

        // One onboarding step per event, its prompt appended last.
        let outcome = onboarding::step(&mut profile, text);
        if outcome.arm_schedule {
            if let Err(e) = self
                .schedules
                .arm_initial(
                    identity,
                    self.config.check_in_hour,
                    self.config.journal_prompt_hour,
                )
                .await
            {
                warn!(identity, error = %e, "Failed to arm initial schedule");
            }
        }
        if let Some(prompt) = outcome.prompt {
            reply = format!("{reply}\n\n{prompt}");
        }

        self.save_profile(&profile).await;
        self.record_user_message(identity, text).await;
        self.finish(identity, ConversationMessage::assistant(&reply))
            .await;
        Ok(())
    }

    async fn handle_command(
        &self,
        command: Command,
        mut profile: UserProfile,
        text: &str,
    ) -> Result<()> {
        let identity = profile.identity.clone();
        info!(identity = %identity, ?command, "Handling command");

        // Erasure removes every record, so nothing is written afterwards.
        if command == Command::Erase {
            let reply = match self.sessions.erase(&identity).await {
                Ok(_) => commands::ERASED_TEXT,
                Err(e) => {
                    warn!(identity = %identity, error = %e, "Erasure failed");
                    APOLOGY_TEXT
                }
            };
            self.dispatcher.send(&identity, reply).await;
            return Ok(());
        }

        let reply: String = match command {
            Command::Erase => unreachable!("handled above"),
            Command::StopCheckIns => {
                profile.preferences.check_ins_enabled = false;
                match self.schedules.clear(&identity).await {
                    Ok(()) => commands::STOPPED_TEXT.to_string(),
                    Err(e) => {
                        warn!(identity = %identity, error = %e, "Failed to clear schedule");
                        APOLOGY_TEXT.to_string()
                    }
                }
            }
            Command::ResumeCheckIns => {
                profile.preferences.check_ins_enabled = true;
                match self
                    .schedules
                    .arm_initial(
                        &identity,
                        self.config.check_in_hour,
                        self.config.journal_prompt_hour,
                    )
                    .await
                {
                    Ok(_) => commands::RESUMED_TEXT.to_string(),
                    Err(e) => {
                        warn!(identity = %identity, error = %e, "Failed to arm schedule");
                        APOLOGY_TEXT.to_string()
                    }
                }
            }
            Command::Help => commands::HELP_TEXT.to_string(),
            Command::CrisisResources => resource_text(RiskLevel::High)
                .unwrap_or_default()
                .to_string(),
            Command::JournalSummary => match self.journal.today_count(&identity).await {
                Ok(0) => "Nothing in your journal yet today. Start a message with \
                          \"j:\" whenever you feel like writing."
                    .to_string(),
                Ok(n) => format!(
                    "You've written {n} journal {} today. I'm keeping them safe.",
                    if n == 1 { "entry" } else { "entries" }
                ),
                Err(e) => {
                    warn!(identity = %identity, error = %e, "Failed to read journal");
                    APOLOGY_TEXT.to_string()
                }
            },
        };

        profile.touch(Utc::now());
        self.save_profile(&profile).await;
        self.record_user_message(&identity, text).await;
        self.finish(&identity, ConversationMessage::assistant(&reply))
            .await;
        Ok(())
    }

    async fn handle_journal(&self, profile: &mut UserProfile, text: &str) -> Result<()> {
        let identity = profile.identity.clone();
        let content = journal::extract(text);

        // An entry shortly after our evening nudge counts as prompted.
        let prompted = self
            .sessions
            .recent_history(&identity)
            .await
            .ok()
            .and_then(|history| history.last().cloned())
            .is_some_and(|m| m.kind == MessageKind::JournalPrompt);

        let reply = match self.journal.record(&identity, content, prompted).await {
            Ok(_) => {
                profile.journal_count += 1;
                let mut reply = "Saved to your journal.".to_string();
                if let Some(extra) = self.encouragements.choose() {
                    reply = format!("{reply} {extra}");
                }
                reply
            }
            Err(e) => {
                warn!(identity = %identity, error = %e, "Failed to save journal entry");
                APOLOGY_TEXT.to_string()
            }
        };

        profile.touch(Utc::now());
        self.save_profile(profile).await;
        self.record_user_message(&identity, text).await;
        self.finish(&identity, ConversationMessage::assistant(&reply))
            .await;
        Ok(())
    }

    /// Compose a normal reply from profile context and recent history.
    async fn generate_reply(
        &self,
        profile: &UserProfile,
        history: &[ConversationMessage],
        text: &str,
    ) -> String {
        let mut messages = vec![ChatMessage::system(system_prompt(profile))];
        let window = history
            .iter()
            .rev()
            .take(self.config.context_window)
            .rev();
        for message in window {
            messages.push(match message.role {
                crate::session::MessageRole::User => ChatMessage::user(&message.content),
                crate::session::MessageRole::Assistant => {
                    ChatMessage::assistant(&message.content)
                }
            });
        }
        messages.push(ChatMessage::user(text));

        let request = CompletionRequest::new(messages).with_max_tokens(REPLY_MAX_TOKENS);
        match self.llm.complete(request).await {
            Ok(response) => response.content.trim().to_string(),
            Err(e) => {
                warn!(identity = %profile.identity, error = %e, "Reply generation failed, using fallback");
                fallback_reply(&e).to_string()
            }
        }
    }

    async fn save_profile(&self, profile: &UserProfile) {
        if let Err(e) = self.sessions.save(profile).await {
            warn!(identity = %profile.identity, error = %e, "Failed to persist profile");
        }
    }

    async fn record_user_message(&self, identity: &str, text: &str) {
        if let Err(e) = self
            .sessions
            .append_message(identity, &ConversationMessage::user(text))
            .await
        {
            warn!(identity, error = %e, "Failed to append inbound message to history");
        }
    }

    /// Record the outgoing message and dispatch it.
    async fn finish(&self, identity: &str, message: ConversationMessage) {
        if let Err(e) = self.sessions.append_message(identity, &message).await {
            warn!(identity, error = %e, "Failed to append reply to history");
        }
        self.dispatcher.send(identity, &message.content).await;
    }
}

/// System prompt for normal reply generation.
pub(crate) fn system_prompt(profile: &UserProfile) -> String {
    let mut prompt = String::from(
        "You are Ember, a warm, steady companion. Listen closely, reflect \
         feelings back, and keep replies short and conversational. Never \
         give medical advice; gently suggest professional support when \
         someone is struggling.",
    );
    if let Some(name) = &profile.name {
        prompt.push_str(&format!("\nThe user's name is {name}."));
    }
    if let Some(reason) = &profile.preferences.reason {
        prompt.push_str(&format!("\nThey originally reached out because: {reason}."));
    }
    if let Some(mood) = &profile.emotional_state.current {
        prompt.push_str(&format!("\nTheir recent mood has been: {mood}."));
    }
    prompt
}
