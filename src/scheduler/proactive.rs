//! Proactive scheduler — leader-elected periodic outreach.
//!
//! Per tick: attempt leadership; not leader means skip. The leader scans
//! every schedule record, fires due check-ins, journal prompts, and
//! follow-ups, then renews the lease. One identity failing must not abort
//! the scan for the rest.

use std::sync::Arc;

use chrono::{Datelike, Utc};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::CompanionConfig;
use crate::dispatch::OutboundDispatcher;
use crate::error::{Error, ScheduleError, StoreError};
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::scheduler::leader::LeaderElector;
use crate::scheduler::schedule::{ScheduleManager, next_day_at};
use crate::session::{ConversationMessage, MessageKind, SessionManager};
use crate::store::{StateStore, keys};

const COMPOSE_MAX_TOKENS: u32 = 256;

/// Rotating evening journal prompts, picked by day of year.
const JOURNAL_PROMPTS: &[&str] = &[
    "Evening! If you feel like journaling, what's one thing that went well today? \
     Start with \"j:\" and tell me.",
    "How was today, really? A line or two starting with \"j:\" is plenty.",
    "Before the day winds down: anything you want to get out of your head? \
     \"j:\" and I'll keep it safe.",
    "What's something small you're grateful for today? Write it with \"j:\".",
    "If today had a headline, what would it be? Journal it with \"j:\".",
    "Any moment today you'd like to remember — or let go of? \"j:\" it to me.",
];

/// Dependencies for the proactive scheduler.
pub struct SchedulerDeps {
    pub config: CompanionConfig,
    pub store: Arc<dyn StateStore>,
    pub sessions: Arc<SessionManager>,
    pub schedules: Arc<ScheduleManager>,
    pub llm: Arc<dyn LlmProvider>,
    pub dispatcher: Arc<OutboundDispatcher>,
}

/// Leader-elected outreach loop.
pub struct ProactiveScheduler {
    config: CompanionConfig,
    store: Arc<dyn StateStore>,
    sessions: Arc<SessionManager>,
    schedules: Arc<ScheduleManager>,
    llm: Arc<dyn LlmProvider>,
    dispatcher: Arc<OutboundDispatcher>,
    elector: LeaderElector,
}

impl ProactiveScheduler {
    pub fn new(deps: SchedulerDeps) -> Self {
        let replica_id = format!("{}-{}", deps.config.name, uuid::Uuid::new_v4());
        let elector = LeaderElector::new(deps.store.clone(), replica_id, deps.config.leader_ttl);
        Self {
            config: deps.config,
            store: deps.store,
            sessions: deps.sessions,
            schedules: deps.schedules,
            llm: deps.llm,
            dispatcher: deps.dispatcher,
            elector,
        }
    }

    /// Tick until shutdown is signalled, then release the lease.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(replica = %self.elector.replica_id(), "Proactive scheduler started");
        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        warn!(error = %e, "Scheduler tick failed");
                    }
                }
                _ = shutdown.changed() => {
                    if let Err(e) = self.elector.release().await {
                        warn!(error = %e, "Failed to release leader lease on shutdown");
                    }
                    info!("Proactive scheduler stopped");
                    return;
                }
            }
        }
    }

    /// One scheduler tick. Returns whether this replica acted as leader.
    pub async fn tick(&self) -> Result<bool, StoreError> {
        if !self.elector.try_acquire().await? {
            debug!("Not leader this tick, skipping scan");
            return Ok(false);
        }

        // Full scan over schedule keys: fine at moderate user counts, a
        // time-ordered index is the upgrade path beyond that.
        let schedule_keys = self.store.scan_keys(keys::SCHEDULE_PREFIX).await?;
        debug!(count = schedule_keys.len(), "Scanning schedules");

        for key in &schedule_keys {
            let Some(identity) = keys::schedule_identity(key) else {
                continue;
            };
            if let Err(e) = self.process_identity(identity).await {
                warn!(identity, error = %e, "Schedule processing failed, continuing scan");
            }
        }

        self.elector.renew().await?;
        Ok(true)
    }

    /// Fire whatever is due for one identity.
    async fn process_identity(&self, identity: &str) -> Result<(), Error> {
        let record = match self.schedules.load(identity).await {
            Ok(record) => record,
            Err(StoreError::Serialization(reason)) => {
                return Err(ScheduleError::Malformed {
                    identity: identity.to_string(),
                    reason,
                }
                .into());
            }
            Err(e) => return Err(Error::Store(e)),
        };
        let Some(mut record) = record else {
            return Ok(());
        };
        let now = Utc::now();
        let mut dirty = false;

        if let Some(due) = record.next_check_in {
            if now >= due {
                let text = self.compose_check_in(identity).await;
                self.deliver(identity, &text, MessageKind::Proactive).await;
                // Strictly forward: the slot can never re-fire.
                record.next_check_in = Some(next_day_at(now, self.config.check_in_hour));
                dirty = true;
                info!(identity, next = ?record.next_check_in, "Check-in fired");
            }
        }

        if let Some(due) = record.next_journal_prompt {
            if now >= due {
                let prompt = JOURNAL_PROMPTS[now.ordinal() as usize % JOURNAL_PROMPTS.len()];
                self.deliver(identity, prompt, MessageKind::JournalPrompt).await;
                record.next_journal_prompt =
                    Some(next_day_at(now, self.config.journal_prompt_hour));
                dirty = true;
                info!(identity, next = ?record.next_journal_prompt, "Journal prompt fired");
            }
        }

        let due_follow_ups: Vec<_> = record
            .follow_ups
            .iter()
            .filter(|f| f.due <= now)
            .cloned()
            .collect();
        if !due_follow_ups.is_empty() {
            record.follow_ups.retain(|f| f.due > now);
            dirty = true;
            for follow_up in &due_follow_ups {
                let text = self.compose_follow_up(identity, &follow_up.context).await;
                self.deliver(identity, &text, MessageKind::FollowUp).await;
                info!(identity, kind = ?follow_up.kind, "Follow-up fired");
            }
        }

        if dirty {
            self.schedules
                .save(identity, &record)
                .await
                .map_err(Error::Store)?;
        }
        Ok(())
    }

    /// Record the outreach as an assistant message, then dispatch it.
    async fn deliver(&self, identity: &str, text: &str, kind: MessageKind) {
        let message = ConversationMessage::assistant(text).with_kind(kind);
        if let Err(e) = self.sessions.append_message(identity, &message).await {
            warn!(identity, error = %e, "Failed to record proactive message");
        }
        self.dispatcher.send(identity, text).await;
    }

    async fn compose_check_in(&self, identity: &str) -> String {
        let name = match self.sessions.load(identity).await {
            Ok(Some(profile)) => profile.name,
            _ => None,
        };
        let greeting_target = name.clone().unwrap_or_default();

        let request = CompletionRequest::new(vec![
            ChatMessage::system(
                "You are Ember, a warm companion. Write a short, fresh good-morning \
                 check-in message (1-2 sentences). Ask how the person is doing. \
                 No quotation marks.",
            ),
            ChatMessage::user(if greeting_target.is_empty() {
                "Write today's morning check-in.".to_string()
            } else {
                format!("Write today's morning check-in for {greeting_target}.")
            }),
        ])
        .with_max_tokens(COMPOSE_MAX_TOKENS);

        match self.llm.complete(request).await {
            Ok(response) => response.content.trim().to_string(),
            Err(e) => {
                warn!(identity, error = %e, "Check-in composition failed, using canned text");
                match name {
                    Some(name) => format!("Good morning, {name}! How are you feeling today?"),
                    None => "Good morning! How are you feeling today?".to_string(),
                }
            }
        }
    }

    async fn compose_follow_up(&self, identity: &str, context: &str) -> String {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(
                "You are Ember, a warm companion. Earlier the person said something \
                 worrying. Write a short, gentle follow-up message (1-2 sentences) \
                 checking how they are doing now. Do not quote them back verbatim.",
            ),
            ChatMessage::user(format!("Earlier they said: {context}")),
        ])
        .with_max_tokens(COMPOSE_MAX_TOKENS);

        match self.llm.complete(request).await {
            Ok(response) => response.content.trim().to_string(),
            Err(e) => {
                warn!(identity, error = %e, "Follow-up composition failed, using canned text");
                "Hey, I've been thinking about you since we last talked. How are you \
                 holding up?"
                    .to_string()
            }
        }
    }
}
