//! Two-layer crisis-risk evaluation.
//!
//! Layer one is the deterministic phrase list; layer two asks the LLM to
//! classify. The external layer can only ever raise the level established
//! by the deterministic floor, and any external failure degrades to the
//! deterministic result alone — crisis handling is never disabled by an
//! outage.

pub mod keywords;

pub use keywords::{matches_crisis_phrase, resource_text};

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::scheduler::schedule::{FollowUp, FollowUpKind, ScheduleManager};
use crate::session::ConversationMessage;
use crate::store::{StateStore, keys};

/// Ordered crisis-severity classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

/// Outcome of assessing one message.
#[derive(Debug, Clone)]
pub struct Assessment {
    pub is_crisis: bool,
    pub level: RiskLevel,
    /// Canned resource text, present when level > Low.
    pub response: Option<String>,
    pub should_follow_up: bool,
    pub follow_up_after: Option<Duration>,
    /// Mood tag from the external layer, when it offered one.
    pub mood: Option<String>,
}

/// Append-only crisis log entry, retained 90 days.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrisisLogEntry {
    pub excerpt: String,
    pub level: RiskLevel,
    pub timestamp: DateTime<Utc>,
}

/// What the external layer is asked to return.
#[derive(Debug, Deserialize)]
struct ExternalAssessment {
    level: String,
    #[serde(default)]
    #[allow(dead_code)]
    rationale: String,
    #[serde(default)]
    mood: Option<String>,
    #[serde(default)]
    follow_up_hours: Option<f64>,
}

const ASSESS_SYSTEM_PROMPT: &str = "You assess emotional-crisis risk in a peer support \
chat. Reply with ONLY a JSON object: {\"level\": \"low\"|\"medium\"|\"high\"|\"critical\", \
\"rationale\": short string, \"mood\": one-word mood tag or null, \
\"follow_up_hours\": number of hours until a caring follow-up would help, or null}. \
Be conservative: reserve critical for stated imminent intent or a plan.";

const ASSESS_MAX_TOKENS: u32 = 256;
const ASSESS_TEMPERATURE: f32 = 0.0;

/// How much of the offending message the crisis log keeps.
const EXCERPT_CAP: usize = 200;

/// Two-layer risk assessor.
pub struct RiskAssessor {
    llm: Arc<dyn LlmProvider>,
    store: Arc<dyn StateStore>,
    schedules: Arc<ScheduleManager>,
    crisis_log_ttl: Duration,
}

impl RiskAssessor {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        store: Arc<dyn StateStore>,
        schedules: Arc<ScheduleManager>,
        crisis_log_ttl: Duration,
    ) -> Self {
        Self {
            llm,
            store,
            schedules,
            crisis_log_ttl,
        }
    }

    /// Assess one inbound message.
    pub async fn assess(
        &self,
        identity: &str,
        message: &str,
        recent_history: &[ConversationMessage],
    ) -> Assessment {
        let floor = if matches_crisis_phrase(message) {
            RiskLevel::High
        } else {
            RiskLevel::Low
        };

        let external = self.external_assessment(message, recent_history).await;

        // The external layer only ever raises the deterministic floor.
        let (level, mood, follow_up_after) = match &external {
            Some(ext) => {
                let ext_level = RiskLevel::parse(&ext.level).unwrap_or(RiskLevel::Low);
                let after = ext
                    .follow_up_hours
                    .filter(|h| *h > 0.0)
                    .map(|h| Duration::from_secs((h * 3600.0) as u64));
                (floor.max(ext_level), ext.mood.clone(), after)
            }
            None => (floor, None, None),
        };

        let is_crisis = level > RiskLevel::Low;
        if !is_crisis {
            return Assessment {
                is_crisis: false,
                level,
                response: None,
                should_follow_up: false,
                follow_up_after: None,
                mood,
            };
        }

        debug!(identity, %level, "Crisis risk detected");

        // Log and follow-up are best-effort: a store failure must not
        // suppress the crisis response itself.
        if let Err(e) = self.append_crisis_log(identity, message, level).await {
            warn!(identity, error = %e, "Failed to append crisis log entry");
        }

        let mut should_follow_up = false;
        if let Some(after) = follow_up_after {
            match chrono::Duration::from_std(after) {
                Ok(delta) => {
                    let follow_up = FollowUp {
                        kind: FollowUpKind::DistressFollowUp,
                        due: Utc::now() + delta,
                        context: excerpt(message),
                    };
                    match self.schedules.add_follow_up(identity, follow_up).await {
                        Ok(()) => should_follow_up = true,
                        Err(e) => {
                            warn!(identity, error = %e, "Failed to schedule distress follow-up")
                        }
                    }
                }
                Err(_) => warn!(identity, "Follow-up delay out of range, skipping"),
            }
        }

        Assessment {
            is_crisis: true,
            level,
            response: resource_text(level).map(str::to_string),
            should_follow_up,
            follow_up_after: should_follow_up.then_some(follow_up_after).flatten(),
            mood,
        }
    }

    /// Ask the external layer. Any failure degrades to `None`.
    async fn external_assessment(
        &self,
        message: &str,
        recent_history: &[ConversationMessage],
    ) -> Option<ExternalAssessment> {
        let mut messages = vec![ChatMessage::system(ASSESS_SYSTEM_PROMPT)];
        let context: String = recent_history
            .iter()
            .rev()
            .take(6)
            .rev()
            .map(|m| format!("{:?}: {}\n", m.role, m.content))
            .collect();
        messages.push(ChatMessage::user(format!(
            "Recent conversation:\n{context}\nLatest message:\n{message}"
        )));

        let request = CompletionRequest::new(messages)
            .with_max_tokens(ASSESS_MAX_TOKENS)
            .with_temperature(ASSESS_TEMPERATURE);

        let response = match self.llm.complete(request).await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "External risk layer unavailable, degrading to keyword result");
                return None;
            }
        };

        match parse_external(&response.content) {
            Some(ext) => Some(ext),
            None => {
                warn!(raw = %response.content, "Unparseable external risk reply, degrading");
                None
            }
        }
    }

    async fn append_crisis_log(
        &self,
        identity: &str,
        message: &str,
        level: RiskLevel,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        let entry = CrisisLogEntry {
            excerpt: excerpt(message),
            level,
            timestamp: now,
        };
        let key = keys::crisis(identity, now.timestamp_millis());
        let json = serde_json::to_string(&entry)?;
        self.store.put(&key, &json, Some(self.crisis_log_ttl)).await
    }
}

fn excerpt(message: &str) -> String {
    let mut text = message.trim().to_string();
    if text.len() > EXCERPT_CAP {
        let cut = (0..=EXCERPT_CAP)
            .rev()
            .find(|i| text.is_char_boundary(*i))
            .unwrap_or(0);
        text.truncate(cut);
    }
    text
}

/// Pull a JSON object out of the reply, tolerating code fences and prose.
fn parse_external(raw: &str) -> Option<ExternalAssessment> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&raw[start..=end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::CompletionResponse;
    use crate::store::LibSqlStore;
    use async_trait::async_trait;

    /// LLM stub: either a fixed reply or a failure.
    struct StubLlm {
        reply: Result<String, ()>,
    }

    #[async_trait]
    impl LlmProvider for StubLlm {
        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            match &self.reply {
                Ok(content) => Ok(CompletionResponse {
                    content: content.clone(),
                }),
                Err(()) => Err(LlmError::Server("boom".into())),
            }
        }

        fn model_name(&self) -> &str {
            "stub"
        }
    }

    async fn make_assessor(reply: Result<String, ()>) -> (RiskAssessor, Arc<LibSqlStore>) {
        let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
        let schedules = Arc::new(ScheduleManager::new(store.clone() as Arc<dyn StateStore>));
        let assessor = RiskAssessor::new(
            Arc::new(StubLlm { reply }),
            store.clone() as Arc<dyn StateStore>,
            schedules,
            Duration::from_secs(90 * 24 * 3600),
        );
        (assessor, store)
    }

    fn external_json(level: &str) -> String {
        format!(r#"{{"level": "{level}", "rationale": "test", "mood": "low", "follow_up_hours": null}}"#)
    }

    #[tokio::test]
    async fn merged_level_is_max_of_layers() {
        // Keyword floor High, external says medium: stays High.
        let (assessor, _) = make_assessor(Ok(external_json("medium"))).await;
        let result = assessor.assess("u1", "I want to kill myself", &[]).await;
        assert_eq!(result.level, RiskLevel::High);
        assert!(result.is_crisis);

        // External raises a clean message to critical.
        let (assessor, _) = make_assessor(Ok(external_json("critical"))).await;
        let result = assessor.assess("u1", "goodbye forever", &[]).await;
        assert_eq!(result.level, RiskLevel::Critical);

        // External can raise High floor to Critical.
        let (assessor, _) = make_assessor(Ok(external_json("critical"))).await;
        let result = assessor.assess("u1", "I want to end it all tonight", &[]).await;
        assert_eq!(result.level, RiskLevel::Critical);
    }

    #[tokio::test]
    async fn external_failure_degrades_to_keyword_floor() {
        let (assessor, _) = make_assessor(Err(())).await;
        let result = assessor.assess("u1", "I want to kill myself", &[]).await;
        assert_eq!(result.level, RiskLevel::High);
        assert!(result.is_crisis);
        assert!(result.response.is_some());

        let (assessor, _) = make_assessor(Err(())).await;
        let result = assessor.assess("u1", "lovely day outside", &[]).await;
        assert_eq!(result.level, RiskLevel::Low);
        assert!(!result.is_crisis);
    }

    #[tokio::test]
    async fn benign_idiom_passes_through() {
        let (assessor, _) = make_assessor(Ok(external_json("low"))).await;
        let result = assessor.assess("u1", "I killed it at work today", &[]).await;
        assert_eq!(result.level, RiskLevel::Low);
        assert!(!result.is_crisis);
        assert!(result.response.is_none());
    }

    #[tokio::test]
    async fn crisis_appends_log_entry() {
        let (assessor, store) = make_assessor(Ok(external_json("high"))).await;
        assessor.assess("u1", "I want to end it all", &[]).await;
        let keys = store.scan_keys("crisis:u1:").await.unwrap();
        assert_eq!(keys.len(), 1);
        let entry: CrisisLogEntry =
            serde_json::from_str(&store.get(&keys[0]).await.unwrap().unwrap()).unwrap();
        assert_eq!(entry.level, RiskLevel::High);
        assert!(entry.excerpt.contains("end it all"));
    }

    #[tokio::test]
    async fn recommended_delay_schedules_follow_up() {
        let reply = r#"{"level": "high", "rationale": "x", "mood": "down", "follow_up_hours": 4}"#;
        let (assessor, store) = make_assessor(Ok(reply.to_string())).await;
        let result = assessor.assess("u1", "I want to end it all", &[]).await;
        assert!(result.should_follow_up);
        assert!(result.follow_up_after.is_some());
        assert_eq!(result.mood.as_deref(), Some("down"));

        let schedules = ScheduleManager::new(store as Arc<dyn StateStore>);
        let record = schedules.load("u1").await.unwrap().unwrap();
        assert_eq!(record.follow_ups.len(), 1);
        assert_eq!(record.follow_ups[0].kind, FollowUpKind::DistressFollowUp);
    }

    #[tokio::test]
    async fn unparseable_external_reply_degrades() {
        let (assessor, _) = make_assessor(Ok("I think this is fine".to_string())).await;
        let result = assessor.assess("u1", "I want to kill myself", &[]).await;
        assert_eq!(result.level, RiskLevel::High);
    }

    #[test]
    fn parse_external_tolerates_fences() {
        let raw = "```json\n{\"level\": \"medium\", \"rationale\": \"r\"}\n```";
        let parsed = parse_external(raw).unwrap();
        assert_eq!(parsed.level, "medium");
    }

    #[test]
    fn level_ordering() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert!(RiskLevel::High < RiskLevel::Critical);
        assert_eq!(RiskLevel::High.max(RiskLevel::Medium), RiskLevel::High);
    }
}
