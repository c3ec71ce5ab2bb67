//! Outbound dispatcher — splits oversized replies and paces delivery.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::gateway::DeliveryGateway;

/// Splits long texts into bounded segments and sends them in order.
///
/// A fixed pacing delay between segments preserves perceived ordering on
/// the receiving client. A failed segment is logged and does not suppress
/// the segments after it.
pub struct OutboundDispatcher {
    gateway: Arc<dyn DeliveryGateway>,
    max_segment_len: usize,
    pacing: Duration,
}

impl OutboundDispatcher {
    pub fn new(gateway: Arc<dyn DeliveryGateway>, max_segment_len: usize, pacing: Duration) -> Self {
        Self {
            gateway,
            max_segment_len,
            pacing,
        }
    }

    /// Deliver `text` to `identity`, split into segments as needed.
    pub async fn send(&self, identity: &str, text: &str) {
        let segments = split_text(text, self.max_segment_len);
        let total = segments.len();
        if total > 1 {
            debug!(identity, segments = total, "Splitting oversized reply");
        }
        for (index, segment) in segments.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.pacing).await;
            }
            if let Err(e) = self.gateway.send(identity, segment).await {
                warn!(
                    identity,
                    segment = index + 1,
                    total,
                    error = %e,
                    "Failed to deliver segment"
                );
            }
        }
    }
}

/// Largest char boundary at or below `max`.
fn floor_boundary(text: &str, max: usize) -> usize {
    (0..=max.min(text.len()))
        .rev()
        .find(|i| text.is_char_boundary(*i))
        .unwrap_or(0)
}

/// Best break point within `window`, or `None` for a hard cut.
///
/// Preference order: paragraph break, line break, sentence terminator,
/// word boundary. A break is only taken in the second half of the window
/// so a pathological text cannot produce confetti segments.
fn find_break(window: &str, min: usize) -> Option<usize> {
    if let Some(i) = window.rfind("\n\n") {
        if i >= min {
            return Some(i);
        }
    }
    if let Some(i) = window.rfind('\n') {
        if i >= min {
            return Some(i);
        }
    }
    let sentence = [". ", "! ", "? "]
        .iter()
        .filter_map(|p| window.rfind(p))
        .max()
        .map(|i| i + 1);
    if let Some(i) = sentence {
        if i >= min {
            return Some(i);
        }
    }
    if let Some(i) = window.rfind(' ') {
        if i >= min {
            return Some(i);
        }
    }
    None
}

/// Split `text` into segments no longer than `max_len` bytes.
pub fn split_text(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut segments = Vec::new();
    let mut remaining = text;
    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            segments.push(remaining.to_string());
            break;
        }

        let window_end = floor_boundary(remaining, max_len);
        let window = &remaining[..window_end];
        let split_at = find_break(window, max_len / 2).unwrap_or(window_end);
        // Zero-progress guard for degenerate windows: always advance by at
        // least one whole character.
        let split_at = match split_at {
            0 if window_end > 0 => window_end,
            0 => remaining
                .char_indices()
                .nth(1)
                .map_or(remaining.len(), |(i, _)| i),
            n => n,
        };

        segments.push(remaining[..split_at].trim_end().to_string());
        remaining = remaining[split_at..].trim_start();
    }

    segments.retain(|s| !s.is_empty());
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn strip_whitespace(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn short_text_is_one_segment() {
        assert_eq!(split_text("hello", 100), vec!["hello"]);
        let exact = "a".repeat(100);
        assert_eq!(split_text(&exact, 100), vec![exact.clone()]);
    }

    #[test]
    fn prefers_paragraph_break() {
        let text = format!("{}\n\n{}", "a".repeat(70), "b".repeat(70));
        let segments = split_text(&text, 100);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0], "a".repeat(70));
        assert_eq!(segments[1], "b".repeat(70));
    }

    #[test]
    fn falls_back_to_sentence_then_word() {
        let text = format!("{}. {}", "a".repeat(70), "b".repeat(70));
        let segments = split_text(&text, 100);
        assert_eq!(segments[0], format!("{}.", "a".repeat(70)));

        let words = "word ".repeat(50);
        for segment in split_text(words.trim_end(), 64) {
            assert!(segment.len() <= 64);
            assert!(!segment.starts_with(' ') && !segment.ends_with(' '));
        }
    }

    #[test]
    fn early_break_in_first_half_is_ignored() {
        // The only space sits in the first half; expect a hard cut instead
        // of a tiny first segment.
        let text = format!("ab {}", "c".repeat(200));
        let segments = split_text(&text, 100);
        assert!(segments[0].len() > 50);
    }

    #[test]
    fn hard_cut_when_unbreakable() {
        let text = "x".repeat(250);
        let segments = split_text(&text, 100);
        assert_eq!(segments.len(), 3);
        assert!(segments.iter().all(|s| s.len() <= 100));
    }

    #[test]
    fn reconstruction_preserves_content() {
        let text = "First paragraph with some words.\n\nSecond paragraph, quite a bit \
                    longer, explaining something in detail. And another sentence! \
                    Plus one more?\nA final line with trailing words to push it over."
            .repeat(3);
        let segments = split_text(&text, 120);
        assert!(segments.iter().all(|s| s.len() <= 120));
        assert_eq!(
            strip_whitespace(&segments.concat()),
            strip_whitespace(&text)
        );
    }

    #[test]
    fn degenerate_limit_still_terminates() {
        // A limit narrower than one char cannot honor the length bound,
        // but it must still make progress and keep every char intact.
        let segments = split_text("ééé", 1);
        assert_eq!(segments, vec!["é", "é", "é"]);
    }

    #[test]
    fn multibyte_text_never_splits_a_char() {
        let text = "héllo wörld ünd ümläüte ".repeat(30);
        let segments = split_text(text.trim_end(), 50);
        for segment in &segments {
            assert!(segment.len() <= 50);
            // Would panic on a broken boundary.
            let _ = segment.chars().count();
        }
        assert_eq!(
            strip_whitespace(&segments.concat()),
            strip_whitespace(text.trim_end())
        );
    }

    /// Gateway stub that fails on chosen segments and records the rest.
    struct FlakyGateway {
        fail_on: usize,
        sent: Mutex<Vec<String>>,
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl DeliveryGateway for FlakyGateway {
        async fn send(&self, _identity: &str, text: &str) -> Result<(), GatewayError> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls == self.fail_on {
                return Err(GatewayError::RateLimited);
            }
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn failed_segment_does_not_suppress_later_ones() {
        let gateway = Arc::new(FlakyGateway {
            fail_on: 2,
            sent: Mutex::new(Vec::new()),
            calls: Mutex::new(0),
        });
        let dispatcher =
            OutboundDispatcher::new(gateway.clone(), 50, Duration::from_millis(1));
        let text = "one one one one one. two two two two two. three three three three.";
        dispatcher.send("u1", text).await;

        let calls = *gateway.calls.lock().unwrap();
        let sent = gateway.sent.lock().unwrap();
        assert!(calls >= 2);
        assert_eq!(sent.len(), calls - 1);
    }
}
