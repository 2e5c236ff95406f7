//! Process-wide usage counters, exposed read-only to the status surface.
//!
//! Nothing here persists; counters reset to zero on restart.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// Last-question previews are bounded so the snapshot stays small.
const QUESTION_PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, Default, Serialize)]
pub struct UserStats {
    pub username: String,
    pub questions: u64,
    pub last_question: Option<String>,
    pub last_asked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UsageStats {
    pub questions_asked: u64,
    pub conversations_reset: u64,
    pub executions_attempted: u64,
    pub execution_errors: u64,
    pub per_user: HashMap<String, UserStats>,
}

impl UsageStats {
    pub fn record_question(&mut self, user_id: &str, username: &str, question: &str) {
        self.questions_asked += 1;
        let entry = self.per_user.entry(user_id.to_string()).or_default();
        entry.username = username.to_string();
        entry.questions += 1;
        entry.last_question = Some(preview(question));
        entry.last_asked_at = Some(Utc::now());
    }

    pub fn record_resets(&mut self, count: u64) {
        self.conversations_reset += count;
    }

    pub fn record_executions(&mut self, attempted: u64, errors: u64) {
        self.executions_attempted += attempted;
        self.execution_errors += errors;
    }
}

fn preview(question: &str) -> String {
    if question.chars().count() <= QUESTION_PREVIEW_CHARS {
        question.to_string()
    } else {
        let mut cut: String = question.chars().take(QUESTION_PREVIEW_CHARS).collect();
        cut.push_str("...");
        cut
    }
}

/// One entry in the snapshot's top-user list.
#[derive(Debug, Clone, Serialize)]
pub struct TopUser {
    pub username: String,
    pub question_count: u64,
    pub last_question: Option<String>,
    pub last_asked_at: Option<DateTime<Utc>>,
}

/// Read-only view of current usage, for the external status surface.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub questions_asked: u64,
    pub conversations_reset: u64,
    pub executions_attempted: u64,
    pub execution_errors: u64,
    pub active_conversations: usize,
    pub document_count: usize,
    pub document_names: Vec<String>,
    pub top_users: Vec<TopUser>,
}

impl UsageStats {
    pub fn snapshot(
        &self,
        active_conversations: usize,
        document_names: Vec<String>,
    ) -> StatsSnapshot {
        let mut users: Vec<&UserStats> = self.per_user.values().collect();
        users.sort_by(|a, b| b.questions.cmp(&a.questions));
        let top_users = users
            .into_iter()
            .take(5)
            .map(|u| TopUser {
                username: u.username.clone(),
                question_count: u.questions,
                last_question: u.last_question.clone(),
                last_asked_at: u.last_asked_at,
            })
            .collect();

        StatsSnapshot {
            questions_asked: self.questions_asked,
            conversations_reset: self.conversations_reset,
            executions_attempted: self.executions_attempted,
            execution_errors: self.execution_errors,
            active_conversations,
            document_count: document_names.len(),
            document_names,
            top_users,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn question_updates_totals_and_user_entry() {
        let mut stats = UsageStats::default();
        stats.record_question("1", "ada", "what is a quest?");
        stats.record_question("1", "ada", "and a boss fight?");
        stats.record_question("2", "grace", "hello");

        assert_eq!(stats.questions_asked, 3);
        assert_eq!(stats.per_user["1"].questions, 2);
        assert_eq!(
            stats.per_user["1"].last_question.as_deref(),
            Some("and a boss fight?")
        );
        assert_eq!(stats.per_user["2"].questions, 1);
    }

    #[test]
    fn long_questions_are_previewed() {
        let mut stats = UsageStats::default();
        let question = "x".repeat(250);
        stats.record_question("1", "ada", &question);
        let preview = stats.per_user["1"].last_question.clone().unwrap();
        assert_eq!(preview.chars().count(), 103);
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn snapshot_ranks_top_users() {
        let mut stats = UsageStats::default();
        for i in 0..7 {
            let id = i.to_string();
            for _ in 0..=i {
                stats.record_question(&id, &format!("user{i}"), "q");
            }
        }
        let snapshot = stats.snapshot(4, vec!["docs".to_string()]);
        assert_eq!(snapshot.top_users.len(), 5);
        assert_eq!(snapshot.top_users[0].username, "user6");
        assert_eq!(snapshot.top_users[0].question_count, 7);
        assert_eq!(snapshot.active_conversations, 4);
        assert_eq!(snapshot.document_count, 1);
    }

    #[test]
    fn execution_counters_are_independent() {
        let mut stats = UsageStats::default();
        stats.record_executions(2, 1);
        stats.record_executions(1, 0);
        assert_eq!(stats.executions_attempted, 3);
        assert_eq!(stats.execution_errors, 1);
    }
}
