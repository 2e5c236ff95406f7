//! The command-handling service: owns conversations, stats, and the
//! knowledge store, and drives the ask pipeline.
//!
//! # Concurrency
//!
//! Handlers run interleaved on the tokio event loop. The conversation and
//! stats maps are guarded by `RwLock`s held only for the duration of each map
//! access; no guard is held across the model call or fragment execution.
//! Read-modify-write sequences therefore are not atomic across those
//! suspension points: two near-simultaneous first questions from the same
//! user can race to create the conversation, and the later writer wins. That
//! race is accepted as rare and low-stakes rather than paid for with a
//! request-wide lock.

use chrono::{DateTime, NaiveTime, Utc};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::{sync::RwLock, task::JoinHandle};
use tracing::{debug, info};

use crate::{
    config::ChatSettings,
    conversation::{ChatTurn, Conversation},
    error::Result,
    execute::CodeExecutor,
    extract::FragmentExtractor,
    knowledge::KnowledgeStore,
    model::ChatModel,
    pipeline::ResponsePipeline,
    stats::{StatsSnapshot, UsageStats},
};

pub struct ChatService {
    model: Arc<dyn ChatModel>,
    pipeline: ResponsePipeline<Arc<dyn CodeExecutor>>,
    knowledge: KnowledgeStore,
    conversations: RwLock<HashMap<String, Conversation>>,
    stats: RwLock<UsageStats>,
    settings: ChatSettings,
}

impl ChatService {
    pub fn new(
        settings: ChatSettings,
        model: Arc<dyn ChatModel>,
        executor: Arc<dyn CodeExecutor>,
        knowledge: KnowledgeStore,
    ) -> Self {
        let extractor = FragmentExtractor::new(&settings.start_marker, &settings.end_marker);
        Self {
            model,
            pipeline: ResponsePipeline::new(extractor, executor),
            knowledge,
            conversations: RwLock::new(HashMap::new()),
            stats: RwLock::new(UsageStats::default()),
            settings,
        }
    }

    /// Answer one user question: prompt the model with the full knowledge
    /// context plus this user's history, then post-process any executable
    /// fragments in the reply. The returned text is ready for chunking.
    pub async fn ask(&self, user_id: &str, username: &str, question: &str) -> Result<String> {
        info!(user = username, "ask: {}", question.chars().take(120).collect::<String>());

        let prompt = self.build_prompt(question).await;
        let history: Vec<ChatTurn> = self
            .conversations
            .read()
            .await
            .get(user_id)
            .map(|c| c.turns.clone())
            .unwrap_or_default();

        let answer = self.model.complete(&history, &prompt).await?;
        debug!("model answered with {} chars", answer.chars().count());

        self.stats
            .write()
            .await
            .record_question(user_id, username, question);
        self.conversations
            .write()
            .await
            .entry(user_id.to_string())
            .or_default()
            .push_exchange(question, answer.clone());

        let processed = self.pipeline.process(&answer).await;
        if processed.executions_attempted > 0 {
            self.stats.write().await.record_executions(
                processed.executions_attempted,
                processed.execution_errors,
            );
        }

        Ok(processed.text)
    }

    /// Clear one user's conversation. Returns false when there was none.
    pub async fn reset_conversation(&self, user_id: &str) -> bool {
        let removed = self.conversations.write().await.remove(user_id).is_some();
        if removed {
            self.stats.write().await.record_resets(1);
            info!("reset conversation for user {user_id}");
        }
        removed
    }

    /// Clear every conversation (the daily sweep). The map is cleared under
    /// one guard, so a concurrent request sees either the old set or none.
    pub async fn reset_all_conversations(&self) -> usize {
        let cleared = {
            let mut conversations = self.conversations.write().await;
            let count = conversations.len();
            conversations.clear();
            count
        };
        if cleared > 0 {
            self.stats.write().await.record_resets(cleared as u64);
        }
        cleared
    }

    pub async fn active_conversations(&self) -> usize {
        self.conversations.read().await.len()
    }

    /// Read-only stats view for the status surface.
    pub async fn stats_snapshot(&self) -> StatsSnapshot {
        let active = self.active_conversations().await;
        let names = self.knowledge.names().await;
        self.stats.read().await.snapshot(active, names)
    }

    pub fn knowledge(&self) -> &KnowledgeStore {
        &self.knowledge
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    async fn build_prompt(&self, question: &str) -> String {
        let mut prompt = String::new();
        if let Some(context) = self.knowledge.combined_context().await {
            prompt.push_str(
                "You are an AI assistant with access to the following reference \
                 documentation. Answer based solely on the information in it; avoid \
                 assumptions or external knowledge unless explicitly asked. If the \
                 documentation does not contain the answer, state this politely.\n\n",
            );
            prompt.push_str(&context);
            prompt.push_str("\n\n");
        }
        prompt.push_str(&format!(
            "USER QUESTION: {question}\n\nIf the documentation contains code blocks \
             marked with {start} and {end}, include the entire block (including both \
             markers) in your response, passing concrete values into any functions.",
            start = self.settings.start_marker,
            end = self.settings.end_marker,
        ));
        prompt
    }
}

/// Spawn the daily conversation sweep: sleeps until the configured UTC
/// wall-clock time, clears all conversations, and repeats. Abort the returned
/// handle on shutdown.
pub fn spawn_daily_reset(service: Arc<ChatService>, reset_time: NaiveTime) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let wait = duration_until(Utc::now(), reset_time);
            debug!("daily reset sleeping for {}s", wait.as_secs());
            tokio::time::sleep(wait).await;

            let cleared = service.reset_all_conversations().await;
            if cleared == 0 {
                info!("daily reset: no active conversations to clear");
            } else {
                info!("daily reset: cleared {cleared} active conversation(s)");
            }
        }
    })
}

/// Time until the next occurrence of `target` (UTC wall clock) after `now`.
fn duration_until(now: DateTime<Utc>, target: NaiveTime) -> Duration {
    let today = now.date_naive().and_time(target).and_utc();
    let next = if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    };
    (next - now).to_std().unwrap_or(Duration::from_secs(60))
}
