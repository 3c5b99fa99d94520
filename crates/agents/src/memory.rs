//! Conversation memory
//!
//! Four retention policies share one contract: [`BufferMemory`] caps the
//! message count, [`WindowMemory`] keeps the last K turns, [`SummaryMemory`]
//! folds the oldest half into a running summary once a threshold is reached,
//! and [`CombinedMemory`] keeps a recent window verbatim and summarizes the
//! rest. System messages survive buffer and window trimming.

use std::sync::Arc;

use async_trait::async_trait;
use orchestrator_core::{errors::MemoryError, to_llm_messages, LLMMessage, Message};
use orchestrator_providers::{CompletionOptions, LLMBackend};
use tracing::debug;

use crate::persistence::{InMemoryStore, MemoryRecord, MemoryStore};

const SUMMARY_PREFIX: &str = "Summary of earlier conversation: ";

const SUMMARIZE_PROMPT: &str = "Progressively summarize the conversation below, adding onto the previous summary. Return only the new summary.";

/// Conversation memory contract used by the executor
#[async_trait]
pub trait Memory: Send + Sync {
    /// History to place before the current turn
    async fn load(&self) -> Result<Vec<Message>, MemoryError>;

    /// Record one finished turn and its final output
    async fn save(&self, turn_messages: &[Message], final_output: &str) -> Result<(), MemoryError>;

    /// Forget everything
    async fn clear(&self) -> Result<(), MemoryError>;
}

/// Condenses messages into a running summary
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(
        &self,
        previous_summary: Option<&str>,
        messages: &[Message],
    ) -> Result<String, MemoryError>;
}

/// Summarizer backed by a plain closure
pub struct FnSummarizer<F>
where
    F: Fn(Option<&str>, &[Message]) -> String + Send + Sync,
{
    f: F,
}

impl<F> FnSummarizer<F>
where
    F: Fn(Option<&str>, &[Message]) -> String + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> Summarizer for FnSummarizer<F>
where
    F: Fn(Option<&str>, &[Message]) -> String + Send + Sync,
{
    async fn summarize(
        &self,
        previous_summary: Option<&str>,
        messages: &[Message],
    ) -> Result<String, MemoryError> {
        Ok((self.f)(previous_summary, messages))
    }
}

/// Summarizer that asks a completion service
pub struct LlmSummarizer {
    backend: Arc<dyn LLMBackend>,
    options: CompletionOptions,
}

impl LlmSummarizer {
    pub fn new(backend: Arc<dyn LLMBackend>) -> Self {
        Self {
            backend,
            options: CompletionOptions::new().with_temperature(0.0),
        }
    }

    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(
        &self,
        previous_summary: Option<&str>,
        messages: &[Message],
    ) -> Result<String, MemoryError> {
        let transcript: Vec<String> = to_llm_messages(messages)
            .iter()
            .map(|m| format!("{:?}: {}", m.role, m.content))
            .collect();
        let request = vec![
            LLMMessage::system(SUMMARIZE_PROMPT),
            LLMMessage::user(format!(
                "Current summary:\n{}\n\nNew lines of conversation:\n{}\n\nNew summary:",
                previous_summary.unwrap_or("(none)"),
                transcript.join("\n")
            )),
        ];

        let output = self
            .backend
            .infer(&request, &self.options)
            .await
            .map_err(|e| MemoryError::SummarizationFailed(e.to_string()))?;
        Ok(output.content.trim().to_string())
    }
}

/// Where a memory keeps its record
struct RecordSlot {
    store: Arc<dyn MemoryStore>,
    key: String,
}

impl RecordSlot {
    fn fresh() -> Self {
        Self {
            store: Arc::new(InMemoryStore::new()),
            key: uuid::Uuid::new_v4().to_string(),
        }
    }

    async fn read(&self) -> Result<MemoryRecord, MemoryError> {
        MemoryRecord::load(self.store.as_ref(), &self.key).await
    }

    async fn write(&self, record: MemoryRecord) -> Result<(), MemoryError> {
        record.store(self.store.as_ref(), &self.key).await
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        self.store.delete(&self.key).await
    }
}

/// Append a turn, skipping the final output if the turn already ends with it
pub fn append_turn(messages: &mut Vec<Message>, turn_messages: &[Message], final_output: &str) {
    messages.extend(turn_messages.iter().cloned());
    let already_recorded = messages
        .last()
        .map(|m| m.is_ai_with_content(final_output))
        .unwrap_or(false);
    if !already_recorded {
        messages.push(Message::ai(final_output));
    }
}

/// Drop the oldest non-system messages until at most `max_messages` remain
/// or only system messages are left
pub fn trim_buffer(messages: Vec<Message>, max_messages: usize) -> Vec<Message> {
    let mut excess = messages.len().saturating_sub(max_messages);
    messages
        .into_iter()
        .filter(|m| {
            if excess > 0 && !m.is_system() {
                excess -= 1;
                false
            } else {
                true
            }
        })
        .collect()
}

/// Keep the last `max_turns` turns, where a turn starts at a human message
pub fn trim_window(messages: Vec<Message>, max_turns: usize) -> Vec<Message> {
    let human_positions: Vec<usize> = messages
        .iter()
        .enumerate()
        .filter(|(_, m)| m.is_human())
        .map(|(i, _)| i)
        .collect();

    if human_positions.len() <= max_turns {
        return messages;
    }

    let cut = if max_turns == 0 {
        messages.len()
    } else {
        human_positions[human_positions.len() - max_turns]
    };

    messages
        .into_iter()
        .enumerate()
        .filter(|(i, m)| *i >= cut || m.is_system())
        .map(|(_, m)| m)
        .collect()
}

fn with_summary(record: MemoryRecord) -> Vec<Message> {
    let mut messages = Vec::with_capacity(record.messages.len() + 1);
    if let Some(summary) = record.summary {
        messages.push(Message::system(format!("{}{}", SUMMARY_PREFIX, summary)));
    }
    messages.extend(record.messages);
    messages
}

async fn fold_oldest(
    record: &mut MemoryRecord,
    count: usize,
    summarizer: &dyn Summarizer,
) -> Result<(), MemoryError> {
    if count == 0 {
        return Ok(());
    }
    let folded: Vec<Message> = record.messages.drain(..count).collect();
    let summary = summarizer
        .summarize(record.summary.as_deref(), &folded)
        .await?;
    debug!(folded = count, "Folded messages into summary");
    record.summary = Some(summary);
    Ok(())
}

/// Keeps at most `max_messages` messages, never dropping system messages
pub struct BufferMemory {
    slot: RecordSlot,
    max_messages: usize,
}

impl BufferMemory {
    pub fn new(max_messages: usize) -> Self {
        Self {
            slot: RecordSlot::fresh(),
            max_messages,
        }
    }

    /// Persist into `store` under `key` instead of a private in-memory map
    pub fn with_store(mut self, store: Arc<dyn MemoryStore>, key: impl Into<String>) -> Self {
        self.slot = RecordSlot {
            store,
            key: key.into(),
        };
        self
    }
}

#[async_trait]
impl Memory for BufferMemory {
    async fn load(&self) -> Result<Vec<Message>, MemoryError> {
        Ok(self.slot.read().await?.messages)
    }

    async fn save(&self, turn_messages: &[Message], final_output: &str) -> Result<(), MemoryError> {
        let mut record = self.slot.read().await?;
        append_turn(&mut record.messages, turn_messages, final_output);
        record.messages = trim_buffer(std::mem::take(&mut record.messages), self.max_messages);
        self.slot.write(record).await
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        self.slot.clear().await
    }
}

/// Keeps the last `max_turns` conversation turns plus all system messages
pub struct WindowMemory {
    slot: RecordSlot,
    max_turns: usize,
}

impl WindowMemory {
    pub fn new(max_turns: usize) -> Self {
        Self {
            slot: RecordSlot::fresh(),
            max_turns,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn MemoryStore>, key: impl Into<String>) -> Self {
        self.slot = RecordSlot {
            store,
            key: key.into(),
        };
        self
    }
}

#[async_trait]
impl Memory for WindowMemory {
    async fn load(&self) -> Result<Vec<Message>, MemoryError> {
        Ok(self.slot.read().await?.messages)
    }

    async fn save(&self, turn_messages: &[Message], final_output: &str) -> Result<(), MemoryError> {
        let mut record = self.slot.read().await?;
        append_turn(&mut record.messages, turn_messages, final_output);
        record.messages = trim_window(std::mem::take(&mut record.messages), self.max_turns);
        self.slot.write(record).await
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        self.slot.clear().await
    }
}

/// Folds the oldest half of the history into a summary once `threshold`
/// messages have accumulated
pub struct SummaryMemory {
    slot: RecordSlot,
    threshold: usize,
    summarizer: Arc<dyn Summarizer>,
}

impl SummaryMemory {
    pub fn new(threshold: usize, summarizer: Arc<dyn Summarizer>) -> Self {
        Self {
            slot: RecordSlot::fresh(),
            threshold,
            summarizer,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn MemoryStore>, key: impl Into<String>) -> Self {
        self.slot = RecordSlot {
            store,
            key: key.into(),
        };
        self
    }
}

#[async_trait]
impl Memory for SummaryMemory {
    async fn load(&self) -> Result<Vec<Message>, MemoryError> {
        Ok(with_summary(self.slot.read().await?))
    }

    async fn save(&self, turn_messages: &[Message], final_output: &str) -> Result<(), MemoryError> {
        let mut record = self.slot.read().await?;
        append_turn(&mut record.messages, turn_messages, final_output);
        if record.messages.len() >= self.threshold {
            let half = record.messages.len() / 2;
            fold_oldest(&mut record, half, self.summarizer.as_ref()).await?;
        }
        self.slot.write(record).await
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        self.slot.clear().await
    }
}

/// Keeps the most recent `recent_window` messages verbatim and summarizes
/// everything older
pub struct CombinedMemory {
    slot: RecordSlot,
    recent_window: usize,
    summarizer: Arc<dyn Summarizer>,
}

impl CombinedMemory {
    pub fn new(recent_window: usize, summarizer: Arc<dyn Summarizer>) -> Self {
        Self {
            slot: RecordSlot::fresh(),
            recent_window,
            summarizer,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn MemoryStore>, key: impl Into<String>) -> Self {
        self.slot = RecordSlot {
            store,
            key: key.into(),
        };
        self
    }
}

#[async_trait]
impl Memory for CombinedMemory {
    async fn load(&self) -> Result<Vec<Message>, MemoryError> {
        Ok(with_summary(self.slot.read().await?))
    }

    async fn save(&self, turn_messages: &[Message], final_output: &str) -> Result<(), MemoryError> {
        let mut record = self.slot.read().await?;
        append_turn(&mut record.messages, turn_messages, final_output);
        if record.messages.len() > self.recent_window {
            let older = record.messages.len() - self.recent_window;
            fold_oldest(&mut record, older, self.summarizer.as_ref()).await?;
        }
        self.slot.write(record).await
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        self.slot.clear().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_providers::{MockBackend, MockResponse};

    fn counting_summarizer() -> Arc<dyn Summarizer> {
        Arc::new(FnSummarizer::new(|previous: Option<&str>, messages: &[Message]| {
            let contents: Vec<&str> = messages.iter().map(|m| m.content()).collect();
            match previous {
                Some(prev) => format!("{} | {}", prev, contents.join(", ")),
                None => contents.join(", "),
            }
        }))
    }

    #[test]
    fn test_append_turn_dedups_trailing_ai() {
        let mut messages = Vec::new();
        append_turn(
            &mut messages,
            &[Message::human("q"), Message::ai("answer")],
            "answer",
        );
        assert_eq!(messages.len(), 2);

        append_turn(&mut messages, &[Message::human("q2")], "answer2");
        assert_eq!(messages.len(), 4);
        assert!(messages[3].is_ai_with_content("answer2"));
    }

    #[test]
    fn test_trim_buffer_keeps_system_messages() {
        let messages = vec![
            Message::system("rules"),
            Message::human("1"),
            Message::ai("2"),
            Message::system("more rules"),
            Message::human("3"),
            Message::ai("4"),
        ];

        let trimmed = trim_buffer(messages, 3);
        assert_eq!(
            trimmed,
            vec![
                Message::system("rules"),
                Message::system("more rules"),
                Message::ai("4"),
            ]
        );
    }

    #[test]
    fn test_trim_buffer_only_system_left() {
        let messages = vec![
            Message::system("a"),
            Message::system("b"),
            Message::human("x"),
        ];
        let trimmed = trim_buffer(messages, 1);
        assert_eq!(trimmed, vec![Message::system("a"), Message::system("b")]);
    }

    #[test]
    fn test_trim_window_keeps_last_turns() {
        let messages = vec![
            Message::system("rules"),
            Message::human("q1"),
            Message::ai("a1"),
            Message::human("q2"),
            Message::ai("a2"),
            Message::human("q3"),
            Message::ai("a3"),
        ];

        let trimmed = trim_window(messages, 2);
        assert_eq!(
            trimmed,
            vec![
                Message::system("rules"),
                Message::human("q2"),
                Message::ai("a2"),
                Message::human("q3"),
                Message::ai("a3"),
            ]
        );
    }

    #[tokio::test]
    async fn test_buffer_memory_save_and_load() {
        let memory = BufferMemory::new(4);
        memory.save(&[Message::human("one")], "1").await.unwrap();
        memory.save(&[Message::human("two")], "2").await.unwrap();
        memory.save(&[Message::human("three")], "3").await.unwrap();

        let loaded = memory.load().await.unwrap();
        assert_eq!(loaded.len(), 4);
        assert_eq!(loaded[0], Message::human("two"));

        memory.clear().await.unwrap();
        assert!(memory.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_window_memory_turns() {
        let memory = WindowMemory::new(1);
        memory.save(&[Message::human("a")], "A").await.unwrap();
        memory.save(&[Message::human("b")], "B").await.unwrap();

        let loaded = memory.load().await.unwrap();
        assert_eq!(loaded, vec![Message::human("b"), Message::ai("B")]);
    }

    #[tokio::test]
    async fn test_summary_memory_folds_oldest_half() {
        let memory = SummaryMemory::new(4, counting_summarizer());
        memory.save(&[Message::human("q1")], "a1").await.unwrap();

        // Below threshold: no summary yet
        assert_eq!(memory.load().await.unwrap().len(), 2);

        memory.save(&[Message::human("q2")], "a2").await.unwrap();
        let loaded = memory.load().await.unwrap();
        assert_eq!(
            loaded,
            vec![
                Message::system("Summary of earlier conversation: q1, a1"),
                Message::human("q2"),
                Message::ai("a2"),
            ]
        );
    }

    #[tokio::test]
    async fn test_combined_memory_keeps_recent_window() {
        let memory = CombinedMemory::new(2, counting_summarizer());
        memory.save(&[Message::human("q1")], "a1").await.unwrap();
        memory.save(&[Message::human("q2")], "a2").await.unwrap();
        memory.save(&[Message::human("q3")], "a3").await.unwrap();

        let loaded = memory.load().await.unwrap();
        assert_eq!(
            loaded,
            vec![
                Message::system("Summary of earlier conversation: q1, a1 | q2, a2"),
                Message::human("q3"),
                Message::ai("a3"),
            ]
        );
    }

    #[tokio::test]
    async fn test_shared_store_key() {
        let store: Arc<dyn MemoryStore> = Arc::new(InMemoryStore::new());
        let writer = BufferMemory::new(10).with_store(store.clone(), "session-1");
        writer.save(&[Message::human("hi")], "hello").await.unwrap();

        let reader = BufferMemory::new(10).with_store(store, "session-1");
        assert_eq!(reader.load().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_llm_summarizer_uses_backend() {
        let backend = Arc::new(MockBackend::new().with_response(MockResponse::text("  user said hi  ")));
        let summarizer = LlmSummarizer::new(backend.clone());

        let summary = summarizer
            .summarize(Some("earlier"), &[Message::human("hi")])
            .await
            .unwrap();

        assert_eq!(summary, "user said hi");
        let call = backend.last_call().unwrap();
        assert!(call.messages[1].content.contains("earlier"));
        assert!(call.messages[1].content.contains("hi"));
    }

    #[tokio::test]
    async fn test_llm_summarizer_error() {
        let backend = Arc::new(MockBackend::new().with_response(MockResponse::error("down")));
        let summarizer = LlmSummarizer::new(backend);

        let err = summarizer.summarize(None, &[]).await.unwrap_err();
        assert!(matches!(err, MemoryError::SummarizationFailed(_)));
    }
}
