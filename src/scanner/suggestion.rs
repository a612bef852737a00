//! Optional name suggestion service
//!
//! A language-model backend can propose person names for a chapter. The
//! backend is injected behind [`SuggestionService`]; [`SuggestionClient`]
//! wraps it with a per-call timeout, a retry budget and response parsing.
//! Failures never escape phase one: the caller falls back to pattern-only
//! extraction and marks the chapter degraded.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::SuggestionConfig;
use crate::error::ServiceError;
use crate::model::ChapterContext;

// =============================================================================
// Service Seam
// =============================================================================

/// Request/response capability: prompt in, free text out
///
/// Calls run on helper threads. A call that overruns the client timeout is
/// abandoned but its thread stays inside `complete` until the backend
/// returns, so implementations should enforce their own I/O deadline. The
/// client refuses new calls while `max_pending_calls` are still running.
pub trait SuggestionService: Send + Sync {
    fn complete(&self, prompt: &str) -> Result<String, ServiceError>;
}

/// Markers after which a reasoning model states its final answer
const ANSWER_MARKERS: &[&str] = &["最终答案：", "结论：", "人物名称：", "提取结果：", "答案："];

/// Lines that mean "nothing found"
const EMPTY_ANSWERS: &[&str] = &["无", "没有"];

const PROMPT_HEADER: &str = "请从以下中文小说文本中提取所有人物姓名。

要求：
1. 只提取人物姓名，不要提取代词、称谓或地名
2. 每行一个人名，不要添加其他内容
3. 同一人物有多个称呼时，只返回最正式的姓名

文本：
";

const PROMPT_FOOTER: &str = "\n\n人物名称：";

// =============================================================================
// SuggestionClient
// =============================================================================

/// Timeout- and retry-bounded wrapper around a [`SuggestionService`]
#[derive(Clone)]
pub struct SuggestionClient {
    service: Arc<dyn SuggestionService>,
    timeout: Duration,
    max_retries: u32,
    prompt_char_budget: usize,
    max_suggestion_length: usize,
    /// Calls still running, abandoned ones included; shared by clones
    pending: Arc<AtomicUsize>,
    max_pending: usize,
}

impl std::fmt::Debug for SuggestionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuggestionClient")
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("prompt_char_budget", &self.prompt_char_budget)
            .field("pending", &self.pending.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl SuggestionClient {
    pub fn new(service: Arc<dyn SuggestionService>, config: &SuggestionConfig) -> Self {
        Self {
            service,
            timeout: Duration::from_millis(config.timeout_ms),
            max_retries: config.max_retries,
            prompt_char_budget: config.prompt_char_budget,
            max_suggestion_length: config.max_suggestion_length,
            pending: Arc::new(AtomicUsize::new(0)),
            max_pending: config.max_pending_calls,
        }
    }

    /// Calls currently running on helper threads
    pub fn pending_calls(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Ask the service for names in `chapter`
    ///
    /// Makes at most `1 + max_retries` attempts and returns the last error
    /// once the budget is spent.
    pub fn suggest_names(&self, chapter: &ChapterContext) -> Result<Vec<String>, ServiceError> {
        let prompt = self.build_prompt(&chapter.text);
        let mut last_error = ServiceError::Disconnected;

        for attempt in 1..=self.max_retries.saturating_add(1) {
            match self.call_with_timeout(&prompt) {
                Ok(response) => {
                    let names = parse_name_list(&response, self.max_suggestion_length);
                    debug!(
                        chapter = %chapter.id,
                        attempt,
                        names = names.len(),
                        "suggestion service answered"
                    );
                    return Ok(names);
                }
                Err(err) => {
                    warn!(chapter = %chapter.id, attempt, error = %err, "suggestion call failed");
                    last_error = err;
                }
            }
        }

        Err(last_error)
    }

    /// Chapter text cut to the character budget, wrapped in the instruction
    pub fn build_prompt(&self, text: &str) -> String {
        let cut = text
            .char_indices()
            .nth(self.prompt_char_budget)
            .map_or(text.len(), |(i, _)| i);
        format!("{PROMPT_HEADER}{}{PROMPT_FOOTER}", &text[..cut])
    }

    /// Run one call on a helper thread and wait at most `timeout`
    ///
    /// A call that overruns is abandoned; its thread finishes on its own and
    /// the late answer is discarded with the channel. No thread is spawned
    /// while `max_pending` calls are still running.
    fn call_with_timeout(&self, prompt: &str) -> Result<String, ServiceError> {
        if self.pending.fetch_add(1, Ordering::SeqCst) >= self.max_pending {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(ServiceError::Unavailable(format!(
                "{} calls still pending",
                self.max_pending
            )));
        }

        let (tx, rx) = mpsc::channel();
        let service = Arc::clone(&self.service);
        let pending = Arc::clone(&self.pending);
        let prompt = prompt.to_string();

        thread::spawn(move || {
            let result = service.complete(&prompt);
            pending.fetch_sub(1, Ordering::SeqCst);
            let _ = tx.send(result);
        });

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(ServiceError::Timeout(self.timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(ServiceError::Disconnected),
        }
    }
}

// =============================================================================
// Response Parsing
// =============================================================================

/// Drop everything up to the first answer marker, if any
fn answer_section(response: &str) -> &str {
    ANSWER_MARKERS
        .iter()
        .filter_map(|marker| response.find(marker).map(|at| (at, marker.len())))
        .min_by_key(|(at, _)| *at)
        .map_or(response, |(at, len)| &response[at + len..])
}

/// Strip "1." / "2、" / "(3)" numbering and bullets from the front of a line
fn strip_list_prefix(line: &str) -> &str {
    let line = line.trim_start_matches(|c: char| c.is_ascii_digit());
    let line = line.trim_start_matches(['.', '、', ')', '）', '(', '（']);
    line.trim_start_matches(['•', '·', '-', '*', '●']).trim()
}

fn is_edge_punctuation(c: char) -> bool {
    c.is_whitespace()
        || c.is_ascii_punctuation()
        || "，。、；：！？“”‘’「」『』（）《》【】…—".contains(c)
}

/// Parse a free-text answer into an ordered, de-duplicated name list
pub fn parse_name_list(response: &str, max_len: usize) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();

    for line in answer_section(response).lines() {
        let name = strip_list_prefix(line.trim()).trim_matches(is_edge_punctuation);
        if name.is_empty() || EMPTY_ANSWERS.contains(&name) {
            continue;
        }
        if name.chars().count() > max_len {
            continue;
        }
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }

    names
}

// =============================================================================
// Tests
// =============================================================================
