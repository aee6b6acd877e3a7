//! Built-in summarization workflow, registered at startup.
//!
//! `split_text -> summarize_chunks -> merge_summaries -> refine_summary -> check_length_loop`,
//! with `check_length_loop -> refine_summary` while the summary is still too long and
//! refinement passes remain. Chunk summaries are extractive: the sentence whose words
//! are most frequent in the chunk wins, cut to a fixed word budget.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::json;
use workgraph::{Edge, GraphDefinition, NodeError, NodeRegistry, RegistryError, WorkflowState};

pub const SPLIT_TEXT: &str = "split_text";
pub const SUMMARIZE_CHUNKS: &str = "summarize_chunks";
pub const MERGE_SUMMARIES: &str = "merge_summaries";
pub const REFINE_SUMMARY: &str = "refine_summary";
pub const CHECK_LENGTH_LOOP: &str = "check_length_loop";
/// Edge condition guarding the refinement loop.
pub const NEEDS_REFINEMENT: &str = "needs_refinement";

/// Words kept from the chosen sentence of each chunk.
const MAX_SUMMARY_WORDS: usize = 16;
/// Fallback cut for chunks too short to split into sentences.
const SHORT_TEXT_CHARS: usize = 50;
/// Sentences shorter than this many words are dropped during refinement.
const MIN_REFINED_WORDS: usize = 4;

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as", "is", "was", "are", "were", "been", "be", "have", "has", "had", "do", "does",
    "did", "will", "would", "could", "should", "may", "might", "must", "can", "this", "that",
    "these", "those", "i", "you", "he", "she", "it", "we", "they", "what", "which", "who",
    "when", "where", "why", "how", "all", "each", "every", "both", "few", "more", "most",
    "other", "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than", "too",
    "very", "just", "also", "into", "through", "during", "before", "after", "above", "below",
    "between", "under", "again", "further", "then", "once", "here", "there", "any", "their",
    "them", "about", "against", "because", "being", "down", "off", "over", "up", "out",
    "until", "while", "your",
];

/// Registers the five nodes and the loop condition.
pub fn register(registry: &mut NodeRegistry) -> Result<(), RegistryError> {
    registry
        .register_fn(SPLIT_TEXT, split_text)?
        .register_fn(SUMMARIZE_CHUNKS, summarize_chunks)?
        .register_fn(MERGE_SUMMARIES, merge_summaries)?
        .register_fn(REFINE_SUMMARY, refine_summary)?
        .register_fn(CHECK_LENGTH_LOOP, check_length_loop)?
        .register_condition(NEEDS_REFINEMENT, needs_refinement)?;
    tracing::info!("registered summarization nodes");
    Ok(())
}

pub fn definition() -> GraphDefinition {
    let mut def = GraphDefinition::new(SPLIT_TEXT);
    for node in [
        SPLIT_TEXT,
        SUMMARIZE_CHUNKS,
        MERGE_SUMMARIES,
        REFINE_SUMMARY,
        CHECK_LENGTH_LOOP,
    ] {
        def.add_node(node);
    }
    def.add_edge(SPLIT_TEXT, SUMMARIZE_CHUNKS)
        .add_edge(SUMMARIZE_CHUNKS, MERGE_SUMMARIES)
        .add_edge(MERGE_SUMMARIES, REFINE_SUMMARY)
        .add_edge(REFINE_SUMMARY, CHECK_LENGTH_LOOP)
        .add_edge(CHECK_LENGTH_LOOP, Edge::when(REFINE_SUMMARY, NEEDS_REFINEMENT));
    def
}

/// Greedy word packing into chunks of at most `chunk_size` characters (one oversized word per chunk allowed).
fn split_text(state: &WorkflowState) -> Result<WorkflowState, NodeError> {
    let text = state.text.trim();
    if text.is_empty() {
        tracing::warn!("empty text provided to split_text");
        return Ok(WorkflowState {
            chunks: Vec::new(),
            ..state.clone()
        });
    }

    let limit = to_len(state.chunk_size);
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0;
    for word in text.split_whitespace() {
        let word_len = word.chars().count() + 1;
        if current_len + word_len > limit && !current.is_empty() {
            chunks.push(current.join(" "));
            current.clear();
            current_len = 0;
        }
        current.push(word);
        current_len += word_len;
    }
    if !current.is_empty() {
        chunks.push(current.join(" "));
    }

    tracing::info!(chunks = chunks.len(), "split text");
    Ok(WorkflowState {
        execution_metadata: state.metadata_with("chunks_created", json!(chunks.len())),
        chunks,
        ..state.clone()
    })
}

fn summarize_chunks(state: &WorkflowState) -> Result<WorkflowState, NodeError> {
    if state.chunks.is_empty() {
        tracing::warn!("no chunks available for summarization");
        return Ok(WorkflowState {
            chunk_summaries: Vec::new(),
            ..state.clone()
        });
    }

    let summaries: Vec<String> = state
        .chunks
        .iter()
        .map(|chunk| frequency_summary(chunk))
        .collect();
    tracing::info!(summaries = summaries.len(), "summarized chunks");

    let mut metadata = state.metadata_with("summaries_created", json!(summaries.len()));
    metadata.insert(
        "summarization_method".to_string(),
        json!("frequency_based_scoring"),
    );
    Ok(WorkflowState {
        chunk_summaries: summaries,
        execution_metadata: metadata,
        ..state.clone()
    })
}

fn merge_summaries(state: &WorkflowState) -> Result<WorkflowState, NodeError> {
    if state.chunk_summaries.is_empty() {
        tracing::warn!("no summaries available to merge");
        return Ok(WorkflowState {
            merged_summary: String::new(),
            current_length: 0,
            ..state.clone()
        });
    }

    let parts: Vec<&str> = state
        .chunk_summaries
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.trim_end_matches('.'))
        .collect();
    let merged = format!("{}.", parts.join(". "));
    let length = merged.chars().count();
    tracing::info!(length, "merged summaries");

    Ok(WorkflowState {
        refined_summary: merged.clone(),
        merged_summary: merged,
        current_length: length as i64,
        execution_metadata: state.metadata_with("merged_length", json!(length)),
        ..state.clone()
    })
}

/// Keeps whole sentences of at least four words while they fit in `max_length`.
fn refine_summary(state: &WorkflowState) -> Result<WorkflowState, NodeError> {
    let source = if state.merged_summary.is_empty() {
        state.text.as_str()
    } else {
        state.merged_summary.as_str()
    };
    let max_len = to_len(state.max_length);

    let normalized = source.replace("..", ".");
    let mut refined = String::new();
    for sentence in normalized
        .split('.')
        .map(str::trim)
        .filter(|p| p.split_whitespace().count() >= MIN_REFINED_WORDS)
    {
        if refined.chars().count() + sentence.chars().count() + 2 > max_len {
            break;
        }
        if !refined.is_empty() {
            refined.push(' ');
        }
        refined.push_str(sentence);
    }
    if refined.chars().count() > max_len {
        refined = truncate_at_word(&refined, max_len);
    }

    let summary = format!("{refined}.");
    let new_length = summary.chars().count();
    let reduction = normalized.chars().count() as i64 - new_length as i64;
    let iteration = state.refinement_iterations + 1;
    tracing::info!(iteration, new_length, target = max_len, reduction, "refined summary");

    let mut metadata = state.metadata_with(format!("refinement_{iteration}_length"), json!(new_length));
    metadata.insert(
        format!("refinement_{iteration}_reduction"),
        json!(reduction),
    );
    Ok(WorkflowState {
        refined_summary: summary,
        current_length: new_length as i64,
        refinement_iterations: iteration,
        execution_metadata: metadata,
        ..state.clone()
    })
}

/// Pass-through; the loop decision lives on the outgoing edge's condition.
fn check_length_loop(state: &WorkflowState) -> Result<WorkflowState, NodeError> {
    tracing::info!(
        current = state.current_length,
        max = state.max_length,
        iterations = state.refinement_iterations,
        should_loop = needs_refinement(state),
        "length check"
    );
    Ok(state.clone())
}

fn needs_refinement(state: &WorkflowState) -> bool {
    state.current_length > state.max_length
        && state.refinement_iterations < state.max_refinement_iterations
}

fn frequency_summary(text: &str) -> String {
    if text.chars().count() < 10 {
        return take_chars(text, SHORT_TEXT_CHARS);
    }
    let sentences = extract_sentences(text);
    match sentences.as_slice() {
        [] => take_chars(text, SHORT_TEXT_CHARS),
        [only] => compress(only, MAX_SUMMARY_WORDS),
        _ => {
            let freq = word_frequencies(text);
            let mut best = sentences[0];
            let mut best_score = score_sentence(best, &freq);
            for sentence in &sentences[1..] {
                let score = score_sentence(sentence, &freq);
                if score > best_score {
                    best = sentence;
                    best_score = score;
                }
            }
            tracing::debug!(score = best_score, "selected sentence");
            compress(best, MAX_SUMMARY_WORDS)
        }
    }
}

fn sentence_break() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?]+").expect("valid sentence pattern"))
}

fn word_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[a-zA-Z]{3,}\b").expect("valid word pattern"))
}

fn extract_sentences(text: &str) -> Vec<&str> {
    sentence_break()
        .split(text)
        .map(str::trim)
        .filter(|s| s.chars().count() > 5)
        .collect()
}

fn words_of(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    word_pattern()
        .find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn word_frequencies(text: &str) -> HashMap<String, usize> {
    let mut freq = HashMap::new();
    for word in words_of(text) {
        if !STOPWORDS.contains(&word.as_str()) {
            *freq.entry(word).or_insert(0) += 1;
        }
    }
    freq
}

/// Mean corpus frequency of the sentence's words.
fn score_sentence(sentence: &str, freq: &HashMap<String, usize>) -> f64 {
    let words = words_of(sentence);
    if words.is_empty() {
        return 0.0;
    }
    let total: usize = words.iter().map(|w| freq.get(w).copied().unwrap_or(0)).sum();
    total as f64 / words.len() as f64
}

fn compress(sentence: &str, max_words: usize) -> String {
    let words: Vec<&str> = sentence.split_whitespace().collect();
    if words.len() <= max_words {
        return sentence.trim().to_string();
    }
    words[..max_words].join(" ")
}

fn take_chars(text: &str, n: usize) -> String {
    text.chars().take(n).collect()
}

/// First `max` chars, then back to the last space if there is one.
fn truncate_at_word(text: &str, max: usize) -> String {
    let head = take_chars(text, max);
    match head.rfind(' ') {
        Some(idx) => head[..idx].to_string(),
        None => head,
    }
}

fn to_len(value: i64) -> usize {
    usize::try_from(value).unwrap_or(0)
}
