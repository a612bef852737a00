//! CandidateExtractor: per-chapter name candidate detection
//!
//! Three rule families run over each chapter:
//! - **surname**: Aho-Corasick over the surname lexicon, each hit extended by
//!   the ideographs that follow it, then clipped back to a shorter form the
//!   chapter confirms elsewhere
//! - **speaker**: regex rules around speech-attribution verbs
//! - **address**: regex rules around honorifics, diminutives and kinship
//!
//! Names proposed by an optional [`SuggestionClient`] are located in the text
//! as a fourth family. Overlapping matches are reduced so that one textual
//! mention yields at most one [`RawOccurrence`].

use std::collections::HashSet;

use aho_corasick::{AhoCorasickBuilder, MatchKind};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use unicode_segmentation::UnicodeSegmentation;

use super::suggestion::SuggestionClient;
use crate::config::AnalysisConfig;
use crate::model::{ChapterContext, ExtractionMethod, RawOccurrence};
use crate::rules::CompiledRules;

// =============================================================================
// Types
// =============================================================================

/// Phase-one output for a single chapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterExtraction {
    pub chapter_id: String,
    pub ordinal: u32,
    /// Sorted by position in the chapter
    pub occurrences: Vec<RawOccurrence>,
    /// The suggestion service was configured but failed for this chapter
    pub degraded: bool,
    pub warnings: Vec<String>,
}

/// A matched byte span before it becomes an occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    start: usize,
    end: usize,
    method: ExtractionMethod,
    /// Rule order; lower wins ties
    rank: usize,
    /// The span ended at a boundary. Surname spans that ran out of length
    /// budget are open and may be clipped to a confirmed prefix.
    closed: bool,
}

impl Span {
    fn len(&self) -> usize {
        self.end - self.start
    }
}

const SURNAME_RANK: usize = 0;
const SERVICE_RANK: usize = usize::MAX;

/// Given names run 1-3 ideographs after the surname
const MAX_GIVEN_NAME_CHARS: usize = 3;

pub(crate) fn is_han(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{20000}'..='\u{2A6DF}'
        | '\u{2A700}'..='\u{2EBEF}')
}

// =============================================================================
// CandidateExtractor
// =============================================================================

/// Stateless per-chapter extractor; shared by reference across workers
pub struct CandidateExtractor<'a> {
    rules: &'a CompiledRules,
    config: &'a AnalysisConfig,
    exclude: HashSet<&'a str>,
    suggestion: Option<&'a SuggestionClient>,
}

impl<'a> CandidateExtractor<'a> {
    pub fn new(rules: &'a CompiledRules, config: &'a AnalysisConfig) -> Self {
        Self {
            rules,
            config,
            exclude: config.exclude_words.iter().map(String::as_str).collect(),
            suggestion: None,
        }
    }

    /// Builder: consult a suggestion service for every chapter
    pub fn with_suggestion(mut self, client: &'a SuggestionClient) -> Self {
        self.suggestion = Some(client);
        self
    }

    /// Extract every name candidate from one chapter
    pub fn extract(&self, chapter: &ChapterContext) -> ChapterExtraction {
        let text = chapter.text.as_str();
        let mut spans = self.rule_spans(text);

        let mut degraded = false;
        let mut warnings = Vec::new();
        if let Some(client) = self.suggestion {
            match client.suggest_names(chapter) {
                Ok(names) => spans.extend(self.service_spans(text, &names)),
                Err(err) => {
                    warn!(
                        chapter = %chapter.id,
                        error = %err,
                        "falling back to pattern-only extraction"
                    );
                    degraded = true;
                    warnings.push(format!("suggestion service failed: {err}"));
                }
            }
        }

        let mut surname = self.surname_spans(text);
        let confirmed: HashSet<&str> = spans
            .iter()
            .chain(surname.iter())
            .filter(|span| span.closed)
            .map(|span| &text[span.start..span.end])
            .filter(|surface| self.is_valid_name(surface))
            .collect();
        for span in &mut surname {
            clip_to_confirmed(text, span, &confirmed);
        }
        spans.extend(surname);

        spans.retain(|span| self.is_valid_name(&text[span.start..span.end]));
        let kept = drop_contained(spans);

        let line_starts = line_starts(text);
        let occurrences: Vec<RawOccurrence> = kept
            .into_iter()
            .map(|span| RawOccurrence {
                surface: text[span.start..span.end].to_string(),
                chapter_id: chapter.id.clone(),
                chapter_ordinal: chapter.ordinal,
                line_ref: line_of(&line_starts, span.start),
                offset: span.start,
                context_window: context_window(
                    text,
                    span.start,
                    span.end,
                    self.config.context_radius,
                ),
                method: span.method,
            })
            .collect();

        debug!(
            chapter = %chapter.id,
            occurrences = occurrences.len(),
            degraded,
            "chapter extracted"
        );

        ChapterExtraction {
            chapter_id: chapter.id.clone(),
            ordinal: chapter.ordinal,
            occurrences,
            degraded,
            warnings,
        }
    }

    /// Candidate post-filter: length bounds, stop-list, name shape
    pub fn is_valid_name(&self, surface: &str) -> bool {
        let len = surface.graphemes(true).count();
        if len < self.config.min_name_length || len > self.config.max_name_length {
            return false;
        }
        if self.exclude.contains(surface) {
            return false;
        }
        self.rules.starts_with_surname(surface) || surface.chars().all(is_han)
    }

    // =========================================================================
    // Rule Families
    // =========================================================================

    fn surname_spans(&self, text: &str) -> Vec<Span> {
        let mut spans = Vec::new();
        let mut consumed = 0;

        for mat in self.rules.surname_matcher().find_iter(text) {
            if mat.start() < consumed {
                continue;
            }
            let surname_chars = text[mat.start()..mat.end()].chars().count();
            let budget = self
                .config
                .max_name_length
                .saturating_sub(surname_chars)
                .min(MAX_GIVEN_NAME_CHARS);

            let mut end = mat.end();
            let mut taken = 0;
            for c in text[mat.end()..].chars() {
                if !is_han(c) || self.rules.is_name_boundary(c) || taken == budget {
                    break;
                }
                end += c.len_utf8();
                taken += 1;
            }
            let closed = text[end..]
                .chars()
                .next()
                .map_or(true, |c| !is_han(c) || self.rules.is_name_boundary(c));

            if end > mat.end() {
                spans.push(Span {
                    start: mat.start(),
                    end,
                    method: ExtractionMethod::Surname,
                    rank: SURNAME_RANK,
                    closed,
                });
                consumed = end;
            }
        }

        spans
    }

    fn rule_spans(&self, text: &str) -> Vec<Span> {
        let mut spans = Vec::new();

        for (index, rule) in self.rules.extraction_rules().iter().enumerate() {
            let mut pos = 0;
            while pos <= text.len() {
                let Some(caps) = rule.regex.captures_at(text, pos) else {
                    break;
                };
                let Some(whole) = caps.get(0) else {
                    break;
                };
                // Resume at the end of the name so a boundary character the
                // match consumed can open the next match.
                let mut next = next_char_boundary(text, whole.start());
                if let Some(name) = caps.get(rule.group) {
                    if !name.is_empty() {
                        spans.push(Span {
                            start: name.start(),
                            end: name.end(),
                            method: rule.method,
                            rank: index + 1,
                            closed: true,
                        });
                        next = next.max(name.end());
                    }
                }
                pos = next;
            }
        }

        spans
    }

    fn service_spans(&self, text: &str, names: &[String]) -> Vec<Span> {
        let names: Vec<&String> = names.iter().filter(|n| self.is_valid_name(n)).collect();
        if names.is_empty() {
            return Vec::new();
        }

        let matcher = match AhoCorasickBuilder::new()
            .match_kind(MatchKind::LeftmostLongest)
            .build(&names)
        {
            Ok(matcher) => matcher,
            Err(err) => {
                warn!(error = %err, "could not index suggested names");
                return Vec::new();
            }
        };

        matcher
            .find_iter(text)
            .map(|mat| Span {
                start: mat.start(),
                end: mat.end(),
                method: ExtractionMethod::Service,
                rank: SERVICE_RANK,
                closed: true,
            })
            .collect()
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Keep the longest span at each position and drop spans inside kept ones
fn drop_contained(mut spans: Vec<Span>) -> Vec<Span> {
    spans.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then_with(|| b.len().cmp(&a.len()))
            .then_with(|| a.rank.cmp(&b.rank))
    });

    let mut kept: Vec<Span> = Vec::with_capacity(spans.len());
    let mut reach = 0;
    for span in spans {
        if !kept.is_empty() && span.end <= reach {
            continue;
        }
        reach = reach.max(span.end);
        kept.push(span);
    }
    kept
}

/// Shorten a surname span to its longest proper prefix that the chapter
/// confirms elsewhere, so "莫凡点点" falls back to "莫凡"
fn clip_to_confirmed(text: &str, span: &mut Span, confirmed: &HashSet<&str>) {
    let surface = &text[span.start..span.end];
    let clipped = surface
        .char_indices()
        .filter(|&(i, _)| i > 0)
        .map(|(i, _)| span.start + i)
        .rev()
        .find(|&end| confirmed.contains(&text[span.start..end]));
    if let Some(end) = clipped {
        span.end = end;
    }
}

fn next_char_boundary(text: &str, at: usize) -> usize {
    text[at..].chars().next().map_or(at + 1, |c| at + c.len_utf8())
}

/// Byte offsets at which each line starts
fn line_starts(text: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(text.match_indices('\n').map(|(i, _)| i + 1))
        .collect()
}

/// 1-based line number of `offset`
fn line_of(line_starts: &[usize], offset: usize) -> usize {
    line_starts.partition_point(|&start| start <= offset).max(1)
}

/// Up to `radius` characters on either side of `[start, end)`
fn context_window(text: &str, start: usize, end: usize, radius: usize) -> String {
    let from = text[..start]
        .char_indices()
        .rev()
        .take(radius)
        .last()
        .map_or(start, |(i, _)| i);
    let to = text[end..]
        .char_indices()
        .nth(radius)
        .map_or(text.len(), |(i, _)| end + i);
    text[from..to].to_string()
}

// =============================================================================
// Tests
// =============================================================================
