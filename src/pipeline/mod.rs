//! CastPipeline: end-to-end cast analysis
//!
//! ```text
//! validate → phase one (parallel, per chapter) → phase two (sequential)
//!              CandidateExtractor                 AliasResolver
//!                                                 AttributeInferencer
//!                                                 DialogueIndex
//!                                                 RelationshipEngine
//!                                                 Aggregator
//! ```
//!
//! Phase one fans out over chapters with rayon; each worker reads only its
//! own chapter and owns its output. Phase two runs on the calling thread over
//! the occurrence stream in (chapter ordinal, line, offset) order, so results
//! do not depend on worker scheduling.
//!
//! # Usage
//!
//! ```rust,ignore
//! let pipeline = CastPipeline::new(AnalysisConfig::default())?;
//! let model = pipeline.analyze(&chapters)?;
//! for profile in model.ranked() {
//!     println!("{} {:?}", profile.character.canonical_name, profile.role);
//! }
//! ```


use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::aggregate::{Aggregator, CastModel, WarningSummary};
use crate::analysis::{AttributeInferencer, DialogueIndex};
use crate::config::AnalysisConfig;
use crate::error::{CastError, Result};
use crate::model::{ChapterContext, RawOccurrence};
use crate::relation::RelationshipEngine;
use crate::resolver::AliasResolver;
use crate::rules::{CompiledRules, RuleSet};
use crate::scanner::{CandidateExtractor, ChapterExtraction, SuggestionClient, SuggestionService};

// =============================================================================
// Types
// =============================================================================

/// Phase timings in microseconds
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineTimings {
    pub total_us: u64,
    pub extraction_us: u64,
    pub resolution_us: u64,
    pub attributes_us: u64,
    pub relation_us: u64,
    pub aggregate_us: u64,
}

/// Counters for one run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineStats {
    pub timings: PipelineTimings,
    pub chapters: usize,
    pub occurrences: usize,
    pub characters: usize,
    pub relationships: usize,
    pub degraded_chapters: usize,
    /// Explicit relation matches dropped for unresolved slots
    pub dropped_explicit: usize,
}

/// JSON input envelope: `{"chapters": [...]}`
#[derive(Debug, Deserialize)]
struct ChapterEnvelope {
    chapters: Vec<ChapterContext>,
}

// =============================================================================
// CastPipeline
// =============================================================================

pub struct CastPipeline {
    config: AnalysisConfig,
    rules: CompiledRules,
    suggestion: Option<SuggestionClient>,
}

impl CastPipeline {
    /// Pipeline with the built-in Chinese rule tables
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        Self::with_rules(config, &RuleSet::default())
    }

    /// Pipeline with custom rule tables
    pub fn with_rules(config: AnalysisConfig, rules: &RuleSet) -> Result<Self> {
        config.validate()?;
        let rules = rules.compile()?;
        Ok(Self {
            config,
            rules,
            suggestion: None,
        })
    }

    /// Builder: consult a name suggestion service during extraction
    pub fn with_suggestion_service(mut self, service: Arc<dyn SuggestionService>) -> Self {
        self.suggestion = Some(SuggestionClient::new(service, &self.config.suggestion));
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn analyze(&self, chapters: &[ChapterContext]) -> Result<CastModel> {
        self.analyze_with_stats(chapters).map(|(model, _)| model)
    }

    /// Parse `{"chapters": [...]}` and analyze it
    pub fn analyze_json(&self, json: &str) -> Result<CastModel> {
        let envelope: ChapterEnvelope = serde_json::from_str(json)?;
        self.analyze(&envelope.chapters)
    }

    /// Like [`analyze`](Self::analyze), but gives up with
    /// [`CastError::Cancelled`] if `cancel` is set before extraction starts
    pub fn analyze_cancellable(
        &self,
        chapters: &[ChapterContext],
        cancel: &AtomicBool,
    ) -> Result<CastModel> {
        self.run(chapters, Some(cancel)).map(|(model, _)| model)
    }

    pub fn analyze_with_stats(
        &self,
        chapters: &[ChapterContext],
    ) -> Result<(CastModel, PipelineStats)> {
        self.run(chapters, None)
    }

    fn run(
        &self,
        chapters: &[ChapterContext],
        cancel: Option<&AtomicBool>,
    ) -> Result<(CastModel, PipelineStats)> {
        let overall_start = instant::Instant::now();
        let mut stats = PipelineStats {
            chapters: chapters.len(),
            ..PipelineStats::default()
        };

        validate_chapters(chapters)?;
        if cancel.is_some_and(|flag| flag.load(Ordering::SeqCst)) {
            info!("analysis cancelled before extraction");
            return Err(CastError::Cancelled);
        }

        // Phase one: per-chapter extraction
        info!(chapters = chapters.len(), "phase one: extracting candidates");
        let extraction_start = instant::Instant::now();
        let mut extractions = self.extract_all(chapters);
        extractions.sort_by_key(|e| e.ordinal);
        stats.timings.extraction_us = extraction_start.elapsed().as_micros() as u64;

        let mut warnings = WarningSummary::default();
        let mut occurrences: Vec<RawOccurrence> = Vec::new();
        for extraction in extractions {
            if extraction.degraded {
                warnings.degraded_chapters.push(extraction.chapter_id.clone());
            }
            if !extraction.warnings.is_empty() {
                warnings
                    .chapter_warnings
                    .insert(extraction.chapter_id.clone(), extraction.warnings.len());
            }
            occurrences.extend(extraction.occurrences);
        }
        occurrences.sort_by_key(RawOccurrence::order_key);
        stats.occurrences = occurrences.len();
        stats.degraded_chapters = warnings.degraded_chapters.len();

        // Phase two: resolve, infer, relate, aggregate
        info!(occurrences = occurrences.len(), "phase two: resolving aliases");
        let resolution_start = instant::Instant::now();
        let mut resolution = AliasResolver::new(&self.config, &self.rules).resolve(&occurrences);
        stats.timings.resolution_us = resolution_start.elapsed().as_micros() as u64;

        let attributes_start = instant::Instant::now();
        let inferencer = AttributeInferencer::new(&self.rules);
        for character in &mut resolution.characters {
            inferencer.apply(character, &occurrences);
        }
        let dialogue = DialogueIndex::build(chapters, &resolution);
        stats.timings.attributes_us = attributes_start.elapsed().as_micros() as u64;
        debug!(speaking_lines = dialogue.len(), "dialogue attributed");

        let relation_start = instant::Instant::now();
        let relations = RelationshipEngine::new(&self.config, &self.rules)
            .build(chapters, &occurrences, &resolution);
        stats.timings.relation_us = relation_start.elapsed().as_micros() as u64;
        stats.dropped_explicit = relations.dropped_explicit;

        let aggregate_start = instant::Instant::now();
        warnings.alias_conflicts = std::mem::take(&mut resolution.conflicts);
        let model = Aggregator::new(&self.config).assemble(
            chapters.len(),
            std::mem::take(&mut resolution.characters),
            &occurrences,
            &dialogue,
            relations.relationships,
            warnings,
        );
        stats.timings.aggregate_us = aggregate_start.elapsed().as_micros() as u64;

        stats.characters = model.characters.len();
        stats.relationships = model.relationships.len();
        stats.timings.total_us = overall_start.elapsed().as_micros() as u64;

        info!(
            characters = stats.characters,
            relationships = stats.relationships,
            degraded = stats.degraded_chapters,
            total_us = stats.timings.total_us,
            "analysis complete"
        );

        Ok((model, stats))
    }

    fn extract_all(&self, chapters: &[ChapterContext]) -> Vec<ChapterExtraction> {
        let mut extractor = CandidateExtractor::new(&self.rules, &self.config);
        if let Some(client) = &self.suggestion {
            extractor = extractor.with_suggestion(client);
        }
        chapters.par_iter().map(|chapter| extractor.extract(chapter)).collect()
    }
}

/// Reject empty ids, duplicate ids and duplicate ordinals
pub fn validate_chapters(chapters: &[ChapterContext]) -> Result<()> {
    let mut ids: HashSet<&str> = HashSet::with_capacity(chapters.len());
    let mut ordinals: HashMap<u32, &str> = HashMap::with_capacity(chapters.len());

    for (index, chapter) in chapters.iter().enumerate() {
        if chapter.id.trim().is_empty() {
            return Err(CastError::MissingChapterId { index });
        }
        if !ids.insert(chapter.id.as_str()) {
            return Err(CastError::DuplicateChapterId(chapter.id.clone()));
        }
        if let Some(first) = ordinals.insert(chapter.ordinal, chapter.id.as_str()) {
            return Err(CastError::DuplicateOrdinal {
                ordinal: chapter.ordinal,
                first: first.to_string(),
                second: chapter.id.clone(),
            });
        }
    }

    Ok(())
}
