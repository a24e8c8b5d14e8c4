//! Low-level candidate resolution
//!
//! Evaluates candidate conditions against a qualifier context, ranks
//! candidates by specificity, and composes partial candidates into a final
//! value. Condition evaluations are memoized; the cache must be cleared
//! whenever the applied context changes.

use std::collections::HashMap;

use serde_json::Value;

use crate::context::QualifierContext;
use crate::resource::{Candidate, Condition, ConditionOperator, MergeMethod};

/// Outcome of evaluating one condition against a context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionMatch {
    /// The context sets the qualifier and the value matches
    Matched,
    /// The context sets the qualifier and the value contradicts
    Mismatched,
    /// The context does not set the qualifier
    Unspecified,
}

/// Evaluate a condition against a context, without caching
///
/// A `matches` condition is satisfied by an identical context value or by a
/// context value that refines the condition value with further hyphenated
/// subtags (`en` matches context `en-US`). Hierarchical tags are how
/// language and density qualifiers behave; exact values are unaffected.
pub fn evaluate_condition(condition: &Condition, context: &QualifierContext) -> ConditionMatch {
    let Some(ctx_value) = context.get(&condition.qualifier_name) else {
        return ConditionMatch::Unspecified;
    };
    match condition.operator {
        ConditionOperator::Matches => {
            if value_matches(&condition.value, ctx_value) {
                ConditionMatch::Matched
            } else {
                ConditionMatch::Mismatched
            }
        }
    }
}

fn value_matches(condition_value: &str, context_value: &str) -> bool {
    context_value == condition_value
        || (context_value.len() > condition_value.len()
            && context_value.starts_with(condition_value)
            && context_value.as_bytes()[condition_value.len()] == b'-')
}

/// Match state for one candidate under a context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateMatch {
    /// Position of the candidate in its declaration
    pub index: usize,
    /// Whether every condition matched
    pub matched: bool,
    /// Number of matched conditions (specificity)
    pub specificity: usize,
}

/// Memoizing condition evaluator and candidate ranker
#[derive(Debug, Default)]
pub struct ResolverBackend {
    /// (qualifier, condition value, context value) → matched
    condition_cache: HashMap<(String, String, String), bool>,
}

impl ResolverBackend {
    /// Create a backend with an empty condition cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all memoized condition evaluations
    pub fn clear_condition_cache(&mut self) {
        self.condition_cache.clear();
    }

    /// Number of memoized evaluations (observability only)
    pub fn cached_evaluations(&self) -> usize {
        self.condition_cache.len()
    }

    /// Evaluate a condition with memoization
    pub fn evaluate(&mut self, condition: &Condition, context: &QualifierContext) -> ConditionMatch {
        let Some(ctx_value) = context.get(&condition.qualifier_name) else {
            return ConditionMatch::Unspecified;
        };
        let key = (
            condition.qualifier_name.clone(),
            condition.value.clone(),
            ctx_value.to_string(),
        );
        let matched = match self.condition_cache.get(&key) {
            Some(&hit) => hit,
            None => {
                let computed = value_matches(&condition.value, ctx_value);
                self.condition_cache.insert(key, computed);
                computed
            }
        };
        if matched {
            ConditionMatch::Matched
        } else {
            ConditionMatch::Mismatched
        }
    }

    /// Match state for every candidate, in declaration order
    ///
    /// A candidate matches only if all of its conditions are matched under
    /// the context; a condition on an unset qualifier excludes the candidate
    /// from resolution (unlike filtering, which treats it as unknown).
    pub fn rank(&mut self, candidates: &[Candidate], context: &QualifierContext) -> Vec<CandidateMatch> {
        candidates
            .iter()
            .enumerate()
            .map(|(index, candidate)| {
                let mut specificity = 0;
                let mut matched = true;
                for condition in &candidate.conditions {
                    match self.evaluate(condition, context) {
                        ConditionMatch::Matched => specificity += 1,
                        ConditionMatch::Mismatched | ConditionMatch::Unspecified => {
                            matched = false;
                        }
                    }
                }
                CandidateMatch {
                    index,
                    matched,
                    specificity,
                }
            })
            .collect()
    }

    /// Index of the best-matching candidate, if any
    ///
    /// Most matched conditions wins; declaration order breaks ties.
    pub fn best(&mut self, candidates: &[Candidate], context: &QualifierContext) -> Option<usize> {
        self.rank(candidates, context)
            .into_iter()
            .filter(|m| m.matched)
            .max_by(|a, b| a.specificity.cmp(&b.specificity).then(b.index.cmp(&a.index)))
            .map(|m| m.index)
    }

    /// Compose the final value for a candidate set under a context
    ///
    /// The best full candidate provides the base value; matching partial
    /// candidates with `Augment` merge are overlaid onto it in increasing
    /// specificity order. A partial winner with no full candidate beneath it
    /// is returned as-is.
    pub fn compose(&mut self, candidates: &[Candidate], context: &QualifierContext) -> Option<Value> {
        let ranks = self.rank(candidates, context);
        let mut matching: Vec<&CandidateMatch> = ranks.iter().filter(|m| m.matched).collect();
        if matching.is_empty() {
            return None;
        }
        matching.sort_by(|a, b| a.specificity.cmp(&b.specificity).then(b.index.cmp(&a.index)));

        let base_rank = matching
            .iter()
            .rev()
            .find(|m| !candidates[m.index].is_partial)
            .or_else(|| matching.last())?;
        let mut value = candidates[base_rank.index].value.clone();

        for m in &matching {
            let candidate = &candidates[m.index];
            if candidate.is_partial
                && candidate.merge_method == MergeMethod::Augment
                && m.index != base_rank.index
                && m.specificity >= base_rank.specificity
            {
                value = merge_values(value, candidate.value.clone());
            }
        }
        Some(value)
    }
}

/// Deep-merge `overlay` onto `base`
///
/// Objects merge key-by-key; any other value in the overlay replaces the
/// base outright.
pub fn merge_values(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => merge_values(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Condition;
    use serde_json::json;

    fn ctx(pairs: &[(&str, &str)]) -> QualifierContext {
        let mut ctx = QualifierContext::new();
        for (name, value) in pairs {
            ctx.set(*name, Some((*value).to_string()));
        }
        ctx
    }

    #[test]
    fn test_condition_evaluation() {
        let cond = Condition::matches("language", "en");
        assert_eq!(
            evaluate_condition(&cond, &ctx(&[("language", "en")])),
            ConditionMatch::Matched
        );
        assert_eq!(
            evaluate_condition(&cond, &ctx(&[("language", "en-US")])),
            ConditionMatch::Matched
        );
        assert_eq!(
            evaluate_condition(&cond, &ctx(&[("language", "fr")])),
            ConditionMatch::Mismatched
        );
        assert_eq!(
            evaluate_condition(&cond, &ctx(&[])),
            ConditionMatch::Unspecified
        );
    }

    #[test]
    fn test_refinement_requires_subtag_boundary() {
        let cond = Condition::matches("language", "en");
        assert_eq!(
            evaluate_condition(&cond, &ctx(&[("language", "eng")])),
            ConditionMatch::Mismatched
        );
    }

    #[test]
    fn test_best_prefers_specificity() {
        let candidates = vec![
            Candidate::unconditional(json!("default")),
            Candidate::with_conditions(json!("english"), vec![Condition::matches("language", "en")]),
            Candidate::with_conditions(
                json!("american"),
                vec![
                    Condition::matches("language", "en"),
                    Condition::matches("territory", "US"),
                ],
            ),
        ];

        let mut backend = ResolverBackend::new();
        assert_eq!(backend.best(&candidates, &ctx(&[])), Some(0));
        assert_eq!(backend.best(&candidates, &ctx(&[("language", "en")])), Some(1));
        assert_eq!(
            backend.best(&candidates, &ctx(&[("language", "en"), ("territory", "US")])),
            Some(2)
        );
    }

    #[test]
    fn test_best_tie_prefers_declaration_order() {
        let candidates = vec![
            Candidate::with_conditions(json!("first"), vec![Condition::matches("language", "en")]),
            Candidate::with_conditions(json!("second"), vec![Condition::matches("territory", "US")]),
        ];
        let mut backend = ResolverBackend::new();
        assert_eq!(
            backend.best(&candidates, &ctx(&[("language", "en"), ("territory", "US")])),
            Some(0)
        );
    }

    #[test]
    fn test_unset_qualifier_excludes_candidate_from_resolution() {
        let candidates = vec![Candidate::with_conditions(
            json!("english"),
            vec![Condition::matches("language", "en")],
        )];
        let mut backend = ResolverBackend::new();
        assert_eq!(backend.best(&candidates, &ctx(&[])), None);
    }

    #[test]
    fn test_compose_merges_partial_augment() {
        let candidates = vec![
            Candidate::unconditional(json!({ "title": "Hello", "accent": "none" })),
            Candidate {
                value: json!({ "accent": "us" }),
                conditions: vec![Condition::matches("territory", "US")],
                is_partial: true,
                merge_method: MergeMethod::Augment,
            },
        ];
        let mut backend = ResolverBackend::new();
        let composed = backend
            .compose(&candidates, &ctx(&[("territory", "US")]))
            .unwrap();
        assert_eq!(composed, json!({ "title": "Hello", "accent": "us" }));
    }

    #[test]
    fn test_compose_without_full_base_returns_partial() {
        let candidates = vec![Candidate {
            value: json!({ "accent": "us" }),
            conditions: vec![Condition::matches("territory", "US")],
            is_partial: true,
            merge_method: MergeMethod::Augment,
        }];
        let mut backend = ResolverBackend::new();
        let composed = backend
            .compose(&candidates, &ctx(&[("territory", "US")]))
            .unwrap();
        assert_eq!(composed, json!({ "accent": "us" }));
    }

    #[test]
    fn test_cache_round_trip() {
        let cond = Condition::matches("language", "en");
        let context = ctx(&[("language", "en")]);
        let mut backend = ResolverBackend::new();

        assert_eq!(backend.cached_evaluations(), 0);
        backend.evaluate(&cond, &context);
        assert_eq!(backend.cached_evaluations(), 1);
        backend.evaluate(&cond, &context);
        assert_eq!(backend.cached_evaluations(), 1);

        backend.clear_condition_cache();
        assert_eq!(backend.cached_evaluations(), 0);
    }

    #[test]
    fn test_merge_values_deep() {
        let base = json!({ "a": { "x": 1, "y": 2 }, "b": 3 });
        let overlay = json!({ "a": { "y": 9 }, "c": 4 });
        assert_eq!(
            merge_values(base, overlay),
            json!({ "a": { "x": 1, "y": 9 }, "b": 3, "c": 4 })
        );
    }
}
