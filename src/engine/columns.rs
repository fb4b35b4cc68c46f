//! Column planning: which requested names go to the backend, which are
//! resolved by callback, which are combinator expressions.
//!
//! Everything here is pure and takes its inputs explicitly.

use std::sync::OnceLock;

use regex::Regex;

use crate::feature::{Feature, FeatureSourceColumn};

/// `[NAME]` reference inside a combinator expression.
fn reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[([^\]]+)\]").expect("combinator pattern is valid"))
}

/// Names referenced by a combinator expression, in order of appearance.
/// Empty when `name` is not a combinator.
pub fn combinator_references(name: &str) -> Vec<String> {
    reference_pattern()
        .captures_iter(name)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Evaluate a combinator expression against one feature's columns. Missing
/// references become empty strings.
pub fn evaluate_combinator(expression: &str, feature: &Feature) -> String {
    reference_pattern()
        .replace_all(expression, |caps: &regex::Captures<'_>| {
            caps.get(1)
                .and_then(|m| feature.column(m.as_str()))
                .unwrap_or("")
                .to_string()
        })
        .into_owned()
}

/// Partition of one request's column names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnPlan {
    /// Requested names, deduplicated, in request order.
    output: Vec<String>,
    /// Native names sent to the backend, including combinator references.
    fetch: Vec<String>,
    virtual_columns: Vec<String>,
    combinators: Vec<String>,
}

impl ColumnPlan {
    /// Split `requested` against the backend's declared columns.
    ///
    /// A name the backend declares is native even if it looks like a
    /// combinator. Combinator references that are not native are dropped
    /// from the fetch and evaluate to empty.
    pub fn new(requested: &[String], native: &[FeatureSourceColumn]) -> Self {
        let is_native = |name: &str| native.iter().any(|c| c.name == name);
        let mut plan = ColumnPlan::default();

        for name in requested {
            if plan.output.contains(name) {
                continue;
            }
            plan.output.push(name.clone());

            if is_native(name) {
                push_unique(&mut plan.fetch, name);
                continue;
            }
            let references = combinator_references(name);
            if references.is_empty() {
                plan.virtual_columns.push(name.clone());
            } else {
                for reference in references.iter().filter(|r| is_native(r)) {
                    push_unique(&mut plan.fetch, reference);
                }
                plan.combinators.push(name.clone());
            }
        }
        plan
    }

    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn fetch(&self) -> &[String] {
        &self.fetch
    }

    pub fn virtual_columns(&self) -> &[String] {
        &self.virtual_columns
    }

    pub fn combinators(&self) -> &[String] {
        &self.combinators
    }

    pub fn has_combinators(&self) -> bool {
        !self.combinators.is_empty()
    }

    /// Fill every combinator column a feature does not already carry.
    pub fn apply_combinators(&self, features: &mut [Feature]) {
        if !self.has_combinators() {
            return;
        }
        for feature in features.iter_mut() {
            for expression in &self.combinators {
                let value = evaluate_combinator(expression, feature);
                feature.set_column_if_absent(expression, value);
            }
        }
    }

    /// Shape a buffered feature like a backend result of this request: only
    /// fetched and virtual columns survive, then combinators are applied.
    pub fn prepare_buffered(&self, feature: &Feature) -> Feature {
        let mut keep = self.fetch.clone();
        keep.extend(self.virtual_columns.iter().cloned());
        let mut prepared = feature.projected(&keep);
        self.apply_combinators(std::slice::from_mut(&mut prepared));
        prepared
    }
}

fn push_unique(names: &mut Vec<String>, name: &str) {
    if !names.iter().any(|n| n == name) {
        names.push(name.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn native() -> Vec<FeatureSourceColumn> {
        vec![
            FeatureSourceColumn::string("Name"),
            FeatureSourceColumn::string("FIRST"),
            FeatureSourceColumn::string("LAST"),
        ]
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_split_native_and_virtual() {
        let plan = ColumnPlan::new(&names(&["Name", "ComputedArea"]), &native());
        assert_eq!(plan.fetch(), names(&["Name"]).as_slice());
        assert_eq!(plan.virtual_columns(), names(&["ComputedArea"]).as_slice());
        assert!(!plan.has_combinators());
    }

    #[test]
    fn test_combinator_references_join_fetch() {
        let plan = ColumnPlan::new(&names(&["[FIRST] [LAST]", "FIRST"]), &native());
        assert_eq!(plan.fetch(), names(&["FIRST", "LAST"]).as_slice());
        assert_eq!(plan.combinators(), names(&["[FIRST] [LAST]"]).as_slice());
        assert!(plan.virtual_columns().is_empty());
    }

    #[test]
    fn test_duplicates_collapse() {
        let plan = ColumnPlan::new(&names(&["Name", "Name", "x", "x"]), &native());
        assert_eq!(plan.output(), names(&["Name", "x"]).as_slice());
        assert_eq!(plan.virtual_columns().len(), 1);
    }

    #[test]
    fn test_evaluate_combinator() {
        let feature = Feature::new("1", "POINT(0 0)").with_column("FIRST", "Ada");
        assert_eq!(evaluate_combinator("[FIRST] [LAST]", &feature), "Ada ");
        assert_eq!(evaluate_combinator("[FIRST]-[FIRST]", &feature), "Ada-Ada");
    }

    #[test]
    fn test_apply_keeps_existing_value() {
        let plan = ColumnPlan::new(&names(&["[FIRST]"]), &native());
        let mut features = vec![
            Feature::new("1", "POINT(0 0)").with_column("FIRST", "Ada"),
            Feature::new("2", "POINT(0 0)")
                .with_column("FIRST", "Bob")
                .with_column("[FIRST]", "preset"),
        ];
        plan.apply_combinators(&mut features);
        assert_eq!(features[0].column("[FIRST]"), Some("Ada"));
        assert_eq!(features[1].column("[FIRST]"), Some("preset"));
    }

    #[test]
    fn test_prepare_buffered_drops_unrequested() {
        let plan = ColumnPlan::new(&names(&["Name"]), &native());
        let buffered = Feature::new("1", "POINT(0 0)")
            .with_column("Name", "a")
            .with_column("FIRST", "b");
        let prepared = plan.prepare_buffered(&buffered);
        assert_eq!(prepared.columns().len(), 1);
        assert_eq!(prepared.column("Name"), Some("a"));
    }
}
