//! Column name sanitization and column role resolution.
//!
//! Header names from both the mapping table and the main dataset go through
//! [`sanitize_column_name()`] before any matching happens. Role discovery is
//! expressed as predicates handed to [`resolve_column()`], which insists on
//! exactly one candidate.

use std::{collections::HashMap, sync::LazyLock};

use itertools::Itertools;
use regex::Regex;

use crate::error::{RemapError, RemapResult};

static NON_WORD_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^0-9A-Za-z_]+").expect("static pattern"));
static UNDERSCORE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_{2,}").expect("static pattern"));

pub const DEFAULT_TARGET_PREFIX: &str = "amt_";
pub const DEFAULT_ID_COLUMNS: [&str; 2] = ["id", "head_id"];

/// Replaces every run of characters outside `[0-9A-Za-z_]` with `_`, collapses
/// repeated underscores and trims them from both ends. Idempotent.
pub fn sanitize_column_name(name: &str) -> String {
    let replaced = NON_WORD_RUN.replace_all(name, "_");
    let collapsed = UNDERSCORE_RUN.replace_all(&replaced, "_");
    collapsed.trim_matches('_').to_string()
}

/// Sanitizes a whole header row, rejecting names that collide afterwards.
pub fn sanitize_headers(raw: &[String], source: &str) -> RemapResult<Vec<String>> {
    let sanitized = raw
        .iter()
        .map(|name| sanitize_column_name(name))
        .collect::<Vec<_>>();
    let mut seen: HashMap<&str, &str> = HashMap::new();
    for (clean, original) in sanitized.iter().zip(raw) {
        if let Some(previous) = seen.insert(clean.as_str(), original.as_str()) {
            return Err(RemapError::configuration(format!(
                "Columns '{previous}' and '{original}' in {source} both sanitize to '{clean}'"
            )));
        }
    }
    Ok(sanitized)
}

/// Returns the single candidate accepted by `predicate`.
///
/// Zero matches and more than one match are both configuration errors; the
/// message lists what was available so the offending header can be fixed.
pub fn resolve_column<P>(candidates: &[String], role: &str, predicate: P) -> RemapResult<String>
where
    P: Fn(&str) -> bool,
{
    let matches = candidates
        .iter()
        .filter(|name| predicate(name))
        .collect::<Vec<_>>();
    match matches.as_slice() {
        [single] => Ok((*single).clone()),
        [] => Err(RemapError::configuration(format!(
            "No column matches the {role} role; available columns: [{}]",
            candidates.iter().join(", ")
        ))),
        many => Err(RemapError::configuration(format!(
            "Column for the {role} role is ambiguous: [{}]",
            many.iter().join(", ")
        ))),
    }
}

fn squashed(name: &str) -> String {
    name.to_ascii_lowercase().replace('_', "")
}

pub fn is_sender_column(name: &str) -> bool {
    squashed(name) == "amtsenf" || name.to_ascii_lowercase().contains("amtsenf")
}

pub fn is_category_column(name: &str) -> bool {
    squashed(name) == "catno" || name.to_ascii_lowercase().contains("cat_no")
}

pub fn is_average_column(name: &str) -> bool {
    name.to_ascii_lowercase().contains("avg")
}

/// The three columns of the mapping table that feed the lookup index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingColumns {
    pub sender: String,
    pub category: String,
    pub average: String,
}

impl MappingColumns {
    pub fn resolve(headers: &[String]) -> RemapResult<Self> {
        Ok(MappingColumns {
            sender: resolve_column(headers, "sender code", is_sender_column)?,
            category: resolve_column(headers, "category number", is_category_column)?,
            average: resolve_column(headers, "average value", is_average_column)?,
        })
    }

    pub fn indices(&self, headers: &[String]) -> RemapResult<(usize, usize, usize)> {
        let position = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| RemapError::configuration(format!("Column '{name}' not found")))
        };
        Ok((
            position(&self.sender)?,
            position(&self.category)?,
            position(&self.average)?,
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetColumn {
    pub name: String,
    pub index: usize,
}

/// Identifier and target columns of a batch, resolved by position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundColumns {
    pub id: usize,
    pub targets: Vec<TargetColumn>,
}

/// Column roles resolved once from the main dataset header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPlan {
    headers: Vec<String>,
    id_column: String,
    targets: Vec<String>,
}

impl ColumnPlan {
    /// Picks the identifier column by priority (`id_candidates` in order, else
    /// the first column) and every other column whose name starts with
    /// `target_prefix`, compared case-insensitively.
    pub fn resolve(
        headers: &[String],
        id_candidates: &[String],
        target_prefix: &str,
    ) -> RemapResult<Self> {
        let first = headers
            .first()
            .ok_or_else(|| RemapError::configuration("Main dataset header has no columns"))?;
        let id_column = id_candidates
            .iter()
            .find(|candidate| headers.contains(candidate))
            .unwrap_or(first)
            .clone();
        let prefix = target_prefix.to_ascii_lowercase();
        let targets = headers
            .iter()
            .filter(|name| **name != id_column)
            .filter(|name| name.to_ascii_lowercase().starts_with(&prefix))
            .cloned()
            .collect();
        Ok(ColumnPlan {
            headers: headers.to_vec(),
            id_column,
            targets,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    /// Locates the plan's columns inside one batch. Targets the batch lacks
    /// are dropped; a missing identifier column is a schema error.
    pub fn bind(&self, batch_headers: &[String], batch: usize) -> RemapResult<BoundColumns> {
        let id = batch_headers
            .iter()
            .position(|h| *h == self.id_column)
            .ok_or_else(|| {
                RemapError::schema(
                    batch,
                    format!("identifier column '{}' is missing", self.id_column),
                )
            })?;
        let targets = self
            .targets
            .iter()
            .filter_map(|name| {
                batch_headers
                    .iter()
                    .position(|h| h == name)
                    .map(|index| TargetColumn {
                        name: name.clone(),
                        index,
                    })
            })
            .collect();
        Ok(BoundColumns { id, targets })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn default_ids() -> Vec<String> {
        names(&DEFAULT_ID_COLUMNS)
    }

    #[test]
    fn sanitize_replaces_runs_and_trims() {
        assert_eq!(sanitize_column_name("AMT SENF (01)"), "AMT_SENF_01");
        assert_eq!(sanitize_column_name("__cat--no__"), "cat_no");
        assert_eq!(sanitize_column_name("avg. value %"), "avg_value");
        assert_eq!(sanitize_column_name("a___b"), "a_b");
        assert_eq!(sanitize_column_name("plain"), "plain");
    }

    #[test]
    fn sanitize_is_idempotent_on_examples() {
        for raw in ["Order ID", "$Percent%", "x__y", "_a_", "ümlaut col"] {
            let once = sanitize_column_name(raw);
            assert_eq!(sanitize_column_name(&once), once);
        }
    }

    #[test]
    fn colliding_headers_are_rejected() {
        let err = sanitize_headers(&names(&["amt a", "amt-a"]), "input.csv").unwrap_err();
        assert!(err.to_string().contains("both sanitize to 'amt_a'"));
    }

    #[test]
    fn resolve_column_requires_exactly_one_match() {
        let headers = names(&["amt_senf", "cat_no", "avg_value", "avg_count"]);
        assert_eq!(
            resolve_column(&headers, "sender code", is_sender_column).unwrap(),
            "amt_senf"
        );
        let ambiguous = resolve_column(&headers, "average value", is_average_column).unwrap_err();
        assert!(ambiguous.to_string().contains("ambiguous"));
        let missing = resolve_column(&headers, "other", |name| name == "nope").unwrap_err();
        assert!(missing.to_string().contains("available columns"));
    }

    #[test]
    fn mapping_columns_match_fuzzy_names() {
        let headers = names(&["Amt_Senf", "CATNO", "description", "AVG_VALUE"]);
        let resolved = MappingColumns::resolve(&headers).unwrap();
        assert_eq!(resolved.sender, "Amt_Senf");
        assert_eq!(resolved.category, "CATNO");
        assert_eq!(resolved.average, "AVG_VALUE");
        assert_eq!(resolved.indices(&headers).unwrap(), (0, 1, 3));
    }

    #[test]
    fn id_column_follows_priority() {
        let plan =
            ColumnPlan::resolve(&names(&["x", "head_id", "id", "amt_a"]), &default_ids(), "amt_")
                .unwrap();
        assert_eq!(plan.id_column(), "id");

        let plan =
            ColumnPlan::resolve(&names(&["x", "head_id", "amt_a"]), &default_ids(), "amt_").unwrap();
        assert_eq!(plan.id_column(), "head_id");

        let plan = ColumnPlan::resolve(&names(&["x", "amt_a"]), &default_ids(), "amt_").unwrap();
        assert_eq!(plan.id_column(), "x");
    }

    #[test]
    fn targets_match_prefix_case_insensitively() {
        let plan = ColumnPlan::resolve(
            &names(&["id", "AMT_one", "amt_two", "amount", "x_amt_"]),
            &default_ids(),
            "amt_",
        )
        .unwrap();
        assert_eq!(plan.targets(), names(&["AMT_one", "amt_two"]).as_slice());
    }

    #[test]
    fn identifier_is_never_a_target() {
        let plan = ColumnPlan::resolve(&names(&["amt_id", "amt_a"]), &default_ids(), "amt_").unwrap();
        assert_eq!(plan.id_column(), "amt_id");
        assert_eq!(plan.targets(), names(&["amt_a"]).as_slice());
    }

    #[test]
    fn empty_header_is_a_configuration_error() {
        let err = ColumnPlan::resolve(&[], &default_ids(), "amt_").unwrap_err();
        assert!(matches!(err, RemapError::Configuration { .. }));
    }

    #[test]
    fn bind_reports_missing_identifier_as_schema_error() {
        let plan = ColumnPlan::resolve(&names(&["id", "amt_a", "amt_b"]), &default_ids(), "amt_")
            .unwrap();
        let bound = plan.bind(&names(&["amt_b", "id"]), 0).unwrap();
        assert_eq!(bound.id, 1);
        assert_eq!(
            bound.targets,
            vec![TargetColumn {
                name: "amt_b".into(),
                index: 0
            }]
        );
        let err = plan.bind(&names(&["amt_a"]), 4).unwrap_err();
        assert!(matches!(err, RemapError::Schema { batch: 4, .. }));
    }
}
