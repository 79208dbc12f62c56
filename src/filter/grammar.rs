//! The per-value operator grammar
//!
//! One raw query value plus the field's semantic type becomes at most one
//! predicate leaf. Patterns are tried in order; the first match wins.

use crate::core::field::{FieldKind, FieldValue};
use crate::core::predicate::{Lookup, Predicate};
use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

struct Rule {
    pattern: Regex,
    lookup: Lookup,
}

fn rules(source: &[(&str, Lookup)]) -> Vec<Rule> {
    source
        .iter()
        .filter_map(|(pattern, lookup)| {
            Regex::new(pattern).ok().map(|pattern| Rule {
                pattern,
                lookup: *lookup,
            })
        })
        .collect()
}

fn text_rules() -> &'static [Rule] {
    static RULES: OnceLock<Vec<Rule>> = OnceLock::new();
    RULES.get_or_init(|| {
        rules(&[
            (r"^([^*|]+)\*$", Lookup::StartsWith),
            (r"^([^*|]+)\*\|i$", Lookup::IStartsWith),
            (r"^\*([^*|]+)$", Lookup::EndsWith),
            (r"^\*([^*|]+)\|i$", Lookup::IEndsWith),
            (r"^\*([^*|]+)\*$", Lookup::Contains),
            (r"^\*([^*|]+)\*\|i$", Lookup::IContains),
            (r"^([^*|]+)\|i$", Lookup::IExact),
        ])
    })
}

fn comparison_rules() -> &'static [Rule] {
    static RULES: OnceLock<Vec<Rule>> = OnceLock::new();
    RULES.get_or_init(|| {
        rules(&[
            (r"^>([0-9]+)$", Lookup::Gt),
            (r"^>=([0-9]+)$", Lookup::Gte),
            (r"^<([0-9]+)$", Lookup::Lt),
            (r"^<=([0-9]+)$", Lookup::Lte),
        ])
    })
}

fn array_rules() -> &'static [Rule] {
    static RULES: OnceLock<Vec<Rule>> = OnceLock::new();
    RULES.get_or_init(|| {
        rules(&[
            (r"^_eq(\d+)$", Lookup::LenEq),
            (r"^_gt(\d+)$", Lookup::LenGt),
        ])
    })
}

/// First rule matching `value`, with its captured operand
fn match_rule<'r, 'v>(rules: &'r [Rule], value: &'v str) -> Option<(&'r Rule, &'v str)> {
    rules.iter().find_map(|rule| {
        rule.pattern
            .captures(value)
            .and_then(|caps| caps.get(1))
            .map(|operand| (rule, operand.as_str()))
    })
}

/// A 4-digit year becomes Jan 1, or Dec 31 for `<` / `<=`; anything else
/// stays a literal string
fn date_operand(lookup: Lookup, operand: &str) -> FieldValue {
    let year = (operand.len() == 4)
        .then(|| operand.parse::<i32>().ok())
        .flatten();
    let date = year.and_then(|year| match lookup {
        Lookup::Lt | Lookup::Lte => NaiveDate::from_ymd_opt(year, 12, 31),
        _ => NaiveDate::from_ymd_opt(year, 1, 1),
    });
    match date {
        Some(date) => FieldValue::Date(date),
        None => FieldValue::String(operand.to_string()),
    }
}

/// Compile one raw value for `field` of semantic type `kind`
///
/// Returns `None` for an empty value or field, an unresolved type, or a
/// relation kind (relations are never matched directly).
pub fn compile_value(kind: Option<FieldKind>, field: &str, value: &str) -> Option<Predicate> {
    let kind = kind?;
    if field.is_empty() || value.is_empty() || kind.is_relation() {
        return None;
    }

    let leaf = match kind {
        FieldKind::Char | FieldKind::Text | FieldKind::Json => match_rule(text_rules(), value)
            .map(|(rule, operand)| Predicate::leaf(field, rule.lookup, operand)),

        FieldKind::Integer => match_rule(comparison_rules(), value).map(|(rule, operand)| {
            let operand = operand
                .parse::<i64>()
                .map(FieldValue::Integer)
                .unwrap_or_else(|_| FieldValue::String(operand.to_string()));
            Predicate::leaf(field, rule.lookup, operand)
        }),

        FieldKind::Date => match_rule(comparison_rules(), value).map(|(rule, operand)| {
            Predicate::leaf(field, rule.lookup, date_operand(rule.lookup, operand))
        }),

        FieldKind::Boolean | FieldKind::NullBoolean => match value {
            "true" | "True" => Some(Predicate::eq(field, true)),
            "false" | "False" if kind == FieldKind::NullBoolean => {
                Some(Predicate::eq(field, FieldValue::Null))
            }
            "false" | "False" => Some(Predicate::eq(field, false)),
            _ => None,
        },

        FieldKind::Array => Some(match match_rule(array_rules(), value) {
            Some((rule, operand)) => {
                let length = operand
                    .parse::<i64>()
                    .map(FieldValue::Integer)
                    .unwrap_or_else(|_| FieldValue::String(operand.to_string()));
                Predicate::leaf(field, rule.lookup, length)
            }
            None => Predicate::leaf(
                field,
                Lookup::ArrayContains,
                FieldValue::List(vec![FieldValue::from(value)]),
            ),
        }),

        FieldKind::DateTime | FieldKind::Auto => None,
        FieldKind::ForeignKey | FieldKind::ManyToMany => return None,
    };

    Some(leaf.unwrap_or_else(|| Predicate::eq(field, value)))
}
