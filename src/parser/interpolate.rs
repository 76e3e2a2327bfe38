//! Variable interpolation and `.env` file parsing.
//!
//! Supports `${VAR}`, `${VAR:-default}` and bare `$VAR`. A `$$` pair is
//! left untouched so the following name is never expanded.

use serde_yaml::Value;
use std::collections::HashMap;

/// Environment used for interpolation.
pub type EnvMap = HashMap<String, String>;

// ============================================================================
// .env parsing
// ============================================================================

/// Parse the contents of a `.env` style file.
///
/// Blank lines and `#` comments are skipped. A line without `=` defines the
/// key with an empty value. Matching surrounding quotes are stripped.
pub fn parse_env_file(content: &str) -> Vec<(String, String)> {
    let mut entries = Vec::new();

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let Some((key, value)) = trimmed.split_once('=') else {
            entries.push((trimmed.to_string(), String::new()));
            continue;
        };

        let key = key.trim();
        if key.is_empty() {
            continue;
        }

        entries.push((key.to_string(), strip_quotes(value.trim()).to_string()));
    }

    entries
}

fn strip_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

// ============================================================================
// Interpolation
// ============================================================================

/// Interpolate every variable reference in `input`.
///
/// Unset variables resolve to the default when one is given, else to the
/// empty string. The default of `${VAR:-default}` ends at the brace that
/// balances the opening one, so `${A:-{"k":1}}` yields `{"k":1}`.
pub fn interpolate_str(input: &str, env: &EnvMap) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;

    while i < chars.len() {
        if chars[i] != '$' {
            out.push(chars[i]);
            i += 1;
            continue;
        }

        match chars.get(i + 1) {
            Some('{') => match expand_braced(&chars, i, env) {
                Some((text, next)) => {
                    out.push_str(&text);
                    i = next;
                }
                None => {
                    out.push('$');
                    i += 1;
                }
            },
            Some('$') => {
                out.push_str("$$");
                i += 2;
            }
            Some(c) if c.is_ascii_alphabetic() || *c == '_' => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '_') {
                    end += 1;
                }
                let name: String = chars[start..end].iter().collect();
                out.push_str(env.get(&name).map(String::as_str).unwrap_or(""));
                i = end;
            }
            _ => {
                out.push('$');
                i += 1;
            }
        }
    }

    out
}

/// Expand a `${...}` expression starting at `start` (the `$`).
///
/// Returns the replacement text and the index just past the expression, or
/// `None` when the expression is malformed and must be emitted verbatim.
fn expand_braced(chars: &[char], start: usize, env: &EnvMap) -> Option<(String, usize)> {
    let name_start = start + 2;
    let mut j = name_start;
    while j < chars.len() && chars[j] != ':' && chars[j] != '}' {
        j += 1;
    }
    let name: String = chars[name_start..j].iter().collect();

    if chars.get(j) == Some(&'}') {
        let value = env.get(&name).cloned().unwrap_or_default();
        return Some((value, j + 1));
    }

    if chars.get(j) == Some(&':') && chars.get(j + 1) == Some(&'-') {
        let default_start = j + 2;
        let mut depth = 1usize;
        let mut k = default_start;
        while k < chars.len() {
            match chars[k] {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
            k += 1;
        }
        let default_end = k.min(chars.len());
        let value = match env.get(&name) {
            Some(v) => v.clone(),
            None => chars[default_start..default_end].iter().collect(),
        };
        return Some((value, k + 1));
    }

    None
}

/// Interpolate every string scalar inside a YAML tree.
///
/// Mapping keys, numbers, booleans and nulls are left as they are so the
/// document keeps its structural types.
pub fn interpolate_value(value: Value, env: &EnvMap) -> Value {
    match value {
        Value::String(s) => Value::String(interpolate_str(&s, env)),
        Value::Sequence(items) => Value::Sequence(
            items
                .into_iter()
                .map(|item| interpolate_value(item, env))
                .collect(),
        ),
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .map(|(k, v)| (k, interpolate_value(v, env)))
                .collect(),
        ),
        Value::Tagged(mut tagged) => {
            tagged.value = interpolate_value(tagged.value, env);
            Value::Tagged(tagged)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> EnvMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_braced_and_bare_variables() {
        let e = env(&[("TAG", "1.2"), ("HOST", "db")]);
        assert_eq!(interpolate_str("app:${TAG}", &e), "app:1.2");
        assert_eq!(interpolate_str("http://$HOST:5432", &e), "http://db:5432");
        assert_eq!(interpolate_str("${MISSING}|$MISSING", &e), "|");
    }

    #[test]
    fn test_default_values() {
        let e = env(&[("SET", "yes")]);
        assert_eq!(interpolate_str("${SET:-no}", &e), "yes");
        assert_eq!(interpolate_str("${UNSET:-fallback}", &e), "fallback");
        assert_eq!(interpolate_str("${UNSET:-}", &e), "");
    }

    #[test]
    fn test_default_with_balanced_braces() {
        let e = EnvMap::new();
        assert_eq!(
            interpolate_str(r#"${CFG:-{"a":{"b":1}}}!"#, &e),
            r#"{"a":{"b":1}}!"#
        );
    }

    #[test]
    fn test_double_dollar_is_preserved() {
        let e = env(&[("HOME", "/root")]);
        assert_eq!(interpolate_str("$$HOME", &e), "$$HOME");
    }

    #[test]
    fn test_malformed_expressions_pass_through() {
        let e = env(&[("A", "x")]);
        assert_eq!(interpolate_str("${A:?required}", &e), "${A:?required}");
        assert_eq!(interpolate_str("cost: 5$", &e), "cost: 5$");
        assert_eq!(interpolate_str("${A", &e), "${A");
    }

    #[test]
    fn test_interpolate_value_keeps_types() {
        let e = env(&[("PORT", "8080")]);
        let doc: Value = serde_yaml::from_str("ports: [\"${PORT}:80\", 443]\nreplicas: 2\nflag: true\n")
            .unwrap();
        let out = interpolate_value(doc, &e);
        assert_eq!(out["ports"][0], Value::String("8080:80".to_string()));
        assert_eq!(out["ports"][1], Value::Number(443.into()));
        assert_eq!(out["replicas"], Value::Number(2.into()));
        assert_eq!(out["flag"], Value::Bool(true));
    }

    #[test]
    fn test_parse_env_file() {
        let content = "# comment\n\nA=1\nB = \"quoted value\"\nC='single'\nBARE\n=novalue\nD=x=y\n";
        let parsed = parse_env_file(content);
        assert_eq!(
            parsed,
            vec![
                ("A".to_string(), "1".to_string()),
                ("B".to_string(), "quoted value".to_string()),
                ("C".to_string(), "single".to_string()),
                ("BARE".to_string(), String::new()),
                ("D".to_string(), "x=y".to_string()),
            ]
        );
    }
}
