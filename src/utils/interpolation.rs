use serde_json::Value;
use std::collections::BTreeMap;

/// Values visible to a template while one record is being rendered.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    /// The current record (usually a JSON object), or `Value::Null` outside records.
    pub record: &'a Value,
    pub globals: &'a BTreeMap<String, Value>,
    /// 1-based position of the record, 0 outside records.
    pub index: usize,
    /// Number of records in the run.
    pub count: usize,
}

/// Render a template string against `scope`.
///
/// Token formats:
/// - `{{field}}` / `{{order.qty}}` -> record field (dotted paths into objects)
/// - `{{@key}}` / `{{@app.name}}` -> global value
/// - `{{#index}}`, `{{#count}}`   -> record position
///
/// A token may carry `|`-separated filters applied left to right:
/// `upper`, `lower`, `trim`, `int`, `fixed:N`, `default:TEXT`.
///
/// Whitespace around token content is ignored. Unknown fields or filters leave
/// the whole token intact. Non-string values render as compact JSON.
pub fn render(template: &str, scope: &Scope<'_>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            // Unterminated: keep the remainder verbatim.
            out.push_str(&rest[start..]);
            return out;
        };
        let raw_token = &rest[start..start + 2 + end + 2];
        match expand_token(&after_open[..end], scope) {
            Some(value) => out.push_str(&value),
            None => out.push_str(raw_token),
        }
        rest = &after_open[end + 2..];
    }

    out.push_str(rest);
    out
}

/// Whether `template` contains any `{{...}}` token.
pub fn has_tokens(template: &str) -> bool {
    template
        .find("{{")
        .is_some_and(|start| template[start + 2..].contains("}}"))
}

fn expand_token(content: &str, scope: &Scope<'_>) -> Option<String> {
    let mut parts = content.split('|');
    let source = parts.next()?.trim();
    if source.is_empty() {
        return None;
    }

    let mut value = lookup(source, scope);
    for filter in parts {
        value = Some(apply_filter(filter.trim(), value)?);
    }
    value.map(|v| match v {
        Value::String(s) => s,
        other => other.to_string(),
    })
}

fn lookup(source: &str, scope: &Scope<'_>) -> Option<Value> {
    if let Some(global) = source.strip_prefix('@') {
        let mut segments = global.trim().split('.');
        let first = segments.next()?.trim();
        let root = scope.globals.get(first)?;
        return get_path(root, segments).cloned();
    }
    if let Some(builtin) = source.strip_prefix('#') {
        return match builtin.trim() {
            "index" => Some(Value::from(scope.index)),
            "count" => Some(Value::from(scope.count)),
            _ => None,
        };
    }
    get_path(scope.record, source.split('.')).cloned()
}

fn get_path<'v, 's>(root: &'v Value, segments: impl Iterator<Item = &'s str>) -> Option<&'v Value> {
    let mut current = root;
    for seg in segments {
        match current {
            Value::Object(map) => current = map.get(seg.trim())?,
            _ => return None,
        }
    }
    Some(current)
}

/// Bounds of `i64` as `f64`; the upper bound (2^63) is itself out of range.
const I64_LOWER: f64 = i64::MIN as f64;
const I64_UPPER: f64 = 9_223_372_036_854_775_808.0;

/// Apply one filter. `None` input means the source was missing; only
/// `default` can recover from that. Returns `None` to keep the token intact.
fn apply_filter(filter: &str, value: Option<Value>) -> Option<Value> {
    let (name, arg) = match filter.split_once(':') {
        Some((name, arg)) => (name.trim(), Some(arg)),
        None => (filter, None),
    };

    if name == "default" {
        let fallback = Value::String(arg.unwrap_or_default().to_string());
        return Some(match value {
            None | Some(Value::Null) => fallback,
            Some(Value::String(s)) if s.is_empty() => fallback,
            Some(v) => v,
        });
    }

    let value = value?;
    match name {
        "upper" => Some(Value::String(as_text(&value).to_uppercase())),
        "lower" => Some(Value::String(as_text(&value).to_lowercase())),
        "trim" => Some(Value::String(as_text(&value).trim().to_string())),
        "int" => {
            let n = as_number(&value)?.trunc();
            // `as` saturates; out-of-range values must not become plausible data.
            if n < I64_LOWER || n >= I64_UPPER {
                return None;
            }
            Some(Value::String(format!("{}", n as i64)))
        }
        "fixed" => {
            let digits: usize = arg?.trim().parse().ok()?;
            let n = as_number(&value)?;
            Some(Value::String(format!("{n:.digits$}")))
        }
        _ => None,
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Numbers, or strings that parse as numbers (spreadsheet cells often arrive as text).
/// NaN and infinities are not numbers here.
fn as_number(value: &Value) -> Option<f64> {
    let n: f64 = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scope<'a>(record: &'a Value, globals: &'a BTreeMap<String, Value>) -> Scope<'a> {
        Scope {
            record,
            globals,
            index: 2,
            count: 5,
        }
    }

    #[test]
    fn renders_record_fields_and_dotted_paths() {
        let record = json!({ "item": "A-100", "order": { "qty": 12 } });
        let globals = BTreeMap::new();
        assert_eq!(
            render("{{item}} x{{ order.qty }}", &scope(&record, &globals)),
            "A-100 x12"
        );
    }

    #[test]
    fn renders_globals_and_position() {
        let record = json!({});
        let mut globals = BTreeMap::new();
        globals.insert("site".into(), json!({ "code": "WH1" }));
        assert_eq!(
            render("{{@site.code}} row {{#index}}/{{#count}}", &scope(&record, &globals)),
            "WH1 row 2/5"
        );
    }

    #[test]
    fn applies_filters_in_order() {
        let record = json!({ "code": "  ab12 ", "price": "3.14159", "qty": 7.9 });
        let globals = BTreeMap::new();
        let s = scope(&record, &globals);
        assert_eq!(render("{{code|trim|upper}}", &s), "AB12");
        assert_eq!(render("{{price|fixed:2}}", &s), "3.14");
        assert_eq!(render("{{qty|int}}", &s), "7");
        assert_eq!(render("{{missing|default:N/A}}", &s), "N/A");
    }

    #[test]
    fn numeric_filters_refuse_out_of_range_and_non_finite_values() {
        let record = json!({
            "big": "123456789012345678901",
            "huge": 1e30,
            "n": "NaN",
            "inf": "inf",
            "neg": "-42.7"
        });
        let globals = BTreeMap::new();
        let s = scope(&record, &globals);
        assert_eq!(render("{{big|int}}", &s), "{{big|int}}");
        assert_eq!(render("{{huge|int}}", &s), "{{huge|int}}");
        assert_eq!(render("{{n|int}}", &s), "{{n|int}}");
        assert_eq!(render("{{inf|fixed:2}}", &s), "{{inf|fixed:2}}");
        assert_eq!(render("{{neg|int}}", &s), "-42");
        assert!(has_tokens(&render("{{big|int}}", &s)));
    }

    #[test]
    fn default_covers_empty_and_null_values() {
        let record = json!({ "blank": "", "none": null, "set": "x" });
        let globals = BTreeMap::new();
        let s = scope(&record, &globals);
        assert_eq!(render("{{blank|default:0}}", &s), "0");
        assert_eq!(render("{{none|default:0}}", &s), "0");
        assert_eq!(render("{{set|default:0}}", &s), "x");
    }

    #[test]
    fn unknown_tokens_and_filters_are_preserved() {
        let record = json!({ "item": "A" });
        let globals = BTreeMap::new();
        let s = scope(&record, &globals);
        assert_eq!(render("{{nope}} {{@app}}", &s), "{{nope}} {{@app}}");
        assert_eq!(render("{{item|shout}}", &s), "{{item|shout}}");
        assert_eq!(render("{{item|int}}", &s), "{{item|int}}");
        assert_eq!(render("open {{item", &s), "open {{item");
        assert_eq!(render("{{}}", &s), "{{}}");
    }

    #[test]
    fn detects_tokens() {
        assert!(has_tokens("a {{b}} c"));
        assert!(!has_tokens("a {{b c"));
        assert!(!has_tokens("plain"));
    }
}
