//! JSON text for values, used by the CLI and by `Display` of maps.

use crate::value::{format_number, Value};

/// Nesting below this depth is cut off, which also stops cyclic maps.
const MAX_DEPTH: usize = 64;
const INDENT_SIZE: usize = 2;

pub fn value_to_json_string(value: &Value, compact: bool) -> String {
    format_json(value, if compact { None } else { Some(0) })
}

pub fn escape_json_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

fn quoted(s: &str) -> String {
    format!("\"{}\"", escape_json_string(s))
}

pub fn format_json(value: &Value, indent: Option<usize>) -> String {
    write_json(value, indent, 0)
}

fn write_json(value: &Value, indent: Option<usize>, depth: usize) -> String {
    if depth > MAX_DEPTH {
        return quoted("...");
    }
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n, _) if !n.is_finite() => "null".to_string(),
        Value::Number(n, is_float) => {
            let formatted = format_number(*n, *is_float);
            if *is_float && !formatted.contains(['.', 'e', 'E']) {
                format!("{}.0", formatted)
            } else {
                formatted
            }
        }
        Value::String(s) => quoted(s),
        Value::Context(ctx) if ctx.is_array() => {
            let items: Vec<String> = ctx
                .values()
                .iter()
                .map(|item| write_json(item, indent.map(|l| l + 1), depth + 1))
                .collect();
            write_list(items, indent, '[', ']')
        }
        Value::Context(ctx) => write_object(&ctx.entries(), indent, depth),
        Value::Instance(instance) => write_object(&instance.fields.entries(), indent, depth),
        Value::Exception(err) => quoted(&err.to_string()),
        other => quoted(&other.to_string()),
    }
}

fn write_object(entries: &[(String, Value)], indent: Option<usize>, depth: usize) -> String {
    let separator = if indent.is_some() { ": " } else { ":" };
    let fields: Vec<String> = entries
        .iter()
        .map(|(k, v)| format!("{}{}{}", quoted(k), separator, write_json(v, indent.map(|l| l + 1), depth + 1)))
        .collect();
    write_list(fields, indent, '{', '}')
}

fn write_list(items: Vec<String>, indent: Option<usize>, open: char, close: char) -> String {
    if items.is_empty() {
        return format!("{}{}", open, close);
    }
    match indent {
        None => format!("{}{}{}", open, items.join(","), close),
        Some(level) => {
            let indent_str = " ".repeat(level * INDENT_SIZE);
            let next_indent = " ".repeat((level + 1) * INDENT_SIZE);
            let items: Vec<String> = items.iter().map(|item| format!("{}{}", next_indent, item)).collect();
            format!("{}\n{}\n{}{}", open, items.join(",\n"), indent_str, close)
        }
    }
}
