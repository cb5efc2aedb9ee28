//! Pack parameter values and dotted key paths into the values document.

use error_stack::Report;
use error_stack::ResultExt;
use serde_yaml::Mapping;
use serde_yaml::Value;

use crate::error::PackError;
use crate::error::PackResult;

/// Whether a raw parameter value should be read as a list or mapping literal.
pub fn looks_like_literal(raw: &str) -> bool {
    raw.starts_with('[') || raw.starts_with('{')
}

/// Turns a raw `--pack-param` value into a document value.
///
/// Values starting with `[` or `{` are list or mapping literals: strings must
/// be quoted, and the only bare words allowed are numbers, `True`, `False` and
/// `None`. They are read as YAML flow collections without evaluating
/// anything. All other values are kept verbatim as strings.
pub fn parse_pack_value(raw: &str) -> PackResult<Value> {
    if !looks_like_literal(raw) {
        return Ok(Value::String(raw.to_string()));
    }

    let flow = to_yaml_flow(raw).map_err(|reason| {
        Report::new(PackError::ValueParse {
            value: raw.to_string(),
        })
        .attach_printable(reason)
    })?;
    let parsed: Value = serde_yaml::from_str(&flow).change_context(PackError::ValueParse {
        value: raw.to_string(),
    })?;

    match parsed {
        Value::Sequence(_) | Value::Mapping(_) => Ok(parsed),
        other => Err(Report::new(PackError::ValueParse {
            value: raw.to_string(),
        })
        .attach_printable(format!("literal produced a scalar: {other:?}"))),
    }
}

/// Checks the bare words of a literal and spells its keywords the YAML way.
///
/// Quoted strings are copied as they are. A `:` outside quotes is always
/// followed by a space so `{1:2}` stays a key/value pair.
fn to_yaml_flow(raw: &str) -> Result<String, String> {
    let mut flow = String::with_capacity(raw.len() + 8);
    let mut word = String::new();
    let mut quote = None;
    let mut escaped = false;

    for c in raw.chars() {
        if let Some(open) = quote {
            flow.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == open {
                quote = None;
            }
            continue;
        }

        match c {
            '\'' | '"' => {
                if !word.is_empty() {
                    return Err(format!("unexpected quote after `{word}`"));
                }
                quote = Some(c);
                flow.push(c);
            }
            '[' | ']' | '{' | '}' | ',' | ':' => {
                push_word(&mut flow, &mut word)?;
                flow.push(c);
                if c == ':' {
                    flow.push(' ');
                }
            }
            c if c.is_whitespace() => {
                push_word(&mut flow, &mut word)?;
                flow.push(c);
            }
            c => word.push(c),
        }
    }

    if quote.is_some() {
        return Err("unterminated string".to_string());
    }
    push_word(&mut flow, &mut word)?;
    Ok(flow)
}

fn push_word(flow: &mut String, word: &mut String) -> Result<(), String> {
    if word.is_empty() {
        return Ok(());
    }
    match word.as_str() {
        "None" => flow.push_str("null"),
        "True" => flow.push_str("true"),
        "False" => flow.push_str("false"),
        number if is_number(number) => flow.push_str(number),
        other => return Err(format!("`{other}` is not a quoted string, number or keyword")),
    }
    word.clear();
    Ok(())
}

fn is_number(word: &str) -> bool {
    let unsigned = word.strip_prefix(['-', '+']).unwrap_or(word);
    unsigned.starts_with(|c: char| c.is_ascii_digit() || c == '.')
        && (unsigned.parse::<i64>().is_ok() || unsigned.parse::<f64>().is_ok())
}

/// Writes `value` at the dot separated `key` inside `root`.
///
/// Missing or null intermediate levels become mappings. A numeric segment
/// indexes into an existing sequence; an index equal to its length appends a
/// new element. Any existing value at the final segment is overwritten.
pub fn set_path(root: &mut Value, key: &str, value: Value) -> PackResult<()> {
    let mut node = root;
    for segment in key.split('.') {
        node = slot_mut(node, segment, key)?;
    }
    *node = value;
    Ok(())
}

fn slot_mut<'a>(node: &'a mut Value, segment: &str, key: &str) -> PackResult<&'a mut Value> {
    if node.is_null() {
        *node = Value::Mapping(Mapping::new());
    }

    match node {
        Value::Mapping(map) => Ok(map
            .entry(Value::String(segment.to_string()))
            .or_insert(Value::Null)),
        Value::Sequence(items) => {
            let index = segment.parse::<usize>().map_err(|_| {
                Report::new(PackError::UnexpectedShape {
                    path: key.to_string(),
                })
                .attach_printable(format!("`{segment}` is not a sequence index"))
            })?;
            if index > items.len() {
                return Err(Report::new(PackError::UnexpectedShape {
                    path: key.to_string(),
                })
                .attach_printable(format!(
                    "index {index} is past the end of a sequence of {}",
                    items.len()
                )));
            }
            if index == items.len() {
                items.push(Value::Null);
            }
            Ok(&mut items[index])
        }
        _ => Err(Report::new(PackError::UnexpectedShape {
            path: key.to_string(),
        })
        .attach_printable(format!("`{segment}` is below a scalar value"))),
    }
}
