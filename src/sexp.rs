//! S-expression plist helpers shared by policy files and frame traces.
//!
//! Accepts both `Value::Keyword("key")` (elisp-style parser) and
//! `Value::Symbol(":key")` (default parser) spellings of `:key`.

use lexpr::Value;

/// Parse one s-expression.
pub fn parse(raw: &str) -> Result<Value, lexpr::parse::Error> {
    lexpr::from_str(raw)
}

fn is_key(value: &Value, key: &str) -> bool {
    match value {
        Value::Keyword(k) => k.as_ref() == key,
        Value::Symbol(s) => s.strip_prefix(':') == Some(key),
        _ => false,
    }
}

/// Raw value following `:key` in a plist.
pub fn get_value<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let mut current = value;
    while let Value::Cons(pair) = current {
        if is_key(pair.car(), key) {
            return match pair.cdr() {
                Value::Cons(next) => Some(next.car()),
                _ => None,
            };
        }
        current = pair.cdr();
    }
    None
}

/// Render an atom as a plain string: keywords lose their colon, `nil`
/// and `()` become "nil", booleans become "t"/"nil".
pub fn atom_string(value: &Value) -> String {
    match value {
        Value::Keyword(v) => v.to_string(),
        Value::Symbol(v) => v.strip_prefix(':').unwrap_or(v).to_string(),
        Value::String(v) => v.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => bool_atom(*b).to_string(),
        Value::Null | Value::Nil => "nil".to_string(),
        other => other.to_string(),
    }
}

/// Extract a keyword value from a plist as a string.
pub fn get_keyword(value: &Value, key: &str) -> Option<String> {
    get_value(value, key).map(atom_string)
}

/// Extract a boolean from a plist.  Treats "nil" as false, anything else as true.
pub fn get_bool(value: &Value, key: &str) -> Option<bool> {
    get_keyword(value, key).map(|s| is_truthy(&s))
}

/// Elisp-style truthiness of a rendered atom.
pub fn is_truthy(atom: &str) -> bool {
    atom != "nil"
}

/// Elements of a proper or improper list, in order (nil elements kept).
pub fn list_items(value: &Value) -> Vec<&Value> {
    let mut items = Vec::new();
    let mut current = value;
    loop {
        match current {
            Value::Cons(pair) => {
                items.push(pair.car());
                current = pair.cdr();
            }
            Value::Null | Value::Nil => break,
            other => {
                items.push(other);
                break;
            }
        }
    }
    items
}

/// Render a boolean as `t`/`nil`.
pub fn bool_atom(b: bool) -> &'static str {
    if b {
        "t"
    } else {
        "nil"
    }
}
