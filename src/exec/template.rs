// src/exec/template.rs

//! Command template rendering.
//!
//! Job commands may contain `{name}` placeholders that are substituted from
//! the configured values (plus the implicit `python_version`). Doubled
//! braces `{{` and `}}` produce literal braces. Rendering is pure: a missing
//! value fails the whole template with no partial output.

use crate::errors::ConfigError;
use crate::types::Values;

/// Substitute every `{name}` placeholder in `template` from `values`.
pub fn render(template: &str, values: &Values) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                if chars.peek() == Some(&'{') {
                    chars.next();
                    out.push('{');
                    continue;
                }
                let mut name = String::new();
                let mut closed = false;
                for inner in chars.by_ref() {
                    if inner == '}' {
                        closed = true;
                        break;
                    }
                    name.push(inner);
                }
                if !closed {
                    return Err(ConfigError::Invalid(format!(
                        "unterminated placeholder in command '{template}'"
                    )));
                }
                match values.get(&name) {
                    Some(value) => out.push_str(value),
                    None => {
                        return Err(ConfigError::MissingValue {
                            template: template.to_string(),
                            placeholder: name,
                        });
                    }
                }
            }
            '}' => {
                if chars.peek() == Some(&'}') {
                    chars.next();
                }
                out.push('}');
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}
