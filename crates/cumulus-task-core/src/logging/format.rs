//! Placeholder substitution for log message templates.
//!
//! `{}` / `{0}` / `{name}` を置換します。`{{` と `}}` はリテラルの波括弧です。
//! 書式指定（`{0:>8}` など）や属性アクセスはサポートしません。
//!
//! 引数が一つもない場合は置換そのものを行わないため、JSON を含む
//! テキストもそのまま通ります（[`FormatArgs::is_empty`] を参照）。

use std::collections::BTreeMap;

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("single '{{' encountered in format string at byte {0}")]
    UnclosedBrace(usize),

    #[error("single '}}' encountered in format string at byte {0}")]
    UnmatchedBrace(usize),

    #[error("replacement index {0} out of range ({1} positional arguments)")]
    MissingIndex(usize, usize),

    #[error("no named argument `{0}`")]
    MissingName(String),

    #[error("cannot switch between automatic and manual field numbering")]
    MixedNumbering,

    #[error("unsupported replacement field `{{{0}}}`")]
    UnsupportedField(String),
}

/// Positional and named substitution values. Both halves are optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormatArgs {
    pub positional: Vec<Value>,
    pub named: BTreeMap<String, Value>,
}

impl FormatArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn positional<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            positional: values.into_iter().map(Into::into).collect(),
            named: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    pub fn named(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named.insert(name.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }
}

enum Numbering {
    Unset,
    Auto(usize),
    Manual,
}

/// Substitute `args` into `template`.
pub fn format_template(template: &str, args: &FormatArgs) -> Result<String, FormatError> {
    let mut out = String::with_capacity(template.len());
    let mut numbering = Numbering::Unset;
    let mut chars = template.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '{' => {
                if chars.next_if(|&(_, c)| c == '{').is_some() {
                    out.push('{');
                    continue;
                }
                let mut field = String::new();
                loop {
                    match chars.next() {
                        Some((_, '}')) => break,
                        Some((_, '{')) | None => return Err(FormatError::UnclosedBrace(pos)),
                        Some((_, c)) => field.push(c),
                    }
                }
                let value = lookup(&field, args, &mut numbering)?;
                push_value(&mut out, value);
            }
            '}' => {
                if chars.next_if(|&(_, c)| c == '}').is_none() {
                    return Err(FormatError::UnmatchedBrace(pos));
                }
                out.push('}');
            }
            c => out.push(c),
        }
    }
    Ok(out)
}

fn lookup<'a>(
    field: &str,
    args: &'a FormatArgs,
    numbering: &mut Numbering,
) -> Result<&'a Value, FormatError> {
    if field.contains([':', '!', '.', '[']) {
        return Err(FormatError::UnsupportedField(field.to_string()));
    }

    let index = if field.is_empty() {
        let next = match numbering {
            Numbering::Unset => 0,
            Numbering::Auto(next) => *next,
            Numbering::Manual => return Err(FormatError::MixedNumbering),
        };
        *numbering = Numbering::Auto(next + 1);
        next
    } else if let Ok(index) = field.parse::<usize>() {
        if matches!(numbering, Numbering::Auto(_)) {
            return Err(FormatError::MixedNumbering);
        }
        *numbering = Numbering::Manual;
        index
    } else {
        return args
            .named
            .get(field)
            .ok_or_else(|| FormatError::MissingName(field.to_string()));
    };

    args.positional
        .get(index)
        .ok_or(FormatError::MissingIndex(index, args.positional.len()))
}

fn push_value(out: &mut String, value: &Value) {
    match value {
        Value::String(s) => out.push_str(s),
        other => out.push_str(&other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn automatic_numbering() {
        let args = FormatArgs::positional(["foo", "bar"]);
        assert_eq!(
            format_template("test formatted {} {}", &args).unwrap(),
            "test formatted foo bar"
        );
    }

    #[test]
    fn manual_numbering_and_names() {
        let args = FormatArgs::new().arg("foo").named("foo", "bar");
        assert_eq!(
            format_template("test formatted {0} {foo}", &args).unwrap(),
            "test formatted foo bar"
        );
        assert_eq!(format_template("{0}{0}", &args).unwrap(), "foofoo");
    }

    #[test]
    fn non_string_values_render_as_json() {
        let args = FormatArgs::new().arg(3).arg(json!({"a": 1})).arg(Value::Null);
        assert_eq!(
            format_template("{} {} {}", &args).unwrap(),
            r#"3 {"a":1} null"#
        );
    }

    #[test]
    fn doubled_braces_are_literals() {
        let args = FormatArgs::new().arg("x");
        assert_eq!(format_template("{{{}}}", &args).unwrap(), "{x}");
    }

    #[test]
    fn errors_are_reported() {
        let one = FormatArgs::new().arg("x");
        assert_eq!(
            format_template("{} {}", &one),
            Err(FormatError::MissingIndex(1, 1))
        );
        assert_eq!(
            format_template("{missing}", &one),
            Err(FormatError::MissingName("missing".into()))
        );
        assert_eq!(format_template("{} {0}", &one), Err(FormatError::MixedNumbering));
        assert_eq!(format_template("{0} {}", &one), Err(FormatError::MixedNumbering));
        assert_eq!(format_template("oops {", &one), Err(FormatError::UnclosedBrace(5)));
        assert_eq!(format_template("oops }", &one), Err(FormatError::UnmatchedBrace(5)));
        assert!(matches!(
            format_template("{0:>4}", &one),
            Err(FormatError::UnsupportedField(_))
        ));
    }

    #[test]
    fn empty_args_are_detected() {
        assert!(FormatArgs::new().is_empty());
        assert!(!FormatArgs::new().named("k", 1).is_empty());
    }
}
