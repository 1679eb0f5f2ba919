//! Logpoint message formatting.
//!
//! `$0`, `$1`, ... are replaced by the rendered value of the matching watch
//! expression; `$$` is a literal `$`. References past the last expression are
//! left as written.

use crate::protocol::Variable;

pub(crate) fn format_message(format: &str, values: &[Variable], table: &[Variable]) -> String {
    let mut out = String::with_capacity(format.len());
    let mut chars = format.char_indices().peekable();
    while let Some((start, ch)) = chars.next() {
        if ch != '$' {
            out.push(ch);
            continue;
        }
        match chars.peek() {
            Some((_, '$')) => {
                chars.next();
                out.push('$');
            }
            Some((_, next)) if next.is_ascii_digit() => {
                let mut end = start + 1;
                while let Some((idx, digit)) = chars.peek().copied() {
                    if !digit.is_ascii_digit() {
                        break;
                    }
                    end = idx + 1;
                    chars.next();
                }
                let value = format[start + 1..end]
                    .parse::<usize>()
                    .ok()
                    .and_then(|idx| values.get(idx));
                match value {
                    Some(value) => out.push_str(&render(value, table)),
                    None => out.push_str(&format[start..end]),
                }
            }
            _ => out.push('$'),
        }
    }
    out
}

/// One-line rendering of a captured value.
pub(crate) fn render(variable: &Variable, table: &[Variable]) -> String {
    if let Some(status) = variable.status.as_ref().filter(|status| status.is_error) {
        return status.message().to_string();
    }
    if let Some(entry) = variable.var_table_index.and_then(|idx| table.get(idx)) {
        return render_compound(entry, table);
    }
    if !variable.members.is_empty() {
        return render_compound(variable, table);
    }
    variable
        .value
        .clone()
        .unwrap_or_else(|| "undefined".to_string())
}

fn render_compound(entry: &Variable, table: &[Variable]) -> String {
    if let Some(status) = entry.status.as_ref().filter(|status| status.is_error) {
        return status.message().to_string();
    }
    let members = entry.members.iter().filter(|member| member.name.is_some());
    if entry.type_name.as_deref() == Some("Array") {
        let items: Vec<String> = members.map(|member| shallow(member, table)).collect();
        format!("[{}]", items.join(", "))
    } else {
        let items: Vec<String> = members
            .map(|member| {
                let name = member.name.as_deref().unwrap_or_default();
                format!("{name}: {}", shallow(member, table))
            })
            .collect();
        format!("{{{}}}", items.join(", "))
    }
}

/// Members are rendered one level deep; nested objects show their description.
fn shallow(member: &Variable, table: &[Variable]) -> String {
    if let Some(status) = member.status.as_ref().filter(|status| status.is_error) {
        return status.message().to_string();
    }
    match member.var_table_index.and_then(|idx| table.get(idx)) {
        Some(entry) => entry.value.clone().unwrap_or_else(|| "Object".to_string()),
        None => member
            .value
            .clone()
            .unwrap_or_else(|| "undefined".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{RefersTo, StatusMessage};

    fn leaf(name: &str, value: &str) -> Variable {
        Variable::named(name).with_value(value)
    }

    #[test]
    fn substitutes_and_escapes() {
        let values = vec![leaf("a", "1"), leaf("b", "\"hi\"")];
        assert_eq!(
            format_message("a=$0 b=$1 cost=$$5 missing=$7 $", &values, &[]),
            "a=1 b=\"hi\" cost=$5 missing=$7 $"
        );
    }

    #[test]
    fn compound_values_render_inline() {
        let table = vec![
            Variable {
                type_name: Some("Object".into()),
                value: Some("Object".into()),
                members: vec![leaf("a", "1"), Variable {
                    name: Some("inner".into()),
                    var_table_index: Some(1),
                    ..Variable::default()
                }],
                ..Variable::default()
            },
            Variable {
                type_name: Some("Array".into()),
                value: Some("Array(2)".into()),
                members: vec![leaf("0", "1"), leaf("1", "2")],
                ..Variable::default()
            },
        ];
        let values = vec![
            Variable {
                name: Some("o".into()),
                var_table_index: Some(0),
                ..Variable::default()
            },
            Variable {
                name: Some("xs".into()),
                var_table_index: Some(1),
                ..Variable::default()
            },
            Variable::named("bad").with_status(StatusMessage::error(
                RefersTo::VariableValue,
                "ReferenceError: bad is not defined",
            )),
        ];
        assert_eq!(
            format_message("$0 $1 $2", &values, &table),
            "{a: 1, inner: Array(2)} [1, 2] ReferenceError: bad is not defined"
        );
    }
}
