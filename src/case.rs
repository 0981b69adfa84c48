//! Default labels derived from column and field names.

/// Humanize an identifier for display.
/// e.g. "created_at" -> "Created at", "users.email" -> "Email", "userId" -> "User id"
pub fn to_label(name: &str) -> String {
    let last = name.rsplit('.').next().unwrap_or(name);
    let mut out = String::with_capacity(last.len() + 4);
    for (i, c) in last.chars().enumerate() {
        if c == '_' || c == '-' {
            if !out.ends_with(' ') && !out.is_empty() {
                out.push(' ');
            }
        } else if c.is_uppercase() && i > 0 {
            if !out.ends_with(' ') {
                out.push(' ');
            }
            out.extend(c.to_lowercase());
        } else if out.is_empty() {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
    }
    out.trim_end().to_string()
}

/// Whether `s` is safe to interpolate as an identifier: `[A-Za-z_][A-Za-z0-9_]*`,
/// optionally dot-qualified.
pub fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.split('.').all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

/// Whether `s` is safe to interpolate after `::` as a PostgreSQL type name, e.g. `integer`,
/// `timestamp with time zone`, `numeric(10,2)`, `public.status`, `text[]`.
pub fn is_type_name(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | ' ' | '.' | '(' | ')' | ',' | '[' | ']'))
}
