//! Dialect-neutral `?` placeholders to PostgreSQL `$n`.

/// Number every `?` outside quoted literals and identifiers, left to right.
pub fn to_numbered(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut n = 0u32;
    let mut quote: Option<char> = None;
    for c in sql.chars() {
        match quote {
            Some(q) => {
                out.push(c);
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    out.push(c);
                }
                '?' => {
                    n += 1;
                    out.push('$');
                    out.push_str(&n.to_string());
                }
                _ => out.push(c),
            },
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::to_numbered;

    #[test]
    fn numbers_in_order() {
        assert_eq!(
            to_numbered("SELECT a FROM t WHERE b = ? AND c BETWEEN ? AND ?"),
            "SELECT a FROM t WHERE b = $1 AND c BETWEEN $2 AND $3"
        );
    }

    #[test]
    fn skips_quoted_text() {
        assert_eq!(
            to_numbered("SELECT '?' AS \"q?\" FROM t WHERE x = ? AND y = 'it''s?'"),
            "SELECT '?' AS \"q?\" FROM t WHERE x = $1 AND y = 'it''s?'"
        );
    }
}
