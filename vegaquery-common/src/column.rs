use datafusion_common::Column;
use datafusion_expr::Expr;

/// Column reference that never splits on `.`, so field names containing periods stay intact
pub fn flat_col(col_name: &str) -> Expr {
    Expr::Column(Column::from_name(col_name))
}

pub fn unescaped_col(col_name: &str) -> Expr {
    flat_col(&unescape_field(col_name))
}

pub fn escape_field(col: &str) -> String {
    // Escape single quote, double quote, period, and brackets with a backslash
    col.replace('\'', "\\'")
        .replace('\"', "\\\"")
        .replace('.', "\\.")
        .replace('[', "\\[")
        .replace(']', "\\]")
}

pub fn unescape_field(col: &str) -> String {
    col.replace("\\'", "'")
        .replace("\\\"", "\"")
        .replace("\\.", ".")
        .replace("\\[", "[")
        .replace("\\]", "]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_round_trips_through_unescape() {
        let col = "avg.b['x']";
        let escaped = escape_field(col);
        assert_eq!(escaped, r#"avg\.b\[\'x\'\]"#);
        assert_eq!(unescape_field(&escaped), col);
    }

    #[test]
    fn test_unescaped_col_keeps_periods() {
        let expr = unescaped_col(r#"a\.b"#);
        assert_eq!(expr, Expr::Column(Column::from_name("a.b")));
    }
}
