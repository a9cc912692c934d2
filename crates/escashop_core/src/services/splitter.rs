//! Migration file splitting.
//!
//! Splits raw SQL into individually executable statements with a single
//! line-oriented forward scan. Statements end at a line whose trimmed text
//! ends with `;`, unless that line is inside a dollar-quoted literal
//! (`$$ ... $$` or `$tag$ ... $tag$`), where semicolons and `--` markers are
//! literal text.
//!
//! Known limitation: at most one dollar-quote delimiter is examined per
//! line. A line that both opens and closes a quote (`SELECT $$a;b$$;`), or
//! that holds two different delimiters, is not tracked correctly. Keep
//! function bodies on their own lines in migration files.

use crate::models::MigrationStatement;

/// Split `sql` into ordered, trimmed, non-empty statements.
///
/// Pure and deterministic: the same input always yields the same output.
pub fn split_statements(sql: &str) -> Vec<MigrationStatement> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut quote_tag: Option<&str> = None;

    for line in sql.split('\n') {
        let trimmed = line.trim();

        if quote_tag.is_none() && (trimmed.is_empty() || trimmed.starts_with("--")) {
            continue;
        }

        if let Some(delimiter) = find_dollar_delimiter(line) {
            match quote_tag {
                None => quote_tag = Some(delimiter),
                Some(open) if open == delimiter => quote_tag = None,
                Some(_) => {}
            }
        }

        current.push_str(line);
        current.push('\n');

        if quote_tag.is_none() && trimmed.ends_with(';') {
            push_statement(&mut statements, &current);
            current.clear();
        }
    }

    push_statement(&mut statements, &current);
    statements
}

fn push_statement(statements: &mut Vec<MigrationStatement>, buffer: &str) {
    let sql = buffer.trim();
    if !sql.is_empty() {
        statements.push(MigrationStatement::new(statements.len() + 1, sql));
    }
}

/// First `$tag$` delimiter on the line: a `$`, any non-`$` text, then a `$`.
///
/// Positional parameters such as `$1` on a line with a later `$` also match;
/// migration files are plain DDL and do not use them.
fn find_dollar_delimiter(line: &str) -> Option<&str> {
    let start = line.find('$')?;
    let len = line[start + 1..].find('$')?;
    Some(&line[start..start + len + 2])
}
