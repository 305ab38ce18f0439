//! SQL-text migrations
//!
//! Each side is split into individual statements and executed in order on
//! the engine's transaction.

use async_trait::async_trait;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

use super::definitions::MigrationSteps;
use crate::error::ActionResult;
use crate::store::StoreTransaction;

/// Migration steps written as SQL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlMigration {
    pub up_sql: String,
    pub down_sql: String,
}

impl SqlMigration {
    pub fn new(up_sql: impl Into<String>, down_sql: impl Into<String>) -> Self {
        Self {
            up_sql: up_sql.into(),
            down_sql: down_sql.into(),
        }
    }

    async fn run(tx: &mut dyn StoreTransaction, sql: &str) -> ActionResult<()> {
        for statement in split_sql_statements(sql) {
            tx.execute(&statement).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl MigrationSteps for SqlMigration {
    async fn apply(&self, tx: &mut dyn StoreTransaction) -> ActionResult<()> {
        Self::run(tx, &self.up_sql).await
    }

    async fn compensate(&self, tx: &mut dyn StoreTransaction) -> ActionResult<()> {
        Self::run(tx, &self.down_sql).await
    }
}

/// Split SQL text into statements using the generic SQL parser.
///
/// Text the parser rejects (vendor syntax, procedural blocks) falls back to
/// splitting on semicolons outside quotes, `$tag$` bodies and comments.
pub fn split_sql_statements(sql: &str) -> Vec<String> {
    if sql.trim().is_empty() {
        return Vec::new();
    }

    let dialect = GenericDialect {};
    match Parser::parse_sql(&dialect, sql) {
        Ok(parsed_statements) => parsed_statements
            .into_iter()
            .map(|stmt| format!("{};", stmt))
            .collect(),
        Err(e) => {
            tracing::warn!("SQL parsing failed, using semicolon splitting: {}", e);
            split_on_semicolons(sql)
        }
    }
}

/// Split on top-level `;`, skipping quoted text, dollar-quoted bodies and comments
fn split_on_semicolons(sql: &str) -> Vec<String> {
    let bytes = sql.as_bytes();
    let mut statements = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"' | b'`') => {
                // A doubled quote closes and reopens the literal
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    i += 1;
                }
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i < bytes.len() && !bytes[i..].starts_with(b"*/") {
                    i += 1;
                }
                i += 1;
            }
            b'$' => {
                if let Some(tag_len) = dollar_tag_len(&bytes[i..]) {
                    let tag = &bytes[i..i + tag_len];
                    i += tag_len;
                    while i < bytes.len() && !bytes[i..].starts_with(tag) {
                        i += 1;
                    }
                    i += tag_len - 1;
                }
            }
            b';' => {
                push_statement(&mut statements, &sql[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }

    push_statement(&mut statements, &sql[start..]);
    statements
}

/// Length of a `$tag$` opener at the start of `bytes`; `$1` placeholders are not tags
fn dollar_tag_len(bytes: &[u8]) -> Option<usize> {
    let mut end = 1;
    while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
        end += 1;
    }
    let starts_with_digit = end > 1 && bytes[1].is_ascii_digit();
    (bytes.get(end) == Some(&b'$') && !starts_with_digit).then_some(end + 1)
}

fn push_statement(statements: &mut Vec<String>, text: &str) {
    let text = text.trim();
    if !text.is_empty() {
        statements.push(format!("{};", text));
    }
}
