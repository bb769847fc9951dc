//! Positional slot columns (`prefix1`, `prefix2`, ...) holding label ids
//!
//! Slot columns are schema state: they are added on demand and never removed.
//! A recipe with N labels of one kind needs `prefix1..=prefixN` to exist
//! before its ids are assigned.

use super::quote_ident;
use crate::error::{Error, Result};
use sqlx::{Row, SqliteConnection};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Indexes of the slot columns already on `table` for `prefix`
pub async fn existing_slots(
    conn: &mut SqliteConnection,
    table: &str,
    prefix: &str,
) -> Result<BTreeSet<u32>> {
    quote_ident(table)?;
    quote_ident(prefix)?;

    let columns: Vec<String> = sqlx::query_scalar("SELECT name FROM pragma_table_info(?)")
        .bind(table)
        .persistent(false)
        .fetch_all(&mut *conn)
        .await?;

    Ok(columns
        .iter()
        .filter_map(|name| slot_index(name, prefix))
        .collect())
}

fn slot_index(column: &str, prefix: &str) -> Option<u32> {
    let suffix = column.strip_prefix(prefix)?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok().filter(|idx| *idx > 0)
}

fn slot_column(prefix: &str, index: usize) -> String {
    format!("{}{}", prefix, index)
}

/// Make sure `prefix1..=prefix{count}` exist on `table`, adding missing ones
/// as INTEGER columns. Returns how many columns were added.
pub async fn ensure_slots(
    conn: &mut SqliteConnection,
    table: &str,
    prefix: &str,
    count: usize,
) -> Result<usize> {
    let existing = existing_slots(conn, table, prefix).await?;
    let table_q = quote_ident(table)?;

    let mut added = 0;
    for index in 1..=count {
        if u32::try_from(index).is_ok_and(|idx| existing.contains(&idx)) {
            continue;
        }
        let column = slot_column(prefix, index);
        let sql = format!(
            "ALTER TABLE {} ADD COLUMN {} INTEGER",
            table_q,
            quote_ident(&column)?
        );
        sqlx::query(&sql)
            .execute(&mut *conn)
            .await
            .map_err(|source| Error::SchemaEvolution {
                table: table.to_string(),
                column: column.clone(),
                source,
            })?;
        info!("Added column {} to table `{}`", column, table);
        added += 1;
    }

    Ok(added)
}

/// Write `ids[i]` into `prefix{i+1}` of the row where `identity_column = identity_value`.
///
/// Slots keep the order of `ids`; the columns must already exist.
pub async fn assign_slots(
    conn: &mut SqliteConnection,
    table: &str,
    prefix: &str,
    identity_column: &str,
    identity_value: &str,
    ids: &[i64],
) -> Result<()> {
    let table_q = quote_ident(table)?;
    let identity_q = quote_ident(identity_column)?;

    for (position, id) in ids.iter().enumerate() {
        let column = slot_column(prefix, position + 1);
        let sql = format!(
            "UPDATE {} SET {} = ? WHERE {} = ?",
            table_q,
            quote_ident(&column)?,
            identity_q
        );
        sqlx::query(&sql)
            .bind(id)
            .bind(identity_value)
            .execute(&mut *conn)
            .await?;
        debug!(
            "Updated `{}` in `{}` for {:?} with {}",
            column, table, identity_value, id
        );
    }

    Ok(())
}

/// Non-null slot values of one row, in slot order
pub async fn read_slots(
    conn: &mut SqliteConnection,
    table: &str,
    prefix: &str,
    identity_column: &str,
    identity_value: &str,
) -> Result<Vec<i64>> {
    let slots = existing_slots(conn, table, prefix).await?;
    if slots.is_empty() {
        return Ok(Vec::new());
    }

    let columns = slots
        .iter()
        .map(|idx| quote_ident(&slot_column(prefix, *idx as usize)))
        .collect::<Result<Vec<_>>>()?;
    let sql = format!(
        "SELECT {} FROM {} WHERE {} = ?",
        columns.join(", "),
        quote_ident(table)?,
        quote_ident(identity_column)?
    );

    let row = sqlx::query(&sql)
        .bind(identity_value)
        .persistent(false)
        .fetch_optional(&mut *conn)
        .await?;

    let Some(row) = row else {
        return Ok(Vec::new());
    };

    let mut ids = Vec::new();
    for i in 0..columns.len() {
        if let Some(id) = row.try_get::<Option<i64>, _>(i)? {
            ids.push(id);
        }
    }
    Ok(ids)
}
