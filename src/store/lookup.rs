//! Label normalization: map a label string to a stable integer id

use super::quote_ident;
use crate::error::Result;
use sqlx::SqliteConnection;
use tracing::info;

/// Return the id of the row in `table` whose `column` equals `value`,
/// inserting it first if it is not there yet.
///
/// `column` must carry a UNIQUE constraint. The insert is an insert-if-absent,
/// so a concurrent resolver of the same unseen value cannot create a second
/// row; whoever loses the insert reads back the winner's id.
pub async fn resolve(
    conn: &mut SqliteConnection,
    table: &str,
    column: &str,
    value: &str,
) -> Result<i64> {
    let table_q = quote_ident(table)?;
    let column_q = quote_ident(column)?;
    let select = format!("SELECT id FROM {} WHERE {} = ?", table_q, column_q);

    let existing: Option<i64> = sqlx::query_scalar(&select)
        .bind(value)
        .fetch_optional(&mut *conn)
        .await?;
    if let Some(id) = existing {
        return Ok(id);
    }

    let insert = format!(
        "INSERT INTO {table} ({column}) VALUES (?) ON CONFLICT({column}) DO NOTHING RETURNING id",
        table = table_q,
        column = column_q
    );
    let inserted: Option<i64> = sqlx::query_scalar(&insert)
        .bind(value)
        .fetch_optional(&mut *conn)
        .await?;

    match inserted {
        Some(id) => {
            info!("Inserted {:?} into table `{}` with id {}", value, table, id);
            Ok(id)
        }
        None => {
            let id: i64 = sqlx::query_scalar(&select)
                .bind(value)
                .fetch_one(&mut *conn)
                .await?;
            Ok(id)
        }
    }
}
