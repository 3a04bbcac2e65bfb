//! Bulk loading through `COPY ... FROM STDIN`.
//!
//! Two entry points:
//! - [`copy_expert`]: plain COPY into the target. Constraint violations
//!   surface as database errors.
//! - [`copy_expert_onconflict_skip`]: COPY into a session-local staging
//!   table, then `INSERT ... SELECT ... ON CONFLICT DO NOTHING` into the
//!   target, optionally returning the primary key of inserted rows.
//!
//! The staging sequence runs in a transaction (a savepoint when the
//! caller already holds one) and the staging table is `ON COMMIT DROP`,
//! so it never outlives the call.

use std::fmt;

use sqlx::postgres::{PgConnection, PgRow};
use sqlx::{Column, Connection, Row, TypeInfo};
use tracing::debug;

use super::value::{encode_row, CopyValue, ToCopyRow};
use crate::error::{EtlError, EtlResult};

/// Rows are flushed to the server whenever the buffer grows past this.
pub const DEFAULT_CHUNK_BYTES: usize = 1024 * 1024;

/// Table addressed by an optional schema and a name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub schema: Option<String>,
    pub name: String,
}

impl TableRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    pub fn in_schema(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            name: name.into(),
        }
    }

    /// Quoted, schema-qualified name.
    pub fn qualified(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", quote_ident(schema), quote_ident(&self.name)),
            None => quote_ident(&self.name),
        }
    }

    /// Staging tables live in the session's temp schema whatever the target schema is.
    pub fn staging(&self) -> TableRef {
        TableRef::new(format!("{}_tmp", self.name))
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Result of [`copy_expert_onconflict_skip`]
#[derive(Debug, Clone, PartialEq)]
pub enum CopyOutcome {
    /// Number of rows inserted into the target
    Rows(u64),
    /// Primary key of every row inserted into the target
    Ids(Vec<CopyValue>),
}

impl CopyOutcome {
    pub fn inserted(&self) -> u64 {
        match self {
            CopyOutcome::Rows(n) => *n,
            CopyOutcome::Ids(ids) => ids.len() as u64,
        }
    }
}

/// Quote an identifier, doubling embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn column_list(keys: &[String]) -> String {
    keys.iter()
        .map(|k| quote_ident(k))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn copy_statement(table: &TableRef, keys: &[String]) -> String {
    format!(
        "COPY {} ({}) FROM STDIN WITH CSV",
        table.qualified(),
        column_list(keys)
    )
}

pub(crate) fn create_staging_statement(table: &TableRef, keys: &[String]) -> String {
    format!(
        "CREATE TEMP TABLE {} ON COMMIT DROP AS SELECT {} FROM {} WITH NO DATA",
        table.staging().qualified(),
        column_list(keys),
        table.qualified()
    )
}

pub(crate) fn insert_skip_statement(
    table: &TableRef,
    keys: &[String],
    returning: Option<&str>,
) -> String {
    let columns = column_list(keys);
    let mut sql = format!(
        "INSERT INTO {} ({}) SELECT {} FROM {} ON CONFLICT DO NOTHING",
        table.qualified(),
        columns,
        columns,
        table.staging().qualified()
    );
    if let Some(pk) = returning {
        sql.push_str(" RETURNING ");
        sql.push_str(&quote_ident(pk));
    }
    sql
}

pub(crate) fn drop_staging_statement(table: &TableRef) -> String {
    format!("DROP TABLE {}", table.staging().qualified())
}

/// Bulk copy of rows into one table through a fixed column list
#[derive(Debug, Clone)]
pub struct BulkCopy {
    table: TableRef,
    keys: Vec<String>,
    chunk_bytes: usize,
}

impl BulkCopy {
    pub fn new<K: AsRef<str>>(table: TableRef, keys: &[K]) -> Self {
        Self {
            table,
            keys: keys.iter().map(|k| k.as_ref().to_owned()).collect(),
            chunk_bytes: DEFAULT_CHUNK_BYTES,
        }
    }

    pub fn chunk_bytes(mut self, chunk_bytes: usize) -> Self {
        self.chunk_bytes = chunk_bytes.max(1);
        self
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    /// COPY rows straight into the target, returning the server's row count.
    pub async fn copy_expert<I>(&self, conn: &mut PgConnection, rows: I) -> EtlResult<u64>
    where
        I: IntoIterator,
        I::Item: ToCopyRow,
    {
        self.check_keys()?;
        let statement = copy_statement(&self.table, &self.keys);
        let copied = self.stream(conn, &statement, rows).await?;
        debug!(table = %self.table, rows = copied, "copy finished");
        Ok(copied)
    }

    /// COPY rows into a staging table and move the non-conflicting ones over.
    ///
    /// With `return_ids`, the `pk` column of each inserted row is returned
    /// instead of the count. Asking for ids without naming `pk` is rejected
    /// before any statement is sent.
    pub async fn copy_expert_onconflict_skip<I>(
        &self,
        conn: &mut PgConnection,
        rows: I,
        return_ids: bool,
        pk: Option<&str>,
    ) -> EtlResult<CopyOutcome>
    where
        I: IntoIterator,
        I::Item: ToCopyRow,
    {
        let returning = match (return_ids, pk) {
            (true, None) => {
                return Err(EtlError::validation("Can't return ids if pk is None"));
            }
            (true, Some(pk)) => Some(pk),
            (false, _) => None,
        };
        self.check_keys()?;

        let mut tx = conn.begin().await?;

        let create = create_staging_statement(&self.table, &self.keys);
        debug!(sql = %create, "creating staging table");
        sqlx::query(&create).execute(&mut *tx).await?;

        let staging = self.table.staging();
        let staged = self
            .stream(&mut *tx, &copy_statement(&staging, &self.keys), rows)
            .await?;

        let insert = insert_skip_statement(&self.table, &self.keys, returning);
        debug!(sql = %insert, staged, "moving staged rows");
        let outcome = match returning {
            Some(pk) => {
                let rows = sqlx::query(&insert).fetch_all(&mut *tx).await?;
                let ids = rows
                    .iter()
                    .map(|row| decode_key(row, pk))
                    .collect::<EtlResult<Vec<_>>>()?;
                CopyOutcome::Ids(ids)
            }
            None => {
                let result = sqlx::query(&insert).execute(&mut *tx).await?;
                CopyOutcome::Rows(result.rows_affected())
            }
        };

        sqlx::query(&drop_staging_statement(&self.table))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!(
            table = %self.table,
            staged,
            inserted = outcome.inserted(),
            "conflict-skipping copy finished"
        );
        Ok(outcome)
    }

    fn check_keys(&self) -> EtlResult<()> {
        if self.keys.is_empty() {
            return Err(EtlError::validation(format!(
                "no columns given for copy into {}",
                self.table
            )));
        }
        Ok(())
    }

    async fn stream<I>(&self, conn: &mut PgConnection, statement: &str, rows: I) -> EtlResult<u64>
    where
        I: IntoIterator,
        I::Item: ToCopyRow,
    {
        debug!(sql = %statement, "starting copy");
        let mut copy = conn.copy_in_raw(statement).await?;
        let mut buf = Vec::with_capacity(self.chunk_bytes.min(DEFAULT_CHUNK_BYTES));

        for (idx, row) in rows.into_iter().enumerate() {
            let values = row.into_copy_values();
            if values.len() != self.keys.len() {
                copy.abort("row does not match column list").await?;
                return Err(EtlError::validation(format!(
                    "row {} has {} values but {} columns were given for {}",
                    idx,
                    values.len(),
                    self.keys.len(),
                    self.table
                )));
            }
            encode_row(&values, &mut buf);
            if buf.len() >= self.chunk_bytes {
                copy.send(buf.as_slice()).await?;
                buf.clear();
            }
        }
        if !buf.is_empty() {
            copy.send(buf.as_slice()).await?;
        }

        Ok(copy.finish().await?)
    }
}

/// COPY `rows` into `table` through the `keys` columns.
pub async fn copy_expert<K, I>(
    table: &TableRef,
    conn: &mut PgConnection,
    keys: &[K],
    rows: I,
) -> EtlResult<u64>
where
    K: AsRef<str>,
    I: IntoIterator,
    I::Item: ToCopyRow,
{
    BulkCopy::new(table.clone(), keys)
        .copy_expert(conn, rows)
        .await
}

/// COPY `rows` into `table`, skipping rows whose key already exists.
pub async fn copy_expert_onconflict_skip<K, I>(
    table: &TableRef,
    conn: &mut PgConnection,
    keys: &[K],
    rows: I,
    return_ids: bool,
    pk: Option<&str>,
) -> EtlResult<CopyOutcome>
where
    K: AsRef<str>,
    I: IntoIterator,
    I::Item: ToCopyRow,
{
    BulkCopy::new(table.clone(), keys)
        .copy_expert_onconflict_skip(conn, rows, return_ids, pk)
        .await
}

fn decode_key(row: &PgRow, pk: &str) -> EtlResult<CopyValue> {
    let type_name = row
        .columns()
        .first()
        .map(|column| column.type_info().name().to_owned())
        .unwrap_or_default();

    let value: CopyValue = match type_name.as_str() {
        "INT2" => row.try_get::<Option<i16>, _>(0)?.into(),
        "INT4" => row.try_get::<Option<i32>, _>(0)?.into(),
        "INT8" => row.try_get::<Option<i64>, _>(0)?.into(),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => row.try_get::<Option<String>, _>(0)?.into(),
        "UUID" => row.try_get::<Option<uuid::Uuid>, _>(0)?.into(),
        "BOOL" => row.try_get::<Option<bool>, _>(0)?.into(),
        _ => {
            return Err(EtlError::UnsupportedKeyType {
                column: pk.to_owned(),
                type_name,
            })
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn qualified_names_are_quoted() {
        assert_eq!(TableRef::new("runs").qualified(), "\"runs\"");
        assert_eq!(
            TableRef::in_schema("dqm", "fact_ml_bad_lumis").qualified(),
            "\"dqm\".\"fact_ml_bad_lumis\""
        );
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn staging_table_drops_schema() {
        let table = TableRef::in_schema("dqm", "fact_ml_bad_lumis");
        assert_eq!(table.staging(), TableRef::new("fact_ml_bad_lumis_tmp"));
    }

    #[test]
    fn copy_statement_lists_columns() {
        let sql = copy_statement(&TableRef::new("runs"), &keys(&["run_number"]));
        assert_eq!(sql, "COPY \"runs\" (\"run_number\") FROM STDIN WITH CSV");
    }

    #[test]
    fn staging_statement_copies_column_shape_only() {
        let sql = create_staging_statement(
            &TableRef::in_schema("dqm", "lumisections"),
            &keys(&["run_id", "ls_number"]),
        );
        assert_eq!(
            sql,
            "CREATE TEMP TABLE \"lumisections_tmp\" ON COMMIT DROP AS \
             SELECT \"run_id\", \"ls_number\" FROM \"dqm\".\"lumisections\" WITH NO DATA"
        );
    }

    #[test]
    fn insert_statement_with_and_without_returning() {
        let table = TableRef::new("runs");
        let cols = keys(&["run_number"]);
        assert_eq!(
            insert_skip_statement(&table, &cols, None),
            "INSERT INTO \"runs\" (\"run_number\") SELECT \"run_number\" FROM \"runs_tmp\" \
             ON CONFLICT DO NOTHING"
        );
        assert!(insert_skip_statement(&table, &cols, Some("id")).ends_with(" RETURNING \"id\""));
    }

    #[test]
    fn drop_statement_targets_staging() {
        assert_eq!(
            drop_staging_statement(&TableRef::new("runs")),
            "DROP TABLE \"runs_tmp\""
        );
    }

    #[test]
    fn outcome_counts() {
        assert_eq!(CopyOutcome::Rows(3).inserted(), 3);
        assert_eq!(
            CopyOutcome::Ids(vec![CopyValue::Int(1), CopyValue::Int(2)]).inserted(),
            2
        );
    }

    #[test]
    fn chunk_size_has_a_floor() {
        let copy = BulkCopy::new(TableRef::new("runs"), &["run_number"]).chunk_bytes(0);
        assert_eq!(copy.chunk_bytes, 1);
    }
}
