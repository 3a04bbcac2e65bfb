//! 2D lumisection histogram repository
//!
//! Writes are bulk COPYs of freshly extracted histograms; reads go
//! through the filter set with a window count for pagination.

use serde::Serialize;
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder, Row};

use crate::db::pagination::{Paginated, Pagination};
use crate::error::EtlResult;
use crate::filters::LumisectionHistos2DFilter;
use crate::pgsql::{BulkCopy, CopyValue, TableRef, ToCopyRow};

pub const HISTO_COLUMNS: &[&str] = &["lumisection_id", "title", "entries", "data"];

pub fn histos_table() -> TableRef {
    TableRef::new("lumisection_histos2d")
}

/// Histogram row about to be copied in
#[derive(Debug, Clone, PartialEq)]
pub struct NewHisto2D {
    pub lumisection_id: i64,
    pub title: String,
    pub entries: i64,
    pub data: Option<serde_json::Value>,
}

impl ToCopyRow for NewHisto2D {
    fn into_copy_values(self) -> Vec<CopyValue> {
        vec![
            self.lumisection_id.into(),
            self.title.into(),
            self.entries.into(),
            self.data.into(),
        ]
    }
}

/// Histogram row read back with its run and lumisection numbers
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LumisectionHisto2D {
    pub id: i64,
    pub run_number: i32,
    pub ls_number: i32,
    pub title: String,
    pub entries: i64,
    pub data: Option<serde_json::Value>,
}

/// Copy histograms into the table, returning the number of rows written.
pub async fn bulk_create<I>(conn: &mut PgConnection, rows: I, chunk_bytes: usize) -> EtlResult<u64>
where
    I: IntoIterator<Item = NewHisto2D>,
{
    BulkCopy::new(histos_table(), HISTO_COLUMNS)
        .chunk_bytes(chunk_bytes)
        .copy_expert(conn, rows)
        .await
}

/// Histogram repository
pub struct HistoRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> HistoRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List histograms matching `filter`, ordered by run, lumisection, title.
    pub async fn list(
        &self,
        filter: &LumisectionHistos2DFilter,
        page: Pagination,
    ) -> EtlResult<Paginated<LumisectionHisto2D>> {
        let mut builder = QueryBuilder::<Postgres>::new(
            r#"
            SELECT
                h.id,
                r.run_number,
                l.ls_number,
                h.title,
                h.entries,
                h.data,
                COUNT(*) OVER() AS total
            FROM lumisection_histos2d h
            JOIN lumisections l ON l.id = h.lumisection_id
            JOIN runs r ON r.id = l.run_id
            WHERE TRUE"#,
        );
        filter.push_conditions(&mut builder);
        builder.push(" ORDER BY r.run_number, l.ls_number, h.title, h.id LIMIT ");
        builder.push_bind(page.limit());
        builder.push(" OFFSET ");
        builder.push_bind(page.offset());

        let rows = builder.build().fetch_all(self.pool).await?;

        let total = match rows.first() {
            Some(row) => row.try_get::<i64, _>("total")?,
            None if page.page > 1 => self.count(filter).await?,
            None => 0,
        };
        let items = rows
            .iter()
            .map(LumisectionHisto2D::from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Paginated {
            items,
            total,
            page: page.page,
            per_page: page.per_page,
        })
    }

    /// Number of histograms matching `filter`.
    pub async fn count(&self, filter: &LumisectionHistos2DFilter) -> EtlResult<i64> {
        let mut builder = QueryBuilder::<Postgres>::new(
            r#"
            SELECT COUNT(*)
            FROM lumisection_histos2d h
            JOIN lumisections l ON l.id = h.lumisection_id
            JOIN runs r ON r.id = l.run_id
            WHERE TRUE"#,
        );
        filter.push_conditions(&mut builder);
        let total: i64 = builder.build_query_scalar().fetch_one(self.pool).await?;
        Ok(total)
    }

    /// All distinct titles, the choices of the `title` filter.
    pub async fn titles(&self) -> EtlResult<Vec<String>> {
        let titles: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT title FROM lumisection_histos2d ORDER BY title",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(titles)
    }
}
