//! Filter set for browsing 2D lumisection histograms.
//!
//! Lookups use the same double-underscore names the web application
//! exposes (`lumisection__run__run_number__gte`, ...), so saved queries
//! can be replayed from the command line. Every condition is AND-ed and
//! every value is bound, never interpolated.

use std::str::FromStr;

use sqlx::{Postgres, QueryBuilder};

use crate::error::{EtlError, EtlResult};

/// Every lookup accepted by [`LumisectionHistos2DFilter::apply`]
pub const LOOKUPS: &[&str] = &[
    "title",
    "lumisection__ls_number__in",
    "lumisection__run__run_number__in",
    "lumisection__run__run_number__gte",
    "lumisection__run__run_number__lte",
    "lumisection__ls_number__gte",
    "lumisection__ls_number__lte",
    "entries__gte",
    "entries__lte",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LumisectionHistos2DFilter {
    /// Any of these titles
    pub title: Vec<String>,
    pub ls_number_in: Vec<i32>,
    pub run_number_in: Vec<i32>,
    pub run_number_gte: Option<i32>,
    pub run_number_lte: Option<i32>,
    pub ls_number_gte: Option<i32>,
    pub ls_number_lte: Option<i32>,
    pub entries_gte: Option<i64>,
    pub entries_lte: Option<i64>,
}

impl LumisectionHistos2DFilter {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Set one lookup from its raw string value.
    ///
    /// `title` accumulates; `__in` lookups take comma-separated lists.
    pub fn apply(&mut self, lookup: &str, value: &str) -> EtlResult<()> {
        match lookup {
            "title" => self.title.push(value.to_owned()),
            "lumisection__ls_number__in" => {
                self.ls_number_in = parse_in_list(lookup, value)?;
            }
            "lumisection__run__run_number__in" => {
                self.run_number_in = parse_in_list(lookup, value)?;
            }
            "lumisection__run__run_number__gte" => {
                self.run_number_gte = Some(parse_one(lookup, value)?);
            }
            "lumisection__run__run_number__lte" => {
                self.run_number_lte = Some(parse_one(lookup, value)?);
            }
            "lumisection__ls_number__gte" => self.ls_number_gte = Some(parse_one(lookup, value)?),
            "lumisection__ls_number__lte" => self.ls_number_lte = Some(parse_one(lookup, value)?),
            "entries__gte" => self.entries_gte = Some(parse_one(lookup, value)?),
            "entries__lte" => self.entries_lte = Some(parse_one(lookup, value)?),
            other => {
                return Err(EtlError::validation(format!(
                    "unknown filter '{}' (expected one of: {})",
                    other,
                    LOOKUPS.join(", ")
                )))
            }
        }
        Ok(())
    }

    /// Append ` AND ...` conditions to a query whose FROM clause aliases
    /// histograms as `h`, lumisections as `l` and runs as `r`.
    pub fn push_conditions(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        if !self.title.is_empty() {
            builder.push(" AND h.title = ANY(");
            builder.push_bind(self.title.clone());
            builder.push(")");
        }
        if !self.ls_number_in.is_empty() {
            builder.push(" AND l.ls_number = ANY(");
            builder.push_bind(self.ls_number_in.clone());
            builder.push(")");
        }
        if !self.run_number_in.is_empty() {
            builder.push(" AND r.run_number = ANY(");
            builder.push_bind(self.run_number_in.clone());
            builder.push(")");
        }
        push_bound(builder, "r.run_number >=", self.run_number_gte);
        push_bound(builder, "r.run_number <=", self.run_number_lte);
        push_bound(builder, "l.ls_number >=", self.ls_number_gte);
        push_bound(builder, "l.ls_number <=", self.ls_number_lte);
        push_bound(builder, "h.entries >=", self.entries_gte);
        push_bound(builder, "h.entries <=", self.entries_lte);
    }
}

fn push_bound<T>(builder: &mut QueryBuilder<'_, Postgres>, condition: &str, value: Option<T>)
where
    T: for<'q> sqlx::Encode<'q, Postgres> + sqlx::Type<Postgres> + Send + 'static,
{
    if let Some(value) = value {
        builder.push(" AND ");
        builder.push(condition);
        builder.push(" ");
        builder.push_bind(value);
    }
}

/// Parse a comma-separated membership list such as `1,2, 5`.
pub fn parse_in_list<T: FromStr>(lookup: &str, raw: &str) -> EtlResult<Vec<T>> {
    raw.split(',')
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(|piece| parse_one(lookup, piece))
        .collect()
}

fn parse_one<T: FromStr>(lookup: &str, raw: &str) -> EtlResult<T> {
    raw.trim().parse().map_err(|_| {
        EtlError::validation(format!("{}: '{}' is not a whole number", lookup, raw.trim()))
    })
}
