//! Normalized entropy of column value distributions.

use indexmap::IndexMap;

use crate::db::{Connection, DbResult};
use crate::sql::{col, count_star, ExprExt, Query, TableRef};

/// `H / ln(N)` for value groups of the given sizes, where `H` is the Shannon
/// entropy of the distribution and `N` the total number of rows.
///
/// The result lies in `[0, 1]`: 0 when every row shares one value, 1 when
/// every row is distinct. Fewer than two rows carry no information.
pub fn normalized_entropy(counts: &[u64]) -> f64 {
    let total: u64 = counts.iter().sum();
    if total <= 1 {
        return 0.0;
    }
    let n = total as f64;
    let entropy: f64 = counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / n;
            -p * p.ln()
        })
        .sum();
    (entropy / n.ln()).clamp(0.0, 1.0)
}

/// Group sizes of `column` in `table`; NULL forms its own group.
pub fn value_counts<C: Connection + ?Sized>(
    conn: &mut C,
    table: &str,
    column: &str,
) -> DbResult<Vec<u64>> {
    let query = Query::new()
        .select(vec![count_star().alias("n")])
        .from(TableRef::new(table))
        .group_by(vec![col(column)]);
    let sql = query.to_sql(conn.dialect());
    let rows = conn.query(&sql, &[])?;
    Ok(rows
        .iter()
        .filter_map(|row| row.get("n").and_then(|v| v.as_i64()))
        .map(|n| n.max(0) as u64)
        .collect())
}

pub fn column_entropy<C: Connection + ?Sized>(
    conn: &mut C,
    table: &str,
    column: &str,
) -> DbResult<f64> {
    Ok(normalized_entropy(&value_counts(conn, table, column)?))
}

/// Entropy of each column of `table`, keyed by column name.
pub fn column_entropies<C, S>(
    conn: &mut C,
    table: &str,
    columns: &[S],
) -> DbResult<IndexMap<String, f64>>
where
    C: Connection + ?Sized,
    S: AsRef<str>,
{
    let mut entropies = IndexMap::with_capacity(columns.len());
    for column in columns {
        let column = column.as_ref();
        let entropy = column_entropy(conn, table, column)?;
        tracing::trace!(table, column, entropy, "column entropy");
        entropies.insert(column.to_string(), entropy);
    }
    Ok(entropies)
}
