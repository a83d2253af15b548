//! PostgreSQL backend.
//!
//! Values cross the wire in binary format. Text values are converted to the
//! parameter's declared type so that answers collected as strings can be
//! compared against integer, numeric, date and uuid columns.

use std::error::Error as StdError;

use ::postgres::types::{to_sql_checked, FromSql, IsNull, ToSql, Type};
use ::postgres::{Client, NoTls};
use bytes::BytesMut;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use super::{Connection, DbError, DbResult, Row, Value};
use crate::sql::Dialect;

type BoxError = Box<dyn StdError + Sync + Send>;

pub struct PostgresConnection {
    client: Option<Client>,
}

impl PostgresConnection {
    /// Connect and, when given, set the session's `search_path`.
    pub fn connect(params: &str, schema: Option<&str>) -> DbResult<Self> {
        let mut client = Client::connect(params, NoTls)?;
        if let Some(schema) = schema {
            client.execute("SELECT set_config('search_path', $1, false)", &[&schema])?;
        }
        tracing::info!(schema = schema.unwrap_or("public"), "connected to postgres");
        Ok(Self {
            client: Some(client),
        })
    }

    fn client(&mut self) -> DbResult<&mut Client> {
        self.client.as_mut().ok_or(DbError::Closed)
    }
}

fn bind(params: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}

fn decode(rows: Vec<::postgres::Row>) -> DbResult<Vec<Row>> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let mut record = Row::with_capacity(row.len());
        for (i, column) in row.columns().iter().enumerate() {
            record.insert(column.name().to_string(), row.try_get::<_, Value>(i)?);
        }
        out.push(record);
    }
    Ok(out)
}

impl Connection for PostgresConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn is_open(&self) -> bool {
        self.client.as_ref().is_some_and(|c| !c.is_closed())
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        tracing::trace!(sql, params = params.len(), "postgres query");
        let rows = self.client()?.query(sql, &bind(params))?;
        decode(rows)
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> DbResult<u64> {
        tracing::trace!(sql, params = params.len(), "postgres execute");
        Ok(self.client()?.execute(sql, &bind(params))?)
    }

    fn query_in_transaction(&mut self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        let mut tx = self.client()?.transaction()?;
        // An uncommitted transaction rolls back on drop.
        let rows = tx.query(sql, &bind(params))?;
        tx.commit()?;
        decode(rows)
    }

    fn close(&mut self) -> DbResult<()> {
        if let Some(client) = self.client.take() {
            client.close()?;
        }
        Ok(())
    }
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) => b.to_sql(ty, out),
            Value::Int(i) => match *ty {
                Type::INT2 => i16::try_from(*i)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*i)?.to_sql(ty, out),
                Type::OID => u32::try_from(*i)?.to_sql(ty, out),
                Type::FLOAT4 => (*i as f32).to_sql(ty, out),
                Type::FLOAT8 => (*i as f64).to_sql(ty, out),
                Type::NUMERIC => Decimal::from(*i).to_sql(ty, out),
                _ if <String as ToSql>::accepts(ty) => i.to_string().to_sql(ty, out),
                _ => i.to_sql(ty, out),
            },
            Value::Float(f) => match *ty {
                Type::FLOAT4 => (*f as f32).to_sql(ty, out),
                Type::NUMERIC => Decimal::from_f64_retain(*f)
                    .ok_or("float out of numeric range")?
                    .to_sql(ty, out),
                _ if <String as ToSql>::accepts(ty) => f.to_string().to_sql(ty, out),
                _ => f.to_sql(ty, out),
            },
            Value::Text(s) => text_to_sql(s, ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// Parse a text value into the parameter's declared type.
fn text_to_sql(s: &str, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    let s = s.trim();
    match *ty {
        Type::BOOL => s.parse::<bool>()?.to_sql(ty, out),
        Type::INT2 => s.parse::<i16>()?.to_sql(ty, out),
        Type::INT4 => s.parse::<i32>()?.to_sql(ty, out),
        Type::INT8 => s.parse::<i64>()?.to_sql(ty, out),
        Type::FLOAT4 => s.parse::<f32>()?.to_sql(ty, out),
        Type::FLOAT8 => s.parse::<f64>()?.to_sql(ty, out),
        Type::NUMERIC => s.parse::<Decimal>()?.to_sql(ty, out),
        Type::DATE => chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")?.to_sql(ty, out),
        Type::TIME => chrono::NaiveTime::parse_from_str(s, "%H:%M:%S")?.to_sql(ty, out),
        Type::TIMESTAMP => {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")?.to_sql(ty, out)
        }
        Type::TIMESTAMPTZ => chrono::DateTime::parse_from_rfc3339(s)?
            .with_timezone(&chrono::Utc)
            .to_sql(ty, out),
        Type::UUID => uuid::Uuid::parse_str(s)?.to_sql(ty, out),
        _ => s.to_sql(ty, out),
    }
}

impl<'a> FromSql<'a> for Value {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        Ok(match *ty {
            Type::BOOL => Value::Bool(bool::from_sql(ty, raw)?),
            Type::INT2 => Value::Int(i64::from(i16::from_sql(ty, raw)?)),
            Type::INT4 => Value::Int(i64::from(i32::from_sql(ty, raw)?)),
            Type::INT8 => Value::Int(i64::from_sql(ty, raw)?),
            Type::OID => Value::Int(i64::from(u32::from_sql(ty, raw)?)),
            Type::FLOAT4 => Value::Float(f64::from(f32::from_sql(ty, raw)?)),
            Type::FLOAT8 => Value::Float(f64::from_sql(ty, raw)?),
            Type::NUMERIC => Value::Float(
                Decimal::from_sql(ty, raw)?
                    .to_f64()
                    .ok_or("numeric out of float range")?,
            ),
            Type::DATE => Value::Text(chrono::NaiveDate::from_sql(ty, raw)?.to_string()),
            Type::TIME => Value::Text(chrono::NaiveTime::from_sql(ty, raw)?.to_string()),
            Type::TIMESTAMP => Value::Text(chrono::NaiveDateTime::from_sql(ty, raw)?.to_string()),
            Type::TIMESTAMPTZ => Value::Text(
                chrono::DateTime::<chrono::Utc>::from_sql(ty, raw)?.to_rfc3339(),
            ),
            Type::UUID => Value::Text(uuid::Uuid::from_sql(ty, raw)?.to_string()),
            Type::JSON | Type::JSONB => {
                Value::Text(serde_json::Value::from_sql(ty, raw)?.to_string())
            }
            _ if <String as FromSql>::accepts(ty) => Value::Text(String::from_sql(ty, raw)?),
            _ => return Err(format!("unsupported column type {ty}").into()),
        })
    }

    fn from_sql_null(_ty: &Type) -> Result<Self, BoxError> {
        Ok(Value::Null)
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}
