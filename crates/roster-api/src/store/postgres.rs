//! PostgreSQL profile store.
//!
//! One table per collection:
//!
//! ```sql
//! CREATE TABLE student (
//!     seq BIGSERIAL NOT NULL,
//!     id  UUID PRIMARY KEY,
//!     doc JSON NOT NULL
//! );
//! CREATE UNIQUE INDEX student_name_key ON student ((doc->>'name'));
//! ```
//!
//! `doc` is `json`: the stored text, field order included, comes back
//! verbatim. Filters cast to `jsonb`: equality and set operators use
//! containment (`@>`) on the extracted field, range operators compare
//! `numeric` values or `text` under the `C` collation. Field names and
//! operands are always bound as parameters. Rows are returned in `seq` order.
//!
//! The table name is interpolated into SQL, so it is validated as a plain
//! identifier before any statement is built.

use std::time::Duration;

use async_trait::async_trait;
use roster_core::{
    merge_fields, strip_id, Condition, Document, Filter, Operator, Profile, ProfileId, ID_FIELD,
    NAME_FIELD,
};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use super::{ListQuery, ProfilePage, ProfileStore, StoreError};

/// Longest identifier PostgreSQL accepts without truncation.
const MAX_IDENTIFIER_LEN: usize = 63;

/// Whether `name` is safe to interpolate as an unquoted SQL identifier.
pub fn is_valid_table_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    name.len() <= MAX_IDENTIFIER_LEN
        && (first.is_ascii_lowercase() || first == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// [`ProfileStore`] backed by a PostgreSQL table.
#[derive(Debug, Clone)]
pub struct PgProfileStore {
    pool: PgPool,
    table: String,
}

impl PgProfileStore {
    /// Wrap an existing pool.
    ///
    /// Fails with [`StoreError::Database`] when `table` is not a valid identifier.
    pub fn new(pool: PgPool, table: impl Into<String>) -> Result<Self, StoreError> {
        let table = table.into();
        if !is_valid_table_name(&table) {
            return Err(StoreError::Database(sqlx::Error::Configuration(
                format!("invalid table name '{table}'").into(),
            )));
        }
        Ok(Self { pool, table })
    }

    /// Connect a new pool to `url`.
    pub async fn connect(
        url: &str,
        table: &str,
        max_connections: u32,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(url)
            .await?;
        Self::new(pool, table)
    }

    /// Create the collection table and its indexes when missing.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        let t = &self.table;
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {t} (
                 seq BIGSERIAL NOT NULL,
                 id  UUID PRIMARY KEY,
                 doc JSON NOT NULL
             )"
        ))
        .execute(&self.pool)
        .await?;
        sqlx::query(&format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS {t}_name_key ON {t} ((doc->>'{NAME_FIELD}'))"
        ))
        .execute(&self.pool)
        .await?;
        sqlx::query(&format!("CREATE INDEX IF NOT EXISTS {t}_seq_idx ON {t} (seq)"))
            .execute(&self.pool)
            .await?;
        tracing::debug!(table = %t, "profile table ready");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct ProfileRow {
    id: Uuid,
    doc: String,
}

impl ProfileRow {
    fn into_profile(self) -> Result<Profile, StoreError> {
        let fields: Document = serde_json::from_str(&self.doc)
            .map_err(|e| StoreError::Corrupt(format!("profile {}: {e}", self.id)))?;
        Ok(Profile::new(ProfileId::from_uuid(self.id), fields))
    }
}

/// SQL predicate for a [`Filter`] plus its text arguments, numbered from `$1`.
#[derive(Debug, Default, PartialEq)]
struct Predicate {
    sql: String,
    args: Vec<String>,
}

impl Predicate {
    fn build(filter: &Filter) -> Self {
        let mut predicate = Self::default();
        let clauses: Vec<String> = filter
            .conditions()
            .iter()
            .map(|cond| predicate.condition(cond))
            .collect();
        predicate.sql = if clauses.is_empty() {
            "TRUE".to_string()
        } else {
            clauses.join(" AND ")
        };
        predicate
    }

    /// Register an argument and return its placeholder.
    fn arg(&mut self, value: String) -> String {
        self.args.push(value);
        format!("${}", self.args.len())
    }

    fn condition(&mut self, cond: &Condition) -> String {
        if cond.operator.is_range() && !(cond.operand.is_number() || cond.operand.is_string()) {
            return "FALSE".to_string();
        }
        let field = match cond.field.as_str() {
            ID_FIELD => "to_jsonb(id::text)".to_string(),
            name => format!("(doc::jsonb -> {}::text)", self.arg(name.to_string())),
        };
        match cond.operator {
            Operator::Eq => {
                let v = self.arg(cond.operand.to_string());
                format!("COALESCE({field} @> {v}::jsonb, FALSE)")
            }
            Operator::Ne => {
                let v = self.arg(cond.operand.to_string());
                format!("NOT COALESCE({field} @> {v}::jsonb, FALSE)")
            }
            Operator::In => {
                let v = self.arg(cond.operand.to_string());
                format!("EXISTS (SELECT 1 FROM jsonb_array_elements({v}::jsonb) AS c(v) WHERE {field} @> c.v)")
            }
            Operator::Nin => {
                let v = self.arg(cond.operand.to_string());
                format!("NOT EXISTS (SELECT 1 FROM jsonb_array_elements({v}::jsonb) AS c(v) WHERE {field} @> c.v)")
            }
            op => self.range(&field, op, &cond.operand),
        }
    }

    fn range(&mut self, field: &str, op: Operator, operand: &Value) -> String {
        let cmp = match op {
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            _ => return "FALSE".to_string(),
        };
        match operand {
            Value::Number(n) => {
                let v = self.arg(n.to_string());
                format!(
                    "CASE WHEN jsonb_typeof({field}) = 'number' \
                     THEN ({field})::numeric {cmp} {v}::numeric ELSE FALSE END"
                )
            }
            Value::String(s) => {
                let v = self.arg(s.clone());
                format!(
                    "CASE WHEN jsonb_typeof({field}) = 'string' \
                     THEN ({field} #>> '{{}}') COLLATE \"C\" {cmp} {v}::text COLLATE \"C\" ELSE FALSE END"
                )
            }
            _ => "FALSE".to_string(),
        }
    }
}

fn serialize(fields: &Document) -> String {
    Value::Object(fields.clone()).to_string()
}

/// Map a write failure, turning unique violations into [`StoreError::Conflict`].
fn map_write_error(err: sqlx::Error, fields: &Document) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::Conflict {
                field: NAME_FIELD.to_string(),
                value: fields
                    .get(NAME_FIELD)
                    .map(Value::to_string)
                    .unwrap_or_default(),
            };
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_by_field(
        &self,
        field: &str,
        value: &Value,
    ) -> Result<Option<Profile>, StoreError> {
        let query = ListQuery::paged(Filter::eq(field, value.clone()), 0, 1);
        let page = self.find_many(&query).await?;
        Ok(page.profiles.into_iter().next())
    }

    async fn find_by_id(&self, id: ProfileId) -> Result<Option<Profile>, StoreError> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "SELECT id, doc::text AS doc FROM {} WHERE id = $1",
            self.table
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(ProfileRow::into_profile).transpose()
    }

    async fn find_many(&self, query: &ListQuery) -> Result<ProfilePage, StoreError> {
        let predicate = Predicate::build(&query.filter);

        let count_sql = format!("SELECT COUNT(*) FROM {} WHERE {}", self.table, predicate.sql);
        let mut count = sqlx::query_scalar::<_, i64>(&count_sql);
        for arg in &predicate.args {
            count = count.bind(arg);
        }
        let total = count.fetch_one(&self.pool).await?;

        let n = predicate.args.len();
        let offset = query.skip.map(|s| i64::try_from(s).unwrap_or(i64::MAX));
        let limit = query.limit.map(|l| i64::try_from(l).unwrap_or(i64::MAX));
        let rows_sql = format!(
            "SELECT id, doc::text AS doc FROM {} WHERE {}
             ORDER BY seq OFFSET ${} LIMIT ${}",
            self.table,
            predicate.sql,
            n + 1,
            n + 2
        );
        let mut select = sqlx::query_as::<_, ProfileRow>(&rows_sql);
        for arg in &predicate.args {
            select = select.bind(arg);
        }
        let rows = select
            .bind(offset)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        let profiles = rows
            .into_iter()
            .map(ProfileRow::into_profile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ProfilePage {
            profiles,
            total: u64::try_from(total).unwrap_or_default(),
        })
    }

    async fn insert(&self, mut fields: Document) -> Result<ProfileId, StoreError> {
        strip_id(&mut fields);
        let id = ProfileId::new();
        sqlx::query(&format!(
            "INSERT INTO {} (id, doc) VALUES ($1, $2::json)",
            self.table
        ))
        .bind(*id.as_uuid())
        .bind(serialize(&fields))
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, &fields))?;
        Ok(id)
    }

    async fn update_by_id(&self, id: ProfileId, fields: Document) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<String> = sqlx::query_scalar(&format!(
            "SELECT doc::text FROM {} WHERE id = $1 FOR UPDATE",
            self.table
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?;
        let current = current.ok_or(StoreError::NotFound(id))?;

        let mut merged: Document = serde_json::from_str(&current)
            .map_err(|e| StoreError::Corrupt(format!("profile {id}: {e}")))?;
        strip_id(&mut merged);
        merge_fields(&mut merged, fields);

        sqlx::query(&format!(
            "UPDATE {} SET doc = $2::json WHERE id = $1",
            self.table
        ))
        .bind(*id.as_uuid())
        .bind(serialize(&merged))
        .execute(&mut *tx)
        .await
        .map_err(|e| map_write_error(e, &merged))?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete_by_id(&self, id: ProfileId) -> Result<Profile, StoreError> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "DELETE FROM {} WHERE id = $1 RETURNING id, doc::text AS doc",
            self.table
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.ok_or(StoreError::NotFound(id))?.into_profile()
    }
}
