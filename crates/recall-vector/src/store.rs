// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the VectorAdapter trait.
//!
//! Each index is an ordinary table whose `embedding` column is declared
//! `F32_BLOB(<dimension>)` and guarded by a named length CHECK. Similarity is
//! computed with sqlite-vec's `vec_distance_cosine`; metadata filters compile
//! to `json_extract` predicates over the `metadata` column.

use std::sync::{LazyLock, Once};

use async_trait::async_trait;
use regex::Regex;
use rusqlite::OptionalExtension;
use rusqlite::types::Value as SqlValue;
use serde_json::Value;
use tokio_rusqlite::Connection;
use tracing::{debug, info, warn};

use recall_config::model::VectorConfig;
use recall_core::types::{
    CreateIndexParams, DistanceMetric, IndexStats, QueryParams, QueryResult, UpsertParams,
    VectorUpdate,
};
use recall_core::{AdapterType, HealthStatus, PluginAdapter, RecallError, VectorAdapter};

use crate::blob::{blob_to_vec, vec_to_blob};
use crate::filter::{FilterTranslator, build_predicate};

static INDEX_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());
static DECLARED_DIMENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"F32_BLOB\((\d+)\)").unwrap());
static DIMENSION_CHECK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"embedding_dimension_(\d+)").unwrap());
static QUERY_DIMENSIONS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"has (\d+) dimensions, while the second has (\d+) dimensions").unwrap()
});

static VEC_EXTENSION: Once = Once::new();

/// Register sqlite-vec for every connection opened afterwards in this process.
fn register_sqlite_vec() {
    VEC_EXTENSION.call_once(|| {
        // SAFETY: `sqlite3_vec_init` is the statically linked extension entry
        // point; auto-extension registration expects exactly this signature.
        unsafe {
            rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
                sqlite_vec::sqlite3_vec_init as *const (),
            )));
        }
        debug!("sqlite-vec auto-extension registered");
    });
}

/// Rejects anything that is not a plain SQL identifier. Index names are
/// interpolated into DDL, so this runs before every statement.
pub fn validate_index_name(index_name: &str) -> Result<(), RecallError> {
    if INDEX_NAME.is_match(index_name) {
        Ok(())
    } else {
        Err(RecallError::Config(format!(
            "Invalid index name format: {index_name:?}"
        )))
    }
}

fn tr_err(
    index_name: &str,
    action: &str,
) -> impl FnOnce(tokio_rusqlite::Error<rusqlite::Error>) -> RecallError {
    let index_name = index_name.to_string();
    let action = action.to_string();
    move |e| RecallError::vector(index_name, format!("{action}: {e}"))
}

/// Vector index store on a dedicated SQLite file.
pub struct SqliteVector {
    conn: Connection,
    translator: FilterTranslator,
}

impl SqliteVector {
    /// Open (creating if needed) a vector database file in WAL mode.
    pub async fn open(path: &str) -> Result<Self, RecallError> {
        register_sqlite_vec();
        if let Some(parent) = std::path::Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(RecallError::storage)?;
        }
        let conn = Connection::open(path).await.map_err(RecallError::storage)?;
        conn.call(|conn| -> Result<(), rusqlite::Error> {
            conn.execute_batch(
                "PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL; PRAGMA busy_timeout = 5000;",
            )
        })
        .await
        .map_err(RecallError::storage)?;
        let store = Self::with_connection(conn).await?;
        info!(path, "vector store opened");
        Ok(store)
    }

    /// Open a private in-memory vector store. Used by tests.
    pub async fn open_in_memory() -> Result<Self, RecallError> {
        register_sqlite_vec();
        let conn = Connection::open_in_memory()
            .await
            .map_err(RecallError::storage)?;
        Self::with_connection(conn).await
    }

    /// Open the store described by the `[vector]` config section, or `None`
    /// when the section disables it.
    pub async fn from_config(config: &VectorConfig) -> Result<Option<Self>, RecallError> {
        if !config.enabled {
            debug!("vector store disabled by configuration");
            return Ok(None);
        }
        Self::open(&config.database_path).await.map(Some)
    }

    async fn with_connection(conn: Connection) -> Result<Self, RecallError> {
        let version = conn
            .call(|conn| -> Result<String, rusqlite::Error> {
                conn.query_row("SELECT vec_version()", [], |row| row.get(0))
            })
            .await
            .map_err(RecallError::storage)?;
        debug!(sqlite_vec = %version, "sqlite-vec available");
        Ok(Self {
            conn,
            translator: FilterTranslator::sqlite(),
        })
    }

    /// Declared dimension of an existing index, or `None` when absent.
    async fn index_dimension(&self, index_name: &str) -> Result<Option<usize>, RecallError> {
        let name = index_name.to_string();
        let sql: Option<String> = self
            .conn
            .call(move |conn| -> Result<Option<String>, rusqlite::Error> {
                conn.query_row(
                    "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [&name],
                    |row| row.get(0),
                )
                .optional()
            })
            .await
            .map_err(tr_err(index_name, "failed to inspect index"))?;

        Ok(sql.map(|sql| {
            DECLARED_DIMENSION
                .captures(&sql)
                .and_then(|caps| caps[1].parse().ok())
                .unwrap_or(0)
        }))
    }

    /// Turns a failed write into [`RecallError::DimensionMismatch`] when the
    /// named length CHECK tripped.
    fn write_error(index_name: &str, written: usize, action: &str, e: &rusqlite::Error) -> RecallError {
        let message = e.to_string();
        if let Some(expected) = DIMENSION_CHECK
            .captures(&message)
            .and_then(|caps| caps[1].parse::<usize>().ok())
        {
            return RecallError::DimensionMismatch {
                index_name: index_name.to_string(),
                expected,
                actual: written,
            };
        }
        RecallError::vector(index_name, format!("{action}: {message}"))
    }
}

#[async_trait]
impl PluginAdapter for SqliteVector {
    fn name(&self) -> &str {
        "sqlite-vec"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Vector
    }

    async fn health_check(&self) -> Result<HealthStatus, RecallError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.query_row("SELECT vec_version()", [], |_| Ok(()))
            })
            .await
            .map_err(RecallError::storage)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RecallError> {
        Ok(())
    }
}

#[async_trait]
impl VectorAdapter for SqliteVector {
    async fn create_index(&self, params: CreateIndexParams) -> Result<(), RecallError> {
        let CreateIndexParams {
            index_name,
            dimension,
            metric,
        } = params;
        validate_index_name(&index_name)?;
        if dimension == 0 {
            return Err(RecallError::Config(
                "Dimension must be a positive integer".to_string(),
            ));
        }

        if let Some(existing) = self.index_dimension(&index_name).await? {
            if existing != dimension {
                return Err(RecallError::DimensionMismatch {
                    index_name,
                    expected: existing,
                    actual: dimension,
                });
            }
            if metric != DistanceMetric::Cosine {
                warn!(
                    index = %index_name,
                    requested = %metric,
                    "index already exists with metric cosine; keeping existing metric"
                );
            }
            return Ok(());
        }

        if metric != DistanceMetric::Cosine {
            warn!(
                index = %index_name,
                requested = %metric,
                "only cosine similarity is supported; creating cosine index"
            );
        }

        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {index_name} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                vector_id TEXT UNIQUE NOT NULL,
                embedding F32_BLOB({dimension}) NOT NULL
                    CONSTRAINT embedding_dimension_{dimension} CHECK (length(embedding) = {bytes}),
                metadata TEXT NOT NULL DEFAULT '{{}}'
            )",
            bytes = dimension * 4,
        );
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> { conn.execute_batch(&ddl) })
            .await
            .map_err(tr_err(&index_name, "failed to create index"))?;
        info!(index = %index_name, dimension, "vector index created");
        Ok(())
    }

    async fn upsert(&self, params: UpsertParams) -> Result<Vec<String>, RecallError> {
        let UpsertParams {
            index_name,
            vectors,
            metadata,
            ids,
        } = params;
        validate_index_name(&index_name)?;

        let ids = match ids {
            Some(ids) if ids.len() != vectors.len() => {
                return Err(RecallError::Config(format!(
                    "upsert into {index_name}: {} ids supplied for {} vectors",
                    ids.len(),
                    vectors.len()
                )));
            }
            Some(ids) => ids,
            None => vectors
                .iter()
                .map(|_| uuid::Uuid::new_v4().to_string())
                .collect(),
        };
        if vectors.is_empty() {
            return Ok(ids);
        }

        let rows: Vec<(String, Vec<u8>, String)> = ids
            .iter()
            .zip(&vectors)
            .enumerate()
            .map(|(i, (id, vector))| {
                let meta = metadata
                    .get(i)
                    .filter(|m| !m.is_null())
                    .map(Value::to_string)
                    .unwrap_or_else(|| "{}".to_string());
                (id.clone(), vec_to_blob(vector), meta)
            })
            .collect();

        let sql = format!(
            "INSERT INTO {index_name} (vector_id, embedding, metadata) VALUES (?1, ?2, ?3)
             ON CONFLICT(vector_id) DO UPDATE SET embedding = excluded.embedding, metadata = excluded.metadata"
        );

        // The closure reports which row failed so the dimension of the
        // offending vector can be named.
        let outcome = self
            .conn
            .call(move |conn| Ok::<_, rusqlite::Error>(insert_rows(conn, &sql, &rows)))
            .await
            .map_err(tr_err(&index_name, "upsert failed"))?;

        if let Err((row, e)) = outcome {
            let written = vectors.get(row).map_or(0, Vec::len);
            return Err(Self::write_error(&index_name, written, "upsert failed", &e));
        }

        debug!(index = %index_name, count = ids.len(), "vectors upserted");
        Ok(ids)
    }

    async fn query(&self, params: QueryParams) -> Result<Vec<QueryResult>, RecallError> {
        let QueryParams {
            index_name,
            query_vector,
            top_k,
            filter,
            include_vector,
            min_score,
        } = params;
        validate_index_name(&index_name)?;

        let translated = match &filter {
            Some(filter) => self.translator.translate(filter)?,
            None => Value::Null,
        };
        let predicate = build_predicate(&translated)?;

        let mut args = vec![SqlValue::Blob(vec_to_blob(&query_vector))];
        let where_clause = match predicate {
            Some(predicate) => {
                args.extend(predicate.params);
                format!("WHERE {}", predicate.sql)
            }
            None => String::new(),
        };
        args.push(SqlValue::Real(f64::from(min_score)));
        args.push(SqlValue::Integer(i64::try_from(top_k).unwrap_or(i64::MAX)));

        let embedding_column = if include_vector { ", embedding" } else { "" };
        let sql = format!(
            "WITH vector_scores AS (
                SELECT vector_id AS id,
                       (1 - vec_distance_cosine(embedding, ?)) AS score,
                       metadata{embedding_column}
                FROM {index_name}
                {where_clause}
            )
            SELECT id, score, metadata{embedding_column}
            FROM vector_scores
            WHERE score > ?
            ORDER BY score DESC
            LIMIT ?"
        );

        let raw = self
            .conn
            .call(move |conn| {
                Ok::<_, rusqlite::Error>(select_scored(conn, &sql, &args, include_vector))
            })
            .await
            .map_err(tr_err(&index_name, "query failed"))?;

        let rows = raw.map_err(|e| {
            let message = e.to_string();
            match QUERY_DIMENSIONS.captures(&message) {
                Some(caps) => RecallError::DimensionMismatch {
                    index_name: index_name.clone(),
                    expected: caps[1].parse().unwrap_or(0),
                    actual: caps[2].parse().unwrap_or(query_vector.len()),
                },
                None => RecallError::vector(&index_name, format!("query failed: {message}")),
            }
        })?;

        rows.into_iter()
            .map(|(id, score, metadata, embedding)| {
                Ok(QueryResult {
                    id,
                    score: score as f32,
                    metadata: serde_json::from_str(&metadata)?,
                    vector: embedding.as_deref().map(blob_to_vec),
                })
            })
            .collect()
    }

    async fn list_indexes(&self) -> Result<Vec<String>, RecallError> {
        self.conn
            .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table' AND sql LIKE '%F32_BLOB%' ORDER BY name",
                )?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(RecallError::storage)
    }

    async fn describe_index(&self, index_name: &str) -> Result<IndexStats, RecallError> {
        validate_index_name(index_name)?;
        let Some(dimension) = self.index_dimension(index_name).await? else {
            return Err(RecallError::vector(
                index_name,
                format!("Table {index_name} not found"),
            ));
        };

        let sql = format!("SELECT COUNT(*) FROM {index_name}");
        let count = self
            .conn
            .call(move |conn| -> Result<i64, rusqlite::Error> {
                conn.query_row(&sql, [], |row| row.get(0))
            })
            .await
            .map_err(tr_err(index_name, "failed to describe index"))?;

        Ok(IndexStats {
            dimension,
            count: usize::try_from(count).unwrap_or_default(),
            metric: DistanceMetric::Cosine,
        })
    }

    async fn delete_index(&self, index_name: &str) -> Result<(), RecallError> {
        validate_index_name(index_name)?;
        let sql = format!("DROP TABLE IF EXISTS {index_name}");
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> { conn.execute_batch(&sql) })
            .await
            .map_err(tr_err(index_name, "failed to delete index"))?;
        info!(index = %index_name, "vector index deleted");
        Ok(())
    }

    async fn update_vector(
        &self,
        index_name: &str,
        id: &str,
        update: VectorUpdate,
    ) -> Result<(), RecallError> {
        validate_index_name(index_name)?;

        let mut assignments = Vec::new();
        let mut args = Vec::new();
        let written = update.vector.as_ref().map_or(0, Vec::len);
        if let Some(vector) = &update.vector {
            assignments.push("embedding = ?");
            args.push(SqlValue::Blob(vec_to_blob(vector)));
        }
        if let Some(metadata) = &update.metadata {
            assignments.push("metadata = ?");
            args.push(SqlValue::Text(metadata.to_string()));
        }
        if assignments.is_empty() {
            return Err(RecallError::Config(format!(
                "Failed to update vector by id: {id} for index: {index_name}: No updates provided"
            )));
        }
        args.push(SqlValue::Text(id.to_string()));

        let sql = format!(
            "UPDATE {index_name} SET {} WHERE vector_id = ?",
            assignments.join(", ")
        );
        let outcome = self
            .conn
            .call(move |conn| {
                Ok::<_, rusqlite::Error>(conn.execute(&sql, rusqlite::params_from_iter(args.iter())))
            })
            .await
            .map_err(tr_err(index_name, "update failed"))?;

        match outcome {
            Ok(changed) => {
                debug!(index = %index_name, id, changed, "vector updated");
                Ok(())
            }
            Err(e) => Err(Self::write_error(
                index_name,
                written,
                &format!("Failed to update vector by id: {id}"),
                &e,
            )),
        }
    }

    async fn delete_vector(&self, index_name: &str, id: &str) -> Result<(), RecallError> {
        validate_index_name(index_name)?;
        let sql = format!("DELETE FROM {index_name} WHERE vector_id = ?1");
        let id_owned = id.to_string();
        self.conn
            .call(move |conn| -> Result<usize, rusqlite::Error> { conn.execute(&sql, [&id_owned]) })
            .await
            .map_err(tr_err(index_name, &format!("Failed to delete vector by id: {id}")))?;
        Ok(())
    }

    async fn truncate_index(&self, index_name: &str) -> Result<(), RecallError> {
        validate_index_name(index_name)?;
        let sql = format!("DELETE FROM {index_name}");
        self.conn
            .call(move |conn| -> Result<usize, rusqlite::Error> { conn.execute(&sql, []) })
            .await
            .map_err(tr_err(index_name, "failed to truncate index"))?;
        info!(index = %index_name, "vector index truncated");
        Ok(())
    }
}

type ScoredRow = (String, f64, String, Option<Vec<u8>>);

/// Inserts every row in one transaction. On failure the transaction rolls
/// back on drop and the index of the failing row is returned.
fn insert_rows(
    conn: &mut rusqlite::Connection,
    sql: &str,
    rows: &[(String, Vec<u8>, String)],
) -> Result<(), (usize, rusqlite::Error)> {
    let tx = conn.transaction().map_err(|e| (0, e))?;
    {
        let mut stmt = tx.prepare(sql).map_err(|e| (0, e))?;
        for (i, (id, embedding, metadata)) in rows.iter().enumerate() {
            stmt.execute(rusqlite::params![id, embedding, metadata])
                .map_err(|e| (i, e))?;
        }
    }
    tx.commit().map_err(|e| (0, e))
}

fn select_scored(
    conn: &mut rusqlite::Connection,
    sql: &str,
    args: &[SqlValue],
    include_vector: bool,
) -> Result<Vec<ScoredRow>, rusqlite::Error> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(args.iter()), |row| {
            let embedding = if include_vector {
                Some(row.get::<_, Vec<u8>>(3)?)
            } else {
                None
            };
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, String>(2)?,
                embedding,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
