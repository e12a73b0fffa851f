//! src/services/record_store.rs
//!
//! RecordStore: designs and survey responses persisted in SQLite.
//! A response is one row in `responses` plus one row per rated design in
//! `ratings`; both are written in a single transaction so a response is
//! never visible half-written.

use super::{StoreError, StoreResult};
use crate::models::{
    design::{Design, DesignUpdate, NewDesign},
    response::{Gender, InvalidScore, Rating, RespondentAttributes, Response, Score},
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, SqlitePool, sqlite::Sqlite};
use std::{collections::HashMap, sync::Arc};
use tracing::debug;
use uuid::Uuid;

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

const DESIGN_COLUMNS: &str = "id, name, image_ref, storage_key, uploaded_at";

#[derive(FromRow)]
struct ResponseRecord {
    id: Uuid,
    name: String,
    age: i64,
    gender: String,
    contact: Option<String>,
    submitted_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct RatingRecord {
    response_id: Uuid,
    design_id: Uuid,
    design_quality: i64,
    buy_intention: i64,
}

#[derive(Clone)]
pub struct RecordStore {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,
}

impl RecordStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Apply the embedded schema. Statements are idempotent.
    pub async fn migrate(&self) -> StoreResult<usize> {
        let statements = SCHEMA
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        for stmt in &statements {
            debug!("Executing migration SQL: {}", stmt);
            sqlx::query(stmt).execute(&*self.db).await?;
        }
        Ok(statements.len())
    }

    pub async fn create_design(&self, new: NewDesign) -> StoreResult<Design> {
        let design = sqlx::query_as::<_, Design>(&format!(
            "INSERT INTO designs ({DESIGN_COLUMNS}) VALUES (?, ?, ?, ?, ?) RETURNING {DESIGN_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.image_ref)
        .bind(&new.storage_key)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await?;
        debug!("inserted design {} ({})", design.id, design.name);
        Ok(design)
    }

    /// All designs ordered by name.
    pub async fn list_designs(&self) -> StoreResult<Vec<Design>> {
        let designs = sqlx::query_as::<_, Design>(&format!(
            "SELECT {DESIGN_COLUMNS} FROM designs ORDER BY name ASC"
        ))
        .fetch_all(&*self.db)
        .await?;
        Ok(designs)
    }

    pub async fn get_design(&self, id: Uuid) -> StoreResult<Design> {
        sqlx::query_as::<_, Design>(&format!(
            "SELECT {DESIGN_COLUMNS} FROM designs WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or(StoreError::DesignNotFound(id))
    }

    /// Apply a partial update. An empty update just returns the current record.
    pub async fn update_design(&self, id: Uuid, update: &DesignUpdate) -> StoreResult<Design> {
        if update.name.is_none() && update.image.is_none() {
            return self.get_design(id).await;
        }

        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE designs SET ");
        {
            let mut set = builder.separated(", ");
            if let Some(name) = &update.name {
                set.push("name = ");
                set.push_bind_unseparated(name.clone());
            }
            if let Some(image) = &update.image {
                set.push("image_ref = ");
                set.push_bind_unseparated(image.image_ref.clone());
                set.push("storage_key = ");
                set.push_bind_unseparated(image.storage_key.clone());
            }
        }
        builder.push(" WHERE id = ");
        builder.push_bind(id);
        builder.push(format!(" RETURNING {DESIGN_COLUMNS}"));

        builder
            .build_query_as::<Design>()
            .fetch_optional(&*self.db)
            .await?
            .ok_or(StoreError::DesignNotFound(id))
    }

    /// Remove a design record and return what was removed.
    ///
    /// Ratings that reference the design stay in place.
    pub async fn delete_design(&self, id: Uuid) -> StoreResult<Design> {
        sqlx::query_as::<_, Design>(&format!(
            "DELETE FROM designs WHERE id = ? RETURNING {DESIGN_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or(StoreError::DesignNotFound(id))
    }

    pub async fn count_designs(&self) -> StoreResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM designs")
            .fetch_one(&*self.db)
            .await?;
        Ok(count)
    }

    /// Insert a response and all of its ratings atomically.
    pub async fn create_response(
        &self,
        user_data: &RespondentAttributes,
        ratings: &HashMap<Uuid, Rating>,
        submitted_at: DateTime<Utc>,
    ) -> StoreResult<Response> {
        let id = Uuid::new_v4();
        let mut tx = self.db.begin().await?;

        sqlx::query(
            "INSERT INTO responses (id, name, age, gender, contact, submitted_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(&user_data.name)
        .bind(i64::from(user_data.age))
        .bind(user_data.gender.as_str())
        .bind(user_data.contact.as_deref())
        .bind(submitted_at)
        .execute(&mut *tx)
        .await?;

        for (design_id, rating) in ratings {
            sqlx::query(
                "INSERT INTO ratings (response_id, design_id, design_quality, buy_intention)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(id)
            .bind(design_id)
            .bind(i64::from(rating.design_quality.get()))
            .bind(i64::from(rating.buy_intention.get()))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!("inserted response {} with {} ratings", id, ratings.len());

        Ok(Response {
            id,
            user_data: user_data.clone(),
            ratings: ratings.clone(),
            submitted_at,
        })
    }

    /// All responses, newest submission first.
    ///
    /// Both tables are read in one transaction so a concurrent submit or reset
    /// cannot split a response from its ratings.
    pub async fn list_responses(&self) -> StoreResult<Vec<Response>> {
        let mut tx = self.db.begin().await?;
        let records = sqlx::query_as::<_, ResponseRecord>(
            "SELECT id, name, age, gender, contact, submitted_at
             FROM responses ORDER BY submitted_at DESC",
        )
        .fetch_all(&mut *tx)
        .await?;

        let rating_rows = sqlx::query_as::<_, RatingRecord>(
            "SELECT response_id, design_id, design_quality, buy_intention FROM ratings",
        )
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        let mut ratings: HashMap<Uuid, HashMap<Uuid, Rating>> = HashMap::new();
        for row in rating_rows {
            let corrupt = |err: InvalidScore| StoreError::Corrupt {
                id: row.response_id,
                reason: err.to_string(),
            };
            let rating = Rating {
                design_quality: Score::try_from(row.design_quality).map_err(corrupt)?,
                buy_intention: Score::try_from(row.buy_intention).map_err(corrupt)?,
            };
            ratings
                .entry(row.response_id)
                .or_default()
                .insert(row.design_id, rating);
        }

        records
            .into_iter()
            .map(|record| {
                let ratings = ratings.remove(&record.id).unwrap_or_default();
                into_response(record, ratings)
            })
            .collect()
    }

    /// Delete the given responses in one transaction.
    ///
    /// Either every listed response is removed or none is. Ids that no longer
    /// exist are skipped; the returned count is the number actually removed.
    pub async fn delete_responses(&self, ids: &[Uuid]) -> StoreResult<u64> {
        let mut tx = self.db.begin().await?;
        let mut deleted = 0;

        for id in ids {
            sqlx::query("DELETE FROM ratings WHERE response_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            let result = sqlx::query("DELETE FROM responses WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            deleted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(deleted)
    }
}

fn into_response(
    record: ResponseRecord,
    ratings: HashMap<Uuid, Rating>,
) -> StoreResult<Response> {
    let corrupt = |reason: String| StoreError::Corrupt {
        id: record.id,
        reason,
    };
    let age = u32::try_from(record.age).map_err(|_| corrupt(format!("age {}", record.age)))?;
    let gender = record.gender.parse::<Gender>().map_err(corrupt)?;

    Ok(Response {
        id: record.id,
        user_data: RespondentAttributes {
            name: record.name,
            age,
            gender,
            contact: record.contact,
        },
        ratings,
        submitted_at: record.submitted_at,
    })
}
