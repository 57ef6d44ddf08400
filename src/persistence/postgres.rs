//! PostgreSQL storage adapter.

use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tracing::info;

use super::RecordStore;
use crate::domain::{Attribution, GameMetadata, PlayRecord, PlayWithEstimate, ProbabilityEstimate};
use crate::error::Result;

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Create a store from an existing connection pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl RecordStore for PostgresStore {
    async fn upsert_game(&self, meta: &GameMetadata) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO games (game_id, home_team, away_team, season, week, total_plays)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (game_id) DO UPDATE SET
                home_team = EXCLUDED.home_team,
                away_team = EXCLUDED.away_team,
                season = EXCLUDED.season,
                week = EXCLUDED.week,
                total_plays = EXCLUDED.total_plays
            "#,
        )
        .bind(&meta.game_id)
        .bind(&meta.home_team)
        .bind(&meta.away_team)
        .bind(meta.season)
        .bind(meta.week)
        .bind(meta.total_plays as i32)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_game(&self, game_id: &str) -> Result<Option<GameMetadata>> {
        let row = sqlx::query(
            r#"
            SELECT game_id, home_team, away_team, season, week, total_plays
            FROM games WHERE game_id = $1
            "#,
        )
        .bind(game_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| GameMetadata {
            game_id: r.get("game_id"),
            home_team: r.get("home_team"),
            away_team: r.get("away_team"),
            season: r.get("season"),
            week: r.get("week"),
            total_plays: r.get::<Option<i32>, _>("total_plays").unwrap_or(0) as usize,
        }))
    }

    async fn record_play(
        &self,
        play: &PlayRecord,
        raw_payload: &serde_json::Value,
        estimate: &ProbabilityEstimate,
        attributions: &[Attribution],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO plays (
                id, game_id, play_number, sequence, quarter,
                quarter_seconds_remaining, down, yards_to_go, yardline_100,
                posteam_abbr, score_home, score_away, play_type, description,
                raw_payload, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(play.id)
        .bind(&play.game_id)
        .bind(play.play_number)
        .bind(play.sequence)
        .bind(play.quarter)
        .bind(play.quarter_seconds_remaining)
        .bind(play.down)
        .bind(play.yards_to_go)
        .bind(play.yardline_100)
        .bind(&play.posteam_abbr)
        .bind(play.score_home)
        .bind(play.score_away)
        .bind(&play.play_type)
        .bind(&play.description)
        .bind(raw_payload)
        .bind(play.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO wp_predictions (id, play_id, model_version, home_wp, away_wp, predicted_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(estimate.id)
        .bind(estimate.play_id)
        .bind(&estimate.model_version)
        .bind(estimate.home_wp)
        .bind(estimate.away_wp)
        .bind(estimate.predicted_at)
        .execute(&mut *tx)
        .await?;

        for (rank, attribution) in attributions.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO attributions (prediction_id, rank, feature_name, display_name, value)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(estimate.id)
            .bind(rank as i32 + 1)
            .bind(&attribution.feature_name)
            .bind(&attribution.display_name)
            .bind(attribution.value)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn load_plays_with_estimates(&self, game_id: &str) -> Result<Vec<PlayWithEstimate>> {
        // Lateral join keeps only plays with at least one prediction and
        // picks the most recent prediction per play.
        let rows = sqlx::query(
            r#"
            SELECT p.id, p.game_id, p.play_number, p.sequence, p.quarter,
                   p.quarter_seconds_remaining, p.down, p.yards_to_go,
                   p.yardline_100, p.posteam_abbr, p.score_home, p.score_away,
                   p.play_type, p.description, p.created_at,
                   w.id AS prediction_id, w.model_version, w.home_wp, w.away_wp,
                   w.predicted_at
            FROM plays p
            JOIN LATERAL (
                SELECT id, model_version, home_wp, away_wp, predicted_at
                FROM wp_predictions
                WHERE play_id = p.id
                ORDER BY predicted_at DESC, id DESC
                LIMIT 1
            ) w ON TRUE
            WHERE p.game_id = $1
            ORDER BY p.sequence ASC
            "#,
        )
        .bind(game_id)
        .fetch_all(&self.pool)
        .await?;

        let pairs = rows
            .iter()
            .map(|row| PlayWithEstimate {
                play: PlayRecord {
                    id: row.get("id"),
                    game_id: row.get("game_id"),
                    play_number: row.get("play_number"),
                    sequence: row.get("sequence"),
                    quarter: row.get("quarter"),
                    quarter_seconds_remaining: row.get("quarter_seconds_remaining"),
                    down: row.get("down"),
                    yards_to_go: row.get("yards_to_go"),
                    yardline_100: row.get("yardline_100"),
                    posteam_abbr: row.get("posteam_abbr"),
                    score_home: row.get("score_home"),
                    score_away: row.get("score_away"),
                    play_type: row.get("play_type"),
                    description: row.get("description"),
                    created_at: row.get("created_at"),
                },
                estimate: ProbabilityEstimate {
                    id: row.get("prediction_id"),
                    play_id: row.get("id"),
                    model_version: row.get("model_version"),
                    home_wp: row.get("home_wp"),
                    away_wp: row.get("away_wp"),
                    predicted_at: row.get("predicted_at"),
                },
            })
            .collect();

        Ok(pairs)
    }
}
