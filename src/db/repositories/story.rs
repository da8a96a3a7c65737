//! Story repository
//!
//! Every lookup is scoped to the owning user, so another user's story is
//! indistinguishable from a missing one.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{ListParams, Story};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

const STORY_COLUMNS: &str = "id, title, date, content, tags, emotional_impact, analysis, \
     owner_id, created_at, updated_at";

const SEARCH_FILTER: &str =
    "(LOWER(title) LIKE ? OR LOWER(content) LIKE ? OR LOWER(tags) LIKE ?)";

/// Story repository trait
#[async_trait]
pub trait StoryRepository: Send + Sync {
    /// Insert a story, returning it with its new ID
    async fn create(&self, story: &Story) -> Result<Story>;

    /// Get a story by ID if it belongs to `owner_id`
    async fn get_for_owner(&self, id: i64, owner_id: i64) -> Result<Option<Story>>;

    /// List an owner's stories, newest first
    async fn list_by_owner(&self, owner_id: i64, params: &ListParams) -> Result<Vec<Story>>;

    /// Persist the editable fields of `story`
    async fn update(&self, story: &Story) -> Result<Story>;

    /// Replace the analysis text; returns false if no owned story matched
    async fn set_analysis(&self, id: i64, owner_id: i64, analysis: &str) -> Result<bool>;

    /// Delete an owned story; returns false if nothing matched
    async fn delete(&self, id: i64, owner_id: i64) -> Result<bool>;
}

/// SQLx-based story repository implementation
pub struct SqlxStoryRepository {
    pool: DynDatabasePool,
}

impl SqlxStoryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn StoryRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl StoryRepository for SqlxStoryRepository {
    async fn create(&self, story: &Story) -> Result<Story> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_story_sqlite(self.pool.sqlite()?, story).await,
            DatabaseDriver::Mysql => create_story_mysql(self.pool.mysql()?, story).await,
        }
    }

    async fn get_for_owner(&self, id: i64, owner_id: i64) -> Result<Option<Story>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_story_sqlite(self.pool.sqlite()?, id, owner_id).await,
            DatabaseDriver::Mysql => get_story_mysql(self.pool.mysql()?, id, owner_id).await,
        }
    }

    async fn list_by_owner(&self, owner_id: i64, params: &ListParams) -> Result<Vec<Story>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_stories_sqlite(self.pool.sqlite()?, owner_id, params).await
            }
            DatabaseDriver::Mysql => list_stories_mysql(self.pool.mysql()?, owner_id, params).await,
        }
    }

    async fn update(&self, story: &Story) -> Result<Story> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_story_sqlite(self.pool.sqlite()?, story).await,
            DatabaseDriver::Mysql => update_story_mysql(self.pool.mysql()?, story).await,
        }
    }

    async fn set_analysis(&self, id: i64, owner_id: i64, analysis: &str) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                set_analysis_sqlite(self.pool.sqlite()?, id, owner_id, analysis).await
            }
            DatabaseDriver::Mysql => {
                set_analysis_mysql(self.pool.mysql()?, id, owner_id, analysis).await
            }
        }
    }

    async fn delete(&self, id: i64, owner_id: i64) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_story_sqlite(self.pool.sqlite()?, id, owner_id).await,
            DatabaseDriver::Mysql => delete_story_mysql(self.pool.mysql()?, id, owner_id).await,
        }
    }
}

/// `%term%` pattern for a lowercase LIKE match
fn like_pattern(search: &str) -> String {
    format!("%{}%", search.to_lowercase())
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_story_sqlite(pool: &SqlitePool, story: &Story) -> Result<Story> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO stories (title, date, content, tags, emotional_impact, analysis,
                             owner_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&story.title)
    .bind(&story.date)
    .bind(&story.content)
    .bind(&story.tags)
    .bind(&story.emotional_impact)
    .bind(&story.analysis)
    .bind(story.owner_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create story")?;

    Ok(Story {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..story.clone()
    })
}

async fn get_story_sqlite(pool: &SqlitePool, id: i64, owner_id: i64) -> Result<Option<Story>> {
    let row = sqlx::query(&format!(
        "SELECT {STORY_COLUMNS} FROM stories WHERE id = ? AND owner_id = ?"
    ))
    .bind(id)
    .bind(owner_id)
    .fetch_optional(pool)
    .await
    .context("Failed to get story")?;

    Ok(row.as_ref().map(row_to_story_sqlite))
}

async fn list_stories_sqlite(
    pool: &SqlitePool,
    owner_id: i64,
    params: &ListParams,
) -> Result<Vec<Story>> {
    let rows = match params.search.as_deref() {
        Some(search) => {
            let pattern = like_pattern(search);
            sqlx::query(&format!(
                "SELECT {STORY_COLUMNS} FROM stories WHERE owner_id = ? AND {SEARCH_FILTER} \
                 ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
            ))
            .bind(owner_id)
            .bind(&pattern)
            .bind(&pattern)
            .bind(&pattern)
            .bind(params.limit)
            .bind(params.skip)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query(&format!(
                "SELECT {STORY_COLUMNS} FROM stories WHERE owner_id = ? \
                 ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
            ))
            .bind(owner_id)
            .bind(params.limit)
            .bind(params.skip)
            .fetch_all(pool)
            .await
        }
    }
    .context("Failed to list stories")?;

    Ok(rows.iter().map(row_to_story_sqlite).collect())
}

async fn update_story_sqlite(pool: &SqlitePool, story: &Story) -> Result<Story> {
    let now = Utc::now();

    sqlx::query(
        r#"
        UPDATE stories
        SET title = ?, date = ?, content = ?, tags = ?, emotional_impact = ?, updated_at = ?
        WHERE id = ? AND owner_id = ?
        "#,
    )
    .bind(&story.title)
    .bind(&story.date)
    .bind(&story.content)
    .bind(&story.tags)
    .bind(&story.emotional_impact)
    .bind(now)
    .bind(story.id)
    .bind(story.owner_id)
    .execute(pool)
    .await
    .context("Failed to update story")?;

    Ok(Story {
        updated_at: now,
        ..story.clone()
    })
}

async fn set_analysis_sqlite(
    pool: &SqlitePool,
    id: i64,
    owner_id: i64,
    analysis: &str,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE stories SET analysis = ?, updated_at = ? WHERE id = ? AND owner_id = ?",
    )
    .bind(analysis)
    .bind(Utc::now())
    .bind(id)
    .bind(owner_id)
    .execute(pool)
    .await
    .context("Failed to store story analysis")?;

    Ok(result.rows_affected() > 0)
}

async fn delete_story_sqlite(pool: &SqlitePool, id: i64, owner_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM stories WHERE id = ? AND owner_id = ?")
        .bind(id)
        .bind(owner_id)
        .execute(pool)
        .await
        .context("Failed to delete story")?;

    Ok(result.rows_affected() > 0)
}

fn row_to_story_sqlite(row: &sqlx::sqlite::SqliteRow) -> Story {
    Story {
        id: row.get("id"),
        title: row.get("title"),
        date: row.get("date"),
        content: row.get("content"),
        tags: row.get("tags"),
        emotional_impact: row.get("emotional_impact"),
        analysis: row.get("analysis"),
        owner_id: row.get("owner_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_story_mysql(pool: &MySqlPool, story: &Story) -> Result<Story> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO stories (title, date, content, tags, emotional_impact, analysis,
                             owner_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&story.title)
    .bind(&story.date)
    .bind(&story.content)
    .bind(&story.tags)
    .bind(&story.emotional_impact)
    .bind(&story.analysis)
    .bind(story.owner_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create story")?;

    Ok(Story {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        ..story.clone()
    })
}

async fn get_story_mysql(pool: &MySqlPool, id: i64, owner_id: i64) -> Result<Option<Story>> {
    let row = sqlx::query(&format!(
        "SELECT {STORY_COLUMNS} FROM stories WHERE id = ? AND owner_id = ?"
    ))
    .bind(id)
    .bind(owner_id)
    .fetch_optional(pool)
    .await
    .context("Failed to get story")?;

    Ok(row.as_ref().map(row_to_story_mysql))
}

async fn list_stories_mysql(
    pool: &MySqlPool,
    owner_id: i64,
    params: &ListParams,
) -> Result<Vec<Story>> {
    let rows = match params.search.as_deref() {
        Some(search) => {
            let pattern = like_pattern(search);
            sqlx::query(&format!(
                "SELECT {STORY_COLUMNS} FROM stories WHERE owner_id = ? AND {SEARCH_FILTER} \
                 ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
            ))
            .bind(owner_id)
            .bind(&pattern)
            .bind(&pattern)
            .bind(&pattern)
            .bind(params.limit)
            .bind(params.skip)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query(&format!(
                "SELECT {STORY_COLUMNS} FROM stories WHERE owner_id = ? \
                 ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
            ))
            .bind(owner_id)
            .bind(params.limit)
            .bind(params.skip)
            .fetch_all(pool)
            .await
        }
    }
    .context("Failed to list stories")?;

    Ok(rows.iter().map(row_to_story_mysql).collect())
}

async fn update_story_mysql(pool: &MySqlPool, story: &Story) -> Result<Story> {
    let now = Utc::now();

    sqlx::query(
        r#"
        UPDATE stories
        SET title = ?, date = ?, content = ?, tags = ?, emotional_impact = ?, updated_at = ?
        WHERE id = ? AND owner_id = ?
        "#,
    )
    .bind(&story.title)
    .bind(&story.date)
    .bind(&story.content)
    .bind(&story.tags)
    .bind(&story.emotional_impact)
    .bind(now)
    .bind(story.id)
    .bind(story.owner_id)
    .execute(pool)
    .await
    .context("Failed to update story")?;

    Ok(Story {
        updated_at: now,
        ..story.clone()
    })
}

async fn set_analysis_mysql(
    pool: &MySqlPool,
    id: i64,
    owner_id: i64,
    analysis: &str,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE stories SET analysis = ?, updated_at = ? WHERE id = ? AND owner_id = ?",
    )
    .bind(analysis)
    .bind(Utc::now())
    .bind(id)
    .bind(owner_id)
    .execute(pool)
    .await
    .context("Failed to store story analysis")?;

    Ok(result.rows_affected() > 0)
}

async fn delete_story_mysql(pool: &MySqlPool, id: i64, owner_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM stories WHERE id = ? AND owner_id = ?")
        .bind(id)
        .bind(owner_id)
        .execute(pool)
        .await
        .context("Failed to delete story")?;

    Ok(result.rows_affected() > 0)
}

fn row_to_story_mysql(row: &sqlx::mysql::MySqlRow) -> Story {
    Story {
        id: row.get("id"),
        title: row.get("title"),
        date: row.get("date"),
        content: row.get("content"),
        tags: row.get("tags"),
        emotional_impact: row.get("emotional_impact"),
        analysis: row.get("analysis"),
        owner_id: row.get("owner_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{CreateStoryInput, User};

    async fn setup() -> (SqlxStoryRepository, i64, i64) {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();

        let users = SqlxUserRepository::new(pool.clone());
        let alice = users
            .create(&User::new("alice@example.com".to_string(), "h".to_string(), None))
            .await
            .unwrap();
        let bob = users
            .create(&User::new("bob@example.com".to_string(), "h".to_string(), None))
            .await
            .unwrap();

        (SqlxStoryRepository::new(pool), alice.id, bob.id)
    }

    fn story(owner_id: i64, title: &str, content: &str, tags: &str) -> Story {
        Story::new(
            owner_id,
            CreateStoryInput {
                title: title.to_string(),
                date: "today".to_string(),
                content: content.to_string(),
                tags: Some(tags.to_string()),
                emotional_impact: None,
            },
        )
    }

    #[tokio::test]
    async fn test_create_and_get_for_owner() {
        let (repo, alice, bob) = setup().await;
        let created = repo
            .create(&story(alice, "Keys", "I forgot my keys at the office", "work"))
            .await
            .unwrap();

        let fetched = repo.get_for_owner(created.id, alice).await.unwrap().unwrap();
        assert_eq!(fetched.title, "Keys");
        assert_eq!(fetched.emotional_impact, "medium");

        assert!(repo.get_for_owner(created.id, bob).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_only_owned_newest_first() {
        let (repo, alice, bob) = setup().await;
        repo.create(&story(alice, "First", "the first entry text", "")).await.unwrap();
        repo.create(&story(alice, "Second", "the second entry text", "")).await.unwrap();
        repo.create(&story(bob, "Bob's", "someone else's entry", "")).await.unwrap();

        let stories = repo.list_by_owner(alice, &ListParams::default()).await.unwrap();
        assert_eq!(stories.len(), 2);
        assert_eq!(stories[0].title, "Second");
    }

    #[tokio::test]
    async fn test_search_matches_title_content_and_tags() {
        let (repo, alice, _) = setup().await;
        repo.create(&story(alice, "Beach Day", "sand everywhere today", "summer")).await.unwrap();
        repo.create(&story(alice, "Office", "forgot my KEYS again", "work")).await.unwrap();
        repo.create(&story(alice, "Trip", "long drive north", "keys, car")).await.unwrap();

        let params = ListParams::new(0, 100, Some("keys".to_string()));
        let found = repo.list_by_owner(alice, &params).await.unwrap();
        assert_eq!(found.len(), 2);

        let params = ListParams::new(0, 100, Some("beach".to_string()));
        assert_eq!(repo.list_by_owner(alice, &params).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_and_set_analysis() {
        let (repo, alice, bob) = setup().await;
        let mut created = repo
            .create(&story(alice, "Keys", "I forgot my keys at the office", ""))
            .await
            .unwrap();

        created.title = "Lost Keys".to_string();
        repo.update(&created).await.unwrap();

        assert!(repo.set_analysis(created.id, alice, "Mild frustration.").await.unwrap());
        assert!(!repo.set_analysis(created.id, bob, "hijack").await.unwrap());

        let fetched = repo.get_for_owner(created.id, alice).await.unwrap().unwrap();
        assert_eq!(fetched.title, "Lost Keys");
        assert_eq!(fetched.analysis.as_deref(), Some("Mild frustration."));
    }

    #[tokio::test]
    async fn test_delete_scoped_to_owner() {
        let (repo, alice, bob) = setup().await;
        let created = repo
            .create(&story(alice, "Keys", "I forgot my keys at the office", ""))
            .await
            .unwrap();

        assert!(!repo.delete(created.id, bob).await.unwrap());
        assert!(repo.delete(created.id, alice).await.unwrap());
        assert!(repo.get_for_owner(created.id, alice).await.unwrap().is_none());
    }
}
