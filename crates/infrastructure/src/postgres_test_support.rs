//! Shared setup for PostgreSQL adapter tests.
//!
//! Tests call [`test_pool`] and return early when `DATABASE_URL` is unset.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use ecclesia_core::UserId;

use crate::MIGRATOR;

pub async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for postgres adapter tests: {error}");
    }

    Some(pool)
}

/// Suffix that keeps names unique across test runs sharing one database.
pub fn unique_suffix() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_owned()
}

pub async fn insert_user(pool: &PgPool, role_id: Option<Uuid>) -> UserId {
    let email = format!("member-{}@example.org", unique_suffix());
    let inserted = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO users (email, display_name, password_hash, role_id)
        VALUES ($1, 'Test Member', 'not-a-real-hash', $2)
        RETURNING id
        "#,
    )
    .bind(email)
    .bind(role_id)
    .fetch_one(pool)
    .await;

    match inserted {
        Ok(user_id) => UserId::from_uuid(user_id),
        Err(error) => panic!("failed to insert test user: {error}"),
    }
}
