//! Common test utilities

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

/// Setup test database - truncate tables and seed a registered test user.
pub async fn setup_test_db() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set for tests");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    let mut tx = pool.begin().await.expect("Failed to begin transaction");

    sqlx::query(
        "TRUNCATE TABLE weekly_reports, weekly_metrics, sets_projection, workouts_projection, events, exercises, users CASCADE",
    )
    .execute(&mut *tx)
    .await
    .expect("Failed to clean up DB");

    tx.commit().await.expect("Failed to commit transaction");

    pool
}

/// Insert a registered (non-anonymous) user and return its id.
pub async fn seed_user(pool: &PgPool) -> Uuid {
    let user_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO users (user_id, email, is_anonymous) VALUES ($1, $2, false)",
    )
    .bind(user_id)
    .bind(format!("{user_id}@example.test"))
    .execute(pool)
    .await
    .expect("Failed to seed user");
    user_id
}

/// Insert an anonymous user and return its id.
pub async fn seed_anonymous_user(pool: &PgPool) -> Uuid {
    let user_id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (user_id, is_anonymous) VALUES ($1, true)")
        .bind(user_id)
        .execute(pool)
        .await
        .expect("Failed to seed anonymous user");
    user_id
}

/// Insert a catalog exercise and return its id.
pub async fn seed_exercise(pool: &PgPool, name: &str) -> Uuid {
    let exercise_id = Uuid::new_v4();
    sqlx::query("INSERT INTO exercises (exercise_id, name) VALUES ($1, $2)")
        .bind(exercise_id)
        .bind(name)
        .execute(pool)
        .await
        .expect("Failed to seed exercise");
    exercise_id
}
