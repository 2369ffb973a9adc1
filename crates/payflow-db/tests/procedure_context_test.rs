//! Procedure calls against a live PostgreSQL. Run with
//! `TEST_DATABASE_URL=postgres://... cargo test -p payflow-db -- --ignored`.

use payflow_db::PaymentProcedureExecutor;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

const SETUP: &[&str] = &[
    "CREATE SCHEMA IF NOT EXISTS auth",
    "CREATE SCHEMA IF NOT EXISTS payment_flow",
    r#"CREATE OR REPLACE FUNCTION auth.set_user_context(p_user_id bigint) RETURNS void
       LANGUAGE plpgsql AS $$
       BEGIN
           PERFORM set_config('app.user_id', COALESCE(p_user_id::text, ''), false);
       END $$"#,
    r#"CREATE OR REPLACE PROCEDURE payment_flow.validate_uploaded_data(p_file_id text, INOUT p_output text)
       LANGUAGE plpgsql AS $$
       BEGIN
           p_output := 'user ' || COALESCE(current_setting('app.user_id', true), '');
       END $$"#,
];

/// One connection, so every call below checks out the same session.
async fn single_connection_pool() -> PgPool {
    let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&url)
        .await
        .unwrap();
    for statement in SETUP {
        sqlx::query(statement).execute(&pool).await.unwrap();
    }
    pool
}

#[tokio::test]
#[ignore] // Requires PostgreSQL at TEST_DATABASE_URL
async fn test_user_context_is_cleared_before_connection_is_reused() {
    let pool = single_connection_pool().await;
    let executor = PaymentProcedureExecutor::new(pool.clone());

    let output = executor
        .validate_uploaded_data(Uuid::new_v4(), Some(42))
        .await
        .unwrap();
    assert_eq!(output, "user 42");

    let leftover: Option<String> =
        sqlx::query_scalar("SELECT NULLIF(current_setting('app.user_id', true), '')")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(leftover, None);

    let anonymous = executor
        .validate_uploaded_data(Uuid::new_v4(), None)
        .await
        .unwrap();
    assert_eq!(anonymous, "user ");
}
