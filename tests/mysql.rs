//! Live MySQL checks. Run with `DATABASE_URL` set (a `.env` file works) and
//! `cargo test --test mysql -- --ignored`.

use sqlx::MySqlPool;
use sqlx_tx_propagation::{with_transaction, Error, MySqlResource, Propagation, TransactionManager};

type Tx = TransactionManager<MySqlResource>;

async fn connect() -> MySqlPool {
    dotenvy::dotenv().ok();
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "mysql://localhost/test".to_string());
    let pool = MySqlPool::connect(&database_url).await.unwrap();
    for table in ["tx_member", "tx_log"] {
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (username VARCHAR(255) PRIMARY KEY)"
        ))
        .execute(&pool)
        .await
        .unwrap();
    }
    pool
}

async fn insert(tx: &mut Tx, table: &str, username: &str) -> sqlx_tx_propagation::Result<()> {
    sqlx::query(&format!("INSERT INTO {table} (username) VALUES (?)"))
        .bind(username)
        .execute(tx.resource_mut().executor()?)
        .await?;
    Ok(())
}

async fn exists(pool: &MySqlPool, table: &str, username: &str) -> bool {
    let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table} WHERE username = ?"))
        .bind(username)
        .fetch_one(pool)
        .await
        .unwrap();
    count > 0
}

async fn cleanup(pool: &MySqlPool, username: &str) {
    for table in ["tx_member", "tx_log"] {
        sqlx::query(&format!("DELETE FROM {table} WHERE username = ?"))
            .bind(username)
            .execute(pool)
            .await
            .unwrap();
    }
}

#[tokio::test]
#[ignore = "requires a MySQL database"]
async fn swallowed_joined_failure_rolls_back_everything() {
    let pool = connect().await;
    let username = "mysql_recoverExceptionFail";
    cleanup(&pool, username).await;

    let mut tx = Tx::new(MySqlResource::new(pool.clone()));
    let result = with_transaction(&mut tx, Propagation::Required, |tx| {
        Box::pin(async move {
            insert(tx, "tx_member", username).await?;
            let _ = with_transaction(tx, Propagation::Required, |tx| {
                Box::pin(async move {
                    insert(tx, "tx_log", username).await?;
                    Err::<(), _>(Error::participant("log write failed"))
                })
            })
            .await;
            Ok(())
        })
    })
    .await;

    assert!(matches!(result, Err(Error::UnexpectedRollback { .. })));
    assert!(!exists(&pool, "tx_member", username).await);
    assert!(!exists(&pool, "tx_log", username).await);
}

#[tokio::test]
#[ignore = "requires a MySQL database"]
async fn requires_new_failure_is_isolated() {
    let pool = connect().await;
    let username = "mysql_recoverExceptionSuccess";
    cleanup(&pool, username).await;

    let mut tx = Tx::new(MySqlResource::new(pool.clone()));
    with_transaction(&mut tx, Propagation::Required, |tx| {
        Box::pin(async move {
            insert(tx, "tx_member", username).await?;
            let _ = with_transaction(tx, Propagation::RequiresNew, |tx| {
                Box::pin(async move {
                    insert(tx, "tx_log", username).await?;
                    Err::<(), _>(Error::participant("log write failed"))
                })
            })
            .await;
            Ok(())
        })
    })
    .await
    .unwrap();

    assert!(exists(&pool, "tx_member", username).await);
    assert!(!exists(&pool, "tx_log", username).await);
    cleanup(&pool, username).await;
}
