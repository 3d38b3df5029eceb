use sqlx::MySqlPool;
use sqlx_tx_propagation::{with_transaction, Error, MySqlResource, Propagation, TransactionManager};
use tracing_subscriber::EnvFilter;

type Tx = TransactionManager<MySqlResource>;

async fn save(tx: &mut Tx, table: &str, username: &str) -> sqlx_tx_propagation::Result<()> {
    sqlx::query(&format!("INSERT INTO {table} (username) VALUES (?)"))
        .bind(username)
        .execute(tx.resource_mut().executor()?)
        .await?;
    Ok(())
}

/// Saves a member and a log entry; the log write fails for names starting with "fail".
async fn join(tx: &mut Tx, log_propagation: Propagation, username: &str) -> sqlx_tx_propagation::Result<()> {
    let username = username.to_owned();
    with_transaction(tx, Propagation::Required, move |tx| {
        Box::pin(async move {
            save(tx, "member", &username).await?;

            let logged = with_transaction(tx, log_propagation, |tx| {
                Box::pin(async move {
                    save(tx, "log", &username).await?;
                    if username.starts_with("fail") {
                        return Err(Error::participant("log write failed"));
                    }
                    Ok(())
                })
            })
            .await;

            if let Err(e) = logged {
                println!("   Log: failed ({}), continuing", e);
            }
            Ok(())
        })
    })
    .await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Connect to database
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "mysql://localhost/test".to_string());
    let pool = MySqlPool::connect(&database_url).await?;
    for table in ["member", "log"] {
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (username VARCHAR(255) PRIMARY KEY)"
        ))
        .execute(&pool)
        .await?;
    }

    let mut tx = TransactionManager::new(MySqlResource::new(pool.clone()));

    println!("=== Transaction Propagation Example ===\n");

    println!("1. Member and log in one transaction...");
    join(&mut tx, Propagation::Required, "alice").await?;
    println!("   ✓ Both committed\n");

    println!("2. Joined log fails, failure swallowed...");
    match join(&mut tx, Propagation::Required, "fail_bob").await {
        Err(Error::UnexpectedRollback { frame }) => {
            println!("   ✓ Commit of frame {} rolled back, member not saved\n", frame)
        }
        other => println!("   ✗ Expected an unexpected rollback, got {:?}\n", other),
    }

    println!("3. Independent log fails, failure swallowed...");
    join(&mut tx, Propagation::RequiresNew, "fail_carol").await?;
    println!("   ✓ Member committed, log rolled back on its own\n");

    println!("=== All propagation examples completed ===");

    drop(tx);
    pool.close().await;
    Ok(())
}
