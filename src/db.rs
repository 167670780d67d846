use anyhow::Result;
use sqlx::{query, SqlitePool};

// initialize database schema
pub async fn init(pool: &SqlitePool) -> Result<()> {
    let sql = include_str!("../queries/createdb.sql");

    for statement in sql.split_terminator(';') {
        let statement = statement.trim();
        if statement.is_empty() {
            continue;
        }

        query(statement).execute(pool).await?;
    }

    Ok(())
}

// random hex token, used for user and song ids
pub fn new_id() -> String {
    use rand::Rng;

    let bytes: [u8; 12] = rand::thread_rng().gen();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
