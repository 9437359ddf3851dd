use crate::db::{connect_db, Database};

pub async fn init_test_db() -> Database {
    let pool = connect_db("sqlite::memory:", 1)
        .await
        .expect("failed to create in-memory database");
    let db = Database::new(pool);
    db.migrate().await.expect("failed to run migrations");
    db
}
