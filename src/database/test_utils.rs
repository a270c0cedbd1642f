#[cfg(test)]
use sea_orm::DatabaseConnection;

#[cfg(test)]
pub async fn setup_test_db() -> DatabaseConnection {
    // In-memory SQLite, one connection, fresh schema per test
    crate::database::connection::open_database(Some(":memory:"))
        .await
        .expect("Failed to set up test database")
}
