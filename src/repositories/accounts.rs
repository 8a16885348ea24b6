use std::sync::Arc;

use async_trait::async_trait;

use super::AccountsStore;
use crate::{auth::UserInfo, database::DbConnection, models::Account};

/// A concurrent first login may insert the same subject; keep whichever row
/// landed first.
const INSERT_ACCOUNT: &str = "INSERT INTO accounts (id, name, email, picture) VALUES (?, ?, ?, ?) \
     ON DUPLICATE KEY UPDATE id = id";

/// Account rows, read and written through the scope's connection.
#[derive(Clone)]
pub struct AccountsRepository {
    db: Arc<DbConnection>,
}

impl AccountsRepository {
    pub fn new(db: Arc<DbConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AccountsStore for AccountsRepository {
    async fn get_by_id(&self, id: &str) -> Result<Option<Account>, sqlx::Error> {
        let mut conn = self.db.acquire().await?;
        sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
    }

    async fn create(&self, user: &UserInfo) -> Result<Account, sqlx::Error> {
        {
            let mut conn = self.db.acquire().await?;
            sqlx::query(INSERT_ACCOUNT)
                .bind(&user.sub)
                .bind(user.name.as_deref().unwrap_or_default())
                .bind(user.email.as_deref().unwrap_or_default())
                .bind(user.picture.as_deref().unwrap_or_default())
                .execute(&mut *conn)
                .await?;
        }
        self.get_by_id(&user.sub)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    async fn update(&self, account: &Account) -> Result<(), sqlx::Error> {
        let mut conn = self.db.acquire().await?;
        sqlx::query("UPDATE accounts SET name = ?, picture = ? WHERE id = ?")
            .bind(&account.name)
            .bind(&account.picture)
            .bind(&account.id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }
}
