use std::sync::Arc;

use tracing::info;

use crate::{
    auth::UserInfo,
    error::{AppError, AppResult},
    models::{Account, AccountEdit},
    repositories::AccountsStore,
};

#[derive(Clone)]
pub struct AccountService {
    repo: Arc<dyn AccountsStore>,
}

impl AccountService {
    pub fn new(repo: Arc<dyn AccountsStore>) -> Self {
        Self { repo }
    }

    /// The caller's account, created from their identity provider profile on
    /// first sight.
    pub async fn get_or_create_account(&self, user: &UserInfo) -> AppResult<Account> {
        if let Some(account) = self.repo.get_by_id(&user.sub).await? {
            return Ok(account);
        }
        info!(subject = %user.sub, "creating account");
        Ok(self.repo.create(user).await?)
    }

    pub async fn edit(&self, user: &UserInfo, edit: AccountEdit) -> AppResult<Account> {
        let mut account = self.get_or_create_account(user).await?;
        account.apply(edit);
        if account.name.trim().is_empty() {
            return Err(AppError::BadRequest("name is required".to_string()));
        }
        self.repo.update(&account).await?;
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::memory::MemoryAccounts;

    fn greg() -> UserInfo {
        UserInfo {
            sub: "auth0|greg".into(),
            name: Some("Greg".into()),
            email: Some("greg@example.com".into()),
            picture: Some("https://example.com/greg.png".into()),
        }
    }

    #[tokio::test]
    async fn first_visit_creates_from_profile() {
        let store = Arc::new(MemoryAccounts::default());
        let service = AccountService::new(store.clone());

        let account = service.get_or_create_account(&greg()).await.unwrap();
        assert_eq!(account.id, "auth0|greg");
        assert_eq!(account.name, "Greg");
        assert_eq!(account.email, "greg@example.com");

        service.get_or_create_account(&greg()).await.unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_first_logins_get_the_same_account() {
        let store = Arc::new(MemoryAccounts::default());
        let service = AccountService::new(store.clone());

        let tasks = (0..8)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move { service.get_or_create_account(&greg()).await })
            })
            .collect::<Vec<_>>();
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap().id, "auth0|greg");
        }
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn losing_the_insert_race_returns_the_stored_row() {
        // the read misses the row another request just inserted
        let store = Arc::new(MemoryAccounts::with_stale_reads());
        let service = AccountService::new(store.clone());
        store.insert(Account {
            name: "Gregory".into(),
            ..stored_account()
        });

        let account = service.get_or_create_account(&greg()).await.unwrap();
        assert_eq!(account.name, "Gregory");
        assert_eq!(store.get("auth0|greg").unwrap().name, "Gregory");
    }

    #[tokio::test]
    async fn edit_keeps_absent_fields() {
        let store = Arc::new(MemoryAccounts::default());
        let service = AccountService::new(store.clone());

        let edit = AccountEdit {
            name: Some("Greg Jr".into()),
            picture: None,
        };
        let account = service.edit(&greg(), edit).await.unwrap();
        assert_eq!(account.name, "Greg Jr");
        assert_eq!(account.picture, "https://example.com/greg.png");
        assert_eq!(store.get("auth0|greg").unwrap().name, "Greg Jr");
    }

    #[tokio::test]
    async fn blank_name_is_rejected() {
        let store = Arc::new(MemoryAccounts::default());
        let service = AccountService::new(store.clone());

        let edit = AccountEdit {
            name: Some("  ".into()),
            picture: None,
        };
        let err = service.edit(&greg(), edit).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(store.get("auth0|greg").unwrap().name, "Greg");
    }

    fn stored_account() -> Account {
        Account {
            id: "auth0|greg".into(),
            name: "Greg".into(),
            email: "greg@example.com".into(),
            picture: String::new(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }
}
