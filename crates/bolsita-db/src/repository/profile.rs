//! Business profile stored as the owner's own document, `users/{owner}`.

use tracing::debug;

use bolsita_core::{UserProfile, ValidationError, MAX_NAME_LEN};

use super::RepoContext;
use crate::error::DbResult;
use crate::subscription::{Source, Subscription};
use crate::txn::{run_optimistic, WriteSet};

#[derive(Debug, Clone)]
pub struct ProfileRepository {
    ctx: RepoContext,
}

fn check_lengths(patch: &UserProfile) -> DbResult<()> {
    let fields = [
        ("businessName", &patch.business_name),
        ("businessAddress", &patch.business_address),
        ("businessPhone", &patch.business_phone),
    ];
    for (field, value) in fields {
        if value.as_ref().is_some_and(|v| v.chars().count() > MAX_NAME_LEN) {
            return Err(ValidationError::TooLong {
                field: field.to_string(),
                max: MAX_NAME_LEN,
            }
            .into());
        }
    }
    Ok(())
}

impl ProfileRepository {
    pub fn new(ctx: RepoContext) -> Self {
        ProfileRepository { ctx }
    }

    /// The stored profile; `None` until something was saved.
    pub async fn get(&self) -> DbResult<Option<UserProfile>> {
        match self.ctx.store.get(&self.ctx.scope.profile()).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    /// Merges `patch` into the stored profile (creating it if needed).
    ///
    /// Fields left `None` in the patch keep their stored value.
    pub async fn update(&self, patch: UserProfile) -> DbResult<UserProfile> {
        check_lengths(&patch)?;
        debug!(owner = %self.ctx.scope.owner(), "Updating profile");

        let path = self.ctx.scope.profile();
        run_optimistic(
            self.ctx.store.as_ref(),
            std::slice::from_ref(&path),
            self.ctx.policy,
            |snapshot| {
                let mut profile: UserProfile = snapshot.decode(&path)?.unwrap_or_default();
                profile.merge(&patch);

                let mut writes = WriteSet::new();
                writes.set(path.clone(), &profile)?;
                Ok((writes, profile))
            },
        )
        .await
    }

    /// Atomically increments the receipt counter and returns the new value.
    ///
    /// The first receipt is number 1.
    pub async fn next_receipt_number(&self) -> DbResult<i64> {
        let path = self.ctx.scope.profile();
        let number = run_optimistic(
            self.ctx.store.as_ref(),
            std::slice::from_ref(&path),
            self.ctx.policy,
            |snapshot| {
                let mut profile: UserProfile = snapshot.decode(&path)?.unwrap_or_default();
                let next = profile.receipt_counter.unwrap_or(0) + 1;
                profile.receipt_counter = Some(next);

                let mut writes = WriteSet::new();
                writes.set(path.clone(), &profile)?;
                Ok((writes, next))
            },
        )
        .await?;

        debug!(owner = %self.ctx.scope.owner(), number, "Reserved receipt number");
        Ok(number)
    }

    pub async fn subscribe(&self) -> DbResult<Subscription<Option<UserProfile>>> {
        Subscription::start(
            self.ctx.store.clone(),
            Source::Document(self.ctx.scope.profile()),
            |docs| match docs.first() {
                Some(doc) => Ok(Some(doc.decode()?)),
                None => Ok(None),
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::OwnerScope;
    use crate::store::MemoryStore;
    use crate::txn::RetryPolicy;
    use bolsita_core::OwnerId;
    use std::sync::Arc;

    fn repo() -> ProfileRepository {
        ProfileRepository::new(RepoContext::new(
            Arc::new(MemoryStore::new()),
            OwnerScope::new(OwnerId::new("o")),
            RetryPolicy::default(),
        ))
    }

    #[tokio::test]
    async fn test_missing_profile_reads_as_none() {
        assert_eq!(repo().get().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_update_merges() {
        let repo = repo();
        repo.update(UserProfile {
            business_name: Some("Tienda Ana".to_string()),
            business_phone: Some("555".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

        let merged = repo
            .update(UserProfile {
                business_phone: Some("777".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(merged.business_name.as_deref(), Some("Tienda Ana"));
        assert_eq!(merged.business_phone.as_deref(), Some("777"));
        assert_eq!(repo.get().await.unwrap(), Some(merged));
    }

    #[tokio::test]
    async fn test_receipt_numbers_increase() {
        let repo = repo();
        assert_eq!(repo.next_receipt_number().await.unwrap(), 1);
        assert_eq!(repo.next_receipt_number().await.unwrap(), 2);

        repo.update(UserProfile {
            business_name: Some("X".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
        assert_eq!(repo.next_receipt_number().await.unwrap(), 3);
    }
}
