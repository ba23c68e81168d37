//! Database repository for saved reviewer signatures. One row per user.

use crate::db::{
    errors::Result,
    models::signatures::{SignatureDBResponse, SignatureUpsertDBRequest},
};
use crate::types::{UserId, abbrev_uuid};
use sqlx::PgConnection;
use tracing::instrument;

pub struct Signatures<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Signatures<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn get(&mut self, user_id: UserId) -> Result<Option<SignatureDBResponse>> {
        let signature = sqlx::query_as::<_, SignatureDBResponse>("SELECT * FROM signatures WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(signature)
    }

    /// Save or replace the user's signature
    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id), signature_type = ?request.signature_type), err)]
    pub async fn upsert(&mut self, request: &SignatureUpsertDBRequest) -> Result<SignatureDBResponse> {
        let signature = sqlx::query_as::<_, SignatureDBResponse>(
            r#"
            INSERT INTO signatures (user_id, signature_data, signature_type)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE SET
                signature_data = EXCLUDED.signature_data,
                signature_type = EXCLUDED.signature_type,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(request.user_id)
        .bind(&request.signature_data)
        .bind(request.signature_type)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::students::SignatureType;
    use crate::api::models::users::Role;
    use crate::test_utils::create_test_user;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_upsert_replaces_existing(pool: PgPool) {
        let coordinator = create_test_user(&pool, Role::Coordinator).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Signatures::new(&mut conn);

        assert!(repo.get(coordinator.id).await.unwrap().is_none());

        let first = repo
            .upsert(&SignatureUpsertDBRequest {
                user_id: coordinator.id,
                signature_data: "data:image/png;base64,AAAA".to_string(),
                signature_type: SignatureType::Draw,
            })
            .await
            .unwrap();
        let second = repo
            .upsert(&SignatureUpsertDBRequest {
                user_id: coordinator.id,
                signature_data: "data:image/jpeg;base64,BBBB".to_string(),
                signature_type: SignatureType::Upload,
            })
            .await
            .unwrap();

        assert_eq!(second.created_at, first.created_at);
        let stored = repo.get(coordinator.id).await.unwrap().unwrap();
        assert_eq!(stored.signature_type, SignatureType::Upload);
        assert_eq!(stored.signature_data, "data:image/jpeg;base64,BBBB");
    }
}
