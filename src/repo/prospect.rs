use std::ops::Deref;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Database, Pool};
use uuid::Uuid;

use super::RepoError;
use crate::model::{AccountId, ProspectReview, ReviewId, ReviewStatus, SiteId};

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ReviewRecord {
    pub id: Uuid,
    pub site_id: Uuid,
    pub share_token: String,
    pub prospect_email: String,
    pub prospect_name: Option<String>,
    pub prospect_phone: Option<String>,
    pub status: i32,
    pub expires_at: DateTime<Utc>,
    pub viewed_at: Option<DateTime<Utc>>,
    pub responded_at: Option<DateTime<Utc>>,
    pub feedback: Option<String>,
    pub company_name: Option<String>,
    pub requested_domain: Option<String>,
    pub deploy_started_at: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProspectReview> for ReviewRecord {
    fn from(value: ProspectReview) -> Self {
        Self {
            id: value.id.0,
            site_id: value.site_id.0,
            share_token: value.share_token,
            prospect_email: value.prospect_email,
            prospect_name: value.prospect_name,
            prospect_phone: value.prospect_phone,
            status: value.status.into(),
            expires_at: value.expires_at,
            viewed_at: value.viewed_at,
            responded_at: value.responded_at,
            feedback: value.feedback,
            company_name: value.company_name,
            requested_domain: value.requested_domain,
            deploy_started_at: value.deploy_started_at,
            created_by: value.created_by.0,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

impl TryFrom<ReviewRecord> for ProspectReview {
    type Error = String;

    fn try_from(value: ReviewRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ReviewId(value.id),
            site_id: SiteId(value.site_id),
            share_token: value.share_token,
            prospect_email: value.prospect_email,
            prospect_name: value.prospect_name,
            prospect_phone: value.prospect_phone,
            status: value.status.try_into()?,
            expires_at: value.expires_at,
            viewed_at: value.viewed_at,
            responded_at: value.responded_at,
            feedback: value.feedback,
            company_name: value.company_name,
            requested_domain: value.requested_domain,
            deploy_started_at: value.deploy_started_at,
            created_by: AccountId(value.created_by),
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

/// All transitions are single conditional UPDATEs; a `false` return means the
/// review was not in a state the transition is allowed from, typically because
/// a concurrent request won the race.
#[async_trait]
pub trait ProspectReviewRepo {
    async fn create(&self, review: &ReviewRecord) -> Result<(), RepoError>;
    async fn get(&self, id: &Uuid) -> Result<Option<ReviewRecord>, RepoError>;
    async fn get_by_token(&self, share_token: &str) -> Result<Option<ReviewRecord>, RepoError>;
    async fn get_by_site(&self, site_id: &Uuid) -> Result<Vec<ReviewRecord>, RepoError>;

    /// Pending -> Viewed.
    async fn mark_viewed(&self, id: &Uuid, now: DateTime<Utc>) -> Result<bool, RepoError>;
    /// Pending/Viewed -> Approved/Declined.
    async fn respond(
        &self,
        id: &Uuid,
        status: i32,
        feedback: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool, RepoError>;
    /// Approved -> DetailsSubmitted/Deploying, recording the submitted details.
    async fn submit_details(
        &self,
        id: &Uuid,
        status: i32,
        company_name: &str,
        requested_domain: Option<&str>,
        prospect_phone: Option<&str>,
        deploy_started_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<bool, RepoError>;
    /// Back to Pending with a fresh deadline, clearing any previous response.
    async fn reset_for_resend(
        &self,
        id: &Uuid,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), RepoError>;
    async fn delete(&self, id: &Uuid) -> Result<bool, RepoError>;

    /// Deploying -> Live for reviews whose deploy started before `cutoff`.
    async fn promote_deploying(
        &self,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u64, RepoError>;
    /// Marks overdue non-terminal reviews Expired. Deploying reviews are left
    /// alone so they always reach Live.
    async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<u64, RepoError>;
}

pub struct DbProspectReviewRepo<DB: Database> {
    db_pool: Arc<Pool<DB>>,
}

impl<DB: Database> DbProspectReviewRepo<DB> {
    pub fn new(db_pool: Arc<Pool<DB>>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl ProspectReviewRepo for DbProspectReviewRepo<sqlx::Postgres> {
    async fn create(&self, review: &ReviewRecord) -> Result<(), RepoError> {
        sqlx::query(
            r#"
              INSERT INTO prospect_reviews
                (id, site_id, share_token, prospect_email, prospect_name, prospect_phone,
                 status, expires_at, viewed_at, responded_at, feedback, company_name,
                 requested_domain, deploy_started_at, created_by, created_at, updated_at)
              VALUES
                ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(review.id)
        .bind(review.site_id)
        .bind(&review.share_token)
        .bind(&review.prospect_email)
        .bind(&review.prospect_name)
        .bind(&review.prospect_phone)
        .bind(review.status)
        .bind(review.expires_at)
        .bind(review.viewed_at)
        .bind(review.responded_at)
        .bind(&review.feedback)
        .bind(&review.company_name)
        .bind(&review.requested_domain)
        .bind(review.deploy_started_at)
        .bind(review.created_by)
        .bind(review.created_at)
        .bind(review.updated_at)
        .execute(self.db_pool.deref())
        .await?;

        Ok(())
    }

    async fn get(&self, id: &Uuid) -> Result<Option<ReviewRecord>, RepoError> {
        let result =
            sqlx::query_as::<_, ReviewRecord>("SELECT * FROM prospect_reviews WHERE id = $1")
                .bind(id)
                .fetch_optional(self.db_pool.deref())
                .await?;

        Ok(result)
    }

    async fn get_by_token(&self, share_token: &str) -> Result<Option<ReviewRecord>, RepoError> {
        let result = sqlx::query_as::<_, ReviewRecord>(
            "SELECT * FROM prospect_reviews WHERE share_token = $1",
        )
        .bind(share_token)
        .fetch_optional(self.db_pool.deref())
        .await?;

        Ok(result)
    }

    async fn get_by_site(&self, site_id: &Uuid) -> Result<Vec<ReviewRecord>, RepoError> {
        let result = sqlx::query_as::<_, ReviewRecord>(
            "SELECT * FROM prospect_reviews WHERE site_id = $1 ORDER BY created_at",
        )
        .bind(site_id)
        .fetch_all(self.db_pool.deref())
        .await?;

        Ok(result)
    }

    async fn mark_viewed(&self, id: &Uuid, now: DateTime<Utc>) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"
              UPDATE prospect_reviews
              SET status = $1, viewed_at = $2, updated_at = $2
              WHERE id = $3 AND status = $4
            "#,
        )
        .bind(i32::from(ReviewStatus::Viewed))
        .bind(now)
        .bind(id)
        .bind(i32::from(ReviewStatus::Pending))
        .execute(self.db_pool.deref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn respond(
        &self,
        id: &Uuid,
        status: i32,
        feedback: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"
              UPDATE prospect_reviews
              SET status = $1, feedback = $2, responded_at = $3, updated_at = $3
              WHERE id = $4 AND status IN ($5, $6) AND expires_at > $3
            "#,
        )
        .bind(status)
        .bind(feedback)
        .bind(now)
        .bind(id)
        .bind(i32::from(ReviewStatus::Pending))
        .bind(i32::from(ReviewStatus::Viewed))
        .execute(self.db_pool.deref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn submit_details(
        &self,
        id: &Uuid,
        status: i32,
        company_name: &str,
        requested_domain: Option<&str>,
        prospect_phone: Option<&str>,
        deploy_started_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"
              UPDATE prospect_reviews
              SET status = $1,
                  company_name = $2,
                  requested_domain = $3,
                  prospect_phone = COALESCE($4, prospect_phone),
                  deploy_started_at = $5,
                  updated_at = $6
              WHERE id = $7 AND status = $8
            "#,
        )
        .bind(status)
        .bind(company_name)
        .bind(requested_domain)
        .bind(prospect_phone)
        .bind(deploy_started_at)
        .bind(now)
        .bind(id)
        .bind(i32::from(ReviewStatus::Approved))
        .execute(self.db_pool.deref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn reset_for_resend(
        &self,
        id: &Uuid,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), RepoError> {
        sqlx::query(
            r#"
              UPDATE prospect_reviews
              SET status = $1,
                  expires_at = $2,
                  viewed_at = NULL,
                  responded_at = NULL,
                  feedback = NULL,
                  deploy_started_at = NULL,
                  updated_at = $3
              WHERE id = $4
            "#,
        )
        .bind(i32::from(ReviewStatus::Pending))
        .bind(expires_at)
        .bind(now)
        .bind(id)
        .execute(self.db_pool.deref())
        .await?;

        Ok(())
    }

    async fn delete(&self, id: &Uuid) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM prospect_reviews WHERE id = $1")
            .bind(id)
            .execute(self.db_pool.deref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn promote_deploying(
        &self,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u64, RepoError> {
        let result = sqlx::query(
            r#"
              UPDATE prospect_reviews
              SET status = $1, updated_at = $2
              WHERE status = $3 AND deploy_started_at <= $4
            "#,
        )
        .bind(i32::from(ReviewStatus::Live))
        .bind(now)
        .bind(i32::from(ReviewStatus::Deploying))
        .bind(cutoff)
        .execute(self.db_pool.deref())
        .await?;

        Ok(result.rows_affected())
    }

    async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<u64, RepoError> {
        let result = sqlx::query(
            r#"
              UPDATE prospect_reviews
              SET status = $1, updated_at = $2
              WHERE status IN ($3, $4, $5, $6) AND expires_at < $2
            "#,
        )
        .bind(i32::from(ReviewStatus::Expired))
        .bind(now)
        .bind(i32::from(ReviewStatus::Pending))
        .bind(i32::from(ReviewStatus::Viewed))
        .bind(i32::from(ReviewStatus::Approved))
        .bind(i32::from(ReviewStatus::DetailsSubmitted))
        .execute(self.db_pool.deref())
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ProspectReviewRepo for DbProspectReviewRepo<sqlx::Sqlite> {
    async fn create(&self, review: &ReviewRecord) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO prospect_reviews (id, site_id, share_token, prospect_email, prospect_name, prospect_phone, status, expires_at, viewed_at, responded_at, feedback, company_name, requested_domain, deploy_started_at, created_by, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
        )
        .bind(review.id)
        .bind(review.site_id)
        .bind(&review.share_token)
        .bind(&review.prospect_email)
        .bind(&review.prospect_name)
        .bind(&review.prospect_phone)
        .bind(review.status)
        .bind(review.expires_at)
        .bind(review.viewed_at)
        .bind(review.responded_at)
        .bind(&review.feedback)
        .bind(&review.company_name)
        .bind(&review.requested_domain)
        .bind(review.deploy_started_at)
        .bind(review.created_by)
        .bind(review.created_at)
        .bind(review.updated_at)
        .execute(self.db_pool.deref())
        .await?;

        Ok(())
    }

    async fn get(&self, id: &Uuid) -> Result<Option<ReviewRecord>, RepoError> {
        let result =
            sqlx::query_as::<_, ReviewRecord>("SELECT * FROM prospect_reviews WHERE id = $1")
                .bind(id)
                .fetch_optional(self.db_pool.deref())
                .await?;

        Ok(result)
    }

    async fn get_by_token(&self, share_token: &str) -> Result<Option<ReviewRecord>, RepoError> {
        let result = sqlx::query_as::<_, ReviewRecord>(
            "SELECT * FROM prospect_reviews WHERE share_token = $1",
        )
        .bind(share_token)
        .fetch_optional(self.db_pool.deref())
        .await?;

        Ok(result)
    }

    async fn get_by_site(&self, site_id: &Uuid) -> Result<Vec<ReviewRecord>, RepoError> {
        let result = sqlx::query_as::<_, ReviewRecord>(
            "SELECT * FROM prospect_reviews WHERE site_id = $1 ORDER BY created_at",
        )
        .bind(site_id)
        .fetch_all(self.db_pool.deref())
        .await?;

        Ok(result)
    }

    async fn mark_viewed(&self, id: &Uuid, now: DateTime<Utc>) -> Result<bool, RepoError> {
        let result = sqlx::query(
            "UPDATE prospect_reviews SET status = $1, viewed_at = $2, updated_at = $2 WHERE id = $3 AND status = $4",
        )
        .bind(i32::from(ReviewStatus::Viewed))
        .bind(now)
        .bind(id)
        .bind(i32::from(ReviewStatus::Pending))
        .execute(self.db_pool.deref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn respond(
        &self,
        id: &Uuid,
        status: i32,
        feedback: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool, RepoError> {
        let result = sqlx::query(
            "UPDATE prospect_reviews SET status = $1, feedback = $2, responded_at = $3, updated_at = $3 WHERE id = $4 AND status IN ($5, $6) AND expires_at > $3",
        )
        .bind(status)
        .bind(feedback)
        .bind(now)
        .bind(id)
        .bind(i32::from(ReviewStatus::Pending))
        .bind(i32::from(ReviewStatus::Viewed))
        .execute(self.db_pool.deref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn submit_details(
        &self,
        id: &Uuid,
        status: i32,
        company_name: &str,
        requested_domain: Option<&str>,
        prospect_phone: Option<&str>,
        deploy_started_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<bool, RepoError> {
        let result = sqlx::query(
            "UPDATE prospect_reviews SET status = $1, company_name = $2, requested_domain = $3, prospect_phone = COALESCE($4, prospect_phone), deploy_started_at = $5, updated_at = $6 WHERE id = $7 AND status = $8",
        )
        .bind(status)
        .bind(company_name)
        .bind(requested_domain)
        .bind(prospect_phone)
        .bind(deploy_started_at)
        .bind(now)
        .bind(id)
        .bind(i32::from(ReviewStatus::Approved))
        .execute(self.db_pool.deref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn reset_for_resend(
        &self,
        id: &Uuid,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), RepoError> {
        sqlx::query(
            "UPDATE prospect_reviews SET status = $1, expires_at = $2, viewed_at = NULL, responded_at = NULL, feedback = NULL, deploy_started_at = NULL, updated_at = $3 WHERE id = $4",
        )
        .bind(i32::from(ReviewStatus::Pending))
        .bind(expires_at)
        .bind(now)
        .bind(id)
        .execute(self.db_pool.deref())
        .await?;

        Ok(())
    }

    async fn delete(&self, id: &Uuid) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM prospect_reviews WHERE id = $1")
            .bind(id)
            .execute(self.db_pool.deref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn promote_deploying(
        &self,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u64, RepoError> {
        let result = sqlx::query(
            "UPDATE prospect_reviews SET status = $1, updated_at = $2 WHERE status = $3 AND deploy_started_at <= $4",
        )
        .bind(i32::from(ReviewStatus::Live))
        .bind(now)
        .bind(i32::from(ReviewStatus::Deploying))
        .bind(cutoff)
        .execute(self.db_pool.deref())
        .await?;

        Ok(result.rows_affected())
    }

    async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<u64, RepoError> {
        let result = sqlx::query(
            "UPDATE prospect_reviews SET status = $1, updated_at = $2 WHERE status IN ($3, $4, $5, $6) AND expires_at < $2",
        )
        .bind(i32::from(ReviewStatus::Expired))
        .bind(now)
        .bind(i32::from(ReviewStatus::Pending))
        .bind(i32::from(ReviewStatus::Viewed))
        .bind(i32::from(ReviewStatus::Approved))
        .bind(i32::from(ReviewStatus::DetailsSubmitted))
        .execute(self.db_pool.deref())
        .await?;

        Ok(result.rows_affected())
    }
}
