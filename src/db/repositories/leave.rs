use anyhow::{Context, Result};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set,
};

use crate::entities::leave_requests::{self, LeaveStatus};

pub type LeaveRequest = leave_requests::Model;

#[derive(Debug, Clone)]
pub struct NewLeaveRequest {
    pub user_id: i32,
    pub start_date: String,
    pub end_date: String,
    pub reason: String,
}

pub struct LeaveRepository {
    conn: DatabaseConnection,
}

impl LeaveRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, id: i32) -> Result<Option<LeaveRequest>> {
        leave_requests::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query leave request")
    }

    pub async fn create(&self, request: NewLeaveRequest) -> Result<LeaveRequest> {
        let active = leave_requests::ActiveModel {
            user_id: Set(request.user_id),
            start_date: Set(request.start_date),
            end_date: Set(request.end_date),
            reason: Set(request.reason),
            status: Set(LeaveStatus::Pending),
            reviewer_id: Set(None),
            reviewed_at: Set(None),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .context("Failed to insert leave request")
    }

    pub async fn count_pending(&self) -> Result<u64> {
        leave_requests::Entity::find()
            .filter(leave_requests::Column::Status.eq(LeaveStatus::Pending))
            .count(&self.conn)
            .await
            .context("Failed to count pending leave requests")
    }

    /// Record a decision on a pending request. Returns `false` when the
    /// request does not exist or was already decided; the pending filter makes
    /// the first decision win under concurrency.
    pub async fn decide(&self, id: i32, approve: bool, reviewer_id: i32) -> Result<bool> {
        let status = if approve {
            LeaveStatus::Approved
        } else {
            LeaveStatus::Rejected
        };

        let result = leave_requests::Entity::update_many()
            .col_expr(leave_requests::Column::Status, Expr::value(status))
            .col_expr(
                leave_requests::Column::ReviewerId,
                Expr::value(Some(reviewer_id)),
            )
            .col_expr(
                leave_requests::Column::ReviewedAt,
                Expr::value(Some(chrono::Utc::now().to_rfc3339())),
            )
            .filter(leave_requests::Column::Id.eq(id))
            .filter(leave_requests::Column::Status.eq(LeaveStatus::Pending))
            .exec(&self.conn)
            .await
            .context("Failed to record leave decision")?;

        Ok(result.rows_affected > 0)
    }
}
