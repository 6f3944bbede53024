use crate::db::Store;
use crate::error::AppError;
use crate::models::User;
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use std::sync::Arc;
use uuid::Uuid;

/// 请求头: 当前操作员的用户 ID
pub const OPERATOR_HEADER: &str = "x-operator-id";

/// 已认证的操作员
///
/// 用法: `async fn handler(session: Session) -> ...`
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    Arc<dyn Store>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(OPERATOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .ok_or(AppError::Unauthorized)?;

        let store = <Arc<dyn Store> as FromRef<S>>::from_ref(state);
        let user = store
            .get_user(user_id)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !user.is_active() {
            tracing::warn!("Rejected request from disabled user {}", user.username);
            return Err(AppError::Forbidden("Account is disabled".to_string()));
        }

        Ok(Session { user })
    }
}

/// 管理员会话, 非管理员返回 403
#[derive(Debug, Clone)]
pub struct AdminSession(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for AdminSession
where
    Arc<dyn Store>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Session { user } = Session::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(AppError::Forbidden("Administrator access required".to_string()));
        }
        Ok(AdminSession(user))
    }
}
