use super::response::ApiResponse;
use super::session::{AdminSession, Session};
use crate::error::AppResult;
use crate::models::{AgentAssignments, NewSkuMapping, SkuMapping, UploadRecord, User, UserStatus};
use crate::service::{
    AdminService, CompletionOutcome, OutputFile, ReconcileService, SalesReview, TemplateSummary,
    WorkflowSnapshot,
};
use axum::{
    body::Bytes,
    extract::{Json, Path, Query, State},
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// 上传接口的查询参数: 原始文件名 (决定解析方式)
#[derive(Debug, Deserialize)]
pub struct FileQuery {
    pub file_name: String,
}

/// 请求体: 业务员 -> SURVEYOR
#[derive(Debug, Deserialize)]
pub struct AssignAgentsRequest {
    pub assignments: AgentAssignments,
}

#[derive(Debug, Deserialize)]
pub struct UserStatusRequest {
    pub status: UserStatus,
}

type ApiResult<T> = AppResult<Json<ApiResponse<T>>>;

/// 健康检查
pub async fn health_check() -> &'static str {
    "OK"
}

// ================= 上传流程 =================

pub async fn workflow_status(
    State(service): State<Arc<ReconcileService>>,
    session: Session,
) -> ApiResult<WorkflowSnapshot> {
    let snapshot = service.status(&session.user).await?;
    Ok(ApiResponse::ok(format!("{:?}", snapshot.state), snapshot))
}

pub async fn upload_template(
    State(service): State<Arc<ReconcileService>>,
    session: Session,
    Query(query): Query<FileQuery>,
    body: Bytes,
) -> ApiResult<TemplateSummary> {
    let summary = service
        .upload_template(&session.user, &query.file_name, body.to_vec())
        .await?;
    Ok(ApiResponse::ok(
        format!("Template {} uploaded ({} rows)", summary.file_name, summary.rows),
        summary,
    ))
}

pub async fn submit_sales(
    State(service): State<Arc<ReconcileService>>,
    session: Session,
    Query(query): Query<FileQuery>,
    body: Bytes,
) -> ApiResult<SalesReview> {
    let review = service
        .submit_sales(&session.user, &query.file_name, body.to_vec())
        .await?;
    let message = if review.unmapped_skus.is_empty() {
        format!("{} DS Names found, please map them to SURVEYOR", review.agents.len())
    } else {
        format!(
            "{} DS Names found; {} SKUs have no mapping and will be skipped",
            review.agents.len(),
            review.unmapped_skus.len()
        )
    };
    Ok(ApiResponse::ok(message, review))
}

pub async fn assign_agents(
    State(service): State<Arc<ReconcileService>>,
    session: Session,
    Json(req): Json<AssignAgentsRequest>,
) -> ApiResult<WorkflowSnapshot> {
    let snapshot = service.assign_agents(&session.user, &req.assignments).await?;
    Ok(ApiResponse::ok(
        format!("{} DS Names still unassigned", snapshot.unassigned.len()),
        snapshot,
    ))
}

pub async fn complete_upload(
    State(service): State<Arc<ReconcileService>>,
    session: Session,
) -> ApiResult<CompletionOutcome> {
    let outcome = service.complete(&session.user).await?;
    Ok(ApiResponse::ok(
        format!("File processed successfully ({} rows)", outcome.rows),
        outcome,
    ))
}

pub async fn list_uploads(
    State(service): State<Arc<ReconcileService>>,
    session: Session,
) -> ApiResult<Vec<UploadRecord>> {
    let uploads = service.history(&session.user).await?;
    Ok(ApiResponse::ok(format!("{} uploads", uploads.len()), uploads))
}

pub async fn download_output(
    State(service): State<Arc<ReconcileService>>,
    session: Session,
    Path(upload_id): Path<Uuid>,
) -> AppResult<OutputFile> {
    service.download_output(&session.user, upload_id).await
}

// ================= SKU 映射 =================

pub async fn list_sku_mappings(
    State(service): State<Arc<AdminService>>,
    _session: Session,
) -> ApiResult<Vec<SkuMapping>> {
    let mappings = service.list_sku_mappings().await?;
    Ok(ApiResponse::ok(format!("{} mappings", mappings.len()), mappings))
}

pub async fn create_sku_mapping(
    State(service): State<Arc<AdminService>>,
    AdminSession(admin): AdminSession,
    Json(req): Json<NewSkuMapping>,
) -> ApiResult<SkuMapping> {
    let mapping = service.create_sku_mapping(&admin, req).await?;
    Ok(ApiResponse::ok("Mapping created", mapping))
}

pub async fn update_sku_mapping(
    State(service): State<Arc<AdminService>>,
    _admin: AdminSession,
    Path(id): Path<Uuid>,
    Json(req): Json<NewSkuMapping>,
) -> ApiResult<SkuMapping> {
    let mapping = service.update_sku_mapping(id, req).await?;
    Ok(ApiResponse::ok("Mapping updated", mapping))
}

pub async fn delete_sku_mapping(
    State(service): State<Arc<AdminService>>,
    _admin: AdminSession,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    service.delete_sku_mapping(id).await?;
    Ok(ApiResponse::message("Mapping deleted"))
}

pub async fn import_sku_mappings(
    State(service): State<Arc<AdminService>>,
    AdminSession(admin): AdminSession,
    Query(query): Query<FileQuery>,
    body: Bytes,
) -> ApiResult<usize> {
    let count = service
        .import_sku_mappings(&admin, &query.file_name, &body)
        .await?;
    Ok(ApiResponse::ok(format!("Successfully uploaded {count} mappings"), count))
}

// ================= 管理 =================

pub async fn list_users(
    State(service): State<Arc<AdminService>>,
    _admin: AdminSession,
) -> ApiResult<Vec<User>> {
    let users = service.list_users().await?;
    Ok(ApiResponse::ok(format!("{} users", users.len()), users))
}

pub async fn set_user_status(
    State(service): State<Arc<AdminService>>,
    AdminSession(admin): AdminSession,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UserStatusRequest>,
) -> ApiResult<User> {
    let user = service.set_user_status(&admin, user_id, req.status).await?;
    Ok(ApiResponse::ok(format!("User {} is now {}", user.username, user.status), user))
}

pub async fn user_uploads(
    State(service): State<Arc<AdminService>>,
    _admin: AdminSession,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Vec<UploadRecord>> {
    let uploads = service.user_uploads(user_id).await?;
    Ok(ApiResponse::ok(format!("{} uploads", uploads.len()), uploads))
}

pub async fn raw_summary(
    State(service): State<Arc<AdminService>>,
    _admin: AdminSession,
    Path(upload_id): Path<Uuid>,
) -> AppResult<OutputFile> {
    service.raw_summary(upload_id).await
}

pub async fn mapped_summary(
    State(service): State<Arc<AdminService>>,
    _admin: AdminSession,
    Path(upload_id): Path<Uuid>,
) -> AppResult<OutputFile> {
    service.mapped_summary(upload_id).await
}
