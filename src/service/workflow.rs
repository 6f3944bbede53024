use super::reconcile::{apply_lookup, build_lookup, find_unmapped_skus, JoinStats};
use super::render::render_output;
use crate::config::AppConfig;
use crate::db::Store;
use crate::error::{AppError, AppResult};
use crate::models::{
    output_file_name_for, AgentAssignments, AggregatedSales, PendingUpload, SkuIndex,
    UploadRecord, UploadWorkflow, User, UserTemplate, WorkflowState,
};
use crate::sheet::{parse_sales, parse_template, read_grid};
use crate::storage::ObjectStorage;
use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// 当前流程快照
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowSnapshot {
    pub state: WorkflowState,
    /// 另一个请求正在处理该用户的流程
    pub busy: bool,
    pub template_file_name: Option<String>,
    pub upload_id: Option<Uuid>,
    pub sales_file_name: Option<String>,
    pub agents: Vec<String>,
    pub assignments: AgentAssignments,
    pub unassigned: Vec<String>,
    pub unmapped_skus: Vec<String>,
    pub last_error: Option<String>,
}

impl WorkflowSnapshot {
    fn of(wf: &UploadWorkflow) -> Self {
        let pending = wf.pending();
        Self {
            state: wf.state(),
            busy: false,
            template_file_name: wf.template().map(|t| t.file_name.clone()),
            upload_id: pending.map(|p| p.upload_id),
            sales_file_name: pending.map(|p| p.sales_file_name.clone()),
            agents: pending.map(|p| p.agents.clone()).unwrap_or_default(),
            assignments: pending.map(|p| p.assignments.clone()).unwrap_or_default(),
            unassigned: pending
                .map(|p| p.assignments.unassigned(&p.agents).into_iter().cloned().collect())
                .unwrap_or_default(),
            unmapped_skus: pending.map(|p| p.unmapped_skus.clone()).unwrap_or_default(),
            last_error: wf.last_error().map(str::to_string),
        }
    }

    fn busy() -> Self {
        Self {
            state: WorkflowState::Processing,
            busy: true,
            template_file_name: None,
            upload_id: None,
            sales_file_name: None,
            agents: vec![],
            assignments: AgentAssignments::new(),
            unassigned: vec![],
            unmapped_skus: vec![],
            last_error: None,
        }
    }
}

/// 模板上传结果
#[derive(Debug, Clone, Serialize)]
pub struct TemplateSummary {
    pub template_id: Uuid,
    pub file_name: String,
    pub headers: Vec<String>,
    pub rows: usize,
    pub surveyors: Vec<String>,
}

/// 销售文件解析结果, 供业务员分配
#[derive(Debug, Clone, Serialize)]
pub struct SalesReview {
    pub upload_id: Uuid,
    pub state: WorkflowState,
    pub summary_rows: usize,
    pub agents: Vec<String>,
    pub surveyor_options: Vec<String>,
    pub variant_options: Vec<String>,
    /// 按历史记录预填的分配
    pub assignments: AgentAssignments,
    pub unmapped_skus: Vec<String>,
}

/// 完成结果
#[derive(Debug, Clone, Serialize)]
pub struct CompletionOutcome {
    pub upload_id: Uuid,
    pub output_file_name: String,
    pub output_file_path: String,
    pub rows: usize,
    pub stats: JoinStats,
}

/// 可下载的输出文件
#[derive(Debug, Clone)]
pub struct OutputFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

const INTERRUPTED: &str = "Processing was interrupted before completion";

/// 持有 Processing 状态的流程锁
///
/// 请求在处理途中被取消 (客户端断开) 时, 流程转为 Failed,
/// 上传记录在后台标记为失败。
struct ProcessingGuard {
    wf: OwnedMutexGuard<UploadWorkflow>,
    store: Arc<dyn Store>,
    upload_id: Uuid,
    armed: bool,
}

impl ProcessingGuard {
    fn new(wf: OwnedMutexGuard<UploadWorkflow>, store: Arc<dyn Store>, upload_id: Uuid) -> Self {
        Self {
            wf,
            store,
            upload_id,
            armed: true,
        }
    }

    /// 处理已有结果, 由调用方负责推进状态
    fn release(&mut self) -> &mut UploadWorkflow {
        self.armed = false;
        &mut self.wf
    }
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        tracing::warn!("Upload {} interrupted while processing", self.upload_id);
        self.wf.fail(INTERRUPTED);

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let store = self.store.clone();
        let upload_id = self.upload_id;
        runtime.spawn(async move {
            if let Err(e) = store.fail_upload(upload_id, INTERRUPTED).await {
                tracing::warn!("Failed to mark upload {} as failed: {}", upload_id, e);
            }
        });
    }
}

/// 上传流程服务
///
/// 每个用户一个 `UploadWorkflow`, 由异步互斥锁保护。
/// 请求用 `try_lock` 获取, 获取失败即视为忙 (不排队)。
pub struct ReconcileService {
    store: Arc<dyn Store>,
    storage: Arc<dyn ObjectStorage>,
    template_bucket: String,
    output_bucket: String,
    header_scan_rows: usize,
    history_retention: usize,
    workflows: DashMap<Uuid, Arc<Mutex<UploadWorkflow>>>,
}

impl ReconcileService {
    pub fn new(store: Arc<dyn Store>, storage: Arc<dyn ObjectStorage>, config: &AppConfig) -> Self {
        Self {
            store,
            storage,
            template_bucket: config.storage.template_bucket.clone(),
            output_bucket: config.storage.output_bucket.clone(),
            header_scan_rows: config.pipeline.header_scan_rows,
            // 至少保留刚完成的这一条
            history_retention: config.pipeline.history_retention.max(1),
            workflows: DashMap::new(),
        }
    }

    /// 取得用户流程; 首次访问时从存储恢复最近的模板
    async fn workflow(&self, user_id: Uuid) -> AppResult<Arc<Mutex<UploadWorkflow>>> {
        if let Some(existing) = self.workflows.get(&user_id) {
            return Ok(existing.value().clone());
        }

        let template = self.store.latest_template(user_id).await?;
        if let Some(t) = &template {
            tracing::info!("Restored template {} for user {}", t.file_name, user_id);
        }
        Ok(self
            .workflows
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(UploadWorkflow::new(template))))
            .value()
            .clone())
    }

    async fn lock(&self, user_id: Uuid) -> AppResult<OwnedMutexGuard<UploadWorkflow>> {
        let workflow = self.workflow(user_id).await?;
        workflow.try_lock_owned().map_err(|_| {
            tracing::warn!("Rejected concurrent request for user {}", user_id);
            AppError::Busy
        })
    }

    pub async fn status(&self, operator: &User) -> AppResult<WorkflowSnapshot> {
        let workflow = self.workflow(operator.id).await?;
        let snapshot = match workflow.try_lock() {
            Ok(wf) => WorkflowSnapshot::of(&wf),
            Err(_) => WorkflowSnapshot::busy(),
        };
        Ok(snapshot)
    }

    /// 上传模板: 校验表头后存储文件并成为当前模板
    pub async fn upload_template(
        &self,
        operator: &User,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> AppResult<TemplateSummary> {
        let mut wf = self.lock(operator.id).await?;
        if wf.state() == WorkflowState::Processing {
            return Err(AppError::Busy);
        }

        let grid = read_grid(file_name, &bytes)?;
        let template = parse_template(&grid, self.header_scan_rows)?;

        let file_path = format!("{}/{}_{}", operator.id, Utc::now().timestamp_millis(), file_name);
        self.storage.upload(&self.template_bucket, &file_path, bytes).await?;

        let record = self
            .store
            .insert_template(UserTemplate {
                id: Uuid::new_v4(),
                user_id: operator.id,
                file_name: file_name.to_string(),
                file_path,
                upload_date: Utc::now(),
            })
            .await?;

        self.abandon_pending(&wf, "Template replaced before completion").await;
        wf.set_template(record.clone())?;

        tracing::info!(
            "User {} uploaded template {} ({} rows)",
            operator.username,
            file_name,
            template.rows.len()
        );

        Ok(TemplateSummary {
            template_id: record.id,
            file_name: record.file_name,
            surveyors: template.surveyors(),
            rows: template.rows.len(),
            headers: template.headers,
        })
    }

    /// 提交销售文件: 解析、汇总、保存, 然后进入业务员分配
    pub async fn submit_sales(
        &self,
        operator: &User,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> AppResult<SalesReview> {
        let mut wf = self.lock(operator.id).await?;
        let template_meta = wf.ensure_accepts_sales()?.clone();

        self.abandon_pending(&wf, "Superseded by a new sales file").await;

        let mut upload_id = None;
        match self
            .prepare_upload(operator, &template_meta, file_name, &bytes, &mut upload_id)
            .await
        {
            Ok(pending) => {
                let review = SalesReview {
                    upload_id: pending.upload_id,
                    state: WorkflowState::AwaitingAgentMapping,
                    summary_rows: pending.summary.len(),
                    agents: pending.agents.clone(),
                    surveyor_options: pending.template.surveyors(),
                    variant_options: pending.template.variant_descriptions(),
                    assignments: pending.assignments.clone(),
                    unmapped_skus: pending.unmapped_skus.clone(),
                };
                wf.stage_upload(pending)?;
                Ok(review)
            }
            Err(e) => {
                self.record_failure(&mut wf, upload_id, &e).await;
                Err(e)
            }
        }
    }

    async fn prepare_upload(
        &self,
        operator: &User,
        template_meta: &UserTemplate,
        file_name: &str,
        bytes: &[u8],
        upload_id: &mut Option<Uuid>,
    ) -> AppResult<PendingUpload> {
        let grid = read_grid(file_name, bytes)?;
        let records = parse_sales(&grid, self.header_scan_rows)?;
        let summary = AggregatedSales::from_records(&records);
        tracing::info!(
            "Parsed {} sales rows into {} (agent, SKU) totals from {}",
            records.len(),
            summary.len(),
            file_name
        );

        let record = self
            .store
            .create_upload(UploadRecord::new(operator.id, file_name, &template_meta.file_name))
            .await?;
        *upload_id = Some(record.id);
        self.store
            .insert_sales_summary(&summary.to_summary_rows(record.id))
            .await?;

        let (mappings, template_bytes) = futures::try_join!(
            self.store.list_sku_mappings(),
            async {
                self.storage
                    .download(&self.template_bucket, &template_meta.file_path)
                    .await
                    .map_err(AppError::from)
            },
        )?;
        let template_grid = read_grid(&template_meta.file_name, &template_bytes)?;
        let template = parse_template(&template_grid, self.header_scan_rows)?;

        let unmapped_skus = find_unmapped_skus(&summary, &mappings);
        if !unmapped_skus.is_empty() {
            tracing::warn!("{} SKUs have no variant mapping: {:?}", unmapped_skus.len(), unmapped_skus);
        }

        let agents = summary.agent_names();
        let history = match self.store.agent_history(&agents).await {
            Ok(history) => history,
            Err(e) => {
                tracing::warn!("Failed to load agent history: {}", e);
                Default::default()
            }
        };
        let assignments: AgentAssignments = agents
            .iter()
            .map(|agent| (agent.clone(), history.get(agent).cloned().unwrap_or_default()))
            .collect();

        Ok(PendingUpload {
            upload_id: record.id,
            sales_file_name: file_name.to_string(),
            template,
            summary,
            agents,
            assignments,
            unmapped_skus,
        })
    }

    /// 设置业务员的 SURVEYOR; 任一业务员无效时整批不生效
    pub async fn assign_agents(
        &self,
        operator: &User,
        assignments: &AgentAssignments,
    ) -> AppResult<WorkflowSnapshot> {
        let mut wf = self.lock(operator.id).await?;

        let mut next = wf.clone();
        for (agent, surveyor) in assignments.iter() {
            next.assign(agent, surveyor)?;
        }
        *wf = next;

        Ok(WorkflowSnapshot::of(&wf))
    }

    /// 完成上传: 通过分配闸门后生成输出文件
    pub async fn complete(&self, operator: &User) -> AppResult<CompletionOutcome> {
        let mut wf = self.lock(operator.id).await?;
        let template_meta = wf.template().cloned().ok_or(AppError::NoTemplate)?;
        let pending = wf.begin_processing()?;
        let mut guard = ProcessingGuard::new(wf, self.store.clone(), pending.upload_id);

        match self.process(operator, &template_meta, &pending).await {
            Ok(outcome) => {
                guard.release().complete();
                tracing::info!(
                    "Upload {} completed: {} output rows, {} facts joined, {} skipped (unmapped SKU)",
                    outcome.upload_id,
                    outcome.rows,
                    outcome.stats.joined_facts,
                    outcome.stats.skipped_unmapped
                );
                self.enforce_retention(operator.id).await;
                Ok(outcome)
            }
            Err(e) => {
                self.record_failure(guard.release(), Some(pending.upload_id), &e).await;
                Err(e)
            }
        }
    }

    async fn process(
        &self,
        operator: &User,
        template_meta: &UserTemplate,
        pending: &PendingUpload,
    ) -> AppResult<CompletionOutcome> {
        self.store
            .insert_agent_mappings(&pending.assignments.to_records(pending.upload_id))
            .await?;

        let mappings = self.store.list_sku_mappings().await?;
        let index = SkuIndex::from_mappings(&mappings);
        let (lookup, stats) = build_lookup(&pending.summary, &index, &pending.assignments);
        let rows = apply_lookup(&pending.template, &lookup);
        let bytes = render_output(&pending.template, &rows)?;

        let output_file_name = output_file_name_for(&template_meta.file_name);
        let output_file_path = format!(
            "{}/{}_output_{}",
            operator.id,
            Utc::now().timestamp_millis(),
            output_file_name
        );
        self.storage
            .upload(&self.output_bucket, &output_file_path, bytes)
            .await?;
        self.store
            .complete_upload(pending.upload_id, &output_file_path)
            .await?;

        Ok(CompletionOutcome {
            upload_id: pending.upload_id,
            output_file_name,
            output_file_path,
            rows: rows.len(),
            stats,
        })
    }

    async fn record_failure(&self, wf: &mut UploadWorkflow, upload_id: Option<Uuid>, error: &AppError) {
        let message = error.to_string();
        tracing::error!("Upload failed: {}", message);
        wf.fail(message.clone());
        if let Some(id) = upload_id {
            if let Err(e) = self.store.fail_upload(id, &message).await {
                tracing::warn!("Failed to mark upload {} as failed: {}", id, e);
            }
        }
    }

    /// 丢弃未完成的上传时同步标记其记录
    async fn abandon_pending(&self, wf: &UploadWorkflow, reason: &str) {
        if let Some(pending) = wf.pending() {
            if let Err(e) = self.store.fail_upload(pending.upload_id, reason).await {
                tracing::warn!("Failed to mark upload {} as abandoned: {}", pending.upload_id, e);
            }
        }
    }

    /// 只保留最近的若干条上传记录及其输出文件
    async fn enforce_retention(&self, user_id: Uuid) {
        let uploads = match self.store.list_uploads(user_id).await {
            Ok(uploads) => uploads,
            Err(e) => {
                tracing::warn!("Cleanup skipped, failed to list uploads: {}", e);
                return;
            }
        };
        if uploads.len() <= self.history_retention {
            return;
        }

        let (kept, expired) = uploads.split_at(self.history_retention);
        let kept_paths: HashSet<&str> = kept
            .iter()
            .filter_map(|u| u.output_file_path.as_deref())
            .collect();
        let paths: Vec<String> = expired
            .iter()
            .filter_map(|u| u.output_file_path.as_deref())
            .filter(|path| !kept_paths.contains(path))
            .map(str::to_string)
            .collect();

        if !paths.is_empty() {
            if let Err(e) = self.storage.remove(&self.output_bucket, &paths).await {
                tracing::warn!("Failed to remove expired output files: {}", e);
            }
        }

        let ids: Vec<Uuid> = expired.iter().map(|u| u.id).collect();
        match self.store.delete_uploads(&ids).await {
            Ok(deleted) => tracing::info!("Removed {} expired uploads for user {}", deleted, user_id),
            Err(e) => tracing::warn!("Failed to delete expired uploads: {}", e),
        }
    }

    pub async fn history(&self, operator: &User) -> AppResult<Vec<UploadRecord>> {
        self.store.list_uploads(operator.id).await
    }

    /// 下载历史输出; 仅本人或管理员可下载
    pub async fn download_output(&self, operator: &User, upload_id: Uuid) -> AppResult<OutputFile> {
        let record = self
            .store
            .get_upload(upload_id)
            .await?
            .filter(|u| u.user_id == operator.id || operator.is_admin())
            .ok_or_else(|| AppError::NotFound(format!("Upload {upload_id}")))?;

        let path = record
            .output_file_path
            .ok_or_else(|| AppError::NotFound(format!("Output of upload {upload_id}")))?;
        let bytes = self.storage.download(&self.output_bucket, &path).await?;

        Ok(OutputFile {
            file_name: record.output_file_name,
            bytes,
        })
    }
}
