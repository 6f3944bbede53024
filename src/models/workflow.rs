use super::mapping::AgentAssignments;
use super::sales::AggregatedSales;
use super::template::Template;
use super::upload::UserTemplate;
use crate::error::{AppError, AppResult};
use serde::Serialize;
use uuid::Uuid;

/// 上传流程状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    AwaitingTemplate,
    AwaitingSalesFile,
    AwaitingAgentMapping,
    Processing,
    Completed,
    Failed,
}

/// 已解析、等待业务员分配的上传
#[derive(Debug, Clone)]
pub struct PendingUpload {
    pub upload_id: Uuid,
    pub sales_file_name: String,
    pub template: Template,
    pub summary: AggregatedSales,
    /// 销售文件中出现的业务员 (去重排序)
    pub agents: Vec<String>,
    pub assignments: AgentAssignments,
    pub unmapped_skus: Vec<String>,
}

/// 单个用户的上传流程
///
/// 模板跨上传保留; 每次上传从 AwaitingSalesFile 开始,
/// 在 Completed / Failed 结束后可直接提交下一个销售文件。
#[derive(Debug, Clone)]
pub struct UploadWorkflow {
    state: WorkflowState,
    template: Option<UserTemplate>,
    pending: Option<PendingUpload>,
    last_error: Option<String>,
}

impl Default for UploadWorkflow {
    fn default() -> Self {
        Self::new(None)
    }
}

impl UploadWorkflow {
    pub fn new(template: Option<UserTemplate>) -> Self {
        let state = if template.is_some() {
            WorkflowState::AwaitingSalesFile
        } else {
            WorkflowState::AwaitingTemplate
        };
        Self {
            state,
            template,
            pending: None,
            last_error: None,
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn template(&self) -> Option<&UserTemplate> {
        self.template.as_ref()
    }

    pub fn pending(&self) -> Option<&PendingUpload> {
        self.pending.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn ensure_idle(&self) -> AppResult<()> {
        if self.state == WorkflowState::Processing {
            return Err(AppError::Busy);
        }
        Ok(())
    }

    /// 更换模板, 丢弃未完成的上传
    pub fn set_template(&mut self, template: UserTemplate) -> AppResult<()> {
        self.ensure_idle()?;
        self.template = Some(template);
        self.pending = None;
        self.last_error = None;
        self.state = WorkflowState::AwaitingSalesFile;
        Ok(())
    }

    /// 检查是否可以接收销售文件, 返回当前模板
    pub fn ensure_accepts_sales(&self) -> AppResult<&UserTemplate> {
        self.ensure_idle()?;
        self.template.as_ref().ok_or(AppError::NoTemplate)
    }

    /// 销售文件解析成功: 进入业务员分配 (未映射 SKU 仅作提示, 不影响状态)
    pub fn stage_upload(&mut self, pending: PendingUpload) -> AppResult<()> {
        self.ensure_accepts_sales()?;
        self.pending = Some(pending);
        self.last_error = None;
        self.state = WorkflowState::AwaitingAgentMapping;
        Ok(())
    }

    /// 为当前上传中的业务员设置 SURVEYOR
    pub fn assign(&mut self, agent_name: &str, surveyor: &str) -> AppResult<()> {
        if self.state != WorkflowState::AwaitingAgentMapping {
            return Err(AppError::InvalidState(format!(
                "Agent assignment is not possible in state {:?}",
                self.state
            )));
        }
        let pending = self
            .pending
            .as_mut()
            .ok_or_else(|| AppError::InvalidState("No sales file awaiting mapping".to_string()))?;

        if !pending.agents.iter().any(|a| a == agent_name) {
            return Err(AppError::BadRequest(format!(
                "DS Name '{agent_name}' is not part of the current sales file"
            )));
        }
        pending.assignments.assign(agent_name, surveyor);
        Ok(())
    }

    /// 完成闸门: 所有业务员都有非空 SURVEYOR 才进入 Processing
    pub fn begin_processing(&mut self) -> AppResult<PendingUpload> {
        if self.state != WorkflowState::AwaitingAgentMapping {
            return Err(AppError::InvalidState(format!(
                "Cannot start processing in state {:?}",
                self.state
            )));
        }
        let pending = self
            .pending
            .as_ref()
            .ok_or_else(|| AppError::InvalidState("No sales file awaiting mapping".to_string()))?;

        let unassigned: Vec<String> = pending
            .assignments
            .unassigned(&pending.agents)
            .into_iter()
            .cloned()
            .collect();
        if !unassigned.is_empty() {
            return Err(AppError::IncompleteMapping { agents: unassigned });
        }

        self.state = WorkflowState::Processing;
        Ok(pending.clone())
    }

    pub fn complete(&mut self) {
        self.pending = None;
        self.last_error = None;
        self.state = WorkflowState::Completed;
    }

    /// 本次上传失败; 模板保留
    pub fn fail(&mut self, message: impl Into<String>) {
        self.pending = None;
        self.last_error = Some(message.into());
        self.state = WorkflowState::Failed;
    }
}
