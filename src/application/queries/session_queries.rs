//! Session Queries

/// 获取会话详情查询
#[derive(Debug, Clone)]
pub struct GetSession {
    pub session_id: String,
}
