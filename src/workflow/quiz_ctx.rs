//! 题目处理上下文
//!
//! 封装"我正在处理哪条链路的第几题、还剩多少时间"这一信息

use std::fmt::Display;
use std::time::Duration;

use tokio::time::Instant;
use url::Url;

use crate::error::{QuizError, QuizResult};

/// 单个步骤的上下文
#[derive(Debug, Clone)]
pub struct QuizCtx {
    /// 链路编号（仅用于日志）
    pub chain_id: String,

    /// 题目在链路中的序号（从1开始）
    pub step_index: usize,

    /// 当前题目页面
    pub quiz_url: Url,

    pub email: String,
    pub secret: String,

    /// 整条链路的截止时间
    pub deadline: Instant,
}

impl QuizCtx {
    /// 距离截止时间还剩多少
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn deadline_passed(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// 为下一次调用分配时间片：`min(max_per_call, remaining)`
    ///
    /// 截止时间已过时返回 `DeadlineExceeded`
    pub fn call_budget(&self, max_per_call: Duration) -> QuizResult<Duration> {
        let remaining = self.remaining();
        if remaining.is_zero() {
            return Err(QuizError::DeadlineExceeded);
        }
        Ok(remaining.min(max_per_call))
    }
}

impl Display for QuizCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[链路 {} 第 {} 题]", self.chain_id, self.step_index)
    }
}
