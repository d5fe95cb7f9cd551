use std::fmt;

use thiserror::Error;

/// 出错的环节
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Render,
    Interpret,
    Fetch,
    Solve,
    Submit,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Render => "render",
            Stage::Interpret => "interpret",
            Stage::Fetch => "fetch",
            Stage::Solve => "solve",
            Stage::Submit => "submit",
        };
        f.write_str(name)
    }
}

/// 答题链路错误
///
/// 编排层只根据这里的变体做决策：
/// - `Transport` / `Timeout` / `Solver`：当前步骤失败，链路尽量继续
/// - `Interpretation`：当前步骤中止
/// - `DeadlineExceeded`：整条链路立即结束，返回部分结果
/// - `Authentication`：只在入口层出现
#[derive(Debug, Error)]
pub enum QuizError {
    /// 渲染 / 下载 / 提交时的网络错误
    #[error("{stage} 网络错误 ({url}): {reason}")]
    Transport {
        stage: Stage,
        url: String,
        reason: String,
    },

    /// 单次调用超过了分配的时间片，但总截止时间还没到
    #[error("{stage} 调用超时")]
    Timeout { stage: Stage },

    /// LLM 返回的内容无法解析成 QuizRecord
    #[error("题目解析失败: {0}")]
    Interpretation(String),

    /// LLM 没能给出符合格式的答案
    #[error("求解失败: {0}")]
    Solver(String),

    /// 整条链路的截止时间已过
    #[error("已超过截止时间")]
    DeadlineExceeded,

    /// secret 不匹配
    #[error("secret 校验失败")]
    Authentication,
}

impl QuizError {
    /// 创建网络错误
    pub fn transport(stage: Stage, url: impl Into<String>, reason: impl fmt::Display) -> Self {
        QuizError::Transport {
            stage,
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// 截止时间错误会终止整条链路
    pub fn is_deadline(&self) -> bool {
        matches!(self, QuizError::DeadlineExceeded)
    }
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量不存在
    #[error("环境变量 {var_name} 不存在")]
    EnvVarNotFound { var_name: String },

    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },

    /// 取值不合法
    #[error("配置项 {field} 不合法: {reason}")]
    Invalid { field: String, reason: String },
}

/// 答题链路结果类型
pub type QuizResult<T> = Result<T, QuizError>;
