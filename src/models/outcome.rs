//! 链路结果统计

use serde::{Deserialize, Serialize};

/// 单个步骤的结局
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// 回答正确
    Correct,
    /// 用完了尝试次数仍然错误
    Incorrect,
    /// 渲染 / 解析 / 求解 / 提交出错
    Error,
    /// 截止时间到了，步骤被打断
    Interrupted,
}

/// 链路结束原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalReason {
    /// 没有下一题了
    ExhaustedChain,
    /// 截止时间已到
    DeadlineExceeded,
    /// 出错且找不到下一题
    FatalError,
}

/// 单个步骤的记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    /// 链路中的序号（从 1 开始）
    pub index: usize,
    pub url: String,
    pub status: StepStatus,
    /// 提交次数
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// 整条链路的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainOutcome {
    pub attempted: usize,
    pub correct: usize,
    pub failed: usize,
    pub terminal_reason: TerminalReason,
    pub steps: Vec<StepReport>,
    pub elapsed_ms: u64,
}

impl Default for ChainOutcome {
    fn default() -> Self {
        Self {
            attempted: 0,
            correct: 0,
            failed: 0,
            terminal_reason: TerminalReason::ExhaustedChain,
            steps: Vec::new(),
            elapsed_ms: 0,
        }
    }
}

impl ChainOutcome {
    /// 记录一个步骤并更新计数
    ///
    /// 被打断的步骤只记录，不计入 attempted
    pub fn record(&mut self, report: StepReport) {
        match report.status {
            StepStatus::Correct => {
                self.attempted += 1;
                self.correct += 1;
            }
            StepStatus::Incorrect | StepStatus::Error => {
                self.attempted += 1;
                self.failed += 1;
            }
            StepStatus::Interrupted => {}
        }
        self.steps.push(report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(index: usize, status: StepStatus) -> StepReport {
        StepReport {
            index,
            url: format!("https://q.example.com/{}", index),
            status,
            attempts: 1,
            message: None,
        }
    }

    #[test]
    fn test_counts_stay_consistent() {
        let mut outcome = ChainOutcome::default();
        outcome.record(report(1, StepStatus::Correct));
        outcome.record(report(2, StepStatus::Incorrect));
        outcome.record(report(3, StepStatus::Error));
        outcome.record(report(4, StepStatus::Interrupted));

        assert_eq!(outcome.attempted, 3);
        assert_eq!(outcome.correct, 1);
        assert_eq!(outcome.failed, 2);
        assert_eq!(outcome.attempted, outcome.correct + outcome.failed);
        assert_eq!(outcome.steps.len(), 4);
    }

    #[test]
    fn test_terminal_reason_wire_names() {
        let json = serde_json::to_string(&TerminalReason::DeadlineExceeded).unwrap();
        assert_eq!(json, "\"deadline_exceeded\"");
        let json = serde_json::to_string(&TerminalReason::ExhaustedChain).unwrap();
        assert_eq!(json, "\"exhausted_chain\"");
    }
}
