//! # Quiz Chain Solver
//!
//! 接收题目 URL，用无头浏览器渲染页面，让 LLM 读题、求解，把答案提交回去，
//! 并沿着"下一题"链接一直做下去，整条链路受截止时间约束。
//!
//! ## 架构设计
//!
//! ### ① 基础设施层（Infrastructure）
//! - `browser/` - 启动无头浏览器
//! - `infrastructure/` - `JsExecutor` 持有 page；`ChromeRenderer` 渲染页面
//!
//! ### ② 业务能力层（Services / Capabilities）
//! - `capabilities/` - render / interpret / fetch / solve / submit 五个能力接口
//! - `LlmService` - 读题与求解
//! - `HttpFileFetcher` / `HttpSubmitter` - 下载附件、提交答案
//! - `WarnWriter` - 写 warn.txt
//!
//! ### ③ 流程层（Workflow）
//! - `QuizCtx` - 上下文封装（链路 + 序号 + 截止时间）
//! - `QuizFlow` - 单题流程（render → interpret → fetch → solve → submit）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator::ChainOrchestrator` - 链路循环、截止时间、结束原因
//!
//! ### ⑤ 入口（API）
//! - `api/` - axum 路由：`/`、`/health`、`/quiz`

pub mod api;
pub mod app;
pub mod browser;
pub mod capabilities;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use api::{create_router, AppState};
pub use app::App;
pub use capabilities::Capabilities;
pub use config::Config;
pub use error::{QuizError, QuizResult};
pub use models::{ChainOutcome, QuizTask, TerminalReason};
pub use orchestrator::ChainOrchestrator;
pub use workflow::{QuizCtx, QuizFlow, RetryPolicy};
