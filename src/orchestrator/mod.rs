//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 驱动整条答题链路，是整个系统的"指挥中心"。
//!
//! ## 层次关系
//!
//! ```text
//! api (POST /quiz)
//!     ↓
//! orchestrator::ChainOrchestrator (处理一条链路)
//!     ↓
//! workflow::QuizFlow (处理单道题)
//!     ↓
//! capabilities (render / interpret / fetch / solve / submit)
//!     ↓
//! infrastructure + services (浏览器、LLM、HTTP)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：编排器管链路，QuizFlow 管单题
//! 2. **资源隔离**：每条链路独享下载目录，链路之间没有共享的可变状态
//! 3. **向下依赖**：编排层 → workflow → capabilities
//! 4. **不抛出步骤错误**：只做调度和统计

pub mod chain_processor;

pub use chain_processor::ChainOrchestrator;
