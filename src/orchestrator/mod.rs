//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层是整个系统的"指挥中心"，持有所有资源并按步骤推进应用。
//!
//! ## 层次关系
//!
//! ```text
//! orchestrator::App (步骤状态机：Setup → UploadConfig → Generating → Quiz → Results)
//!     ↓
//! workflow (一次答题：QuizSession + Countdown + SessionDriver)
//!     ↓
//! services (能力层：出题)
//!     ↓
//! clients / infrastructure (OpenRouter 接口、PDF 读取)
//! ```
//!
//! ## 设计原则
//!
//! 1. **资源隔离**：只有编排层持有 HTTP 客户端和终端
//! 2. **向下依赖**：编排层 → workflow → services → clients / infrastructure
//! 3. **无业务逻辑**：只做调度和错误展示，计分由会话状态机完成

pub mod app;

// 重新导出主要类型
pub use app::{App, AppStep, DEFAULT_MODELS};
