//! # PDF Quiz
//!
//! 从 PDF 生成选择题并在终端中限时作答的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 基础设施层（Infrastructure / Clients）
//! - `infrastructure/` - `PdfExtractor`，读取 PDF 文本（最多 N 页）
//! - `clients/` - `OpenRouterClient`，密钥校验、模型列表、chat completion
//!
//! ### ② 业务能力层（Services）
//! - `services/` - `QuizGenerator`，把原文变成题目列表并校验返回格式
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 一次答题的完整流程
//! - `QuizSession` - 状态机（Active / Finished），唯一的转换入口 `apply`
//! - `Countdown` - 每题倒计时
//! - `SessionDriver` - 把 tick 和用户命令交给状态机
//!
//! ### ④ 展示层（Presentation）
//! - `presentation/` - 终端输入输出、成绩报告
//!
//! ### ⑤ 编排层（Orchestration）
//! - `orchestrator/app` - 步骤状态机，持有所有资源
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod presentation;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::OpenRouterClient;
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::PdfExtractor;
pub use models::{AnswerRecord, Difficulty, Question, QuizSettings, SessionConfig, SessionResult};
pub use orchestrator::{App, AppStep};
pub use presentation::{ResultReport, ScoreBand};
pub use services::QuizGenerator;
pub use workflow::{QuizSession, SessionCommand, SessionDriver, SessionEvent, SessionState, Transition};
