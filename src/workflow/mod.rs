//! 流程层（Workflow Layer）
//!
//! 定义“一次答题”的完整流程：
//!
//! ```text
//! SessionDriver (等待 tick / 命令)
//!     ↓
//! QuizSession::apply (唯一的状态转换入口)
//!     ↓
//! Countdown (换题、继续时重新计时；暂停、结束时取消)
//! ```

pub mod countdown;
pub mod quiz_session;
pub mod session_driver;

pub use countdown::Countdown;
pub use quiz_session::{QuizSession, Rejection, SessionEvent, SessionState, Transition};
pub use session_driver::{DriverUpdate, SessionCommand, SessionDriver};
