//! 展示层（Presentation Layer）
//!
//! - `console` - 终端输入输出和答题循环
//! - `result_view` - 成绩报告

pub mod console;
pub mod result_view;

pub use console::{run_quiz, ConsoleInput, ConsoleOutput, QuizOutcome};
pub use result_view::{ResultReport, ScoreBand};
