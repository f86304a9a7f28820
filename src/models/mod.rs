pub mod question;
pub mod session_config;
pub mod settings;

pub use question::{AnswerRecord, Question, SessionResult, NO_SELECTION};
pub use session_config::SessionConfig;
pub use settings::{Difficulty, QuizSettings};
