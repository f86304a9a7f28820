pub mod quiz_generator;

pub use quiz_generator::QuizGenerator;
