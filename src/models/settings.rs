use phf::phf_map;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// 难度枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

/// 难度别名（小写）
static DIFFICULTY_ALIASES: phf::Map<&'static str, Difficulty> = phf_map! {
    "easy" => Difficulty::Easy,
    "e" => Difficulty::Easy,
    "1" => Difficulty::Easy,
    "简单" => Difficulty::Easy,
    "medium" => Difficulty::Medium,
    "m" => Difficulty::Medium,
    "2" => Difficulty::Medium,
    "中等" => Difficulty::Medium,
    "hard" => Difficulty::Hard,
    "h" => Difficulty::Hard,
    "3" => Difficulty::Hard,
    "困难" => Difficulty::Hard,
};

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    /// 发送给模型的名称
    pub fn name(self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }

    /// 从用户输入解析难度（不区分大小写）
    pub fn parse(s: &str) -> Option<Self> {
        DIFFICULTY_ALIASES
            .get(s.trim().to_lowercase().as_str())
            .copied()
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Difficulty {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| ConfigError::UnknownDifficulty {
            value: s.to_string(),
        })
    }
}

/// 出题设置
///
/// 只用于拼装出题请求，不会拿来校验模型返回的题目数量。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSettings {
    pub difficulty: Difficulty,
    pub question_count: u32,
}

impl QuizSettings {
    pub const MIN_QUESTIONS: u32 = 3;
    pub const MAX_QUESTIONS: u32 = 20;
    pub const DEFAULT_QUESTIONS: u32 = 5;

    pub fn new(difficulty: Difficulty, question_count: u32) -> Result<Self, ConfigError> {
        if !(Self::MIN_QUESTIONS..=Self::MAX_QUESTIONS).contains(&question_count) {
            return Err(ConfigError::QuestionCountOutOfRange {
                count: question_count,
                min: Self::MIN_QUESTIONS,
                max: Self::MAX_QUESTIONS,
            });
        }
        Ok(Self {
            difficulty,
            question_count,
        })
    }
}

impl Default for QuizSettings {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::default(),
            question_count: Self::DEFAULT_QUESTIONS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difficulty_aliases() {
        assert_eq!(Difficulty::parse("EASY"), Some(Difficulty::Easy));
        assert_eq!(Difficulty::parse(" h "), Some(Difficulty::Hard));
        assert_eq!(Difficulty::parse("中等"), Some(Difficulty::Medium));
        assert_eq!(Difficulty::parse("extreme"), None);
        assert!("nightmare".parse::<Difficulty>().is_err());
    }

    #[test]
    fn question_count_bounds() {
        assert!(QuizSettings::new(Difficulty::Easy, 3).is_ok());
        assert!(QuizSettings::new(Difficulty::Easy, 20).is_ok());
        assert!(matches!(
            QuizSettings::new(Difficulty::Easy, 2),
            Err(ConfigError::QuestionCountOutOfRange { count: 2, .. })
        ));
        assert!(QuizSettings::new(Difficulty::Hard, 21).is_err());
    }

    #[test]
    fn defaults_match_the_setup_form() {
        let settings = QuizSettings::default();
        assert_eq!(settings.difficulty, Difficulty::Medium);
        assert_eq!(settings.question_count, 5);
    }
}
