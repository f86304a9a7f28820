//! 成绩展示
//!
//! 把 `SessionResult` 和原始题目（按 id 关联）整理成可打印的报告。

use std::fmt;

use crate::models::{Question, SessionResult};

/// 成绩档位
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBand {
    /// >= 80%
    Outstanding,
    /// >= 60%
    Good,
    KeepPracticing,
}

impl ScoreBand {
    pub fn from_percentage(percentage: u32) -> Self {
        if percentage >= 80 {
            ScoreBand::Outstanding
        } else if percentage >= 60 {
            ScoreBand::Good
        } else {
            ScoreBand::KeepPracticing
        }
    }

    pub fn headline(self) -> &'static str {
        match self {
            ScoreBand::Outstanding => "太棒了！",
            ScoreBand::Good => "做得不错！",
            ScoreBand::KeepPracticing => "继续加油！",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            ScoreBand::Outstanding => "你对这份材料掌握得非常好。",
            ScoreBand::Good => "基础扎实，继续保持。",
            ScoreBand::KeepPracticing => "再复习一下材料，然后重新挑战吧。",
        }
    }
}

/// 得分百分比，四舍五入；没有题目时为 0
pub fn percentage(score: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (score as f64 / total as f64 * 100.0).round() as u32
}

/// 单题回顾
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRow {
    /// 从 1 开始的题号
    pub number: usize,
    pub question_text: String,
    /// 选择的选项，超时未作答为 `None`
    pub chosen: Option<String>,
    pub correct: String,
    pub is_correct: bool,
}

/// 成绩报告
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultReport {
    pub score: usize,
    pub total: usize,
    pub percentage: u32,
    pub band: ScoreBand,
    pub rows: Vec<ReviewRow>,
}

impl ResultReport {
    pub fn new(result: &SessionResult, questions: &[Question]) -> Self {
        let percentage = percentage(result.score, result.total);

        let rows = questions
            .iter()
            .enumerate()
            .map(|(position, question)| {
                let record = result.answer_for(question.id);
                let selected = record.and_then(|r| r.selected_option_index);
                ReviewRow {
                    number: position + 1,
                    question_text: question.text.clone(),
                    chosen: selected.and_then(|i| option_text(question, i)),
                    correct: option_text(question, question.correct_answer_index)
                        .unwrap_or_default(),
                    is_correct: record.is_some_and(|r| r.is_correct),
                }
            })
            .collect();

        Self {
            score: result.score,
            total: result.total,
            percentage,
            band: ScoreBand::from_percentage(percentage),
            rows,
        }
    }
}

fn option_text(question: &Question, index: usize) -> Option<String> {
    question
        .options
        .get(index)
        .map(|text| format!("{}. {}", Question::option_label(index), text))
}

impl fmt::Display for ResultReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", "=".repeat(60))?;
        writeln!(f, "{}", self.band.headline())?;
        writeln!(f, "{}", self.band.message())?;
        writeln!(
            f,
            "得分: {}/{} ({}%)",
            self.score, self.total, self.percentage
        )?;
        writeln!(f, "{}", "=".repeat(60))?;

        for row in &self.rows {
            let mark = if row.is_correct { "✓" } else { "✗" };
            writeln!(f, "{} {}. {}", mark, row.number, row.question_text)?;
            match &row.chosen {
                Some(chosen) => writeln!(f, "    你的答案: {}", chosen)?,
                None => writeln!(f, "    你的答案: （超时未作答）")?,
            }
            if !row.is_correct {
                writeln!(f, "    正确答案: {}", row.correct)?;
            }
        }
        write!(f, "{}", "─".repeat(60))
    }
}
