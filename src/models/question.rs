use serde::{Deserialize, Serialize};

/// 一道选择题
///
/// 由出题步骤一次性生成，之后不再修改。选项的顺序有意义，
/// `correct_answer_index` 就是正确选项在 `options` 中的下标。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: u32,
    pub text: String,
    pub options: Vec<String>,
    pub correct_answer_index: usize,
    pub time_limit_seconds: u32,
}

impl Question {
    /// 检查题目本身是否自洽，返回不合法的原因
    pub fn check(&self) -> Result<(), String> {
        if self.options.len() < 2 {
            return Err(format!("至少需要 2 个选项，实际只有 {} 个", self.options.len()));
        }
        if self.correct_answer_index >= self.options.len() {
            return Err(format!(
                "正确答案索引 {} 超出范围 [0, {}]",
                self.correct_answer_index,
                self.options.len() - 1
            ));
        }
        if self.time_limit_seconds == 0 {
            return Err("答题时限必须大于 0 秒".to_string());
        }
        Ok(())
    }

    /// 选项的字母标签（A、B、C ...）
    pub fn option_label(index: usize) -> char {
        (b'A' + (index % 26) as u8) as char
    }
}

/// 单题作答记录
///
/// 会话越过这道题时创建一次，之后不再修改。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub question_id: u32,
    /// `None` 表示超时且未作答，序列化为 -1
    #[serde(with = "sentinel_index")]
    pub selected_option_index: Option<usize>,
    pub is_correct: bool,
}

impl AnswerRecord {
    /// 根据题目和选择结果生成记录，只有选中且等于正确答案才算对
    pub fn grade(question: &Question, selected: Option<usize>) -> Self {
        Self {
            question_id: question.id,
            selected_option_index: selected,
            is_correct: selected == Some(question.correct_answer_index),
        }
    }

    /// 是否因超时而未作答
    pub fn timed_out(&self) -> bool {
        self.selected_option_index.is_none()
    }
}

/// 一次答题会话的最终结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionResult {
    pub score: usize,
    pub total: usize,
    pub answers: Vec<AnswerRecord>,
}

impl SessionResult {
    /// 从完整的作答记录计算结果
    pub fn from_answers(answers: Vec<AnswerRecord>) -> Self {
        Self {
            score: answers.iter().filter(|a| a.is_correct).count(),
            total: answers.len(),
            answers,
        }
    }

    /// 按题目 ID 查找作答记录
    pub fn answer_for(&self, question_id: u32) -> Option<&AnswerRecord> {
        self.answers.iter().find(|a| a.question_id == question_id)
    }
}

/// 未作答哨兵值
pub const NO_SELECTION: i64 = -1;

/// 把 `Option<usize>` 映射为线上格式中的下标或 -1
mod sentinel_index {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::NO_SELECTION;

    pub fn serialize<S>(value: &Option<usize>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(index) => serializer.serialize_i64(*index as i64),
            None => serializer.serialize_i64(NO_SELECTION),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = i64::deserialize(deserializer)?;
        Ok(usize::try_from(raw).ok())
    }
}
