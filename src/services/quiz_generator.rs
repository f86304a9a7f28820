//! 出题服务 - 业务能力层
//!
//! 只负责“把一段原文变成题目列表”，不关心答题流程。
//!
//! ## 技术栈
//! - 请求体用 `async-openai` 的类型构建，保证与 OpenAI 兼容接口一致
//! - 通过 `OpenRouterClient` 发送，附带标识调用方的请求头
//! - 返回内容按形状校验：去掉代码块标记、解开 `questions`/`quiz` 包装、逐题检查字段

use std::collections::HashSet;
use std::sync::Arc;

use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
    CreateChatCompletionRequestArgs,
};
use regex::Regex;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::clients::{ChatReply, OpenRouterClient};
use crate::config::Config;
use crate::error::GenerationError;
use crate::models::{Question, QuizSettings, SessionConfig};
use crate::utils::logging::truncate_text;

/// 模型可能把题目数组包在这些字段下
const WRAPPER_FIELDS: [&str; 2] = ["questions", "quiz"];

const SYSTEM_MESSAGE: &str =
    "You are a helpful assistant that generates quizzes in strict JSON format.";

/// 出题服务
///
/// 职责：
/// - 截断原文并拼装提示词
/// - 调用 chat completion
/// - 校验并规整返回的题目
pub struct QuizGenerator {
    client: Arc<OpenRouterClient>,
    max_source_chars: usize,
    default_time_limit_secs: u32,
}

impl QuizGenerator {
    pub fn new(client: Arc<OpenRouterClient>, config: &Config) -> Self {
        Self {
            client,
            max_source_chars: config.max_source_chars,
            default_time_limit_secs: config.default_time_limit_secs,
        }
    }

    /// 根据原文生成题目
    ///
    /// 返回的题目数量可能与 `settings.question_count` 不同，按实际返回的使用。
    pub async fn generate(
        &self,
        session: &SessionConfig,
        source_text: &str,
        settings: &QuizSettings,
    ) -> Result<Vec<Question>, GenerationError> {
        let truncated = truncate_source(source_text, self.max_source_chars);
        if truncated.len() < source_text.len() {
            info!(
                "✂️ 原文超过 {} 个字符，已截断后发送",
                self.max_source_chars
            );
        }

        info!(
            "🤖 正在出题，模型: {}，难度: {}，题目数: {}",
            session.model_id, settings.difficulty, settings.question_count
        );

        let prompt = build_prompt(truncated, settings);
        let request = build_request(&session.model_id, &prompt)?;

        let reply = self
            .client
            .chat_completion(&session.api_key, &request)
            .await
            .map_err(|e| {
                error!("出题请求失败: {}", e);
                GenerationError::api_call_failed(&session.model_id, e)
            })?;

        let questions =
            questions_from_reply(&reply, &session.model_id, self.default_time_limit_secs)?;

        if questions.len() != settings.question_count as usize {
            info!(
                "模型返回了 {} 道题（请求 {} 道），按实际数量开始答题",
                questions.len(),
                settings.question_count
            );
        }

        info!("✓ 出题完成，共 {} 道题", questions.len());
        Ok(questions)
    }
}

/// 按字符数截断原文
pub fn truncate_source(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

/// 构建出题提示词
pub fn build_prompt(source_text: &str, settings: &QuizSettings) -> String {
    format!(
        r#"You are a professional quiz generator.
Generate a quiz based on the following text content.

Configuration:
- Difficulty: {difficulty}
- Number of questions: {count}
- Write the questions in the same language as the content.
- The output MUST be a valid JSON array.
- No markdown formatting (like ```json), just the raw JSON array string.

JSON Schema per question:
{{
  "id": number (sequence starting from 1),
  "text": "The question string",
  "options": ["Option A", "Option B", "Option C", "Option D"],
  "correctAnswerIndex": number (0-3),
  "timeLimitSeconds": number (suggested time between 10-60 seconds based on difficulty)
}}

Content Source:
{source}"#,
        difficulty = settings.difficulty,
        count = settings.question_count,
        source = source_text,
    )
}

/// 构建 chat completion 请求体
fn build_request(model: &str, prompt: &str) -> Result<CreateChatCompletionRequest, GenerationError> {
    let build_failed = |e: async_openai::error::OpenAIError| GenerationError::RequestBuildFailed {
        source: Box::new(e),
    };

    let system_msg = ChatCompletionRequestSystemMessageArgs::default()
        .content(SYSTEM_MESSAGE)
        .build()
        .map_err(build_failed)?;

    let user_msg = ChatCompletionRequestUserMessageArgs::default()
        .content(prompt)
        .build()
        .map_err(build_failed)?;

    CreateChatCompletionRequestArgs::default()
        .model(model)
        .messages(vec![
            ChatCompletionRequestMessage::System(system_msg),
            ChatCompletionRequestMessage::User(user_msg),
        ])
        .build()
        .map_err(build_failed)
}

/// 从 chat completion 响应中取出题目
pub fn questions_from_reply(
    reply: &ChatReply,
    model: &str,
    default_time_limit_secs: u32,
) -> Result<Vec<Question>, GenerationError> {
    if reply.choices.is_empty() {
        error!("模型 {} 返回的 choices 为空", model);
        return Err(GenerationError::EmptyResponse {
            model: model.to_string(),
        });
    }

    let content = reply
        .first_content()
        .map(str::trim)
        .filter(|content| !content.is_empty())
        .ok_or_else(|| GenerationError::EmptyContent {
            model: model.to_string(),
        })?;

    debug!("模型返回内容: {}", truncate_text(content, 200));
    parse_questions(content, default_time_limit_secs)
}

/// 解析模型返回的文本
pub fn parse_questions(
    content: &str,
    default_time_limit_secs: u32,
) -> Result<Vec<Question>, GenerationError> {
    let cleaned = strip_code_fences(content);

    let value: Value = serde_json::from_str(&cleaned).map_err(|source| {
        error!("JSON 解析失败，原始内容: {}", truncate_text(&cleaned, 500));
        GenerationError::InvalidJson {
            raw: cleaned.clone(),
            source,
        }
    })?;

    let items = unwrap_question_array(value)?;
    if items.is_empty() {
        return Err(GenerationError::NoQuestions);
    }

    let mut questions = Vec::with_capacity(items.len());
    let mut ids = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let (question, id) = question_from_value(index, item, default_time_limit_secs)?;
        questions.push(question);
        ids.push(id);
    }

    assign_ids(&mut questions, &ids);
    Ok(questions)
}

/// 去掉 ```json / ``` 代码块标记
pub fn strip_code_fences(content: &str) -> String {
    match Regex::new(r"```(?i:json)?") {
        Ok(fence) => fence.replace_all(content, "").trim().to_string(),
        Err(_) => content.replace("```json", "").replace("```", "").trim().to_string(),
    }
}

/// 接受裸数组，或者 `{"questions": [...]}` / `{"quiz": [...]}`
fn unwrap_question_array(value: Value) -> Result<Vec<Value>, GenerationError> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => {
            for field in WRAPPER_FIELDS {
                if let Some(Value::Array(items)) = map.remove(field) {
                    debug!("从 `{}` 字段中解出题目数组", field);
                    return Ok(items);
                }
            }
            Err(GenerationError::NotAnArray)
        }
        _ => Err(GenerationError::NotAnArray),
    }
}

/// 校验单道题的形状并转换，返回题目和模型给出的 id
fn question_from_value(
    index: usize,
    item: &Value,
    default_time_limit_secs: u32,
) -> Result<(Question, Option<u32>), GenerationError> {
    let raw_options = item
        .get("options")
        .and_then(Value::as_array)
        .ok_or(GenerationError::MissingFields { index })?;

    let correct = item
        .get("correctAnswerIndex")
        .filter(|v| v.is_number())
        .ok_or(GenerationError::MissingFields { index })?;

    let options = raw_options
        .iter()
        .map(|option| match option {
            Value::String(s) => Ok(s.trim().to_string()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            _ => Err(GenerationError::invalid_question(index, "选项必须是文本")),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let correct_answer_index = correct
        .as_u64()
        .map(|i| i as usize)
        .ok_or_else(|| GenerationError::invalid_question(index, "正确答案索引必须是非负整数"))?;

    let text = item
        .get("text")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| GenerationError::invalid_question(index, "缺少题干"))?
        .to_string();

    let time_limit_seconds = item
        .get("timeLimitSeconds")
        .and_then(Value::as_u64)
        .filter(|&secs| secs > 0)
        .map(|secs| secs.min(u32::MAX as u64) as u32)
        .unwrap_or_else(|| {
            debug!("第 {} 道题没有合法时限，使用默认 {} 秒", index + 1, default_time_limit_secs);
            default_time_limit_secs
        });

    let id = item
        .get("id")
        .and_then(Value::as_u64)
        .and_then(|id| u32::try_from(id).ok());

    let question = Question {
        id: 0,
        text,
        options,
        correct_answer_index,
        time_limit_seconds,
    };
    question
        .check()
        .map_err(|reason| GenerationError::invalid_question(index, reason))?;

    Ok((question, id))
}

/// 使用模型给出的 id；缺失或重复时按顺序重新编号
fn assign_ids(questions: &mut [Question], ids: &[Option<u32>]) {
    let mut seen = HashSet::new();
    let usable = ids.iter().all(|id| matches!(id, Some(id) if seen.insert(*id)));

    if !usable {
        warn!("题目 id 缺失或重复，按顺序重新编号");
    }

    for (position, question) in questions.iter_mut().enumerate() {
        question.id = match ids[position] {
            Some(id) if usable => id,
            _ => position as u32 + 1,
        };
    }
}
