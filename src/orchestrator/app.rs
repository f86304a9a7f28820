//! 应用主流程 - 编排层
//!
//! ## 职责
//!
//! 持有所有资源（HTTP 客户端、PDF 读取器、出题服务、终端），按步骤推进：
//!
//! ```text
//! Setup → UploadConfig → Generating → Quiz → Results
//!   ↑          ↑  ↑          │          │       │
//!   │          │  └──失败/取消┘          │       │
//!   │          └────────退出答题─────────┘       │
//!   └─────────────────(返回设置 / 重新上传)──────┘
//! ```
//!
//! - 凭证和模型放在显式的 `SessionConfig` 中，在步骤之间传递
//! - 出题可以用 Ctrl-C 取消，回到上传步骤；其他步骤按 Ctrl-C 直接退出
//! - 所有错误都转换成一条中文提示显示在终端上，只有终端读写失败会结束程序

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader, Stdin, Stdout};
use tracing::{error, info, warn};

use crate::clients::OpenRouterClient;
use crate::config::Config;
use crate::error::{AppError, AppResult, ConfigError, GenerationError, SetupError};
use crate::infrastructure::PdfExtractor;
use crate::models::{Difficulty, Question, QuizSettings, SessionConfig, SessionResult};
use crate::presentation::{run_quiz, ConsoleInput, ConsoleOutput, QuizOutcome, ResultReport};
use crate::services::QuizGenerator;
use crate::utils::logging::{log_session_summary, log_startup};
use crate::workflow::QuizSession;

/// 获取模型列表失败时使用的默认模型
pub const DEFAULT_MODELS: [&str; 5] = [
    "openai/gpt-3.5-turbo",
    "openai/gpt-4o-mini",
    "anthropic/claude-3-haiku",
    "google/gemini-flash-1.5",
    "meta-llama/llama-3-8b-instruct",
];

/// 终端上最多列出的模型数
const MODEL_DISPLAY_LIMIT: usize = 20;

/// 应用步骤
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppStep {
    Setup,
    UploadConfig,
    Generating,
    Quiz,
    Results,
}

/// 步骤及其携带的数据
enum Stage {
    Setup,
    UploadConfig(SessionConfig),
    Generating {
        session: SessionConfig,
        source_text: String,
        settings: QuizSettings,
    },
    Quiz {
        session: SessionConfig,
        questions: Vec<Question>,
    },
    Results {
        session: SessionConfig,
        questions: Vec<Question>,
        result: SessionResult,
    },
    Exit,
}

impl Stage {
    fn step(&self) -> Option<AppStep> {
        match self {
            Stage::Setup => Some(AppStep::Setup),
            Stage::UploadConfig(_) => Some(AppStep::UploadConfig),
            Stage::Generating { .. } => Some(AppStep::Generating),
            Stage::Quiz { .. } => Some(AppStep::Quiz),
            Stage::Results { .. } => Some(AppStep::Results),
            Stage::Exit => None,
        }
    }
}

/// 应用主结构
pub struct App<R, W> {
    config: Config,
    client: Arc<OpenRouterClient>,
    extractor: PdfExtractor,
    generator: QuizGenerator,
    input: ConsoleInput<R>,
    output: ConsoleOutput<W>,
}

impl App<BufReader<Stdin>, Stdout> {
    /// 初始化应用，使用标准输入输出
    pub async fn initialize(config: Config) -> Result<Self> {
        log_startup(&config);
        let app = Self::with_console(
            config,
            BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
        )?;
        Ok(app)
    }
}

impl<R, W> App<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// 使用指定的输入输出创建应用
    pub fn with_console(config: Config, reader: R, writer: W) -> AppResult<Self> {
        let client = Arc::new(OpenRouterClient::new(&config)?);
        let extractor = PdfExtractor::new(&config);
        let generator = QuizGenerator::new(client.clone(), &config);

        Ok(Self {
            config,
            client,
            extractor,
            generator,
            input: ConsoleInput::new(reader),
            output: ConsoleOutput::new(writer),
        })
    }

    /// 运行应用主逻辑，直到用户退出或输入结束
    pub async fn run(&mut self) -> Result<()> {
        self.output
            .line(format!("📚 {}", self.config.app_title))
            .await?;

        let mut stage = Stage::Setup;
        while let Some(step) = stage.step() {
            info!("➡️ 进入步骤: {:?}", step);
            // 出题步骤自己处理 Ctrl-C（取消出题），其余步骤收到 Ctrl-C 时退出
            stage = if step == AppStep::Generating {
                self.enter(stage).await?
            } else {
                tokio::select! {
                    next = self.enter(stage) => next?,
                    _ = ctrl_c() => {
                        info!("收到 Ctrl-C，退出程序");
                        Stage::Exit
                    }
                }
            };
        }

        self.output.line("👋 再见").await?;
        info!("程序退出");
        Ok(())
    }

    async fn enter(&mut self, stage: Stage) -> Result<Stage> {
        match stage {
            Stage::Setup => self.setup().await,
            Stage::UploadConfig(session) => self.upload_config(session).await,
            Stage::Generating {
                session,
                source_text,
                settings,
            } => self.generating(session, &source_text, settings).await,
            Stage::Quiz { session, questions } => self.quiz(session, questions).await,
            Stage::Results {
                session,
                questions,
                result,
            } => self.results(session, &questions, &result).await,
            Stage::Exit => Ok(Stage::Exit),
        }
    }

    /// 第 1 步：输入并校验 API Key，选择模型
    async fn setup(&mut self) -> Result<Stage> {
        loop {
            self.output.line("─".repeat(60)).await?;
            let hint = if self.config.api_key.is_some() {
                "OpenRouter API Key [回车使用配置中的 Key]: "
            } else {
                "OpenRouter API Key: "
            };
            let Some(entered) = self.ask(hint).await? else {
                return Ok(Stage::Exit);
            };

            let api_key = match (entered.is_empty(), &self.config.api_key) {
                (false, _) => entered,
                (true, Some(configured)) => configured.clone(),
                (true, None) => {
                    self.report(SetupError::EmptyApiKey).await?;
                    continue;
                }
            };

            self.output.line("🔑 正在校验 API Key...").await?;
            if !self.client.validate_api_key(&api_key).await {
                self.report(SetupError::InvalidApiKey).await?;
                continue;
            }
            self.output.line("✓ API Key 有效").await?;

            let models = self.available_models(&api_key).await;
            let default_model = self
                .config
                .model_id
                .clone()
                .unwrap_or_else(|| models[0].clone());

            self.output.line("可选模型:").await?;
            for (i, model) in models.iter().take(MODEL_DISPLAY_LIMIT).enumerate() {
                self.output.line(format!("  {:>2}. {}", i + 1, model)).await?;
            }
            if models.len() > MODEL_DISPLAY_LIMIT {
                self.output
                    .line(format!(
                        "  ...共 {} 个模型，也可以直接输入模型 ID",
                        models.len()
                    ))
                    .await?;
            }

            let Some(choice) = self
                .ask(&format!("模型编号或 ID [默认 {}]: ", default_model))
                .await?
            else {
                return Ok(Stage::Exit);
            };
            let model_id = resolve_model(&choice, &models, &default_model);

            match SessionConfig::new(api_key, model_id) {
                Ok(session) => {
                    info!("✓ 设置完成: {}", session);
                    self.output
                        .line(format!("✓ 使用模型 {}", session.model_id))
                        .await?;
                    return Ok(Stage::UploadConfig(session));
                }
                Err(e) => self.report(e).await?,
            }
        }
    }

    /// 远端模型列表，失败时使用默认列表
    async fn available_models(&self, api_key: &str) -> Vec<String> {
        let models = self.client.fetch_models(api_key).await;
        if models.is_empty() {
            warn!("模型列表为空，使用默认模型列表");
            return DEFAULT_MODELS.iter().map(|m| m.to_string()).collect();
        }
        models
    }

    /// 第 2 步：读取 PDF，设置难度和题目数量
    async fn upload_config(&mut self, session: SessionConfig) -> Result<Stage> {
        self.output.line("─".repeat(60)).await?;

        let source_text = loop {
            let Some(path) = self
                .ask("PDF 文件路径（输入 back 返回设置）: ")
                .await?
            else {
                return Ok(Stage::Exit);
            };
            if path.eq_ignore_ascii_case("back") {
                return Ok(Stage::Setup);
            }
            if path.is_empty() {
                continue;
            }

            let path = path.trim_matches(|c| c == '"' || c == '\'');
            self.output.line("📄 正在读取 PDF...").await?;
            match self.extractor.extract_file(Path::new(path)).await {
                Ok(text) => {
                    self.output
                        .line(format!("✓ 读取完成，共 {} 个字符", text.chars().count()))
                        .await?;
                    break text;
                }
                Err(e) => self.report(e).await?,
            }
        };

        let difficulty = loop {
            let Some(input) = self
                .ask(&format!(
                    "难度 [easy/medium/hard，默认 {}]: ",
                    Difficulty::default()
                ))
                .await?
            else {
                return Ok(Stage::Exit);
            };
            if input.is_empty() {
                break Difficulty::default();
            }
            match input.parse::<Difficulty>() {
                Ok(difficulty) => break difficulty,
                Err(e) => self.report(e).await?,
            }
        };

        let settings = loop {
            let Some(input) = self
                .ask(&format!(
                    "题目数量 [{}-{}，默认 {}]: ",
                    QuizSettings::MIN_QUESTIONS,
                    QuizSettings::MAX_QUESTIONS,
                    QuizSettings::DEFAULT_QUESTIONS
                ))
                .await?
            else {
                return Ok(Stage::Exit);
            };
            match parse_settings(difficulty, &input) {
                Ok(settings) => break settings,
                Err(e) => self.report(e).await?,
            }
        };

        Ok(Stage::Generating {
            session,
            source_text,
            settings,
        })
    }

    /// 第 3 步：调用模型出题，可以用 Ctrl-C 取消
    async fn generating(
        &mut self,
        session: SessionConfig,
        source_text: &str,
        settings: QuizSettings,
    ) -> Result<Stage> {
        self.output
            .line("🤖 正在生成题目，按 Ctrl-C 取消...")
            .await?;

        let generated = tokio::select! {
            result = self.generator.generate(&session, source_text, &settings) => result,
            _ = ctrl_c() => {
                info!("用户取消了出题");
                Err(GenerationError::Cancelled)
            }
        };

        match generated {
            Ok(questions) => {
                self.output
                    .line(format!("✓ 已生成 {} 道题", questions.len()))
                    .await?;
                Ok(Stage::Quiz { session, questions })
            }
            Err(e) => {
                self.report(e).await?;
                Ok(Stage::UploadConfig(session))
            }
        }
    }

    /// 第 4 步：答题
    async fn quiz(&mut self, session: SessionConfig, questions: Vec<Question>) -> Result<Stage> {
        let quiz = match QuizSession::start(questions.clone()) {
            Ok(quiz) => quiz,
            Err(e) => {
                self.report(e).await?;
                return Ok(Stage::UploadConfig(session));
            }
        };

        match run_quiz(&mut self.input, &mut self.output, quiz).await? {
            QuizOutcome::Completed(result) => Ok(Stage::Results {
                session,
                questions,
                result,
            }),
            QuizOutcome::Aborted => Ok(Stage::UploadConfig(session)),
        }
    }

    /// 第 5 步：成绩
    async fn results(
        &mut self,
        session: SessionConfig,
        questions: &[Question],
        result: &SessionResult,
    ) -> Result<Stage> {
        let report = ResultReport::new(result, questions);
        log_session_summary(result, report.percentage);
        self.output.show_report(&report).await?;

        loop {
            let Some(choice) = self
                .ask("回车上传新的 PDF，输入 s 返回设置，q 退出: ")
                .await?
            else {
                return Ok(Stage::Exit);
            };
            match choice.to_lowercase().as_str() {
                "" => return Ok(Stage::UploadConfig(session)),
                "s" => return Ok(Stage::Setup),
                "q" => return Ok(Stage::Exit),
                _ => continue,
            }
        }
    }

    async fn ask(&mut self, prompt: &str) -> Result<Option<String>> {
        self.output.prompt(prompt).await?;
        Ok(self.input.read_line().await?)
    }

    /// 在终端显示错误并记录日志
    async fn report(&mut self, err: impl Into<AppError>) -> Result<()> {
        let err = err.into();
        error!("{}", err);
        self.output.line(format!("❌ {}", err)).await?;
        Ok(())
    }
}

/// 等待 Ctrl-C；无法监听信号时永远不返回
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("无法监听 Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// 按编号或 ID 选择模型，空输入使用默认模型
fn resolve_model(input: &str, models: &[String], default_model: &str) -> String {
    let input = input.trim();
    if input.is_empty() {
        return default_model.to_string();
    }
    match input.parse::<usize>() {
        Ok(n) if (1..=models.len().min(MODEL_DISPLAY_LIMIT)).contains(&n) => {
            models[n - 1].clone()
        }
        _ => input.to_string(),
    }
}

/// 解析题目数量，空输入使用默认数量
fn parse_settings(difficulty: Difficulty, input: &str) -> Result<QuizSettings, ConfigError> {
    let input = input.trim();
    if input.is_empty() {
        return QuizSettings::new(difficulty, QuizSettings::DEFAULT_QUESTIONS);
    }
    let count = input
        .parse::<u32>()
        .map_err(|_| ConfigError::InvalidNumber {
            field: "题目数量".to_string(),
            value: input.to_string(),
        })?;
    QuizSettings::new(difficulty, count)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio_test::io::Builder;

    use super::*;
    use crate::infrastructure::pdf_extractor::fixtures::build_pdf;

    fn models() -> Vec<String> {
        DEFAULT_MODELS.iter().map(|m| m.to_string()).collect()
    }

    fn offline_config() -> Config {
        Config {
            api_base_url: "http://127.0.0.1:9".to_string(),
            request_timeout_secs: 2,
            ..Config::default()
        }
    }

    async fn run_with_input(config: Config, input: &[u8]) -> String {
        let reader = BufReader::new(Builder::new().read(input).build());
        let mut app = App::with_console(config, reader, Vec::new()).unwrap();
        app.run().await.unwrap();
        let App { output, .. } = app;
        String::from_utf8(output.into_inner()).unwrap()
    }

    #[test]
    fn model_choice_by_number_id_or_default() {
        let models = models();
        assert_eq!(resolve_model("", &models, "x/default"), "x/default");
        assert_eq!(resolve_model("2", &models, "x/default"), "openai/gpt-4o-mini");
        assert_eq!(resolve_model("9", &models, "x/default"), "9");
        assert_eq!(
            resolve_model(" mistralai/mistral-7b ", &models, "x/default"),
            "mistralai/mistral-7b"
        );
    }

    #[test]
    fn question_count_is_bounded() {
        let settings = parse_settings(Difficulty::Hard, "").unwrap();
        assert_eq!(settings.question_count, QuizSettings::DEFAULT_QUESTIONS);
        assert_eq!(settings.difficulty, Difficulty::Hard);

        assert_eq!(parse_settings(Difficulty::Easy, "20").unwrap().question_count, 20);
        assert!(matches!(
            parse_settings(Difficulty::Easy, "21"),
            Err(ConfigError::QuestionCountOutOfRange { .. })
        ));
        assert!(matches!(
            parse_settings(Difficulty::Easy, "many"),
            Err(ConfigError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn stage_labels() {
        assert_eq!(Stage::Setup.step(), Some(AppStep::Setup));
        assert_eq!(Stage::Exit.step(), None);
    }

    #[tokio::test]
    async fn empty_key_is_rejected_then_input_ends() {
        let text = run_with_input(offline_config(), b"\n").await;
        assert!(text.contains(&SetupError::EmptyApiKey.to_string()));
        assert!(text.contains("再见"));
    }

    #[tokio::test]
    async fn unreachable_server_rejects_the_key() {
        let text = run_with_input(offline_config(), b"sk-or-test\n").await;
        assert!(text.contains("正在校验"));
        assert!(text.contains(&SetupError::InvalidApiKey.to_string()));
    }

    const STUB_MODEL: &str = "stub/model";

    /// 三道题，正确答案都是 A
    fn quiz_reply() -> String {
        let questions = serde_json::json!([
            {"id": 1, "text": "What gas do plants absorb?", "options": ["CO2", "O2"], "correctAnswerIndex": 0},
            {"id": 2, "text": "Where does photosynthesis happen?", "options": ["Chloroplast", "Nucleus"], "correctAnswerIndex": 0},
            {"id": 3, "text": "Main product besides oxygen?", "options": ["Glucose", "Salt"], "correctAnswerIndex": 0}
        ]);
        serde_json::json!({
            "choices": [{"message": {"content": questions.to_string()}}]
        })
        .to_string()
    }

    /// 本地 OpenRouter 替身：校验和模型列表总是成功，
    /// chat completion 依次返回 `chat_replies`，用完后返回合法题目
    async fn stub_server(chat_replies: Vec<String>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let replies = Arc::new(Mutex::new(VecDeque::from(chat_replies)));

        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(serve_once(socket, replies.clone()));
            }
        });
        format!("http://{}", addr)
    }

    async fn serve_once(socket: TcpStream, replies: Arc<Mutex<VecDeque<String>>>) {
        let mut reader = BufReader::new(socket);
        let mut request_line = String::new();
        if reader.read_line(&mut request_line).await.unwrap_or(0) == 0 {
            return;
        }

        let mut content_length = 0;
        loop {
            let mut header = String::new();
            if reader.read_line(&mut header).await.unwrap_or(0) == 0 {
                return;
            }
            let header = header.trim_end();
            if header.is_empty() {
                break;
            }
            if let Some((name, value)) = header.split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse().unwrap_or(0);
                }
            }
        }
        let mut body = vec![0; content_length];
        if reader.read_exact(&mut body).await.is_err() {
            return;
        }

        let path = request_line.split_whitespace().nth(1).unwrap_or("");
        let reply = if path.ends_with("/auth/key") {
            r#"{"data":{"label":"stub"}}"#.to_string()
        } else if path.ends_with("/models") {
            format!(r#"{{"data":[{{"id":"{}"}}]}}"#, STUB_MODEL)
        } else {
            replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(quiz_reply)
        };

        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            reply.len(),
            reply
        );
        let mut socket = reader.into_inner();
        let _ = socket.write_all(response.as_bytes()).await;
        let _ = socket.shutdown().await;
    }

    /// 写一个可以读出文字的 PDF，返回路径
    async fn sample_pdf(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pdf_quiz_app_{}_{}", name, std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("lecture.pdf");
        let pdf = build_pdf(&["Photosynthesis turns light energy into chemical energy in plants."]);
        tokio::fs::write(&path, pdf).await.unwrap();
        path
    }

    async fn stub_config(chat_replies: Vec<String>) -> Config {
        Config {
            api_base_url: stub_server(chat_replies).await,
            request_timeout_secs: 5,
            ..Config::default()
        }
    }

    const PDF_PROMPT: &str = "PDF 文件路径";
    const KEY_PROMPT: &str = "OpenRouter API Key";

    #[tokio::test]
    async fn generation_error_returns_to_upload() {
        let config = stub_config(vec![r#"{"choices":[]}"#.to_string()]).await;
        let pdf = sample_pdf("retry").await;
        let pdf = pdf.display();

        // Key、默认模型、PDF、默认难度、3 题 → 出题失败 → 重新上传 → 全部答 A → 回车重新上传
        let input = format!(
            "sk-or-test\n\n{pdf}\n\n3\n{pdf}\n\n3\na\n\na\n\na\n\n\n"
        );
        let text = run_with_input(config, input.as_bytes()).await;

        assert!(text.contains(&format!("✓ 使用模型 {}", STUB_MODEL)));
        assert!(text.contains("❌ 出题失败"));
        assert!(text.contains("返回了空结果"));
        assert!(text.contains("✓ 已生成 3 道题"));
        assert!(text.contains("得分: 3/3 (100%)"));
        assert_eq!(text.matches(PDF_PROMPT).count(), 3);
        assert_eq!(text.matches(KEY_PROMPT).count(), 1);
    }

    #[tokio::test]
    async fn quitting_the_quiz_returns_to_upload() {
        let config = stub_config(Vec::new()).await;
        let pdf = sample_pdf("quit").await;
        let pdf = pdf.display();

        let input = format!("sk-or-test\n\n{pdf}\n\n3\nq\nback\n");
        let text = run_with_input(config, input.as_bytes()).await;

        assert!(text.contains("已退出本次答题"));
        assert!(!text.contains("得分:"));
        assert_eq!(text.matches(PDF_PROMPT).count(), 2);
        assert_eq!(text.matches(KEY_PROMPT).count(), 2);
    }

    #[tokio::test]
    async fn results_can_go_back_to_setup() {
        let config = stub_config(Vec::new()).await;
        let pdf = sample_pdf("setup").await;
        let pdf = pdf.display();

        // 第 1 题答错，其余答对
        let input = format!("sk-or-test\n\n{pdf}\n\n3\nb\n\na\n\na\n\ns\n");
        let text = run_with_input(config, input.as_bytes()).await;

        assert!(text.contains("得分: 2/3 (67%)"));
        assert_eq!(text.matches(KEY_PROMPT).count(), 2);
        assert_eq!(text.matches(PDF_PROMPT).count(), 1);
    }

    #[tokio::test]
    async fn results_quit_ends_the_program() {
        let config = stub_config(Vec::new()).await;
        let pdf = sample_pdf("exit").await;
        let pdf = pdf.display();

        let input = format!("sk-or-test\n\n{pdf}\n\n3\na\n\na\n\na\n\nwhat\nq\nsk-or-unused\n");
        let text = run_with_input(config, input.as_bytes()).await;

        assert!(text.contains("得分: 3/3 (100%)"));
        assert_eq!(text.matches("回车上传新的 PDF").count(), 2);
        assert_eq!(text.matches(KEY_PROMPT).count(), 1);
        assert!(text.trim_end().ends_with("👋 再见"));
    }
}
