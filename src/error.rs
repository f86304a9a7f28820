use std::fmt;

pub use crate::infrastructure::pdf_extractor::DocumentError;

/// 应用程序错误类型
///
/// 每一类错误都会在交互层被转换成一条可读的提示，然后把用户带回之前的步骤。
#[derive(Debug)]
pub enum AppError {
    /// HTTP 调用错误
    Api(ApiError),
    /// 设置步骤错误（密钥、模型）
    Setup(SetupError),
    /// PDF 文档错误
    Document(DocumentError),
    /// 出题错误
    Generation(GenerationError),
    /// 答题会话错误
    Session(SessionError),
    /// 配置错误
    Config(ConfigError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Api(e) => write!(f, "API错误: {}", e),
            AppError::Setup(e) => write!(f, "设置错误: {}", e),
            AppError::Document(e) => write!(f, "文档错误: {}", e),
            AppError::Generation(e) => write!(f, "出题失败: {}", e),
            AppError::Session(e) => write!(f, "会话错误: {}", e),
            AppError::Config(e) => write!(f, "配置错误: {}", e),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Api(e) => Some(e),
            AppError::Setup(e) => Some(e),
            AppError::Document(e) => Some(e),
            AppError::Generation(e) => Some(e),
            AppError::Session(e) => Some(e),
            AppError::Config(e) => Some(e),
        }
    }
}

/// HTTP 调用错误
#[derive(Debug)]
pub enum ApiError {
    /// 网络请求失败
    RequestFailed {
        endpoint: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 远端返回非 2xx 状态
    BadStatus {
        endpoint: String,
        status: u16,
        message: Option<String>,
    },
    /// 响应体解析失败
    JsonParseFailed {
        endpoint: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::RequestFailed { endpoint, source } => {
                write!(f, "API请求失败 ({}): {}", endpoint, source)
            }
            ApiError::BadStatus {
                endpoint,
                status,
                message,
            } => match message {
                Some(message) => write!(f, "{} ({} 返回 {})", message, endpoint, status),
                None => write!(f, "API返回错误状态 {} ({})", status, endpoint),
            },
            ApiError::JsonParseFailed { endpoint, source } => {
                write!(f, "无法解析 {} 的响应: {}", endpoint, source)
            }
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApiError::RequestFailed { source, .. } | ApiError::JsonParseFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            ApiError::BadStatus { .. } => None,
        }
    }
}

/// 设置步骤错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupError {
    /// 没有输入 API Key
    EmptyApiKey,
    /// API Key 未通过远端校验
    InvalidApiKey,
    /// 没有输入模型 ID
    EmptyModelId,
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupError::EmptyApiKey => write!(f, "请输入 API Key"),
            SetupError::InvalidApiKey => write!(f, "API Key 无效"),
            SetupError::EmptyModelId => write!(f, "请输入模型 ID"),
        }
    }
}

impl std::error::Error for SetupError {}

/// 出题错误
///
/// 每个变体对应一种可区分的失败原因，用户会被带回上传/配置步骤。
#[derive(Debug)]
pub enum GenerationError {
    /// 构建请求失败
    RequestBuildFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 远端调用失败
    ApiCallFailed { model: String, source: ApiError },
    /// 返回结果中没有 choices
    EmptyResponse { model: String },
    /// 返回消息内容为空
    EmptyContent { model: String },
    /// 返回内容不是合法 JSON
    InvalidJson {
        raw: String,
        source: serde_json::Error,
    },
    /// 解包之后仍然不是数组
    NotAnArray,
    /// 题目缺少必需字段（选项或正确答案索引）
    MissingFields { index: usize },
    /// 题目数据不合法
    InvalidQuestion { index: usize, reason: String },
    /// 返回了空数组
    NoQuestions,
    /// 用户取消了出题
    Cancelled,
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationError::RequestBuildFailed { source } => {
                write!(f, "无法构建出题请求: {}", source)
            }
            GenerationError::ApiCallFailed { model, source } => {
                write!(f, "模型 {} 调用失败: {}", model, source)
            }
            GenerationError::EmptyResponse { model } => write!(
                f,
                "模型 {} 返回了空结果，请换一个模型或缩小 PDF 后重试",
                model
            ),
            GenerationError::EmptyContent { model } => {
                write!(f, "模型 {} 返回的消息内容为空", model)
            }
            GenerationError::InvalidJson { source, .. } => write!(
                f,
                "无法把模型返回的内容解析为 JSON，模型可能输出了错误的格式: {}",
                source
            ),
            GenerationError::NotAnArray => {
                write!(f, "模型没有返回题目数组，请换一个模型重试")
            }
            GenerationError::MissingFields { index } => write!(
                f,
                "第 {} 道题缺少必需字段（options 或 correctAnswerIndex）",
                index + 1
            ),
            GenerationError::InvalidQuestion { index, reason } => {
                write!(f, "第 {} 道题数据不合法: {}", index + 1, reason)
            }
            GenerationError::NoQuestions => write!(f, "模型返回的题目列表为空"),
            GenerationError::Cancelled => write!(f, "出题已取消"),
        }
    }
}

impl std::error::Error for GenerationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GenerationError::RequestBuildFailed { source } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            GenerationError::ApiCallFailed { source, .. } => Some(source),
            GenerationError::InvalidJson { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// 答题会话错误
///
/// 只表示调用方的缺陷，运行时不会被重试。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// 用空题目列表启动会话
    EmptyQuestionList,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::EmptyQuestionList => write!(f, "不能用空题目列表开始答题"),
        }
    }
}

impl std::error::Error for SessionError {}

/// 配置错误
#[derive(Debug)]
pub enum ConfigError {
    /// 环境变量解析失败
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 读取配置文件失败
    FileReadFailed {
        path: String,
        source: std::io::Error,
    },
    /// TOML 解析失败
    TomlParseFailed {
        path: String,
        source: toml::de::Error,
    },
    /// 题目数量超出范围
    QuestionCountOutOfRange { count: u32, min: u32, max: u32 },
    /// 无法识别的难度
    UnknownDifficulty { value: String },
    /// 输入不是整数
    InvalidNumber { field: String, value: String },
    /// 配置项必须大于 0
    NotPositive { key: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EnvVarParseFailed {
                var_name,
                value,
                expected_type,
            } => {
                write!(
                    f,
                    "环境变量 {} 解析失败: 值 '{}' 无法转换为 {}",
                    var_name, value, expected_type
                )
            }
            ConfigError::FileReadFailed { path, source } => {
                write!(f, "读取配置文件失败 ({}): {}", path, source)
            }
            ConfigError::TomlParseFailed { path, source } => {
                write!(f, "TOML解析失败 ({}): {}", path, source)
            }
            ConfigError::QuestionCountOutOfRange { count, min, max } => {
                write!(f, "题目数量 {} 超出范围 [{}, {}]", count, min, max)
            }
            ConfigError::UnknownDifficulty { value } => {
                write!(f, "无法识别的难度: {}", value)
            }
            ConfigError::InvalidNumber { field, value } => {
                write!(f, "{}必须是整数，收到 '{}'", field, value)
            }
            ConfigError::NotPositive { key } => write!(f, "配置项 {} 必须大于 0", key),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::FileReadFailed { source, .. } => Some(source),
            ConfigError::TomlParseFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}

// ========== 从各层错误类型转换 ==========

impl From<ApiError> for AppError {
    fn from(err: ApiError) -> Self {
        AppError::Api(err)
    }
}

impl From<SetupError> for AppError {
    fn from(err: SetupError) -> Self {
        AppError::Setup(err)
    }
}

impl From<DocumentError> for AppError {
    fn from(err: DocumentError) -> Self {
        AppError::Document(err)
    }
}

impl From<GenerationError> for AppError {
    fn from(err: GenerationError) -> Self {
        AppError::Generation(err)
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        AppError::Session(err)
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

// ========== 便捷构造函数 ==========

impl ApiError {
    /// 创建网络请求失败错误
    pub fn request_failed(
        endpoint: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ApiError::RequestFailed {
            endpoint: endpoint.into(),
            source: Box::new(source),
        }
    }

    /// 创建响应解析失败错误
    pub fn json_parse_failed(
        endpoint: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ApiError::JsonParseFailed {
            endpoint: endpoint.into(),
            source: Box::new(source),
        }
    }
}

impl GenerationError {
    /// 创建远端调用失败错误
    pub fn api_call_failed(model: impl Into<String>, source: ApiError) -> Self {
        GenerationError::ApiCallFailed {
            model: model.into(),
            source,
        }
    }

    /// 创建题目不合法错误
    pub fn invalid_question(index: usize, reason: impl Into<String>) -> Self {
        GenerationError::InvalidQuestion {
            index,
            reason: reason.into(),
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
