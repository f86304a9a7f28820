use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::ConfigError;

/// 默认配置文件路径
pub const DEFAULT_CONFIG_FILE: &str = "quiz.toml";

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    // --- OpenRouter 配置 ---
    pub api_base_url: String,
    /// 预先填好的 API Key，为空时在设置步骤中输入
    pub api_key: Option<String>,
    /// 预先选好的模型 ID
    pub model_id: Option<String>,
    /// 作为 HTTP-Referer 发送，用来标识调用方
    pub app_url: String,
    /// 作为 X-Title 发送
    pub app_title: String,
    /// 单次 HTTP 请求超时（秒）
    pub request_timeout_secs: u64,
    // --- 文档与出题 ---
    /// 最多读取的 PDF 页数
    pub max_pdf_pages: usize,
    /// 发送给模型的原文最大字符数
    pub max_source_chars: usize,
    /// 提取出的文本少于该字符数时视为图片型 PDF
    pub min_text_chars: usize,
    /// 模型没有给出合法时限时使用的每题秒数
    pub default_time_limit_secs: u32,
    // --- 日志 ---
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "https://openrouter.ai/api/v1".to_string(),
            api_key: None,
            model_id: None,
            app_url: "http://localhost".to_string(),
            app_title: "PDF Quiz Generator".to_string(),
            request_timeout_secs: 120,
            max_pdf_pages: 20,
            max_source_chars: 15_000,
            min_text_chars: 50,
            default_time_limit_secs: 30,
            verbose_logging: false,
            log_file: "quiz.log".to_string(),
        }
    }
}

/// 配置文件中的可选字段，缺省的字段沿用默认值
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    api_base_url: Option<String>,
    api_key: Option<String>,
    model_id: Option<String>,
    app_url: Option<String>,
    app_title: Option<String>,
    request_timeout_secs: Option<u64>,
    max_pdf_pages: Option<usize>,
    max_source_chars: Option<usize>,
    min_text_chars: Option<usize>,
    default_time_limit_secs: Option<u32>,
    verbose_logging: Option<bool>,
    log_file: Option<String>,
}

impl Config {
    /// 默认值加环境变量
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self::default().with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// 加载配置：默认值 → TOML 文件（如果存在）→ 环境变量
    ///
    /// `path` 为空时读取 `QUIZ_CONFIG` 指定的文件，再退回到 `quiz.toml`。
    /// 默认路径下的文件不存在不算错误，显式指定的文件不存在则报错。
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let explicit = path
            .map(|p| p.to_path_buf())
            .or_else(|| std::env::var("QUIZ_CONFIG").ok().map(Into::into));

        let base = match explicit {
            Some(path) => Self::from_toml_file(&path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_toml_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };

        let config = base.with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 文件读取配置
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|source| ConfigError::FileReadFailed {
                path: path.display().to_string(),
                source,
            })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::TomlParseFailed {
            path: path.display().to_string(),
            source,
        })
    }

    /// 从 TOML 文本读取配置
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        let file: ConfigFile = toml::from_str(content)?;
        let default = Self::default();
        Ok(Self {
            api_base_url: file.api_base_url.unwrap_or(default.api_base_url),
            api_key: file.api_key.or(default.api_key),
            model_id: file.model_id.or(default.model_id),
            app_url: file.app_url.unwrap_or(default.app_url),
            app_title: file.app_title.unwrap_or(default.app_title),
            request_timeout_secs: file
                .request_timeout_secs
                .unwrap_or(default.request_timeout_secs),
            max_pdf_pages: file.max_pdf_pages.unwrap_or(default.max_pdf_pages),
            max_source_chars: file.max_source_chars.unwrap_or(default.max_source_chars),
            min_text_chars: file.min_text_chars.unwrap_or(default.min_text_chars),
            default_time_limit_secs: file
                .default_time_limit_secs
                .unwrap_or(default.default_time_limit_secs),
            verbose_logging: file.verbose_logging.unwrap_or(default.verbose_logging),
            log_file: file.log_file.unwrap_or(default.log_file),
        })
    }

    /// 用环境变量覆盖配置，数值或布尔值无法解析时报错
    fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides(self, var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            api_base_url: var("OPENROUTER_BASE_URL").unwrap_or(self.api_base_url),
            api_key: var("OPENROUTER_API_KEY").or(self.api_key),
            model_id: var("OPENROUTER_MODEL").or(self.model_id),
            app_url: var("QUIZ_APP_URL").unwrap_or(self.app_url),
            app_title: var("QUIZ_APP_TITLE").unwrap_or(self.app_title),
            request_timeout_secs: parse_var(&var, "REQUEST_TIMEOUT_SECS", "u64")?
                .unwrap_or(self.request_timeout_secs),
            max_pdf_pages: parse_var(&var, "MAX_PDF_PAGES", "usize")?
                .unwrap_or(self.max_pdf_pages),
            max_source_chars: parse_var(&var, "MAX_SOURCE_CHARS", "usize")?
                .unwrap_or(self.max_source_chars),
            min_text_chars: parse_var(&var, "MIN_TEXT_CHARS", "usize")?
                .unwrap_or(self.min_text_chars),
            default_time_limit_secs: parse_var(&var, "DEFAULT_TIME_LIMIT_SECS", "u32")?
                .unwrap_or(self.default_time_limit_secs),
            verbose_logging: parse_var(&var, "VERBOSE_LOGGING", "bool")?
                .unwrap_or(self.verbose_logging),
            log_file: var("OUTPUT_LOG_FILE").unwrap_or(self.log_file),
        })
    }

    /// 检查数值配置，超时、页数、字符数和默认时限都必须大于 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("request_timeout_secs", self.request_timeout_secs as usize),
            ("max_pdf_pages", self.max_pdf_pages),
            ("max_source_chars", self.max_source_chars),
            ("default_time_limit_secs", self.default_time_limit_secs as usize),
        ];
        match positive.iter().find(|(_, value)| *value == 0) {
            Some((key, _)) => Err(ConfigError::NotPositive {
                key: key.to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// 读取并解析一个环境变量，未设置时为 `None`
fn parse_var<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    name: &str,
    expected_type: &str,
) -> Result<Option<T>, ConfigError> {
    let Some(value) = var(name) else {
        return Ok(None);
    };
    match value.trim().parse::<T>() {
        Ok(parsed) => Ok(Some(parsed)),
        Err(_) => Err(ConfigError::EnvVarParseFailed {
            var_name: name.to_string(),
            value,
            expected_type: expected_type.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_overrides_only_listed_keys() {
        let config = Config::from_toml_str(
            r#"
            model_id = "openai/gpt-4o-mini"
            max_source_chars = 8000
            verbose_logging = true
            "#,
        )
        .unwrap();

        assert_eq!(config.model_id.as_deref(), Some("openai/gpt-4o-mini"));
        assert_eq!(config.max_source_chars, 8000);
        assert!(config.verbose_logging);
        assert_eq!(config.api_base_url, "https://openrouter.ai/api/v1");
        assert_eq!(config.max_pdf_pages, 20);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn toml_rejects_unknown_keys() {
        assert!(Config::from_toml_str("max_pages = 3").is_err());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = Config::load(Some(Path::new("definitely/not/here/quiz.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::FileReadFailed { .. }));
    }

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: std::collections::HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn env_values_override_file_values() {
        let config = Config::default()
            .with_overrides(vars(&[
                ("MAX_PDF_PAGES", "5"),
                ("VERBOSE_LOGGING", "true"),
                ("OPENROUTER_MODEL", "openai/gpt-4o-mini"),
            ]))
            .unwrap();
        assert_eq!(config.max_pdf_pages, 5);
        assert!(config.verbose_logging);
        assert_eq!(config.model_id.as_deref(), Some("openai/gpt-4o-mini"));
        assert_eq!(config.max_source_chars, 15_000);
    }

    #[test]
    fn unparsable_env_value_is_an_error() {
        let err = Config::default()
            .with_overrides(vars(&[("MAX_PDF_PAGES", "twenty")]))
            .unwrap_err();
        match err {
            ConfigError::EnvVarParseFailed {
                var_name, value, ..
            } => {
                assert_eq!(var_name, "MAX_PDF_PAGES");
                assert_eq!(value, "twenty");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = Config::default()
            .with_overrides(vars(&[("VERBOSE_LOGGING", "yes please")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::EnvVarParseFailed { .. }));
    }

    #[test]
    fn zero_limits_are_rejected() {
        assert!(Config::default().validate().is_ok());

        for key in [
            "request_timeout_secs",
            "max_pdf_pages",
            "max_source_chars",
            "default_time_limit_secs",
        ] {
            let config = Config::from_toml_str(&format!("{key} = 0")).unwrap();
            match config.validate() {
                Err(ConfigError::NotPositive { key: reported }) => assert_eq!(reported, key),
                other => panic!("{key}: unexpected result {other:?}"),
            }
        }
    }

    #[test]
    fn load_validates_the_file() {
        let dir = std::env::temp_dir().join(format!("pdf_quiz_config_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("quiz.toml");
        std::fs::write(&path, "default_time_limit_secs = 0\n").unwrap();

        let err = Config::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::NotPositive { .. }));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
