//! 设置步骤的产物
//!
//! 密钥和模型在步骤之间显式传递，不放在全局变量里。

use std::fmt::Display;

use crate::error::SetupError;

/// 设置步骤确定下来的凭据和模型
#[derive(Clone)]
pub struct SessionConfig {
    pub api_key: String,
    pub model_id: String,
}

impl SessionConfig {
    pub fn new(api_key: impl Into<String>, model_id: impl Into<String>) -> Result<Self, SetupError> {
        let api_key = api_key.into().trim().to_string();
        let model_id = model_id.into().trim().to_string();
        if api_key.is_empty() {
            return Err(SetupError::EmptyApiKey);
        }
        if model_id.is_empty() {
            return Err(SetupError::EmptyModelId);
        }
        Ok(Self { api_key, model_id })
    }
}

// 不打印完整密钥
impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("api_key", &mask_key(&self.api_key))
            .field("model_id", &self.model_id)
            .finish()
    }
}

impl Display for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[模型 {} 密钥 {}]", self.model_id, mask_key(&self.api_key))
    }
}

/// 只保留密钥末尾 4 位
pub fn mask_key(key: &str) -> String {
    let tail: String = key
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("****{}", tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_fields() {
        assert_eq!(
            SessionConfig::new("  ", "openai/gpt-4o-mini").unwrap_err(),
            SetupError::EmptyApiKey
        );
        assert_eq!(
            SessionConfig::new("sk-or-123", "").unwrap_err(),
            SetupError::EmptyModelId
        );
    }

    #[test]
    fn never_prints_the_full_key() {
        let config = SessionConfig::new("sk-or-v1-abcdef", "openai/gpt-4o-mini").unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("sk-or-v1-abcdef"));
        assert!(debug.contains("****cdef"));
        assert!(config.to_string().contains("openai/gpt-4o-mini"));
    }
}
