//! PDF 文本提取 - 基础设施层
//!
//! 只负责“把 PDF 变成纯文本”，不认识题目和出题流程。
//! 解析放在 `spawn_blocking` 中执行，不阻塞异步运行时。

use std::path::Path;

use lopdf::Document;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;

/// PDF 文件头
const PDF_MAGIC: &[u8] = b"%PDF-";

/// 文档错误，用户可以换一个文件重试
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("文件不存在: {path}")]
    NotFound { path: String },

    #[error("请上传有效的 PDF 文件: {path}")]
    NotPdf { path: String },

    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("无法解析 PDF，请换一个文件: {0}")]
    Unreadable(String),

    #[error("PDF 中没有找到文本，可能是扫描件或纯图片")]
    NoText,

    #[error("PDF 中的文本太少（{chars} 个字符，至少需要 {min} 个），可能是纯图片 PDF")]
    TooLittleText { chars: usize, min: usize },
}

/// PDF 文本提取器
pub struct PdfExtractor {
    max_pages: usize,
    min_text_chars: usize,
}

impl PdfExtractor {
    pub fn new(config: &Config) -> Self {
        Self {
            max_pages: config.max_pdf_pages,
            min_text_chars: config.min_text_chars,
        }
    }

    /// 从磁盘读取并提取文本
    pub async fn extract_file(&self, path: &Path) -> Result<String, DocumentError> {
        let path_str = path.display().to_string();

        let is_pdf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);
        if !is_pdf {
            return Err(DocumentError::NotPdf { path: path_str });
        }

        let bytes = tokio::fs::read(path).await.map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                DocumentError::NotFound {
                    path: path_str.clone(),
                }
            } else {
                DocumentError::ReadFailed {
                    path: path_str.clone(),
                    source,
                }
            }
        })?;

        info!("📄 正在解析 PDF: {} ({} 字节)", path_str, bytes.len());
        self.extract_named(bytes, path_str).await
    }

    /// 从内存中的 PDF 提取文本
    pub async fn extract_bytes(&self, bytes: Vec<u8>) -> Result<String, DocumentError> {
        self.extract_named(bytes, "<memory>".to_string()).await
    }

    async fn extract_named(&self, bytes: Vec<u8>, name: String) -> Result<String, DocumentError> {
        if !bytes.starts_with(PDF_MAGIC) {
            return Err(DocumentError::NotPdf { path: name });
        }

        let max_pages = self.max_pages;
        let text = tokio::task::spawn_blocking(move || extract_pages(&bytes, max_pages))
            .await
            .map_err(|e| DocumentError::Unreadable(e.to_string()))??;

        let chars = text.chars().count();
        if chars < self.min_text_chars {
            return Err(DocumentError::TooLittleText {
                chars,
                min: self.min_text_chars,
            });
        }

        info!("✓ PDF 文本提取完成，共 {} 个字符", chars);
        Ok(text)
    }
}

/// 逐页提取文本，最多读取 `max_pages` 页，单页失败时跳过
fn extract_pages(bytes: &[u8], max_pages: usize) -> Result<String, DocumentError> {
    let document =
        Document::load_mem(bytes).map_err(|e| DocumentError::Unreadable(e.to_string()))?;

    let pages = document.get_pages();
    debug!("PDF 共 {} 页，最多读取 {} 页", pages.len(), max_pages);

    let mut full_text = String::new();
    for page_number in pages.keys().copied().take(max_pages) {
        match document.extract_text(&[page_number]) {
            Ok(page_text) => {
                full_text.push_str(page_text.trim());
                full_text.push_str("\n\n");
            }
            Err(e) => warn!("跳过第 {} 页: {}", page_number, e),
        }
    }

    let text = full_text.trim();
    if text.is_empty() {
        return Err(DocumentError::NoText);
    }
    Ok(text.to_string())
}
