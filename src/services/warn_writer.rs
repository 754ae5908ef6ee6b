//! 警告写入服务 - 业务能力层
//!
//! 只负责"写 warn.txt"能力，不关心流程

use anyhow::Result;
use std::fs::OpenOptions;
use std::io::Write;
use tracing::debug;

/// 警告写入服务
///
/// 职责：
/// - 将仍有未解析字段的文档记入 warn.txt
/// - 只处理单个文档的警告
/// - 不关心流程顺序
pub struct WarnWriter {
    warn_file_path: String,
}

impl WarnWriter {
    /// 使用自定义文件路径创建
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            warn_file_path: path.into(),
        }
    }

    /// 写入警告信息：某文档处理结束后仍未解析的字段清单
    pub async fn write(&self, document_name: &str, unresolved_fields: &[String]) -> Result<()> {
        debug!(
            "写入警告: 文档 {} | 未解析字段数: {}",
            document_name,
            unresolved_fields.len()
        );

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.warn_file_path)?;

        let warn_msg = format!(
            "文档 {} | 未解析字段: {}\n",
            document_name,
            unresolved_fields.join(", ")
        );

        file.write_all(warn_msg.as_bytes())?;

        Ok(())
    }
}

impl Default for WarnWriter {
    fn default() -> Self {
        Self::with_path("warn.txt")
    }
}
