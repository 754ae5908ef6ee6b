//! 文档处理上下文
//!
//! 封装"我正在处理第几号文档"这一信息

use std::fmt::Display;

/// 文档处理上下文
///
/// 包含处理单个文档所需的标识信息
#[derive(Debug, Clone)]
pub struct DocumentCtx {
    /// 文档展示名（一般是文件名）
    pub document_name: String,

    /// 文档索引（仅用于日志显示）
    pub document_index: usize,

    /// 文档族名称
    pub family: String,
}

impl DocumentCtx {
    /// 创建新的文档上下文
    pub fn new(document_name: String, document_index: usize, family: String) -> Self {
        Self {
            document_name,
            document_index,
            family,
        }
    }
}

impl Display for DocumentCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[文档 #{} {} 族#{}]",
            self.document_index, self.document_name, self.family
        )
    }
}
