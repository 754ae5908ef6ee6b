/// 程序配置
///
/// 所有可调参数集中于此，在构造各层对象时显式传入引用，
/// 不使用任何进程级单例
#[derive(Clone, Debug)]
pub struct Config {
    /// 同时处理的文档数量
    pub max_concurrent_documents: usize,
    /// 单个文档的最大抽取轮次
    pub max_passes: usize,
    /// 文档文本文件存放目录
    pub documents_folder: String,
    /// 字段目录 TOML 文件路径
    pub catalog_file: String,
    /// 对比模式：逗号分隔的两个文档路径（为空则走批量模式）
    pub compare_files: Option<String>,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
    /// 未解析字段报告文件
    pub warn_file: String,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    /// 传输层失败的重试次数
    pub llm_retry_attempts: usize,
    /// 重试间隔基数（毫秒）
    pub llm_retry_backoff_ms: u64,
    // --- 分类器阈值 ---
    /// 短答案阈值：长度不超过该值直接判为 Value
    pub short_value_threshold: usize,
    /// 长描述阈值：长度超过该值直接判为 Description
    pub long_description_threshold: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_documents: 4,
            max_passes: 3,
            documents_folder: "input_documents".to_string(),
            catalog_file: "catalogs/health_policy.toml".to_string(),
            compare_files: None,
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
            warn_file: "warn.txt".to_string(),
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
            llm_retry_attempts: 3,
            llm_retry_backoff_ms: 500,
            short_value_threshold: 40,
            long_description_threshold: 160,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_concurrent_documents: std::env::var("MAX_CONCURRENT_DOCUMENTS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_concurrent_documents),
            max_passes: std::env::var("MAX_PASSES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_passes),
            documents_folder: std::env::var("DOCUMENTS_FOLDER").unwrap_or(default.documents_folder),
            catalog_file: std::env::var("CATALOG_FILE").unwrap_or(default.catalog_file),
            compare_files: std::env::var("COMPARE_FILES").ok().filter(|v| !v.is_empty()),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            warn_file: std::env::var("WARN_FILE").unwrap_or(default.warn_file),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
            llm_retry_attempts: std::env::var("LLM_RETRY_ATTEMPTS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.llm_retry_attempts),
            llm_retry_backoff_ms: std::env::var("LLM_RETRY_BACKOFF_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.llm_retry_backoff_ms),
            short_value_threshold: std::env::var("SHORT_VALUE_THRESHOLD").ok().and_then(|v| v.parse().ok()).unwrap_or(default.short_value_threshold),
            long_description_threshold: std::env::var("LONG_DESCRIPTION_THRESHOLD").ok().and_then(|v| v.parse().ok()).unwrap_or(default.long_description_threshold),
        }
    }
}
