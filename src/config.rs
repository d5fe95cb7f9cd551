use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// 程序配置
///
/// 启动时构造一次，之后只读地传给各层
#[derive(Clone)]
pub struct Config {
    /// 入口鉴权用的共享 secret
    pub secret: String,
    /// HTTP 监听端口
    pub port: u16,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    /// 解析题目用的模型
    pub interpreter_model: String,
    /// 求解用的模型（需要支持图片）
    pub solver_model: String,
    // --- 链路配置 ---
    /// 整条链路的时间预算
    pub chain_budget: Duration,
    /// 单次网络调用的超时上限
    pub per_call_timeout: Duration,
    /// 每道题最多提交几次
    pub max_answer_attempts: u32,
    /// 题目解析最多尝试几次
    pub max_interpret_attempts: u32,
    // --- 浏览器配置 ---
    /// 页面加载完成后额外等待的时间
    pub render_settle: Duration,
    /// 浏览器可执行文件路径，为空时自动查找
    pub chrome_executable: Option<PathBuf>,
    // --- 文件配置 ---
    /// 下载目录的父目录，为空时使用系统临时目录
    pub download_dir: Option<PathBuf>,
    /// 文本文件内联给 LLM 的最大字符数
    pub max_file_chars: usize,
    /// 失败步骤写入的文件
    pub warn_file: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            secret: String::new(),
            port: 5000,
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            interpreter_model: "gpt-4o-mini".to_string(),
            solver_model: "gpt-4o".to_string(),
            chain_budget: Duration::from_secs(180),
            per_call_timeout: Duration::from_secs(30),
            max_answer_attempts: 2,
            max_interpret_attempts: 2,
            render_settle: Duration::from_millis(2000),
            chrome_executable: None,
            download_dir: None,
            max_file_chars: 20_000,
            warn_file: "warn.txt".to_string(),
            verbose_logging: false,
        }
    }
}

/// secret 和 API Key 不出现在日志里
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("secret", &"***")
            .field("port", &self.port)
            .field("llm_api_key", &"***")
            .field("llm_api_base_url", &self.llm_api_base_url)
            .field("interpreter_model", &self.interpreter_model)
            .field("solver_model", &self.solver_model)
            .field("chain_budget", &self.chain_budget)
            .field("per_call_timeout", &self.per_call_timeout)
            .field("max_answer_attempts", &self.max_answer_attempts)
            .field("max_interpret_attempts", &self.max_interpret_attempts)
            .field("render_settle", &self.render_settle)
            .field("chrome_executable", &self.chrome_executable)
            .field("download_dir", &self.download_dir)
            .field("max_file_chars", &self.max_file_chars)
            .field("warn_file", &self.warn_file)
            .field("verbose_logging", &self.verbose_logging)
            .finish()
    }
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// `SECRET_KEY` 和 `LLM_API_KEY`（或 `OPENAI_API_KEY`）必须提供，其余使用默认值
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 从任意键值来源加载配置，便于测试
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();

        let secret = required(&lookup, "SECRET_KEY")?;
        let llm_api_key = match non_empty(&lookup, "LLM_API_KEY") {
            Some(key) => key,
            None => required(&lookup, "OPENAI_API_KEY")?,
        };

        let config = Self {
            secret,
            port: parsed(&lookup, "PORT", "u16")?.unwrap_or(default.port),
            llm_api_key,
            llm_api_base_url: non_empty(&lookup, "LLM_API_BASE_URL")
                .unwrap_or(default.llm_api_base_url),
            interpreter_model: non_empty(&lookup, "INTERPRETER_MODEL")
                .unwrap_or(default.interpreter_model),
            solver_model: non_empty(&lookup, "SOLVER_MODEL").unwrap_or(default.solver_model),
            chain_budget: parsed::<u64, _>(&lookup, "CHAIN_BUDGET_SECS", "u64")?
                .map(Duration::from_secs)
                .unwrap_or(default.chain_budget),
            per_call_timeout: parsed::<u64, _>(&lookup, "PER_CALL_TIMEOUT_SECS", "u64")?
                .map(Duration::from_secs)
                .unwrap_or(default.per_call_timeout),
            max_answer_attempts: parsed(&lookup, "MAX_ANSWER_ATTEMPTS", "u32")?
                .unwrap_or(default.max_answer_attempts),
            max_interpret_attempts: parsed(&lookup, "MAX_INTERPRET_ATTEMPTS", "u32")?
                .unwrap_or(default.max_interpret_attempts),
            render_settle: parsed::<u64, _>(&lookup, "RENDER_SETTLE_MS", "u64")?
                .map(Duration::from_millis)
                .unwrap_or(default.render_settle),
            chrome_executable: non_empty(&lookup, "CHROME_EXECUTABLE").map(PathBuf::from),
            download_dir: non_empty(&lookup, "DOWNLOAD_DIR").map(PathBuf::from),
            max_file_chars: parsed(&lookup, "MAX_FILE_CHARS", "usize")?
                .unwrap_or(default.max_file_chars),
            warn_file: non_empty(&lookup, "WARN_FILE").unwrap_or(default.warn_file),
            verbose_logging: parsed(&lookup, "VERBOSE_LOGGING", "bool")?
                .unwrap_or(default.verbose_logging),
        };

        config.validate()?;
        Ok(config)
    }

    /// 检查取值范围
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain_budget.is_zero() {
            return Err(invalid("chain_budget", "必须大于 0"));
        }
        if self.per_call_timeout.is_zero() {
            return Err(invalid("per_call_timeout", "必须大于 0"));
        }
        if self.max_answer_attempts == 0 {
            return Err(invalid("max_answer_attempts", "至少为 1"));
        }
        if self.max_interpret_attempts == 0 {
            return Err(invalid("max_interpret_attempts", "至少为 1"));
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn non_empty<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required<F>(lookup: &F, name: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    non_empty(lookup, name).ok_or_else(|| ConfigError::EnvVarNotFound {
        var_name: name.to_string(),
    })
}

fn parsed<T, F>(lookup: &F, name: &str, expected_type: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match non_empty(lookup, name) {
        None => Ok(None),
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: name.to_string(),
                value,
                expected_type: expected_type.to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_with_required_values() {
        let config =
            Config::from_lookup(lookup_from(&[("SECRET_KEY", "s3"), ("LLM_API_KEY", "k")])).unwrap();
        assert_eq!(config.secret, "s3");
        assert_eq!(config.port, 5000);
        assert_eq!(config.chain_budget, Duration::from_secs(180));
        assert_eq!(config.max_answer_attempts, 2);
        assert!(config.chrome_executable.is_none());
    }

    #[test]
    fn test_openai_key_fallback() {
        let config =
            Config::from_lookup(lookup_from(&[("SECRET_KEY", "s"), ("OPENAI_API_KEY", "ok")]))
                .unwrap();
        assert_eq!(config.llm_api_key, "ok");
    }

    #[test]
    fn test_missing_secret() {
        let err = Config::from_lookup(lookup_from(&[("LLM_API_KEY", "k")])).unwrap_err();
        assert!(matches!(err, ConfigError::EnvVarNotFound { ref var_name } if var_name == "SECRET_KEY"));
    }

    #[test]
    fn test_bad_number() {
        let err = Config::from_lookup(lookup_from(&[
            ("SECRET_KEY", "s"),
            ("LLM_API_KEY", "k"),
            ("PORT", "eighty"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::EnvVarParseFailed { .. }));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let err = Config::from_lookup(lookup_from(&[
            ("SECRET_KEY", "s"),
            ("LLM_API_KEY", "k"),
            ("MAX_ANSWER_ATTEMPTS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let config = Config::from_lookup(lookup_from(&[
            ("SECRET_KEY", "super-secret-value"),
            ("LLM_API_KEY", "sk-live-abcdef"),
        ]))
        .unwrap();
        let printed = format!("{:?}", config);
        assert!(!printed.contains("super-secret-value"));
        assert!(!printed.contains("sk-live-abcdef"));
        assert!(printed.contains("gpt-4o-mini"));
    }
}
