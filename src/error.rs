use std::fmt;

use thiserror::Error;

use crate::infrastructure::ProxyParseError;
use crate::models::Language;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 传输层错误
    #[error("传输错误: {0}")]
    Transport(#[from] TransportError),
    /// 文件操作错误
    #[error("文件错误 ({path}): {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl AppError {
    /// 创建文件操作错误
    pub fn file(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File {
            path: path.into(),
            source,
        }
    }
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 读取配置文件失败
    #[error("读取配置文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 缺少验证码服务密钥
    #[error("缺少 Anti-Captcha API 密钥")]
    MissingSolverKey,
    /// 表单地址无效
    #[error("表单地址无效 ({url}): {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    /// 代理列表格式错误
    #[error(transparent)]
    InvalidProxy(#[from] ProxyParseError),
}

/// 传输层错误（DNS / TLS / 超时等）
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("请求超时: {0}")]
    Timeout(String),
    #[error("连接失败: {0}")]
    Connect(String),
    #[error("无效请求: {0}")]
    InvalidRequest(String),
    #[error("{0}")]
    Other(String),
}

/// 流水线阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// 表单页面
    FormPage,
    /// 验证码图片
    CaptchaImage,
    /// 验证码识别服务
    Solver,
    /// 表单提交
    Submit,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::FormPage => "form-page",
            Stage::CaptchaImage => "captcha-image",
            Stage::Solver => "solver",
            Stage::Submit => "submit",
        };
        f.write_str(name)
    }
}

/// 页面上缺失的元素
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingElement {
    Form,
    CaptchaImage,
}

/// 单次流水线尝试中的失败
///
/// 全部可在重试控制器层面恢复，重试耗尽后作为结果消息返回给调用方。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    /// 网络 / DNS / TLS / 超时
    #[error("{}", self.english())]
    Network { stage: Stage, message: String },
    /// 页面缺少预期元素（目标站点结构变化）
    #[error("{}", self.english())]
    SiteStructure { missing: MissingElement },
    /// 非预期的 HTTP 状态码
    #[error("{}", self.english())]
    HttpStatus { stage: Stage, status: u16 },
    /// 识别服务返回错误码或无法解析的响应
    #[error("{}", self.english())]
    SolverService { description: String },
    /// 轮询次数耗尽
    #[error("{}", self.english())]
    SolverTimeout { attempts: u32 },
    /// 提交响应不匹配任何成功特征
    #[error("{}", self.english())]
    SubmissionAmbiguous { status: u16 },
}

impl StageError {
    /// 从传输错误构造网络错误
    pub fn network(stage: Stage, err: &TransportError) -> Self {
        StageError::Network {
            stage,
            message: err.to_string(),
        }
    }

    /// 按语言生成诊断信息
    pub fn message(&self, lang: Language) -> String {
        match lang {
            Language::English => self.english(),
            Language::Turkish => self.turkish(),
        }
    }

    fn english(&self) -> String {
        match self {
            StageError::Network { stage, message } => match stage {
                Stage::FormPage => format!("site unreachable: form page request failed: {}", message),
                Stage::CaptchaImage => {
                    format!("site unreachable: CAPTCHA image request failed: {}", message)
                }
                Stage::Solver => format!("CAPTCHA service unreachable: {}", message),
                Stage::Submit => format!("site unreachable: form submission request failed: {}", message),
            },
            StageError::SiteStructure { missing } => match missing {
                MissingElement::Form => "form not found: site structure changed".to_string(),
                MissingElement::CaptchaImage => {
                    "CAPTCHA image not found: site structure changed".to_string()
                }
            },
            StageError::HttpStatus { stage, status } => match (stage, status) {
                (Stage::CaptchaImage, code) => {
                    format!("CAPTCHA image could not be fetched: HTTP {}", code)
                }
                (Stage::Solver, code) => format!("CAPTCHA service error: HTTP {}", code),
                (_, 403) => {
                    "access blocked (403 Forbidden): the IP address may be blocked".to_string()
                }
                (_, 404) => {
                    "form relocated (404 Not Found): the form address may have changed".to_string()
                }
                (_, code) if *code >= 500 => {
                    format!("upstream unavailable ({}): try again later", code)
                }
                (_, code) => format!("form page unreachable: HTTP {}", code),
            },
            StageError::SolverService { description } => {
                format!("CAPTCHA service error: {}", description)
            }
            StageError::SolverTimeout { .. } => "CAPTCHA not solved: timeout".to_string(),
            StageError::SubmissionAmbiguous { status } => format!(
                "submission failed: response not recognised as accepted (HTTP {})",
                status
            ),
        }
    }

    fn turkish(&self) -> String {
        match self {
            StageError::Network { stage, message } => match stage {
                Stage::FormPage => format!("İhbar formuna erişilemedi: {}", message),
                Stage::CaptchaImage => format!("CAPTCHA resmi indirilemedi: {}", message),
                Stage::Solver => format!("Anti-Captcha servisine erişilemedi: {}", message),
                Stage::Submit => format!("Form gönderilemedi: {}", message),
            },
            StageError::SiteStructure { missing } => match missing {
                MissingElement::Form => {
                    "İhbar formu sayfada bulunamadı. Site yapısı değişmiş olabilir.".to_string()
                }
                MissingElement::CaptchaImage => {
                    "CAPTCHA resmi bulunamadı. Site yapısı değişmiş olabilir.".to_string()
                }
            },
            StageError::HttpStatus { stage, status } => match (stage, status) {
                (Stage::CaptchaImage, code) => format!("CAPTCHA resmi alınamadı: HTTP {}", code),
                (Stage::Solver, code) => format!("Anti-Captcha hatası: HTTP {}", code),
                (_, 403) => "İhbar formuna erişim engellendi (403 Forbidden). IP adresiniz engellenmiş olabilir.".to_string(),
                (_, 404) => "İhbar formu bulunamadı (404 Not Found). Form adresi değişmiş olabilir.".to_string(),
                (_, code) if *code >= 500 => format!(
                    "Sunucu şu anda hizmet veremiyor ({}). Lütfen daha sonra tekrar deneyin.",
                    code
                ),
                (_, code) => format!("İhbar formuna erişilemedi: HTTP {}", code),
            },
            StageError::SolverService { description } => {
                format!("Anti-Captcha hatası: {}", description)
            }
            StageError::SolverTimeout { .. } => "CAPTCHA çözülemedi: Zaman aşımı".to_string(),
            StageError::SubmissionAmbiguous { status } => {
                format!("Form gönderimi başarısız (HTTP {})", status)
            }
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forbidden_message_mentions_blocked() {
        let err = StageError::HttpStatus {
            stage: Stage::FormPage,
            status: 403,
        };
        assert!(err.to_string().contains("blocked"));
        assert!(err.message(Language::Turkish).contains("engellendi"));
    }

    #[test]
    fn test_status_classification() {
        let relocated = StageError::HttpStatus {
            stage: Stage::FormPage,
            status: 404,
        };
        assert!(relocated.to_string().contains("relocated"));

        let upstream = StageError::HttpStatus {
            stage: Stage::FormPage,
            status: 503,
        };
        assert!(upstream.to_string().contains("upstream unavailable (503)"));

        let other = StageError::HttpStatus {
            stage: Stage::FormPage,
            status: 418,
        };
        assert!(other.to_string().contains("HTTP 418"));
    }

    #[test]
    fn test_failure_kinds_are_distinguishable() {
        let unreachable = StageError::Network {
            stage: Stage::FormPage,
            message: "dns error".to_string(),
        };
        let unsolved = StageError::SolverTimeout { attempts: 30 };
        let rejected = StageError::SubmissionAmbiguous { status: 200 };

        assert!(unreachable.to_string().contains("site unreachable"));
        assert!(unreachable.to_string().contains("dns error"));
        assert_eq!(unsolved.to_string(), "CAPTCHA not solved: timeout");
        assert!(rejected.to_string().starts_with("submission failed"));
    }

    #[test]
    fn test_display_matches_english_message() {
        let errors = [
            StageError::Network {
                stage: Stage::Submit,
                message: "connection reset".to_string(),
            },
            StageError::HttpStatus {
                stage: Stage::CaptchaImage,
                status: 403,
            },
            StageError::SolverService {
                description: "ERROR_KEY_DOES_NOT_EXIST".to_string(),
            },
        ];

        for err in errors {
            assert_eq!(err.to_string(), err.message(Language::English));
            let boxed: Box<dyn std::error::Error> = Box::new(err.clone());
            assert_eq!(boxed.to_string(), err.to_string());
        }
    }
}
