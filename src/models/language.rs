use serde::{Deserialize, Serialize};

/// 诊断信息语言
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// 英语
    #[default]
    #[serde(alias = "en")]
    English,
    /// 土耳其语（目标站点语言）
    #[serde(alias = "tr")]
    Turkish,
}

impl Language {
    /// 获取语言代码
    pub fn code(self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Turkish => "tr",
        }
    }

    /// 从代码或名称解析（不区分大小写）
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "en" | "english" => Some(Language::English),
            "tr" | "turkish" | "türkçe" => Some(Language::Turkish),
            _ => None,
        }
    }

    /// 提交成功时的消息
    pub fn submitted(self) -> &'static str {
        match self {
            Language::English => "form submitted successfully",
            Language::Turkish => "Form başarıyla gönderildi",
        }
    }

    /// 重试耗尽时的消息
    pub fn exhausted(self, attempts: u32, last_error: &str) -> String {
        match self {
            Language::English => format!(
                "submission failed after {} attempt(s): {}",
                attempts, last_error
            ),
            Language::Turkish => format!(
                "Form gönderimi başarısız ({} deneme): {}",
                attempts, last_error
            ),
        }
    }

    /// 表单页面可访问时的消息
    pub fn accessible(self) -> &'static str {
        match self {
            Language::English => "report form is accessible",
            Language::Turkish => "İhbar formu erişilebilir durumda",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_language() {
        assert_eq!(Language::parse("TR"), Some(Language::Turkish));
        assert_eq!(Language::parse(" english "), Some(Language::English));
        assert_eq!(Language::parse("de"), None);
    }

    #[test]
    fn test_exhausted_message_names_attempts() {
        let msg = Language::English.exhausted(3, "CAPTCHA not solved: timeout");
        assert!(msg.contains("3 attempt"));
        assert!(msg.ends_with("CAPTCHA not solved: timeout"));
    }
}
