//! 表单提交服务 - 业务能力层
//!
//! 组装表单字段、提交，并按响应特征判断是否成功

use std::sync::Arc;

use chrono::{DateTime, Local};
use tracing::debug;
use url::Url;

use crate::error::{Stage, StageError};
use crate::infrastructure::{HttpTransport, RequestBody, RequestOptions};

/// 表单 `tar` 字段的时间格式
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 提交成功页面 / 确认语句（小写匹配）
pub const SUCCESS_MARKERS: [&str; 3] = ["ihbarsonrasi.html", "teşekkür", "ihbarınız alınmıştır"];

/// 举报主题（ihbar）
const REPORT_SUBJECT: &str = "7";
/// 违法类别（suc）
const OFFENCE_CATEGORY: &str = "2";
/// 身份字段全部留空提交
const IDENTITY_FIELDS: [&str; 5] = ["ad", "soyad", "tckimlik", "email", "tel"];

pub fn format_timestamp(at: &DateTime<Local>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// 提交成功判断
pub trait SuccessPredicate: Send + Sync {
    fn is_success(&self, status: u16, body: &str) -> bool;
}

/// 默认判断：302，或响应体（小写后）包含任一成功特征
#[derive(Debug, Clone)]
pub struct MarkerPredicate {
    markers: Vec<String>,
}

impl MarkerPredicate {
    pub fn new(markers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            markers: markers.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for MarkerPredicate {
    fn default() -> Self {
        Self::new(SUCCESS_MARKERS)
    }
}

impl SuccessPredicate for MarkerPredicate {
    fn is_success(&self, status: u16, body: &str) -> bool {
        if status == 302 {
            return true;
        }
        let body = body.to_lowercase();
        self.markers.iter().any(|marker| body.contains(marker.as_str()))
    }
}

/// 一次举报的可变内容
#[derive(Debug, Clone, Copy)]
pub struct ReportFields<'a> {
    pub target: &'a str,
    pub description: &'a str,
    pub timestamp: &'a str,
    pub security_code: &'a str,
}

impl ReportFields<'_> {
    /// 按站点要求的顺序生成表单字段
    pub fn to_form(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("ihbar".to_string(), REPORT_SUBJECT.to_string()),
            ("adres".to_string(), self.target.to_string()),
            ("detay".to_string(), self.description.to_string()),
            ("tar".to_string(), self.timestamp.to_string()),
            ("suc".to_string(), OFFENCE_CATEGORY.to_string()),
        ];
        fields.extend(IDENTITY_FIELDS.iter().map(|name| (name.to_string(), String::new())));
        fields.push(("security_code".to_string(), self.security_code.to_string()));
        fields
    }
}

/// 表单提交服务
#[derive(Clone)]
pub struct FormSubmitter {
    form_url: Url,
    predicate: Arc<dyn SuccessPredicate>,
}

impl FormSubmitter {
    pub fn new(form_url: Url) -> Self {
        Self {
            form_url,
            predicate: Arc::new(MarkerPredicate::default()),
        }
    }

    /// 替换成功判断（目标站点改版时使用）
    pub fn with_predicate(mut self, predicate: Arc<dyn SuccessPredicate>) -> Self {
        self.predicate = predicate;
        self
    }

    /// 表单所在的 origin，例如 `https://www.ihbarweb.org.tr`
    pub fn origin(&self) -> String {
        self.form_url.origin().ascii_serialization()
    }

    /// 提交表单，不跟随重定向
    pub async fn submit(
        &self,
        transport: &dyn HttpTransport,
        user_agent: &str,
        fields: &ReportFields<'_>,
    ) -> Result<(), StageError> {
        let options = RequestOptions::new()
            .header("User-Agent", user_agent)
            .header("Origin", self.origin())
            .header("Referer", self.form_url.as_str())
            .no_redirects();

        let body = RequestBody::Form(fields.to_form());
        let response = transport
            .post(self.form_url.as_str(), &body, &options)
            .await
            .map_err(|e| StageError::network(Stage::Submit, &e))?;

        debug!("提交响应状态码: {}", response.status);

        if self.predicate.is_success(response.status, &response.text()) {
            Ok(())
        } else {
            Err(StageError::SubmissionAmbiguous {
                status: response.status,
            })
        }
    }
}

impl std::fmt::Debug for FormSubmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormSubmitter")
            .field("form_url", &self.form_url.as_str())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_redirect_is_success_regardless_of_body() {
        let predicate = MarkerPredicate::default();
        assert!(predicate.is_success(302, ""));
        assert!(predicate.is_success(302, "<html>Hata: güvenlik kodu yanlış</html>"));
    }

    #[test]
    fn test_success_markers() {
        let predicate = MarkerPredicate::default();
        assert!(predicate.is_success(200, r#"<a href="ihbarsonrasi.html">devam</a>"#));
        assert!(predicate.is_success(200, "<p>Teşekkür ederiz</p>"));
        assert!(predicate.is_success(200, "<p>ihbarınız alınmıştır.</p>"));
    }

    #[test]
    fn test_ambiguous_body_is_failure() {
        let predicate = MarkerPredicate::default();
        assert!(!predicate.is_success(200, "<form><img id=\"captcha\"></form>"));
        assert!(!predicate.is_success(200, ""));
        assert!(!predicate.is_success(500, "ihbar"));
    }

    #[test]
    fn test_form_fields() {
        let fields = ReportFields {
            target: "phish.example",
            description: "Phishing domain report: phish.example",
            timestamp: "2026-10-18 09:05:03",
            security_code: "AB12CD",
        }
        .to_form();

        let get = |name: &str| {
            fields
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("ihbar"), Some("7"));
        assert_eq!(get("adres"), Some("phish.example"));
        assert_eq!(get("tar"), Some("2026-10-18 09:05:03"));
        assert_eq!(get("suc"), Some("2"));
        assert_eq!(get("security_code"), Some("AB12CD"));
        for name in IDENTITY_FIELDS {
            assert_eq!(get(name), Some(""));
        }
        assert_eq!(fields.len(), 11);
    }

    #[test]
    fn test_timestamp_format() {
        let at = Local.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(format_timestamp(&at), "2026-01-02 03:04:05");
    }

    #[test]
    fn test_origin() {
        let submitter =
            FormSubmitter::new(Url::parse("https://www.ihbarweb.org.tr/ihbar.php?subject=7").unwrap());
        assert_eq!(submitter.origin(), "https://www.ihbarweb.org.tr");
    }
}
