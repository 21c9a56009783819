//! 页面获取服务 - 业务能力层
//!
//! 只负责"取表单页面和验证码图片"能力，不关心识别和提交

use scraper::{ElementRef, Html};
use tracing::debug;
use url::Url;

use crate::error::{MissingElement, Stage, StageError};
use crate::infrastructure::{HttpTransport, RequestOptions};
use crate::models::Language;

/// 表单页面解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPage {
    /// 验证码图片的绝对地址
    pub captcha_url: String,
}

/// 可访问性检查结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessibilityReport {
    pub accessible: bool,
    pub message: String,
}

/// 页面获取服务
///
/// 职责：
/// - GET 表单页面并按状态码分类
/// - 在页面中定位验证码图片并下载
/// - 不持有会话（传输由调用方传入）
#[derive(Debug, Clone)]
pub struct PageFetcher {
    form_url: Url,
    captcha_element_id: String,
}

impl PageFetcher {
    pub fn new(form_url: Url, captcha_element_id: impl Into<String>) -> Self {
        Self {
            form_url,
            captcha_element_id: captcha_element_id.into(),
        }
    }

    pub fn form_url(&self) -> &Url {
        &self.form_url
    }

    /// 表单所在站点的根地址，验证码地址相对它解析
    fn origin_url(&self) -> Url {
        let mut origin = self.form_url.clone();
        origin.set_path("/");
        origin.set_query(None);
        origin.set_fragment(None);
        origin
    }

    /// 浏览器风格的请求头
    fn page_headers(user_agent: &str) -> RequestOptions {
        RequestOptions::new()
            .header("User-Agent", user_agent)
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            )
            .header("Accept-Language", "tr,en-US;q=0.7,en;q=0.3")
            .header("Upgrade-Insecure-Requests", "1")
    }

    /// 获取表单页面 HTML，非 200 状态按阶段错误返回
    pub async fn fetch_html(
        &self,
        transport: &dyn HttpTransport,
        user_agent: &str,
    ) -> Result<String, StageError> {
        let response = transport
            .get(self.form_url.as_str(), &Self::page_headers(user_agent))
            .await
            .map_err(|e| StageError::network(Stage::FormPage, &e))?;

        debug!("表单页面状态码: {}", response.status);

        if response.status != 200 {
            return Err(StageError::HttpStatus {
                stage: Stage::FormPage,
                status: response.status,
            });
        }

        Ok(response.text())
    }

    /// 获取表单页面并定位验证码
    pub async fn fetch_form(
        &self,
        transport: &dyn HttpTransport,
        user_agent: &str,
    ) -> Result<FormPage, StageError> {
        let html = self.fetch_html(transport, user_agent).await?;
        self.parse_form_page(&html)
    }

    /// 下载验证码图片
    pub async fn fetch_captcha(
        &self,
        transport: &dyn HttpTransport,
        page: &FormPage,
        user_agent: &str,
    ) -> Result<Vec<u8>, StageError> {
        let options = RequestOptions::new()
            .header("User-Agent", user_agent)
            .header("Referer", self.form_url.as_str());

        let response = transport
            .get(&page.captcha_url, &options)
            .await
            .map_err(|e| StageError::network(Stage::CaptchaImage, &e))?;

        if response.status != 200 {
            return Err(StageError::HttpStatus {
                stage: Stage::CaptchaImage,
                status: response.status,
            });
        }

        debug!("验证码图片大小: {} 字节", response.body.len());
        Ok(response.body)
    }

    /// 只检查表单是否可访问，不识别也不提交
    pub async fn check_accessibility(
        &self,
        transport: &dyn HttpTransport,
        user_agent: &str,
        lang: Language,
    ) -> AccessibilityReport {
        let outcome = match self.fetch_html(transport, user_agent).await {
            Ok(html) => {
                if has_form(&html) {
                    Ok(())
                } else {
                    Err(StageError::SiteStructure {
                        missing: MissingElement::Form,
                    })
                }
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => AccessibilityReport {
                accessible: true,
                message: lang.accessible().to_string(),
            },
            Err(e) => AccessibilityReport {
                accessible: false,
                message: e.message(lang),
            },
        }
    }

    /// 解析页面：必须包含 form 和指定 id 的验证码图片
    pub fn parse_form_page(&self, html: &str) -> Result<FormPage, StageError> {
        let document = Html::parse_document(html);

        if elements(&document, "form").next().is_none() {
            return Err(StageError::SiteStructure {
                missing: MissingElement::Form,
            });
        }

        let captcha_missing = || StageError::SiteStructure {
            missing: MissingElement::CaptchaImage,
        };

        let src = elements(&document, "img")
            .find(|img| img.value().id() == Some(self.captcha_element_id.as_str()))
            .and_then(|img| img.value().attr("src"))
            .map(str::trim)
            .filter(|src| !src.is_empty())
            .ok_or_else(captcha_missing)?;

        let captcha_url = self.origin_url().join(src).map_err(|_| captcha_missing())?;

        Ok(FormPage {
            captcha_url: captcha_url.to_string(),
        })
    }
}

/// 按标签名遍历元素
fn elements<'a>(document: &'a Html, tag: &'a str) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(move |element| element.value().name() == tag)
}

fn has_form(html: &str) -> bool {
    let document = Html::parse_document(html);
    let found = elements(&document, "form").next().is_some();
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher() -> PageFetcher {
        PageFetcher::new(
            Url::parse("https://www.ihbarweb.org.tr/ihbar.php?subject=7").unwrap(),
            "captcha",
        )
    }

    #[test]
    fn test_captcha_src_resolved_against_origin() {
        let html = r#"<html><body><form method="post">
            <img id="logo" src="/logo.png">
            <img id="captcha" src="captcha/securimage_show.php?sid=abc">
        </form></body></html>"#;

        let page = fetcher().parse_form_page(html).unwrap();
        assert_eq!(
            page.captcha_url,
            "https://www.ihbarweb.org.tr/captcha/securimage_show.php?sid=abc"
        );
    }

    #[test]
    fn test_form_under_sub_path_resolves_against_origin() {
        let fetcher = PageFetcher::new(
            Url::parse("https://site.example/forms/ihbar.php?subject=7").unwrap(),
            "captcha",
        );
        let html = r#"<form><img id="captcha" src="captcha.php?sid=1"></form>"#;

        let page = fetcher.parse_form_page(html).unwrap();
        assert_eq!(page.captcha_url, "https://site.example/captcha.php?sid=1");
    }

    #[test]
    fn test_nested_elements_are_found() {
        let html = r#"<html><body><div><table><tr><td>
            <form><div><span><img id="captcha" src="/c.php"></span></div></form>
        </td></tr></table></div></body></html>"#;

        assert!(has_form(html));
        let page = fetcher().parse_form_page(html).unwrap();
        assert_eq!(page.captcha_url, "https://www.ihbarweb.org.tr/c.php");
    }

    #[test]
    fn test_absolute_captcha_src_kept() {
        let html = r#"<form><img id="captcha" src="https://cdn.example.net/c.png"></form>"#;
        let page = fetcher().parse_form_page(html).unwrap();
        assert_eq!(page.captcha_url, "https://cdn.example.net/c.png");
    }

    #[test]
    fn test_missing_form_is_structure_error() {
        let html = "<html><body><p>bakım çalışması</p></body></html>";
        assert_eq!(
            fetcher().parse_form_page(html).unwrap_err(),
            StageError::SiteStructure {
                missing: MissingElement::Form
            }
        );
    }

    #[test]
    fn test_missing_captcha_is_structure_error() {
        let html = r#"<form><img id="other" src="x.png"><img id="captcha"></form>"#;
        assert_eq!(
            fetcher().parse_form_page(html).unwrap_err(),
            StageError::SiteStructure {
                missing: MissingElement::CaptchaImage
            }
        );
    }
}
