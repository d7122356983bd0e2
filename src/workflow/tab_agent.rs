//! 标签页代理 - 流程层
//!
//! 核心职责：定义"一个标签页"的完整处理流程
//!
//! 流程顺序：
//! 1. 从 URL 片段取回标识符
//! 2. 文章页 → 点击表单链接
//! 3. 等待表单 → 按标签文字填写 → 提交
//! 4. 判断成功提示 / 验证码
//! 5. 发送唯一一次 fillDone（成功时再请求关闭标签页）

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chromiumoxide::Page;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::infrastructure::JsExecutor;
use crate::models::{AgentOutcome, AgentSignal, OrchestratorInput, Profile, TabHandle};
use crate::services::identifier_from_url;

const FORM_SELECTORS: &str = "form#new_request, form.request-form";

/// 待填写的表单字段
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormField {
    pub label: &'static str,
    pub value: String,
    /// 标签文字是否需要完全匹配
    pub exact: bool,
}

/// 标签页代理
///
/// - 每个标签页运行一次
/// - 不持有任何批量状态
/// - 无论结果如何都只发一次 fillDone
pub struct TabAgent {
    profile: Profile,
    form_wait: Duration,
    outcome_wait: Duration,
    poll_interval: Duration,
}

impl TabAgent {
    /// 创建新的标签页代理
    pub fn new(profile: Profile, config: &Config) -> Self {
        Self {
            profile,
            form_wait: Duration::from_millis(config.form_wait_timeout_ms),
            outcome_wait: Duration::from_millis(config.outcome_timeout_ms),
            poll_interval: Duration::from_millis(200),
        }
    }

    /// 在一个标签页上运行代理，结束时向编排器发信号
    pub async fn run(
        self: Arc<Self>,
        page: Page,
        tab: TabHandle,
        signals: UnboundedSender<OrchestratorInput>,
    ) {
        let executor = JsExecutor::new(page);

        let outcome = match self.drive(&executor, &tab).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("[{}] ⚠️ 代理执行出错: {}", tab, e);
                AgentOutcome::Unknown
            }
        };
        info!("[{}] 代理结束: {:?}", tab, outcome);

        let mut outgoing = vec![AgentSignal::FillDone { outcome }];
        if outcome == AgentOutcome::Submitted {
            outgoing.push(AgentSignal::CloseTab);
        }
        for signal in outgoing {
            let input = OrchestratorInput::Agent {
                tab: Some(tab.clone()),
                signal,
            };
            if signals.send(input).is_err() {
                debug!("[{}] 编排器已退出，信号丢弃", tab);
                break;
            }
        }
    }

    async fn drive(&self, executor: &JsExecutor, tab: &TabHandle) -> Result<AgentOutcome> {
        let url = executor.url().await?.unwrap_or_default();
        let Some(identifier) = identifier_from_url(&url) else {
            warn!("[{}] ⚠️ URL 中没有标识符: {}", tab, url);
            return Ok(AgentOutcome::Unknown);
        };
        info!("[{}] 开始处理: {}", tab, identifier);

        if !self.profile.is_complete() {
            warn!("[{}] ⚠️ 用户资料不完整，跳过填写", tab);
            return Ok(AgentOutcome::MissingDetails);
        }

        let role: String = executor.eval_as(detect_role_js()).await?;
        debug!("[{}] 页面角色: {}", tab, role);

        if role == "article" {
            let clicked: bool = executor.eval_as(click_form_link_js()).await?;
            if !clicked {
                warn!("[{}] ⚠️ 文章页中没有找到表单链接", tab);
                return Ok(AgentOutcome::FormNotFound);
            }
        }

        if !self.wait_for_form(executor).await {
            warn!("[{}] ⚠️ 等待表单超时", tab);
            return Ok(AgentOutcome::FormNotFound);
        }

        let fields = form_fields(&self.profile, &identifier);
        let filled: usize = executor.eval_as(fill_form_js(&fields)?).await?;
        info!("[{}] 已填写 {}/{} 个字段", tab, filled, fields.len());

        let submitted: bool = executor.eval_as(submit_form_js()).await?;
        if !submitted {
            return Ok(AgentOutcome::FormNotFound);
        }
        info!("[{}] 📤 表单已提交", tab);

        Ok(self.wait_for_outcome(executor).await)
    }

    /// 轮询直到表单出现；导航期间的执行错误视为"尚未出现"
    async fn wait_for_form(&self, executor: &JsExecutor) -> bool {
        let deadline = Instant::now() + self.form_wait;
        loop {
            if let Ok(true) = executor.eval_as::<bool>(form_present_js()).await {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(self.poll_interval).await;
        }
    }

    async fn wait_for_outcome(&self, executor: &JsExecutor) -> AgentOutcome {
        let deadline = Instant::now() + self.outcome_wait;
        loop {
            if let Ok(marker) = executor.eval_as::<String>(detect_outcome_js()).await {
                if let Some(outcome) = outcome_from_marker(&marker) {
                    return outcome;
                }
            }
            if Instant::now() >= deadline {
                return AgentOutcome::Unknown;
            }
            sleep(self.poll_interval).await;
        }
    }
}

/// 由资料和标识符生成表单字段
pub fn form_fields(profile: &Profile, identifier: &str) -> Vec<FormField> {
    vec![
        FormField {
            label: "Username",
            value: profile.username.trim().to_string(),
            exact: true,
        },
        FormField {
            label: "Email",
            value: profile.email.trim().to_string(),
            exact: true,
        },
        FormField {
            label: "Mobile Number",
            value: profile.mobile.trim().to_string(),
            exact: true,
        },
        FormField {
            label: "Friend's Username",
            value: identifier.to_string(),
            exact: false,
        },
    ]
}

/// 页面脚本返回的标记 → 结果；`pending` 表示继续等待
pub fn outcome_from_marker(marker: &str) -> Option<AgentOutcome> {
    match marker {
        "success" => Some(AgentOutcome::Submitted),
        "captcha" => Some(AgentOutcome::Captcha),
        _ => None,
    }
}

// ========== 页面脚本 ==========

fn detect_role_js() -> String {
    format!(
        r#"
        (() => {{
            if (document.querySelector({sel})) return 'form';
            if (window.location.pathname.indexOf('/articles/') !== -1) return 'article';
            return 'unknown';
        }})()
        "#,
        sel = js_str(FORM_SELECTORS)
    )
}

fn click_form_link_js() -> &'static str {
    r#"
    (() => {
        const links = Array.from(document.querySelectorAll('a[href*="/requests/new"]'));
        const byText = links.find((a) => /this\s+form/i.test((a.textContent || '').trim()));
        const main = document.querySelector('main');
        const inMain = main ? links.find((a) => main.contains(a)) : null;
        const link = byText || inMain || links[0];
        if (!link) return false;
        link.click();
        return true;
    })()
    "#
}

fn form_present_js() -> String {
    format!("!!document.querySelector({})", js_str(FORM_SELECTORS))
}

fn fill_form_js(fields: &[FormField]) -> Result<String> {
    Ok(format!(
        r#"
        ((fields) => {{
            const form = document.querySelector({sel});
            if (!form) return 0;
            const visible = (el) => {{
                if (!el) return false;
                const style = window.getComputedStyle(el);
                if (style.display === 'none' || style.visibility === 'hidden') return false;
                const parent = el.closest && el.closest('.form-field');
                return !(parent && window.getComputedStyle(parent).display === 'none');
            }};
            const inputFor = (labelText, exact) => {{
                for (const label of form.querySelectorAll('label')) {{
                    const text = (label.textContent || '').trim();
                    const hit = exact ? text === labelText : text.indexOf(labelText) !== -1;
                    if (!hit || !visible(label)) continue;
                    const forId = label.getAttribute('for');
                    if (forId) {{
                        const input = document.getElementById(forId);
                        if (input && input.type === 'text' && visible(input)) return input;
                    }}
                    const field = label.closest('.form-field');
                    if (field && visible(field)) {{
                        const input = field.querySelector('input[type="text"]');
                        if (input && visible(input)) return input;
                    }}
                    return null;
                }}
                return null;
            }};
            let filled = 0;
            for (const f of fields) {{
                const input = inputFor(f.label, f.exact);
                if (!input) continue;
                input.scrollIntoView({{ block: 'nearest' }});
                input.focus();
                input.value = f.value;
                input.dispatchEvent(new Event('input', {{ bubbles: true }}));
                input.dispatchEvent(new Event('change', {{ bubbles: true }}));
                filled += 1;
            }}
            return filled;
        }})({fields})
        "#,
        sel = js_str(FORM_SELECTORS),
        fields = serde_json::to_string(fields)?
    ))
}

fn submit_form_js() -> String {
    format!(
        r#"
        (() => {{
            const form = document.querySelector({sel});
            if (!form) return false;
            const button = form.querySelector('[type="submit"]');
            if (button) {{
                button.click();
            }} else if (form.requestSubmit) {{
                form.requestSubmit();
            }} else {{
                form.submit();
            }}
            return true;
        }})()
        "#,
        sel = js_str(FORM_SELECTORS)
    )
}

fn detect_outcome_js() -> &'static str {
    r#"
    (() => {
        const captcha = document.querySelector(
            'iframe[src*="recaptcha"], iframe[src*="hcaptcha"], .g-recaptcha, .h-captcha, #captcha'
        );
        if (captcha) return 'captcha';
        const notice = document.querySelector('.notification-notice, .notification-success, .alert-success');
        if (notice && (notice.textContent || '').trim()) return 'success';
        const path = window.location.pathname;
        if (path.indexOf('/requests/') !== -1 && path.indexOf('/requests/new') === -1) return 'success';
        return 'pending';
    })()
    "#
}

/// 把 Rust 字符串转成 JS 字符串字面量
fn js_str(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_fields_use_profile_and_identifier() {
        let profile = Profile {
            username: " me ".to_string(),
            email: "me@example.com".to_string(),
            mobile: "5551234567".to_string(),
        };
        let fields = form_fields(&profile, "alice");
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[0].value, "me");
        assert_eq!(fields[3].label, "Friend's Username");
        assert_eq!(fields[3].value, "alice");
        assert!(!fields[3].exact);
        assert!(fields[..3].iter().all(|f| f.exact));
    }

    #[test]
    fn test_outcome_from_marker() {
        assert_eq!(outcome_from_marker("success"), Some(AgentOutcome::Submitted));
        assert_eq!(outcome_from_marker("captcha"), Some(AgentOutcome::Captcha));
        assert_eq!(outcome_from_marker("pending"), None);
    }

    #[test]
    fn test_fill_script_embeds_fields_as_json() {
        let profile = Profile {
            username: "me".to_string(),
            email: "me@example.com".to_string(),
            mobile: "5551234567".to_string(),
        };
        let js = fill_form_js(&form_fields(&profile, "o'brien\"x")).unwrap();
        assert!(js.contains(r#""label":"Friend's Username""#));
        assert!(js.contains(r#""value":"o'brien\"x""#));
        assert!(js.contains(r#""form#new_request, form.request-form""#));
    }
}
