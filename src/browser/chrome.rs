//! Chrome DevTools Protocol engine
//!
//! Locators are evaluated in the page by a small script so every query sees
//! the live DOM; clicks are dispatched as real mouse input at the element
//! centre. Each page lives in its own browser context.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{BrowserContextId, CloseParams};
use chromiumoxide::cdp::browser_protocol::network::{
    EventRequestWillBeSent, EventResponseReceived, RequestId,
};
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::layout::Point;
use chromiumoxide::page::ScreenshotParams;
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::{BrowserEngine, Locator, ObservedResponse, Page, ResponseMatcher, ResponseWatch};
use crate::common::config::BrowserSettings;
use crate::common::{Error, Result};

/// In-page helpers shared by every query script
const DOM_HELPERS: &str = r#"
const __text = (el) => ((el.innerText || el.textContent || '') + '').trim();
const __visible = (el) => {
  if (!el || !el.isConnected) return false;
  const style = getComputedStyle(el);
  if (style.visibility === 'hidden' || style.display === 'none') return false;
  const rect = el.getBoundingClientRect();
  return rect.width > 0 && rect.height > 0;
};
const __implicitRoles = {
  button: 'button, input[type=button], input[type=submit], input[type=reset]',
  link: 'a[href]',
  heading: 'h1, h2, h3, h4, h5, h6',
  textbox: 'input:not([type]), input[type=text], input[type=email], input[type=password], textarea',
  option: 'option',
  listitem: 'li',
};
const __accessibleName = (el) => {
  const labelled = el.getAttribute('aria-labelledby');
  if (labelled) {
    const names = labelled.split(/\s+/).map((id) => document.getElementById(id)).filter(Boolean).map(__text);
    if (names.length) return names.join(' ');
  }
  return el.getAttribute('aria-label') || __text(el) || el.getAttribute('title') || el.value || '';
};
const __find = (spec) => {
  const all = (selector) => Array.from(document.querySelectorAll(selector));
  const rx = (pattern) => new RegExp(pattern, 'i');
  switch (spec.kind) {
    case 'css':
      return all(spec.selector);
    case 'role': {
      const implicit = __implicitRoles[spec.role];
      const selector = `[role="${spec.role}"]` + (implicit ? `, ${implicit}` : '');
      const re = rx(spec.name);
      return all(selector).filter((el) => re.test(__accessibleName(el)));
    }
    case 'text': {
      const re = rx(spec.pattern);
      return all(spec.selector).filter((el) => re.test(__text(el)));
    }
    case 'loose_text': {
      const re = rx(spec.pattern);
      return all('body *').filter(
        (el) => re.test(__text(el)) && !Array.from(el.children).some((c) => re.test(__text(c)))
      );
    }
    case 'placeholder': {
      const re = rx(spec.pattern);
      return all('[placeholder]').filter((el) => re.test(el.getAttribute('placeholder')));
    }
    case 'label': {
      const re = rx(spec.pattern);
      const found = [];
      for (const label of all('label')) {
        if (!re.test(__text(label))) continue;
        const control = label.control
          || (label.htmlFor && document.getElementById(label.htmlFor))
          || label.querySelector('input, select, textarea, button');
        if (control) found.push(control);
      }
      for (const el of all('[aria-label]')) {
        if (re.test(el.getAttribute('aria-label')) && !found.includes(el)) found.push(el);
      }
      return found;
    }
    case 'test_id':
      return all(`[data-testid="${CSS.escape(spec.id)}"]`);
    default:
      return [];
  }
};
const __firstVisible = (els) => els.find(__visible) || null;
"#;

fn locator_spec(locator: &Locator) -> serde_json::Value {
    match locator {
        Locator::Css(selector) => json!({ "kind": "css", "selector": selector }),
        Locator::Role { role, name } => json!({ "kind": "role", "role": role, "name": name }),
        Locator::Text { selector, pattern } => {
            json!({ "kind": "text", "selector": selector, "pattern": pattern })
        }
        Locator::LooseText(pattern) => json!({ "kind": "loose_text", "pattern": pattern }),
        Locator::Placeholder(pattern) => json!({ "kind": "placeholder", "pattern": pattern }),
        Locator::Label(pattern) => json!({ "kind": "label", "pattern": pattern }),
        Locator::TestId(id) => json!({ "kind": "test_id", "id": id }),
    }
}

/// Wrap `body` in a script where `els` holds the matches of `locator`
fn query_script(locator: &Locator, body: &str) -> String {
    format!(
        "(() => {{ {} const els = __find({}); {} }})()",
        DOM_HELPERS,
        locator_spec(locator),
        body
    )
}

fn cdp(e: CdpError) -> Error {
    Error::Browser(e.to_string())
}

#[derive(Debug, Deserialize)]
struct Count {
    count: usize,
}

#[derive(Debug, Deserialize)]
struct Text {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Visible {
    visible: bool,
}

#[derive(Debug, Deserialize)]
struct Target {
    found: bool,
    #[serde(default)]
    x: f64,
    #[serde(default)]
    y: f64,
}

/// A Chrome instance driven over CDP
pub struct ChromeEngine {
    browser: Arc<Browser>,
    handler: JoinHandle<()>,
    project: String,
}

impl ChromeEngine {
    /// Launch Chrome with the configured window and mode
    pub async fn launch(settings: &BrowserSettings) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .window_size(settings.viewport_width, settings.viewport_height)
            .viewport(Viewport {
                width: settings.viewport_width,
                height: settings.viewport_height,
                ..Viewport::default()
            });
        if !settings.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &settings.executable {
            builder = builder.chrome_executable(executable);
        }
        let config = builder.build().map_err(Error::BrowserLaunch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| Error::BrowserLaunch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!(error = %e, "CDP handler error");
                }
            }
            tracing::debug!("CDP handler finished");
        });

        tracing::info!(
            project = %settings.project,
            headless = settings.headless,
            "Browser launched"
        );

        Ok(Self {
            browser: Arc::new(browser),
            handler,
            project: settings.project.clone(),
        })
    }
}

#[async_trait]
impl BrowserEngine for ChromeEngine {
    fn project(&self) -> &str {
        &self.project
    }

    async fn open_page(&self) -> Result<Box<dyn Page>> {
        let context = self
            .browser
            .execute(CreateBrowserContextParams::default())
            .await
            .map_err(cdp)?
            .result
            .browser_context_id;

        let open = async {
            let params = CreateTargetParams::builder()
                .url("about:blank")
                .browser_context_id(context.clone())
                .build()
                .map_err(Error::Browser)?;
            self.browser.new_page(params).await.map_err(cdp)
        };
        let dispose = async {
            if let Err(e) = self
                .browser
                .execute(DisposeBrowserContextParams::new(context.clone()))
                .await
            {
                tracing::warn!(error = %e, "Failed to dispose browser context");
            }
        };
        let page = undo_on_error(open, dispose).await?;

        tracing::debug!(context = ?context, "Opened page in new browser context");
        Ok(Box::new(ChromePage {
            page,
            browser: Arc::clone(&self.browser),
            context,
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        let closed = self.browser.execute(CloseParams::default()).await;
        self.handler.abort();
        closed.map(|_| ()).map_err(cdp)
    }
}

/// One page in its own browser context
pub struct ChromePage {
    page: chromiumoxide::Page,
    browser: Arc<Browser>,
    context: BrowserContextId,
}

impl ChromePage {
    async fn eval<T: DeserializeOwned>(&self, script: String) -> Result<T> {
        self.page
            .evaluate(script)
            .await
            .map_err(|e| Error::Script(e.to_string()))?
            .into_value()
            .map_err(|e| Error::Script(e.to_string()))
    }

    /// Scroll the first visible match into view and return its centre
    async fn target(&self, locator: &Locator) -> Result<Point> {
        let target: Target = self
            .eval(query_script(
                locator,
                "const el = __firstVisible(els);
                 if (!el) return { found: false };
                 el.scrollIntoView({ block: 'center', inline: 'center' });
                 const r = el.getBoundingClientRect();
                 return { found: true, x: r.left + r.width / 2, y: r.top + r.height / 2 };",
            ))
            .await?;
        if !target.found {
            return Err(Error::Browser(format!("no visible element for {}", locator)));
        }
        Ok(Point {
            x: target.x,
            y: target.y,
        })
    }
}

#[async_trait]
impl Page for ChromePage {
    async fn navigate(&self, url: &str) -> Result<()> {
        tracing::debug!(url, "Navigating");
        self.page.goto(url).await.map_err(cdp)?;
        Ok(())
    }

    async fn fill(&self, target: &Locator, value: &str) -> Result<()> {
        let body = format!(
            "const el = __firstVisible(els);
             if (!el) return {{ found: false }};
             el.focus();
             const proto = el instanceof HTMLTextAreaElement ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
             const setter = Object.getOwnPropertyDescriptor(proto, 'value');
             if (setter && setter.set) {{ setter.set.call(el, {value}); }} else {{ el.value = {value}; }}
             el.dispatchEvent(new Event('input', {{ bubbles: true }}));
             el.dispatchEvent(new Event('change', {{ bubbles: true }}));
             return {{ found: true }};",
            value = json!(value)
        );
        let filled: Target = self.eval(query_script(target, &body)).await?;
        if !filled.found {
            return Err(Error::Browser(format!("no visible element for {}", target)));
        }
        Ok(())
    }

    async fn click(&self, target: &Locator) -> Result<()> {
        let point = self.target(target).await?;
        self.page.click(point).await.map_err(cdp)?;
        Ok(())
    }

    async fn count(&self, target: &Locator) -> Result<usize> {
        let count: Count = self
            .eval(query_script(target, "return { count: els.length };"))
            .await?;
        Ok(count.count)
    }

    async fn text_of(&self, target: &Locator, index: usize) -> Result<Option<String>> {
        let body = format!(
            "const el = els[{}]; return {{ text: el ? __text(el) : null }};",
            index
        );
        let text: Text = self.eval(query_script(target, &body)).await?;
        Ok(text.text)
    }

    async fn is_visible(&self, target: &Locator) -> Result<bool> {
        let visible: Visible = self
            .eval(query_script(
                target,
                "return { visible: els.length > 0 && __visible(els[0]) };",
            ))
            .await?;
        Ok(visible.visible)
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        self.page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
            .map_err(cdp)
    }

    async fn watch_response(
        &self,
        matcher: ResponseMatcher,
        timeout: Duration,
    ) -> Result<ResponseWatch> {
        let mut requests = self
            .page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(cdp)?;
        let mut responses = self
            .page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(cdp)?;
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let mut methods: HashMap<RequestId, String> = HashMap::new();
            let deadline = tokio::time::sleep(timeout);
            tokio::pin!(deadline);

            let found = loop {
                tokio::select! {
                    _ = &mut deadline => break None,
                    Some(request) = requests.next() => {
                        methods.insert(request.request_id.clone(), request.request.method.clone());
                    }
                    Some(response) = responses.next() => {
                        let observed = ObservedResponse {
                            url: response.response.url.clone(),
                            method: methods.get(&response.request_id).cloned().unwrap_or_default(),
                            status: u16::try_from(response.response.status).unwrap_or(0),
                        };
                        if matcher.matches(&observed) {
                            break Some(observed);
                        }
                    }
                    else => break None,
                }
            };

            if let Some(observed) = found {
                tracing::debug!(url = %observed.url, status = observed.status, "Matched response");
                let _ = tx.send(observed);
            }
        });

        Ok(ResponseWatch::new(rx, timeout))
    }

    async fn close(&self) -> Result<()> {
        let closed = self.page.clone().close().await.map_err(cdp);
        let disposed = self
            .browser
            .execute(DisposeBrowserContextParams::new(self.context.clone()))
            .await
            .map_err(cdp);
        closed.and(disposed.map(|_| ()))
    }
}

/// Await `step`; when it fails, await `undo` before handing the error back
async fn undo_on_error<T, S, U>(step: S, undo: U) -> Result<T>
where
    S: Future<Output = Result<T>>,
    U: Future<Output = ()>,
{
    match step.await {
        Ok(value) => Ok(value),
        Err(e) => {
            undo.await;
            Err(e)
        }
    }
}
