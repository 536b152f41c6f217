// src/form.rs
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::FormConfig;
use crate::engine::ColorSink;
use crate::types::Sample;

/// W3C WebDriver key code for the Control modifier.
const KEY_CONTROL: char = '\u{E009}';
/// Releases every held modifier.
const KEY_NULL: char = '\u{E000}';
const KEY_RETURN: char = '\u{E006}';

const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// How often the settle wait looks at the shutdown flag.
const SETTLE_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum FormError {
    #[error("request to {endpoint} failed: {source}")]
    Http {
        endpoint: String,
        #[source]
        source: Box<ureq::Error>,
    },
    #[error("webdriver error {error:?}: {message}")]
    Command { error: String, message: String },
    #[error("unexpected webdriver response: {0}")]
    Protocol(String),
    #[error("invalid webdriver response body: {0}")]
    Body(#[from] std::io::Error),
    #[error("interrupted while opening the form")]
    Interrupted,
}

/// Writes text into the form field bound to a logical channel.
pub trait FieldWriter {
    /// Clears field `channel`, types `text`, then confirms the entry.
    fn write_field(&mut self, channel: usize, text: &str) -> Result<(), FormError>;
}

/// Feeds each sample into the three colour inputs, red first.
pub struct FormPopulator<W: FieldWriter> {
    writer: W,
}

impl<W: FieldWriter> FormPopulator<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: FieldWriter> ColorSink for FormPopulator<W> {
    fn publish(&mut self, sample: &Sample) -> Result<()> {
        for (channel, value) in sample.color.to_rgb8().into_iter().enumerate() {
            self.writer
                .write_field(channel, &value.to_string())
                .with_context(|| format!("failed to fill form field for channel {channel}"))?;
        }
        Ok(())
    }
}

pub fn field_xpath(template: &str, channel: usize) -> String {
    template.replace("{index}", &(channel + 1).to_string())
}

fn select_all_keys() -> String {
    [KEY_CONTROL, 'a', KEY_NULL].iter().collect()
}

fn command_error(body: &Value) -> FormError {
    let value = body.get("value").unwrap_or(body);
    let text = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    FormError::Command {
        error: text("error"),
        message: text("message"),
    }
}

fn session_id(value: &Value) -> Result<String, FormError> {
    value
        .get("sessionId")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| FormError::Protocol(format!("no sessionId in {value}")))
}

fn element_reference(value: &Value) -> Result<String, FormError> {
    value
        .get(ELEMENT_KEY)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| FormError::Protocol(format!("no element reference in {value}")))
}

/// Drives a browser through a WebDriver server (chromedriver, geckodriver).
///
/// The session is opened on [`connect`](Self::connect) and deleted on drop.
pub struct WebDriverFieldWriter {
    agent: ureq::Agent,
    base_url: String,
    session_id: String,
    field_xpath: String,
}

impl WebDriverFieldWriter {
    /// Opens a session and loads the form page.
    ///
    /// `shutdown` is checked between commands and during the settle wait;
    /// once it is set the session is closed and [`FormError::Interrupted`]
    /// is returned.
    pub fn connect(config: &FormConfig, shutdown: &AtomicBool) -> Result<Self, FormError> {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build();
        let base_url = config.webdriver_url.trim_end_matches('/').to_string();
        let capabilities = json!({
            "capabilities": { "alwaysMatch": { "browserName": config.browser } }
        });
        let session = post(&agent, &format!("{base_url}/session"), capabilities)?;
        let writer = Self {
            agent,
            base_url,
            session_id: session_id(&session)?,
            field_xpath: config.field_xpath.clone(),
        };
        log::info!("webdriver session {} opened", writer.session_id);

        check_shutdown(shutdown)?;
        writer.post("timeouts", json!({ "implicit": config.implicit_wait_ms }))?;
        check_shutdown(shutdown)?;
        writer.post("url", json!({ "url": config.page_url }))?;
        log::info!(
            "loaded {}, waiting {} ms for the page to settle",
            config.page_url,
            config.settle_ms
        );
        settle(Duration::from_millis(config.settle_ms), shutdown)?;
        Ok(writer)
    }

    fn post(&self, command: &str, body: Value) -> Result<Value, FormError> {
        let url = format!("{}/session/{}/{}", self.base_url, self.session_id, command);
        post(&self.agent, &url, body)
    }

    fn find_field(&self, channel: usize) -> Result<String, FormError> {
        let xpath = field_xpath(&self.field_xpath, channel);
        let found = self.post("element", json!({ "using": "xpath", "value": xpath }))?;
        element_reference(&found)
    }

    fn send_keys(&self, element: &str, text: &str) -> Result<(), FormError> {
        self.post(&format!("element/{element}/value"), json!({ "text": text }))?;
        Ok(())
    }
}

impl FieldWriter for WebDriverFieldWriter {
    fn write_field(&mut self, channel: usize, text: &str) -> Result<(), FormError> {
        let element = self.find_field(channel)?;
        self.send_keys(&element, &select_all_keys())?;
        self.send_keys(&element, text)?;
        self.send_keys(&element, &KEY_RETURN.to_string())?;
        log::trace!("channel {channel} <- {text}");
        Ok(())
    }
}

impl Drop for WebDriverFieldWriter {
    fn drop(&mut self) {
        let url = format!("{}/session/{}", self.base_url, self.session_id);
        if let Err(e) = finish(&url, self.agent.delete(&url).call()) {
            log::warn!("failed to close webdriver session {}: {e}", self.session_id);
        }
    }
}

fn check_shutdown(shutdown: &AtomicBool) -> Result<(), FormError> {
    if shutdown.load(Ordering::SeqCst) {
        Err(FormError::Interrupted)
    } else {
        Ok(())
    }
}

fn settle(wait: Duration, shutdown: &AtomicBool) -> Result<(), FormError> {
    let deadline = Instant::now() + wait;
    loop {
        check_shutdown(shutdown)?;
        let now = Instant::now();
        if now >= deadline {
            return Ok(());
        }
        thread::sleep((deadline - now).min(SETTLE_POLL));
    }
}

fn post(agent: &ureq::Agent, url: &str, body: Value) -> Result<Value, FormError> {
    finish(url, agent.post(url).send_json(body))
}

/// Unwraps the `value` member every WebDriver response carries.
fn finish(url: &str, result: Result<ureq::Response, ureq::Error>) -> Result<Value, FormError> {
    match result {
        Ok(response) => {
            let mut body: Value = response.into_json()?;
            Ok(body.get_mut("value").map(Value::take).unwrap_or(Value::Null))
        }
        Err(ureq::Error::Status(_, response)) => {
            let body: Value = response.into_json().unwrap_or(Value::Null);
            Err(command_error(&body))
        }
        Err(e) => Err(FormError::Http {
            endpoint: url.to_string(),
            source: Box::new(e),
        }),
    }
}
