use std::sync::Arc;

use anyhow::{Context, Result};
use fxlab_contracts::payload::{
    caption_payload, trpc_json_string, GeneratedCandidate, GenerationRequest, GenerationResponse,
    ReferenceRole, Tool,
};
use fxlab_contracts::{Credentials, SessionId};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, AUTHORIZATION, CONTENT_TYPE,
    COOKIE, ORIGIN, REFERER, USER_AGENT,
};
use serde_json::Value;

use crate::config::ServiceConfig;
use crate::error::{truncate_text, FailureKind};

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36";
const BROWSER_ORIGIN: &str = "https://labs.google";
const FINGERPRINT_HEADERS: [(&str, &str); 6] = [
    (
        "sec-ch-ua",
        "\"Google Chrome\";v=\"119\", \"Chromium\";v=\"119\", \"Not?A_Brand\";v=\"24\"",
    ),
    ("sec-ch-ua-mobile", "?0"),
    ("sec-ch-ua-platform", "\"Windows\""),
    ("sec-fetch-dest", "empty"),
    ("sec-fetch-mode", "cors"),
    ("sec-fetch-site", "same-origin"),
];

/// Blocking client for the caption, storyboard and generation endpoints.
///
/// Every call returns `Result<_, FailureKind>`; choosing a fallback is left to
/// the caller.
#[derive(Clone)]
pub struct RemoteClient {
    http: HttpClient,
    config: ServiceConfig,
    credentials: Arc<Credentials>,
}

impl RemoteClient {
    pub fn new(config: ServiceConfig, credentials: Arc<Credentials>) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            config,
            credentials,
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Derives a caption for one reference image (`imageBase64` is the data URI).
    pub fn caption(
        &self,
        role: ReferenceRole,
        image_base64: &str,
        session: &SessionId,
    ) -> Result<String, FailureKind> {
        let payload = caption_payload(role, image_base64, session);
        let body = self.post_json(&self.config.caption_endpoint(), Tool::Backbone, &payload)?;
        trpc_json_string(&body).ok_or_else(|| {
            FailureKind::UnexpectedShape(format!(
                "generateCaption for {} has no result.data.json string",
                role.category()
            ))
        })
    }

    pub fn storyboard(&self, payload: &Value) -> Result<String, FailureKind> {
        let body = self.post_json(&self.config.storyboard_endpoint(), Tool::Backbone, payload)?;
        trpc_json_string(&body).ok_or_else(|| {
            FailureKind::UnexpectedShape(
                "generateStoryBoardPrompt has no result.data.json string".to_string(),
            )
        })
    }

    /// Candidates of the first image panel, in service order. An empty list is a failure.
    pub fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<Vec<GeneratedCandidate>, FailureKind> {
        let body = self.post_json(
            &self.config.generation_endpoint(),
            request.tool,
            &request.to_payload(),
        )?;
        if body.get("imagePanels").is_none() {
            return Err(FailureKind::UnexpectedShape(
                "runImageFx response has no imagePanels".to_string(),
            ));
        }
        let response: GenerationResponse = serde_json::from_value(body).map_err(|err| {
            FailureKind::UnexpectedShape(format!("runImageFx response: {err}"))
        })?;
        let candidates = response.into_candidates();
        if candidates.is_empty() {
            return Err(FailureKind::UnexpectedShape(
                "runImageFx returned no images".to_string(),
            ));
        }
        Ok(candidates)
    }

    fn post_json(&self, endpoint: &str, tool: Tool, payload: &Value) -> Result<Value, FailureKind> {
        log::debug!("POST {endpoint}");
        let response = self
            .http
            .post(endpoint)
            .headers(self.headers(tool)?)
            .json(payload)
            .send()?;
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(FailureKind::Status {
                status: status.as_u16(),
                body: truncate_text(&body, 512),
            });
        }
        serde_json::from_str(&body)
            .map_err(|err| FailureKind::UnexpectedShape(format!("invalid JSON from {endpoint}: {err}")))
    }

    fn headers(&self, tool: Tool) -> Result<HeaderMap, FailureKind> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("zh-CN,zh;q=0.9,en;q=0.8"),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ORIGIN, HeaderValue::from_static(BROWSER_ORIGIN));
        headers.insert(REFERER, HeaderValue::from_static(tool.referer()));
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        for (name, value) in FINGERPRINT_HEADERS {
            headers.insert(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            );
        }
        headers.insert(
            AUTHORIZATION,
            header_value(&self.credentials.bearer(), "authorization")?,
        );
        if let Some(cookies) = self.credentials.cookie_header() {
            headers.insert(COOKIE, header_value(&cookies, "cookie")?);
        }
        Ok(headers)
    }
}

fn header_value(raw: &str, name: &str) -> Result<HeaderValue, FailureKind> {
    let mut value = HeaderValue::from_str(raw).map_err(|_| {
        FailureKind::Transport(format!("{name} header contains characters HTTP cannot carry"))
    })?;
    value.set_sensitive(true);
    Ok(value)
}
