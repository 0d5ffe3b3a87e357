use std::time::Duration;

use crate::foundation::error::{ReelError, ReelResult};

pub mod forms;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Body of a POST to the access endpoint, discriminated by `action`.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum AccessRequest {
    Login {
        code: String,
    },
    Generate {
        creator_code: String,
        new_name: String,
        new_details: String,
    },
}

/// The authenticated visitor.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct UserData {
    pub user_name: String,
    /// Free-form notes stored with the code; shape is up to whoever issued it.
    #[serde(default)]
    pub details: serde_json::Value,
    /// The visitor's own code; also authorizes invite generation.
    pub access_code: String,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LoginResponse {
    pub success: bool,
    pub data: Option<UserData>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GenerateResponse {
    pub success: bool,
    pub new_code: Option<String>,
    pub error: Option<String>,
}

/// The remote auth/invite endpoint.
///
/// `Err` means the call itself failed (unreachable, unparsable body); a reachable endpoint that
/// refuses answers `Ok` with `success: false`.
pub trait AccessApi {
    fn login(&self, code: &str) -> ReelResult<LoginResponse>;

    fn generate(
        &self,
        creator_code: &str,
        new_name: &str,
        new_details: &str,
    ) -> ReelResult<GenerateResponse>;
}

/// [`AccessApi`] over HTTP: one JSON POST per call, no retries.
#[derive(Clone, Debug)]
pub struct HttpAccessApi {
    url: String,
    client: reqwest::blocking::Client,
}

impl HttpAccessApi {
    pub fn new(url: impl Into<String>) -> ReelResult<Self> {
        Self::with_timeout(url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> ReelResult<Self> {
        let url = url.into();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ReelError::validation(format!(
                "access endpoint '{url}' must be an http(s) url"
            )));
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ReelError::access(format!("failed to build http client: {e}")))?;
        Ok(Self { url, client })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn post<T: serde::de::DeserializeOwned>(&self, body: &AccessRequest) -> ReelResult<T> {
        // Status codes are not checked: the endpoint reports refusals in the JSON body.
        let resp = self
            .client
            .post(&self.url)
            .json(body)
            .send()
            .map_err(|e| ReelError::access(format!("POST '{}' failed: {e}", self.url)))?;
        let status = resp.status();
        let bytes = resp
            .bytes()
            .map_err(|e| ReelError::access(format!("POST '{}' body read failed: {e}", self.url)))?;
        serde_json::from_slice(&bytes).map_err(|e| {
            ReelError::access(format!(
                "POST '{}' returned unparsable body (status {status}): {e}",
                self.url
            ))
        })
    }
}

impl AccessApi for HttpAccessApi {
    #[tracing::instrument(skip(self, code), fields(url = %self.url))]
    fn login(&self, code: &str) -> ReelResult<LoginResponse> {
        let resp: LoginResponse = self.post(&AccessRequest::Login {
            code: code.to_string(),
        })?;
        tracing::info!(success = resp.success, "login answered");
        Ok(resp)
    }

    #[tracing::instrument(skip(self, creator_code, new_details), fields(url = %self.url))]
    fn generate(
        &self,
        creator_code: &str,
        new_name: &str,
        new_details: &str,
    ) -> ReelResult<GenerateResponse> {
        let resp: GenerateResponse = self.post(&AccessRequest::Generate {
            creator_code: creator_code.to_string(),
            new_name: new_name.to_string(),
            new_details: new_details.to_string(),
        })?;
        tracing::info!(success = resp.success, "invite generation answered");
        Ok(resp)
    }
}
