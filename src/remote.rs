//! Blocking JSON client shared by the prediction and persistence services.
//!
//! Calls are at-most-once: no retry, no backoff. A timeout is only applied
//! when one is configured; otherwise a slow service stalls the caller, which
//! in turn throttles every device through the transport's reply discipline.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Outcome of a failed remote call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServiceError {
    /// Connection, DNS, I/O or timeout failure.
    Transport(String),
    /// The service answered with a non-success status code.
    Status(u16),
    /// The response body did not have the expected shape.
    Decode(String),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::Transport(reason) => write!(f, "transport error: {}", reason),
            ServiceError::Status(code) => write!(f, "unexpected status {}", code),
            ServiceError::Decode(reason) => write!(f, "malformed response: {}", reason),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<ureq::Error> for ServiceError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(code, _) => ServiceError::Status(code),
            ureq::Error::Transport(transport) => ServiceError::Transport(transport.to_string()),
        }
    }
}

/// A fixed service URL plus the agent used to reach it.
#[derive(Clone, Debug)]
pub struct RemoteEndpoint {
    url: String,
    agent: ureq::Agent,
}

impl RemoteEndpoint {
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> Self {
        let mut builder = ureq::AgentBuilder::new();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Self {
            url: url.into(),
            agent: builder.build(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST `body` and decode the JSON response.
    pub fn post_json<B: Serialize, T: DeserializeOwned>(&self, body: &B) -> Result<T, ServiceError> {
        let response = self.agent.post(&self.url).send_json(body)?;
        response
            .into_json::<T>()
            .map_err(|e| ServiceError::Decode(e.to_string()))
    }

    /// POST `body` and ignore whatever the service sends back.
    pub fn post_json_discard<B: Serialize>(&self, body: &B) -> Result<(), ServiceError> {
        self.agent.post(&self.url).send_json(body)?;
        Ok(())
    }
}
