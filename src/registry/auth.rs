use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Credentials supplied by an API client for one registry operation
#[derive(Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
    pub auth: String,
    #[serde(rename = "identitytoken")]
    pub identity_token: String,
    #[serde(rename = "registrytoken")]
    pub registry_token: String,
    #[serde(rename = "serveraddress")]
    pub server_address: String,
}

impl AuthConfig {
    pub fn new(username: &str, password: &str) -> Self {
        AuthConfig {
            username: username.to_owned(),
            password: password.to_owned(),
            ..AuthConfig::default()
        }
    }

    /// Both a username and a password are present
    pub fn has_basic_credentials(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }

    /// Attach basic auth to a request, if we have complete credentials
    pub fn include_basic_auth(&self, req: RequestBuilder) -> RequestBuilder {
        if self.has_basic_credentials() {
            log::debug!("using basic auth for {:?}", self.username);
            req.basic_auth(&self.username, Some(&self.password))
        } else {
            req
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("username", &self.username)
            .field("server_address", &self.server_address)
            .finish()
    }
}
