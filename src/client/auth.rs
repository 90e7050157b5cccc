use async_trait::async_trait;

use crate::error::{Error, Result};

/// Source of the bearer token sent with every request.
///
/// The key-derivation login flow lives outside this crate; anything that can
/// produce a token (a static string, a refreshing session, a secrets vault)
/// plugs in here.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// A fixed persistent token, the common case.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        StaticToken(token.into())
    }
}

#[async_trait]
impl AccessTokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String> {
        if self.0.is_empty() {
            return Err(Error::Auth("access token is empty".to_string()));
        }
        Ok(self.0.clone())
    }
}
