//! Versioning-token lifecycle.
//!
//! Every mutation of an IP set must carry a token issued by the service. The
//! two firewall generations hand them out differently:
//! - **Pull** (waf, waf-regional): a dedicated `get-change-token` call before
//!   each mutation attempt. Nothing is cached.
//! - **Piggyback** (wafv2): the `LockToken` of the latest `get-ip-set`
//!   response, or the `NextLockToken` of the latest successful update.
//!
//! Tokens are single use: [`TokenManager::fetch`] hands a piggybacked token out
//! once and forgets it.

use std::fmt;
use tracing::debug;

use crate::error::{WafError, WafResult};
use crate::waf::{IpSetFilter, WafApi};

/// Opaque token authorizing one mutation
#[derive(Clone, PartialEq, Eq)]
pub struct VersionToken(String);

impl VersionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VersionToken({})", self.0)
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenMode {
    Pull,
    Piggyback,
}

#[derive(Debug)]
pub struct TokenManager {
    mode: TokenMode,
    last_observed: Option<VersionToken>,
}

impl TokenManager {
    pub fn new(mode: TokenMode) -> Self {
        Self {
            mode,
            last_observed: None,
        }
    }

    /// Record the token carried by a list or update response.
    ///
    /// Only piggyback mode keeps it. An absent token clears the previous one,
    /// since any response supersedes it.
    pub fn observe(&mut self, token: Option<String>) {
        if self.mode == TokenMode::Piggyback {
            self.last_observed = token.filter(|t| !t.is_empty()).map(VersionToken::new);
        }
    }

    /// Forget the current token (after a failed mutation attempt)
    pub fn invalidate(&mut self) {
        self.last_observed = None;
    }

    /// Whether a piggybacked token is available without another list call
    pub fn has_token(&self) -> bool {
        self.last_observed.is_some()
    }

    /// Obtain the token for the next mutation attempt
    pub async fn fetch<A: WafApi + ?Sized>(
        &mut self,
        api: &A,
        filter: &IpSetFilter,
    ) -> WafResult<VersionToken> {
        match self.mode {
            TokenMode::Pull => {
                let token = api
                    .get_change_token(filter)
                    .await?
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| WafError::Token("unable to get ChangeToken".to_string()))?;
                debug!("change-token={}", token);
                Ok(VersionToken::new(token))
            }
            TokenMode::Piggyback => {
                let token = self.last_observed.take().ok_or_else(|| {
                    WafError::Token(
                        "no lock token observed since the last mutation; describe the IP set first"
                            .to_string(),
                    )
                })?;
                debug!("lock-token={}", token);
                Ok(token)
            }
        }
    }
}
