//! Where the node lives and how to authenticate to it.

use reqwest::Url;

use crate::error::CoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct BasicAuth {
    pub(super) user: String,
    pub(super) pass: String,
}

#[derive(Debug, Clone)]
pub(super) struct NodeEndpoint {
    pub(super) url: Url,
    pub(super) auth: Option<BasicAuth>,
}

impl NodeEndpoint {
    /// `url` must be HTTP(S). Credentials are all-or-nothing.
    pub(super) fn parse(
        url: &str,
        user: Option<&str>,
        pass: Option<&str>,
    ) -> Result<Self, CoreError> {
        let parsed = Url::parse(url)
            .map_err(|e| CoreError::InvalidConfig(format!("invalid node url `{url}`: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(CoreError::InvalidConfig(format!(
                "node url `{url}` must use http or https, not {}",
                parsed.scheme()
            )));
        }

        let auth = match (user, pass) {
            (None, None) => None,
            (Some(user), Some(pass)) => Some(BasicAuth {
                user: user.to_owned(),
                pass: pass.to_owned(),
            }),
            _ => {
                return Err(CoreError::InvalidConfig(
                    "node rpc user and password go together".to_owned(),
                ))
            }
        };

        Ok(Self { url: parsed, auth })
    }
}
