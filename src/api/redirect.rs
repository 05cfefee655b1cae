use http::Uri;
use serde::Deserialize;

use crate::Result;

/// Where to send the user after the OAuth provider hands control back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectTarget {
    /// First sign-in; the account was just created.
    Welcome,
    Dashboard,
    /// The redirect carried no token.
    Login,
}

impl RedirectTarget {
    pub fn path(self) -> &'static str {
        match self {
            RedirectTarget::Welcome => "/welcome",
            RedirectTarget::Dashboard => "/dashboard",
            RedirectTarget::Login => "/login",
        }
    }
}

/// Query parameters of the OAuth redirect, e.g. `/oauth2/redirect?token=abc&new=true`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct OAuthRedirect {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub new: Option<String>,
}

impl OAuthRedirect {
    /// `url` can be a full url or a path and query. Values are percent-decoded.
    pub fn parse(url: &str) -> Result<Self> {
        let uri: Uri = url.parse()?;
        match uri.query() {
            Some(query) => Ok(serde_qs::from_str(query)?),
            None => Ok(Self::default()),
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }

    pub fn is_new_user(&self) -> bool {
        self.new.as_deref() == Some("true")
    }

    pub fn target(&self) -> RedirectTarget {
        match (self.token(), self.is_new_user()) {
            (None, _) => RedirectTarget::Login,
            (Some(_), true) => RedirectTarget::Welcome,
            (Some(_), false) => RedirectTarget::Dashboard,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_targets() {
        let r = OAuthRedirect::parse("https://app.test/oauth2/redirect?token=abc%2Edef&new=true").unwrap();
        assert_eq!(r.token(), Some("abc.def"));
        assert_eq!(r.target(), RedirectTarget::Welcome);

        let r = OAuthRedirect::parse("/oauth2/redirect?token=abc").unwrap();
        assert_eq!(r.target(), RedirectTarget::Dashboard);

        let r = OAuthRedirect::parse("/oauth2/redirect?token=&new=true").unwrap();
        assert_eq!(r.target(), RedirectTarget::Login);

        let r = OAuthRedirect::parse("/oauth2/redirect").unwrap();
        assert_eq!(r.target().path(), "/login");
    }
}
