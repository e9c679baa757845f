use authgate::jwt::{Audiences, CoreClaims, Issuer, IssuerRef, Subject, SubjectRef};
use authgate_clock::UnixTime;
use serde::{Deserialize, Serialize};

use crate::scope::{HasScope, Scope};

/// The claims of an access or ID token issued by an OAuth2 authority
///
/// Registered claims are typed. Anything else the authority includes is kept
/// in [`extra`](Self::extra), including provider claims such as `username`,
/// which only have typed accessors.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[must_use]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iss: Option<Issuer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub: Option<Subject>,
    #[serde(default, skip_serializing_if = "Audiences::is_empty")]
    aud: Audiences,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exp: Option<UnixTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    nbf: Option<UnixTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iat: Option<UnixTime>,
    #[serde(default, skip_serializing_if = "Scope::is_empty")]
    scope: Scope,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

impl Claims {
    /// Constructs an empty claim set
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the issuer
    pub fn with_issuer(mut self, iss: Issuer) -> Self {
        self.iss = Some(iss);
        self
    }

    /// Sets the subject
    pub fn with_subject(mut self, sub: Subject) -> Self {
        self.sub = Some(sub);
        self
    }

    /// Sets the audience
    pub fn with_audience(mut self, aud: impl Into<Audiences>) -> Self {
        self.aud = aud.into();
        self
    }

    /// Sets the `exp` claim
    pub fn with_expiration(mut self, time: UnixTime) -> Self {
        self.exp = Some(time);
        self
    }

    /// Sets the `nbf` claim
    pub fn with_not_before(mut self, time: UnixTime) -> Self {
        self.nbf = Some(time);
        self
    }

    /// Sets the `iat` claim
    pub fn with_issued_at(mut self, time: UnixTime) -> Self {
        self.iat = Some(time);
        self
    }

    /// Sets the granted scope
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Sets the `client_id` claim
    pub fn with_client_id(self, client_id: impl Into<String>) -> Self {
        self.with_extra("client_id", serde_json::Value::String(client_id.into()))
    }

    /// Sets the `username` claim
    pub fn with_username(self, username: impl Into<String>) -> Self {
        self.with_extra("username", serde_json::Value::String(username.into()))
    }

    /// Sets the `token_use` claim
    pub fn with_token_use(self, token_use: impl Into<String>) -> Self {
        self.with_extra("token_use", serde_json::Value::String(token_use.into()))
    }

    /// Adds an extension claim
    pub fn with_extra(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(name.into(), value);
        self
    }

    /// Issued at
    #[must_use]
    pub fn iat(&self) -> Option<UnixTime> {
        self.iat
    }

    /// The client the token was issued to
    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        self.extra_str("client_id")
    }

    /// The end user's username, as some providers include it
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.extra_str("username")
    }

    /// `access` or `id`, as some providers include it
    #[must_use]
    pub fn token_use(&self) -> Option<&str> {
        self.extra_str("token_use")
    }

    /// Claims without a typed field
    #[must_use]
    pub fn extra(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.extra
    }

    /// Looks up a claim without a typed field by name
    #[must_use]
    pub fn get_extra(&self, name: &str) -> Option<&serde_json::Value> {
        self.extra.get(name)
    }

    fn extra_str(&self, name: &str) -> Option<&str> {
        self.extra.get(name).and_then(serde_json::Value::as_str)
    }
}

impl CoreClaims for Claims {
    fn nbf(&self) -> Option<UnixTime> {
        self.nbf
    }

    fn exp(&self) -> Option<UnixTime> {
        self.exp
    }

    fn aud(&self) -> &Audiences {
        &self.aud
    }

    fn iss(&self) -> Option<&IssuerRef> {
        self.iss.as_deref()
    }

    fn sub(&self) -> Option<&SubjectRef> {
        self.sub.as_deref()
    }
}

impl HasScope for Claims {
    fn scope(&self) -> &Scope {
        &self.scope
    }
}
