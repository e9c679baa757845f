//! The result of validating a token

use authgate::error::{ClaimsRejected, JwtVerifyError};
use thiserror::Error;

use crate::{claims::Claims, resolver::ResolveError, scope::InsufficientScope};

/// The result of validating a bearer token
#[derive(Debug)]
#[must_use]
pub enum ValidationOutcome {
    /// The token verified and carries the required scopes
    Valid(Claims),
    /// The token was rejected
    Invalid(ValidationError),
}

impl ValidationOutcome {
    /// Whether the token was accepted
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    /// Converts the outcome into a `Result`
    ///
    /// # Errors
    ///
    /// Returns the rejection if the token was invalid.
    pub fn into_result(self) -> Result<Claims, ValidationError> {
        match self {
            Self::Valid(claims) => Ok(claims),
            Self::Invalid(err) => Err(err),
        }
    }

    /// The rejection, if the token was invalid
    #[must_use]
    pub fn error(&self) -> Option<&ValidationError> {
        match self {
            Self::Valid(_) => None,
            Self::Invalid(err) => Some(err),
        }
    }
}

impl From<Result<Claims, ValidationError>> for ValidationOutcome {
    fn from(result: Result<Claims, ValidationError>) -> Self {
        match result {
            Ok(claims) => Self::Valid(claims),
            Err(err) => Self::Invalid(err),
        }
    }
}

/// Why a token was rejected, without the details
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Reason {
    /// No token was presented
    NoToken,
    /// No authority was configured
    AuthorityMissing,
    /// The token is not a compact JWS
    MalformedToken,
    /// The token header names no key
    MissingKeyId,
    /// The authority's key set could not be fetched
    KeyFetchFailed,
    /// The authority does not publish the named key
    KeyNotFound,
    /// The named key is not an RSA key
    UnsupportedKeyType,
    /// The token has expired
    TokenExpired,
    /// The signature or a claim did not check out
    VerificationFailed,
    /// The token lacks required scopes
    InsufficientScope,
}

/// Who needs to act on a rejection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Severity {
    /// The server or the authority is at fault; retrying may help
    Infrastructure,
    /// The presented token cannot be accepted
    InvalidToken,
    /// The token is valid but does not grant enough access
    InsufficientAccess,
}

/// A rejected token
///
/// The `Display` output is suitable for returning to the caller. It never
/// includes key material.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// No token was presented
    #[error("No token provided")]
    NoToken,

    /// No authority was configured to validate against
    #[error("Authority not provided")]
    AuthorityMissing,

    /// The token could not be decoded
    #[error("Invalid token format")]
    MalformedToken(#[source] JwtVerifyError),

    /// The token header has no `kid`
    #[error("Token missing 'kid' in header")]
    MissingKeyId,

    /// The authority's key set could not be fetched
    #[error("Failed to fetch JWKS: {0}")]
    KeyFetchFailed(#[source] ResolveError),

    /// The authority does not publish the named key
    #[error("Token key (kid) not found in JWKS")]
    KeyNotFound(#[source] ResolveError),

    /// The named key is not an RSA key
    #[error("Unsupported key type, only RSA is supported")]
    UnsupportedKeyType(#[source] ResolveError),

    /// The token's `exp` has passed
    #[error("jwt expired")]
    TokenExpired,

    /// The signature or a claim was rejected
    #[error("{message}")]
    VerificationFailed {
        /// What was rejected
        message: String,
        /// The underlying failure
        #[source]
        source: JwtVerifyError,
    },

    /// The token lacks required scopes
    #[error(transparent)]
    InsufficientScope(#[from] InsufficientScope),
}

impl ValidationError {
    /// The kind of rejection
    #[must_use]
    pub fn reason(&self) -> Reason {
        match self {
            Self::NoToken => Reason::NoToken,
            Self::AuthorityMissing => Reason::AuthorityMissing,
            Self::MalformedToken(_) => Reason::MalformedToken,
            Self::MissingKeyId => Reason::MissingKeyId,
            Self::KeyFetchFailed(_) => Reason::KeyFetchFailed,
            Self::KeyNotFound(_) => Reason::KeyNotFound,
            Self::UnsupportedKeyType(_) => Reason::UnsupportedKeyType,
            Self::TokenExpired => Reason::TokenExpired,
            Self::VerificationFailed { .. } => Reason::VerificationFailed,
            Self::InsufficientScope(_) => Reason::InsufficientScope,
        }
    }

    /// Who needs to act on the rejection
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self.reason() {
            Reason::AuthorityMissing | Reason::KeyFetchFailed => Severity::Infrastructure,
            Reason::InsufficientScope => Severity::InsufficientAccess,
            _ => Severity::InvalidToken,
        }
    }

    /// The HTTP status code a resource server should answer with
    #[must_use]
    pub fn status(&self) -> u16 {
        match self.reason() {
            Reason::AuthorityMissing | Reason::KeyFetchFailed => 500,
            Reason::VerificationFailed => 400,
            Reason::InsufficientScope => 403,
            Reason::NoToken
            | Reason::MalformedToken
            | Reason::MissingKeyId
            | Reason::KeyNotFound
            | Reason::UnsupportedKeyType
            | Reason::TokenExpired => 401,
        }
    }

    /// The missing scopes, if the token was rejected for lacking them
    #[must_use]
    pub fn insufficient_scope(&self) -> Option<&InsufficientScope> {
        match self {
            Self::InsufficientScope(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResolveError> for ValidationError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::KeyFetchFailed { .. } => Self::KeyFetchFailed(err),
            ResolveError::KeyNotFound { .. } => Self::KeyNotFound(err),
            ResolveError::UnsupportedKeyType(_) => Self::UnsupportedKeyType(err),
        }
    }
}

impl From<JwtVerifyError> for ValidationError {
    fn from(err: JwtVerifyError) -> Self {
        if err.is_malformed() {
            return Self::MalformedToken(err);
        }

        let message = match &err {
            JwtVerifyError::ClaimsRejected(ClaimsRejected::TokenExpired) => {
                return Self::TokenExpired;
            }
            JwtVerifyError::ClaimsRejected(ClaimsRejected::TokenNotYetValid) => {
                "jwt not active".to_owned()
            }
            JwtVerifyError::ClaimsRejected(ClaimsRejected::InvalidIssuer) => {
                "jwt issuer invalid".to_owned()
            }
            JwtVerifyError::ClaimsRejected(ClaimsRejected::InvalidAudience) => {
                "jwt audience invalid".to_owned()
            }
            JwtVerifyError::ClaimsRejected(ClaimsRejected::InvalidAlgorithm) => {
                "invalid algorithm".to_owned()
            }
            JwtVerifyError::ClaimsRejected(ClaimsRejected::MissingRequiredClaim(claim)) => {
                format!("jwt {claim} required")
            }
            JwtVerifyError::JwkVerifyError(e) if e.is_signature_mismatch() => {
                "invalid signature".to_owned()
            }
            JwtVerifyError::JwkVerifyError(e) => e.to_string(),
            other => other.to_string(),
        };

        Self::VerificationFailed {
            message,
            source: err,
        }
    }
}
