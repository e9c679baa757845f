//! OAuth2 scopes and scope-based authorization

use std::{collections::hash_set, convert::Infallible, fmt, iter::FromIterator, str::FromStr};

use ahash::AHashSet;
use aliri_braid::braid;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An invalid scope token
#[derive(Debug, Error)]
pub enum InvalidScopeToken {
    /// The scope token was the empty string
    #[error("scope token cannot be empty")]
    EmptyString,
    /// The scope token contained whitespace
    #[error("scope token contains whitespace at position {position}")]
    Whitespace {
        /// The byte index in the scope token where the whitespace was found
        position: usize,
    },
}

aliri_braid::from_infallible!(InvalidScopeToken);

/// An OAuth2 scope token, as in [RFC 6749, Section 3.3][RFC6749 3.3]
///
/// Any non-empty string without whitespace is accepted. Authorities do not
/// all keep to the printable ASCII subset the RFC describes, and a granted
/// scope is compared byte for byte, so nothing narrower is enforced here.
///
///   [RFC6749 3.3]: (https://datatracker.ietf.org/doc/html/rfc6749#section-3.3)
#[braid(
    serde,
    validator,
    ref_doc = "A borrowed reference to an OAuth2 [`ScopeToken`]"
)]
pub struct ScopeToken;

impl aliri_braid::Validator for ScopeToken {
    type Error = InvalidScopeToken;

    fn validate(s: &str) -> Result<(), Self::Error> {
        if s.is_empty() {
            Err(InvalidScopeToken::EmptyString)
        } else if let Some((position, _)) = s.char_indices().find(|(_, c)| c.is_whitespace()) {
            Err(InvalidScopeToken::Whitespace { position })
        } else {
            Ok(())
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
enum ScopeDto {
    String(String),
    Array(Vec<String>),
}

impl From<Option<ScopeDto>> for Scope {
    fn from(dto: Option<ScopeDto>) -> Self {
        match dto {
            Some(ScopeDto::String(s)) => split_scope_tokens(&s).collect(),
            Some(ScopeDto::Array(arr)) => arr.iter().flat_map(|s| split_scope_tokens(s)).collect(),
            None => Self::empty(),
        }
    }
}

impl From<Scope> for ScopeDto {
    fn from(s: Scope) -> Self {
        ScopeDto::String(s.to_string())
    }
}

/// A set of OAuth2 scope tokens granted to or required of a token
///
/// Deserializes from either a space-delimited string, as in the `scope`
/// claim, or an array of scope tokens. Either form is split on whitespace
/// and empty tokens are skipped, so any string content is accepted. An
/// absent or `null` claim is the empty set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "Option<ScopeDto>", into = "ScopeDto")]
pub struct Scope(AHashSet<ScopeToken>);

impl Scope {
    /// Produces an empty scope
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self(AHashSet::new())
    }

    /// Adds a scope token to the scope
    #[inline]
    pub fn insert(&mut self, scope_token: ScopeToken) {
        self.0.insert(scope_token);
    }

    /// Whether the scope holds no tokens
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The number of distinct scope tokens
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the given scope token has been granted
    #[inline]
    #[must_use]
    pub fn contains(&self, scope_token: &ScopeTokenRef) -> bool {
        self.0.contains(scope_token)
    }

    /// Produces an iterator of the scope tokens in this set
    #[inline]
    pub fn iter(&self) -> Iter<'_> {
        self.into_iter()
    }

    /// Checks to see whether this scope contains all of
    /// the scope tokens in `subset`.
    #[inline]
    #[must_use]
    pub fn contains_all(&self, subset: &Scope) -> bool {
        self.0.is_superset(&subset.0)
    }
}

/// Space-delimited, sorted so that the output is stable
impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut tokens: Vec<&str> = self.0.iter().map(|t| t.as_str()).collect();
        tokens.sort_unstable();
        f.write_str(&tokens.join(" "))
    }
}

impl IntoIterator for Scope {
    type Item = ScopeToken;
    type IntoIter = <AHashSet<ScopeToken> as IntoIterator>::IntoIter;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// An iterator over a set of borrowed scope tokens
#[derive(Clone, Debug)]
pub struct Iter<'a> {
    iter: hash_set::Iter<'a, ScopeToken>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a ScopeTokenRef;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next().map(|x| x.as_ref())
    }
}

impl<'a> IntoIterator for &'a Scope {
    type Item = &'a ScopeTokenRef;
    type IntoIter = Iter<'a>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        Iter {
            iter: self.0.iter(),
        }
    }
}

impl<S> Extend<S> for Scope
where
    S: Into<ScopeToken>,
{
    #[inline]
    fn extend<I>(&mut self, iter: I)
    where
        I: IntoIterator<Item = S>,
    {
        self.0.extend(iter.into_iter().map(Into::into))
    }
}

impl<S> FromIterator<S> for Scope
where
    S: Into<ScopeToken>,
{
    #[inline]
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = S>,
    {
        let mut set = Self::empty();
        set.extend(iter);
        set
    }
}

/// Splits a space-delimited list into scope tokens
///
/// Runs of any whitespace separate tokens and nothing else is rejected, so
/// `"read  café\twrite"` yields `read`, `café` and `write`.
pub fn split_scope_tokens(s: &str) -> impl Iterator<Item = ScopeToken> + '_ {
    // `split_whitespace` yields only non-empty tokens free of whitespace
    s.split_whitespace()
        .filter_map(|t| ScopeToken::new(t.to_owned()).ok())
}

impl From<&'_ str> for Scope {
    #[inline]
    fn from(s: &str) -> Self {
        split_scope_tokens(s).collect()
    }
}

impl FromStr for Scope {
    type Err = Infallible;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

/// Indicates that the type has an OAuth2 scope claim
pub trait HasScope {
    /// Scope claimed by the underlying token, generally in the `scope`
    /// claim.
    fn scope(&self) -> &Scope;
}

impl HasScope for Scope {
    #[inline]
    fn scope(&self) -> &Scope {
        self
    }
}

/// The requester lacked one or more of the required scope tokens
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("Missing required scopes: {}", join(.missing))]
pub struct InsufficientScope {
    missing: Vec<ScopeToken>,
}

impl InsufficientScope {
    /// The required scope tokens that were not granted, in the order they
    /// were first required
    #[must_use]
    pub fn missing(&self) -> &[ScopeToken] {
        &self.missing
    }
}

fn join(tokens: &[ScopeToken]) -> String {
    let strs: Vec<&str> = tokens.iter().map(|t| t.as_str()).collect();
    strs.join(", ")
}

/// Checks that every required scope token has been granted
///
/// Order and duplicates in `required` do not affect the outcome. An empty
/// `required` list is always satisfied.
///
/// # Errors
///
/// Returns the required scope tokens missing from `granted`, each listed
/// once in the order first required.
///
/// # Example
///
/// ```
/// use authgate_oauth2::scope::{authorize, Scope, ScopeToken};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let granted: Scope = "openid email".parse()?;
///
/// assert!(authorize(&granted, &[ScopeToken::from_static("openid")]).is_ok());
///
/// let err = authorize(
///     &granted,
///     &[ScopeToken::from_static("openid"), ScopeToken::from_static("admin")],
/// )
/// .unwrap_err();
/// assert_eq!(err.missing(), &[ScopeToken::from_static("admin")]);
/// # Ok(())
/// # }
/// ```
pub fn authorize<I, T>(granted: &Scope, required: I) -> Result<(), InsufficientScope>
where
    I: IntoIterator<Item = T>,
    T: AsRef<ScopeTokenRef>,
{
    let mut missing: Vec<ScopeToken> = Vec::new();

    for token in required {
        let token = token.as_ref();
        if !granted.contains(token) && !missing.iter().any(|m| m.as_str() == token.as_str()) {
            missing.push(token.to_owned());
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(InsufficientScope { missing })
    }
}
