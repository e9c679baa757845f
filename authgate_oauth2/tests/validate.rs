use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use authgate::{
    b64,
    jwt::{Audience, CoreClaims},
    Jwks,
};
use authgate_clock::{TestClock, UnixTime};
use authgate_oauth2::{
    FetchError, HasScope, HttpJwksSource, InMemoryKeyCache, JwksSource, Reason, ScopeToken,
    ScopeTokenRef, Severity, TokenValidator, ValidationError, ValidatorConfig,
};
use color_eyre::Result;
use openssl::{
    hash::MessageDigest,
    pkey::{PKey, Private},
    rsa::Rsa,
    sign::Signer,
};
use serde_json::{json, Value};
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

const NOW: UnixTime = UnixTime(1_700_000_000);
const DAY: u64 = 24 * 60 * 60;

struct Key {
    kid: &'static str,
    private: PKey<Private>,
}

impl Key {
    fn generate(kid: &'static str) -> Result<Self> {
        Ok(Self {
            kid,
            private: PKey::from_rsa(Rsa::generate(2048)?)?,
        })
    }

    fn jwk(&self) -> Result<Value> {
        let rsa = self.private.rsa()?;
        Ok(json!({
            "kty": "RSA",
            "kid": self.kid,
            "use": "sig",
            "alg": "RS256",
            "n": b64::encode(rsa.n().to_vec()),
            "e": b64::encode(rsa.e().to_vec()),
        }))
    }

    fn sign(&self, claims: Value) -> Result<String> {
        self.sign_with_header(json!({ "alg": "RS256", "typ": "JWT", "kid": self.kid }), claims)
    }

    fn sign_with_header(&self, header: Value, claims: Value) -> Result<String> {
        let message = format!(
            "{}.{}",
            b64::encode(serde_json::to_vec(&header)?),
            b64::encode(serde_json::to_vec(&claims)?)
        );

        let mut signer = Signer::new(MessageDigest::sha256(), &self.private)?;
        signer.update(message.as_bytes())?;
        let signature = signer.sign_to_vec()?;

        Ok(format!("{}.{}", message, b64::encode(signature)))
    }
}

fn jwks_body(keys: &[Value]) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "keys": keys }))
}

async fn publish(server: &MockServer, keys: &[Value], expected_fetches: u64) {
    Mock::given(method("GET"))
        .and(path("/.well-known/jwks.json"))
        .respond_with(jwks_body(keys))
        .expect(expected_fetches)
        .mount(server)
        .await;
}

type HttpValidator = TokenValidator<HttpJwksSource, InMemoryKeyCache, TestClock>;

fn validator(clock: &TestClock) -> Result<HttpValidator> {
    Ok(TokenValidator::new(
        HttpJwksSource::with_timeout(Duration::from_secs(5))?,
        InMemoryKeyCache::new(),
        ValidatorConfig::new().with_clock(clock.clone()),
    ))
}

fn scopes(raw: &[&'static str]) -> Vec<ScopeToken> {
    raw.iter().map(|&s| ScopeToken::from_static(s)).collect()
}

async fn rejection(
    validator: &HttpValidator,
    token: &str,
    required: &[ScopeToken],
    authority: &str,
) -> ValidationError {
    match validator
        .validate(token, required, authority, None)
        .await
        .into_result()
    {
        Ok(claims) => panic!("token unexpectedly accepted: {claims:?}"),
        Err(err) => err,
    }
}

#[tokio::test]
async fn accepts_token_signed_by_published_key() -> Result<()> {
    let server = MockServer::start().await;
    let key = Key::generate("abc")?;
    publish(&server, &[key.jwk()?], 1).await;

    let authority = server.uri();
    let token = key.sign(json!({
        "iss": authority,
        "sub": "user-1",
        "exp": NOW.0 + 600,
        "iat": NOW.0,
        "scope": "read write",
        "https://example.com/tenant": "acme",
    }))?;

    let clock = TestClock::new(NOW);
    let claims = validator(&clock)?
        .validate(&token, &scopes(&["read"]), &authority, None)
        .await
        .into_result()?;

    assert_eq!(claims.iss().map(|i| i.as_str()), Some(authority.as_str()));
    assert_eq!(claims.sub().map(|s| s.as_str()), Some("user-1"));
    assert_eq!(claims.exp(), Some(NOW.add_secs(600)));
    assert_eq!(claims.iat(), Some(NOW));
    assert!(claims.scope().contains(ScopeTokenRef::from_str("read")?));
    assert!(claims.scope().contains(ScopeTokenRef::from_str("write")?));
    assert_eq!(claims.get_extra("https://example.com/tenant"), Some(&json!("acme")));
    Ok(())
}

#[tokio::test]
async fn expired_token_is_rejected_regardless_of_signature() -> Result<()> {
    let server = MockServer::start().await;
    let key = Key::generate("abc")?;
    let forger = Key::generate("abc")?;
    publish(&server, &[key.jwk()?], 1).await;

    let authority = server.uri();
    let clock = TestClock::new(NOW);
    let validator = validator(&clock)?;

    for signer in [&key, &forger] {
        let token = signer.sign(json!({ "iss": authority, "exp": NOW.0 - 1 }))?;
        let err = rejection(&validator, &token, &[], &authority).await;

        assert_eq!(err.reason(), Reason::TokenExpired);
        assert_eq!(err.status(), 401);
        assert_eq!(err.to_string(), "jwt expired");
    }
    Ok(())
}

#[tokio::test]
async fn unknown_kid_is_not_found_after_fetch() -> Result<()> {
    let server = MockServer::start().await;
    let key = Key::generate("abc")?;
    let stranger = Key::generate("zzz")?;
    publish(&server, &[key.jwk()?], 1).await;

    let authority = server.uri();
    let token = stranger.sign(json!({ "iss": authority, "exp": NOW.0 + 600 }))?;

    let err = rejection(&validator(&TestClock::new(NOW))?, &token, &[], &authority).await;

    assert_eq!(err.reason(), Reason::KeyNotFound);
    assert_eq!(err.status(), 401);
    assert_eq!(err.to_string(), "Token key (kid) not found in JWKS");
    Ok(())
}

#[tokio::test]
async fn same_token_twice_fetches_keys_once() -> Result<()> {
    let server = MockServer::start().await;
    let key = Key::generate("abc")?;
    publish(&server, &[key.jwk()?], 1).await;

    let authority = server.uri();
    let token = key.sign(json!({ "iss": authority, "exp": NOW.0 + 600 }))?;

    let clock = TestClock::new(NOW);
    let validator = validator(&clock)?;

    assert!(validator.validate(&token, &[], &authority, None).await.is_valid());
    clock.advance(60);
    assert!(validator.validate(&token, &[], &authority, None).await.is_valid());
    Ok(())
}

#[tokio::test]
async fn expired_cache_is_refetched_exactly_once() -> Result<()> {
    let server = MockServer::start().await;
    let key = Key::generate("abc")?;
    publish(&server, &[key.jwk()?], 2).await;

    let authority = server.uri();
    let token = key.sign(json!({ "iss": authority, "exp": NOW.0 + 3 * DAY }))?;

    let clock = TestClock::new(NOW);
    let validator = validator(&clock)?;

    assert!(validator.validate(&token, &[], &authority, None).await.is_valid());
    clock.advance(DAY);
    assert!(validator.validate(&token, &[], &authority, None).await.is_valid());
    assert!(validator.validate(&token, &[], &authority, None).await.is_valid());
    Ok(())
}

#[tokio::test]
async fn rotated_key_triggers_refetch() -> Result<()> {
    let server = MockServer::start().await;
    let old = Key::generate("old")?;
    let new = Key::generate("new")?;

    Mock::given(method("GET"))
        .and(path("/.well-known/jwks.json"))
        .respond_with(jwks_body(&[old.jwk()?]))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/.well-known/jwks.json"))
        .respond_with(jwks_body(&[old.jwk()?, new.jwk()?]))
        .expect(1)
        .mount(&server)
        .await;

    let authority = server.uri();
    let clock = TestClock::new(NOW);
    let validator = validator(&clock)?;

    let before = old.sign(json!({ "iss": authority, "exp": NOW.0 + 600 }))?;
    let after = new.sign(json!({ "iss": authority, "exp": NOW.0 + 600 }))?;

    assert!(validator.validate(&before, &[], &authority, None).await.is_valid());
    assert!(validator.validate(&after, &[], &authority, None).await.is_valid());
    assert!(validator.validate(&before, &[], &authority, None).await.is_valid());
    Ok(())
}

#[tokio::test]
async fn malformed_token_never_reaches_the_network() -> Result<()> {
    let server = MockServer::start().await;
    publish(&server, &[], 0).await;

    let validator = validator(&TestClock::new(NOW))?;
    let err = rejection(&validator, "not-a-jwt", &[], &server.uri()).await;

    assert_eq!(err.reason(), Reason::MalformedToken);
    assert_eq!(err.status(), 401);
    assert_eq!(err.to_string(), "Invalid token format");
    Ok(())
}

#[tokio::test]
async fn missing_scopes_are_named() -> Result<()> {
    let server = MockServer::start().await;
    let key = Key::generate("abc")?;
    publish(&server, &[key.jwk()?], 1).await;

    let authority = server.uri();
    let token = key.sign(json!({
        "iss": authority,
        "exp": NOW.0 + 600,
        "scope": "openid email",
    }))?;

    let validator = validator(&TestClock::new(NOW))?;

    assert!(validator
        .validate(&token, &scopes(&["openid"]), &authority, None)
        .await
        .is_valid());

    let required = scopes(&["openid", "admin", "profile"]);
    let err = rejection(&validator, &token, &required, &authority).await;

    assert_eq!(err.reason(), Reason::InsufficientScope);
    assert_eq!(err.severity(), Severity::InsufficientAccess);
    assert_eq!(err.status(), 403);
    assert_eq!(err.to_string(), "Missing required scopes: admin, profile");
    assert_eq!(
        err.insufficient_scope().map(|e| e.missing().to_vec()),
        Some(scopes(&["admin", "profile"]))
    );
    Ok(())
}

#[tokio::test]
async fn scope_claim_outside_printable_ascii_is_accepted() -> Result<()> {
    let server = MockServer::start().await;
    let key = Key::generate("abc")?;
    publish(&server, &[key.jwk()?], 1).await;

    let authority = server.uri();
    let validator = validator(&TestClock::new(NOW))?;

    for scope in ["read caf\u{e9}", "read a\"b"] {
        let token = key.sign(json!({ "iss": authority, "exp": NOW.0 + 600, "scope": scope }))?;

        for required in [scopes(&[]), scopes(&["read"])] {
            let claims = validator
                .validate(&token, &required, &authority, None)
                .await
                .into_result()?;
            assert_eq!(claims.scope().len(), 2);
        }

        let err = rejection(&validator, &token, &scopes(&["na\u{ef}ve"]), &authority).await;
        assert_eq!(err.reason(), Reason::InsufficientScope);
        assert_eq!(err.to_string(), "Missing required scopes: na\u{ef}ve");
    }
    Ok(())
}

#[tokio::test]
async fn pre_epoch_expiry_is_expired() -> Result<()> {
    let server = MockServer::start().await;
    let key = Key::generate("abc")?;
    publish(&server, &[key.jwk()?], 1).await;

    let authority = server.uri();
    let token = key.sign(json!({ "iss": authority, "exp": -5 }))?;

    let err = rejection(&validator(&TestClock::new(NOW))?, &token, &[], &authority).await;

    assert_eq!(err.reason(), Reason::TokenExpired);
    assert_eq!(err.status(), 401);
    assert_eq!(err.to_string(), "jwt expired");
    Ok(())
}

#[tokio::test]
async fn provider_claims_of_unexpected_type_are_accepted() -> Result<()> {
    let server = MockServer::start().await;
    let key = Key::generate("abc")?;
    publish(&server, &[key.jwk()?], 1).await;

    let authority = server.uri();
    let token = key.sign(json!({
        "iss": authority,
        "exp": NOW.0 + 600,
        "username": 42,
        "client_id": { "id": "abc123" },
        "token_use": true,
    }))?;

    let claims = validator(&TestClock::new(NOW))?
        .validate(&token, &[], &authority, None)
        .await
        .into_result()?;

    assert_eq!(claims.username(), None);
    assert_eq!(claims.client_id(), None);
    assert_eq!(claims.token_use(), None);
    assert_eq!(claims.get_extra("username"), Some(&json!(42)));
    Ok(())
}

#[tokio::test]
async fn issuer_defaults_to_authority_verbatim() -> Result<()> {
    let server = MockServer::start().await;
    let key = Key::generate("abc")?;
    publish(&server, &[key.jwk()?], 1).await;

    let authority = format!("{}/", server.uri());
    let validator = validator(&TestClock::new(NOW))?;

    let matching = key.sign(json!({ "iss": authority, "exp": NOW.0 + 600 }))?;
    assert!(validator.validate(&matching, &[], &authority, None).await.is_valid());

    let trimmed = key.sign(json!({ "iss": server.uri(), "exp": NOW.0 + 600 }))?;
    let err = rejection(&validator, &trimmed, &[], &authority).await;
    assert_eq!(err.reason(), Reason::VerificationFailed);
    assert_eq!(err.status(), 400);
    assert_eq!(err.to_string(), "jwt issuer invalid");

    assert!(validator
        .validate(&trimmed, &[], &authority, Some(&server.uri()))
        .await
        .is_valid());
    Ok(())
}

#[tokio::test]
async fn bad_signature_fails_verification() -> Result<()> {
    let server = MockServer::start().await;
    let key = Key::generate("abc")?;
    let forger = Key::generate("abc")?;
    publish(&server, &[key.jwk()?], 1).await;

    let authority = server.uri();
    let token = forger.sign(json!({ "iss": authority, "exp": NOW.0 + 600 }))?;

    let err = rejection(&validator(&TestClock::new(NOW))?, &token, &[], &authority).await;

    assert_eq!(err.reason(), Reason::VerificationFailed);
    assert_eq!(err.status(), 400);
    assert_eq!(err.to_string(), "invalid signature");
    Ok(())
}

#[tokio::test]
async fn header_algorithm_must_match_key() -> Result<()> {
    let server = MockServer::start().await;
    let key = Key::generate("abc")?;
    publish(&server, &[key.jwk()?], 1).await;

    let authority = server.uri();
    let validator = validator(&TestClock::new(NOW))?;

    for alg in ["HS256", "none", "PS256"] {
        let token = key.sign_with_header(
            json!({ "alg": alg, "kid": "abc" }),
            json!({ "iss": authority, "exp": NOW.0 + 600 }),
        )?;
        let err = rejection(&validator, &token, &[], &authority).await;

        assert_eq!(err.reason(), Reason::VerificationFailed, "{alg}");
        assert_eq!(err.status(), 400);
    }
    Ok(())
}

#[tokio::test]
async fn token_not_yet_valid_fails_verification() -> Result<()> {
    let server = MockServer::start().await;
    let key = Key::generate("abc")?;
    publish(&server, &[key.jwk()?], 1).await;

    let authority = server.uri();
    let token = key.sign(json!({ "iss": authority, "nbf": NOW.0 + 60, "exp": NOW.0 + 600 }))?;

    let err = rejection(&validator(&TestClock::new(NOW))?, &token, &[], &authority).await;

    assert_eq!(err.reason(), Reason::VerificationFailed);
    assert_eq!(err.to_string(), "jwt not active");
    Ok(())
}

#[tokio::test]
async fn leeway_admits_recently_expired_token() -> Result<()> {
    let server = MockServer::start().await;
    let key = Key::generate("abc")?;
    publish(&server, &[key.jwk()?], 1).await;

    let authority = server.uri();
    let token = key.sign(json!({ "iss": authority, "exp": NOW.0 - 5 }))?;

    let clock = TestClock::new(NOW);
    let validator = TokenValidator::new(
        HttpJwksSource::new()?,
        InMemoryKeyCache::new(),
        ValidatorConfig::new()
            .with_leeway(Duration::from_secs(30))
            .with_clock(clock),
    );

    assert!(validator.validate(&token, &[], &authority, None).await.is_valid());
    Ok(())
}

#[tokio::test]
async fn audience_allow_list_is_enforced() -> Result<()> {
    let server = MockServer::start().await;
    let key = Key::generate("abc")?;
    publish(&server, &[key.jwk()?], 1).await;

    let authority = server.uri();
    let validator = TokenValidator::new(
        HttpJwksSource::new()?,
        InMemoryKeyCache::new(),
        ValidatorConfig::new()
            .add_allowed_audience(Audience::from_static("https://api.example.com"))
            .with_clock(TestClock::new(NOW)),
    );

    let ours = key.sign(json!({
        "iss": authority,
        "exp": NOW.0 + 600,
        "aud": ["https://api.example.com", "https://idp.example.com/userinfo"],
    }))?;
    assert!(validator.validate(&ours, &[], &authority, None).await.is_valid());

    let theirs = key.sign(json!({
        "iss": authority,
        "exp": NOW.0 + 600,
        "aud": "https://other.example.com",
    }))?;
    let err = validator
        .validate(&theirs, &[], &authority, None)
        .await
        .into_result()
        .unwrap_err();
    assert_eq!(err.reason(), Reason::VerificationFailed);
    assert_eq!(err.to_string(), "jwt audience invalid");
    Ok(())
}

#[tokio::test]
async fn unreachable_key_set_is_an_infrastructure_failure() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/jwks.json"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let key = Key::generate("abc")?;
    let authority = server.uri();
    let token = key.sign(json!({ "iss": authority, "exp": NOW.0 + 600 }))?;

    let err = rejection(&validator(&TestClock::new(NOW))?, &token, &[], &authority).await;

    assert_eq!(err.reason(), Reason::KeyFetchFailed);
    assert_eq!(err.severity(), Severity::Infrastructure);
    assert_eq!(err.status(), 500);
    assert!(err.to_string().starts_with("Failed to fetch JWKS: "));
    Ok(())
}

#[tokio::test]
async fn non_rsa_key_is_unsupported() -> Result<()> {
    let server = MockServer::start().await;
    publish(
        &server,
        &[json!({ "kty": "EC", "kid": "abc", "crv": "P-256", "x": "AA", "y": "AA" })],
        1,
    )
    .await;

    let key = Key::generate("abc")?;
    let authority = server.uri();
    let token = key.sign(json!({ "iss": authority, "exp": NOW.0 + 600 }))?;

    let err = rejection(&validator(&TestClock::new(NOW))?, &token, &[], &authority).await;

    assert_eq!(err.reason(), Reason::UnsupportedKeyType);
    assert_eq!(err.status(), 401);
    assert_eq!(err.to_string(), "Unsupported key type, only RSA is supported");
    Ok(())
}

/// Serves a fixed key set for any authority, recording the URLs requested
struct StaticSource {
    jwks: Value,
    requested: Mutex<Vec<String>>,
}

#[async_trait]
impl JwksSource for StaticSource {
    async fn fetch(&self, url: &str) -> Result<Jwks, FetchError> {
        self.requested
            .lock()
            .map_err(|_| FetchError::UnexpectedStatus { status: 500 })?
            .push(url.to_owned());
        Ok(serde_json::from_value(self.jwks.clone())?)
    }
}

#[tokio::test]
async fn well_known_authority_scenario() -> Result<()> {
    let key = Key::generate("abc")?;
    let source = Arc::new(StaticSource {
        jwks: json!({ "keys": [key.jwk()?] }),
        requested: Mutex::new(Vec::new()),
    });

    let validator = TokenValidator::new(
        Arc::clone(&source),
        InMemoryKeyCache::new(),
        ValidatorConfig::new().with_clock(TestClock::new(NOW)),
    );

    let token = key.sign_with_header(
        json!({ "kid": "abc", "alg": "RS256" }),
        json!({
            "iss": "https://idp.example.com",
            "exp": NOW.0 + 3600,
            "scope": "read write",
        }),
    )?;

    let outcome = validator
        .validate(&token, &scopes(&["read"]), "https://idp.example.com", None)
        .await;

    assert!(outcome.is_valid(), "{:?}", outcome.error());
    assert_eq!(
        source.requested.lock().map(|r| r.clone()).ok(),
        Some(vec!["https://idp.example.com/.well-known/jwks.json".to_owned()])
    );
    Ok(())
}
