use serde::Deserialize;

use crate::{jwk, Jwk};

/// A JSON Web Key Set (JWKS)
///
/// Entries that cannot be understood are skipped with a warning rather than
/// failing the whole set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Jwks {
    #[serde(deserialize_with = "deserialize_keys")]
    keys: Vec<Jwk>,
}

impl Jwks {
    /// Adds a key to the set
    pub fn add_key(&mut self, key: Jwk) {
        self.keys.push(key);
    }

    /// A view of the keys in this set
    #[must_use]
    pub fn keys(&self) -> &[Jwk] {
        &self.keys
    }

    /// Whether the set holds no usable keys
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Gets the key with the given ID
    ///
    /// When the provider publishes the same ID more than once, the entry
    /// listed last wins.
    #[must_use]
    pub fn get_key_by_id(&self, kid: &jwk::KeyIdRef) -> Option<&Jwk> {
        self.keys.iter().rev().find(|k| k.key_id() == kid)
    }
}

impl FromIterator<Jwk> for Jwks {
    fn from_iter<I: IntoIterator<Item = Jwk>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}

fn deserialize_keys<'de, D>(deserializer: D) -> Result<Vec<Jwk>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct MaybeJwksVisitor;

    impl<'de> serde::de::Visitor<'de> for MaybeJwksVisitor {
        type Value = Vec<Jwk>;

        fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("a list of JWK objects")
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: serde::de::SeqAccess<'de>,
        {
            let mut values = Vec::with_capacity(seq.size_hint().unwrap_or_default());
            let mut index = 0_usize;

            while let Some(value) = seq.next_element::<serde_json::Value>()? {
                let kid = value.get("kid").and_then(|v| v.as_str()).map(str::to_owned);
                let kty = value.get("kty").and_then(|v| v.as_str()).map(str::to_owned);

                match serde_json::from_value::<Jwk>(value) {
                    Ok(jwk) => values.push(jwk),
                    Err(error) => {
                        tracing::warn!(
                            jwks.idx = index,
                            jwk.kid = ?kid,
                            jwk.kty = ?kty,
                            %error,
                            "ignoring unusable JWK"
                        );
                    }
                }
                index += 1;
            }

            Ok(values)
        }
    }

    deserializer.deserialize_seq(MaybeJwksVisitor)
}
