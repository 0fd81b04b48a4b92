use std::fmt;

use serde::de;
use serde::Deserialize;
use serde::Deserializer;
use serde_json::Map;
use serde_json::Value;

use crate::error::Error;
use crate::error::Result;

pub(crate) const USER_ID_CLAIM: &str = "userid";
pub(crate) const ENTITY_ID_CLAIM: &str = "entityid";

/// Trait for accessing the registered claims used during validation
pub trait StandardClaims {
    /// Get the issuer (iss) claim
    fn iss(&self) -> &str;

    /// Get the audience (aud) claim, normalized to a list
    fn aud(&self) -> &[String];

    /// Get the expiration time (exp) claim as a Unix timestamp
    fn exp(&self) -> i64;

    /// Get the not-before (nbf) claim as a Unix timestamp, if present
    fn nbf(&self) -> Option<i64> {
        None
    }

    /// Get the issued at (iat) claim as a Unix timestamp, if present
    fn iat(&self) -> Option<i64> {
        None
    }
}

/// Claims of a token accepted by the validator
///
/// ```json
/// {
///   "iss": "https://issuer.example",
///   "aud": "api://aud",
///   "exp": 1234567890,
///   "iat": 1234564290,
///   "userid": "ABC123",
///   "entityid": "XYZ789"
/// }
/// ```
///
/// Registered claims default when absent; the decoder enforces their presence.
/// Timestamps may be fractional NumericDates and are truncated to whole seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub iss: String,
    #[serde(default, deserialize_with = "one_or_many")]
    pub aud: Vec<String>,
    #[serde(default, deserialize_with = "numeric_date")]
    pub exp: i64,
    #[serde(default, deserialize_with = "optional_numeric_date")]
    pub nbf: Option<i64>,
    #[serde(default, deserialize_with = "optional_numeric_date")]
    pub iat: Option<i64>,
    /// Every claim not listed above, including `userid` and `entityid`
    #[serde(flatten)]
    pub custom: Map<String, Value>,
}

impl TokenClaims {
    /// Textual value of a custom claim
    ///
    /// Strings are returned as-is; numbers and booleans by their JSON text.
    /// Objects, arrays and null count as absent.
    pub fn custom_claim(&self, name: &str) -> Option<String> {
        match self.custom.get(name)? {
            Value::String(value) => Some(value.clone()),
            Value::Number(value) => Some(value.to_string()),
            Value::Bool(value) => Some(value.to_string()),
            _ => None,
        }
    }
}

impl StandardClaims for TokenClaims {
    fn iss(&self) -> &str {
        &self.iss
    }

    fn aud(&self) -> &[String] {
        &self.aud
    }

    fn exp(&self) -> i64 {
        self.exp
    }

    fn nbf(&self) -> Option<i64> {
        self.nbf
    }

    fn iat(&self) -> Option<i64> {
        self.iat
    }
}

/// The authorization claims a caller expects a token to carry
#[derive(Debug, Clone, Copy)]
pub(crate) struct ExpectedClaims<'a> {
    pub(crate) user_id: &'a str,
    pub(crate) entity_id: &'a str,
}

impl ExpectedClaims<'_> {
    /// Match `userid` first, then `entityid`
    pub(crate) fn check(&self, claims: &TokenClaims) -> Result<()> {
        match_claim(claims, USER_ID_CLAIM, self.user_id)?;
        match_claim(claims, ENTITY_ID_CLAIM, self.entity_id)
    }
}

fn match_claim(claims: &TokenClaims, name: &'static str, expected: &str) -> Result<()> {
    let actual = claims.custom_claim(name).ok_or(Error::MissingClaim(name))?;

    if eq_ignore_case(&actual, expected) {
        Ok(())
    } else {
        Err(Error::ClaimMismatch(name))
    }
}

/// Per-character case-insensitive equality
///
/// Each character is compared through its uppercase form only when that form
/// is a single character, so strings of different lengths never match.
fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.chars().count() == b.chars().count()
        && a.chars().zip(b.chars()).all(|(x, y)| x == y || fold_case(x) == fold_case(y))
}

fn fold_case(c: char) -> char {
    let mut upper = c.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(single), None) => single,
        _ => c,
    }
}

/// Seconds since the epoch, accepting integer or fractional JSON numbers
struct NumericDate(i64);

impl<'de> Deserialize<'de> for NumericDate {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct NumericDateVisitor;

        impl de::Visitor<'_> for NumericDateVisitor {
            type Value = NumericDate;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a NumericDate")
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> std::result::Result<Self::Value, E> {
                Ok(NumericDate(value))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> std::result::Result<Self::Value, E> {
                i64::try_from(value)
                    .map(NumericDate)
                    .map_err(|_| E::invalid_value(de::Unexpected::Unsigned(value), &self))
            }

            fn visit_f64<E: de::Error>(self, value: f64) -> std::result::Result<Self::Value, E> {
                if value.is_finite() && value >= i64::MIN as f64 && value < i64::MAX as f64 {
                    Ok(NumericDate(value.trunc() as i64))
                } else {
                    Err(E::invalid_value(de::Unexpected::Float(value), &self))
                }
            }
        }

        deserializer.deserialize_any(NumericDateVisitor)
    }
}

fn numeric_date<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    NumericDate::deserialize(deserializer).map(|date| date.0)
}

fn optional_numeric_date<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<NumericDate>::deserialize(deserializer).map(|date| date.map(|date| date.0))
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    })
}
