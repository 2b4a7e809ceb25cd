use std::{fmt, str::FromStr};

use garde::Validate;
use serde::{Deserialize, Serialize};

/// E-mail address of an account.
///
/// Addresses are normalized whenever they enter the system (parsing and
/// deserialization): surrounding whitespace is dropped and the domain part is
/// lowercased, the local part keeps its case. Deserialization does not validate,
/// payloads carrying e-mail are checked by garde together with the other fields,
/// so a bad address is reported as a field error.
#[derive(Debug, Clone, PartialEq, Eq, Validate, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String")]
#[garde(transparent)]
pub struct ValidEmail(#[garde(email)] String);

fn normalize(email: &str) -> String {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{local}@{}", domain.to_lowercase()),
        None => email.to_string(),
    }
}

#[cfg(feature = "e2e-tests")]
impl ValidEmail {
    /// Skips validation, test accounts use addresses garde may not like
    pub fn cheat(email: String) -> Self {
        ValidEmail(email)
    }
}

impl From<String> for ValidEmail {
    fn from(value: String) -> Self {
        ValidEmail(normalize(&value))
    }
}

impl FromStr for ValidEmail {
    type Err = garde::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let email = ValidEmail(normalize(s));
        email.validate()?;
        Ok(email)
    }
}

impl AsRef<str> for ValidEmail {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ValidEmail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<ValidEmail> for String {
    fn from(value: ValidEmail) -> Self {
        value.0
    }
}
