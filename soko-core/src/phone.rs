use serde::{Deserialize, Serialize};

/// A normalized Kenyan mobile subscriber number: `254` followed by nine
/// digits, the first of which is `7`. The only way to construct one is
/// through [`Msisdn::normalize`], so a held value is always valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Msisdn(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid subscriber number: {0}")]
pub struct InvalidPhoneNumber(pub String);

impl Msisdn {
    /// Normalize a user-supplied phone number to the `2547XXXXXXXX` form.
    ///
    /// Accepted shapes: `+254XXXXXXXXX`, `254XXXXXXXXX`, `0XXXXXXXXX`,
    /// bare `XXXXXXXXX`, plus a tolerated twelve-digit form with a foreign
    /// country prefix where the trailing nine digits are a valid subscriber
    /// number. Separators (spaces, dashes) are stripped first. Anything that
    /// does not reduce to `2547...` is rejected.
    pub fn normalize(raw: &str) -> Result<Self, InvalidPhoneNumber> {
        let cleaned: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

        let candidate = if cleaned.len() == 12 && cleaned.starts_with("254") {
            cleaned
        } else if cleaned.len() == 10 && cleaned.starts_with('0') {
            format!("254{}", &cleaned[1..])
        } else if cleaned.len() == 9 {
            format!("254{}", cleaned)
        } else if cleaned.len() == 12 {
            // Unknown 3-digit prefix; salvage the subscriber part.
            format!("254{}", &cleaned[3..])
        } else {
            return Err(InvalidPhoneNumber(raw.to_string()));
        };

        if candidate.starts_with("2547") && candidate.len() == 12 {
            Ok(Msisdn(candidate))
        } else {
            Err(InvalidPhoneNumber(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Msisdn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Msisdn {
    type Error = InvalidPhoneNumber;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Msisdn::normalize(&value)
    }
}

impl From<Msisdn> for String {
    fn from(value: Msisdn) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_accepted_shapes_converge() {
        for raw in ["+254712345678", "254712345678", "0712345678", "712345678"] {
            assert_eq!(
                Msisdn::normalize(raw).unwrap().as_str(),
                "254712345678",
                "shape {raw}"
            );
        }
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let once = Msisdn::normalize("0712345678").unwrap();
        let twice = Msisdn::normalize(once.as_str()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_separators_are_stripped() {
        assert_eq!(
            Msisdn::normalize("+254 712-345 678").unwrap().as_str(),
            "254712345678"
        );
    }

    #[test]
    fn test_foreign_prefix_salvage() {
        // Twelve digits, unknown prefix, valid trailing subscriber number.
        assert_eq!(
            Msisdn::normalize("255712345678").unwrap().as_str(),
            "254712345678"
        );
    }

    #[test]
    fn test_rejects_non_subscriber_shapes() {
        for raw in [
            "",
            "12345",
            "0112345678",   // landline-style, not a 7-prefixed subscriber
            "254112345678", // full form but wrong subscriber prefix
            "25471234567",  // eleven digits
            "2547123456789",
            "not a number",
        ] {
            assert!(Msisdn::normalize(raw).is_err(), "accepted {raw:?}");
        }
    }
}
