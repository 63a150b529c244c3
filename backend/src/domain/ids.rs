//! Identifier newtypes for principals, tenants, and onboarding sessions.
//!
//! Identifiers arrive as opaque strings from credentials, the membership
//! store, and notification payloads. Each newtype trims its input and rejects
//! blank values so services never compare against an empty id.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Validation errors raised by identifier constructors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdValidationError {
    /// The identifier was empty once trimmed.
    #[error("{kind} must not be empty")]
    Empty {
        /// Name of the identifier kind.
        kind: &'static str,
    },
    /// The identifier contained characters or a length the kind rejects.
    #[error("{kind} is malformed")]
    Malformed {
        /// Name of the identifier kind.
        kind: &'static str,
    },
}

macro_rules! define_string_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Validate and wrap a raw identifier.
            pub fn new(value: impl AsRef<str>) -> Result<Self, IdValidationError> {
                let trimmed = value.as_ref().trim();
                if trimmed.is_empty() {
                    return Err(IdValidationError::Empty { kind: $kind });
                }
                Ok(Self(trimmed.to_owned()))
            }

            /// Borrow the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

define_string_id!(
    /// Stable identifier of an authenticated user (the credential subject).
    UserId,
    "user id"
);
define_string_id!(
    /// Identifier of an organization (tenant).
    OrganizationId,
    "organization id"
);
define_string_id!(
    /// Identifier of a division inside an organization.
    DivisionId,
    "division id"
);
define_string_id!(
    /// Identifier of one onboarding session; the snapshot primary key.
    OnboardingSessionId,
    "onboarding session id"
);

#[cfg(test)]
mod tests {
    //! Regression coverage for identifier validation.
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("")]
    #[case("   ")]
    fn blank_identifiers_are_rejected(#[case] raw: &str) {
        let err = OrganizationId::new(raw).expect_err("blank ids are invalid");
        assert_eq!(
            err,
            IdValidationError::Empty {
                kind: "organization id"
            }
        );
        assert_eq!(err.to_string(), "organization id must not be empty");
    }

    #[rstest]
    fn identifiers_are_trimmed() {
        let id = DivisionId::new("  div-1 ").expect("valid id");
        assert_eq!(id.as_str(), "div-1");
    }

    #[rstest]
    fn deserialisation_validates() {
        let ok: UserId = serde_json::from_str("\"user-1\"").expect("valid id");
        assert_eq!(ok.to_string(), "user-1");
        assert!(serde_json::from_str::<UserId>("\"  \"").is_err());
    }
}
