use thiserror::Error;

/// Authentication and authorization failures.
///
/// The first three variants describe why a presented session token was not
/// accepted. They never reach a client directly: the session middleware turns
/// them into an anonymous context and the guard reports `Unauthorized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Session token is malformed or its signature is invalid")]
    MalformedToken,

    #[error("Session token has expired")]
    ExpiredToken,

    #[error("Session subject no longer exists")]
    UnknownSubject,

    #[error("Authentication required")]
    Unauthorized,

    #[error("Access denied")]
    Forbidden,
}

impl AuthError {
    #[must_use]
    pub const fn metric_label(self) -> &'static str {
        match self {
            Self::MalformedToken => "malformed_token",
            Self::ExpiredToken => "expired_token",
            Self::UnknownSubject => "unknown_subject",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_labels_are_distinct() {
        let labels = [
            AuthError::MalformedToken,
            AuthError::ExpiredToken,
            AuthError::UnknownSubject,
            AuthError::Unauthorized,
            AuthError::Forbidden,
        ]
        .map(AuthError::metric_label);
        let unique: std::collections::HashSet<_> = labels.iter().collect();
        assert_eq!(unique.len(), labels.len());
    }

    #[test]
    fn forbidden_message_does_not_name_a_permission() {
        assert_eq!(AuthError::Forbidden.to_string(), "Access denied");
    }
}
