use warp::{
    http::{header::AUTHORIZATION, HeaderMap},
    reject::Rejection,
    Filter,
};

use super::jwt::{SessionData, SessionKey};
use crate::error::ApiError;

const SCHEMES: [&str; 2] = ["bearer", "token"];
const NOT_PROVIDED: &str = "Authentication credentials were not provided.";

/// Pulls the token out of an `Authorization` header value.
///
/// Both `Bearer <token>` and `Token <token>` are accepted. A header with some
/// other scheme counts as no credentials at all.
pub fn parse_authorization(header: Option<&str>) -> Result<&str, ApiError> {
    let mut parts = header.unwrap_or_default().split_whitespace();

    let scheme = parts.next().map(|scheme| scheme.to_ascii_lowercase());
    if !scheme.is_some_and(|scheme| SCHEMES.contains(&scheme.as_str())) {
        return Err(ApiError::Unauthenticated(NOT_PROVIDED));
    }

    match (parts.next(), parts.next()) {
        (Some(token), None) => Ok(token),
        (None, _) => Err(ApiError::Unauthenticated(
            "Invalid token header. No credentials provided.",
        )),
        (Some(_), Some(_)) => Err(ApiError::Unauthenticated(
            "Invalid token header. Token string should not contain spaces.",
        )),
    }
}

/// Extracts the session from the `Authorization` header. A header that is not
/// visible ASCII is treated as absent.
pub fn with_session(
    key: SessionKey,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::header::headers_cloned().and_then(move |headers: HeaderMap| {
        let key = key.clone();
        async move {
            let header = headers
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok());
            let token = parse_authorization(header)?;
            let session = key.verify_session(token)?;
            Ok::<_, Rejection>(SessionData::from(session))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_both_schemes() {
        assert_eq!(parse_authorization(Some("Bearer abc")).unwrap(), "abc");
        assert_eq!(parse_authorization(Some("Token abc")).unwrap(), "abc");
        assert_eq!(parse_authorization(Some("token abc")).unwrap(), "abc");
    }

    #[test]
    fn missing_or_foreign_header_means_no_credentials() {
        for header in [None, Some(""), Some("Basic dXNlcjpwYXNz")] {
            assert!(matches!(
                parse_authorization(header),
                Err(ApiError::Unauthenticated(NOT_PROVIDED))
            ));
        }
    }

    #[test]
    fn malformed_headers_are_rejected() {
        assert!(matches!(
            parse_authorization(Some("Bearer")),
            Err(ApiError::Unauthenticated(
                "Invalid token header. No credentials provided."
            ))
        ));
        assert!(matches!(
            parse_authorization(Some("Bearer a b")),
            Err(ApiError::Unauthenticated(
                "Invalid token header. Token string should not contain spaces."
            ))
        ));
    }

    #[tokio::test]
    async fn filter_extracts_the_session() {
        let key = SessionKey::new("test-secret", 1).unwrap();
        let user = crate::schema::User {
            id: 3,
            email: String::from("a@example.com"),
            name: String::from("A"),
            password: String::new(),
            is_active: true,
            is_staff: false,
        };
        let token = key.generate_session(&user).unwrap();

        let session = warp::test::request()
            .header("authorization", format!("Token {token}"))
            .filter(&with_session(key.clone()))
            .await
            .unwrap();
        assert_eq!(session.user_id, 3);

        let rejected = warp::test::request()
            .filter(&with_session(key))
            .await;
        assert!(rejected.is_err());
    }

    #[tokio::test]
    async fn undecodable_header_counts_as_missing() {
        let key = SessionKey::new("test-secret", 1).unwrap();

        let rejection = warp::test::request()
            .header("authorization", &b"Bearer \xff\xfe"[..])
            .filter(&with_session(key))
            .await
            .unwrap_err();

        assert!(matches!(
            rejection.find::<ApiError>(),
            Some(ApiError::Unauthenticated(NOT_PROVIDED))
        ));
    }
}
