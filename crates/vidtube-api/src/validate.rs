//! Input checks shared by every handler.

use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::AuthUser;

/// Parses a path identifier, failing with `message` when it is not a UUID.
pub fn parse_id(raw: &str, message: &str) -> Result<Uuid, ApiError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ApiError::bad_request(message));
    }
    raw.parse::<Uuid>().map_err(|_| ApiError::bad_request(message))
}

/// Trimmed value of an optional text field; blank counts as missing.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub fn ensure_owner(owner: Uuid, user: &AuthUser, message: &str) -> Result<(), ApiError> {
    if owner == user.id {
        Ok(())
    } else {
        Err(ApiError::unauthorized(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_id_rejects_garbage() {
        assert!(parse_id("not-an-id", "Invalid video Id").is_err());
        assert!(parse_id("  ", "Invalid video Id").is_err());

        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string(), "Invalid video Id").unwrap(), id);
    }

    #[test]
    fn non_blank_trims() {
        assert_eq!(non_blank(Some("  hi ")), Some("hi"));
        assert_eq!(non_blank(Some("   ")), None);
        assert_eq!(non_blank(None), None);
    }

    #[test]
    fn ensure_owner_compares_ids() {
        let user = AuthUser {
            id: Uuid::new_v4(),
            username: "alice".into(),
        };
        assert!(ensure_owner(user.id, &user, "nope").is_ok());
        let err = ensure_owner(Uuid::new_v4(), &user, "nope").unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(msg) if msg == "nope"));
    }
}
