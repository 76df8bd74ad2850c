//! Owner/author gate shared by properties, posts and comments.
//!
//! Reads are public. Writes are allowed only to the identity recorded as the
//! resource's owner when it was created; that attribute is never reassigned,
//! so the check is evaluated fresh on every request.

use uuid::Uuid;

use crate::error::AppError;

/// Anything whose write access belongs to a single user.
pub trait Owned {
    fn owner_id(&self) -> Uuid;
}

pub fn can_write<R: Owned + ?Sized>(identity: Option<Uuid>, resource: &R) -> bool {
    identity.is_some_and(|id| id == resource.owner_id())
}

/// `Unauthorized` for anonymous callers, `Forbidden` for everyone but the owner.
pub fn ensure_can_write<R: Owned + ?Sized>(
    identity: Option<Uuid>,
    resource: &R,
) -> Result<(), AppError> {
    match identity {
        None => Err(AppError::Unauthorized(
            "Authentication credentials were not provided.".into(),
        )),
        Some(_) if can_write(identity, resource) => Ok(()),
        Some(_) => Err(AppError::Forbidden(
            "You do not have permission to perform this action.".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Listing {
        owner: Uuid,
    }

    impl Owned for Listing {
        fn owner_id(&self) -> Uuid {
            self.owner
        }
    }

    #[test]
    fn only_owner_can_write() {
        let owner = Uuid::new_v4();
        let listing = Listing { owner };
        assert!(can_write(Some(owner), &listing));
        assert!(!can_write(Some(Uuid::new_v4()), &listing));
        assert!(!can_write(None, &listing));
    }

    #[test]
    fn ensure_distinguishes_anonymous_from_stranger() {
        let owner = Uuid::new_v4();
        let listing = Listing { owner };
        assert!(ensure_can_write(Some(owner), &listing).is_ok());
        assert!(matches!(
            ensure_can_write(Some(Uuid::new_v4()), &listing),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            ensure_can_write(None, &listing),
            Err(AppError::Unauthorized(_))
        ));
    }
}
