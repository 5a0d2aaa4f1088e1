use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, error::ErrorUnauthorized};
use futures::future::{Ready, ready};

use crate::error::AppError;
use crate::model::role::Role;
use crate::model::user::User;

/// Identity bound to the request by one of the guards in
/// [`crate::auth::middleware`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub verified: bool,

    /// Session id, needed to revoke the session on logout.
    pub jti: String,
}

impl AuthUser {
    pub fn from_session(user: &User, jti: String) -> Option<Self> {
        Some(Self {
            user_id: user.id,
            email: user.email.clone(),
            name: user.full_name(),
            role: user.role()?,
            verified: user.is_verified(),
            jti,
        })
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("admin only"))
        }
    }
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        match req.extensions().get::<AuthUser>() {
            Some(user) => ready(Ok(user.clone())),
            None => ready(Err(ErrorUnauthorized("Not authenticated"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn user(role: &str, verified: bool) -> User {
        User {
            id: 5,
            last_name: "Yamada".into(),
            first_name: "Taro".into(),
            email: "taro@example.com".into(),
            password: String::new(),
            role: role.into(),
            email_verified_at: verified
                .then(|| NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()),
        }
    }

    #[test]
    fn admin_check_follows_role() {
        let admin = AuthUser::from_session(&user("admin", true), "j".into()).unwrap();
        assert!(admin.require_admin().is_ok());

        let member = AuthUser::from_session(&user("member", false), "j".into()).unwrap();
        assert!(matches!(member.require_admin(), Err(AppError::Forbidden(_))));
        assert!(!member.verified);
        assert_eq!(member.name, "Yamada Taro");
    }

    #[test]
    fn unknown_role_yields_no_identity() {
        assert!(AuthUser::from_session(&user("hr", true), "j".into()).is_none());
    }
}
