use crate::database::UserDb;
use crate::error::CatalogError;
use crate::model::*;
use crate::validation::RegistrationForm;
use actix_identity::CookieIdentityPolicy;
use actix_web::cookie::SameSite;
use log::{debug, info};

pub const SESSION_COOKIE: &str = "auth-cookie";

/// Signed session cookie. `SameSite=Lax` keeps cross-site form posts from
/// carrying the session.
pub fn session_policy(key: &[u8], secure: bool) -> CookieIdentityPolicy {
    CookieIdentityPolicy::new(key)
        .name(SESSION_COOKIE)
        .secure(secure)
        .same_site(SameSite::Lax)
}

/// Password hashing settings shared by the request handlers.
#[derive(Debug, Clone, Copy)]
pub struct Hasher {
    pub cost: u32,
}

pub fn register<D>(db: &D, hasher: Hasher, form: &RegistrationForm) -> Result<Caller, CatalogError>
where
    D: UserDb,
    CatalogError: From<D::Error>,
{
    let registration = form
        .clean()
        .map_err(|errors| CatalogError::invalid(errors, form))?;
    // add_user rechecks inside its transaction.
    if db.get_user_by_username(&registration.username)?.is_some() {
        return Err(CatalogError::DuplicateIdentity);
    }
    let user = User {
        username: registration.username,
        email: registration.email,
        password_hash: bcrypt::hash(&registration.password, hasher.cost)?,
    };
    let user_id = db
        .add_user(&user)?
        .ok_or(CatalogError::DuplicateIdentity)?;
    info!("registered user {} ({})", user.username, user_id);
    Ok(Caller {
        user_id,
        username: user.username,
    })
}

pub fn authenticate<D>(db: &D, username: &str, password: &str) -> Result<Caller, CatalogError>
where
    D: UserDb,
    CatalogError: From<D::Error>,
{
    if let Some((user_id, user)) = db.get_user_by_username(username)? {
        if bcrypt::verify(password, &user.password_hash)? {
            return Ok(Caller {
                user_id,
                username: user.username,
            });
        }
    }
    debug!("failed login for {:?}", username);
    Err(CatalogError::InvalidCredentials)
}

/// Turns the username remembered in the session into a `Caller`.
pub fn current_caller<D>(db: &D, session: Option<&str>) -> Result<Caller, CatalogError>
where
    D: UserDb,
    CatalogError: From<D::Error>,
{
    let username = session.ok_or(CatalogError::AuthenticationRequired)?;
    match db.get_user_by_username(username)? {
        Some((user_id, user)) => Ok(Caller {
            user_id,
            username: user.username,
        }),
        None => {
            debug!("session names unknown user {:?}", username);
            Err(CatalogError::AuthenticationRequired)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASHER: Hasher = Hasher { cost: 4 };

    fn form(username: &str, password: &str) -> RegistrationForm {
        RegistrationForm {
            username: username.to_owned(),
            email: format!("{}@example.com", username),
            password: password.to_owned(),
        }
    }

    #[test]
    fn register_and_login() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let alice = register(&db, HASHER, &form("alice", "pw")).unwrap();
        assert_eq!(alice.username, "alice");
        assert_eq!(authenticate(&db, "alice", "pw").unwrap(), alice);
        assert!(matches!(
            authenticate(&db, "alice", "wrong"),
            Err(CatalogError::InvalidCredentials)
        ));
        assert!(matches!(
            authenticate(&db, "nobody", "pw"),
            Err(CatalogError::InvalidCredentials)
        ));
    }

    #[test]
    fn duplicate_registration_keeps_account() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        register(&db, HASHER, &form("alice", "pw")).unwrap();
        let (_, before) = db.get_user_by_username("alice").unwrap().unwrap();

        assert!(matches!(
            register(&db, HASHER, &form("alice", "other")),
            Err(CatalogError::DuplicateIdentity)
        ));
        let (_, after) = db.get_user_by_username("alice").unwrap().unwrap();
        assert_eq!(before, after);
        assert!(authenticate(&db, "alice", "pw").is_ok());
        assert!(authenticate(&db, "alice", "other").is_err());
    }

    #[test]
    fn invalid_registration() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        match register(&db, HASHER, &form("", "")) {
            Err(CatalogError::ValidationFailed { errors, submitted }) => {
                assert!(errors.contains_key("username"));
                assert!(errors.contains_key("password"));
                assert!(submitted.get("password").is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn current_caller_requires_session() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let alice = register(&db, HASHER, &form("alice", "pw")).unwrap();
        assert_eq!(current_caller(&db, Some("alice")).unwrap(), alice);
        assert!(matches!(
            current_caller(&db, None),
            Err(CatalogError::AuthenticationRequired)
        ));
        assert!(matches!(
            current_caller(&db, Some("ghost")),
            Err(CatalogError::AuthenticationRequired)
        ));
    }
}
