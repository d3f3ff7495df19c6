use async_trait::async_trait;
use pgwire::api::auth::{AuthSource, LoginInfo, Password};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};

/// Login accepted by the server. With no `user`, any user name may log in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: Option<String>,
    pub password: String,
}

impl Credentials {
    pub fn new(user: Option<String>, password: impl Into<String>) -> Self {
        Self {
            user,
            password: password.into(),
        }
    }

    fn admits(&self, user: Option<&str>) -> bool {
        match &self.user {
            None => true,
            Some(expected) => user == Some(expected.as_str()),
        }
    }
}

impl From<String> for Credentials {
    fn from(password: String) -> Self {
        Self::new(None, password)
    }
}

#[derive(Debug)]
pub struct VacancyAuthSource {
    credentials: Credentials,
}

impl VacancyAuthSource {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl AuthSource for VacancyAuthSource {
    async fn get_password(&self, login: &LoginInfo) -> PgWireResult<Password> {
        let user: Option<&str> = login.user().map(|name| &name[..]);
        if !self.credentials.admits(user) {
            return Err(PgWireError::UserError(Box::new(ErrorInfo::new(
                "FATAL".into(),
                "28000".into(),
                format!("role \"{}\" is not permitted to log in", user.unwrap_or("")),
            ))));
        }
        Ok(Password::new(None, self.credentials.password.as_bytes().to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_user_without_restriction() {
        let creds = Credentials::from("secret".to_string());
        assert!(creds.admits(Some("frontdesk")));
        assert!(creds.admits(None));
    }

    #[test]
    fn restricted_user() {
        let creds = Credentials::new(Some("frontdesk".into()), "secret");
        assert!(creds.admits(Some("frontdesk")));
        assert!(!creds.admits(Some("housekeeping")));
        assert!(!creds.admits(None));
    }
}
