//! User model
//!
//! The user entity plus the validated name, email and password rules applied
//! at signup and profile update.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{new_id, ValidationError};

static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9가-힣 ]+$").expect("valid name regex"));

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").expect("valid email regex")
});

const PASSWORD_SPECIALS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?/~`'\"\\";

/// A registered user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new user with role `USER`.
    ///
    /// The password must already be hashed, see `services::password::hash_password`.
    pub fn new(name: UserName, email: Email, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            name: name.into_inner(),
            email: email.into_inner(),
            password_hash,
            role: UserRole::User,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// User role for authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    #[default]
    User,
    Admin,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::User => write!(f, "USER"),
            UserRole::Admin => write!(f, "ADMIN"),
        }
    }
}

impl FromStr for UserRole {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "USER" => Ok(UserRole::User),
            "ADMIN" => Ok(UserRole::Admin),
            _ => Err(ValidationError::new(format!("Invalid user role: {}", s))),
        }
    }
}

/// Display name: 2 to 32 letters, digits, Hangul syllables or spaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserName(String);

impl UserName {
    pub const MIN_LENGTH: usize = 2;
    pub const MAX_LENGTH: usize = 32;

    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let name = raw.trim();
        let len = name.chars().count();
        if !(Self::MIN_LENGTH..=Self::MAX_LENGTH).contains(&len) {
            return Err(ValidationError::new(format!(
                "Name must be between {} and {} characters",
                Self::MIN_LENGTH,
                Self::MAX_LENGTH
            )));
        }
        if !NAME_PATTERN.is_match(name) {
            return Err(ValidationError::new(
                "Name may only contain letters, digits, Hangul and spaces",
            ));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Email address, normalized to lowercase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email(String);

impl Email {
    pub const MAX_LENGTH: usize = 255;

    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let email = raw.trim().to_lowercase();
        if email.is_empty() || email.len() > Self::MAX_LENGTH {
            return Err(ValidationError::new("Invalid email address"));
        }
        if email.contains("..") || !EMAIL_PATTERN.is_match(&email) {
            return Err(ValidationError::new("Invalid email address"));
        }
        Ok(Self(email))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Check the password policy: 8 to 64 characters, no whitespace, and at least
/// one uppercase letter, lowercase letter, digit and special character.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    let len = password.chars().count();
    if !(8..=64).contains(&len) {
        return Err(ValidationError::new(
            "Password must be between 8 and 64 characters",
        ));
    }
    if password.chars().any(char::is_whitespace) {
        return Err(ValidationError::new("Password must not contain whitespace"));
    }
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| PASSWORD_SPECIALS.contains(c));
    if !(has_upper && has_lower && has_digit && has_special) {
        return Err(ValidationError::new(
            "Password must include uppercase, lowercase, digit and special characters",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_user_new_defaults() {
        let user = User::new(
            UserName::parse("Alice").unwrap(),
            Email::parse("alice@example.com").unwrap(),
            "hash".to_string(),
        );
        assert_eq!(user.role, UserRole::User);
        assert!(!user.is_admin());
        assert_eq!(user.created_at, user.updated_at);
        assert!(!user.id.is_empty());
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User::new(
            UserName::parse("Alice").unwrap(),
            Email::parse("alice@example.com").unwrap(),
            "secret-hash".to_string(),
        );
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(json.contains("\"role\":\"USER\""));
    }

    #[test]
    fn test_role_parse_and_display() {
        assert_eq!("admin".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert_eq!("USER".parse::<UserRole>().unwrap(), UserRole::User);
        assert!("editor".parse::<UserRole>().is_err());
        assert_eq!(UserRole::Admin.to_string(), "ADMIN");
    }

    #[test]
    fn test_user_name_rules() {
        assert_eq!(UserName::parse("  홍길동 ").unwrap().as_str(), "홍길동");
        assert!(UserName::parse("Jo Smith").is_ok());
        assert!(UserName::parse("a").is_err());
        assert!(UserName::parse(&"a".repeat(33)).is_err());
        assert!(UserName::parse("bad_name").is_err());
        assert!(UserName::parse("emoji🙂").is_err());
    }

    #[test]
    fn test_email_rules() {
        assert_eq!(
            Email::parse(" Alice@Example.COM ").unwrap().as_str(),
            "alice@example.com"
        );
        assert!(Email::parse("no-at-sign").is_err());
        assert!(Email::parse("a..b@example.com").is_err());
        assert!(Email::parse("a@example").is_err());
        assert!(Email::parse("a@example.c").is_err());
    }

    #[test]
    fn test_password_rules() {
        assert!(validate_password("Passw0rd!").is_ok());
        assert!(validate_password("Pw0!").is_err());
        assert!(validate_password("password1!").is_err());
        assert!(validate_password("PASSWORD1!").is_err());
        assert!(validate_password("Password!!").is_err());
        assert!(validate_password("Password11").is_err());
        assert!(validate_password("Pass word1!").is_err());
        assert!(validate_password(&format!("Aa1!{}", "x".repeat(61))).is_err());
    }

    proptest! {
        #[test]
        fn valid_ascii_names_round_trip(name in "[A-Za-z0-9]{2,32}") {
            let parsed = UserName::parse(&name).unwrap();
            prop_assert_eq!(parsed.as_str(), name.as_str());
        }

        #[test]
        fn email_is_always_lowercased(local in "[A-Za-z0-9]{1,10}", domain in "[A-Za-z]{1,10}") {
            let raw = format!("{}@{}.COM", local, domain);
            let email = Email::parse(&raw).unwrap();
            prop_assert_eq!(email.as_str(), raw.to_lowercase());
        }
    }
}
