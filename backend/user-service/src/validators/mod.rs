/// Input validation for signup, login and profile updates
use once_cell::sync::Lazy;
use regex::Regex;
use validator::ValidateEmail;

pub const MAX_USERNAME_LEN: usize = 254;
pub const MAX_EMAIL_LEN: usize = 255;
pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 200;
pub const MAX_FULL_NAME_LEN: usize = 100;
pub const MAX_AVATAR_URL_LEN: usize = 200;

static PHONE_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[0-9+()\-\s]{7,20}$").ok());

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid username")]
    Username,

    #[error("invalid password")]
    Password,

    #[error("invalid email")]
    Email,

    #[error("invalid email length")]
    EmailLength,

    #[error("full name is too long, maximum length is 100")]
    FullNameLength,

    #[error("invalid telephone format")]
    TelephoneFormat,

    #[error("invalid telephone length")]
    TelephoneLength,

    #[error("avatar is too large, maximum length is 200")]
    AvatarLength,
}

/// Validates email format according to RFC 5322
pub fn validate_email(email: &str) -> bool {
    email.validate_email()
}

/// Signup and login usernames are e-mail addresses. Returns the normalized
/// (trimmed, lowercased) address.
pub fn validate_username(username: &str) -> Result<String, ValidationError> {
    let username = username.trim();
    if username.is_empty() || username.len() > MAX_USERNAME_LEN {
        return Err(ValidationError::Username);
    }
    let email = username.to_lowercase();
    if !validate_email(&email) {
        return Err(ValidationError::Username);
    }
    Ok(email)
}

/// Length only, counted in characters; no composition rules.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    let len = password.chars().count();
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
        return Err(ValidationError::Password);
    }
    Ok(())
}

/// Profile e-mail change. Returns the trimmed address.
pub fn validate_profile_email(email: &str) -> Result<String, ValidationError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ValidationError::Email);
    }
    if email.len() > MAX_EMAIL_LEN {
        return Err(ValidationError::EmailLength);
    }
    if !validate_email(email) {
        return Err(ValidationError::Email);
    }
    Ok(email.to_string())
}

/// Returns the trimmed name. Blank clears it.
pub fn validate_full_name(full_name: &str) -> Result<String, ValidationError> {
    let full_name = full_name.trim();
    if full_name.chars().count() > MAX_FULL_NAME_LEN {
        return Err(ValidationError::FullNameLength);
    }
    Ok(full_name.to_string())
}

/// Empty clears the number. Otherwise 7-20 characters of digits, spaces and
/// `+()-`, holding 7-15 digits. Returns the trimmed number.
pub fn validate_telephone(telephone: &str) -> Result<String, ValidationError> {
    let telephone = telephone.trim();
    if telephone.is_empty() {
        return Ok(String::new());
    }

    let well_formed = PHONE_RE
        .as_ref()
        .map(|re| re.is_match(telephone))
        .unwrap_or(false);
    if !well_formed {
        return Err(ValidationError::TelephoneFormat);
    }

    let digits = telephone.chars().filter(|c| c.is_ascii_digit()).count();
    if !(7..=15).contains(&digits) {
        return Err(ValidationError::TelephoneLength);
    }
    Ok(telephone.to_string())
}

pub fn validate_avatar_url(avatar_url: &str) -> Result<String, ValidationError> {
    let avatar_url = avatar_url.trim();
    if avatar_url.len() > MAX_AVATAR_URL_LEN {
        return Err(ValidationError::AvatarLength);
    }
    Ok(avatar_url.to_string())
}
