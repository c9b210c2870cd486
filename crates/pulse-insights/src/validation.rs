//! Form field rules shared by the sign-up/settings screens and the API.

use pulse_types::api::FieldError;

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 32;
pub const PASSWORD_MIN: usize = 8;

fn field(name: &str, message: &str) -> FieldError {
    FieldError {
        field: name.to_string(),
        message: message.to_string(),
    }
}

pub fn validate_username(username: &str) -> Result<(), FieldError> {
    let len = username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        return Err(field("username", "Username must be 3 to 32 characters"));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(field(
            "username",
            "Username may only contain letters, digits, '_', '-' and '.'",
        ));
    }
    Ok(())
}

/// Shape check only: one `@`, non-empty local part, dotted domain.
pub fn validate_email(email: &str) -> Result<(), FieldError> {
    let invalid = || field("email", "Enter a valid email address");
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') || email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) if !host.is_empty() && !tld.is_empty() => Ok(()),
        _ => Err(invalid()),
    }
}

pub fn validate_password(password: &str) -> Result<(), FieldError> {
    if password.chars().count() < PASSWORD_MIN {
        return Err(field("password", "Password must be at least 8 characters"));
    }
    Ok(())
}

pub fn validate_confirmation(password: &str, confirmation: &str) -> Result<(), FieldError> {
    if password != confirmation {
        return Err(field("confirm_password", "Passwords do not match"));
    }
    Ok(())
}

/// Check a whole sign-up form, reporting every failing field.
pub fn validate_signup(email: &str, password: &str, confirmation: &str, username: &str) -> Vec<FieldError> {
    [
        validate_email(email),
        validate_password(password),
        validate_confirmation(password, confirmation),
        validate_username(username),
    ]
    .into_iter()
    .filter_map(Result::err)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_shapes() {
        assert!(validate_email("dana@example.com").is_ok());
        for bad in ["dana", "@example.com", "dana@example", "dana@@example.com", "da na@example.com", "dana@.com"] {
            assert!(validate_email(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_username_rules() {
        assert!(validate_username("dana_k").is_ok());
        assert!(validate_username("da").is_err());
        assert!(validate_username(&"x".repeat(33)).is_err());
        assert!(validate_username("dana k").is_err());
    }

    #[test]
    fn test_signup_reports_each_field() {
        let errors = validate_signup("nope", "short", "shorter", "ok_name");
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["email", "password", "confirm_password"]);
        assert!(validate_signup("dana@example.com", "hunter22", "hunter22", "dana").is_empty());
    }
}
