//! Input validation shared by the client and the development backend.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Something that looks like an email address
    static ref EMAIL_REGEX: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();

    /// National phone number without the country prefix
    static ref PHONE_REGEX: Regex = Regex::new(r"^\d{10}$").unwrap();

    /// Verification code
    static ref CODE_REGEX: Regex = Regex::new(r"^\d{6}$").unwrap();

    /// Vehicle plate: letters, digits and dashes, 1-10 chars
    static ref PLATE_REGEX: Regex = Regex::new(r"^[A-Za-z0-9-]{1,10}$").unwrap();
}

pub fn is_valid_plate(plate: &str) -> bool {
    PLATE_REGEX.is_match(plate)
}

pub fn validate_phone(phone: &str) -> Result<(), String> {
    if PHONE_REGEX.is_match(phone) {
        Ok(())
    } else {
        Err("Please enter a valid Phone Number.".to_string())
    }
}

/// Validate an address and, when `allowed_domains` is non-empty, its suffix
pub fn validate_email(email: &str, allowed_domains: &[String]) -> Result<(), String> {
    if !EMAIL_REGEX.is_match(email) {
        return Err("Please enter a valid email address.".to_string());
    }

    if allowed_domains.is_empty() {
        return Ok(());
    }
    let lower = email.to_lowercase();
    if allowed_domains
        .iter()
        .any(|domain| lower.ends_with(&domain.to_lowercase()))
    {
        Ok(())
    } else {
        Err(format!(
            "Please use an email address from {}",
            allowed_domains.join(" or ")
        ))
    }
}

pub fn validate_code(code: &str) -> Result<(), String> {
    if CODE_REGEX.is_match(code) {
        Ok(())
    } else {
        Err("Please enter a valid 6-digit code.".to_string())
    }
}

/// Login accepts a phone number or an email. Emails are lowercased; phone
/// numbers lose a leading `+92` or `0`.
pub fn normalize_identifier(identifier: &str) -> String {
    let trimmed = identifier.trim();
    if trimmed.contains('@') {
        return trimmed.to_lowercase();
    }
    if let Some(rest) = trimmed.strip_prefix("+92") {
        rest.to_string()
    } else if let Some(rest) = trimmed.strip_prefix('0') {
        rest.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn campus_domains() -> Vec<String> {
        vec!["@maju.edu.pk".to_string(), "@jinnah.edu".to_string()]
    }

    #[test]
    fn test_plate() {
        assert!(is_valid_plate("ABC-123"));
        assert!(is_valid_plate("K1"));
        assert!(!is_valid_plate(""));
        assert!(!is_valid_plate("ABCDEFGHIJK"));
        assert!(!is_valid_plate("AB 12"));
    }

    #[test]
    fn test_phone() {
        assert!(validate_phone("3001234567").is_ok());
        assert!(validate_phone("300123456").is_err());
        assert!(validate_phone("30012345a7").is_err());
        assert!(validate_phone("03001234567").is_err());
    }

    #[test]
    fn test_email_domains() {
        let domains = campus_domains();
        assert!(validate_email("ali@maju.edu.pk", &domains).is_ok());
        assert!(validate_email("Ali@MAJU.EDU.PK", &domains).is_ok());
        assert!(validate_email("sara@jinnah.edu", &domains).is_ok());

        let err = validate_email("ali@gmail.com", &domains).unwrap_err();
        assert_eq!(err, "Please use an email address from @maju.edu.pk or @jinnah.edu");

        assert!(validate_email("ali@gmail.com", &[]).is_ok());
        assert!(validate_email("not an email", &[]).is_err());
        assert!(validate_email("ali@localhost", &[]).is_err());
    }

    #[test]
    fn test_code() {
        assert!(validate_code("123456").is_ok());
        assert!(validate_code("12345").is_err());
        assert!(validate_code("12a456").is_err());
    }

    #[test]
    fn test_normalize_identifier() {
        assert_eq!(normalize_identifier("+923001234567"), "3001234567");
        assert_eq!(normalize_identifier("03001234567"), "3001234567");
        assert_eq!(normalize_identifier("3001234567"), "3001234567");
        assert_eq!(normalize_identifier(" Ali@MAJU.edu.pk "), "ali@maju.edu.pk");
    }
}
