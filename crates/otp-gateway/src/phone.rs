//! Phone number canonicalization.

use crate::error::GatewayError;
use phonenumber::Mode;

/// Parse a user-supplied phone number and render it in E.164 form.
///
/// The number must carry its country code; no default region is assumed.
pub fn canonicalize(raw: &str) -> Result<String, GatewayError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(GatewayError::InvalidPhoneNumber(
            "Phone number must not be empty".into(),
        ));
    }

    let number = phonenumber::parse(None, raw)
        .map_err(|e| GatewayError::InvalidPhoneNumber(e.to_string()))?;

    Ok(number.format().mode(Mode::E164).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_formats() {
        assert_eq!(canonicalize("+1 415 555 0100").unwrap(), "+14155550100");
        assert_eq!(canonicalize("+1 (415) 555-0100").unwrap(), "+14155550100");
        assert_eq!(canonicalize("  +14155550100 ").unwrap(), "+14155550100");
        assert_eq!(canonicalize("+44 20 7946 0958").unwrap(), "+442079460958");
    }

    #[test]
    fn test_canonicalize_is_idempotent() {
        let once = canonicalize("+1 415 555 0100").unwrap();
        assert_eq!(canonicalize(&once).unwrap(), once);
    }

    #[test]
    fn test_canonicalize_rejects_garbage() {
        assert!(matches!(
            canonicalize(""),
            Err(GatewayError::InvalidPhoneNumber(_))
        ));
        assert!(matches!(
            canonicalize("not a phone"),
            Err(GatewayError::InvalidPhoneNumber(_))
        ));
    }
}
