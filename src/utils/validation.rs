use regex::Regex;

pub fn validate_email(email: &str) -> bool {
    let re = Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap();
    re.is_match(email)
}

/// Plan slugs: lowercase letters, digits, `-` and `_`.
pub fn validate_slug(slug: &str) -> bool {
    let re = Regex::new(r"^[a-z0-9][a-z0-9_-]{0,63}$").unwrap();
    re.is_match(slug)
}

pub fn generate_otp() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let otp: u32 = rng.gen_range(100000..1000000);
    otp.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert!(validate_email("hr@acme.co.in"));
        assert!(!validate_email("hr@acme"));
        assert!(!validate_email("no-at-sign.com"));
    }

    #[test]
    fn slugs() {
        assert!(validate_slug("gold"));
        assert!(validate_slug("employer-pro_12"));
        assert!(!validate_slug("Gold"));
        assert!(!validate_slug("../etc"));
    }

    #[test]
    fn otp_is_six_digits() {
        for _ in 0..50 {
            let otp = generate_otp();
            assert_eq!(otp.len(), 6);
            assert!(otp.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
