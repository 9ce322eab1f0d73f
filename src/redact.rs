//! Masking helpers for identifiers and credentials that end up in logs.

const MASK: &str = "***";

/// Keep the first UUID group of an identifier, mask the rest.
///
/// `5d7b4a1c-f983-43d8-87c1-613a72509706` becomes `5d7b4a1c-****`.
#[must_use]
pub fn mask_id(id: &str) -> String {
    if id.len() < 8 || !id.is_char_boundary(8) {
        return MASK.to_string();
    }
    format!("{}-****", &id[..8])
}

/// Keep the first two characters of the local part and the full domain.
#[must_use]
pub fn mask_email(email: &str) -> String {
    let Some((local, domain)) = email.split_once('@') else {
        return MASK.to_string();
    };
    if local.is_empty() || domain.is_empty() {
        return MASK.to_string();
    }

    let chars: Vec<char> = local.chars().collect();
    if chars.len() <= 2 {
        return format!("**@{domain}");
    }
    let visible: String = chars[..2].iter().collect();
    format!("{visible}**@{domain}")
}

/// Keep the first 20 characters of a bearer token.
#[must_use]
pub fn mask_token(token: &str) -> String {
    const VISIBLE: usize = 20;
    if token.chars().count() <= VISIBLE {
        return MASK.to_string();
    }
    let visible: String = token.chars().take(VISIBLE).collect();
    format!("{visible}...")
}
