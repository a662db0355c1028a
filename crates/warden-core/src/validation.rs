//! Input normalization for identifiers supplied by callers.

use uuid::Uuid;

use crate::error::{WardenError, WardenResult};

pub const MAX_SLUG_LEN: usize = 50;
pub const MAX_HOSTNAME_LEN: usize = 253;

/// Normalize a tenant or role slug.
///
/// Lowercases, maps whitespace and underscores to `-`, and trims
/// surrounding hyphens. Any remaining character outside `[a-z0-9-]` is
/// rejected rather than silently dropped.
pub fn normalize_slug(raw: &str) -> WardenResult<String> {
    normalize_with(raw, "slug", |c| c == '-')
}

/// Normalize a permission slug. Same rules as [`normalize_slug`] but `.`
/// is also kept so capabilities can be namespaced (`catalog.read`).
pub fn normalize_permission_slug(raw: &str) -> WardenResult<String> {
    normalize_with(raw, "permission slug", |c| c == '-' || c == '.')
}

fn normalize_with(raw: &str, what: &str, extra: impl Fn(char) -> bool) -> WardenResult<String> {
    let mapped: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_whitespace() || c == '_' {
                '-'
            } else {
                c.to_ascii_lowercase()
            }
        })
        .collect();
    let slug = mapped.trim_matches('-').to_string();

    if slug.is_empty() {
        return Err(WardenError::invalid_argument(format!("{what} is empty")));
    }
    if slug.len() > MAX_SLUG_LEN {
        return Err(WardenError::invalid_argument(format!(
            "{what} exceeds {MAX_SLUG_LEN} characters"
        )));
    }
    if let Some(bad) = slug
        .chars()
        .find(|&c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || extra(c)))
    {
        return Err(WardenError::invalid_argument(format!(
            "{what} contains invalid character {bad:?}"
        )));
    }
    Ok(slug)
}

/// Normalize a DNS hostname: lowercase, no trailing dot, LDH labels.
pub fn normalize_hostname(raw: &str) -> WardenResult<String> {
    let host = raw.trim().trim_end_matches('.').to_ascii_lowercase();
    if host.is_empty() {
        return Err(WardenError::invalid_argument("hostname is empty"));
    }
    if host.len() > MAX_HOSTNAME_LEN {
        return Err(WardenError::invalid_argument(format!(
            "hostname exceeds {MAX_HOSTNAME_LEN} characters"
        )));
    }
    for label in host.split('.') {
        let valid = !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !valid {
            return Err(WardenError::invalid_argument(format!(
                "invalid hostname: {raw}"
            )));
        }
    }
    Ok(host)
}

/// Normalize an email address for identity lookup.
pub fn normalize_email(raw: &str) -> WardenResult<String> {
    let email = raw.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace) =>
        {
            Ok(email)
        }
        _ => Err(WardenError::invalid_argument(format!(
            "invalid email address: {raw}"
        ))),
    }
}

/// Reject the nil UUID, which callers use as an "empty" id.
pub fn require_id(id: Uuid, field: &str) -> WardenResult<Uuid> {
    if id.is_nil() {
        return Err(WardenError::invalid_argument(format!("{field} is empty")));
    }
    Ok(id)
}

pub fn require_text(value: &str, field: &str) -> WardenResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(WardenError::invalid_argument(format!("{field} is empty")));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn slug_is_lowercased_and_dashed() {
        assert_eq!(normalize_slug("  Acme Corp ").unwrap(), "acme-corp");
        assert_eq!(normalize_slug("ACME_labs").unwrap(), "acme-labs");
        assert_eq!(normalize_slug("-edge-").unwrap(), "edge");
    }

    #[test]
    fn slug_rejects_foreign_characters() {
        assert!(normalize_slug("acme!").is_err());
        assert!(normalize_slug("acmé").is_err());
        assert!(normalize_slug("a.b").is_err());
        assert!(normalize_slug("   ").is_err());
        assert!(normalize_slug(&"a".repeat(MAX_SLUG_LEN + 1)).is_err());
    }

    #[test]
    fn permission_slug_keeps_dots() {
        assert_eq!(
            normalize_permission_slug("Catalog.Read").unwrap(),
            "catalog.read"
        );
    }

    #[test]
    fn hostname_normalization() {
        assert_eq!(
            normalize_hostname("Acme.Example.COM.").unwrap(),
            "acme.example.com"
        );
        assert!(normalize_hostname("acme..example.com").is_err());
        assert!(normalize_hostname("-acme.example.com").is_err());
        assert!(normalize_hostname("acme_example.com").is_err());
        assert!(normalize_hostname("").is_err());
    }

    #[test]
    fn email_normalization() {
        assert_eq!(
            normalize_email(" Bob@Acme.com ").unwrap(),
            "bob@acme.com"
        );
        assert!(normalize_email("bob").is_err());
        assert!(normalize_email("@acme.com").is_err());
        assert!(normalize_email("bob@").is_err());
        assert!(normalize_email("bob@a@b").is_err());
        assert!(normalize_email("b ob@acme.com").is_err());
    }

    #[test]
    fn nil_ids_are_rejected() {
        assert!(require_id(Uuid::nil(), "tenant_id").is_err());
        assert!(require_id(Uuid::new_v4(), "tenant_id").is_ok());
    }

    proptest! {
        #[test]
        fn normalized_slugs_are_url_safe(raw in "[A-Za-z0-9 _-]{1,40}") {
            if let Ok(slug) = normalize_slug(&raw) {
                prop_assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
                prop_assert!(!slug.starts_with('-') && !slug.ends_with('-'));
                prop_assert_eq!(normalize_slug(&slug).unwrap(), slug);
            }
        }
    }
}
