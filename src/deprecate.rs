use tracing::warn;

const BASE_URL: &str = "DEPRECATIONS.md#";

pub fn notice_url(property: &str) -> String {
    format!("{BASE_URL}{}", property.replace(['.', '_'], "-"))
}

/// Warns that `property` is deprecated.
pub fn notice(property: &str) {
    warn!(
        property,
        "DEPRECATED: `{}` should not be used anymore, check {} for more info.",
        property,
        notice_url(property)
    );
}

#[cfg(test)]
mod tests {
    use super::notice_url;

    #[test]
    fn anchors_replace_separators() {
        assert_eq!(notice_url("git.short_hash"), "DEPRECATIONS.md#git-short-hash");
        assert_eq!(notice_url("foo.bar.whatever"), "DEPRECATIONS.md#foo-bar-whatever");
    }
}
