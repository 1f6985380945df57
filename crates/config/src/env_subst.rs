//! `${VAR}` and `${VAR:-fallback}` expansion for raw config text.

/// Expand placeholders against the process environment.
///
/// Unset variables without a fallback are left untouched so the parser
/// reports them in context instead of silently reading an empty string.
pub fn substitute_env(input: &str) -> String {
    substitute_env_with(input, |name| std::env::var(name).ok())
}

fn substitute_env_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let Some(end) = after.find('}') else {
            // Unterminated placeholder: copy the remainder verbatim.
            out.push_str(&rest[start..]);
            return out;
        };

        let body = &after[..end];
        let (name, fallback) = match body.split_once(":-") {
            Some((name, fallback)) => (name, Some(fallback)),
            None => (body, None),
        };

        match (name.is_empty(), lookup(name), fallback) {
            (false, Some(value), _) => out.push_str(&value),
            (false, None, Some(fallback)) => out.push_str(fallback),
            _ => out.push_str(&rest[start..start + 2 + end + 1]),
        }

        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    fn lookup(name: &str) -> Option<String> {
        match name {
            "CRONKEEPER_DB" => Some("sqlite://jobs.db".to_string()),
            "CRONKEEPER_EMPTY" => Some(String::new()),
            _ => None,
        }
    }

    #[rstest]
    #[case("url = \"${CRONKEEPER_DB}\"", "url = \"sqlite://jobs.db\"")]
    #[case("${CRONKEEPER_MISSING}", "${CRONKEEPER_MISSING}")]
    #[case("${CRONKEEPER_MISSING:-fallback}", "fallback")]
    #[case("${CRONKEEPER_DB:-unused}", "sqlite://jobs.db")]
    #[case("x${CRONKEEPER_EMPTY}y", "xy")]
    #[case("${}", "${}")]
    #[case("tail ${CRONKEEPER_DB", "tail ${CRONKEEPER_DB")]
    #[case("$HOME and {braces}", "$HOME and {braces}")]
    fn expands(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(substitute_env_with(input, lookup), expected);
    }

    #[test]
    fn plain_text_is_unchanged() {
        assert_eq!(substitute_env("plain text"), "plain text");
    }
}
