/// Replace `${VAR}` and `${VAR:-default}` placeholders in raw config text.
///
/// A variable that is unset and has no default is left as written.
pub fn substitute_env(input: &str) -> String {
    substitute_env_with(input, |name| std::env::var(name).ok())
}

/// [`substitute_env`] with an injectable lookup, so tests need not touch the
/// process environment.
fn substitute_env_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut body = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                body.push(c);
            }
            if !closed || body.is_empty() {
                result.push_str("${");
                result.push_str(&body);
                if closed {
                    result.push('}');
                }
                continue;
            }
            let (name, default) = match body.split_once(":-") {
                Some((name, default)) => (name, Some(default)),
                None => (body.as_str(), None),
            };
            match (lookup(name).filter(|v| !v.is_empty()), default) {
                (Some(value), _) => result.push_str(&value),
                (None, Some(default)) => result.push_str(default),
                (None, None) => {
                    result.push_str("${");
                    result.push_str(&body);
                    result.push('}');
                },
            }
        } else {
            result.push(ch);
        }
    }

    result
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    fn lookup(name: &str) -> Option<String> {
        match name {
            "TALLY_HOST" => Some("metrics.internal".to_string()),
            "TALLY_EMPTY" => Some(String::new()),
            _ => None,
        }
    }

    #[rstest]
    #[case("address = \"${TALLY_HOST}\"", "address = \"metrics.internal\"")]
    #[case("${TALLY_MISSING}", "${TALLY_MISSING}")]
    #[case("${TALLY_MISSING:-5000}", "5000")]
    #[case("${TALLY_HOST:-fallback}", "metrics.internal")]
    #[case("${TALLY_EMPTY:-fallback}", "fallback")]
    #[case("${TALLY_MISSING:-}", "")]
    #[case("cost: $5 ${", "cost: $5 ${")]
    #[case("${}", "${}")]
    fn substitutes(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(substitute_env_with(input, lookup), expected);
    }

    #[test]
    fn no_placeholders() {
        assert_eq!(substitute_env("plain text"), "plain text");
    }
}
