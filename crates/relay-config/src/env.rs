use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

/// `{{ env.VAR }}` with an optional `| default("...")`; group 1 is the scoped key
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{\{\s*([a-zA-Z0-9_.]+)\s*(?:\|\s*default\("([^"]*)"\))?\s*\}\}"#).expect("must be valid regex")
});

/// Expand `{{ env.VAR }}` placeholders in raw TOML text
///
/// `{{ env.VAR | default("fallback") }}` falls back instead of failing when
/// the variable is unset. Comment lines are left alone so commented-out
/// credentials never need to exist in the environment.
pub fn expand_env(input: &str) -> Result<String, String> {
    let mut output = String::with_capacity(input.len());

    for line in input.split_inclusive('\n') {
        if line.trim_start().starts_with('#') {
            output.push_str(line);
        } else {
            output.push_str(&expand_line(line)?);
        }
    }

    Ok(output)
}

fn expand_line(line: &str) -> Result<Cow<'_, str>, String> {
    let mut failure = None;

    let expanded = PLACEHOLDER.replace_all(line, |captures: &Captures<'_>| {
        match resolve(&captures[1], captures.get(2).map(|m| m.as_str())) {
            Ok(value) => value,
            Err(e) => {
                failure.get_or_insert(e);
                String::new()
            }
        }
    });

    failure.map_or(Ok(expanded), Err)
}

fn resolve(key: &str, default: Option<&str>) -> Result<String, String> {
    let Some(var_name) = key.strip_prefix("env.").filter(|name| !name.contains('.')) else {
        return Err(format!("only variables scoped with 'env.' are supported: `{key}`"));
    };

    match (std::env::var(var_name), default) {
        (Ok(value), _) => Ok(value),
        (Err(_), Some(default)) => Ok(default.to_owned()),
        (Err(_), None) => Err(format!("environment variable not found: `{var_name}`")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_without_placeholders_is_unchanged() {
        let input = "[llm.providers.local]\ntype = \"ollama\"\n";
        assert_eq!(expand_env(input).unwrap(), input);
    }

    #[test]
    fn expands_api_key() {
        temp_env::with_var("RELAY_TEST_KEY", Some("sk-live"), || {
            let result = expand_env("api_key = \"{{ env.RELAY_TEST_KEY }}\"\n").unwrap();
            assert_eq!(result, "api_key = \"sk-live\"\n");
        });
    }

    #[test]
    fn expands_several_placeholders_on_one_line() {
        let vars = [("RELAY_TEST_A", Some("a")), ("RELAY_TEST_B", Some("b"))];
        temp_env::with_vars(vars, || {
            let result = expand_env("x = \"{{ env.RELAY_TEST_A }}-{{env.RELAY_TEST_B}}\"").unwrap();
            assert_eq!(result, "x = \"a-b\"");
        });
    }

    #[test]
    fn missing_variable_is_an_error() {
        temp_env::with_var_unset("RELAY_TEST_MISSING", || {
            let err = expand_env("api_key = \"{{ env.RELAY_TEST_MISSING }}\"").unwrap_err();
            assert!(err.contains("RELAY_TEST_MISSING"));
        });
    }

    #[test]
    fn only_env_scope_is_supported() {
        let err = expand_env("key = \"{{ vault.TOKEN }}\"").unwrap_err();
        assert!(err.contains("only variables scoped with 'env.'"));

        let err = expand_env("key = \"{{ env.A.B }}\"").unwrap_err();
        assert!(err.contains("env.A.B"));
    }

    #[test]
    fn comment_lines_are_not_expanded() {
        temp_env::with_vars([("RELAY_TEST_REAL", Some("value")), ("RELAY_TEST_MISSING", None)], || {
            let input = "  # api_key = \"{{ env.RELAY_TEST_MISSING }}\"\nkey = \"{{ env.RELAY_TEST_REAL }}\"";
            let result = expand_env(input).unwrap();
            assert_eq!(result, "  # api_key = \"{{ env.RELAY_TEST_MISSING }}\"\nkey = \"value\"");
        });
    }

    #[test]
    fn default_applies_only_when_unset() {
        temp_env::with_var_unset("RELAY_TEST_OPTIONAL", || {
            let result = expand_env("region = \"{{ env.RELAY_TEST_OPTIONAL | default(\"global\") }}\"").unwrap();
            assert_eq!(result, "region = \"global\"");

            let result = expand_env("key = \"{{ env.RELAY_TEST_OPTIONAL | default(\"\") }}\"").unwrap();
            assert_eq!(result, "key = \"\"");
        });

        temp_env::with_var("RELAY_TEST_OPTIONAL", Some("us-east5"), || {
            let result = expand_env("region = \"{{ env.RELAY_TEST_OPTIONAL | default(\"global\") }}\"").unwrap();
            assert_eq!(result, "region = \"us-east5\"");
        });
    }
}
