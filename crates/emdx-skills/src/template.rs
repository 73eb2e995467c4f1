//! `{{variable}}` substitution for recipe prompts.

use std::collections::{HashMap, HashSet};

fn is_var_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_var_cont(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Substitutes `{{variable}}` patterns with provided values.
///
/// Unresolved variables are left as-is so a typo is visible in the prompt
/// rather than silently blanked.
pub fn substitute_vars(text: &str, vars: &HashMap<String, String>) -> String {
    let mut result = String::with_capacity(text.len());
    let bytes = text.as_bytes();
    let len = bytes.len();
    let mut i = 0;
    while i < len {
        if i + 4 <= len && bytes[i] == b'{' && bytes[i + 1] == b'{' {
            let start = i + 2;
            if start < len && is_var_start(bytes[start]) {
                let mut end = start + 1;
                while end < len && is_var_cont(bytes[end]) {
                    end += 1;
                }
                if end + 1 < len && bytes[end] == b'}' && bytes[end + 1] == b'}' {
                    let name = &text[start..end];
                    if let Some(val) = vars.get(name) {
                        result.push_str(val);
                    } else {
                        result.push_str(&text[i..end + 2]);
                    }
                    i = end + 2;
                    continue;
                }
            }
        }
        result.push(bytes[i] as char);
        i += 1;
    }
    result
}

/// Extracts every `{{variable}}` name referenced in a piece of text.
pub fn extract_variables(text: &str) -> Vec<String> {
    let mut names: HashSet<String> = HashSet::new();
    let bytes = text.as_bytes();
    let len = bytes.len();
    let mut i = 0;
    while i + 4 <= len {
        if bytes[i] == b'{' && bytes[i + 1] == b'{' && is_var_start(bytes[i + 2]) {
            let start = i + 2;
            let mut end = start + 1;
            while end < len && is_var_cont(bytes[end]) {
                end += 1;
            }
            if end + 1 < len && bytes[end] == b'}' && bytes[end + 1] == b'}' {
                names.insert(text[start..end].to_owned());
                i = end + 2;
                continue;
            }
        }
        i += 1;
    }
    let mut result: Vec<String> = names.into_iter().collect();
    result.sort();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn substitutes_known_variables() {
        let result = substitute_vars(
            "review {{file}} for {{concern}}",
            &vars(&[("file", "main.rs"), ("concern", "races")]),
        );
        assert_eq!(result, "review main.rs for races");
    }

    #[test]
    fn unknown_variables_stay_visible() {
        let result = substitute_vars("check {{typo}}", &vars(&[("file", "x")]));
        assert_eq!(result, "check {{typo}}");
    }

    #[test]
    fn braces_without_variables_pass_through() {
        let result = substitute_vars("json: {\"a\": 1} and {{}}", &vars(&[]));
        assert_eq!(result, "json: {\"a\": 1} and {{}}");
    }

    #[test]
    fn extracts_sorted_unique_names() {
        let names = extract_variables("{{b}} then {{a}} then {{b}} again");
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn adjacent_variables() {
        let result = substitute_vars("{{a}}{{b}}", &vars(&[("a", "1"), ("b", "2")]));
        assert_eq!(result, "12");
    }
}
