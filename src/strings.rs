//! String normalization for the literal shapes the tokenizer emits verbatim
//!
//! The tokenizer hands over raw source slices, delimiters included. These
//! helpers strip the quoting (quoted strings, symbols, percent literals),
//! expand `%w` word arrays and normalize version-constraint spacing.

/// Strip the quoting from a raw token slice, yielding the logical string.
///
/// Handles `'...'`, `"..."`, `:name`, `:"name"`, `:'name'`, `%q{...}`, `%w[...]`.
/// Anything else (identifiers, bare text) is returned unchanged. Doubled
/// quoting seen in real-world specs (`""rails""`, `'"rails"'`) collapses
/// to the bare content.
pub fn normalize(text: &str) -> String {
    let bytes = text.as_bytes();
    if text.len() >= 3 && (text.starts_with("%q") || text.starts_with("%w")) {
        return normalize_percent(text);
    }
    if bytes.first() == Some(&b':') {
        if text.len() >= 3 {
            let quote = bytes[1];
            if (quote == b'\'' || quote == b'"') && bytes[bytes.len() - 1] == quote {
                return text[2..text.len() - 1].to_string();
            }
        }
        return text[1..].to_string();
    }
    if text.len() >= 2 {
        let quote = bytes[0];
        if (quote == b'\'' || quote == b'"') && bytes[bytes.len() - 1] == quote {
            return normalize_quoted(text, quote as char);
        }
    }
    text.to_string()
}

fn normalize_quoted(text: &str, quote: char) -> String {
    let mut inner = text[1..text.len() - 1].trim_matches(quote);
    loop {
        let bytes = inner.as_bytes();
        if bytes.len() >= 2 && (bytes[0] == b'\'' || bytes[0] == b'"') && bytes[bytes.len() - 1] == bytes[0] {
            inner = &inner[1..inner.len() - 1];
        } else {
            break;
        }
    }
    inner.to_string()
}

fn normalize_percent(text: &str) -> String {
    // The delimiter may be any character, including a multi-byte one, so
    // it is decoded rather than sliced at fixed byte offsets.
    let Some(opener) = text[2..].chars().next() else {
        return String::new();
    };
    let closer = match opener {
        '{' => '}',
        '[' => ']',
        '(' => ')',
        '<' => '>',
        other => other,
    };
    let rest = &text[2 + opener.len_utf8()..];
    let mut content = rest.strip_suffix(closer).unwrap_or(rest).trim();
    if opener == '<' {
        // Absorbs the `><><name><><` wrapping seen in generated specs.
        while let Some(rest) = content.strip_prefix("><") {
            content = rest;
        }
        while let Some(rest) = content.strip_suffix("><") {
            content = rest;
        }
        content = content.strip_suffix('>').unwrap_or(content);
    }
    if content.len() >= 6 && content.starts_with("'''") && content.ends_with("'''") {
        content = &content[3..content.len() - 3];
    }
    content.to_string()
}

/// Split a `%w` literal into its whitespace-separated pieces.
pub fn expand_word_array(text: &str) -> Vec<String> {
    normalize(text)
        .split(|c: char| matches!(c, ' ' | '\t' | '\n' | '\r'))
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect()
}

/// Put exactly one space between a leading constraint operator and the
/// digit run: `~>1.0` becomes `~> 1.0`. Already-spaced input is untouched.
pub fn format_version(version: &str) -> String {
    match version.find(|c: char| c.is_ascii_digit()) {
        Some(i) if i > 0 && !version[..i].ends_with(' ') => {
            format!("{} {}", &version[..i], &version[i..])
        }
        _ => version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_quotes() {
        assert_eq!(normalize("'rails'"), "rails");
        assert_eq!(normalize("\"rails\""), "rails");
        assert_eq!(normalize("''"), "");
    }

    #[test]
    fn test_doubled_quotes() {
        assert_eq!(normalize("\"\"rails\"\""), "rails");
        assert_eq!(normalize("'\"rails\"'"), "rails");
        assert_eq!(normalize("\"'>= 6.0'\""), ">= 6.0");
    }

    #[test]
    fn test_symbols() {
        assert_eq!(normalize(":development"), "development");
        assert_eq!(normalize(":\"dev build\""), "dev build");
        assert_eq!(normalize(":'dev'"), "dev");
    }

    #[test]
    fn test_percent_q_delimiters() {
        assert_eq!(normalize("%q{gemname}"), "gemname");
        assert_eq!(normalize("%q[gemname]"), "gemname");
        assert_eq!(normalize("%q(gemname)"), "gemname");
        assert_eq!(normalize("%q<gemname>"), "gemname");
        assert_eq!(normalize("%q!gemname!"), "gemname");
    }

    #[test]
    fn test_percent_trims_whitespace() {
        assert_eq!(normalize("%q{  gemname  }"), "gemname");
    }

    #[test]
    fn test_percent_multibyte_delimiter() {
        assert_eq!(normalize("%qérailsé"), "rails");
        assert_eq!(normalize("%wé~>1.0é"), "~>1.0");
    }

    #[test]
    fn test_percent_angle_wrapping() {
        assert_eq!(normalize("%q<><><name><><>"), "name");
    }

    #[test]
    fn test_percent_triple_quotes() {
        assert_eq!(normalize("%q{'''gemname'''}"), "gemname");
        // Below the length floor the quotes are content.
        assert_eq!(normalize("%q{'''}"), "'''");
    }

    #[test]
    fn test_bare_text_passthrough() {
        assert_eq!(normalize("rails"), "rails");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for raw in ["'rails'", "\"\"rails\"\"", "%q<gemname>", ":development"] {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once, "input {raw}");
        }
    }

    #[test]
    fn test_word_array() {
        assert_eq!(expand_word_array("%w[~>1.0 >=1.5]"), vec!["~>1.0", ">=1.5"]);
        assert_eq!(expand_word_array("%w{a\tb\nc}"), vec!["a", "b", "c"]);
        assert_eq!(expand_word_array("%w[]"), Vec::<String>::new());
    }

    #[test]
    fn test_format_version_inserts_space() {
        assert_eq!(format_version("~>1.0"), "~> 1.0");
        assert_eq!(format_version(">=1.5"), ">= 1.5");
    }

    #[test]
    fn test_format_version_leaves_spaced_and_bare() {
        assert_eq!(format_version("1.0"), "1.0");
        assert_eq!(format_version(">= 2.0"), ">= 2.0");
        assert_eq!(format_version(""), "");
        assert_eq!(format_version("beta"), "beta");
    }

    #[test]
    fn test_format_version_is_idempotent() {
        for v in ["~>1.0", ">= 2.0", "1.0"] {
            let once = format_version(v);
            assert_eq!(format_version(&once), once);
        }
    }
}
