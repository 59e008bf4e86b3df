//! Cache key composition.
//!
//! Keys look like `{namespace}:{id1}:{id2}`. The namespace selects the TTL
//! and the codec a caller uses for the value.

/// Compose a key from a namespace and its identifying parts.
///
/// Parts are trimmed. Empty parts stay as empty segments so two keys of the
/// same namespace always have the same arity. `%` and `:` inside a part are
/// percent-escaped, so distinct part lists never share a key.
pub fn compose_key<S: AsRef<str>>(namespace: &str, parts: &[S]) -> String {
    let mut key = namespace.trim().to_string();
    for part in parts {
        key.push(':');
        for c in part.as_ref().trim().chars() {
            match c {
                '%' => key.push_str("%25"),
                ':' => key.push_str("%3A"),
                c => key.push(c),
            }
        }
    }
    key
}

/// The namespace of a key: everything before the first `:`.
pub fn namespace_of(key: &str) -> &str {
    key.split_once(':').map_or(key, |(namespace, _)| namespace)
}
