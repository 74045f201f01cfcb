//! Conversions from host node names to prim names.

/// Namespace delimiter used by host node names.
pub const NAMESPACE_DELIMITER: char = ':';

/// Make an arbitrary string a valid prim identifier.
///
/// Invalid characters become `_` and a leading digit gets a `_` prefix.
pub fn make_valid_identifier(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 1);
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
        } else {
            out.push('_');
        }
    }
    if out.is_empty() {
        return "_".to_string();
    }
    if out.as_bytes()[0].is_ascii_digit() {
        out.insert(0, '_');
    }
    out
}

/// Check whether a name is already a valid prim identifier.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Strip all namespaces from a single node name (`ns1:ns2:cube` -> `cube`).
pub fn strip_namespace(name: &str) -> &str {
    match name.rfind(NAMESPACE_DELIMITER) {
        Some(i) => &name[i + 1..],
        None => name,
    }
}

/// Convert one node name into a prim name.
///
/// With `strip_namespaces` the namespaces are dropped, otherwise the
/// namespace delimiter is folded into the name as `_`.
pub fn node_name_to_prim_name(name: &str, strip_namespaces: bool) -> String {
    let base = if strip_namespaces {
        strip_namespace(name).to_string()
    } else {
        name.replace(NAMESPACE_DELIMITER, "_")
    };
    make_valid_identifier(&base)
}

/// Convert a user supplied root name (`|group1`, `ns:group1`, `|a|b`) to a prim name.
///
/// Only the leaf component is kept, since a root becomes a top-level prim.
pub fn root_name_to_prim_name(name: &str, strip_namespaces: bool) -> String {
    let leaf = name
        .rsplit(|c| c == '|' || c == '/')
        .find(|s| !s.is_empty())
        .unwrap_or_default();
    node_name_to_prim_name(leaf, strip_namespaces)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers() {
        assert_eq!(make_valid_identifier("pCube1"), "pCube1");
        assert_eq!(make_valid_identifier("1abc"), "_1abc");
        assert_eq!(make_valid_identifier("a-b c"), "a_b_c");
        assert_eq!(make_valid_identifier(""), "_");
        assert!(is_valid_identifier("_x9"));
        assert!(!is_valid_identifier("9x"));
        assert!(!is_valid_identifier(""));
    }

    #[test]
    fn test_namespaces() {
        assert_eq!(node_name_to_prim_name("ns1:ns2:cube", true), "cube");
        assert_eq!(node_name_to_prim_name("ns1:cube", false), "ns1_cube");
        assert_eq!(root_name_to_prim_name("|ns:group1", true), "group1");
        assert_eq!(root_name_to_prim_name("group1|child", false), "child");
        assert_eq!(root_name_to_prim_name("None", false), "None");
    }
}
