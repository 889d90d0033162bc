/// Percent-decode a URL path component.
///
/// `%XX` with two hex digits becomes the corresponding byte; a `%` not followed
/// by two hex digits is kept literally. Invalid UTF-8 in the decoded bytes is
/// replaced.
///
/// # Example
///
/// ```rust
/// use tenant_host::utils::unquote;
///
/// assert_eq!(unquote("/a%20b/%7Euser"), "/a b/~user");
/// assert_eq!(unquote("100%"), "100%");
/// ```
pub fn unquote(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unquote_sequences() {
        assert_eq!(unquote("plain"), "plain");
        assert_eq!(unquote("%2Fetc%2fpasswd"), "/etc/passwd");
        assert_eq!(unquote("%zz%4"), "%zz%4");
        assert_eq!(unquote("caf%C3%A9"), "café");
    }
}
