use super::DecodeError;

/// Split an object payload into its header lines and the message that
/// follows the first blank line.
pub(crate) fn split_headers(content: &[u8]) -> (Vec<&[u8]>, &[u8]) {
    let (headers, message) = match find(content, b"\n\n") {
        Some(n) => (&content[..n], &content[n + 2..]),
        None => (content, &b""[..]),
    };

    let headers = headers
        .split(|b| *b == b'\n')
        .filter(|line| !line.is_empty())
        .collect();

    (headers, message)
}

pub(crate) fn header<'a>(line: &'a [u8], name: &[u8]) -> Option<&'a [u8]> {
    if line.contains(&b' ') {
        let (maybe_name, value) = split_once(line, &b' ');
        if maybe_name == name {
            Some(value)
        } else {
            None
        }
    } else {
        None
    }
}

pub(crate) fn split_once<'a>(s: &'a [u8], c: &u8) -> (&'a [u8], &'a [u8]) {
    match s.iter().position(|b| b == c) {
        Some(n) => (&s[0..n], &s[n + 1..]),
        None => (s, &[]),
    }
}

pub(crate) fn utf8(s: &[u8]) -> Result<&str, DecodeError> {
    std::str::from_utf8(s).map_err(|_| DecodeError::InvalidUtf8)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
