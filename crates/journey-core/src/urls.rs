/// Strip query string and fragment from a URL
///
/// Cuts at the first `?` or `#`; everything before it is kept byte for byte.
pub fn redact_url(raw: &str) -> String {
    match raw.find(['?', '#']) {
        Some(end) => raw[..end].to_string(),
        None => raw.to_string(),
    }
}
