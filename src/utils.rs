/// Substitutes `message` for the first `%s` in `body`. A body without a
/// placeholder comes back unchanged.
pub fn fill_template(body: &str, message: &str) -> String {
    body.replacen("%s", message, 1)
}

/// Strips CR and LF so a value cannot start a new header line.
pub fn header_value(value: &str) -> String {
    value.replace(['\r', '\n'], "")
}
