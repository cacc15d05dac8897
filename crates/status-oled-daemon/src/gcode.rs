//! Status commands embedded in G-code.

/// Extracts the message of an `M117` (display message) command.
///
/// Returns `None` for any other command, and an empty string for a bare
/// `M117`, which clears the display.
pub fn parse_status_command(line: &str) -> Option<String> {
    let line = line.trim_start();
    let (command, rest) = match line.find(char::is_whitespace) {
        Some(pos) => line.split_at(pos),
        None => (line, ""),
    };
    if !command.eq_ignore_ascii_case("M117") {
        return None;
    }
    Some(rest.trim_start().trim_end_matches(['\r', '\n']).to_string())
}
