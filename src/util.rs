//! Miscellaneous helpers.

/// Renders a boxed, hard-to-miss diagnostic for fatal conditions.
///
/// Invariant violations abort the run; the banner makes sure the reason
/// is not lost in episode output.
pub fn fatal_banner(message: &str) -> String {
    let margin = "#".repeat(5);
    let rule = "#".repeat(message.len() + 2 * margin.len() + 2);
    format!("\n{rule}\n{margin} {message} {margin}\n{rule}\n")
}
