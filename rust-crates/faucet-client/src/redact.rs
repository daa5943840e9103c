const VISIBLE: usize = 4;

/// Shortens an address or token to its first and last four characters for logs.
pub fn mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= VISIBLE * 2 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..VISIBLE].iter().collect();
    let tail: String = chars[chars.len() - VISIBLE..].iter().collect();
    format!("{head}…{tail}")
}
