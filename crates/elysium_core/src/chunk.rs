//! Lossless message chunking for size-limited transports.

/// Discord caps messages at 2000 characters; stay under it with some margin
/// for the transport's own decoration.
pub const DISCORD_CHUNK_LIMIT: usize = 1990;

/// Split `content` into ordered chunks of at most `max_len` characters.
///
/// The concatenation of the returned chunks equals the input exactly; no
/// whitespace is dropped or collapsed. Splits happen preferentially after the
/// last whitespace character inside the current window, falling back to a
/// hard cut when a window contains none. Input within the bound comes back as
/// a single chunk.
pub fn chunk_message(content: &str, max_len: usize) -> Vec<String> {
    assert!(max_len >= 1, "chunk size must be at least 1");

    let chars: Vec<char> = content.chars().collect();
    if chars.len() <= max_len {
        return vec![content.to_string()];
    }

    let mut chunks = Vec::with_capacity(chars.len() / max_len + 1);
    let mut start = 0;
    while start < chars.len() {
        let remaining = chars.len() - start;
        if remaining <= max_len {
            chunks.push(chars[start..].iter().collect());
            break;
        }

        let window = &chars[start..start + max_len];
        // Split just after the last whitespace in the window so words stay
        // whole; the whitespace itself is kept at the end of this chunk.
        let split = window
            .iter()
            .rposition(|c| c.is_whitespace())
            .map(|i| start + i + 1)
            .unwrap_or(start + max_len);
        chunks.push(chars[start..split].iter().collect());
        start = split;
    }

    chunks
}
