use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    to_hex_lower(&Sha256::digest(bytes))
}

/// Hashes named inputs in order. Names and bodies are separated by a zero
/// byte so `("ab", "c")` and `("a", "bc")` differ.
pub(crate) struct DefsHasher {
    inner: Sha256,
}

impl DefsHasher {
    pub(crate) fn new() -> Self {
        Self {
            inner: Sha256::new(),
        }
    }

    pub(crate) fn update(&mut self, name: &str, bytes: &[u8]) {
        self.inner.update(name.as_bytes());
        self.inner.update([0u8]);
        self.inner.update(bytes);
        self.inner.update([0u8]);
    }

    pub(crate) fn finish(self) -> String {
        to_hex_lower(&self.inner.finalize())
    }
}

fn to_hex_lower(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_digest() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn name_boundaries_change_hash() {
        let mut first = DefsHasher::new();
        first.update("ab", b"c");
        let mut second = DefsHasher::new();
        second.update("a", b"bc");
        assert_ne!(first.finish(), second.finish());
    }
}
