use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

/// SHA-256 fingerprint of region content, used to tell machine-written
/// regions from hand-edited ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentFingerprint(pub String);

impl ContentFingerprint {
    /// Fingerprint content with normalized line endings, NFC normalization
    /// and surrounding whitespace trimmed.
    pub fn from_content(content: &str) -> Self {
        use sha2::{Digest, Sha256};
        let normalized = normalize(content);
        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn normalize(content: &str) -> String {
    let unified = content.replace("\r\n", "\n");
    unified.trim().nfc().collect()
}
