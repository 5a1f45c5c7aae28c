//! Frame sequence addressing: frame index → resource address.
//!
//! Frame `N` lives at `<path><prefix><N zero-padded to pad digits><extension>`,
//! e.g. `images/ffout007.gif` for prefix `ffout`, pad 3, extension `.gif`.

/// 1-based position in the sequence. Adjacent indices are visually adjacent.
pub type FrameIndex = u32;

#[derive(Debug, Clone, PartialEq)]
pub struct FrameSequence {
    /// Directory or URL prefix, including any trailing separator.
    pub path: String,
    pub prefix: String,
    pub extension: String,
    pub pad: usize,
    pub total: u32,
}

impl FrameSequence {
    /// File name of a frame, without the path component.
    pub fn filename_for(&self, index: FrameIndex) -> String {
        format!(
            "{}{:0pad$}{}",
            self.prefix,
            index,
            self.extension,
            pad = self.pad
        )
    }

    /// Full resource address: path + file name.
    pub fn address_for(&self, index: FrameIndex) -> String {
        format!("{}{}", self.path, self.filename_for(index))
    }

    pub fn contains(&self, index: FrameIndex) -> bool {
        (1..=self.total).contains(&index)
    }

    /// Clamp an arbitrary (possibly negative) frame number into `[1, total]`.
    pub fn clamp(&self, index: i64) -> FrameIndex {
        index.clamp(1, self.total.max(1) as i64) as FrameIndex
    }

    /// True when frames are fetched over HTTP rather than read from disk.
    pub fn is_remote(&self) -> bool {
        self.path.starts_with("http://") || self.path.starts_with("https://")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(path: &str) -> FrameSequence {
        FrameSequence {
            path: path.into(),
            prefix: "ffout".into(),
            extension: ".gif".into(),
            pad: 3,
            total: 192,
        }
    }

    #[test]
    fn filename_is_zero_padded() {
        let s = seq("");
        assert_eq!(s.filename_for(7), "ffout007.gif");
        assert_eq!(s.filename_for(192), "ffout192.gif");
    }

    #[test]
    fn wider_index_is_not_truncated() {
        assert_eq!(seq("").filename_for(1234), "ffout1234.gif");
    }

    #[test]
    fn address_prepends_path() {
        assert_eq!(seq("/images/").address_for(7), "/images/ffout007.gif");
        assert_eq!(
            seq("https://cdn.example.com/seq/").address_for(12),
            "https://cdn.example.com/seq/ffout012.gif"
        );
    }

    #[test]
    fn contains_and_clamp() {
        let s = seq("");
        assert!(!s.contains(0));
        assert!(s.contains(1));
        assert!(s.contains(192));
        assert!(!s.contains(193));
        assert_eq!(s.clamp(-5), 1);
        assert_eq!(s.clamp(500), 192);
        assert_eq!(s.clamp(40), 40);
    }

    #[test]
    fn remote_detection() {
        assert!(seq("http://localhost:8000/").is_remote());
        assert!(seq("https://x/").is_remote());
        assert!(!seq("images/").is_remote());
    }
}
