//! Text normalization applied before cache-key derivation and synthesis
//!
//! Strips characters the voice should never try to read (symbols, markup,
//! dingbats) and collapses the resulting whitespace. The same function runs
//! before hashing and before handing text to the synthesizer, so cache hits
//! reuse audio for text that differs only in stripped characters.

/// Normalize text for synthesis and cache-key derivation
///
/// Keeps letters, digits, and whitespace; drops symbols and punctuation.
/// Whitespace runs collapse to a single space and the ends are trimmed.
/// Idempotent: `normalize(normalize(x)) == normalize(x)`.
#[must_use]
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;

    for c in text.chars() {
        if c.is_whitespace() {
            pending_space = true;
        } else if is_spoken(c) {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        }
        // Dropped characters do not introduce a word break: "don't" reads
        // as "dont", not "don t".
    }

    out
}

/// Characters the synthesizer should read aloud
///
/// ASCII keeps only letters and digits. Non-ASCII keeps everything outside
/// the common symbol and punctuation blocks, so scripts that spell words
/// with combining marks (Thai tone marks, for one) pass through intact.
fn is_spoken(c: char) -> bool {
    if c.is_ascii() {
        return c.is_ascii_alphanumeric();
    }
    !matches!(
        u32::from(c),
        0x2000..=0x2BFF // general punctuation through misc symbols and arrows
            | 0x3000..=0x303F // CJK symbols and punctuation
            | 0xFE00..=0xFE0F // variation selectors
            | 0xFF01..=0xFF0F // fullwidth punctuation
            | 0xFF1A..=0xFF20
            | 0xFF3B..=0xFF40
            | 0xFF5B..=0xFF65
            | 0x1F000..=0x1FAFF // emoji
    )
}

#[cfg(test)]
mod tests {
    use super::normalize;

    #[test]
    fn strips_ascii_symbols() {
        assert_eq!(normalize("hello, world!"), "hello world");
        assert_eq!(normalize("*wave* :) #greetings"), "wave greetings");
    }

    #[test]
    fn strips_dingbats_and_emoji() {
        assert_eq!(normalize("bye ★☆♥ now ✓"), "bye now");
        assert_eq!(normalize("♪♫ la la ♪♫"), "la la");
        assert_eq!(normalize("great 😀👍"), "great");
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(normalize("  so   much \t space \n here  "), "so much space here");
    }

    #[test]
    fn preserves_thai_including_tone_marks() {
        assert_eq!(normalize("สวัสดีครับ ไพลินค่ะ"), "สวัสดีครับ ไพลินค่ะ");
        assert_eq!(normalize("ฮายยย~! ไพลินเองจ้า!"), "ฮายยย ไพลินเองจ้า");
    }

    #[test]
    fn strips_cjk_punctuation() {
        assert_eq!(normalize("こんにちは、世界"), "こんにちは世界");
    }

    #[test]
    fn apostrophes_do_not_split_words() {
        assert_eq!(normalize("don't stop"), "dont stop");
    }

    #[test]
    fn idempotent() {
        for input in ["", "plain", "  mixed *#@ input!! ", "ไพลิน ~ พร้อม ★", "a  b\tc"] {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn empty_and_symbol_only_inputs() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("!!! ??? ***"), "");
        assert_eq!(normalize("❤♥★"), "");
    }
}
