//! Keyword-based sentiment analysis.
//!
//! Shared across crates to avoid duplicating word lists. It is the cheap
//! synchronous half of perception; a deep analyzer may override it.

const POSITIVE: &[&str] = &[
    "happy", "glad", "love", "great", "awesome", "thanks", "thank you", "excited", "wonderful",
    "nice", "good", "haha", "😊", "❤️", "👍",
];

const NEGATIVE: &[&str] = &[
    "sad", "upset", "hate", "awful", "terrible", "angry", "annoyed", "frustrated", "tired",
    "lonely", "worried", "anxious", "bad", "😢", "😡", "💔",
];

const INTENSE: &[&str] = &["very", "really", "so ", "extremely", "totally", "!", "?!"];

/// Analyze text for emotional valence and intensity.
///
/// Returns `(valence, intensity)` where:
/// - `valence` is in `[-1.0, 1.0]` (negative to positive)
/// - `intensity` is in `[0.1, 1.0]`
pub fn analyze_sentiment(text: &str) -> (f32, f32) {
    let lower = text.to_lowercase();
    let pos = POSITIVE.iter().filter(|w| lower.contains(*w)).count() as f32;
    let neg = NEGATIVE.iter().filter(|w| lower.contains(*w)).count() as f32;
    let int = INTENSE.iter().filter(|w| lower.contains(*w)).count() as f32;

    let valence = (pos - neg) / (pos + neg + 1.0);
    let intensity = ((pos + neg + int) / 5.0).clamp(0.1, 1.0);

    (valence, intensity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neutral_text() {
        let (v, i) = analyze_sentiment("the meeting moved to thursday");
        assert!((v - 0.0).abs() < 0.01);
        assert!((i - 0.1).abs() < 0.01);
    }

    #[test]
    fn test_positive_text() {
        let (v, _) = analyze_sentiment("I'm so happy, thanks!");
        assert!(v > 0.0);
    }

    #[test]
    fn test_negative_text() {
        let (v, _) = analyze_sentiment("I feel sad and lonely");
        assert!(v < 0.0);
    }

    #[test]
    fn test_intense_text() {
        let (_, i1) = analyze_sentiment("good");
        let (_, i2) = analyze_sentiment("really very good!");
        assert!(i2 > i1);
    }

    #[test]
    fn test_case_insensitive() {
        let (v, _) = analyze_sentiment("I HATE this");
        assert!(v < 0.0);
    }

    #[test]
    fn test_empty_text() {
        let (v, i) = analyze_sentiment("");
        assert!((v - 0.0).abs() < 0.01);
        assert!((i - 0.1).abs() < 0.01);
    }
}
