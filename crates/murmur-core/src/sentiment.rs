//! Sentiment scoring.
//!
//! The pipeline only depends on the [`SentimentScorer`] trait: a pure
//! function from cleaned text to [`PolarityScores`]. [`LexiconScorer`] is a
//! compact rule-based implementation in the VADER family (valence lexicon,
//! negation flipping, booster words, capitalization and exclamation
//! emphasis, contrastive "but"), good enough to drive the dashboard.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Compound score at or above which a post is positive.
pub const POSITIVE_THRESHOLD: f64 = 0.05;

/// Compound score at or below which a post is negative.
pub const NEGATIVE_THRESHOLD: f64 = -0.05;

/// The four polarity scores produced for a piece of text.
///
/// `neg`, `neu` and `pos` are proportions in `[0, 1]` summing to about 1;
/// `compound` is the normalized overall polarity in `[-1, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolarityScores {
    pub neg: f64,
    pub neu: f64,
    pub pos: f64,
    pub compound: f64,
}

impl PolarityScores {
    /// Scores for text that carries no sentiment at all.
    pub const NEUTRAL: Self = Self {
        neg: 0.0,
        neu: 1.0,
        pos: 0.0,
        compound: 0.0,
    };

    /// The sentiment class implied by the compound score.
    pub fn class(&self) -> SentimentClass {
        SentimentClass::from_compound(self.compound)
    }
}

/// Sentiment bucket derived from a compound score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentClass {
    Positive,
    Neutral,
    Negative,
}

impl SentimentClass {
    /// Classify a compound score. Both thresholds are inclusive.
    pub fn from_compound(compound: f64) -> Self {
        if compound >= POSITIVE_THRESHOLD {
            Self::Positive
        } else if compound <= NEGATIVE_THRESHOLD {
            Self::Negative
        } else {
            Self::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
        }
    }

    /// Display label used by the dashboard.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Positive => "Positive",
            Self::Neutral => "Neutral",
            Self::Negative => "Negative",
        }
    }
}

/// A pure scoring function over cleaned text.
pub trait SentimentScorer: Send + Sync {
    fn polarity_scores(&self, text: &str) -> PolarityScores;
}

impl<F> SentimentScorer for F
where
    F: Fn(&str) -> PolarityScores + Send + Sync,
{
    fn polarity_scores(&self, text: &str) -> PolarityScores {
        self(text)
    }
}

// Empirically derived constants from the VADER paper.
const BOOSTER_INCREMENT: f64 = 0.293;
const CAPS_INCREMENT: f64 = 0.733;
const NEGATION_SCALAR: f64 = -0.74;
const EXCLAMATION_INCREMENT: f64 = 0.292;
const MAX_EXCLAMATIONS: usize = 4;
const NORMALIZATION_ALPHA: f64 = 15.0;
const NEGATION_LOOKBACK: usize = 3;

const LEXICON: &[(&str, f64)] = &[
    ("good", 1.9),
    ("great", 3.1),
    ("excellent", 2.7),
    ("amazing", 2.8),
    ("awesome", 3.1),
    ("love", 3.2),
    ("loved", 2.9),
    ("loves", 2.7),
    ("like", 1.5),
    ("likes", 1.8),
    ("happy", 2.7),
    ("glad", 2.0),
    ("nice", 1.8),
    ("best", 3.2),
    ("better", 1.9),
    ("win", 2.8),
    ("wins", 2.7),
    ("winning", 2.4),
    ("beautiful", 2.9),
    ("wonderful", 2.7),
    ("fantastic", 2.6),
    ("fun", 2.3),
    ("enjoy", 2.2),
    ("thanks", 1.9),
    ("thank", 1.5),
    ("hope", 1.9),
    ("proud", 2.1),
    ("strong", 2.3),
    ("support", 1.7),
    ("success", 2.7),
    ("safe", 1.9),
    ("agree", 1.5),
    ("yes", 1.7),
    ("cool", 1.3),
    ("lol", 1.8),
    ("bad", -2.5),
    ("worse", -2.1),
    ("worst", -3.1),
    ("terrible", -2.1),
    ("horrible", -2.5),
    ("awful", -2.0),
    ("hate", -2.7),
    ("hates", -1.9),
    ("hated", -3.2),
    ("sad", -2.1),
    ("angry", -2.3),
    ("mad", -2.2),
    ("fear", -2.2),
    ("scared", -1.9),
    ("wrong", -2.1),
    ("lie", -1.6),
    ("lies", -1.8),
    ("liar", -2.3),
    ("fail", -2.5),
    ("failed", -2.3),
    ("failure", -2.3),
    ("lose", -1.7),
    ("lost", -1.3),
    ("losing", -1.6),
    ("crisis", -3.1),
    ("disaster", -3.1),
    ("corrupt", -3.0),
    ("stupid", -2.4),
    ("ugly", -2.3),
    ("kill", -3.7),
    ("killed", -3.5),
    ("dead", -3.3),
    ("war", -2.9),
    ("problem", -1.7),
    ("problems", -1.7),
    ("sick", -2.3),
    ("pain", -2.3),
    ("no", -1.2),
    ("disgusting", -2.4),
    ("shame", -2.1),
];

const NEGATIONS: &[&str] = &[
    "not", "no", "never", "none", "nobody", "nothing", "neither", "nor", "cannot", "cant",
    "can't", "dont", "don't", "doesnt", "doesn't", "didnt", "didn't", "isnt", "isn't", "arent",
    "aren't", "wasnt", "wasn't", "werent", "weren't", "wont", "won't", "wouldnt", "wouldn't",
    "shouldnt", "shouldn't", "couldnt", "couldn't", "aint", "ain't", "without", "hardly",
    "rarely", "seldom",
];

const BOOSTERS: &[(&str, f64)] = &[
    ("absolutely", BOOSTER_INCREMENT),
    ("completely", BOOSTER_INCREMENT),
    ("extremely", BOOSTER_INCREMENT),
    ("incredibly", BOOSTER_INCREMENT),
    ("really", BOOSTER_INCREMENT),
    ("so", BOOSTER_INCREMENT),
    ("totally", BOOSTER_INCREMENT),
    ("very", BOOSTER_INCREMENT),
    ("most", BOOSTER_INCREMENT),
    ("super", BOOSTER_INCREMENT),
    ("barely", -BOOSTER_INCREMENT),
    ("kinda", -BOOSTER_INCREMENT),
    ("slightly", -BOOSTER_INCREMENT),
    ("somewhat", -BOOSTER_INCREMENT),
    ("marginally", -BOOSTER_INCREMENT),
];

/// Rule-based lexicon scorer.
pub struct LexiconScorer {
    lexicon: HashMap<&'static str, f64>,
    boosters: HashMap<&'static str, f64>,
}

impl Default for LexiconScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl LexiconScorer {
    /// Create a scorer with the built-in lexicon.
    pub fn new() -> Self {
        Self {
            lexicon: LEXICON.iter().copied().collect(),
            boosters: BOOSTERS.iter().copied().collect(),
        }
    }

    /// Add or override a lexicon entry (valence on the -4..4 scale).
    pub fn with_word(mut self, word: &'static str, valence: f64) -> Self {
        self.lexicon.insert(word, valence);
        self
    }

    fn valence_at(&self, tokens: &[Token<'_>], i: usize, caps_differential: bool) -> f64 {
        let token = &tokens[i];
        let Some(&base) = self.lexicon.get(token.lower.as_str()) else {
            return 0.0;
        };

        let mut valence = base;

        if caps_differential && token.is_shouting() {
            valence += CAPS_INCREMENT.copysign(valence);
        }

        if i > 0
            && let Some(&boost) = self.boosters.get(tokens[i - 1].lower.as_str())
        {
            let mut boost = boost * valence.signum();
            if caps_differential && tokens[i - 1].is_shouting() {
                boost += CAPS_INCREMENT.copysign(valence);
            }
            valence += boost;
        }

        let start = i.saturating_sub(NEGATION_LOOKBACK);
        if tokens[start..i].iter().any(|t| is_negation(&t.lower)) {
            valence *= NEGATION_SCALAR;
        }

        valence
    }
}

impl SentimentScorer for LexiconScorer {
    fn polarity_scores(&self, text: &str) -> PolarityScores {
        let tokens: Vec<Token<'_>> = text
            .split_whitespace()
            .filter_map(Token::new)
            .collect();

        if tokens.is_empty() {
            return PolarityScores::NEUTRAL;
        }

        let shouting = tokens.iter().filter(|t| t.is_shouting()).count();
        let caps_differential = shouting > 0 && shouting < tokens.len();

        let mut valences: Vec<f64> = (0..tokens.len())
            .map(|i| self.valence_at(&tokens, i, caps_differential))
            .collect();

        // Contrastive conjunction: the clause after "but" dominates.
        if let Some(but) = tokens.iter().position(|t| t.lower == "but") {
            for (i, v) in valences.iter_mut().enumerate() {
                if i < but {
                    *v *= 0.5;
                } else if i > but {
                    *v *= 1.5;
                }
            }
        }

        let mut sum: f64 = valences.iter().sum();
        let exclamations = text.matches('!').count().min(MAX_EXCLAMATIONS);
        let emphasis = exclamations as f64 * EXCLAMATION_INCREMENT;
        if sum > 0.0 {
            sum += emphasis;
        } else if sum < 0.0 {
            sum -= emphasis;
        }

        let compound = normalize(sum);

        let mut pos_sum = 0.0;
        let mut neg_sum = 0.0;
        let mut neu_count = 0.0;
        for v in &valences {
            if *v > 0.0 {
                pos_sum += v + 1.0;
            } else if *v < 0.0 {
                neg_sum += v - 1.0;
            } else {
                neu_count += 1.0;
            }
        }

        if pos_sum > neg_sum.abs() {
            pos_sum += emphasis;
        } else if pos_sum < neg_sum.abs() {
            neg_sum -= emphasis;
        }

        let total = pos_sum + neg_sum.abs() + neu_count;
        if total == 0.0 {
            return PolarityScores::NEUTRAL;
        }

        PolarityScores {
            neg: round3(neg_sum.abs() / total),
            neu: round3(neu_count / total),
            pos: round3(pos_sum / total),
            compound: round4(compound),
        }
    }
}

/// A whitespace token with surrounding punctuation stripped.
struct Token<'a> {
    raw: &'a str,
    lower: String,
}

impl<'a> Token<'a> {
    fn new(word: &'a str) -> Option<Self> {
        let raw = word.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'');
        if raw.is_empty() {
            return None;
        }
        Some(Self {
            raw,
            lower: raw.to_lowercase(),
        })
    }

    fn is_shouting(&self) -> bool {
        self.raw.chars().count() > 1
            && self.raw.chars().any(char::is_alphabetic)
            && !self.raw.chars().any(char::is_lowercase)
    }
}

fn is_negation(word: &str) -> bool {
    NEGATIONS.contains(&word) || word.ends_with("n't")
}

fn normalize(score: f64) -> f64 {
    (score / (score * score + NORMALIZATION_ALPHA).sqrt()).clamp(-1.0, 1.0)
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

fn round4(x: f64) -> f64 {
    (x * 10000.0).round() / 10000.0
}
