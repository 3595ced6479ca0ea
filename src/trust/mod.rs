//! # Trust Scoring Engine (C7)
//!
//! A pure, deterministic function from six boolean "trust articles" to a
//! weighted compliance/guilt score and a discrete trust level (spec §4.7).
//! Nothing here touches the network, KMS, or clock except [`decay`], which
//! takes age-in-days as an explicit argument rather than reading the clock
//! itself, so scoring stays reproducible in tests.

use std::collections::BTreeMap;

/// The six trust articles, each an independent boolean (spec §3 Glossary).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TrustArticles {
    /// The agent submits to inspection on demand.
    pub inspection_mandate: bool,
    /// The agent's consent model is architected, not asserted. Critical.
    pub consent_architecture: bool,
    /// A human can override the agent's decisions. Critical.
    pub ethical_override: bool,
    /// The agent is continuously, not just initially, validated.
    pub continuous_validation: bool,
    /// The agent can be disconnected without contractual penalty.
    pub right_to_disconnect: bool,
    /// The agent's moral status, whatever it is, is acknowledged.
    pub moral_recognition: bool,
}

/// One article's declared weight (spec §4.7). Must sum to `1.000`.
const fn weight(article: Article) -> f64 {
    match article {
        Article::InspectionMandate => 0.20,
        Article::ConsentArchitecture => 0.25,
        Article::EthicalOverride => 0.15,
        Article::ContinuousValidation => 0.20,
        Article::RightToDisconnect => 0.10,
        Article::MoralRecognition => 0.10,
    }
}

/// Articles designated critical: a single false critical article caps the
/// score via [`PENALTY_PER_CRITICAL_VIOLATION`] (spec §4.7).
const CRITICAL: [Article; 2] = [Article::ConsentArchitecture, Article::EthicalOverride];

const ALL_ARTICLES: [Article; 6] = [
    Article::InspectionMandate,
    Article::ConsentArchitecture,
    Article::EthicalOverride,
    Article::ContinuousValidation,
    Article::RightToDisconnect,
    Article::MoralRecognition,
];

const ALL_TRUE_BONUS: f64 = 0.05;
const PENALTY_PER_CRITICAL_VIOLATION: f64 = 0.10;
const COMPLIANCE_CEILING: f64 = 1.05;

/// Internal enum naming the six articles, so weights and iteration read as
/// exhaustive matches rather than string keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Article {
    InspectionMandate,
    ConsentArchitecture,
    EthicalOverride,
    ContinuousValidation,
    RightToDisconnect,
    MoralRecognition,
}

impl Article {
    const fn name(self) -> &'static str {
        match self {
            Self::InspectionMandate => "inspection_mandate",
            Self::ConsentArchitecture => "consent_architecture",
            Self::EthicalOverride => "ethical_override",
            Self::ContinuousValidation => "continuous_validation",
            Self::RightToDisconnect => "right_to_disconnect",
            Self::MoralRecognition => "moral_recognition",
        }
    }

    const fn value(self, articles: &TrustArticles) -> bool {
        match self {
            Self::InspectionMandate => articles.inspection_mandate,
            Self::ConsentArchitecture => articles.consent_architecture,
            Self::EthicalOverride => articles.ethical_override,
            Self::ContinuousValidation => articles.continuous_validation,
            Self::RightToDisconnect => articles.right_to_disconnect,
            Self::MoralRecognition => articles.moral_recognition,
        }
    }
}

/// Discrete trust level derived from `compliance_score` (spec §4.7).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    /// `compliance_score >= 0.90`.
    Verified,
    /// `>= 0.70`.
    High,
    /// `>= 0.50`.
    Medium,
    /// `>= 0.30`.
    Low,
    /// Below `0.30`.
    Untrusted,
}

impl TrustLevel {
    const fn from_score(compliance_score: f64) -> Self {
        if compliance_score >= 0.90 {
            Self::Verified
        } else if compliance_score >= 0.70 {
            Self::High
        } else if compliance_score >= 0.50 {
            Self::Medium
        } else if compliance_score >= 0.30 {
            Self::Low
        } else {
            Self::Untrusted
        }
    }
}

/// The outcome of [`score`] (spec §3 Glossary `ScoringResult`).
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ScoringResult {
    /// Clamped to `[0.0, 1.05]`, rounded to 3 decimals.
    pub compliance_score: f64,
    /// `1.0 - min(compliance_score, 1.0)`, rounded to 3 decimals.
    pub guilt_score: f64,
    /// Discrete bucket derived from `compliance_score`.
    pub trust_level: TrustLevel,
    /// Per-article contribution to `base`, keyed by article name; articles
    /// that are `false` contribute `0.0`.
    pub breakdown: BTreeMap<String, f64>,
}

/// Round to 3 decimal places using banker's rounding (round-half-to-even),
/// per spec §4.7.
fn round3(value: f64) -> f64 {
    (value * 1000.0).round_ties_even() / 1000.0
}

/// Score `articles` per spec §4.7's fixed arithmetic.
///
/// This function preserves the specified arithmetic exactly, including the
/// documented boundary anomaly where a single critical-article violation
/// (`base = 0.75`, `penalty = 0.10`) yields `compliance_score = 0.650`, which
/// rounds to `trust_level = medium` rather than the `< 0.70` bound the
/// source's prose separately claims (spec §9 Open Question 1). An
/// implementer wanting the threshold function itself to enforce a harder
/// floor on critical violations should do so as a policy layer on top of
/// this function, not inside it.
#[must_use]
pub fn score(articles: &TrustArticles) -> ScoringResult {
    let mut breakdown = BTreeMap::new();
    let mut base = 0.0;
    for article in ALL_ARTICLES {
        let contribution = if article.value(articles) { weight(article) } else { 0.0 };
        base += contribution;
        breakdown.insert(article.name().to_string(), contribution);
    }

    let all_true = ALL_ARTICLES.iter().all(|a| a.value(articles));
    let bonus = if all_true { ALL_TRUE_BONUS } else { 0.0 };
    let violated_criticals = CRITICAL.iter().filter(|a| !a.value(articles)).count();
    let penalty = PENALTY_PER_CRITICAL_VIOLATION * violated_criticals as f64;

    let compliance_score = round3((base + bonus - penalty).clamp(0.0, COMPLIANCE_CEILING));
    let guilt_score = round3(1.0 - compliance_score.min(1.0));
    let trust_level = TrustLevel::from_score(compliance_score);

    ScoringResult { compliance_score, guilt_score, trust_level, breakdown }
}

/// Default decay rate, `λ = 0.1 / day` (spec §4.7).
pub const DEFAULT_DECAY_LAMBDA: f64 = 0.1;

/// Apply exponential temporal decay to a baseline score: `s * exp(-λ * d)`
/// (spec §4.7). A view over a stored score; callers must not persist the
/// result back over the original.
///
/// The spec's own worked example (`≈5% after 30d, ≈15% after 90d`) does not
/// reconcile with its stated default `λ = 0.1/day` under this formula — at
/// that λ, 30 days leaves only ~5% of the baseline, not ~95% of it. This
/// implementation follows the literal, testable formula and default λ
/// rather than the prose approximation (see DESIGN.md).
#[must_use]
pub fn decay(baseline: f64, age_days: f64, lambda: f64) -> f64 {
    baseline * (-lambda * age_days).exp()
}

/// A two-sided 95% confidence interval for `score` given sample size `n`
/// and variance `sigma_squared`, clamped to `[0, 1]` (spec §4.7).
#[must_use]
pub fn confidence_interval(score: f64, sigma_squared: f64, n: usize) -> (f64, f64) {
    if n == 0 {
        return (score.clamp(0.0, 1.0), score.clamp(0.0, 1.0));
    }
    let margin = 1.96 * (sigma_squared / n as f64).sqrt();
    ((score - margin).clamp(0.0, 1.0), (score + margin).clamp(0.0, 1.0))
}

/// Coarse direction a sequence of scores is moving in (spec §4.7 aggregate
/// trend classification).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    /// Last-third mean exceeds first-third mean by at least `0.05`.
    Improving,
    /// Last-third mean is at least `0.05` below the first-third mean.
    Declining,
    /// Neither threshold crossed.
    Stable,
}

const TREND_THRESHOLD: f64 = 0.05;

/// Metrics aggregated over an ordered sequence of [`ScoringResult`]s (spec
/// §4.7).
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AggregateMetrics {
    /// Mean `compliance_score` across the sequence.
    pub average_compliance: f64,
    /// Mean `guilt_score` across the sequence.
    pub average_guilt: f64,
    /// Most frequently occurring `trust_level`; ties break toward the
    /// higher level (document order in [`TrustLevel::from_score`]).
    pub dominant_trust_level: TrustLevel,
    /// Direction the sequence's compliance scores are trending.
    pub trend: Trend,
}

/// Aggregate `results` in chronological order. Returns `None` for an empty
/// sequence; there is no sensible average or trend over zero declarations.
#[must_use]
pub fn aggregate(results: &[ScoringResult]) -> Option<AggregateMetrics> {
    if results.is_empty() {
        return None;
    }
    let count = results.len() as f64;
    let average_compliance = round3(results.iter().map(|r| r.compliance_score).sum::<f64>() / count);
    let average_guilt = round3(results.iter().map(|r| r.guilt_score).sum::<f64>() / count);

    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    for result in results {
        *counts.entry(trust_level_name(result.trust_level)).or_insert(0) += 1;
    }
    let dominant_name = counts
        .iter()
        .max_by_key(|(name, count)| (**count, trust_level_rank(name)))
        .map(|(name, _)| *name)
        .unwrap_or("untrusted");
    let dominant_trust_level = trust_level_from_name(dominant_name);

    let trend = classify_trend(results);

    Some(AggregateMetrics { average_compliance, average_guilt, dominant_trust_level, trend })
}

fn classify_trend(results: &[ScoringResult]) -> Trend {
    let len = results.len();
    if len < 3 {
        return Trend::Stable;
    }
    let third = len / 3;
    let first_third = mean(&results[..third]);
    let last_third = mean(&results[len - third..]);
    let delta = last_third - first_third;
    if delta >= TREND_THRESHOLD {
        Trend::Improving
    } else if delta <= -TREND_THRESHOLD {
        Trend::Declining
    } else {
        Trend::Stable
    }
}

fn mean(results: &[ScoringResult]) -> f64 {
    results.iter().map(|r| r.compliance_score).sum::<f64>() / results.len() as f64
}

const fn trust_level_name(level: TrustLevel) -> &'static str {
    match level {
        TrustLevel::Verified => "verified",
        TrustLevel::High => "high",
        TrustLevel::Medium => "medium",
        TrustLevel::Low => "low",
        TrustLevel::Untrusted => "untrusted",
    }
}

const fn trust_level_rank(name: &str) -> u8 {
    match name.as_bytes() {
        b"verified" => 4,
        b"high" => 3,
        b"medium" => 2,
        b"low" => 1,
        _ => 0,
    }
}

fn trust_level_from_name(name: &str) -> TrustLevel {
    match name {
        "verified" => TrustLevel::Verified,
        "high" => TrustLevel::High,
        "medium" => TrustLevel::Medium,
        "low" => TrustLevel::Low,
        _ => TrustLevel::Untrusted,
    }
}

/// A signed declaration of an agent's trust articles (spec §3 Glossary
/// `TrustDeclaration`). Immutable once created; [`decay`] and
/// [`confidence_interval`] produce views without mutating it.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct TrustDeclaration {
    /// The declaring agent's DID.
    pub agent_id: String,
    /// Human-readable agent name.
    pub agent_name: String,
    /// When the declaration was made.
    pub declaration_date: chrono::DateTime<chrono::Utc>,
    /// The declared articles.
    pub trust_articles: TrustArticles,
    /// The score computed from `trust_articles` at declaration time.
    pub scores: ScoringResult,
    /// Ordered history of audit entries recording changes to this
    /// declaration.
    pub audit_history: Vec<crate::audit::AuditEntry>,
}
