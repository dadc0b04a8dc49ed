use thiserror::Error;
use tracing::debug;

pub const STOCK_TEMPLATE: &str = "Based on current market analysis, I can help you with stock information. For real-time data, I recommend checking the latest market feeds. This is a demo response showing how the AI would process stock-related queries.";
pub const INVESTMENT_TEMPLATE: &str = "For investment strategies, I recommend considering a diversified portfolio approach. Key factors include risk tolerance, time horizon, and financial goals. This demo shows how I would analyze investment queries.";
pub const MARKET_TEMPLATE: &str = "Current market trends show various patterns across different sectors. I can analyze market conditions and provide insights based on historical data and current indicators. This is a sample market analysis response.";
pub const GENERAL_TEMPLATE: &str = "I'm here to help with your financial questions.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Stock,
    Investment,
    Market,
    General,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub intent: Intent,
    pub response: String,
    pub confidence: f64,
}

/// One row of the rule table: any keyword hit selects the template.
#[derive(Debug, Clone)]
pub struct IntentRule {
    pub intent: Intent,
    pub keywords: Vec<String>,
    pub template: String,
    pub confidence: f64,
}

impl IntentRule {
    pub fn new(intent: Intent, keywords: &[&str], template: &str, confidence: f64) -> Self {
        Self {
            intent,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            template: template.to_string(),
            confidence,
        }
    }

    fn matches(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|k| lowered.contains(k.as_str()))
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum RuleError {
    #[error("confidence {value} for {intent:?} is outside [0, 1]")]
    ConfidenceOutOfRange { intent: Intent, value: f64 },
    #[error("{0:?} has an empty response template")]
    EmptyTemplate(Intent),
    #[error("{0:?} has no keywords")]
    NoKeywords(Intent),
}

/// Ordered rule table plus the fallback used when nothing matches.
/// Rules are tried in order and the first hit wins.
#[derive(Debug, Clone)]
pub struct ClassifierRules {
    rules: Vec<IntentRule>,
    fallback: IntentRule,
}

impl ClassifierRules {
    pub fn new(rules: Vec<IntentRule>, fallback: IntentRule) -> Result<Self, RuleError> {
        for rule in &rules {
            check(rule)?;
            if rule.keywords.iter().all(|k| k.is_empty()) {
                return Err(RuleError::NoKeywords(rule.intent));
            }
        }
        check(&fallback)?;

        // Matching runs against the lowered query, so keywords are lowered once here.
        let rules = rules
            .into_iter()
            .map(|mut rule| {
                rule.keywords = rule
                    .keywords
                    .iter()
                    .filter(|k| !k.is_empty())
                    .map(|k| k.to_lowercase())
                    .collect();
                rule
            })
            .collect();

        Ok(Self { rules, fallback })
    }

    pub fn rules(&self) -> &[IntentRule] {
        &self.rules
    }

    pub fn fallback(&self) -> &IntentRule {
        &self.fallback
    }
}

fn check(rule: &IntentRule) -> Result<(), RuleError> {
    if !(0.0..=1.0).contains(&rule.confidence) {
        return Err(RuleError::ConfidenceOutOfRange {
            intent: rule.intent,
            value: rule.confidence,
        });
    }
    if rule.template.trim().is_empty() {
        return Err(RuleError::EmptyTemplate(rule.intent));
    }
    Ok(())
}

impl Default for ClassifierRules {
    fn default() -> Self {
        Self {
            rules: vec![
                IntentRule::new(Intent::Stock, &["stock", "aapl", "price"], STOCK_TEMPLATE, 0.92),
                IntentRule::new(Intent::Investment, &["invest", "portfolio"], INVESTMENT_TEMPLATE, 0.88),
                IntentRule::new(Intent::Market, &["market", "trend"], MARKET_TEMPLATE, 0.90),
            ],
            fallback: IntentRule::new(Intent::General, &[], GENERAL_TEMPLATE, 0.85),
        }
    }
}

/// Keyword-driven intent classifier. Not a model: a fixed rule table.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    rules: ClassifierRules,
}

impl Classifier {
    pub fn new(rules: ClassifierRules) -> Self {
        Self { rules }
    }

    /// Expects a non-blank query; the router rejects blank ones before we get here.
    pub fn classify(&self, query: &str) -> ClassificationResult {
        let lowered = query.to_lowercase();

        let rule = self
            .rules
            .rules()
            .iter()
            .find(|rule| rule.matches(&lowered))
            .unwrap_or(self.rules.fallback());

        debug!("Classified query as {:?} ({:.2})", rule.intent, rule.confidence);

        ClassificationResult {
            intent: rule.intent,
            response: rule.template.clone(),
            confidence: rule.confidence,
        }
    }
}
