// ABOUTME: Row count estimation methods and the fixed-order chain that collects their estimates.
// ABOUTME: Includes the status text and row sampling methods used by the scripted source.

use async_trait::async_trait;

/// One way of measuring the visible row count. `None` means the method
/// failed or does not apply right now.
#[async_trait]
pub trait RowCountMethod: Send + Sync {
    fn name(&self) -> &str;

    async fn estimate(&self) -> Option<u64>;
}

/// Runs each method in order. Failures are dropped, and zeros are dropped
/// too unless every method that answered reported zero.
#[derive(Default)]
pub struct EstimateChain {
    methods: Vec<Box<dyn RowCountMethod>>,
}

impl EstimateChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_method(mut self, method: impl RowCountMethod + 'static) -> Self {
        self.methods.push(Box::new(method));
        self
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    pub async fn estimates(&self) -> Vec<u64> {
        let mut estimates = Vec::with_capacity(self.methods.len());
        for method in &self.methods {
            match method.estimate().await {
                Some(value) => {
                    tracing::debug!(method = method.name(), value, "row count estimate");
                    estimates.push(value);
                }
                None => tracing::debug!(method = method.name(), "row count method produced nothing"),
            }
        }
        if estimates.iter().any(|value| *value > 0) {
            estimates.retain(|value| *value > 0);
        }
        estimates
    }
}

/// A method that always reports the same result.
#[derive(Debug, Clone)]
pub struct FixedEstimate {
    name: String,
    value: Option<u64>,
}

impl FixedEstimate {
    pub fn new(name: &str, value: Option<u64>) -> Self {
        Self {
            name: name.to_string(),
            value,
        }
    }
}

#[async_trait]
impl RowCountMethod for FixedEstimate {
    fn name(&self) -> &str {
        &self.name
    }

    async fn estimate(&self) -> Option<u64> {
        self.value
    }
}

/// Extract N from status bar text like "40 of 100 records found" or "7 records found".
pub fn parse_status_text(text: &str) -> Option<u64> {
    let words: Vec<&str> = text.split_whitespace().collect();
    for (i, word) in words.iter().enumerate() {
        let Ok(count) = word.parse::<u64>() else {
            continue;
        };
        let rest = &words[i + 1..];
        let label = match rest {
            ["of", total, label, ..] if total.parse::<u64>().is_ok() => label,
            [label, ..] => label,
            [] => continue,
        };
        if label.to_ascii_lowercase().starts_with("record") {
            return Some(count);
        }
    }
    None
}

/// Reads the count out of status bar text.
#[derive(Debug, Clone)]
pub struct StatusTextEstimate {
    text: String,
}

impl StatusTextEstimate {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

#[async_trait]
impl RowCountMethod for StatusTextEstimate {
    fn name(&self) -> &str {
        "status_text"
    }

    async fn estimate(&self) -> Option<u64> {
        parse_status_text(&self.text)
    }
}

/// Scale the visible share of a sample up to the whole sheet.
pub fn extrapolate_sample(visible: u64, sampled: u64, total_rows: u64) -> Option<u64> {
    if sampled == 0 {
        return None;
    }
    Some((visible as f64 / sampled as f64 * total_rows as f64) as u64)
}

/// Extrapolates a row sample to the whole sheet.
#[derive(Debug, Clone)]
pub struct SampledEstimate {
    visible: u64,
    sampled: u64,
    total_rows: Option<u64>,
}

impl SampledEstimate {
    pub fn new(visible: u64, sampled: u64, total_rows: Option<u64>) -> Self {
        Self {
            visible,
            sampled,
            total_rows,
        }
    }
}

#[async_trait]
impl RowCountMethod for SampledEstimate {
    fn name(&self) -> &str {
        "sampling"
    }

    async fn estimate(&self) -> Option<u64> {
        extrapolate_sample(self.visible, self.sampled, self.total_rows?)
    }
}
