use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Per-provider call and token counters. Pricing is deliberately out of
/// scope; the final report prints the raw totals.
#[derive(Debug, Default, Clone, Serialize)]
pub struct CostTotals {
    pub calls: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Opaque accumulator the translator and analyzer write into.
#[derive(Debug, Default)]
pub struct CostSink {
    totals: Mutex<BTreeMap<String, CostTotals>>,
}

impl CostSink {
    pub fn new() -> Self {
        CostSink::default()
    }

    pub fn record(&self, provider: &str, prompt_tokens: u64, completion_tokens: u64) {
        let mut totals = self.lock();
        let entry = totals.entry(provider.to_string()).or_default();
        entry.calls += 1;
        entry.prompt_tokens += prompt_tokens;
        entry.completion_tokens += completion_tokens;
    }

    pub fn totals(&self) -> BTreeMap<String, CostTotals> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, CostTotals>> {
        self.totals
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_accumulate_per_provider() {
        let sink = CostSink::new();
        sink.record("llm", 100, 40);
        sink.record("llm", 50, 10);
        sink.record("search", 0, 0);

        let totals = sink.totals();
        assert_eq!(totals["llm"].calls, 2);
        assert_eq!(totals["llm"].prompt_tokens, 150);
        assert_eq!(totals["llm"].completion_tokens, 50);
        assert_eq!(totals["search"].calls, 1);
    }
}
