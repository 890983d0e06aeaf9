use anyhow::Context;
use regex::Regex;

use cassandra_stress_summary_model::{
    StressMetrics, LATENCY_MAX, LATENCY_MEAN, LATENCY_P99, OP_RATE,
};

/// The parameters collected from cassandra-stress output by default.
pub fn default_params() -> Vec<&'static str> {
    vec![OP_RATE, LATENCY_MEAN, LATENCY_P99, LATENCY_MAX]
}

/// Scrapes named statistics out of cassandra-stress output.
///
/// The parameter list is open-ended so callers can collect extra parameters from the stress
/// logs beyond the default set. Each parameter is matched as `<name> : <number>` with optional
/// thousands separators.
pub struct OutputScraper {
    patterns: Vec<(String, Regex)>,
}

impl OutputScraper {
    pub fn new<S: AsRef<str>>(params: &[S]) -> anyhow::Result<Self> {
        let patterns = params
            .iter()
            .map(|param| {
                let param = param.as_ref();
                let pattern = format!(r"{}\s*:\s*([\d,.]+)", regex::escape(param));
                let regex = Regex::new(&pattern)
                    .with_context(|| format!("Invalid scrape parameter '{param}'"))?;
                Ok((param.to_string(), regex))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Scrape all configured parameters from the given output. The first configured parameter
    /// (`Op rate` in the default set) is the primary one: without it the output counts as
    /// unparsed and `None` is returned. Other missing parameters only log a warning.
    pub fn scrape(&self, output: &str) -> Option<StressMetrics> {
        let mut metrics = StressMetrics::default();
        for (param, pattern) in &self.patterns {
            match scrape_value(pattern, output) {
                Some(value) => metrics.insert(param, value),
                None => {
                    log::warn!("Parameter '{param}' was not found in cassandra-stress output")
                }
            }
        }
        let primary = self.patterns.first()?.0.as_str();
        if metrics.get(primary).is_none() {
            return None;
        }
        Some(metrics)
    }
}

fn scrape_value(pattern: &Regex, output: &str) -> Option<f64> {
    let raw = pattern.captures(output)?.get(1)?.as_str().replace(',', "");
    raw.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS_SECTION: &str = "
Op rate                   :   12,345 op/s  [WRITE: 12,345 op/s]
Partition rate            :   12,345 pk/s  [WRITE: 12,345 pk/s]
Latency mean              :    1.2 ms [WRITE: 1.2 ms]
Latency median            :    0.8 ms [WRITE: 0.8 ms]
Latency 99th percentile   :    5.6 ms [WRITE: 5.6 ms]
Latency max               :   42.0 ms [WRITE: 42.0 ms]
Total operation time      : 00:00:10
";

    fn scraper() -> OutputScraper {
        OutputScraper::new(&default_params()).expect("default params are valid")
    }

    #[test]
    fn scrapes_all_default_params() {
        let metrics = scraper().scrape(RESULTS_SECTION).expect("should parse");
        assert_eq!(metrics.op_rate(), Some(12345.0));
        assert_eq!(metrics.latency_mean(), Some(1.2));
        assert_eq!(metrics.latency_p99(), Some(5.6));
        assert_eq!(metrics.latency_max(), Some(42.0));
    }

    #[test]
    fn missing_param_is_non_fatal() {
        let partial = "Op rate : 100 op/s";
        let metrics = scraper().scrape(partial).expect("op rate should parse");
        assert_eq!(metrics.op_rate(), Some(100.0));
        assert_eq!(metrics.latency_mean(), None);
    }

    #[test]
    fn unparseable_output_yields_none() {
        assert!(scraper().scrape("java.lang.RuntimeException: boom").is_none());
    }

    #[test]
    fn output_without_op_rate_counts_as_unparsed() {
        // Latency lines alone are not a parsed result; the primary parameter gates the scrape.
        let partial = "Latency mean : 1.2 ms\nLatency max : 42.0 ms";
        assert!(scraper().scrape(partial).is_none());
    }

    #[test]
    fn extra_params_can_be_collected() {
        let scraper =
            OutputScraper::new(&["Partition rate"]).expect("custom param should compile");
        let metrics = scraper.scrape(RESULTS_SECTION).expect("should parse");
        assert_eq!(metrics.get("Partition rate"), Some(12345.0));
    }
}
