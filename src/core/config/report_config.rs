// Run configuration for the report pipeline.
//
// Everything the pipeline needs from the environment is read here, once, and
// validated before any network call is made. Components receive the typed
// `ReportConfig` (or the slice of it they need) and never touch
// `std::env` themselves.
//
// **Environment Variables:**
// - `GA4_PROPERTY_ID` - GA4 property id (required)
// - `GOOGLE_APPLICATION_CREDENTIALS` - Path to a service account key, or
// - `GOOGLE_SERVICE_ACCOUNT_JSON` - The key JSON itself (one of the two is required)
// - `GA4_REPORT_FLAVOR` - `monthly-insights` (default), `trailing-90-days`, `yesterday`
// - `GA4_OUTPUT_DIR` - Directory the artifact is written to (default `.`)
// - `GA4_TOP_N` - Length of the top-N breakdowns (default 5)
// - `GA4_CSV_DIMENSIONS` / `GA4_CSV_METRICS` - Column overrides for CSV flavors
// - `GEMINI_API_KEY` - Required for `monthly-insights` only
// - `GEMINI_MODEL` - Primary model (default `gemini-2.5-flash`)
// - `GEMINI_FALLBACK_MODELS` - Comma-separated fallbacks (default `gemini-2.0-flash`)
// - `GEMINI_GOOGLE_SEARCH` - Request Google Search grounding (default `true`)
// - `GEMINI_TEMPERATURE` - Sampling temperature in 0.0..=2.0 (model default when unset)

use std::path::PathBuf;

use thiserror::Error;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_FALLBACK_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_TOP_N: usize = 5;
const MAX_TOP_N: usize = 100;

/// Errors raised while reading the run configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Which report the run produces. Each flavor is an independent pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFlavor {
    /// Month-over-month KPIs plus top-N breakdowns, narrated by Gemini.
    MonthlyInsights,
    /// Raw 90-day table written as CSV.
    Trailing90Days,
    /// Raw table for yesterday written as CSV.
    Yesterday,
}

impl ReportFlavor {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "monthly-insights" | "monthly" => Some(Self::MonthlyInsights),
            "trailing-90-days" | "90-days" => Some(Self::Trailing90Days),
            "yesterday" | "daily" => Some(Self::Yesterday),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MonthlyInsights => "monthly-insights",
            Self::Trailing90Days => "trailing-90-days",
            Self::Yesterday => "yesterday",
        }
    }

    pub fn needs_narrative(&self) -> bool {
        matches!(self, Self::MonthlyInsights)
    }

    /// Fixed file name of the artifact this flavor produces.
    pub fn output_file_name(&self) -> &'static str {
        if self.needs_narrative() {
            "issue_body.md"
        } else {
            "report.csv"
        }
    }

    /// Columns used by the CSV flavors when no override is configured.
    fn default_columns(&self) -> Option<CsvColumns> {
        let (dimensions, metrics): (&[&str], &[&str]) = match self {
            Self::MonthlyInsights => return None,
            Self::Trailing90Days => (
                &["date", "sessionSourceMedium"],
                &["sessions", "totalUsers", "screenPageViews", "conversions"],
            ),
            Self::Yesterday => (
                &["pagePath"],
                &["screenPageViews", "sessions", "totalUsers"],
            ),
        };

        Some(CsvColumns {
            dimensions: dimensions.iter().map(|s| s.to_string()).collect(),
            metrics: metrics.iter().map(|s| s.to_string()).collect(),
        })
    }
}

/// A GA4 property id, stored without the `properties/` prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyId(String);

impl PropertyId {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let trimmed = raw.trim();
        let id = trimmed.strip_prefix("properties/").unwrap_or(trimmed);

        if id.is_empty() {
            return Err(ConfigError::Missing("GA4_PROPERTY_ID"));
        }
        if !id.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::Invalid {
                key: "GA4_PROPERTY_ID",
                reason: format!("expected a numeric property id, got '{}'", raw),
            });
        }

        Ok(Self(id.to_string()))
    }

    /// Resource name used in GA4 Data API paths (`properties/123`).
    pub fn resource_name(&self) -> String {
        format!("properties/{}", self.0)
    }
}

/// Where the service account key for the GA4 Data API comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialsSource {
    File(PathBuf),
    Inline(String),
}

/// Dimensions and metrics for the CSV flavors, in column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvColumns {
    pub dimensions: Vec<String>,
    pub metrics: Vec<String>,
}

/// Settings for the Gemini narrative step.
#[derive(Debug, Clone)]
pub struct NarrativeConfig {
    pub api_key: String,
    /// Candidate models in the order they are tried. Never empty.
    pub models: Vec<String>,
    pub google_search: bool,
    /// `None` leaves the model's own default in place.
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub property: PropertyId,
    pub credentials: CredentialsSource,
    pub flavor: ReportFlavor,
    pub output_dir: PathBuf,
    pub top_n: usize,
    /// Present for the CSV flavors only.
    pub csv_columns: Option<CsvColumns>,
    /// Present only when the flavor needs the narrative step.
    pub narrative: Option<NarrativeConfig>,
}

impl ReportConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name
    /// to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let property = get("GA4_PROPERTY_ID")
            .ok_or(ConfigError::Missing("GA4_PROPERTY_ID"))
            .and_then(|raw| PropertyId::parse(&raw))?;

        let credentials = match (
            get("GOOGLE_APPLICATION_CREDENTIALS"),
            get("GOOGLE_SERVICE_ACCOUNT_JSON"),
        ) {
            (Some(path), _) => CredentialsSource::File(PathBuf::from(path)),
            (None, Some(json)) => CredentialsSource::Inline(json),
            (None, None) => return Err(ConfigError::Missing("GOOGLE_APPLICATION_CREDENTIALS")),
        };

        let flavor = match get("GA4_REPORT_FLAVOR") {
            Some(raw) => ReportFlavor::parse(&raw).ok_or_else(|| ConfigError::Invalid {
                key: "GA4_REPORT_FLAVOR",
                reason: format!(
                    "unknown flavor '{}' (expected monthly-insights, trailing-90-days or yesterday)",
                    raw
                ),
            })?,
            None => ReportFlavor::MonthlyInsights,
        };

        let output_dir = get("GA4_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        let top_n = match get("GA4_TOP_N") {
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) if (1..=MAX_TOP_N).contains(&n) => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "GA4_TOP_N",
                        reason: format!("expected an integer in 1..={}, got '{}'", MAX_TOP_N, raw),
                    })
                }
            },
            None => DEFAULT_TOP_N,
        };

        let csv_columns = match flavor.default_columns() {
            Some(defaults) => {
                let dimensions = get("GA4_CSV_DIMENSIONS")
                    .map(|raw| split_list(&raw))
                    .unwrap_or(defaults.dimensions);
                let metrics = get("GA4_CSV_METRICS")
                    .map(|raw| split_list(&raw))
                    .unwrap_or(defaults.metrics);

                if metrics.is_empty() {
                    return Err(ConfigError::Invalid {
                        key: "GA4_CSV_METRICS",
                        reason: "at least one metric is required".to_string(),
                    });
                }

                Some(CsvColumns {
                    dimensions,
                    metrics,
                })
            }
            None => None,
        };

        let narrative = if flavor.needs_narrative() {
            let api_key = get("GEMINI_API_KEY").ok_or(ConfigError::Missing("GEMINI_API_KEY"))?;

            let primary = get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
            // An explicitly empty GEMINI_FALLBACK_MODELS disables the fallback.
            let fallbacks = match lookup("GEMINI_FALLBACK_MODELS") {
                Some(raw) => split_list(&raw),
                None => vec![DEFAULT_FALLBACK_MODEL.to_string()],
            };

            let mut models = vec![primary];
            for model in fallbacks {
                if !models.contains(&model) {
                    models.push(model);
                }
            }

            let google_search = match get("GEMINI_GOOGLE_SEARCH") {
                Some(raw) => parse_bool(&raw).ok_or_else(|| ConfigError::Invalid {
                    key: "GEMINI_GOOGLE_SEARCH",
                    reason: format!("expected true or false, got '{}'", raw),
                })?,
                None => true,
            };

            let temperature = match get("GEMINI_TEMPERATURE") {
                Some(raw) => match raw.parse::<f32>() {
                    Ok(t) if (0.0..=2.0).contains(&t) => Some(t),
                    _ => {
                        return Err(ConfigError::Invalid {
                            key: "GEMINI_TEMPERATURE",
                            reason: format!("expected a number in 0.0..=2.0, got '{}'", raw),
                        })
                    }
                },
                None => None,
            };

            Some(NarrativeConfig {
                api_key,
                models,
                google_search,
                temperature,
            })
        } else {
            None
        };

        Ok(Self {
            property,
            credentials,
            flavor,
            output_dir,
            top_n,
            csv_columns,
            narrative,
        })
    }

    /// Full path of the artifact this run writes.
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(self.flavor.output_file_name())
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
