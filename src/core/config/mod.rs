pub mod report_config;

pub use report_config::{
    ConfigError, CredentialsSource, CsvColumns, PropertyId, ReportConfig, ReportFlavor,
};
