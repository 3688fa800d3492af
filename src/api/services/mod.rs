pub mod analytics;
pub mod health;
pub mod metrics;
pub mod redirect;
pub mod urls;

pub use analytics::AnalyticsApiService;
pub use health::HealthApiService;
pub use metrics::MetricsApiService;
pub use redirect::RedirectApiService;
pub use urls::UrlApiService;
