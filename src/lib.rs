use clap::ValueEnum;

pub mod call;
pub mod client;
pub mod compare;
pub mod discover;
pub mod profiler;
pub mod schema;
pub mod suites;

/// Rendering target for comparison documents.
#[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    /// Markdown tables, suitable for PR comments and CI artifacts.
    #[default]
    Markdown,
    /// HTML fragment for embedding in dashboards.
    Html,
}
