pub mod config;
pub mod languages;
pub mod llm;
pub mod models;
pub mod ocr;
pub mod offline;
pub mod report;
pub mod service;
pub mod speech;
pub mod stages;
pub mod summarize;
pub mod summary;
pub mod workflow;

pub use config::AppConfig;
pub use service::{AppState, create_app, create_app_state};
pub use workflow::{build_report_pipeline, create_report_session, describe_state};
