//! Report history and the downloadable report document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use uuid::Uuid;

use crate::{
    languages,
    models::{CapturedImage, PatientInfo, ReportCase, Summary},
};

/// Persisted bundle of one completed pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRecord {
    pub id: String,
    pub case_id: String,
    pub language: String,
    pub patient: Option<PatientInfo>,
    pub extracted_text: String,
    pub summary: Summary,
    pub image: Option<CapturedImage>,
    pub created_at: DateTime<Utc>,
}

impl ReportRecord {
    /// Build a record from a case that has both an extraction and a summary.
    pub fn from_case(case: &ReportCase) -> Option<Self> {
        let extraction = case.extraction.as_ref()?;
        let summary = case.summary.clone()?;
        Some(Self {
            id: Uuid::new_v4().to_string(),
            case_id: case.id.clone(),
            language: case.language.clone(),
            patient: case.patient.clone(),
            extracted_text: extraction.text.clone(),
            summary,
            image: case.image.clone(),
            created_at: Utc::now(),
        })
    }
}

/// In-memory report history for the session, newest first. No database by
/// design: nothing outlives the process.
#[derive(Default)]
pub struct ReportHistory {
    records: RwLock<Vec<ReportRecord>>,
}

impl ReportHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, record: ReportRecord) {
        self.records.write().expect("history lock poisoned").push(record);
    }

    pub fn list(&self) -> Vec<ReportRecord> {
        let records = self.records.read().expect("history lock poisoned");
        records.iter().rev().cloned().collect()
    }

    pub fn find_by_case(&self, case_id: &str) -> Option<ReportRecord> {
        let records = self.records.read().expect("history lock poisoned");
        records.iter().rev().find(|r| r.case_id == case_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.read().expect("history lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Render a record as a printable, self-contained HTML document with
/// localized section labels.
pub fn render_html(record: &ReportRecord) -> String {
    let labels = languages::report_labels(&record.language);

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{}</title>\n", escape(labels.title)));
    html.push_str(
        "<style>body{font-family:sans-serif;max-width:720px;margin:2rem auto;padding:0 1rem}\
         h1{border-bottom:2px solid #2a7;padding-bottom:.5rem}\
         pre{background:#f5f5f5;padding:1rem;white-space:pre-wrap}\
         table td{padding:.25rem .75rem .25rem 0}\
         img{max-width:100%}</style>\n</head>\n<body>\n",
    );
    html.push_str(&format!("<h1>{}</h1>\n", escape(labels.title)));

    if let Some(patient) = &record.patient {
        html.push_str(&format!("<h2>{}</h2>\n<table>\n", escape(labels.patient)));
        for (label, value) in [
            ("Name", &patient.name),
            ("Age", &patient.age),
            ("Gender", &patient.gender),
            ("Location", &patient.location),
            ("Notes", &patient.notes),
        ] {
            if !value.is_empty() {
                html.push_str(&format!(
                    "<tr><td><strong>{}</strong></td><td>{}</td></tr>\n",
                    escape(label),
                    escape(value)
                ));
            }
        }
        html.push_str("</table>\n");
    }

    html.push_str(&format!(
        "<h2>{}</h2>\n<p>{}</p>\n",
        escape(labels.interpretation),
        escape(&record.summary.interpretation)
    ));

    html.push_str(&format!("<h2>{}</h2>\n<ul>\n", escape(labels.actions)));
    for item in &record.summary.action_items {
        html.push_str(&format!("<li>{}</li>\n", escape(item)));
    }
    html.push_str("</ul>\n");

    html.push_str(&format!(
        "<h2>{}</h2>\n<pre>{}</pre>\n",
        escape(labels.extracted),
        escape(&record.extracted_text)
    ));

    if let Some(image) = &record.image {
        // Data URIs are not escaped; the payload is validated base64.
        html.push_str(&format!("<img src=\"{}\" alt=\"report\">\n", image.data_uri()));
    }

    html.push_str(&format!(
        "<footer><small>{}</small></footer>\n</body>\n</html>\n",
        record.created_at.to_rfc3339()
    ));

    html
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
