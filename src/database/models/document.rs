use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    Passport,
    BankStatement,
    EmploymentLetter,
    TravelInsurance,
    HotelReservation,
    FlightReservation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    PendingValidation,
    Approved,
    Rejected,
}

/// Metadata for one uploaded file; the bytes live at `storage_path`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub doc_id: String,
    pub user_id: String,
    pub storage_path: String,
    pub doc_type: DocumentType,
    pub status: DocumentStatus,
    pub document_title: String,
    pub file_name: String,
    pub file_size: u64,
    pub mime_type: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(alias = "uploaded_at")]
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial metadata update; absent fields are left untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl DocumentUpdate {
    pub fn into_fields(self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// Split a comma separated tag string, trimming and dropping empties
pub fn parse_tags(raw: Option<&str>) -> Vec<String> {
    raw.map(|tags| {
        tags.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// `users/{uid}/documents/{doc_id}{ext}`, keeping the original extension
pub fn storage_path(uid: &str, doc_id: &str, file_name: &str) -> String {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();
    format!("users/{}/documents/{}{}", uid, doc_id, ext)
}

/// Aggregate view over one user's documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentStats {
    pub total_documents: u64,
    pub by_type: BTreeMap<DocumentType, u64>,
    pub by_status: BTreeMap<DocumentStatus, u64>,
    pub total_size_bytes: u64,
    pub total_size_mb: f64,
    pub average_size_bytes: u64,
    pub recent_uploads: u64,
}

/// Window counted as "recent" in [`DocumentStats`]
pub const RECENT_WINDOW_DAYS: i64 = 7;

impl DocumentStats {
    pub fn compute(documents: &[Document], now: DateTime<Utc>) -> Self {
        let cutoff = now - Duration::days(RECENT_WINDOW_DAYS);
        let mut by_type = BTreeMap::new();
        let mut by_status = BTreeMap::new();
        let mut total_size_bytes = 0u64;
        let mut recent_uploads = 0u64;

        for doc in documents {
            *by_type.entry(doc.doc_type).or_insert(0) += 1;
            *by_status.entry(doc.status).or_insert(0) += 1;
            total_size_bytes += doc.file_size;
            if doc.created_at >= cutoff {
                recent_uploads += 1;
            }
        }

        let total_documents = documents.len() as u64;
        let average_size_bytes = if total_documents == 0 { 0 } else { total_size_bytes / total_documents };
        let total_size_mb = (total_size_bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0;

        Self {
            total_documents,
            by_type,
            by_status,
            total_size_bytes,
            total_size_mb,
            average_size_bytes,
            recent_uploads,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn doc(doc_type: DocumentType, status: DocumentStatus, size: u64, created_at: DateTime<Utc>) -> Document {
        Document {
            doc_id: "d".into(),
            user_id: "u1".into(),
            storage_path: "users/u1/documents/d.pdf".into(),
            doc_type,
            status,
            document_title: "Passport scan".into(),
            file_name: "passport.pdf".into(),
            file_size: size,
            mime_type: "application/pdf".into(),
            notes: None,
            tags: vec![],
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn tags_are_trimmed_without_empties() {
        assert_eq!(parse_tags(Some("a, b ,c")), vec!["a", "b", "c"]);
        assert_eq!(parse_tags(Some(" ,visa,, ,")), vec!["visa"]);
        assert!(parse_tags(Some("")).is_empty());
        assert!(parse_tags(None).is_empty());
    }

    #[test]
    fn storage_path_keeps_extension() {
        assert_eq!(storage_path("u1", "d1", "scan.PDF"), "users/u1/documents/d1.PDF");
        assert_eq!(storage_path("u1", "d1", "archive.tar.gz"), "users/u1/documents/d1.gz");
        assert_eq!(storage_path("u1", "d1", "README"), "users/u1/documents/d1");
    }

    #[test]
    fn stats_window_crosses_month_boundary() {
        // On the 3rd of a month the cutoff lands in the previous month
        let now = Utc.with_ymd_and_hms(2024, 3, 3, 12, 0, 0).unwrap();
        let docs = vec![
            doc(DocumentType::Passport, DocumentStatus::PendingValidation, 1024 * 1024, now - Duration::days(1)),
            doc(DocumentType::Passport, DocumentStatus::Approved, 2 * 1024 * 1024, now - Duration::days(6)),
            doc(DocumentType::BankStatement, DocumentStatus::PendingValidation, 512, now - Duration::days(8)),
        ];
        let stats = DocumentStats::compute(&docs, now);
        assert_eq!(stats.total_documents, 3);
        assert_eq!(stats.recent_uploads, 2);
        assert_eq!(stats.by_type[&DocumentType::Passport], 2);
        assert_eq!(stats.by_status[&DocumentStatus::PendingValidation], 2);
        assert_eq!(stats.total_size_bytes, 3 * 1024 * 1024 + 512);
        assert_eq!(stats.total_size_mb, 3.0);
        assert_eq!(stats.average_size_bytes, (3 * 1024 * 1024 + 512) / 3);
    }

    #[test]
    fn stats_of_nothing() {
        let stats = DocumentStats::compute(&[], Utc::now());
        assert_eq!(stats.total_documents, 0);
        assert_eq!(stats.average_size_bytes, 0);
        assert_eq!(serde_json::to_value(&stats).unwrap()["by_type"], json!({}));
    }

    #[test]
    fn legacy_uploaded_at_is_accepted() {
        let value = json!({
            "doc_id": "d1",
            "user_id": "u1",
            "storage_path": "users/u1/documents/d1.pdf",
            "doc_type": "TRAVEL_INSURANCE",
            "status": "PENDING_VALIDATION",
            "document_title": "Insurance",
            "file_name": "ins.pdf",
            "file_size": 10,
            "mime_type": "application/pdf",
            "uploaded_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        });
        let doc: Document = serde_json::from_value(value).unwrap();
        assert_eq!(doc.created_at, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert!(doc.tags.is_empty());
    }
}
