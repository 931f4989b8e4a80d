use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::MAX_DOCUMENT_BYTES;

pub const REJECT_UNSUPPORTED_TYPE: &str = "Please upload a PDF, JPG, or PNG file";
pub const REJECT_TOO_LARGE: &str = "File size must be less than 10MB";
pub const REJECT_EMPTY: &str = "The selected file is empty";
pub const REJECT_CONTENT_MISMATCH: &str = "File contents do not match its declared type";

/// Invoice formats accepted at intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Pdf,
    Jpeg,
    Png,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    /// Parse a declared MIME type. Case-insensitive, parameters ignored,
    /// and the common non-standard `image/jpg` is accepted.
    pub fn from_mime(declared: &str) -> Option<Self> {
        let essence = declared
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "application/pdf" => Some(Self::Pdf),
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            _ => None,
        }
    }

    /// Detect format from magic bytes (NOT file extensions).
    pub fn sniff(header: &[u8]) -> Option<Self> {
        match header {
            // PDF: starts with %PDF
            [0x25, 0x50, 0x44, 0x46, ..] => Some(Self::Pdf),
            // JPEG: starts with FF D8 FF
            [0xFF, 0xD8, 0xFF, ..] => Some(Self::Jpeg),
            // PNG: starts with 89 50 4E 47
            [0x89, 0x50, 0x4E, 0x47, ..] => Some(Self::Png),
            _ => None,
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of intake validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeDecision {
    Accepted(MediaType),
    Rejected(String),
}

/// Raw invoice as handed over by the presentation layer. Lives only for
/// the duration of one ingestion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceDocument {
    pub bytes: Vec<u8>,
    pub media_type: MediaType,
    pub byte_len: u64,
    pub file_name: Option<String>,
}

impl InvoiceDocument {
    /// Validate and wrap raw bytes. Fails with the user-facing rejection
    /// reason when the document may not enter the pipeline.
    pub fn new(
        bytes: Vec<u8>,
        declared_media_type: &str,
        file_name: Option<&str>,
    ) -> Result<Self, String> {
        let byte_len = bytes.len() as u64;
        let media_type = match validate_intake(declared_media_type, byte_len) {
            IntakeDecision::Accepted(media_type) => media_type,
            IntakeDecision::Rejected(reason) => return Err(reason),
        };

        if let Some(sniffed) = MediaType::sniff(&bytes) {
            if sniffed != media_type {
                return Err(REJECT_CONTENT_MISMATCH.to_string());
            }
        }

        Ok(Self {
            bytes,
            media_type,
            byte_len,
            file_name: file_name.map(sanitize_filename),
        })
    }

    /// Read a file from disk, declaring its type from the extension.
    /// Oversized files are rejected from metadata before reading.
    pub fn from_path(path: &Path) -> Result<Self, String> {
        let metadata = std::fs::metadata(path).map_err(|e| format!("Could not read file: {e}"))?;
        let declared = mime_guess::from_path(path).first_or_octet_stream();
        if let IntakeDecision::Rejected(reason) = validate_intake(declared.as_ref(), metadata.len()) {
            return Err(reason);
        }

        let bytes = std::fs::read(path).map_err(|e| format!("Could not read file: {e}"))?;
        let name = path.file_name().and_then(|n| n.to_str());
        Self::new(bytes, declared.as_ref(), name)
    }
}

/// Decide whether a document of the given declared type and size may enter
/// the pipeline. Pure and total.
pub fn validate_intake(declared_media_type: &str, byte_len: u64) -> IntakeDecision {
    let Some(media_type) = MediaType::from_mime(declared_media_type) else {
        return IntakeDecision::Rejected(REJECT_UNSUPPORTED_TYPE.to_string());
    };
    if byte_len == 0 {
        return IntakeDecision::Rejected(REJECT_EMPTY.to_string());
    }
    if byte_len > MAX_DOCUMENT_BYTES {
        return IntakeDecision::Rejected(REJECT_TOO_LARGE.to_string());
    }
    IntakeDecision::Accepted(media_type)
}

/// Sanitize a filename: strip path components, limit length
pub fn sanitize_filename(original: &str) -> String {
    let name = Path::new(original)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("invoice");

    let clean: String = name
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | '\0'))
        .take(255)
        .collect();

    if clean.is_empty() {
        "invoice".to_string()
    } else {
        clean
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PDF_BYTES: &[u8] = b"%PDF-1.7 invoice";
    const JPEG_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00];
    const PNG_BYTES: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn accepts_supported_types() {
        assert_eq!(validate_intake("application/pdf", 1024), IntakeDecision::Accepted(MediaType::Pdf));
        assert_eq!(validate_intake("image/jpeg", 1024), IntakeDecision::Accepted(MediaType::Jpeg));
        assert_eq!(validate_intake("image/jpg", 1024), IntakeDecision::Accepted(MediaType::Jpeg));
        assert_eq!(validate_intake("IMAGE/PNG", 1024), IntakeDecision::Accepted(MediaType::Png));
        assert_eq!(
            validate_intake("application/pdf; charset=binary", 1024),
            IntakeDecision::Accepted(MediaType::Pdf)
        );
    }

    #[test]
    fn rejects_unsupported_types() {
        for mime in ["image/gif", "image/heic", "text/plain", "application/octet-stream", ""] {
            assert_eq!(
                validate_intake(mime, 1024),
                IntakeDecision::Rejected(REJECT_UNSUPPORTED_TYPE.to_string()),
                "{mime} should be rejected"
            );
        }
    }

    #[test]
    fn size_limit_is_inclusive() {
        assert_eq!(
            validate_intake("image/png", MAX_DOCUMENT_BYTES),
            IntakeDecision::Accepted(MediaType::Png)
        );
        assert_eq!(
            validate_intake("image/png", MAX_DOCUMENT_BYTES + 1),
            IntakeDecision::Rejected(REJECT_TOO_LARGE.to_string())
        );
    }

    #[test]
    fn empty_document_rejected() {
        assert_eq!(
            validate_intake("application/pdf", 0),
            IntakeDecision::Rejected(REJECT_EMPTY.to_string())
        );
    }

    #[test]
    fn sniff_magic_bytes() {
        assert_eq!(MediaType::sniff(PDF_BYTES), Some(MediaType::Pdf));
        assert_eq!(MediaType::sniff(JPEG_BYTES), Some(MediaType::Jpeg));
        assert_eq!(MediaType::sniff(PNG_BYTES), Some(MediaType::Png));
        assert_eq!(MediaType::sniff(&[0x4D, 0x5A, 0x90, 0x00]), None);
        assert_eq!(MediaType::sniff(&[]), None);
    }

    #[test]
    fn document_with_mismatched_content_rejected() {
        // JPEG content declared as PDF
        let err = InvoiceDocument::new(JPEG_BYTES.to_vec(), "application/pdf", None).unwrap_err();
        assert_eq!(err, REJECT_CONTENT_MISMATCH);
    }

    #[test]
    fn document_records_length_and_name() {
        let doc = InvoiceDocument::new(PNG_BYTES.to_vec(), "image/png", Some("../../receipt.png")).unwrap();
        assert_eq!(doc.byte_len, PNG_BYTES.len() as u64);
        assert_eq!(doc.media_type, MediaType::Png);
        assert_eq!(doc.file_name.as_deref(), Some("receipt.png"));
    }

    #[test]
    fn document_from_path_uses_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invoice.pdf");
        std::fs::write(&path, PDF_BYTES).unwrap();
        let doc = InvoiceDocument::from_path(&path).unwrap();
        assert_eq!(doc.media_type, MediaType::Pdf);
        assert_eq!(doc.file_name.as_deref(), Some("invoice.pdf"));
    }

    #[test]
    fn oversized_file_rejected_before_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.pdf");
        // Sparse file just over the limit
        let file = std::fs::File::create(&path).unwrap();
        file.set_len(MAX_DOCUMENT_BYTES + 1).unwrap();
        assert_eq!(InvoiceDocument::from_path(&path).unwrap_err(), REJECT_TOO_LARGE);
    }

    #[test]
    fn text_file_rejected_by_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "Receipt: kettle, 2024-01-02").unwrap();
        assert_eq!(InvoiceDocument::from_path(&path).unwrap_err(), REJECT_UNSUPPORTED_TYPE);
    }

    #[test]
    fn sanitize_path_traversal() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("receipt_2024.pdf"), "receipt_2024.pdf");
        assert_eq!(sanitize_filename(""), "invoice");
        assert_eq!(sanitize_filename("file\0name.pdf"), "filename.pdf");
    }
}
