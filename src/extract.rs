//! Text extraction for uploaded binary documents.
//!
//! Extraction is boundary-layer: the HTTP handler supplies bytes, this
//! module returns plain UTF-8 text. Failure is fatal for the bind attempt;
//! the pipeline never sees a document without text.

use crate::error::ChatError;

/// Extract plain text from a PDF.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String, ChatError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ChatError::Extract(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal valid PDF containing the text "extraction test phrase".
    /// Builds body then xref with correct byte offsets so pdf-extract can
    /// parse it.
    fn minimal_pdf_with_phrase() -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"%PDF-1.4\n");
        let o1 = out.len();
        out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
        let o2 = out.len();
        out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
        let o3 = out.len();
        out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
        let o4 = out.len();
        out.extend_from_slice(b"4 0 obj << /Length 54 >> stream\nBT /F1 12 Tf 100 700 Td (extraction test phrase) Tj ET\nendstream endobj\n");
        let o5 = out.len();
        out.extend_from_slice(
            b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
        );
        let xref_start = out.len();
        out.extend_from_slice(b"xref\n0 6\n");
        out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
        out.extend_from_slice(format!("{:010} 00000 n \n", o1).as_bytes());
        out.extend_from_slice(format!("{:010} 00000 n \n", o2).as_bytes());
        out.extend_from_slice(format!("{:010} 00000 n \n", o3).as_bytes());
        out.extend_from_slice(format!("{:010} 00000 n \n", o4).as_bytes());
        out.extend_from_slice(format!("{:010} 00000 n \n", o5).as_bytes());
        out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
        out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
        out.extend_from_slice(b"%%EOF\n");
        out
    }

    #[test]
    fn test_extracts_text_from_pdf() {
        let text = extract_pdf_text(&minimal_pdf_with_phrase()).unwrap();
        assert!(text.contains("extraction test phrase"));
    }

    #[test]
    fn test_garbage_bytes_error() {
        assert!(matches!(
            extract_pdf_text(b"definitely not a pdf"),
            Err(ChatError::Extract(_))
        ));
    }
}
