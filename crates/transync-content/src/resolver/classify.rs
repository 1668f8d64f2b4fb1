//! Reference classification and endpoint shapes

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static DOCUMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://docs\.google\.com/document/(?:u/\d+/)?d/([A-Za-z0-9_-]{10,})")
        .expect("valid document regex")
});

static SPREADSHEET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://docs\.google\.com/spreadsheets/(?:u/\d+/)?d/([A-Za-z0-9_-]{10,})")
        .expect("valid spreadsheet regex")
});

static DRIVE_FILE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://drive\.google\.com/file/(?:u/\d+/)?d/([A-Za-z0-9_-]{10,})")
        .expect("valid drive file regex")
});

static DRIVE_QUERY_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://drive\.google\.com/(?:open|uc)\?(?:.*&)?id=([A-Za-z0-9_-]{10,})")
        .expect("valid drive query regex")
});

/// Host/format class of a content reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefClass {
    /// Text document on the document host
    DocumentText {
        /// Document id
        doc_id: String,
    },
    /// Spreadsheet on the document host
    Spreadsheet {
        /// Spreadsheet id
        sheet_id: String,
    },
    /// File on the generic file host, type not yet known
    DriveFile {
        /// File id
        file_id: String,
    },
    /// File on the generic file host known to be plain text
    DriveText {
        /// File id
        file_id: String,
    },
    /// Anything else
    GenericWeb,
}

impl RefClass {
    /// Short label for logs
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::DocumentText { .. } => "document-text",
            Self::Spreadsheet { .. } => "spreadsheet",
            Self::DriveFile { .. } => "drive-file",
            Self::DriveText { .. } => "drive-text",
            Self::GenericWeb => "generic-web",
        }
    }
}

impl fmt::Display for RefClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classify a reference URL by host and path
#[must_use]
pub fn classify(url: &str) -> RefClass {
    let url = url.trim();
    let capture = |re: &Regex| re.captures(url).map(|c| c[1].to_string());

    if let Some(doc_id) = capture(&DOCUMENT) {
        RefClass::DocumentText { doc_id }
    } else if let Some(sheet_id) = capture(&SPREADSHEET) {
        RefClass::Spreadsheet { sheet_id }
    } else if let Some(file_id) = capture(&DRIVE_FILE).or_else(|| capture(&DRIVE_QUERY_ID)) {
        RefClass::DriveFile { file_id }
    } else {
        RefClass::GenericWeb
    }
}

/// Route a looked-up file name to the class that can read it
///
/// Text files go to direct download, office documents to the document or
/// spreadsheet path (the host converts them in place), anything else to
/// generic web.
#[must_use]
pub fn route_by_name(file_id: &str, name: &str) -> RefClass {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.trim().to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "txt" | "md" | "markdown" | "csv" | "tsv" | "json" | "srt" | "vtt" | "log" => RefClass::DriveText {
            file_id: file_id.to_string(),
        },
        "doc" | "docx" | "odt" | "rtf" => RefClass::DocumentText {
            doc_id: file_id.to_string(),
        },
        "xls" | "xlsx" | "xlsm" | "ods" => RefClass::Spreadsheet {
            sheet_id: file_id.to_string(),
        },
        _ => RefClass::GenericWeb,
    }
}

/// Strip the host suffix from a file view page title
#[must_use]
pub fn file_name_from_title(title: &str) -> &str {
    title
        .trim()
        .trim_end_matches("- Google Drive")
        .trim_end_matches("- Google Docs")
        .trim_end_matches("- Google Sheets")
        .trim()
}

/// Concrete endpoint shapes tried by the strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Plain-text export of a document
    DocExportText,
    /// Rendered preview of a document
    DocPreview,
    /// Edit view of a document
    DocEdit,
    /// Static HTML view of a spreadsheet
    SheetHtmlView,
    /// Direct download of a file
    DriveDownload,
    /// File view page, used to read the file name
    DriveView,
    /// The reference URL as given
    RawUrl,
}

impl Endpoint {
    /// Endpoint label for logs
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::DocExportText => "doc-export-txt",
            Self::DocPreview => "doc-preview",
            Self::DocEdit => "doc-edit",
            Self::SheetHtmlView => "sheet-htmlview",
            Self::DriveDownload => "drive-download",
            Self::DriveView => "drive-view",
            Self::RawUrl => "raw-url",
        }
    }

    /// Build the request URL, or `None` if the class has no such endpoint
    #[must_use]
    pub fn url(self, reference: &str, class: &RefClass) -> Option<String> {
        match (self, class) {
            (Self::DocExportText, RefClass::DocumentText { doc_id }) => Some(format!(
                "https://docs.google.com/document/d/{doc_id}/export?format=txt"
            )),
            (Self::DocPreview, RefClass::DocumentText { doc_id }) => {
                Some(format!("https://docs.google.com/document/d/{doc_id}/preview"))
            }
            (Self::DocEdit, RefClass::DocumentText { doc_id }) => {
                Some(format!("https://docs.google.com/document/d/{doc_id}/edit"))
            }
            (Self::SheetHtmlView, RefClass::Spreadsheet { sheet_id }) => Some(format!(
                "https://docs.google.com/spreadsheets/d/{sheet_id}/htmlview"
            )),
            (Self::DriveDownload, RefClass::DriveText { file_id } | RefClass::DriveFile { file_id }) => Some(
                format!("https://drive.google.com/uc?export=download&id={file_id}"),
            ),
            (Self::DriveView, RefClass::DriveFile { file_id } | RefClass::DriveText { file_id }) => {
                Some(format!("https://drive.google.com/file/d/{file_id}/view"))
            }
            (Self::RawUrl, _) => Some(reference.trim().to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "1AbCdEfGhIjKlMnOp_qr-st";

    #[test]
    fn classifies_document_hosts() {
        assert_eq!(
            classify(&format!("https://docs.google.com/document/d/{ID}/edit?usp=sharing")),
            RefClass::DocumentText { doc_id: ID.to_string() }
        );
        assert_eq!(
            classify(&format!("https://docs.google.com/document/u/1/d/{ID}/edit")),
            RefClass::DocumentText { doc_id: ID.to_string() }
        );
        assert_eq!(
            classify(&format!("https://docs.google.com/spreadsheets/d/{ID}/edit#gid=0")),
            RefClass::Spreadsheet { sheet_id: ID.to_string() }
        );
    }

    #[test]
    fn classifies_drive_files() {
        assert_eq!(
            classify(&format!("https://drive.google.com/file/d/{ID}/view?usp=drive_link")),
            RefClass::DriveFile { file_id: ID.to_string() }
        );
        assert_eq!(
            classify(&format!("https://drive.google.com/open?id={ID}")),
            RefClass::DriveFile { file_id: ID.to_string() }
        );
        assert_eq!(
            classify(&format!("https://drive.google.com/uc?export=download&id={ID}")),
            RefClass::DriveFile { file_id: ID.to_string() }
        );
    }

    #[test]
    fn everything_else_is_generic() {
        assert_eq!(classify("https://example.com/ep01.txt"), RefClass::GenericWeb);
        assert_eq!(classify("not a url"), RefClass::GenericWeb);
    }

    #[test]
    fn routes_by_extension() {
        assert!(matches!(route_by_name(ID, "ep01.TXT"), RefClass::DriveText { .. }));
        assert!(matches!(route_by_name(ID, "style guide.docx"), RefClass::DocumentText { .. }));
        assert!(matches!(route_by_name(ID, "glossary.xlsx"), RefClass::Spreadsheet { .. }));
        assert_eq!(route_by_name(ID, "scan.pdf"), RefClass::GenericWeb);
        assert_eq!(route_by_name(ID, "no-extension"), RefClass::GenericWeb);
    }

    #[test]
    fn strips_title_suffix() {
        assert_eq!(file_name_from_title("ep01.txt - Google Drive"), "ep01.txt");
    }

    #[test]
    fn endpoints_only_exist_for_matching_class() {
        let doc = RefClass::DocumentText { doc_id: ID.to_string() };
        assert!(Endpoint::DocExportText.url("u", &doc).is_some_and(|u| u.ends_with("export?format=txt")));
        assert!(Endpoint::SheetHtmlView.url("u", &doc).is_none());
        assert_eq!(Endpoint::RawUrl.url(" u ", &RefClass::GenericWeb).as_deref(), Some("u"));
    }
}
