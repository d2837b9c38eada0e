use relmenu_document::DocumentParseError;

#[derive(Debug, thiserror::Error)]
pub enum MenuPdfError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("font error: {0}")]
    Font(String),
    #[error("pdf error: {0}")]
    Pdf(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractErrorKind {
    Missing,
    MalformedJson,
    SchemaTooNew,
}

impl ExtractErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ExtractErrorKind::Missing => "missing",
            ExtractErrorKind::MalformedJson => "malformed-json",
            ExtractErrorKind::SchemaTooNew => "schema-too-new",
        }
    }
}

/// Failure to recover the embedded source document from a PDF.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("no embedded document: {0}")]
    Missing(String),
    #[error("embedded document is not valid json: {0}")]
    MalformedJson(String),
    #[error("embedded document schema version {found} is newer than supported version {supported}")]
    SchemaTooNew { found: u64, supported: u32 },
}

impl ExtractError {
    pub fn kind(&self) -> ExtractErrorKind {
        match self {
            ExtractError::Missing(_) => ExtractErrorKind::Missing,
            ExtractError::MalformedJson(_) => ExtractErrorKind::MalformedJson,
            ExtractError::SchemaTooNew { .. } => ExtractErrorKind::SchemaTooNew,
        }
    }
}

impl From<DocumentParseError> for ExtractError {
    fn from(value: DocumentParseError) -> Self {
        match value {
            DocumentParseError::MalformedJson(message) => ExtractError::MalformedJson(message),
            DocumentParseError::SchemaTooNew { found, supported } => {
                ExtractError::SchemaTooNew { found, supported }
            }
        }
    }
}

pub(crate) fn lopdf_err(err: lopdf::Error) -> MenuPdfError {
    MenuPdfError::Pdf(err.to_string())
}
