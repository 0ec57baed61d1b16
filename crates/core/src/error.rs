use crate::classifier::ClassifierError;
use crate::label::DiseaseLabel;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to read treatment table: {0}")]
    CatalogRead(std::io::Error),
    #[error("failed to parse treatment table at {path}: {source}")]
    CatalogParse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("treatment table has no entry for label {0}")]
    CatalogMissingLabel(DiseaseLabel),

    #[error("No image uploaded")]
    NoImageUploaded,
    #[error("No image selected")]
    NoImageSelected,
    #[error("Invalid file type. Only png/jpg/jpeg allowed.")]
    InvalidFileType,

    #[error("analysis failed: {0}")]
    AnalysisFailed(#[source] ClassifierError),
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
