//! Request and response bodies for the HTTP API.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterReq {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RegisterRes {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginReq {
    pub email: String,
    pub password: String,
}

/// Session token to send back in the `x-session-token` header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LoginRes {
    pub token: String,
}

/// UI colour scheme preference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SettingsRes {
    pub username: String,
    pub email: String,
    pub theme: Theme,
    pub notifications: bool,
}

/// Replaces both settings; omitted fields reset to `light` and `false`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateSettingsReq {
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub notifications: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LabelsRes {
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RemedyDto {
    pub name: String,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TreatmentRes {
    pub label: String,
    pub chemical: Vec<RemedyDto>,
    pub organic: Vec<RemedyDto>,
    pub prevention: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PredictionDto {
    pub label: String,
    /// Raw score in `[0, 1]`
    pub confidence: f32,
    /// Score as a percentage rounded to two decimals
    pub percent: f32,
}

/// Full result for one analysed upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DiagnosisRes {
    /// Where the stored upload is served from, relative to the site root
    pub image_url: String,
    pub predictions: Vec<PredictionDto>,
    pub top: PredictionDto,
    pub treatment: TreatmentRes,
    pub explanation: String,
    /// `model` when the language model answered, `fallback` otherwise
    pub explanation_source: String,
    pub low_confidence: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub warning: Option<String>,
}

/// Multipart body for `/predict`.
#[derive(Debug, ToSchema)]
pub struct UploadImageReq {
    #[schema(value_type = String, format = Binary)]
    pub image: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn theme_is_lowercase_and_defaults_to_light() {
        assert_eq!(serde_json::to_string(&Theme::Dark).unwrap(), "\"dark\"");
        let req: UpdateSettingsReq = serde_json::from_str("{}").unwrap();
        assert_eq!(req.theme, Theme::Light);
        assert!(!req.notifications);
    }

    #[test]
    fn warning_is_omitted_when_absent() {
        let top = PredictionDto {
            label: "Healthy".into(),
            confidence: 0.9,
            percent: 90.0,
        };
        let res = DiagnosisRes {
            image_url: "/static/uploads/leaf.jpg".into(),
            predictions: vec![top.clone()],
            top,
            treatment: TreatmentRes {
                label: "Healthy".into(),
                chemical: vec![],
                organic: vec![],
                prevention: vec![],
            },
            explanation: "Disease Overview:\nHealthy".into(),
            explanation_source: "fallback".into(),
            low_confidence: false,
            warning: None,
        };
        let json = serde_json::to_value(&res).unwrap();
        assert!(json.get("warning").is_none());
    }
}
