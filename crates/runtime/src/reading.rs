use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;

use crate::strip_code_fences;

/// The closing interpretation. At most one per session, written only after
/// the session is flagged completed, immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct FortuneReading {
    pub id: Uuid,
    pub session_id: Uuid,
    pub character_id: Uuid,

    pub fortune_analysis: String,
    pub personality_analysis: String,
    pub advice: String,
    pub summary: String,

    pub created_at: i64,
}

/// The four text fields reading synthesis must return.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadingSheet {
    pub fortune_analysis: String,
    pub personality_analysis: String,
    pub advice: String,
    pub summary: String,
}

impl ReadingSheet {
    pub fn from_completion(raw: &str) -> Result<Self> {
        let sheet: Self = serde_json::from_str(strip_code_fences(raw))
            .map_err(|e| anyhow!("reading reply is not the expected JSON: {}", e))?;
        sheet.validate()?;
        Ok(sheet)
    }

    fn validate(&self) -> Result<()> {
        let required = [
            ("fortune_analysis", &self.fortune_analysis),
            ("personality_analysis", &self.personality_analysis),
            ("advice", &self.advice),
            ("summary", &self.summary),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(anyhow!("reading reply left '{}' blank", field));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_four_fields() {
        let raw = serde_json::json!({
            "fortune_analysis": "올해는 변화의 해입니다.",
            "personality_analysis": "섬세하고 신중한 기질입니다.",
            "advice": "서두르지 말고 가을까지 기다리세요.",
            "summary": "느리지만 좋은 흐름."
        })
        .to_string();
        let sheet = ReadingSheet::from_completion(&raw).unwrap();
        assert_eq!(sheet.summary, "느리지만 좋은 흐름.");
    }

    #[test]
    fn rejects_missing_field() {
        let raw = r#"{"fortune_analysis": "...", "advice": "...", "summary": "..."}"#;
        assert!(ReadingSheet::from_completion(raw).is_err());
    }

    #[test]
    fn rejects_blank_field() {
        let raw = serde_json::json!({
            "fortune_analysis": "",
            "personality_analysis": "x",
            "advice": "x",
            "summary": "x"
        })
        .to_string();
        assert!(ReadingSheet::from_completion(&raw).is_err());
    }
}
