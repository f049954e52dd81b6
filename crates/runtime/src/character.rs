use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;

use crate::strip_code_fences;

/// A generated consultation guest. Immutable once persisted, except for
/// `portrait_url` which is back-filled after the portrait upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Character {
    pub id: Uuid,

    pub name: String,
    pub age: i32,
    pub gender: String,
    pub occupation: String,
    pub personality: String,
    pub concern: String,

    pub birth_date: String,
    pub birth_time: String,
    pub speaking_style: String,
    pub greeting: String,

    pub portrait_url: Option<String>,

    pub created_at: i64,
}

impl Character {
    /// The descriptive block folded into the roleplay and reading prompts.
    pub fn profile_block(&self) -> String {
        format!(
            "이름: {}\n나이: {}세\n성별: {}\n직업: {}\n성격: {}\n현재 고민: {}\n생년월일시: {} {}\n말투: {}",
            self.name,
            self.age,
            self.gender,
            self.occupation,
            self.personality,
            self.concern,
            self.birth_date,
            self.birth_time,
            self.speaking_style,
        )
    }
}

/// What persona synthesis must hand back. Field names double as the JSON
/// keys the prompt pins down.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterSheet {
    pub name: String,
    pub age: i32,
    pub gender: String,
    pub occupation: String,
    pub personality: String,
    pub concern: String,
    pub birth_date: String,
    pub birth_time: String,
    pub speaking_style: String,
    pub greeting: String,
}

impl CharacterSheet {
    /// Parse a model reply into a sheet. A transport error upstream and a
    /// malformed reply here are reported identically: no usable persona.
    pub fn from_completion(raw: &str) -> Result<Self> {
        let sheet: Self = serde_json::from_str(strip_code_fences(raw))
            .map_err(|e| anyhow!("persona reply is not the expected JSON: {}", e))?;
        sheet.validate()?;
        Ok(sheet)
    }

    fn validate(&self) -> Result<()> {
        let required = [
            ("name", &self.name),
            ("gender", &self.gender),
            ("occupation", &self.occupation),
            ("personality", &self.personality),
            ("concern", &self.concern),
            ("birth_date", &self.birth_date),
            ("birth_time", &self.birth_time),
            ("speaking_style", &self.speaking_style),
            ("greeting", &self.greeting),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(anyhow!("persona reply left '{}' blank", field));
            }
        }
        if !(20..=60).contains(&self.age) {
            return Err(anyhow!("persona age {} is outside the 20-60 contract", self.age));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet_json() -> String {
        serde_json::json!({
            "name": "임수진",
            "age": 35,
            "gender": "여성",
            "occupation": "프리랜서 일러스트레이터",
            "personality": "섬세하고 내성적이며 창의적인 성격",
            "concern": "최근 중요한 클라이언트를 잃고 진로를 고민하고 있음",
            "birth_date": "1985-07-14",
            "birth_time": "08:30",
            "speaking_style": "부드럽고 정중한 말투",
            "greeting": "안녕하세요... 사주를 좀 보러 왔는데요."
        })
        .to_string()
    }

    #[test]
    fn parses_plain_json() {
        let sheet = CharacterSheet::from_completion(&sheet_json()).unwrap();
        assert_eq!(sheet.name, "임수진");
        assert_eq!(sheet.age, 35);
    }

    #[test]
    fn parses_fenced_json() {
        let fenced = format!("```json\n{}\n```", sheet_json());
        let sheet = CharacterSheet::from_completion(&fenced).unwrap();
        assert_eq!(sheet.occupation, "프리랜서 일러스트레이터");
    }

    #[test]
    fn rejects_malformed_reply() {
        assert!(CharacterSheet::from_completion("죄송하지만 생성할 수 없습니다.").is_err());
    }

    #[test]
    fn rejects_blank_fields() {
        let raw = sheet_json().replace("임수진", " ");
        assert!(CharacterSheet::from_completion(&raw).is_err());
    }

    #[test]
    fn rejects_age_outside_contract() {
        let raw = sheet_json().replace("35", "17");
        assert!(CharacterSheet::from_completion(&raw).is_err());
    }
}
