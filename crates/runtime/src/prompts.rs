//! Prompt templates. The texts pin down the JSON keys the parsing side
//! expects; changing a key here breaks `CharacterSheet`/`ReadingSheet`.

use crate::Character;

pub const PERSONA_SYSTEM_PROMPT: &str =
    "You are a creative character designer for fortune-telling consultations.";

pub const PERSONA_REQUEST: &str = r#"당신은 사주 상담소를 방문한 가상의 인물을 생성하는 전문가입니다.
다음 요소를 모두 포함한 인물을 만들어주세요:
- 이름 (한국 이름)
- 나이 (20-60세)
- 성별
- 직업
- 성격 (한 문장)
- 현재 고민이나 상황 (구체적으로)
- 생년월일 (음력 가능, 형식: YYYY-MM-DD)과 태어난 시각 (형식: HH:MM)
- 말투 특징
- 상담소에 들어서며 건네는 첫 인사말 (그 인물의 말투로)

자연스럽고 공감 가능한 인물을 만들어주세요.
반드시 아래 키를 가진 JSON 객체로만 응답하세요:
{"name": string, "age": number, "gender": string, "occupation": string, "personality": string, "concern": string, "birth_date": string, "birth_time": string, "speaking_style": string, "greeting": string}"#;

pub fn roleplay_system_prompt(character: &Character) -> String {
    format!(
        "당신은 다음과 같은 인물입니다:\n{}\n\n사주를 보러 온 손님으로서 상담사와 자연스럽게 대화하세요. 항상 인물의 말투를 유지하고, 한 번에 한두 문단 이내로만 말하세요.",
        character.profile_block()
    )
}

pub const READING_SYSTEM_PROMPT: &str =
    "You are a seasoned saju (Four Pillars) master who writes warm, concrete fortune readings in Korean.";

pub fn reading_request(character: &Character, transcript_block: &str) -> String {
    format!(
        r#"다음은 사주 상담소를 방문한 손님의 정보와 상담 대화 전체입니다.

[손님 정보]
{}

[상담 기록]
{}

위 내용을 바탕으로 이 손님의 사주 풀이를 작성해주세요.
반드시 아래 키를 가진 JSON 객체로만 응답하세요:
{{"fortune_analysis": string, "personality_analysis": string, "advice": string, "summary": string}}
- fortune_analysis: 전반적인 운세 풀이
- personality_analysis: 사주에서 드러나는 성격 분석
- advice: 현재 고민에 대한 구체적인 조언
- summary: 한 줄 요약"#,
        character.profile_block(),
        transcript_block
    )
}

pub fn portrait_request(character: &Character) -> String {
    format!(
        "A warm, softly lit illustrated portrait of a Korean {gender}, around {age} years old, working as {occupation}. {personality}. Seated in a traditional Korean fortune-telling room with muted hanji-paper tones, gentle expression, waist-up composition.",
        gender = character.gender,
        age = character.age,
        occupation = character.occupation,
        personality = character.personality,
    )
}
