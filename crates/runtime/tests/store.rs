//! Persistence gateway tests against a live Postgres. Each test scopes its
//! rows to a fresh user id and skips itself when DATABASE_URL is not set.

use sadam_clients::PostgresClient;
use sadam_common::ModuleClient;
use sadam_runtime::{CharacterSheet, FortuneStore, ReadingSheet, SessionStatus, Speaker};
use sqlx::types::Uuid;

fn guest_sheet() -> CharacterSheet {
    CharacterSheet {
        name: "임수진".to_string(),
        age: 35,
        gender: "여성".to_string(),
        occupation: "프리랜서 일러스트레이터".to_string(),
        personality: "섬세하고 내성적이며 창의적인 성격".to_string(),
        concern: "최근 중요한 클라이언트를 잃고 진로를 고민하고 있음".to_string(),
        birth_date: "1985-07-14".to_string(),
        birth_time: "08:30".to_string(),
        speaking_style: "부드럽고 정중한 말투".to_string(),
        greeting: "안녕하세요... 사주를 좀 보러 왔는데요.".to_string(),
    }
}

fn reading_sheet() -> ReadingSheet {
    ReadingSheet {
        fortune_analysis: "올해 하반기부터 흐름이 풀립니다.".to_string(),
        personality_analysis: "신중하고 섬세한 기질입니다.".to_string(),
        advice: "가을까지는 새 계약을 서두르지 마세요.".to_string(),
        summary: "느리지만 좋은 흐름.".to_string(),
    }
}

async fn store_or_skip() -> Option<FortuneStore> {
    dotenv::dotenv().ok();
    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("DATABASE_URL not set, skipping store test");
        return None;
    }
    let db = PostgresClient::setup_connection().await;
    let store = FortuneStore::new(db, None);
    store.init_schema().await.expect("schema init failed");
    Some(store)
}

#[tokio::test]
async fn transcript_reads_back_in_insertion_order_and_is_idempotent() {
    let Some(store) = store_or_skip().await else { return };

    let character = store.create_character(&guest_sheet()).await.unwrap();
    let session = store
        .create_session(&character.id, &format!("user-{}", Uuid::new_v4()))
        .await
        .unwrap();

    for (speaker, text) in [
        (Speaker::Ai, "안녕하세요... 사주를 좀 보러 왔는데요."),
        (Speaker::User, "어서오세요. 요즘 어떤 일이 고민이신가요?"),
        (Speaker::Ai, "요즘 일이 잘 안 풀려서요."),
    ] {
        store
            .append_message(&session.id, &character.id, speaker, text)
            .await
            .unwrap();
    }

    let first = store.conversation_history(&session.id).await.unwrap();
    assert_eq!(first.len(), 3);
    assert!(first
        .windows(2)
        .all(|pair| pair[0].created_at <= pair[1].created_at));
    assert_eq!(first[0].speaker, Speaker::Ai);
    assert_eq!(first[1].speaker, Speaker::User);
    assert_eq!(first[2].message, "요즘 일이 잘 안 풀려서요.");

    // no writes in between: a re-read returns identical content and order
    let second = store.conversation_history(&session.id).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn session_status_only_moves_forward() {
    let Some(store) = store_or_skip().await else { return };

    let character = store.create_character(&guest_sheet()).await.unwrap();
    let session = store
        .create_session(&character.id, &format!("user-{}", Uuid::new_v4()))
        .await
        .unwrap();
    assert_eq!(session.status, SessionStatus::Active);
    assert!(session.ended_at.is_none());

    let completed = store.complete_session(&session.id).await.unwrap().unwrap();
    assert_eq!(completed.status, SessionStatus::Completed);
    assert!(completed.ended_at.is_some());

    // the guard refuses a second transition
    assert!(store.complete_session(&session.id).await.unwrap().is_none());

    let reread = store.get_session(&session.id).await.unwrap().unwrap();
    assert_eq!(reread.status, SessionStatus::Completed);
}

#[tokio::test]
async fn at_most_one_reading_per_session() {
    let Some(store) = store_or_skip().await else { return };

    let character = store.create_character(&guest_sheet()).await.unwrap();
    let session = store
        .create_session(&character.id, &format!("user-{}", Uuid::new_v4()))
        .await
        .unwrap();
    store.complete_session(&session.id).await.unwrap();

    let reading = store
        .create_reading(&session.id, &character.id, &reading_sheet())
        .await
        .unwrap();
    assert_eq!(reading.session_id, session.id);

    // unique(session_id) rejects a duplicate
    assert!(store
        .create_reading(&session.id, &character.id, &reading_sheet())
        .await
        .is_err());

    let fetched = store.reading_for_session(&session.id).await.unwrap().unwrap();
    assert_eq!(fetched, reading);

    let owning_session = store.get_session(&fetched.session_id).await.unwrap().unwrap();
    assert_eq!(owning_session.status, SessionStatus::Completed);
}

#[tokio::test]
async fn listing_is_scoped_and_most_recent_first() {
    let Some(store) = store_or_skip().await else { return };

    let user_id = format!("user-{}", Uuid::new_v4());
    let character = store.create_character(&guest_sheet()).await.unwrap();

    let older = store.create_session(&character.id, &user_id).await.unwrap();
    // second-resolution timestamps: space the sessions apart
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
    let newer = store.create_session(&character.id, &user_id).await.unwrap();

    let listed = store.list_sessions(&user_id, 10).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, newer.id);
    assert_eq!(listed[1].id, older.id);
    assert_eq!(listed[0].character_name, "임수진");
    assert_eq!(listed[0].character_age, 35);

    let limited = store.list_sessions(&user_id, 1).await.unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].id, newer.id);

    let other_user = store
        .list_sessions(&format!("user-{}", Uuid::new_v4()), 10)
        .await
        .unwrap();
    assert!(other_user.is_empty());
}

#[tokio::test]
async fn portrait_url_is_backfilled() {
    let Some(store) = store_or_skip().await else { return };

    let character = store.create_character(&guest_sheet()).await.unwrap();
    assert!(character.portrait_url.is_none());

    let url = "https://bucket.r2.dev/sadam/portraits/test.png";
    store.set_portrait_url(&character.id, url).await.unwrap();

    let reread = store.get_character(&character.id).await.unwrap().unwrap();
    assert_eq!(reread.portrait_url.as_deref(), Some(url));
}

#[tokio::test]
async fn session_detail_assembles_character_transcript_and_reading() {
    let Some(store) = store_or_skip().await else { return };

    let character = store.create_character(&guest_sheet()).await.unwrap();
    let session = store
        .create_session(&character.id, &format!("user-{}", Uuid::new_v4()))
        .await
        .unwrap();
    store
        .append_message(&session.id, &character.id, Speaker::Ai, "안녕하세요")
        .await
        .unwrap();
    store
        .append_message(&session.id, &character.id, Speaker::User, "어서오세요")
        .await
        .unwrap();

    let detail = store.session_detail(&session.id).await.unwrap().unwrap();
    assert_eq!(detail.session.id, session.id);
    assert_eq!(detail.character.id, character.id);
    assert_eq!(detail.transcript.len(), 2);
    assert!(detail.reading.is_none());

    store.complete_session(&session.id).await.unwrap();
    store
        .create_reading(&session.id, &character.id, &reading_sheet())
        .await
        .unwrap();

    let detail = store.session_detail(&session.id).await.unwrap().unwrap();
    assert!(detail.reading.is_some());

    // unknown session id: no detail, no error
    assert!(store.session_detail(&Uuid::new_v4()).await.unwrap().is_none());
}
