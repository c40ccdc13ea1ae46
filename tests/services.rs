//! Remote service contract tests
//!
//! Spins a local axum server standing in for the speech server and the chat
//! completions endpoint

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use secrecy::SecretString;
use serde_json::{Value, json};
use url::Url;
use voicevision_pilot::audio::{SAMPLE_RATE, samples_to_wav};
use voicevision_pilot::config::{GeneratorConfig, SpeechConfig};
use voicevision_pilot::{
    AudioClip, ChatGenerator, Error, HttpSpeechService, Service, SpeechService, TextGenerator,
};

/// Requests seen by the fake server, one summary line each
#[derive(Clone, Default)]
struct Seen(Arc<Mutex<Vec<String>>>);

impl Seen {
    fn push(&self, line: String) {
        self.0.lock().unwrap().push(line);
    }

    fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

async fn serve(router: Router) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    Url::parse(&format!("http://{addr}")).unwrap()
}

fn speech_service(base_url: Url, timeout: Duration) -> HttpSpeechService {
    let config = SpeechConfig {
        base_url,
        stt_path: "/stt".to_string(),
        tts_path: "/tts".to_string(),
    };
    HttpSpeechService::new(&config, timeout).unwrap()
}

fn wav_clip() -> AudioClip {
    AudioClip::wav(samples_to_wav(&[0.0; 32], SAMPLE_RATE).unwrap())
}

async fn stt_ok(State(seen): State<Seen>, mut multipart: Multipart) -> Json<Value> {
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().unwrap_or_default().to_string();
        let mime = field.content_type().unwrap_or_default().to_string();
        let bytes = field.bytes().await.unwrap();
        seen.push(format!("{name}:{file_name}:{mime}:{}", bytes.len()));
    }
    Json(json!({ "text": "расскажи сказку" }))
}

async fn tts_mp3(State(seen): State<Seen>, Json(body): Json<Value>) -> impl IntoResponse {
    seen.push(body["text"].as_str().unwrap_or_default().to_string());
    ([(header::CONTENT_TYPE, "audio/mpeg")], vec![0xFF_u8, 0xFB, 0x90, 0x00])
}

#[tokio::test]
async fn test_transcribe_posts_audio_field() {
    let seen = Seen::default();
    let router = Router::new()
        .route("/stt", post(stt_ok))
        .with_state(seen.clone());
    let service = speech_service(serve(router).await, Duration::from_secs(5));

    let clip = wav_clip();
    let size = clip.len();
    let text = service.transcribe(clip).await.unwrap();

    assert_eq!(text, "расскажи сказку");
    assert_eq!(seen.lines(), [format!("audio:audio.wav:audio/wav:{size}")]);
}

#[tokio::test]
async fn test_null_transcript_is_empty_text() {
    let router = Router::new().route("/stt", post(|| async { Json(json!({ "text": null })) }));
    let service = speech_service(serve(router).await, Duration::from_secs(5));

    let text = tokio_test::assert_ok!(service.transcribe(wav_clip()).await);
    assert_eq!(text, "");
}

#[tokio::test]
async fn test_transcribe_error_status() {
    let router = Router::new().route(
        "/stt",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model not loaded") }),
    );
    let service = speech_service(serve(router).await, Duration::from_secs(5));

    let err = service.transcribe(wav_clip()).await.unwrap_err();
    match err {
        Error::ServiceUnavailable { service, reason } => {
            assert_eq!(service, Service::SpeechToText);
            assert!(reason.contains("500"), "{reason}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_transcribe_times_out() {
    let router = Router::new().route(
        "/stt",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Json(json!({ "text": "поздно" }))
        }),
    );
    let service = speech_service(serve(router).await, Duration::from_millis(100));

    let err = service.transcribe(wav_clip()).await.unwrap_err();
    assert!(matches!(
        err,
        Error::ServiceUnavailable {
            service: Service::SpeechToText,
            ..
        }
    ));
}

#[tokio::test]
async fn test_unreachable_server() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let service = speech_service(
        Url::parse(&format!("http://{addr}")).unwrap(),
        Duration::from_secs(2),
    );

    let err = tokio_test::assert_err!(service.synthesize("привет").await);
    assert!(matches!(
        err,
        Error::ServiceUnavailable {
            service: Service::TextToSpeech,
            ..
        }
    ));
}

#[tokio::test]
async fn test_synthesize_keeps_content_type() {
    let seen = Seen::default();
    let router = Router::new()
        .route("/tts", post(tts_mp3))
        .with_state(seen.clone());
    let service = speech_service(serve(router).await, Duration::from_secs(5));

    let clip = service.synthesize("Пока-пока!").await.unwrap();

    assert_eq!(clip.content_type(), "audio/mpeg");
    assert_eq!(clip.bytes(), [0xFF_u8, 0xFB, 0x90, 0x00]);
    assert_eq!(seen.lines(), ["Пока-пока!"]);
}

#[tokio::test]
async fn test_synthesize_defaults_to_wav() {
    let wav = samples_to_wav(&[0.25; 8], 22050).unwrap();
    let payload = wav.clone();
    let router = Router::new().route(
        "/tts",
        post(move || {
            let payload = payload.clone();
            async move { Response::new(Body::from(payload)) }
        }),
    );
    let service = speech_service(serve(router).await, Duration::from_secs(5));

    let clip = service.synthesize("Пауза.").await.unwrap();

    assert_eq!(clip.content_type(), "audio/wav");
    assert_eq!(clip.bytes(), wav.as_slice());
}

fn completion(content: &str) -> Json<Value> {
    Json(json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }]
    }))
}

async fn chat(
    State(seen): State<Seen>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    seen.push(format!(
        "{auth}|{}|{}|{}",
        body["model"].as_str().unwrap_or_default(),
        body["response_format"]["type"].as_str().unwrap_or_default(),
        body["messages"][1]["content"].as_str().unwrap_or_default(),
    ));

    if body["messages"][1]["content"] == "help" {
        completion(r#"{"availableCommands": "Я понимаю: пазлы, пока."}"#)
    } else {
        completion(r#"{"story": "Жил кот. Он спал."}"#)
    }
}

async fn generator(seen: &Seen) -> ChatGenerator {
    let router = Router::new()
        .route("/v1/chat/completions", post(chat))
        .with_state(seen.clone());
    let base = serve(router).await;

    let config = GeneratorConfig {
        url: base.join("/v1/chat/completions").unwrap(),
        model: "test-model".to_string(),
        api_key: Some(SecretString::from("test-key".to_string())),
    };
    ChatGenerator::new(&config, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_generator_story_contract() {
    let seen = Seen::default();
    let generator = generator(&seen).await;

    let story = generator
        .generate_story("tell a short story for a child in Russian")
        .await
        .unwrap();

    assert_eq!(story, "Жил кот. Он спал.");
    assert_eq!(
        seen.lines(),
        ["Bearer test-key|test-model|json_object|tell a short story for a child in Russian"]
    );
}

#[tokio::test]
async fn test_generator_help_contract() {
    let seen = Seen::default();
    let generator = generator(&seen).await;

    let help = generator.list_commands("help").await.unwrap();

    assert_eq!(help, "Я понимаю: пазлы, пока.");
}

#[tokio::test]
async fn test_generator_error_status() {
    let router = Router::new().route(
        "/v1/chat/completions",
        post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "overloaded") }),
    );
    let base = serve(router).await;
    let config = GeneratorConfig {
        url: base.join("/v1/chat/completions").unwrap(),
        model: "test-model".to_string(),
        api_key: None,
    };
    let generator = ChatGenerator::new(&config, Duration::from_secs(5)).unwrap();

    let err = generator.generate_story("сказка").await.unwrap_err();
    assert!(matches!(
        err,
        Error::ServiceUnavailable {
            service: Service::TextGeneration,
            ..
        }
    ));
}
