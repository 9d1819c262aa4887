// HTTP provider against a mock upstream

use mockito::{Matcher, Server};
use std::time::Duration;
use unm_gateway::config::ProviderConfig;
use unm_gateway::sources::{
    build_client, HttpProvider, LyricCapability, PictureCapability, Provider, ProviderError,
};

fn provider(base_url: String) -> HttpProvider {
    let client = build_client(Duration::from_secs(5)).unwrap();
    HttpProvider::new(
        &ProviderConfig {
            name: "kuwo".to_string(),
            base_url,
            lyric: true,
            picture: true,
        },
        client,
    )
}

#[tokio::test]
async fn test_resolve_url_passes_query() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/url")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("id".into(), "42".into()),
            Matcher::UrlEncoded("quality".into(), "flac".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"data":{"id":"42","url":"https://cdn.example/42.flac","bitrate":999000}}"#)
        .create_async()
        .await;

    let song = provider(server.url())
        .resolve_url("42", Some("flac"))
        .await
        .unwrap();
    assert_eq!(song.url, "https://cdn.example/42.flac");
    assert_eq!(song.bitrate, Some(999_000));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_non_success_status_is_failure() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/url")
        .match_query(Matcher::Any)
        .with_status(503)
        .create_async()
        .await;

    let err = provider(server.url()).resolve_url("1", None).await.unwrap_err();
    assert!(matches!(err, ProviderError::Status(503)));
}

#[tokio::test]
async fn test_empty_url_is_failure() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/url")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"id":"1","url":""}"#)
        .create_async()
        .await;

    let err = provider(server.url()).resolve_url("1", None).await.unwrap_err();
    assert!(matches!(err, ProviderError::Empty));
}

#[tokio::test]
async fn test_search_truncates_and_rejects_empty() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/search")
        .match_query(Matcher::UrlEncoded("keyword".into(), "hello".into()))
        .with_status(200)
        .with_body(
            r#"[{"id":"1","name":"Hello","artists":["A"]},
                {"id":"2","name":"Hello Again","artists":["B"],"durationMs":200000},
                {"id":"3","name":"Hello World","artists":[]}]"#,
        )
        .create_async()
        .await;
    server
        .mock("GET", "/search")
        .match_query(Matcher::UrlEncoded("keyword".into(), "nothing".into()))
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;

    let kuwo = provider(server.url());
    let items = kuwo.search("hello", 2).await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[1].duration_ms, Some(200_000));

    let err = kuwo.search("nothing", 5).await.unwrap_err();
    assert!(matches!(err, ProviderError::Empty));
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/picture")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"data":{"unexpected":true}}"#)
        .create_async()
        .await;

    let kuwo = provider(server.url());
    let err = kuwo
        .pictures()
        .unwrap()
        .fetch_picture("1")
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Decode(_)));
}

#[tokio::test]
async fn test_lyric_capability() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/lyric")
        .match_query(Matcher::UrlEncoded("id".into(), "8".into()))
        .with_status(200)
        .with_body(r#"{"id":"8","lyric":"[00:00.00]hi","translated":"[00:00.00]hola"}"#)
        .create_async()
        .await;

    let lyric = provider(server.url())
        .lyrics()
        .unwrap()
        .fetch_lyric("8")
        .await
        .unwrap();
    assert_eq!(lyric.translated.as_deref(), Some("[00:00.00]hola"));
}
