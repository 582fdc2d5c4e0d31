// ═══════════════════════════════════════════════════════════════════
// Provider Tests — SSE accumulator, Yahoo Finance, Finnhub, Dify
// (HTTP providers run against local mock upstreams)
// ═══════════════════════════════════════════════════════════════════

use std::collections::HashMap;

use axum::{
    extract::Query,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use portfolio_dashboard_core::errors::CoreError;
use portfolio_dashboard_core::models::quote::Quote;
use portfolio_dashboard_core::providers::dify::DifyProvider;
use portfolio_dashboard_core::providers::finnhub::FinnhubProvider;
use portfolio_dashboard_core::providers::sse::{SseAccumulator, SseState};
use portfolio_dashboard_core::providers::traits::{
    ChatProvider, FundamentalsProvider, QuoteProvider,
};
use portfolio_dashboard_core::providers::yahoo_finance::YahooFinanceProvider;

/// Serve `router` on an ephemeral local port and return its base URL.
async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// A local address with nothing listening on it.
async fn dead_address() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

fn symbols(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn sse_message(answer: &str) -> String {
    format!(
        "data: {}\n\n",
        json!({
            "event": "message",
            "answer": answer,
            "conversation_id": "conv-1",
            "message_id": "msg-1"
        })
    )
}

// ═══════════════════════════════════════════════════════════════════
// SseAccumulator
// ═══════════════════════════════════════════════════════════════════

mod sse_accumulator {
    use super::*;

    #[test]
    fn starts_awaiting() {
        let acc = SseAccumulator::new();
        assert_eq!(acc.state(), SseState::AwaitingEvent);
        assert!(!acc.is_done());
    }

    #[test]
    fn accumulates_message_answers() {
        let mut acc = SseAccumulator::new();
        acc.feed(sse_message("Hello").as_bytes());
        acc.feed(sse_message(", world").as_bytes());
        let reply = acc.finish().unwrap();
        assert_eq!(reply.answer, "Hello, world");
        assert_eq!(reply.conversation_id.as_deref(), Some("conv-1"));
        assert_eq!(reply.message_id.as_deref(), Some("msg-1"));
    }

    #[test]
    fn state_moves_through_event() {
        let mut acc = SseAccumulator::new();
        let state = acc.feed(b"data: {\"event\":\"message\",\"answer\":\"a\"}\n");
        assert_eq!(state, SseState::InEvent);
        assert_eq!(acc.feed(b"\n"), SseState::AwaitingEvent);
        assert_eq!(acc.reply().answer, "a");
    }

    #[test]
    fn line_split_across_chunks() {
        let payload = sse_message("split answer");
        let (a, b) = payload.as_bytes().split_at(17);
        let mut acc = SseAccumulator::new();
        acc.feed(a);
        assert_eq!(acc.reply().answer, "");
        acc.feed(b);
        assert_eq!(acc.reply().answer, "split answer");
    }

    #[test]
    fn multibyte_character_split_across_chunks() {
        let payload = sse_message("café ☕");
        let bytes = payload.as_bytes();
        let cut = payload.find('☕').unwrap() + 1; // inside the 3-byte sequence
        let mut acc = SseAccumulator::new();
        acc.feed(&bytes[..cut]);
        acc.feed(&bytes[cut..]);
        assert_eq!(acc.finish().unwrap().answer, "café ☕");
    }

    #[test]
    fn byte_by_byte_feed() {
        let payload = format!("{}{}", sse_message("one "), sse_message("two"));
        let mut acc = SseAccumulator::new();
        for byte in payload.as_bytes() {
            acc.feed(std::slice::from_ref(byte));
        }
        assert_eq!(acc.finish().unwrap().answer, "one two");
    }

    #[test]
    fn done_marker_terminates() {
        let mut acc = SseAccumulator::new();
        acc.feed(sse_message("kept").as_bytes());
        assert_eq!(acc.feed(b"data: [DONE]\n\n"), SseState::Done);
        acc.feed(sse_message(" ignored").as_bytes());
        assert_eq!(acc.finish().unwrap().answer, "kept");
    }

    #[test]
    fn message_end_terminates() {
        let mut acc = SseAccumulator::new();
        acc.feed(sse_message("answer").as_bytes());
        let state =
            acc.feed(b"data: {\"event\":\"message_end\",\"conversation_id\":\"conv-1\"}\n\n");
        assert_eq!(state, SseState::Done);
        assert!(acc.is_done());
    }

    #[test]
    fn agent_message_appends() {
        let mut acc = SseAccumulator::new();
        acc.feed(b"data: {\"event\":\"agent_message\",\"answer\":\"thinking \"}\n\n");
        acc.feed(sse_message("done").as_bytes());
        assert_eq!(acc.finish().unwrap().answer, "thinking done");
    }

    #[test]
    fn malformed_payload_skipped_and_counted() {
        let mut acc = SseAccumulator::new();
        acc.feed(b"data: {not json\n\n");
        acc.feed(sse_message("fine").as_bytes());
        assert_eq!(acc.skipped_events(), 1);
        assert_eq!(acc.finish().unwrap().answer, "fine");
    }

    #[test]
    fn unknown_events_skipped_silently() {
        let mut acc = SseAccumulator::new();
        acc.feed(b"data: {\"event\":\"workflow_started\",\"conversation_id\":\"conv-9\"}\n\n");
        acc.feed(b"data: {\"event\":\"ping\"}\n\n");
        acc.feed(sse_message("x").as_bytes());
        assert_eq!(acc.skipped_events(), 0);
        let reply = acc.finish().unwrap();
        assert_eq!(reply.answer, "x");
        // First seen id wins, even from a skipped event type.
        assert_eq!(reply.conversation_id.as_deref(), Some("conv-9"));
    }

    #[test]
    fn crlf_line_endings() {
        let mut acc = SseAccumulator::new();
        acc.feed(b"data: {\"event\":\"message\",\"answer\":\"crlf\"}\r\n\r\n");
        assert_eq!(acc.finish().unwrap().answer, "crlf");
    }

    #[test]
    fn comments_and_other_fields_ignored() {
        let mut acc = SseAccumulator::new();
        acc.feed(b": keep-alive\n\nid: 7\nretry: 1000\n");
        acc.feed(sse_message("ok").as_bytes());
        assert_eq!(acc.skipped_events(), 0);
        assert_eq!(acc.finish().unwrap().answer, "ok");
    }

    #[test]
    fn event_field_names_untyped_payload() {
        let mut acc = SseAccumulator::new();
        acc.feed(b"event: message\ndata: {\"answer\":\"named\"}\n\n");
        assert_eq!(acc.finish().unwrap().answer, "named");
    }

    #[test]
    fn data_lines_without_blank_separator() {
        let mut acc = SseAccumulator::new();
        acc.feed(b"data: {\"event\":\"message\",\"answer\":\"a\"}\n");
        acc.feed(b"data: {\"event\":\"message\",\"answer\":\"b\"}\n\n");
        assert_eq!(acc.finish().unwrap().answer, "ab");
    }

    #[test]
    fn finish_flushes_pending_event() {
        let mut acc = SseAccumulator::new();
        acc.feed(b"data: {\"event\":\"message\",\"answer\":\"tail\"}");
        assert_eq!(acc.reply().answer, "");
        assert_eq!(acc.finish().unwrap().answer, "tail");
    }

    #[test]
    fn error_event_without_answer_fails() {
        let mut acc = SseAccumulator::new();
        let state = acc.feed(b"data: {\"event\":\"error\",\"message\":\"quota exceeded\"}\n\n");
        assert_eq!(state, SseState::Done);
        let err = acc.finish().unwrap_err();
        assert!(matches!(err, CoreError::Stream(ref m) if m == "quota exceeded"));
    }

    #[test]
    fn error_event_after_answer_keeps_partial_answer() {
        let mut acc = SseAccumulator::new();
        acc.feed(sse_message("partial").as_bytes());
        acc.feed(b"data: {\"event\":\"error\",\"message\":\"cut off\"}\n\n");
        assert_eq!(acc.finish().unwrap().answer, "partial");
    }

    #[test]
    fn empty_stream_is_empty_answer() {
        let acc = SseAccumulator::new();
        let reply = acc.finish().unwrap();
        assert_eq!(reply.answer, "");
        assert!(reply.conversation_id.is_none());
    }
}

// ═══════════════════════════════════════════════════════════════════
// YahooFinanceProvider — batched quotes
// ═══════════════════════════════════════════════════════════════════

mod yahoo_finance {
    use super::*;

    async fn quote_upstream(body: Value) -> String {
        let router = Router::new().route(
            "/v7/finance/quote",
            get(move |Query(params): Query<HashMap<String, String>>| {
                let body = body.clone();
                async move {
                    assert!(params.contains_key("symbols"));
                    Json(body)
                }
            }),
        );
        serve(router).await
    }

    #[test]
    fn name() {
        assert_eq!(YahooFinanceProvider::new().name(), "Yahoo Finance");
    }

    #[tokio::test]
    async fn one_request_for_whole_batch() {
        let router = Router::new().route(
            "/v7/finance/quote",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                assert_eq!(params["symbols"], "AAPL,MSFT");
                Json(json!({
                    "quoteResponse": {
                        "result": [
                            {"symbol": "AAPL", "regularMarketPrice": 200.0},
                            {"symbol": "MSFT", "regularMarketPrice": 300.5}
                        ],
                        "error": null
                    }
                }))
            }),
        );
        let provider = YahooFinanceProvider::with_base_url(serve(router).await);

        let quotes = provider.get_quotes(&symbols(&["AAPL", "MSFT"])).await.unwrap();
        assert_eq!(quotes, vec![Quote::new("AAPL", 200.0), Quote::new("MSFT", 300.5)]);
    }

    #[tokio::test]
    async fn partial_result_returns_nulls() {
        let base = quote_upstream(json!({
            "quoteResponse": {
                "result": [{"symbol": "AAPL", "regularMarketPrice": 200.0}],
                "error": {"code": "Not Found", "description": "MSFT quote failed"}
            }
        }))
        .await;
        let provider = YahooFinanceProvider::with_base_url(base);

        let quotes = provider.get_quotes(&symbols(&["AAPL", "MSFT"])).await.unwrap();
        assert_eq!(quotes, vec![Quote::new("AAPL", 200.0), Quote::unavailable("MSFT")]);
    }

    #[tokio::test]
    async fn missing_price_field_is_null() {
        let base = quote_upstream(json!({
            "quoteResponse": {"result": [{"symbol": "AAPL"}], "error": null}
        }))
        .await;
        let provider = YahooFinanceProvider::with_base_url(base);

        let quotes = provider.get_quotes(&symbols(&["AAPL"])).await.unwrap();
        assert_eq!(quotes, vec![Quote::unavailable("AAPL")]);
    }

    #[tokio::test]
    async fn empty_result_is_error() {
        let base = quote_upstream(json!({
            "quoteResponse": {"result": [], "error": {"description": "No symbols found"}}
        }))
        .await;
        let provider = YahooFinanceProvider::with_base_url(base);

        let err = provider.get_quotes(&symbols(&["ZZZZ"])).await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::Api { ref message, .. } if message.contains("No symbols found")
        ));
    }

    #[tokio::test]
    async fn rate_limited() {
        let router = Router::new().route(
            "/v7/finance/quote",
            get(|| async { StatusCode::TOO_MANY_REQUESTS }),
        );
        let provider = YahooFinanceProvider::with_base_url(serve(router).await);

        let err = provider.get_quotes(&symbols(&["AAPL"])).await.unwrap_err();
        assert!(matches!(err, CoreError::RateLimited(_)));
    }

    #[tokio::test]
    async fn server_error() {
        let router = Router::new().route(
            "/v7/finance/quote",
            get(|| async { StatusCode::BAD_GATEWAY }),
        );
        let provider = YahooFinanceProvider::with_base_url(serve(router).await);

        let err = provider.get_quotes(&symbols(&["AAPL"])).await.unwrap_err();
        assert!(matches!(err, CoreError::Api { .. }));
    }

    #[tokio::test]
    async fn malformed_body() {
        let router = Router::new().route("/v7/finance/quote", get(|| async { "not json" }));
        let provider = YahooFinanceProvider::with_base_url(serve(router).await);

        let err = provider.get_quotes(&symbols(&["AAPL"])).await.unwrap_err();
        assert!(matches!(err, CoreError::Api { .. }));
    }

    #[tokio::test]
    async fn unreachable_upstream_is_network_error() {
        let provider = YahooFinanceProvider::with_base_url(dead_address().await);

        let err = provider.get_quotes(&symbols(&["AAPL"])).await.unwrap_err();
        assert!(err.network_kind().is_some(), "expected network error, got {err:?}");
        assert!(!err.to_string().contains("symbols="));
    }
}

// ═══════════════════════════════════════════════════════════════════
// FinnhubProvider — P/E and earnings
// ═══════════════════════════════════════════════════════════════════

mod finnhub {
    use super::*;

    const TOKEN: &str = "test-token";

    fn authorised(headers: &HeaderMap) -> bool {
        headers
            .get("x-finnhub-token")
            .and_then(|v| v.to_str().ok())
            == Some(TOKEN)
    }

    async fn finnhub_upstream(pe: Value, earnings: Value) -> String {
        let router = Router::new()
            .route(
                "/stock/metric",
                get(move |headers: HeaderMap, Query(params): Query<HashMap<String, String>>| {
                    let pe = pe.clone();
                    async move {
                        if !authorised(&headers) {
                            return StatusCode::UNAUTHORIZED.into_response();
                        }
                        assert_eq!(params["metric"], "all");
                        Json(json!({"symbol": params["symbol"], "metric": {"peTTM": pe}}))
                            .into_response()
                    }
                }),
            )
            .route(
                "/stock/earnings",
                get(move |headers: HeaderMap, Query(params): Query<HashMap<String, String>>| {
                    let earnings = earnings.clone();
                    async move {
                        if !authorised(&headers) {
                            return StatusCode::UNAUTHORIZED.into_response();
                        }
                        assert_eq!(params["limit"], "1");
                        Json(earnings).into_response()
                    }
                }),
            );
        serve(router).await
    }

    #[test]
    fn missing_key_not_ready() {
        let provider = FinnhubProvider::new(None);
        assert!(matches!(provider.check_ready(), Err(CoreError::Config(_))));
        let blank = FinnhubProvider::new(Some("   ".into()));
        assert!(blank.check_ready().is_err());
    }

    #[test]
    fn key_present_is_ready() {
        assert!(FinnhubProvider::new(Some(TOKEN.into())).check_ready().is_ok());
    }

    #[tokio::test]
    async fn pe_ratio() {
        let base = finnhub_upstream(json!(28.5), json!([])).await;
        let provider = FinnhubProvider::with_base_url(Some(TOKEN.into()), base);
        assert_eq!(provider.get_pe_ratio("AAPL").await.unwrap(), Some(28.5));
    }

    #[tokio::test]
    async fn zero_pe_is_null() {
        let base = finnhub_upstream(json!(0), json!([])).await;
        let provider = FinnhubProvider::with_base_url(Some(TOKEN.into()), base);
        assert_eq!(provider.get_pe_ratio("AAPL").await.unwrap(), None);
    }

    #[tokio::test]
    async fn missing_pe_is_null() {
        let base = finnhub_upstream(Value::Null, json!([])).await;
        let provider = FinnhubProvider::with_base_url(Some(TOKEN.into()), base);
        assert_eq!(provider.get_pe_ratio("AAPL").await.unwrap(), None);
    }

    #[tokio::test]
    async fn earnings() {
        let base = finnhub_upstream(
            json!(28.5),
            json!([{"actual": 1.5, "estimate": 1.42, "period": "2024-12-31", "symbol": "AAPL"}]),
        )
        .await;
        let provider = FinnhubProvider::with_base_url(Some(TOKEN.into()), base);

        let reports = provider.get_earnings("AAPL").await.unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].actual, Some(1.5));
        assert_eq!(reports[0].period.as_deref(), Some("2024-12-31"));
    }

    #[tokio::test]
    async fn wrong_key_is_api_error() {
        let base = finnhub_upstream(json!(28.5), json!([])).await;
        let provider = FinnhubProvider::with_base_url(Some("wrong".into()), base);
        let err = provider.get_pe_ratio("AAPL").await.unwrap_err();
        assert!(matches!(err, CoreError::Api { .. }));
    }

    #[tokio::test]
    async fn missing_key_fails_without_request() {
        let provider = FinnhubProvider::with_base_url(None, dead_address().await);
        let err = provider.get_earnings("AAPL").await.unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[tokio::test]
    async fn rate_limited() {
        let router = Router::new().route(
            "/stock/metric",
            get(|| async { StatusCode::TOO_MANY_REQUESTS }),
        );
        let provider = FinnhubProvider::with_base_url(Some(TOKEN.into()), serve(router).await);
        let err = provider.get_pe_ratio("AAPL").await.unwrap_err();
        assert!(matches!(err, CoreError::RateLimited(_)));
    }

    #[tokio::test]
    async fn token_never_in_error_message() {
        let provider = FinnhubProvider::with_base_url(Some(TOKEN.into()), dead_address().await);
        let err = provider.get_pe_ratio("AAPL").await.unwrap_err();
        assert!(!err.to_string().contains(TOKEN));
    }
}

// ═══════════════════════════════════════════════════════════════════
// DifyProvider — streaming chat
// ═══════════════════════════════════════════════════════════════════

mod dify {
    use super::*;

    const KEY: &str = "app-test";

    async fn chat_upstream(stream: &'static str) -> String {
        let router = Router::new().route(
            "/chat-messages",
            post(move |headers: HeaderMap, Json(body): Json<Value>| async move {
                let auth = headers
                    .get(header::AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                if auth != format!("Bearer {KEY}") {
                    return (StatusCode::UNAUTHORIZED, "bad key".to_string()).into_response();
                }
                assert_eq!(body["response_mode"], "streaming");
                assert_eq!(body["user"], "dashboard-user");
                assert_eq!(body["inputs"], json!({}));

                // Echo the conversation id so callers can check it was forwarded.
                let conversation = body["conversation_id"].as_str().unwrap_or("new-conv");
                let text = stream.replace("{conv}", conversation);
                ([(header::CONTENT_TYPE, "text/event-stream")], text).into_response()
            }),
        );
        serve(router).await
    }

    const ANSWER_STREAM: &str = concat!(
        "data: {\"event\":\"message\",\"answer\":\"AAPL is \",\"conversation_id\":\"{conv}\",\"message_id\":\"m1\"}\n\n",
        "data: {\"event\":\"message\",\"answer\":\"up today.\",\"conversation_id\":\"{conv}\",\"message_id\":\"m1\"}\n\n",
        "data: {\"event\":\"message_end\",\"conversation_id\":\"{conv}\"}\n\n",
    );

    #[tokio::test]
    async fn accumulates_streamed_answer() {
        let base = chat_upstream(ANSWER_STREAM).await;
        let provider = DifyProvider::with_base_url(Some(KEY.into()), "dashboard-user", base);

        let reply = provider.ask("How is AAPL?", None).await.unwrap();
        assert_eq!(reply.answer, "AAPL is up today.");
        assert_eq!(reply.conversation_id.as_deref(), Some("new-conv"));
        assert_eq!(reply.message_id.as_deref(), Some("m1"));
    }

    #[tokio::test]
    async fn forwards_conversation_id() {
        let base = chat_upstream(ANSWER_STREAM).await;
        let provider = DifyProvider::with_base_url(Some(KEY.into()), "dashboard-user", base);

        let reply = provider.ask("And now?", Some("conv-77")).await.unwrap();
        assert_eq!(reply.conversation_id.as_deref(), Some("conv-77"));
    }

    #[tokio::test]
    async fn upstream_error_event() {
        let base =
            chat_upstream("data: {\"event\":\"error\",\"message\":\"model overloaded\"}\n\n")
                .await;
        let provider = DifyProvider::with_base_url(Some(KEY.into()), "dashboard-user", base);

        let err = provider.ask("hi", None).await.unwrap_err();
        assert!(matches!(err, CoreError::Stream(_)));
    }

    #[tokio::test]
    async fn non_success_status_is_api_error() {
        let base = chat_upstream(ANSWER_STREAM).await;
        let provider = DifyProvider::with_base_url(Some("wrong".into()), "dashboard-user", base);

        let err = provider.ask("hi", None).await.unwrap_err();
        assert!(matches!(err, CoreError::Api { ref message, .. } if message.contains("401")));
    }

    #[tokio::test]
    async fn missing_key_is_config_error() {
        let provider = DifyProvider::with_base_url(None, "dashboard-user", dead_address().await);
        let err = provider.ask("hi", None).await.unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }
}
