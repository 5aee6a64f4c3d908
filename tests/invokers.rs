use plantdiag::config::{ChatEndpointConfig, ChatGlmConfig, Config, LocalServiceConfig};
use plantdiag::invokers::{
    ChatCompletionsInvoker, ChatGlmInvoker, ImageInput, InvokeOptions, LocalServiceInvoker,
    ModelInvoker, RawModelOutput,
};
use plantdiag::logic::prompt::Prompt;
use plantdiag::logic::{DiagnosisRequest, DiagnosisService, ModelKind};
use plantdiag::models::{Provenance, FAILURE_SENTINEL};
use plantdiag::PlantDiagError;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REPLY: &str = "1. 病害名称：稻瘟病\n2. 病害描述：叶片出现梭形病斑\n3. 置信度：0.8\n4. 治疗方案：\n1. 喷洒三环唑\n2. 清除病残体";

fn image() -> ImageInput {
    ImageInput::from_bytes(vec![0xff, 0xd8, 0xff])
}

fn prompt() -> Prompt {
    Prompt::new("请分析这张植物图片").with_system("你是助手")
}

fn chat_config(server: &MockServer) -> ChatEndpointConfig {
    ChatEndpointConfig {
        base_url: format!("{}/v1", server.uri()),
        ..ChatEndpointConfig::qwen("test-key")
    }
}

fn glm_config(server: &MockServer) -> ChatGlmConfig {
    ChatGlmConfig {
        base_url: server.uri(),
        api_key: "glm-key".into(),
        api_secret: "glm-secret".into(),
        assistant_id: "asst-1".into(),
        enabled: true,
    }
}

fn local_config(server: &MockServer) -> LocalServiceConfig {
    LocalServiceConfig {
        url: format!("{}/api", server.uri()),
        api_key: "local-key".into(),
        enabled: true,
    }
}

async fn mount_chat_reply(server: &MockServer, content: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
        })))
        .mount(server)
        .await;
}

// ── Chat completions ────────────────────────────────────────────

#[tokio::test]
async fn chat_completions_returns_text() {
    let server = MockServer::start().await;
    mount_chat_reply(&server, REPLY).await;

    let invoker = ChatCompletionsInvoker::new("qwen", chat_config(&server));
    let output = invoker
        .invoke(&image(), &prompt(), &InvokeOptions::default())
        .await
        .unwrap();

    assert_eq!(output, RawModelOutput::Text(REPLY.to_string()));
}

#[tokio::test]
async fn chat_completions_sends_model_and_image() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(serde_json::json!({
            "model": "qwen-vl-plus",
            "max_tokens": 2000,
            "top_p": 0.9
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"content": "ok"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let invoker = ChatCompletionsInvoker::new("qwen", chat_config(&server));
    let output = invoker
        .invoke(&image(), &prompt(), &InvokeOptions::default())
        .await
        .unwrap();
    assert_eq!(output, RawModelOutput::Text("ok".into()));
}

#[tokio::test]
async fn chat_completions_http_error_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let invoker = ChatCompletionsInvoker::new("qwen", chat_config(&server));
    let err = invoker
        .invoke(&image(), &prompt(), &InvokeOptions::default())
        .await
        .unwrap_err();

    match err {
        PlantDiagError::ModelUnavailable(msg) => {
            assert!(msg.contains("401"));
            assert!(msg.contains("invalid api key"));
        }
        other => panic!("expected ModelUnavailable, got {other:?}"),
    }
}

#[tokio::test]
async fn chat_completions_without_choices_is_invalid() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})))
        .mount(&server)
        .await;

    let invoker = ChatCompletionsInvoker::new("qwen", chat_config(&server));
    let err = invoker
        .invoke(&image(), &prompt(), &InvokeOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PlantDiagError::InvalidResponse(_)));
}

#[tokio::test]
async fn chat_completions_test_connection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
        .mount(&server)
        .await;

    let invoker = ChatCompletionsInvoker::new("qwen", chat_config(&server));
    assert!(invoker.test_connection().await.unwrap());
}

// ── ChatGLM assistant ───────────────────────────────────────────

#[tokio::test]
async fn chatglm_fetches_token_then_replies() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/get_token"))
        .and(body_partial_json(serde_json::json!({
            "api_key": "glm-key",
            "api_secret": "glm-secret"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": 0,
            "result": {"access_token": "tok-1", "expires_in": 3600}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer tok-1"))
        .and(body_partial_json(serde_json::json!({"assistant_id": "asst-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": 0,
            "result": {"message": {"content": {"type": "text", "text": REPLY}}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let invoker = ChatGlmInvoker::new("chatglm", glm_config(&server));
    let output = invoker
        .invoke(&image(), &prompt(), &InvokeOptions::default())
        .await
        .unwrap();
    assert_eq!(output, RawModelOutput::Text(REPLY.to_string()));
}

#[tokio::test]
async fn chatglm_rejected_token_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/get_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": 10001,
            "message": "invalid secret"
        })))
        .mount(&server)
        .await;

    let invoker = ChatGlmInvoker::new("chatglm", glm_config(&server));
    let err = invoker
        .invoke(&image(), &prompt(), &InvokeOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PlantDiagError::ModelUnavailable(ref m) if m.contains("invalid secret")));
    assert!(!invoker.test_connection().await.unwrap());
}

#[tokio::test]
async fn chatglm_nonzero_status_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/get_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": 0,
            "result": {"access_token": "tok-1"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": 1,
            "message": "quota exceeded"
        })))
        .mount(&server)
        .await;

    let invoker = ChatGlmInvoker::new("chatglm", glm_config(&server));
    let err = invoker
        .invoke(&image(), &prompt(), &InvokeOptions::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("quota exceeded"));
}

// ── Local service ───────────────────────────────────────────────

#[tokio::test]
async fn local_service_returns_structured() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api"))
        .and(header("authorization", "Bearer local-key"))
        .and(body_partial_json(serde_json::json!({"plantType": "水稻"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "稻瘟病",
            "description": "叶片病斑",
            "treatments": [{"method": "喷洒三环唑", "cost": "low"}]
        })))
        .mount(&server)
        .await;

    let invoker = LocalServiceInvoker::new("local", local_config(&server));
    let output = invoker
        .invoke(
            &image(),
            &prompt().with_plant_type("水稻"),
            &InvokeOptions::default(),
        )
        .await
        .unwrap();

    let RawModelOutput::Structured(d) = output else {
        panic!("expected structured output");
    };
    assert_eq!(d.name(), "稻瘟病");
    assert_eq!(d.confidence(), 0.85);
    assert_eq!(d.treatments()[0].method, "喷洒三环唑");
}

#[tokio::test]
async fn local_service_without_name_is_invalid() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"confidence": 0.9})))
        .mount(&server)
        .await;

    let invoker = LocalServiceInvoker::new("local", local_config(&server));
    let err = invoker
        .invoke(&image(), &prompt(), &InvokeOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PlantDiagError::InvalidResponse(_)));
}

// ── Service end to end ──────────────────────────────────────────

#[tokio::test]
async fn service_fuses_agreeing_models() {
    let server = MockServer::start().await;
    mount_chat_reply(&server, REPLY).await;
    Mock::given(method("POST"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "稻瘟病",
            "description": "叶片出现梭形病斑，边缘褐色，中央灰白",
            "confidence": 0.6
        })))
        .mount(&server)
        .await;

    let config = Config {
        qwen: Some(chat_config(&server)),
        local_service: Some(local_config(&server)),
        ..Config::default()
    };
    let service = DiagnosisService::new(config);
    let request = DiagnosisRequest::new(image())
        .with_plant_type("水稻")
        .with_models(vec![ModelKind::Qwen, ModelKind::Local]);

    let d = service.diagnose(&request).await.unwrap();

    assert_eq!(d.name(), "稻瘟病");
    // mean(0.8, 0.6) plus the full-agreement boost
    assert!((d.confidence() - 0.85).abs() < 1e-9);
    assert_eq!(d.description(), "叶片出现梭形病斑，边缘褐色，中央灰白");
    assert_eq!(d.provenance(), &Provenance::consensus(2, 2));
    assert_eq!(d.treatments()[0].method, "喷洒三环唑");
}

#[tokio::test]
async fn service_total_failure_returns_sentinel() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let config = Config {
        qwen: Some(chat_config(&server)),
        local_service: Some(local_config(&server)),
        ..Config::default()
    };
    let service = DiagnosisService::new(config);
    let request =
        DiagnosisRequest::new(image()).with_models(vec![ModelKind::Qwen, ModelKind::Local]);

    let d = service.diagnose(&request).await.unwrap();
    assert_eq!(d.confidence(), FAILURE_SENTINEL);
    assert!(d.is_failure_sentinel());
    assert_eq!(d.provenance(), &Provenance::fallback());
}

#[tokio::test]
async fn service_check_connections() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut qwen = chat_config(&server);
    qwen.ocr_model = None;
    let config = Config {
        qwen: Some(qwen),
        local_service: Some(local_config(&server)),
        ..Config::default()
    };
    let status = DiagnosisService::new(config).check_connections().await;

    assert_eq!(
        status.models,
        vec![(ModelKind::Qwen, true), (ModelKind::Local, false)]
    );
    assert!(status.any_connected());
    assert!(!status.all_connected());
}
