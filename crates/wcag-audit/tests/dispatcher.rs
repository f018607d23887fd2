//! End-to-end dispatcher behaviour with stand-in engines and browsers.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use wcag_audit::browser::{NavigationResult, NetworkIdle};
use wcag_audit::{
    AcquisitionError, AuditConfig, AuditError, AuditRequest, AuditRequestBody, Auditor,
    BrowserLauncher, BrowserProcess, CancelFlag, DocumentEngine, EvaluationError, PageContext,
    RenderMode,
    RuleEngine, RuleOptions, ScriptEngine, StaticDocument, ValidationError,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Returns a fixed payload and records what it was asked to evaluate.
struct RecordingEngine {
    payload: Value,
    bases: Mutex<Vec<String>>,
}

impl RecordingEngine {
    fn new(payload: Value) -> Arc<Self> {
        Arc::new(Self {
            payload,
            bases: Mutex::new(Vec::new()),
        })
    }

    fn bases(&self) -> Vec<String> {
        self.bases.lock().unwrap().clone()
    }
}

impl DocumentEngine for RecordingEngine {
    fn name(&self) -> &str {
        "recording"
    }

    fn run(
        &self,
        document: &StaticDocument,
        _: &RuleOptions,
        _: &CancelFlag,
    ) -> anyhow::Result<Value> {
        self.bases
            .lock()
            .unwrap()
            .push(document.base_url().to_string());
        Ok(self.payload.clone())
    }
}

/// Busy until its run is cancelled, then records that it stopped.
#[derive(Default)]
struct StallingEngine {
    stopped: AtomicBool,
}

impl DocumentEngine for StallingEngine {
    fn name(&self) -> &str {
        "stalling"
    }

    fn run(
        &self,
        _: &StaticDocument,
        _: &RuleOptions,
        cancel: &CancelFlag,
    ) -> anyhow::Result<Value> {
        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        while !cancel.is_cancelled() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        self.stopped.store(cancel.is_cancelled(), Ordering::SeqCst);
        anyhow::bail!("stopped")
    }
}

fn violation_payload() -> Value {
    json!({
        "violations": [{
            "id": "image-alt",
            "impact": "critical",
            "help": "Images must have alternate text",
            "helpUrl": "https://dequeuniversity.com/rules/axe/4.10/image-alt",
            "description": "Ensures <img> elements have alternate text",
            "tags": ["wcag2a", "wcag111"],
            "nodes": [{ "html": "<img>", "target": ["img"] }]
        }],
        "passes": [],
        "incomplete": [],
        "inapplicable": []
    })
}

#[derive(Default)]
struct BrowserLog {
    launched: AtomicUsize,
    terminated: AtomicUsize,
}

#[derive(Clone, Copy)]
enum PageBehavior {
    /// Navigation succeeds; evaluation returns the payload.
    Healthy,
    /// Navigation never settles.
    Hangs,
    /// Navigation fails outright.
    Unreachable,
    /// Script evaluation never returns.
    SlowScript,
}

struct FakeLauncher {
    log: Arc<BrowserLog>,
    behavior: PageBehavior,
    payload: Value,
}

struct FakeProcess {
    log: Arc<BrowserLog>,
    behavior: PageBehavior,
    payload: Value,
}

struct FakePage {
    behavior: PageBehavior,
    payload: Value,
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserProcess>, AcquisitionError> {
        self.log.launched.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeProcess {
            log: self.log.clone(),
            behavior: self.behavior,
            payload: self.payload.clone(),
        }))
    }
}

#[async_trait]
impl BrowserProcess for FakeProcess {
    async fn new_page(&self) -> anyhow::Result<Box<dyn PageContext>> {
        Ok(Box::new(FakePage {
            behavior: self.behavior,
            payload: self.payload.clone(),
        }))
    }

    async fn terminate(self: Box<Self>) -> anyhow::Result<()> {
        self.log.terminated.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl PageContext for FakePage {
    async fn navigate(&mut self, url: &str, _: NetworkIdle) -> anyhow::Result<NavigationResult> {
        match self.behavior {
            PageBehavior::Hangs => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                unreachable!("navigation should have timed out")
            }
            PageBehavior::Unreachable => anyhow::bail!("net::ERR_NAME_NOT_RESOLVED"),
            _ => Ok(NavigationResult {
                final_url: format!("{url}#rendered"),
                load_time_ms: 1,
            }),
        }
    }

    async fn add_script(&self, _: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn evaluate(&self, expression: &str) -> anyhow::Result<Value> {
        if expression.contains("typeof window") {
            return Ok(json!(true));
        }
        if let PageBehavior::SlowScript = self.behavior {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        Ok(self.payload.clone())
    }

    async fn content(&self) -> anyhow::Result<String> {
        Ok("<html><body><img src='a.png'></body></html>".into())
    }
}

fn fast_config() -> AuditConfig {
    AuditConfig {
        launch_timeout: Duration::from_secs(2),
        page_timeout: Duration::from_secs(2),
        navigation_timeout: Duration::from_millis(100),
        evaluation_timeout: Duration::from_millis(200),
        ..AuditConfig::default()
    }
}

fn live_auditor(
    engine: RuleEngine,
    behavior: PageBehavior,
    payload: Value,
) -> (Auditor, Arc<BrowserLog>) {
    let log = Arc::new(BrowserLog::default());
    let launcher = FakeLauncher {
        log: log.clone(),
        behavior,
        payload,
    };
    let auditor = Auditor::new(fast_config(), engine)
        .unwrap()
        .with_launcher(Arc::new(launcher));
    (auditor, log)
}

fn script_engine() -> RuleEngine {
    RuleEngine::new().with_script(ScriptEngine::new("window.axe = {}", "axe"))
}

fn dynamic_request(url: &str) -> AuditRequest {
    AuditRequest::for_url(url, RenderMode::Dynamic, RuleOptions::default()).unwrap()
}

#[tokio::test]
async fn test_markup_audit_reports_violation() {
    let engine = RecordingEngine::new(violation_payload());
    let auditor = Auditor::new(
        AuditConfig::default(),
        RuleEngine::new().with_document_engine(engine.clone()),
    ).unwrap();

    let report = auditor
        .execute_body(AuditRequestBody {
            html: Some("<html><body><img></body></html>".into()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert!(report.target.is_none());
    assert_eq!(report.results.violations.len(), 1);
    assert_eq!(report.results.violations[0].id, "image-alt");
    assert_eq!(report.results.violations[0].nodes.len(), 1);
    assert_eq!(engine.bases(), vec!["https://example.com/".to_string()]);
}

#[tokio::test]
async fn test_markup_uses_supplied_base_url() {
    let engine = RecordingEngine::new(json!({ "violations": [] }));
    let auditor = Auditor::new(
        AuditConfig::default(),
        RuleEngine::new().with_document_engine(engine.clone()),
    ).unwrap();

    auditor
        .execute(
            AuditRequest::for_html(
                "<p>hello</p>",
                Some("https://site.test/blog/"),
                RuleOptions::default(),
            )
            .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(engine.bases(), vec!["https://site.test/blog/".to_string()]);
}

#[tokio::test]
async fn test_validation_failure_touches_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (auditor, log) = live_auditor(script_engine(), PageBehavior::Healthy, violation_payload());

    let err = auditor
        .execute_body(AuditRequestBody {
            url: Some(format!("{}/page", server.uri())),
            render_mode: Some(RenderMode::Dynamic),
            options: Some(json!({ "runOnly": [] })),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AuditError::Validation(ValidationError::EmptyRunOnly)
    ));
    assert_eq!(err.status_code(), 400);

    let err = auditor
        .execute_body(AuditRequestBody::default())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Missing url or html");

    assert_eq!(log.launched.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_static_fetch_resolves_against_final_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/landing/"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/landing/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html lang='en'><body><img src='x.png'></body></html>"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let engine = RecordingEngine::new(violation_payload());
    let auditor = Auditor::new(
        AuditConfig::default(),
        RuleEngine::new().with_document_engine(engine.clone()),
    ).unwrap();

    let url = format!("{}/start", server.uri());
    let report = auditor
        .execute(AuditRequest::for_url(&url, RenderMode::Static, RuleOptions::default()).unwrap())
        .await
        .unwrap();

    assert_eq!(report.target.as_deref(), Some(url.as_str()));
    assert_eq!(report.results.violations.len(), 1);
    assert_eq!(engine.bases(), vec![format!("{}/landing/", server.uri())]);
}

#[tokio::test]
async fn test_static_fetch_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let auditor = Auditor::new(
        AuditConfig::default(),
        RuleEngine::new().with_document_engine(RecordingEngine::new(violation_payload())),
    ).unwrap();
    let err = auditor
        .execute(
            AuditRequest::for_url(&server.uri(), RenderMode::Static, RuleOptions::default())
                .unwrap(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AuditError::Acquisition(AcquisitionError::Status { status: 503, .. })
    ));
    assert_eq!(err.status_code(), 500);
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_dynamic_audit_releases_browser() {
    let (auditor, log) = live_auditor(script_engine(), PageBehavior::Healthy, violation_payload());

    let report = auditor
        .execute(dynamic_request("https://example.com/app"))
        .await
        .unwrap();

    assert_eq!(report.target.as_deref(), Some("https://example.com/app"));
    assert_eq!(report.results.violations[0].id, "image-alt");
    assert_eq!(log.launched.load(Ordering::SeqCst), 1);
    assert_eq!(log.terminated.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_dynamic_audit_releases_browser_on_malformed_payload() {
    let (auditor, log) = live_auditor(script_engine(), PageBehavior::Healthy, json!([1, 2, 3]));

    let err = auditor
        .execute(dynamic_request("https://example.com/"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AuditError::Evaluation(EvaluationError::Malformed(_))
    ));
    assert_eq!(log.launched.load(Ordering::SeqCst), 1);
    assert_eq!(log.terminated.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_navigation_timeout_releases_browser() {
    let (auditor, log) = live_auditor(script_engine(), PageBehavior::Hangs, violation_payload());

    let err = auditor
        .execute(dynamic_request("https://example.com/slow"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AuditError::Acquisition(AcquisitionError::Timeout {
            stage: "navigation",
            ..
        })
    ));
    assert!(err.is_transient());
    assert_eq!(log.terminated.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_navigation_failure_releases_browser() {
    let (auditor, log) =
        live_auditor(script_engine(), PageBehavior::Unreachable, violation_payload());

    let err = auditor
        .execute(dynamic_request("https://nowhere.invalid/"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AuditError::Acquisition(AcquisitionError::Navigation { .. })
    ));
    assert!(err.to_string().contains("ERR_NAME_NOT_RESOLVED"));
    assert_eq!(log.terminated.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_evaluation_timeout_releases_browser() {
    let (auditor, log) =
        live_auditor(script_engine(), PageBehavior::SlowScript, violation_payload());

    let err = auditor
        .execute(dynamic_request("https://example.com/"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AuditError::Evaluation(EvaluationError::Timeout(_))
    ));
    assert_eq!(log.terminated.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_dynamic_falls_back_to_document_engine() {
    let engine = RecordingEngine::new(violation_payload());
    let (auditor, log) = live_auditor(
        RuleEngine::new().with_document_engine(engine.clone()),
        PageBehavior::Healthy,
        Value::Null,
    );

    let report = auditor
        .execute(dynamic_request("https://example.com/spa"))
        .await
        .unwrap();

    assert_eq!(report.results.violations.len(), 1);
    assert_eq!(
        engine.bases(),
        vec!["https://example.com/spa#rendered".to_string()]
    );
    assert_eq!(log.terminated.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_static_timeout_stops_document_engine() {
    let engine = Arc::new(StallingEngine::default());
    let auditor = Auditor::new(
        fast_config(),
        RuleEngine::new().with_document_engine(engine.clone()),
    )
    .unwrap();

    let started = std::time::Instant::now();
    let err = auditor
        .execute(AuditRequest::for_html("<p>x</p>", None, RuleOptions::default()).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AuditError::Evaluation(EvaluationError::Timeout(_))
    ));

    while !engine.stopped.load(Ordering::SeqCst) {
        assert!(started.elapsed() < Duration::from_secs(5), "engine kept running");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_missing_engine_is_evaluation_error() {
    let auditor = Auditor::new(AuditConfig::default(), RuleEngine::new()).unwrap();
    let err = auditor
        .execute(AuditRequest::for_html("<p>x</p>", None, RuleOptions::default()).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AuditError::Evaluation(EvaluationError::MissingEngine("static"))
    ));
}

#[tokio::test]
async fn test_concurrent_dynamic_audits_are_isolated() {
    let (auditor, log) = live_auditor(script_engine(), PageBehavior::Healthy, violation_payload());

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let auditor = auditor.clone();
            tokio::spawn(async move {
                auditor
                    .execute(dynamic_request(&format!("https://example.com/{i}")))
                    .await
            })
        })
        .collect();

    for (i, h) in handles.into_iter().enumerate() {
        let report = h.await.unwrap().unwrap();
        assert_eq!(report.target, Some(format!("https://example.com/{i}")));
    }
    assert_eq!(log.launched.load(Ordering::SeqCst), 4);
    assert_eq!(log.terminated.load(Ordering::SeqCst), 4);
}
