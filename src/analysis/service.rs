use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::join;
use reqwest::Url;

use super::model::{AgeGroup, AnalysisMode, AnalysisRecord};
use super::parse::{AnalysisPayload, parse_analysis};
use super::ports::{RecordStore, VisionAnalyzer, VisionRequest};
use super::prompt::select_prompt;
use crate::error::AppError;
use crate::history::HistoryStore;
use crate::rate_limit::RateLimiter;
use crate::utils::messages;

/// 分析请求的原始输入，校验在编排器内完成
#[derive(Debug, Clone, Default)]
pub struct AnalysisInput {
    pub image_url: Option<String>,
    pub child_age: Option<i64>,
    pub analysis_mode: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub client_id: String,
    pub session_id: String,
}

#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub record: AnalysisRecord,
    pub remaining: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitPolicy {
    pub limit: u32,
    pub window: Duration,
}

struct ValidatedInput {
    image_url: String,
    child_age: i64,
    mode: AnalysisMode,
}

pub struct AnalysisService {
    limiter: Arc<RateLimiter>,
    policy: RateLimitPolicy,
    analyzer: Arc<dyn VisionAnalyzer>,
    records: Arc<dyn RecordStore>,
    history: HistoryStore,
    analysis_timeout: Duration,
}

impl AnalysisService {
    pub fn new(
        limiter: Arc<RateLimiter>,
        policy: RateLimitPolicy,
        analyzer: Arc<dyn VisionAnalyzer>,
        records: Arc<dyn RecordStore>,
        history: HistoryStore,
        analysis_timeout: Duration,
    ) -> Self {
        Self {
            limiter,
            policy,
            analyzer,
            records,
            history,
            analysis_timeout,
        }
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// 校验 → 限流 → 选择提示词 → 调用模型 → 生成记录 → 持久化 → 写入历史
    ///
    /// 前四步任一失败都会中止请求且不产生记录；持久化和历史写入失败只记录日志。
    pub async fn analyze(
        &self,
        context: &RequestContext,
        input: AnalysisInput,
    ) -> Result<AnalysisOutcome, AppError> {
        let input = validate(input)?;

        let decision =
            self.limiter
                .check_and_consume(&context.client_id, self.policy.limit, self.policy.window);
        if !decision.allowed {
            tracing::info!("Rate limit exceeded for {}", context.client_id);
            return Err(AppError::RateLimitExceeded);
        }

        let age_group = AgeGroup::from_age(input.child_age)?;
        let template = select_prompt(age_group, input.mode)?;

        tracing::info!(
            "Starting analysis: age={} group={} mode={}",
            input.child_age,
            age_group,
            input.mode.as_str()
        );

        let request = VisionRequest {
            image_url: &input.image_url,
            child_age: input.child_age,
            age_group,
            mode: input.mode,
            system_prompt: template.system,
            user_prompt: template.user,
            max_tokens: template.max_tokens,
        };

        let content = match tokio::time::timeout(self.analysis_timeout, self.analyzer.analyze(request)).await {
            Ok(Ok(content)) => content,
            Ok(Err(e)) => {
                tracing::error!("Vision analysis failed: {}", e);
                return Err(AppError::AnalysisFailed(messages::ANALYSIS_FAILED.into()));
            }
            Err(_) => {
                tracing::error!(
                    "Vision analysis timed out after {:?}",
                    self.analysis_timeout
                );
                return Err(AppError::Timeout);
            }
        };

        let payload = parse_analysis(&content).map_err(|e| {
            tracing::error!("Failed to parse analysis ({} chars): {}", content.len(), e);
            AppError::AnalysisFailed(messages::ANALYSIS_FAILED.into())
        })?;

        if payload.insights.is_empty() {
            tracing::warn!("Analysis response contained no insights");
        }

        let record = build_record(&input, age_group, payload);

        self.persist(context, &record).await;

        if let Err(e) = self.history.append(&context.session_id, record.clone()).await {
            tracing::warn!("Failed to append analysis to history: {}", e);
        }

        Ok(AnalysisOutcome {
            record,
            remaining: decision.remaining,
        })
    }

    async fn persist(&self, context: &RequestContext, record: &AnalysisRecord) {
        let (saved, usage) = join(
            self.records.save_analysis(record, &context.session_id),
            self.records
                .record_usage(&context.client_id, record.created_at.date_naive()),
        )
        .await;

        if let Err(e) = saved {
            tracing::error!("Failed to store analysis {}: {}", record.id, e);
        }
        if let Err(e) = usage {
            tracing::error!("Failed to track usage for {}: {}", context.client_id, e);
        }
    }
}

fn validate(input: AnalysisInput) -> Result<ValidatedInput, AppError> {
    let image_url = input
        .image_url
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty());

    let (image_url, child_age) = match (image_url, input.child_age) {
        (Some(url), Some(age)) => (url, age),
        _ => return Err(AppError::Validation(messages::MISSING_FIELDS.into())),
    };

    if Url::parse(&image_url).is_err() {
        return Err(AppError::Validation(messages::INVALID_IMAGE_URL.into()));
    }

    AgeGroup::from_age(child_age)?;

    let mode = match input.analysis_mode.as_deref().map(str::trim) {
        None | Some("") => AnalysisMode::default(),
        Some(mode) => mode.parse()?,
    };

    Ok(ValidatedInput {
        image_url,
        child_age,
        mode,
    })
}

fn build_record(input: &ValidatedInput, age_group: AgeGroup, payload: AnalysisPayload) -> AnalysisRecord {
    AnalysisRecord {
        id: uuid::Uuid::new_v4().to_string(),
        child_age: input.child_age,
        age_group,
        image_url: input.image_url.clone(),
        analysis_mode: input.mode,
        image_description: payload.image_description,
        insights: payload.insights,
        recommendations: payload.recommendations,
        strengths: payload.strengths,
        areas_for_growth: payload.areas_for_growth,
        parental_guidance: payload.parental_guidance,
        action_plan: payload.action_plan,
        developmental_levels: payload.developmental_levels,
        red_flags: payload.red_flags,
        professional_consultation: payload.professional_consultation,
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::model::DevelopmentalLevel;
    use crate::analysis::ports::VisionError;
    use crate::database::PersistenceError;
    use crate::history::FileHistoryStore;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const REPLY: &str = r#"Here you go:
{"insights": {"emotional": "따뜻한 색을 골랐어요", "cognitive": "형태가 뚜렷해요"},
 "strengths": ["색감"], "developmentalLevels": {"creative": "above"}}"#;

    struct ScriptedAnalyzer {
        reply: Result<&'static str, ()>,
        delay: Duration,
        calls: AtomicUsize,
        last_prompt: Mutex<Option<String>>,
    }

    impl ScriptedAnalyzer {
        fn replying(reply: &'static str) -> Self {
            Self {
                reply: Ok(reply),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
                last_prompt: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl VisionAnalyzer for ScriptedAnalyzer {
        async fn analyze(&self, request: VisionRequest<'_>) -> Result<String, VisionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_prompt.lock().unwrap() = Some(request.user_prompt.to_string());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.reply
                .map(str::to_string)
                .map_err(|_| VisionError::Transport("connection reset".into()))
        }
    }

    #[derive(Default)]
    struct MemoryRecordStore {
        fail: bool,
        saved: Mutex<Vec<String>>,
        usage: Mutex<Vec<(String, NaiveDate)>>,
    }

    #[async_trait]
    impl RecordStore for MemoryRecordStore {
        async fn save_analysis(
            &self,
            record: &AnalysisRecord,
            _session_id: &str,
        ) -> Result<(), PersistenceError> {
            if self.fail {
                return Err(PersistenceError::Unavailable("store offline".into()));
            }
            self.saved.lock().unwrap().push(record.id.clone());
            Ok(())
        }

        async fn record_usage(
            &self,
            client_id: &str,
            date: NaiveDate,
        ) -> Result<(), PersistenceError> {
            if self.fail {
                return Err(PersistenceError::Unavailable("store offline".into()));
            }
            self.usage.lock().unwrap().push((client_id.to_string(), date));
            Ok(())
        }
    }

    struct Fixture {
        service: AnalysisService,
        analyzer: Arc<ScriptedAnalyzer>,
        records: Arc<MemoryRecordStore>,
        _dir: tempfile::TempDir,
    }

    fn fixture(analyzer: ScriptedAnalyzer, records: MemoryRecordStore, limit: u32) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let analyzer = Arc::new(analyzer);
        let records = Arc::new(records);
        let service = AnalysisService::new(
            Arc::new(RateLimiter::new(100)),
            RateLimitPolicy {
                limit,
                window: Duration::from_secs(3600),
            },
            analyzer.clone(),
            records.clone(),
            HistoryStore::File(Arc::new(FileHistoryStore::new(dir.path()))),
            Duration::from_millis(200),
        );
        Fixture {
            service,
            analyzer,
            records,
            _dir: dir,
        }
    }

    fn context() -> RequestContext {
        RequestContext {
            client_id: "198.51.100.7".into(),
            session_id: "session-a".into(),
        }
    }

    fn input(age: i64, mode: &str) -> AnalysisInput {
        AnalysisInput {
            image_url: Some("https://blob.example.com/artanalyx/artwork_1_cat.png".into()),
            child_age: Some(age),
            analysis_mode: Some(mode.into()),
        }
    }

    #[tokio::test]
    async fn simple_analysis_for_a_six_year_old() {
        let f = fixture(ScriptedAnalyzer::replying(REPLY), MemoryRecordStore::default(), 10);

        let outcome = f.service.analyze(&context(), input(6, "simple")).await.unwrap();
        let record = outcome.record;

        assert_eq!(record.age_group, AgeGroup::Child);
        assert_eq!(record.analysis_mode, AnalysisMode::Simple);
        assert!(!record.insights.is_empty());
        assert_eq!(record.developmental_levels.creative, DevelopmentalLevel::Above);
        assert_eq!(record.developmental_levels.social, DevelopmentalLevel::Average);
        assert_eq!(outcome.remaining, 9);

        let prompt = f.analyzer.last_prompt.lock().unwrap().clone().unwrap();
        assert!(prompt.contains("5-7세"));

        assert_eq!(f.records.saved.lock().unwrap().as_slice(), &[record.id.clone()]);
        let history = f.service.history().list("session-a").await;
        assert_eq!(history[0].id, record.id);
    }

    #[tokio::test]
    async fn mode_defaults_to_deep() {
        let f = fixture(ScriptedAnalyzer::replying(REPLY), MemoryRecordStore::default(), 10);
        let mut request = input(3, "");
        request.analysis_mode = None;

        let record = f.service.analyze(&context(), request).await.unwrap().record;
        assert_eq!(record.analysis_mode, AnalysisMode::Deep);
        assert_eq!(record.age_group, AgeGroup::Infant);
    }

    #[tokio::test]
    async fn invalid_input_fails_before_consuming_quota() {
        let f = fixture(ScriptedAnalyzer::replying(REPLY), MemoryRecordStore::default(), 1);

        for bad in [input(13, "deep"), input(1, "deep"), input(6, "extreme")] {
            let err = f.service.analyze(&context(), bad).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
        let mut missing_url = input(6, "deep");
        missing_url.image_url = Some("   ".into());
        assert!(matches!(
            f.service.analyze(&context(), missing_url).await,
            Err(AppError::Validation(_))
        ));

        assert_eq!(f.analyzer.calls.load(Ordering::SeqCst), 0);
        assert!(f.service.analyze(&context(), input(6, "deep")).await.is_ok());
    }

    #[tokio::test]
    async fn eleventh_request_is_rate_limited() {
        let f = fixture(ScriptedAnalyzer::replying(REPLY), MemoryRecordStore::default(), 10);

        for _ in 0..10 {
            f.service.analyze(&context(), input(8, "simple")).await.unwrap();
        }
        let err = f.service.analyze(&context(), input(8, "simple")).await.unwrap_err();

        assert!(matches!(err, AppError::RateLimitExceeded));
        assert_eq!(f.analyzer.calls.load(Ordering::SeqCst), 10);
        assert_eq!(f.records.saved.lock().unwrap().len(), 10);
        assert_eq!(f.service.history().list("session-a").await.len(), 10);
    }

    #[tokio::test]
    async fn store_outage_does_not_fail_the_analysis() {
        let store = MemoryRecordStore {
            fail: true,
            ..Default::default()
        };
        let f = fixture(ScriptedAnalyzer::replying(REPLY), store, 10);

        let outcome = f.service.analyze(&context(), input(10, "deep")).await.unwrap();
        assert_eq!(outcome.record.strengths, vec!["색감".to_string()]);
    }

    #[tokio::test]
    async fn transport_failure_creates_no_record() {
        let analyzer = ScriptedAnalyzer {
            reply: Err(()),
            ..ScriptedAnalyzer::replying("")
        };
        let f = fixture(analyzer, MemoryRecordStore::default(), 10);

        let err = f.service.analyze(&context(), input(6, "deep")).await.unwrap_err();
        assert!(matches!(err, AppError::AnalysisFailed(_)));
        assert!(f.records.saved.lock().unwrap().is_empty());
        assert!(f.service.history().list("session-a").await.is_empty());
    }

    #[tokio::test]
    async fn unparseable_output_is_an_analysis_failure() {
        let f = fixture(
            ScriptedAnalyzer::replying("I cannot analyze this image."),
            MemoryRecordStore::default(),
            10,
        );

        let err = f.service.analyze(&context(), input(6, "deep")).await.unwrap_err();
        assert!(matches!(err, AppError::AnalysisFailed(_)));
        assert!(f.records.usage.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn truncated_output_creates_no_record() {
        let f = fixture(
            ScriptedAnalyzer::replying(
                r#"{"imageDescription": "집", "insights": {"emotional": "밝아요"}, "strengths": ["색"#,
            ),
            MemoryRecordStore::default(),
            10,
        );

        let err = f.service.analyze(&context(), input(7, "deep")).await.unwrap_err();
        assert!(matches!(err, AppError::AnalysisFailed(_)));
        assert!(f.records.saved.lock().unwrap().is_empty());
        assert!(f.service.history().list("session-a").await.is_empty());
    }

    #[tokio::test]
    async fn slow_analyzer_times_out() {
        let analyzer = ScriptedAnalyzer {
            delay: Duration::from_secs(5),
            ..ScriptedAnalyzer::replying(REPLY)
        };
        let f = fixture(analyzer, MemoryRecordStore::default(), 10);

        let err = f.service.analyze(&context(), input(6, "deep")).await.unwrap_err();
        assert!(matches!(err, AppError::Timeout));
        assert!(f.service.history().list("session-a").await.is_empty());
    }
}
