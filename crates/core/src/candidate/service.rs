//! Candidate ingest, preview and enqueue.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use super::{
    CandidateCache, CandidateError, CandidateKey, CandidateView, DownloadCandidate,
    EvaluationContext, MediaRef, SearchResult,
};
use crate::audit::{event_types, AuditLog, NewAuditEvent};
use crate::events::EventPublisher;
use crate::job::{DownloadJob, JobStore, NewDownloadJob};
use crate::policy::{EvaluationTrace, PolicyEngine};
use crate::settings::SettingsService;

/// Result of [`CandidateService::enqueue`].
#[derive(Debug, Clone, Serialize)]
pub struct EnqueueOutcome {
    pub trace: EvaluationTrace,
    pub job: DownloadJob,
    /// False when an active job for the same candidate and media already existed.
    pub created: bool,
}

/// Owns the candidate cache and turns cached candidates into download jobs.
pub struct CandidateService {
    cache: CandidateCache,
    engine: PolicyEngine,
    jobs: Arc<dyn JobStore>,
    settings: Arc<SettingsService>,
    audit: AuditLog,
    events: EventPublisher,
}

impl CandidateService {
    pub fn new(
        cache: CandidateCache,
        engine: PolicyEngine,
        jobs: Arc<dyn JobStore>,
        settings: Arc<SettingsService>,
        audit: AuditLog,
        events: EventPublisher,
    ) -> Self {
        Self {
            cache,
            engine,
            jobs,
            settings,
            audit,
            events,
        }
    }

    pub fn cache(&self) -> &CandidateCache {
        &self.cache
    }

    pub fn engine(&self) -> &PolicyEngine {
        &self.engine
    }

    /// Classify and cache raw search results, preserving their order.
    pub fn ingest(&self, results: Vec<SearchResult>) -> Result<Vec<CandidateView>, CandidateError> {
        self.cache.sweep()?;

        let mut views = Vec::with_capacity(results.len());
        for result in results {
            let candidate = DownloadCandidate::from(result);
            let parsed = crate::release::parse(&candidate.title);
            self.cache.insert(candidate.clone())?;
            views.push(CandidateView { candidate, parsed });
        }
        debug!(count = views.len(), cached = self.cache.len(), "Ingested candidates");
        Ok(views)
    }

    fn context(&self, key: &CandidateKey, media: MediaRef) -> Result<EvaluationContext, CandidateError> {
        let candidate = self.cache.get(key)?;
        Ok(EvaluationContext::new(candidate).with_media(media))
    }

    /// Evaluate policies for a cached candidate without creating anything.
    pub fn preview(
        &self,
        key: &CandidateKey,
        media: MediaRef,
    ) -> Result<EvaluationTrace, CandidateError> {
        let ctx = self.context(key, media)?;
        Ok(self.engine.evaluate(&ctx)?)
    }

    /// Evaluate and create a download job from the resulting plan.
    pub fn enqueue(&self, key: &CandidateKey, media: MediaRef) -> Result<EnqueueOutcome, CandidateError> {
        let ctx = self.context(key, media.clone())?;
        let trace = self.engine.evaluate(&ctx)?;

        let plan = &trace.final_plan;
        let (Some(downloader_id), Some(library_id), Some(name_template_id)) = (
            plan.downloader_id.clone(),
            plan.library_id.clone(),
            plan.name_template_id.clone(),
        ) else {
            return Err(CandidateError::PlanIncomplete(plan.missing()));
        };

        let candidate = ctx.candidate;
        let (job, created) = self.jobs.create_unless_active(NewDownloadJob {
            indexer_id: candidate.indexer_id,
            guid: candidate.guid,
            candidate_title: candidate.title,
            candidate_link: candidate.link,
            protocol: candidate.protocol,
            media,
            downloader_id,
            library_id,
            name_template_id,
            max_attempts: self.settings.jobs_max_attempts()?,
        })?;

        if created {
            self.audit.record(
                NewAuditEvent::job(&job.id, event_types::JOB_CREATED)
                    .with_message(format!("enqueued {}", job.candidate_title))
                    .with_metadata(serde_json::json!({
                        "indexer_id": job.indexer_id,
                        "guid": job.guid,
                        "downloader_id": job.downloader_id,
                        "library_id": job.library_id,
                        "name_template_id": job.name_template_id,
                    })),
            );
            self.events.job_updated(&job.id);
            info!(
                job_id = %job.id,
                title = %job.candidate_title,
                downloader = %job.downloader_id,
                "Download job created"
            );
        } else {
            debug!(job_id = %job.id, "Active job already exists for candidate");
        }

        Ok(EnqueueOutcome {
            trace,
            job,
            created,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{SqliteAuditStore, SubjectKind};
    use crate::candidate::{MediaType, Protocol};
    use crate::job::{JobStatus, SqliteJobStore};
    use crate::policy::{
        Action, CompareOp, PlanDefaults, PlanField, PolicyInput, PolicyStore, Rule,
        SqlitePolicyStore,
    };
    use crate::settings::SqliteSettingsStore;
    use std::time::Duration;

    struct Fixture {
        service: CandidateService,
        policies: Arc<SqlitePolicyStore>,
        audit: AuditLog,
    }

    fn fixture_with(ttl: Duration, defaults: PlanDefaults) -> Fixture {
        let policies = Arc::new(SqlitePolicyStore::in_memory().unwrap());
        let audit = AuditLog::new(Arc::new(SqliteAuditStore::in_memory().unwrap()));
        let service = CandidateService::new(
            CandidateCache::new(ttl),
            PolicyEngine::new(policies.clone()).with_defaults(defaults),
            Arc::new(SqliteJobStore::in_memory().unwrap()),
            Arc::new(SettingsService::new(Arc::new(
                SqliteSettingsStore::in_memory().unwrap(),
            ))),
            audit.clone(),
            EventPublisher::default(),
        );
        Fixture {
            service,
            policies,
            audit,
        }
    }

    fn defaults() -> PlanDefaults {
        let mut defaults = PlanDefaults::default();
        defaults
            .downloaders
            .insert(Protocol::Torrent, "qbit".to_string());
        defaults
            .libraries
            .insert(MediaType::Movie, "movies".to_string());
        defaults
            .name_templates
            .insert(MediaType::Movie, "movie".to_string());
        defaults
    }

    fn result(guid: &str, title: &str) -> SearchResult {
        SearchResult {
            indexer_id: 4,
            indexer_name: "Tracker".to_string(),
            guid: guid.to_string(),
            title: title.to_string(),
            download_url: format!("magnet:?xt=urn:btih:{}", guid),
            protocol: Protocol::Torrent,
            size: 8_000_000_000,
            seeders: Some(25),
            leechers: Some(3),
            age: 3600,
            age_hours: 1.0,
            publish_date: None,
            categories: vec!["2000".to_string()],
            grabs: 5,
        }
    }

    fn heat() -> MediaRef {
        MediaRef::movie("Heat", Some(1995))
    }

    #[test]
    fn test_ingest_classifies_and_caches() {
        let f = fixture_with(Duration::from_secs(300), defaults());
        let views = f
            .service
            .ingest(vec![
                result("a", "Heat.1995.1080p.BluRay.x264-GRP"),
                result("b", "Heat.1995.720p.HDTV.x264-OTHER"),
            ])
            .unwrap();

        assert_eq!(views.len(), 2);
        assert_eq!(views[0].candidate.guid, "a");
        assert_eq!(views[0].parsed.quality.full(), "Bluray-1080p");
        assert_eq!(f.service.cache().len(), 2);
    }

    #[test]
    fn test_preview_has_no_side_effects() {
        let f = fixture_with(Duration::from_secs(300), defaults());
        f.service
            .ingest(vec![result("a", "Heat.1995.1080p.BluRay.x264-GRP")])
            .unwrap();

        let trace = f.service.preview(&CandidateKey::new(4, "a"), heat()).unwrap();
        assert!(trace.final_plan.is_complete());
        assert_eq!(trace.defaulted.len(), 3);

        let (jobs, total) = (
            f.service.jobs.list(&crate::job::JobFilter::new()).unwrap(),
            f.service.jobs.count(&crate::job::JobFilter::new()).unwrap(),
        );
        assert!(jobs.is_empty());
        assert_eq!(total, 0);
    }

    #[test]
    fn test_enqueue_creates_job_once() {
        let f = fixture_with(Duration::from_secs(300), defaults());
        f.policies
            .create(PolicyInput::new(
                "hd to qbit-hd",
                1,
                Rule::compare("quality.resolution", CompareOp::Eq, "1080p"),
                vec![Action::set_downloader("qbit-hd")],
            ))
            .unwrap();
        f.service
            .ingest(vec![result("a", "Heat.1995.1080p.BluRay.x264-GRP")])
            .unwrap();
        let key = CandidateKey::new(4, "a");

        let first = f.service.enqueue(&key, heat()).unwrap();
        assert!(first.created);
        assert_eq!(first.job.status, JobStatus::Pending);
        assert_eq!(first.job.downloader_id, "qbit-hd");
        assert_eq!(first.job.library_id, "movies");
        assert_eq!(first.job.max_attempts, 10);

        let second = f.service.enqueue(&key, heat()).unwrap();
        assert!(!second.created);
        assert_eq!(second.job.id, first.job.id);

        let timeline = f
            .audit
            .timeline(SubjectKind::DownloadJob, &first.job.id)
            .unwrap();
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline[0].event_type, event_types::JOB_CREATED);
    }

    #[test]
    fn test_enqueue_incomplete_plan() {
        let f = fixture_with(Duration::from_secs(300), PlanDefaults::default());
        f.service
            .ingest(vec![result("a", "Heat.1995.1080p.BluRay.x264-GRP")])
            .unwrap();

        match f.service.enqueue(&CandidateKey::new(4, "a"), heat()) {
            Err(CandidateError::PlanIncomplete(missing)) => {
                assert_eq!(
                    missing,
                    vec![
                        PlanField::Downloader,
                        PlanField::Library,
                        PlanField::NameTemplate
                    ]
                );
            }
            other => panic!("expected PlanIncomplete, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_and_expired_candidates() {
        let f = fixture_with(Duration::ZERO, defaults());
        assert!(matches!(
            f.service.preview(&CandidateKey::new(4, "a"), heat()),
            Err(CandidateError::NotFound(_))
        ));

        f.service
            .ingest(vec![result("a", "Heat.1995.1080p.BluRay.x264-GRP")])
            .unwrap();
        assert!(matches!(
            f.service.enqueue(&CandidateKey::new(4, "a"), heat()),
            Err(CandidateError::Expired(_))
        ));
    }
}
