//! Clinical attention repository management.
//!
//! ## Architecture
//!
//! - **Type-state pattern**: `AttentionService<Uninitialised>` creates and lists episodes,
//!   `AttentionService<Initialised>` operates on one known episode
//! - **UUID-based sharded storage**: `clinical_attentions/<s1>/<s2>/<uuid>/ATTENTION.yaml`
//! - **Git-based versioning**: every transition is one commit, so the log is the audit trail
//! - **Per-episode locking**: read, apply and commit run under the episode's lock

use crate::author::CommitAuthor;
use crate::config::CoreConfig;
use crate::constants::ATTENTION_FILENAME;
use crate::error::{AttentionError, AttentionResult};
use crate::locks::AttentionLocks;
use crate::query::{AttentionPage, AttentionQuery};
use crate::repositories::shared::{create_uuid_and_shard_dir, sharded_record_dirs};
use crate::versioned_files::{
    AttentionAction, AttentionCommitMessage, FileToWrite, ParsedCommitMessage,
    VersionedFileService,
};
use chrono::{DateTime, Utc};
use records::AttentionRecord;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use ulr_uuid::ShardableUuid;
use ulr_workflow::{
    apply, Actor, AttentionSummary, ClinicalAttention, ClosingReason, Command, NewAttention,
    Pertinence, Role, SupervisorVerdict,
};
use uuid::Uuid;

// ============================================================================
// TYPE-STATE MARKERS
// ============================================================================

/// Marker type: no particular episode selected. Creation and listing only.
#[derive(Clone, Copy, Debug)]
pub struct Uninitialised;

/// Marker type: operations target one existing episode.
#[derive(Clone, Debug)]
pub struct Initialised {
    attention_id: ShardableUuid,
}

/// Roles allowed to register a new episode.
const CREATE_ROLES: &[Role] = &[Role::Resident, Role::Supervisor, Role::Admin];

// ============================================================================
// ATTENTION SERVICE
// ============================================================================

/// Service for clinical attention repository operations.
#[derive(Clone, Debug)]
pub struct AttentionService<S> {
    cfg: Arc<CoreConfig>,
    locks: Arc<AttentionLocks>,
    state: S,
}

/// One audit entry read from an episode's commit log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub commit: String,
    pub at: DateTime<Utc>,
    pub action: AttentionAction,
    pub summary: String,
    pub actor_id: Option<String>,
    pub actor_role: Option<String>,
    pub care_location: Option<String>,
}

impl AttentionService<Uninitialised> {
    pub fn new(cfg: Arc<CoreConfig>, locks: Arc<AttentionLocks>) -> Self {
        Self {
            cfg,
            locks,
            state: Uninitialised,
        }
    }

    /// Registers a new episode with every review axis unset.
    ///
    /// Creates the sharded directory, writes `ATTENTION.yaml` and makes the initial commit. If
    /// any step fails the directory is removed.
    ///
    /// # Errors
    ///
    /// - [`AttentionError::Workflow`] if the actor may not create episodes or a required field
    ///   is blank.
    /// - Storage and git errors.
    pub fn create(
        self,
        actor: &Actor,
        draft: NewAttention,
    ) -> AttentionResult<(AttentionService<Initialised>, ClinicalAttention)> {
        actor.require_role(CREATE_ROLES, "create clinical attention")?;

        // Validate before touching the filesystem; the real id is assigned below.
        let mut attention = ClinicalAttention::open(Uuid::nil(), draft, actor.id().clone(), Utc::now())?;

        let commit_message = AttentionCommitMessage::new(
            AttentionAction::Create,
            "Registered clinical attention",
            self.cfg.care_location(),
        )?;

        let (attention_id, attention_dir) =
            create_uuid_and_shard_dir(&self.cfg.attentions_dir(), ShardableUuid::new)?;
        attention.id = attention_id.uuid();

        let yaml = AttentionRecord::render(&attention)?;
        VersionedFileService::init_and_commit(
            &attention_dir,
            &CommitAuthor::for_actor(actor, self.cfg.namespace()),
            &commit_message,
            &[FileToWrite {
                relative_path: Path::new(ATTENTION_FILENAME),
                content: &yaml,
                old_content: None,
            }],
        )?;

        tracing::info!(attention_id = %attention_id, actor = %actor.id(), "clinical attention created");

        Ok((
            AttentionService {
                cfg: self.cfg,
                locks: self.locks,
                state: Initialised { attention_id },
            },
            attention,
        ))
    }

    /// Lists episodes matching `query`, newest first.
    ///
    /// Records that cannot be read or parsed are skipped with a warning.
    pub fn list(&self, query: &AttentionQuery) -> AttentionResult<AttentionPage> {
        query.apply(self.load_all())
    }

    /// Tallies every episode matching the filters of `query`. Pagination is ignored.
    pub fn summary(&self, query: &AttentionQuery) -> AttentionSummary {
        let all = self.load_all();
        AttentionSummary::tally(all.iter().filter(|a| query.matches(a)))
    }

    fn load_all(&self) -> Vec<ClinicalAttention> {
        sharded_record_dirs(&self.cfg.attentions_dir())
            .into_iter()
            .filter_map(|(id, dir)| match read_record(&dir) {
                Ok((attention, _)) => Some(attention),
                // Directory exists but the first commit has not landed yet.
                Err(AttentionError::FileRead(io)) if io.kind() == ErrorKind::NotFound => None,
                Err(e) => {
                    tracing::warn!(attention_id = %id, "skipping unreadable attention: {e}");
                    None
                }
            })
            .collect()
    }
}

impl AttentionService<Initialised> {
    /// Creates a service for an existing episode.
    pub fn with_id(cfg: Arc<CoreConfig>, locks: Arc<AttentionLocks>, attention_id: Uuid) -> Self {
        Self {
            cfg,
            locks,
            state: Initialised {
                attention_id: ShardableUuid::from_uuid(attention_id),
            },
        }
    }

    pub fn attention_id(&self) -> &ShardableUuid {
        &self.state.attention_id
    }

    fn attention_dir(&self) -> PathBuf {
        self.state
            .attention_id
            .sharded_dir(&self.cfg.attentions_dir())
    }

    /// Reads the current state of the episode.
    ///
    /// # Errors
    ///
    /// Returns [`AttentionError::NotFound`] if no episode exists with this id.
    pub fn read(&self) -> AttentionResult<ClinicalAttention> {
        self.read_current().map(|(attention, _)| attention)
    }

    fn read_current(&self) -> AttentionResult<(ClinicalAttention, String)> {
        read_record(&self.attention_dir()).map_err(|e| match e {
            AttentionError::FileRead(io) if io.kind() == ErrorKind::NotFound => {
                AttentionError::NotFound(self.state.attention_id.to_string())
            }
            other => other,
        })
    }

    pub fn submit_resident_approval(
        &self,
        actor: &Actor,
        approved: bool,
        reason: Option<String>,
    ) -> AttentionResult<ClinicalAttention> {
        self.execute(actor, Command::ResidentApproval { approved, reason })
    }

    pub fn submit_supervisor_review(
        &self,
        actor: &Actor,
        verdict: SupervisorVerdict,
        observation: Option<String>,
    ) -> AttentionResult<ClinicalAttention> {
        self.execute(
            actor,
            Command::SupervisorReview {
                verdict,
                observation,
            },
        )
    }

    /// Sets the pertinence tag. Setting the current value again is a no-op and makes no commit.
    pub fn set_pertinence(
        &self,
        actor: &Actor,
        value: Pertinence,
    ) -> AttentionResult<ClinicalAttention> {
        self.execute(actor, Command::SetPertinence(value))
    }

    pub fn close_episode(
        &self,
        actor: &Actor,
        reason: Option<ClosingReason>,
    ) -> AttentionResult<ClinicalAttention> {
        self.execute(actor, Command::Close(reason))
    }

    /// Applies `command` as a single transaction: lock, read, apply, write, commit.
    ///
    /// A rejected command leaves the stored episode untouched.
    pub fn execute(&self, actor: &Actor, command: Command) -> AttentionResult<ClinicalAttention> {
        let id = self.state.attention_id.uuid();
        self.locks.with_lock(id, || {
            let (current, current_yaml) = self.read_current()?;
            let commit_message = commit_message_for(&command, self.cfg.care_location())?;
            let action = command.action();

            let next = apply(&current, actor, command, Utc::now()).inspect_err(|e| {
                tracing::info!(attention_id = %self.state.attention_id, actor = %actor.id(), "{action} rejected: {e}");
            })?;

            if next == current {
                tracing::debug!(attention_id = %self.state.attention_id, "{action}: no change");
                return Ok(next);
            }

            let yaml = AttentionRecord::render(&next)?;
            VersionedFileService::write_and_commit_files(
                &self.attention_dir(),
                &CommitAuthor::for_actor(actor, self.cfg.namespace()),
                &commit_message,
                &[FileToWrite {
                    relative_path: Path::new(ATTENTION_FILENAME),
                    content: &yaml,
                    old_content: Some(&current_yaml),
                }],
            )?;

            tracing::info!(attention_id = %self.state.attention_id, actor = %actor.id(), "{action} committed");
            Ok(next)
        })
    }

    /// Audit trail of the episode, newest first.
    pub fn history(&self) -> AttentionResult<Vec<HistoryEntry>> {
        let dir = self.attention_dir();
        if !dir.join(ATTENTION_FILENAME).is_file() {
            return Err(AttentionError::NotFound(self.state.attention_id.to_string()));
        }

        let commits = VersionedFileService::open(&dir)?.history()?;
        Ok(commits
            .into_iter()
            .filter_map(|c| {
                let parsed = ParsedCommitMessage::parse(&c.message)?;
                Some(HistoryEntry {
                    actor_id: parsed.actor_id().map(str::to_string),
                    actor_role: parsed.actor_role().map(str::to_string),
                    care_location: parsed.care_location().map(str::to_string),
                    commit: c.oid,
                    at: c.time,
                    action: parsed.action,
                    summary: parsed.summary,
                })
            })
            .collect())
    }
}

fn read_record(dir: &Path) -> AttentionResult<(ClinicalAttention, String)> {
    let yaml = fs::read_to_string(dir.join(ATTENTION_FILENAME)).map_err(AttentionError::FileRead)?;
    let attention = AttentionRecord::parse(&yaml)?;
    Ok((attention, yaml))
}

/// Commit message for a command. Carries no clinical free text.
fn commit_message_for(
    command: &Command,
    care_location: &str,
) -> AttentionResult<AttentionCommitMessage> {
    let (action, summary, trailer) = match command {
        Command::ResidentApproval { approved, .. } => (
            AttentionAction::Resident,
            if *approved {
                "Resident approved AI result"
            } else {
                "Resident rejected AI result"
            },
            Some(("Decision", if *approved { "approved" } else { "rejected" })),
        ),
        Command::SupervisorReview { verdict, .. } => (
            AttentionAction::Supervisor,
            match verdict {
                SupervisorVerdict::Ratify => "Supervisor ratified review",
                SupervisorVerdict::Object => "Supervisor objected to review",
                SupervisorVerdict::Withdraw => "Supervisor review withdrawn",
            },
            None,
        ),
        Command::SetPertinence(value) => (
            AttentionAction::Pertinence,
            "Pertinence updated",
            Some(("Pertinence", value.label())),
        ),
        Command::Close(reason) => (
            AttentionAction::Close,
            "Closed clinical attention",
            reason.map(|r| ("Closing-Reason", r.as_str())),
        ),
    };

    let message = AttentionCommitMessage::new(action, summary, care_location)?;
    match trailer {
        Some((key, value)) => message.with_trailer(key, value),
        None => Ok(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tempfile::TempDir;
    use ulr_workflow::{derive_urgency_law_outcome, ActorId, UrgencyLawOutcome, WorkflowError};

    fn cfg(tmp: &TempDir) -> Arc<CoreConfig> {
        Arc::new(
            CoreConfig::new(tmp.path().to_path_buf(), "Servicio de Urgencia", "ulr.test").unwrap(),
        )
    }

    fn actor(id: &str, role: Role) -> Actor {
        Actor::new(ActorId::new(id).unwrap(), role)
    }

    fn draft(patient: &str, ai_result: Option<bool>) -> NewAttention {
        NewAttention {
            patient_name: patient.into(),
            patient_identifier: "12.345.678-9".into(),
            doctor_name: "Dr. Soto".into(),
            diagnostic: Some("Dolor torácico".into()),
            ai_result,
        }
    }

    fn create(
        cfg: &Arc<CoreConfig>,
        locks: &Arc<AttentionLocks>,
        ai_result: Option<bool>,
    ) -> AttentionService<Initialised> {
        AttentionService::new(Arc::clone(cfg), Arc::clone(locks))
            .create(&actor("res-1", Role::Resident), draft("Ana Rojas", ai_result))
            .unwrap()
            .0
    }

    #[test]
    fn create_writes_record_and_initial_commit() {
        let tmp = TempDir::new().unwrap();
        let cfg = cfg(&tmp);
        let locks = Arc::new(AttentionLocks::new());
        let service = create(&cfg, &locks, Some(true));

        let dir = service
            .attention_id()
            .sharded_dir(&tmp.path().join("clinical_attentions"));
        assert!(dir.join("ATTENTION.yaml").is_file());
        assert!(dir.join(".git").is_dir());

        let read = service.read().unwrap();
        assert_eq!(read.id, service.attention_id().uuid());
        assert_eq!(read.medic_approved(), None);

        let history = service.history().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].action, AttentionAction::Create);
        assert_eq!(history[0].actor_id.as_deref(), Some("res-1"));
        assert_eq!(history[0].care_location.as_deref(), Some("Servicio de Urgencia"));
    }

    #[test]
    fn insurer_cannot_create_and_nothing_is_written() {
        let tmp = TempDir::new().unwrap();
        let err = AttentionService::new(cfg(&tmp), Arc::new(AttentionLocks::new()))
            .create(&actor("ins-1", Role::Insurer), draft("Ana Rojas", None))
            .unwrap_err();
        assert!(matches!(
            err.as_workflow(),
            Some(WorkflowError::RoleNotPermitted { .. })
        ));
        assert!(!tmp.path().join("clinical_attentions").exists());
    }

    #[test]
    fn read_unknown_id_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let service =
            AttentionService::with_id(cfg(&tmp), Arc::new(AttentionLocks::new()), Uuid::new_v4());
        assert!(matches!(service.read(), Err(AttentionError::NotFound(_))));
        assert!(matches!(service.history(), Err(AttentionError::NotFound(_))));
    }

    #[test]
    fn full_scenario_is_persisted_and_audited() {
        let tmp = TempDir::new().unwrap();
        let cfg = cfg(&tmp);
        let locks = Arc::new(AttentionLocks::new());
        let service = create(&cfg, &locks, Some(true));
        let resident = actor("res-1", Role::Resident);
        let supervisor = actor("sup-1", Role::Supervisor);

        let a = service
            .submit_resident_approval(&resident, true, None)
            .unwrap();
        assert_eq!(derive_urgency_law_outcome(&a), UrgencyLawOutcome::Applies);

        let a = service
            .submit_supervisor_review(
                &supervisor,
                SupervisorVerdict::Object,
                Some("no coincide con antecedentes".into()),
            )
            .unwrap();
        assert_eq!(derive_urgency_law_outcome(&a), UrgencyLawOutcome::DoesNotApply);

        service
            .close_episode(&supervisor, Some(ClosingReason::Alta))
            .unwrap();

        let before = service.read().unwrap();
        let err = service
            .submit_supervisor_review(&supervisor, SupervisorVerdict::Ratify, None)
            .unwrap_err();
        assert!(matches!(err.as_workflow(), Some(WorkflowError::EpisodeClosed)));
        assert_eq!(service.read().unwrap(), before);

        let actions: Vec<AttentionAction> =
            service.history().unwrap().iter().map(|h| h.action).collect();
        assert_eq!(
            actions,
            vec![
                AttentionAction::Close,
                AttentionAction::Supervisor,
                AttentionAction::Resident,
                AttentionAction::Create,
            ]
        );
    }

    #[test]
    fn repeated_pertinence_makes_a_single_commit() {
        let tmp = TempDir::new().unwrap();
        let cfg = cfg(&tmp);
        let locks = Arc::new(AttentionLocks::new());
        let service = create(&cfg, &locks, None);
        let admin = actor("adm-1", Role::Admin);

        let first = service.set_pertinence(&admin, Pertinence::Pertinent).unwrap();
        let second = service.set_pertinence(&admin, Pertinence::Pertinent).unwrap();

        assert_eq!(first, second);
        assert_eq!(service.history().unwrap().len(), 2);
    }

    #[test]
    fn concurrent_supervisor_reviews_serialise() {
        let tmp = TempDir::new().unwrap();
        let cfg = cfg(&tmp);
        let locks = Arc::new(AttentionLocks::new());
        let id = create(&cfg, &locks, Some(true)).attention_id().uuid();

        let handles: Vec<_> = (0..6)
            .map(|i| {
                let service = AttentionService::with_id(Arc::clone(&cfg), Arc::clone(&locks), id);
                thread::spawn(move || {
                    let verdict = if i % 2 == 0 {
                        SupervisorVerdict::Ratify
                    } else {
                        SupervisorVerdict::Object
                    };
                    service.submit_supervisor_review(
                        &actor(&format!("sup-{i}"), Role::Supervisor),
                        verdict,
                        Some(format!("observación número {i}")),
                    )
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap().unwrap();
        }

        let service = AttentionService::with_id(cfg, locks, id);
        let history = service.history().unwrap();
        assert_eq!(history.len(), 7);

        let last = &history[0];
        let current = service.read().unwrap();
        assert_eq!(
            current.supervisor.reviewed_by().map(|a| a.as_str()),
            last.actor_id.as_deref()
        );
    }

    #[test]
    fn approval_racing_closure_never_interleaves() {
        let tmp = TempDir::new().unwrap();
        let cfg = cfg(&tmp);
        let locks = Arc::new(AttentionLocks::new());
        let id = create(&cfg, &locks, Some(true)).attention_id().uuid();

        let approve = {
            let service = AttentionService::with_id(Arc::clone(&cfg), Arc::clone(&locks), id);
            thread::spawn(move || {
                service.submit_resident_approval(&actor("res-1", Role::Resident), true, None)
            })
        };
        let close = {
            let service = AttentionService::with_id(Arc::clone(&cfg), Arc::clone(&locks), id);
            thread::spawn(move || {
                service.close_episode(&actor("sup-1", Role::Supervisor), Some(ClosingReason::Traslado))
            })
        };

        let approved = approve.join().unwrap();
        close.join().unwrap().unwrap();

        let service = AttentionService::with_id(cfg, locks, id);
        let current = service.read().unwrap();
        assert!(current.is_closed());
        match approved {
            Ok(_) => {
                assert_eq!(current.medic_approved(), Some(true));
                assert_eq!(service.history().unwrap().len(), 3);
            }
            Err(e) => {
                assert!(matches!(e.as_workflow(), Some(WorkflowError::EpisodeClosed)));
                assert_eq!(current.medic_approved(), None);
                assert_eq!(service.history().unwrap().len(), 2);
            }
        }
    }

    #[test]
    fn readers_never_see_a_partial_record() {
        use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

        let tmp = TempDir::new().unwrap();
        let cfg = cfg(&tmp);
        let locks = Arc::new(AttentionLocks::new());
        let id = create(&cfg, &locks, Some(true)).attention_id().uuid();
        let done = Arc::new(AtomicBool::new(false));
        let failures = Arc::new(AtomicUsize::new(0));

        let readers: Vec<_> = (0..2)
            .map(|_| {
                let single = AttentionService::with_id(Arc::clone(&cfg), Arc::clone(&locks), id);
                let store = AttentionService::new(Arc::clone(&cfg), Arc::clone(&locks));
                let done = Arc::clone(&done);
                let failures = Arc::clone(&failures);
                thread::spawn(move || {
                    while !done.load(Ordering::SeqCst) {
                        if single.read().is_err() {
                            failures.fetch_add(1, Ordering::SeqCst);
                        }
                        match store.list(&AttentionQuery::default()) {
                            Ok(page) if page.total == 1 => {}
                            _ => {
                                failures.fetch_add(1, Ordering::SeqCst);
                            }
                        }
                    }
                })
            })
            .collect();

        let writer = AttentionService::with_id(Arc::clone(&cfg), Arc::clone(&locks), id);
        let long_text = "antecedentes clínicos extensos ".repeat(600);
        for i in 0..60 {
            let verdict = if i % 2 == 0 {
                SupervisorVerdict::Ratify
            } else {
                SupervisorVerdict::Object
            };
            writer
                .submit_supervisor_review(
                    &actor("sup-1", Role::Supervisor),
                    verdict,
                    Some(format!("{long_text}{i}")),
                )
                .unwrap();
        }
        done.store(true, Ordering::SeqCst);
        for r in readers {
            r.join().unwrap();
        }

        assert_eq!(failures.load(Ordering::SeqCst), 0);
        let leftovers: Vec<_> = fs::read_dir(writer.attention_dir())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(".pending-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn list_and_summary_skip_corrupt_records() {
        let tmp = TempDir::new().unwrap();
        let cfg = cfg(&tmp);
        let locks = Arc::new(AttentionLocks::new());
        let service = AttentionService::new(Arc::clone(&cfg), Arc::clone(&locks));

        for (name, ai) in [("Ana Rojas", Some(true)), ("Luis Pérez", None)] {
            AttentionService::new(Arc::clone(&cfg), Arc::clone(&locks))
                .create(&actor("res-1", Role::Resident), draft(name, ai))
                .unwrap();
        }
        let corrupt = ShardableUuid::new().sharded_dir(&cfg.attentions_dir());
        fs::create_dir_all(&corrupt).unwrap();
        fs::write(corrupt.join(ATTENTION_FILENAME), "not: [valid").unwrap();

        let page = service
            .list(&AttentionQuery {
                patient_search: Some("luis".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.results[0].patient.name.as_str(), "Luis Pérez");

        let summary = service.summary(&AttentionQuery::default());
        assert_eq!(summary.total, 2);
        assert_eq!(summary.resident_pending, 2);
    }
}
