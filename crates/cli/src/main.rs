use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use ulr_core::{
    constants::{DEFAULT_CARE_LOCATION, DEFAULT_DATA_DIR, DEFAULT_NAMESPACE},
    workflow::{
        derive_urgency_law_outcome, Actor, ClinicalAttention, ClosingReason, NewAttention,
        Pertinence, SupervisorVerdict,
    },
    AttentionLocks, AttentionQuery, AttentionService, CoreConfig, Initialised, NullableFilter,
    ShardableUuid, Uninitialised,
};

#[derive(Parser)]
#[command(name = "ulr")]
#[command(about = "Clinical attention review workflow CLI")]
struct Cli {
    /// Directory holding the clinical attention store
    #[arg(long, env = "ULR_DATA_DIR", default_value = DEFAULT_DATA_DIR, global = true)]
    data_dir: PathBuf,
    /// Care location recorded in commit trailers
    #[arg(long, env = "ULR_CARE_LOCATION", default_value = DEFAULT_CARE_LOCATION, global = true)]
    care_location: String,
    /// Namespace used for commit author emails
    #[arg(long, env = "ULR_NAMESPACE", default_value = DEFAULT_NAMESPACE, global = true)]
    namespace: String,
    /// Acting user id (required for changes)
    #[arg(long, env = "ULR_ACTOR_ID", global = true)]
    actor_id: Option<String>,
    /// Acting user role: resident, supervisor, admin or insurer
    #[arg(long, env = "ULR_ACTOR_ROLE", global = true)]
    actor_role: Option<String>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum VerdictArg {
    Ratify,
    Object,
    Withdraw,
}

#[derive(Clone, Copy, ValueEnum)]
enum PertinenceArg {
    Pertinent,
    NotPertinent,
    Pending,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new clinical attention
    Create {
        patient_name: String,
        patient_identifier: String,
        doctor_name: String,
        #[arg(long)]
        diagnostic: Option<String>,
        /// Automated urgency-law classification
        #[arg(long)]
        ai_result: Option<bool>,
    },
    /// Show one clinical attention
    Show { id: String },
    /// List clinical attentions, newest first
    List {
        #[arg(long)]
        page: Option<usize>,
        #[arg(long)]
        page_size: Option<usize>,
        #[arg(long)]
        patient: Option<String>,
        #[arg(long)]
        doctor: Option<String>,
        /// true, false or null
        #[arg(long)]
        medic_approved: Option<String>,
        /// true, false or null
        #[arg(long)]
        supervisor_approved: Option<String>,
    },
    /// Record the resident decision
    Approve {
        id: String,
        /// Reject instead of approve
        #[arg(long)]
        reject: bool,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Record, change or withdraw the supervisor review
    Review {
        id: String,
        #[arg(value_enum)]
        verdict: VerdictArg,
        #[arg(long)]
        observation: Option<String>,
    },
    /// Set the pertinence tag (admin only)
    Pertinence {
        id: String,
        #[arg(value_enum)]
        value: PertinenceArg,
    },
    /// Close the episode: Muerte, Hospitalización, Alta or Traslado
    Close { id: String, reason: String },
    /// Show the audit trail of a clinical attention
    History { id: String },
    /// Counts over all clinical attentions
    Summary,
}

fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

struct Context {
    cfg: Arc<CoreConfig>,
    locks: Arc<AttentionLocks>,
    actor_id: Option<String>,
    actor_role: Option<String>,
}

impl Context {
    fn actor(&self) -> anyhow::Result<Actor> {
        Ok(Actor::resolve(
            self.actor_id.as_deref(),
            self.actor_role.as_deref(),
        )?)
    }

    fn store(&self) -> AttentionService<Uninitialised> {
        AttentionService::new(self.cfg.clone(), self.locks.clone())
    }

    fn attention(&self, id: &str) -> anyhow::Result<AttentionService<Initialised>> {
        let id = ShardableUuid::parse(id)?;
        Ok(AttentionService::with_id(
            self.cfg.clone(),
            self.locks.clone(),
            id.uuid(),
        ))
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let Some(command) = cli.command else {
        println!("Use 'ulr --help' for commands");
        return Ok(());
    };

    if !cli.data_dir.exists() {
        anyhow::bail!("Data directory does not exist: {}", cli.data_dir.display());
    }
    let ctx = Context {
        cfg: Arc::new(CoreConfig::new(
            cli.data_dir,
            &cli.care_location,
            cli.namespace,
        )?),
        locks: Arc::new(AttentionLocks::new()),
        actor_id: cli.actor_id,
        actor_role: cli.actor_role,
    };

    match command {
        Commands::Create {
            patient_name,
            patient_identifier,
            doctor_name,
            diagnostic,
            ai_result,
        } => {
            let actor = ctx.actor()?;
            let (_, attention) = ctx.store().create(
                &actor,
                NewAttention {
                    patient_name,
                    patient_identifier,
                    doctor_name,
                    diagnostic,
                    ai_result,
                },
            )?;
            println!("Created clinical attention: {}", attention.id.simple());
        }
        Commands::Show { id } => print_attention(&ctx.attention(&id)?.read()?),
        Commands::List {
            page,
            page_size,
            patient,
            doctor,
            medic_approved,
            supervisor_approved,
        } => {
            let query = AttentionQuery {
                page,
                page_size,
                patient_search: patient,
                doctor_search: doctor,
                medic_approved: parse_filter(medic_approved)?,
                supervisor_approved: parse_filter(supervisor_approved)?,
            };
            let page = ctx.store().list(&query)?;
            if page.results.is_empty() {
                println!("No clinical attentions found.");
            }
            for a in &page.results {
                println!(
                    "{}  {}  {}  resident={}  supervisor={}  urgency_law={}{}",
                    a.id.simple(),
                    a.created_at.format("%Y-%m-%d %H:%M"),
                    a.patient.name,
                    nullable(a.medic_approved()),
                    nullable(a.supervisor_approved()),
                    nullable(derive_urgency_law_outcome(a).as_nullable()),
                    if a.is_closed() { "  [closed]" } else { "" },
                );
            }
            println!(
                "Page {} ({} of {} shown, page size {})",
                page.page, page.count, page.total, page.page_size
            );
        }
        Commands::Approve { id, reject, reason } => {
            let actor = ctx.actor()?;
            let attention = ctx
                .attention(&id)?
                .submit_resident_approval(&actor, !reject, reason)?;
            print_attention(&attention);
        }
        Commands::Review {
            id,
            verdict,
            observation,
        } => {
            let actor = ctx.actor()?;
            let verdict = match verdict {
                VerdictArg::Ratify => SupervisorVerdict::Ratify,
                VerdictArg::Object => SupervisorVerdict::Object,
                VerdictArg::Withdraw => SupervisorVerdict::Withdraw,
            };
            let attention = ctx
                .attention(&id)?
                .submit_supervisor_review(&actor, verdict, observation)?;
            print_attention(&attention);
        }
        Commands::Pertinence { id, value } => {
            let actor = ctx.actor()?;
            let value = match value {
                PertinenceArg::Pertinent => Pertinence::Pertinent,
                PertinenceArg::NotPertinent => Pertinence::NotPertinent,
                PertinenceArg::Pending => Pertinence::Pending,
            };
            let attention = ctx.attention(&id)?.set_pertinence(&actor, value)?;
            print_attention(&attention);
        }
        Commands::Close { id, reason } => {
            let actor = ctx.actor()?;
            let reason = reason.parse::<ClosingReason>()?;
            let attention = ctx.attention(&id)?.close_episode(&actor, Some(reason))?;
            print_attention(&attention);
        }
        Commands::History { id } => {
            for entry in ctx.attention(&id)?.history()? {
                println!(
                    "{}  {}  {:<10}  {} ({})  {}",
                    &entry.commit[..entry.commit.len().min(10)],
                    entry.at.format("%Y-%m-%d %H:%M:%S"),
                    entry.action,
                    entry.actor_id.as_deref().unwrap_or("-"),
                    entry.actor_role.as_deref().unwrap_or("-"),
                    entry.summary,
                );
            }
        }
        Commands::Summary => {
            let s = ctx.store().summary(&AttentionQuery::default());
            println!("Total: {} (open {}, closed {})", s.total, s.open, s.closed);
            println!(
                "Resident: pending {}, approved {}, rejected {}",
                s.resident_pending, s.resident_approved, s.resident_rejected
            );
            println!(
                "Supervisor: no observation {}, ratified {}, objected {}",
                s.supervisor_no_observation, s.supervisor_ratified, s.supervisor_objected
            );
            println!(
                "Urgency law: applies {}, does not apply {}, unresolved {}",
                s.urgency_law_applies, s.urgency_law_does_not_apply, s.urgency_law_unresolved
            );
            println!(
                "Pertinence: pertinent {}, not pertinent {}, pending {}",
                s.pertinent, s.not_pertinent, s.pertinence_pending
            );
            for (reason, count) in &s.by_closing_reason {
                println!("Closed by {reason}: {count}");
            }
        }
    }

    Ok(())
}

fn parse_filter(value: Option<String>) -> anyhow::Result<NullableFilter> {
    Ok(value
        .as_deref()
        .map(str::parse::<NullableFilter>)
        .transpose()?
        .unwrap_or_default())
}

fn nullable(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "true",
        Some(false) => "false",
        None => "null",
    }
}

fn print_attention(a: &ClinicalAttention) {
    println!("ID:           {}", a.id.simple());
    println!("Created:      {} by {}", a.created_at.to_rfc3339(), a.created_by);
    println!("Patient:      {} ({})", a.patient.name, a.patient.identifier);
    println!("Doctor:       {}", a.doctor_name);
    if let Some(diagnostic) = &a.diagnostic {
        println!("Diagnostic:   {diagnostic}");
    }
    println!("AI result:    {}", nullable(a.ai_result));
    match a.resident.decision() {
        Some(d) => println!(
            "Resident:     {} by {} ({})",
            nullable(a.medic_approved()),
            d.decided_by,
            d.reason
        ),
        None => println!("Resident:     pending"),
    }
    match (a.supervisor_approved(), a.supervisor.reviewed_by()) {
        (Some(v), Some(by)) => println!("Supervisor:   {} by {}", nullable(Some(v)), by),
        _ => println!("Supervisor:   no observation"),
    }
    if let Some(observation) = a.supervisor.observation() {
        println!("Observation:  {observation}");
    }
    println!("Pertinence:   {}", a.pertinence.label());
    println!(
        "Urgency law:  {}",
        nullable(derive_urgency_law_outcome(a).as_nullable())
    );
    if let Some(c) = &a.closure {
        println!("Closed:       {} by {} at {}", c.reason, c.closed_by, c.closed_at.to_rfc3339());
    }
}
