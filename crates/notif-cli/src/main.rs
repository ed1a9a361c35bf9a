use std::io::Read as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;

use notif_config::EngineConfig;
use notif_core::{
    Action, AiScorer, BreakerStatus, NotificationEvent, Prioritizer, RulesEngine, Rule,
    SimulatedScorer,
};

#[derive(Parser)]
#[command(name = "notif-cli", about = "Notification prioritization engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate one NotificationEvent (JSON, file or stdin) and print the Decision.
    Evaluate {
        /// Path to a JSON-encoded NotificationEvent. Reads stdin if omitted.
        #[arg(short, long)]
        event: Option<PathBuf>,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print a user's filtered decision history.
    ///
    /// Since the engine keeps no on-disk state, history is built by replaying
    /// `--events` (one JSON NotificationEvent per line) through a fresh
    /// engine before filtering.
    History {
        #[arg(long)]
        user: String,
        #[arg(long)]
        action: Option<ActionArg>,
        #[arg(long, default_value_t = 50)]
        limit: usize,
        #[arg(long)]
        events: Option<PathBuf>,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Read one Rule (JSON) and print the resulting priority-ordered rule set.
    AddRule {
        #[arg(short, long)]
        rule: Option<PathBuf>,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print the current priority-ordered rule set.
    ListRules {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Force-dispatch bookkeeping: records an audit-trail override without
    /// re-running the pipeline. Actual delivery is external to this engine.
    Dispatch {
        #[arg(long)]
        event_id: String,
        #[arg(long)]
        user_id: String,
        /// The action already decided for this event (dispatch is bookkeeping,
        /// not re-evaluation, so the original action must be supplied).
        #[arg(long)]
        action: ActionArg,
        #[arg(long)]
        reason: String,
    },
    /// Report engine and component health: overall status plus the AI
    /// scorer's availability and circuit breaker state.
    Health {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print totals, by-action counts, and suppression/deferral rates.
    ///
    /// Replays `--events` through a fresh engine before reporting.
    Stats {
        #[arg(long)]
        events: Option<PathBuf>,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Run the eight illustrative scenarios against a fresh engine and print
    /// each Decision. Useful for manual verification and onboarding.
    Demo,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum ActionArg {
    Now,
    Later,
    Never,
}

impl From<ActionArg> for Action {
    fn from(a: ActionArg) -> Self {
        match a {
            ActionArg::Now => Action::Now,
            ActionArg::Later => Action::Later,
            ActionArg::Never => Action::Never,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Evaluate { event, config } => cmd_evaluate(event, config)?,
        Commands::History {
            user,
            action,
            limit,
            events,
            config,
        } => cmd_history(user, action, limit, events, config)?,
        Commands::AddRule { rule, config } => cmd_add_rule(rule, config)?,
        Commands::ListRules { config } => cmd_list_rules(config)?,
        Commands::Dispatch {
            event_id,
            user_id,
            action,
            reason,
        } => cmd_dispatch(event_id, user_id, action, reason)?,
        Commands::Health { config } => cmd_health(config)?,
        Commands::Stats { events, config } => cmd_stats(events, config)?,
        Commands::Demo => cmd_demo()?,
    }

    Ok(())
}

fn load_config(path: Option<PathBuf>) -> Result<EngineConfig> {
    match path {
        Some(p) => EngineConfig::load(&p).with_context(|| format!("loading {}", p.display())),
        None => Ok(EngineConfig::default()),
    }
}

/// Initializes the tracing subscriber from the resolved config. Relative log
/// file paths resolve against the config file's directory, or the current
/// directory when no `--config` was given. The returned guard must stay
/// alive for the duration of the command.
fn init_logging(config: &EngineConfig, config_path: &Option<PathBuf>) -> Result<Option<WorkerGuard>> {
    let base_dir = config_path
        .as_deref()
        .and_then(Path::parent)
        .unwrap_or_else(|| Path::new("."));
    notif_config::init_tracing(&config.logging, base_dir)
}

fn build_prioritizer(config: &EngineConfig) -> Result<Prioritizer> {
    let rules = match &config.rules_file {
        Some(path) => {
            let extra = notif_core::load_rules_from_file(path)
                .map_err(|e| anyhow::anyhow!("loading rules file {}: {e}", path.display()))?;
            RulesEngine::with_extra_rules(extra)
        }
        None => RulesEngine::new(),
    };
    let scorer = AiScorer::new(
        Box::new(SimulatedScorer::new()),
        config.ai.failure_threshold,
        config.ai.reset_timeout,
        config.ai.available,
        config.ai.call_timeout,
    );
    Ok(Prioritizer::new(rules, scorer))
}

fn read_event(path: Option<PathBuf>) -> Result<NotificationEvent> {
    let content = match path {
        Some(p) => std::fs::read_to_string(&p).with_context(|| format!("reading {}", p.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading event from stdin")?;
            buf
        }
    };
    serde_json::from_str(&content).context("parsing NotificationEvent JSON")
}

fn replay_events(prioritizer: &Prioritizer, events: Option<PathBuf>) -> Result<()> {
    let Some(path) = events else { return Ok(()) };
    let content = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    for (i, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let event: NotificationEvent = serde_json::from_str(line)
            .with_context(|| format!("parsing event on line {} of {}", i + 1, path.display()))?;
        prioritizer.evaluate(event);
    }
    Ok(())
}

fn cmd_evaluate(event: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path.clone())?;
    let _guard = init_logging(&config, &config_path)?;
    let prioritizer = build_prioritizer(&config)?;
    let event = read_event(event)?;
    let decision = prioritizer.evaluate(event);
    println!("{}", serde_json::to_string_pretty(&decision)?);
    Ok(())
}

fn cmd_history(
    user: String,
    action: Option<ActionArg>,
    limit: usize,
    events: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config_path.clone())?;
    let _guard = init_logging(&config, &config_path)?;
    let prioritizer = build_prioritizer(&config)?;
    replay_events(&prioritizer, events)?;
    let history = prioritizer
        .audit()
        .get_user_history(&user, action.map(Into::into), limit);
    println!("{}", serde_json::to_string_pretty(&history)?);
    Ok(())
}

fn cmd_add_rule(rule: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path.clone())?;
    let _guard = init_logging(&config, &config_path)?;
    let prioritizer = build_prioritizer(&config)?;
    let content = match rule {
        Some(p) => std::fs::read_to_string(&p).with_context(|| format!("reading {}", p.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf).context("reading rule from stdin")?;
            buf
        }
    };
    let rule: Rule = serde_json::from_str(&content).context("parsing Rule JSON")?;
    prioritizer.rules().add_rule(rule);
    println!("{}", serde_json::to_string_pretty(&prioritizer.rules().list_rules())?);
    Ok(())
}

fn cmd_list_rules(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path.clone())?;
    let _guard = init_logging(&config, &config_path)?;
    let prioritizer = build_prioritizer(&config)?;
    println!("{}", serde_json::to_string_pretty(&prioritizer.rules().list_rules())?);
    Ok(())
}

fn cmd_dispatch(event_id: String, user_id: String, action: ActionArg, reason: String) -> Result<()> {
    let reason = format!("[FORCE-DISPATCH OVERRIDE] {reason}");
    let decision = notif_core::Decision {
        event_id,
        user_id,
        action: action.into(),
        score: 0.0,
        reason,
        rule_matched: None,
        ai_used: false,
        fallback_mode: false,
        decided_at: chrono::Utc::now(),
        deferred_until: None,
    };
    println!("{}", serde_json::to_string_pretty(&decision)?);
    Ok(())
}

fn cmd_health(config: Option<PathBuf>) -> Result<()> {
    let config = load_config(config)?;
    let prioritizer = build_prioritizer(&config)?;

    let breaker_state = prioritizer.scorer_breaker_state();
    let scorer_ok = breaker_state != BreakerStatus::Open;
    let status = if scorer_ok { "ok" } else { "degraded" };

    println!(
        "{}",
        serde_json::json!({
            "status": status,
            "components": {
                "scorer": {
                    "ai_available": prioritizer.scorer_ai_available(),
                    "breaker_state": breaker_state.to_string(),
                    "fallback_mode": !prioritizer.scorer_ai_available() || !scorer_ok,
                },
                "rules": {
                    "status": "ok",
                    "rule_count": prioritizer.rules().list_rules().len(),
                },
                "store": { "status": "ok" },
            },
        })
    );
    Ok(())
}

fn cmd_stats(events: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path.clone())?;
    let _guard = init_logging(&config, &config_path)?;
    let prioritizer = build_prioritizer(&config)?;
    replay_events(&prioritizer, events)?;
    let stats = prioritizer.audit().stats();
    println!(
        "{}",
        serde_json::json!({
            "total": stats.total,
            "now": stats.now,
            "later": stats.later,
            "never": stats.never,
            "suppression_rate": stats.suppression_rate,
            "deferred_rate": stats.deferred_rate,
        })
    );
    Ok(())
}

fn cmd_demo() -> Result<()> {
    let config = EngineConfig::default();
    let _guard = init_logging(&config, &None)?;
    let prioritizer = build_prioritizer(&config)?;

    let scenarios: Vec<(&str, NotificationEvent)> = vec![
        (
            "security_alert critical",
            demo_event("u1", "security_alert", "push", Some("critical"), None, None, None),
        ),
        (
            "promotion low",
            demo_event("u1", "promotion", "push", Some("low"), Some("Sale"), None, None),
        ),
        (
            "dedupe_key first",
            demo_event("u2", "message", "push", None, Some("Hi"), Some("hello"), Some("k1")),
        ),
        (
            "dedupe_key repeat",
            demo_event("u2", "message", "push", None, Some("Hi"), Some("hello"), Some("k1")),
        ),
        (
            "near-duplicate first",
            demo_event("u2", "message", "push", None, Some("Sarah: Hey!"), Some("Sarah sent you a message"), None),
        ),
        (
            "near-duplicate repeat",
            demo_event("u2", "message", "push", None, Some("Sarah Hey"), Some("Sarah sent you a message"), None),
        ),
        (
            "quiet hours reminder",
            {
                let mut e = demo_event("u4", "reminder", "push", Some("medium"), None, None, None);
                e.metadata.insert("quiet_hours".into(), serde_json::Value::Bool(true));
                e
            },
        ),
        (
            "high-priority promotion",
            demo_event("u6", "promotion", "push", Some("high"), None, None, None),
        ),
    ];

    for (label, event) in scenarios {
        let decision = prioritizer.evaluate(event);
        println!(
            "{label}: action={} score={} reason={}",
            decision.action, decision.score, decision.reason
        );
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn demo_event(
    user_id: &str,
    event_type: &str,
    channel: &str,
    priority_hint: Option<&str>,
    title: Option<&str>,
    message: Option<&str>,
    dedupe_key: Option<&str>,
) -> NotificationEvent {
    use notif_core::PriorityHint;
    let priority_hint = priority_hint.map(|p| match p {
        "critical" => PriorityHint::Critical,
        "high" => PriorityHint::High,
        "low" => PriorityHint::Low,
        _ => PriorityHint::Medium,
    });
    NotificationEvent {
        id: None,
        user_id: user_id.to_string(),
        channel: channel.to_string(),
        event_type: event_type.to_string(),
        priority_hint,
        title: title.map(str::to_string),
        message: message.map(str::to_string),
        source: None,
        timestamp: None,
        expires_at: None,
        dedupe_key: dedupe_key.map(str::to_string),
        metadata: Default::default(),
    }
}
