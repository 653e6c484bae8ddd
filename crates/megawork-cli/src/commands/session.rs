use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use megawork_core::render::{cycle_plan_view, session_view, status_line};
use megawork_core::session::{
    CyclePlan, CycleReview, Debrief, Form, Level, Preparation, SessionEvent, StartMode, Target,
};
use megawork_core::storage::CycleRecord;
use megawork_core::{Config, Database, Event, SessionRunner, SessionState};
use serde::Serialize;

#[derive(Subcommand)]
pub enum SessionAction {
    /// Prepare and start a new session
    Start(StartArgs),
    /// Plan the current cycle
    Plan(PlanArgs),
    /// Review the work phase that just ended
    Review(ReviewArgs),
    /// Debrief the finished session
    Debrief(DebriefArgs),
    /// Show the session in progress
    Status {
        /// Print plain text instead of JSON
        #[arg(long)]
        text: bool,
    },
    /// List all sessions as JSON
    List,
}

#[derive(Args)]
pub struct StartArgs {
    /// What am I trying to accomplish?
    #[arg(long)]
    accomplish: String,
    /// Number of cycles (defaults to timer.num_cycles)
    #[arg(long)]
    cycles: Option<i64>,
    /// "now" starts a cycle right away, "group" joins the next shared cycle
    #[arg(long, default_value = "now")]
    start: StartMode,
    /// Why is this important and valuable?
    #[arg(long, default_value = "")]
    important: String,
    /// How will I know when this is complete?
    #[arg(long, default_value = "")]
    complete: String,
    /// Potential distractions and how to deal with them
    #[arg(long, default_value = "")]
    distractions: String,
    /// Is this concrete and measurable or subjective?
    #[arg(long, default_value = "")]
    measurable: String,
    /// Anything else noteworthy?
    #[arg(long, default_value = "")]
    noteworthy: String,
}

#[derive(Args)]
pub struct PlanArgs {
    /// What am I trying to accomplish this cycle?
    #[arg(long)]
    accomplish: String,
    /// How will I get started?
    #[arg(long, default_value = "")]
    started: String,
    /// Any hazards present?
    #[arg(long, default_value = "")]
    hazards: String,
    #[arg(long, default_value = "medium")]
    energy: Level,
    #[arg(long, default_value = "medium")]
    morale: Level,
}

#[derive(Args)]
pub struct ReviewArgs {
    /// Completed cycle's target? (yes, half, no)
    #[arg(long)]
    target: Target,
    #[arg(long, default_value = "")]
    noteworthy: String,
    #[arg(long, default_value = "")]
    distractions: String,
    /// Things to improve for next cycle
    #[arg(long, default_value = "")]
    improve: String,
}

#[derive(Args)]
pub struct DebriefArgs {
    /// Did you complete your session's targets? (yes, half, no)
    #[arg(long)]
    target: Target,
    /// What did I get done this session?
    #[arg(long, default_value = "")]
    done: String,
    /// What are the next steps?
    #[arg(long, default_value = "")]
    nextsteps: String,
    /// How did this compare to my normal work output?
    #[arg(long, default_value = "")]
    compare: String,
    /// Did I get bogged down? Where?
    #[arg(long, default_value = "")]
    bogged: String,
    /// What went well? How can I replicate this?
    #[arg(long, default_value = "")]
    replicate: String,
    /// Any other takeaways?
    #[arg(long, default_value = "")]
    takeaways: String,
}

#[derive(Serialize)]
struct SessionStatus {
    session_id: i64,
    state: SessionState,
    pending_form: Option<Form>,
    preparation: Preparation,
    timer: Event,
    cycles: Vec<CycleRecord>,
}

fn current(db: &Database) -> Result<SessionRunner<'_>, Box<dyn std::error::Error>> {
    SessionRunner::current(db)?.ok_or_else(|| "no session in progress".into())
}

fn print_events(events: &[Event]) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(events)?);
    Ok(())
}

pub fn run(
    action: SessionAction,
    at: Option<DateTime<Utc>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let now = at.unwrap_or_else(Utc::now);
    let db = Database::open()?;

    match action {
        SessionAction::Start(args) => {
            let config = Config::load()?;
            let prep = Preparation {
                num_cycles: args.cycles.unwrap_or(i64::from(config.timer.num_cycles)),
                start: args.start,
                accomplish: args.accomplish,
                important: args.important,
                complete: args.complete,
                distractions: args.distractions,
                measurable: args.measurable,
                noteworthy: args.noteworthy,
            };
            let (_, events) = SessionRunner::start(&db, prep, &config.timer, now)?;
            print_events(&events)?;
        }
        SessionAction::Plan(args) => {
            let mut runner = current(&db)?;
            let plan = CyclePlan {
                accomplish: args.accomplish,
                started: args.started,
                hazards: args.hazards,
                energy: args.energy,
                morale: args.morale,
            };
            print_events(&runner.submit(SessionEvent::PlanSubmitted(plan), now)?)?;
        }
        SessionAction::Review(args) => {
            let mut runner = current(&db)?;
            let review = CycleReview {
                target: args.target,
                noteworthy: args.noteworthy,
                distractions: args.distractions,
                improve: args.improve,
            };
            print_events(&runner.submit(SessionEvent::ReviewSubmitted(review), now)?)?;
        }
        SessionAction::Debrief(args) => {
            let mut runner = current(&db)?;
            let debrief = Debrief {
                target: args.target,
                done: args.done,
                nextsteps: args.nextsteps,
                compare: args.compare,
                bogged: args.bogged,
                replicate: args.replicate,
                takeaways: args.takeaways,
            };
            print_events(&runner.submit(SessionEvent::DebriefSubmitted(debrief), now)?)?;
        }
        SessionAction::Status { text } => {
            let mut runner = current(&db)?;
            runner.advance(now)?;
            let cycle = runner.cycle_at(now);
            let num_cycles = runner.timer().num_cycles();
            let cycles = runner.cycles()?;

            if text {
                println!("{}", session_view(&runner.record().preparation));
                if let Some(planned) = cycles.iter().find(|c| c.timer_id == cycle.timer_id) {
                    println!();
                    println!("{}", cycle_plan_view(&planned.plan));
                }
                println!();
                println!("{}", status_line(&cycle, num_cycles));
                if let Some(form) = runner.pending_form() {
                    println!("waiting for: {}", form.as_str());
                }
            } else {
                let status = SessionStatus {
                    session_id: runner.session_id(),
                    state: runner.state(),
                    pending_form: runner.pending_form(),
                    preparation: runner.record().preparation.clone(),
                    timer: Event::snapshot(&cycle, num_cycles, now),
                    cycles,
                };
                println!("{}", serde_json::to_string_pretty(&status)?);
            }
        }
        SessionAction::List => {
            let sessions = db.sessions()?;
            println!("{}", serde_json::to_string_pretty(&sessions)?);
        }
    }
    Ok(())
}
