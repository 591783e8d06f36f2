// Macros
#[macro_use]
extern crate clap;
#[macro_use]
extern crate prettytable;

// Std
use std::env;

// Crates
use anyhow::{anyhow, bail, Context, Result};
use chrono::{Duration, Local, NaiveDate, Utc};
use clap::{Arg, ArgAction, ArgMatches, Command};
use dotenv::dotenv;
use http::StatusCode;
use prettytable::{color, Attr, Cell, Row, Table};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tokio::time::{interval, Duration as TickDuration};

// Local
use momentum::api::ErrorBody;
use momentum::dashboard::{ActivitySummary, WeeklyDashboard};
use momentum::google::tasks::tasks_changed;
use momentum::google::TaskItem;
use momentum::metrics::{cell_heat, realized_in_target_units};
use momentum::models::{
    Activity, ActivityGoal, ActivityType, EntryInput, GoalInput, Id, NewActivity, NewActivityGoal,
    ReflectionInput, ReorderInput, ToggleInput,
};
use momentum::timer::{self, StopOutcome, TimerStatus, TimerSync, POLL_INTERVAL_SECS};
use momentum::week::{parse_date, week_start, DATE_FORMAT};

struct Api {
    client: Client,
    base_url: String,
}

impl Api {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.url(path))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client.post(self.url(path))
    }

    fn delete(&self, path: &str) -> RequestBuilder {
        self.client.delete(self.url(path))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let res = request
            .send()
            .await
            .with_context(|| format!("Could not reach {}", self.base_url))?;
        read_json(res).await
    }

    async fn activities(&self) -> Result<Vec<Activity>> {
        self.send(self.get("/api/activities")).await
    }

    /// Look an activity up by id or, failing that, by name (case-insensitive).
    async fn resolve(&self, key: &str) -> Result<Activity> {
        let activities = self.activities().await?;
        let by_id = key
            .parse::<Id>()
            .ok()
            .and_then(|id| activities.iter().find(|a| a.id == id));
        by_id
            .or_else(|| {
                activities
                    .iter()
                    .find(|a| a.name.eq_ignore_ascii_case(key.trim()))
            })
            .cloned()
            .ok_or_else(|| anyhow!("No active activity matches '{}'", key))
    }
}

async fn read_json<T: DeserializeOwned>(res: Response) -> Result<T> {
    let status = res.status();
    if status.is_success() {
        return res.json::<T>().await.context("Unexpected response body");
    }
    if status == StatusCode::UNAUTHORIZED {
        bail!("Not signed in to Google. Sign in from the web dashboard first.");
    }
    let message = res
        .json::<ErrorBody>()
        .await
        .map(|body| body.error)
        .unwrap_or_else(|_| status.to_string());
    bail!("{} ({})", message, status.as_u16())
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn date_arg() -> Arg {
    Arg::new("date")
        .short('d')
        .long("date")
        .value_name("YYYY-MM-DD")
        .help("Day to use instead of today.")
}

fn activity_arg() -> Arg {
    Arg::new("activity")
        .required(true)
        .help("Activity id or name.")
}

fn cli() -> Command {
    let timer_action = |name: &'static str, about: &'static str| {
        Command::new(name)
            .about(about)
            .arg(activity_arg())
            .arg(date_arg())
    };

    Command::new("momentum")
        .version(crate_version!())
        .about("Weekly habit tracking from the terminal.")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("week")
                .about("Print the weekly dashboard.")
                .arg(
                    Arg::new("offset")
                        .short('o')
                        .long("offset")
                        .value_parser(value_parser!(i64))
                        .default_value("0")
                        .help("Weeks back from the current one."),
                )
                .arg(
                    Arg::new("reflections")
                        .short('r')
                        .long("reflections")
                        .action(ArgAction::SetTrue)
                        .help("Also print each activity's reflection."),
                ),
        )
        .subcommand(
            Command::new("log")
                .about("Set a day's value: minutes for time activities, a count otherwise.")
                .arg(activity_arg())
                .arg(
                    Arg::new("value")
                        .required(true)
                        .value_parser(value_parser!(f64)),
                )
                .arg(date_arg()),
        )
        .subcommand(
            Command::new("goal")
                .about("Set this week's target: hours for time activities, a count otherwise.")
                .arg(activity_arg())
                .arg(
                    Arg::new("target")
                        .required(true)
                        .value_parser(value_parser!(f64)),
                )
                .arg(
                    Arg::new("minutes")
                        .long("minutes")
                        .action(ArgAction::SetTrue)
                        .help("The target is in minutes."),
                ),
        )
        .subcommand(
            Command::new("reflect")
                .about("Write this week's reflection for an activity.")
                .arg(activity_arg())
                .arg(Arg::new("text").required(true)),
        )
        .subcommand(
            Command::new("add")
                .about("Create an activity.")
                .arg(Arg::new("name").required(true))
                .arg(
                    Arg::new("count")
                        .short('c')
                        .long("count")
                        .action(ArgAction::SetTrue)
                        .help("Track a count instead of time."),
                )
                .arg(Arg::new("unit").short('u').long("unit").help("Target unit."))
                .arg(
                    Arg::new("target")
                        .short('t')
                        .long("target")
                        .value_parser(value_parser!(f64))
                        .help("Weekly target for the current week."),
                )
                .arg(
                    Arg::new("minutes")
                        .long("minutes")
                        .action(ArgAction::SetTrue)
                        .help("The target is in minutes."),
                ),
        )
        .subcommand(Command::new("list").about("List activities."))
        .subcommand(
            Command::new("remove")
                .about("Remove an activity. Its history is kept.")
                .arg(activity_arg()),
        )
        .subcommand(
            Command::new("move")
                .about("Move an activity into another's position.")
                .arg(Arg::new("from").required(true))
                .arg(Arg::new("to").required(true)),
        )
        .subcommand(
            Command::new("move-end")
                .about("Move an activity to the bottom.")
                .arg(activity_arg()),
        )
        .subcommand(
            Command::new("subgoal")
                .about("Manage this week's sub-goals.")
                .subcommand_required(true)
                .subcommand(
                    Command::new("add")
                        .arg(activity_arg())
                        .arg(Arg::new("text").required(true)),
                )
                .subcommand(Command::new("done").arg(id_arg()))
                .subcommand(Command::new("undo").arg(id_arg()))
                .subcommand(Command::new("rm").arg(id_arg())),
        )
        .subcommand(
            Command::new("timer")
                .about("Drive the shared stopwatch.")
                .subcommand_required(true)
                .subcommand(timer_action("start", "Start or resume the stopwatch."))
                .subcommand(timer_action("pause", "Pause the stopwatch."))
                .subcommand(timer_action("resume", "Resume a paused stopwatch."))
                .subcommand(timer_action("stop", "Stop and log the elapsed time."))
                .subcommand(timer_action("cancel", "Discard the stopwatch."))
                .subcommand(timer_action("status", "Show the stopwatch."))
                .subcommand(timer_action("watch", "Follow the stopwatch until it stops.")),
        )
        .subcommand(
            Command::new("tasks")
                .about("List the day's Google tasks.")
                .arg(
                    Arg::new("tomorrow")
                        .short('t')
                        .long("tomorrow")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("watch")
                        .short('w')
                        .long("watch")
                        .help("Keep polling and redraw when the list changes.")
                        .action(ArgAction::SetTrue),
                ),
        )
}

fn id_arg() -> Arg {
    Arg::new("id")
        .required(true)
        .value_parser(value_parser!(Id))
}

fn required<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("missing <{}>", name))
}

fn required_id(matches: &ArgMatches) -> Result<Id> {
    matches
        .get_one::<Id>("id")
        .copied()
        .ok_or_else(|| anyhow!("missing <id>"))
}

fn day(matches: &ArgMatches) -> Result<NaiveDate> {
    match matches.get_one::<String>("date") {
        Some(raw) => Ok(parse_date(raw)?),
        None => Ok(Local::now().date_naive()),
    }
}

async fn run() -> Result<()> {
    dotenv().ok();
    let base_url: String = env::var("BASE_URL").context("BASE_URL env var must be set!")?;
    let api = Api {
        client: Client::new(),
        base_url,
    };

    let matches = cli().get_matches();

    match matches.subcommand() {
        Some(("week", sub)) => {
            let offset = sub.get_one::<i64>("offset").copied().unwrap_or(0);
            print_week(&api, offset, sub.get_flag("reflections")).await
        }
        Some(("log", sub)) => {
            let activity = api.resolve(required(sub, "activity")?).await?;
            let entry = EntryInput {
                activity_id: activity.id,
                entry_date: day(sub)?,
                value_amount: sub.get_one::<f64>("value").copied().unwrap_or(0.0),
            };
            let _: serde_json::Value = api.send(api.post("/api/entries").json(&entry)).await?;
            println!("Logged {} for {} on {}.", entry.value_amount, activity.name, entry.entry_date);
            Ok(())
        }
        Some(("goal", sub)) => {
            let activity = api.resolve(required(sub, "activity")?).await?;
            let mut target = sub.get_one::<f64>("target").copied().unwrap_or(0.0);
            if sub.get_flag("minutes") && activity.activity_type == ActivityType::Time {
                target /= 60.0;
            }
            let goal = GoalInput {
                activity_id: activity.id,
                week_start_date: week_start(Local::now().date_naive()),
                target_value: target,
            };
            let _: serde_json::Value = api.send(api.post("/api/goals").json(&goal)).await?;
            println!("Target for {} set to {} {}.", activity.name, target, activity.target_unit);
            Ok(())
        }
        Some(("reflect", sub)) => {
            let activity = api.resolve(required(sub, "activity")?).await?;
            let reflection = ReflectionInput {
                activity_id: activity.id,
                week_start_date: week_start(Local::now().date_naive()),
                reflection_text: required(sub, "text")?.to_string(),
            };
            let _: serde_json::Value =
                api.send(api.post("/api/reflections").json(&reflection)).await?;
            println!("Reflection saved.");
            Ok(())
        }
        Some(("add", sub)) => {
            let new = NewActivity {
                name: required(sub, "name")?.to_string(),
                activity_type: if sub.get_flag("count") {
                    ActivityType::Count
                } else {
                    ActivityType::Time
                },
                target_unit: sub.get_one::<String>("unit").cloned(),
                initial_target: sub.get_one::<f64>("target").copied(),
                target_in_minutes: sub.get_flag("minutes"),
            };
            let created: Activity = api.send(api.post("/api/activities").json(&new)).await?;
            println!("Activity {} saved with id {}.", created.name, created.id);
            Ok(())
        }
        Some(("list", _)) => print_activities(&api).await,
        Some(("remove", sub)) => {
            let activity = api.resolve(required(sub, "activity")?).await?;
            let _: serde_json::Value = api
                .send(api.delete(&format!("/api/activities/{}", activity.id)))
                .await?;
            println!("Activity {} removed.", activity.name);
            Ok(())
        }
        Some(("move", sub)) => {
            let from = api.resolve(required(sub, "from")?).await?;
            let to = api.resolve(required(sub, "to")?).await?;
            let input = ReorderInput {
                from: from.id,
                to: to.id,
            };
            let _: Vec<Id> = api
                .send(api.post("/api/activities/reorder").json(&input))
                .await?;
            print_activities(&api).await
        }
        Some(("move-end", sub)) => {
            let activity = api.resolve(required(sub, "activity")?).await?;
            let _: Vec<Id> = api
                .send(api.post(&format!("/api/activities/{}/move_to_end", activity.id)))
                .await?;
            print_activities(&api).await
        }
        Some(("subgoal", sub)) => subgoal(&api, sub).await,
        Some(("timer", sub)) => timer_command(&api, sub).await,
        Some(("tasks", sub)) => {
            let mut date = Local::now().date_naive();
            if sub.get_flag("tomorrow") {
                date += Duration::days(1);
            }
            if sub.get_flag("watch") {
                watch_tasks(&api, date).await
            } else {
                let tasks = fetch_tasks(&api, date).await?;
                print_tasks(date, &tasks);
                Ok(())
            }
        }
        _ => Ok(()),
    }
}

async fn subgoal(api: &Api, matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("add", sub)) => {
            let activity = api.resolve(required(sub, "activity")?).await?;
            let goal = NewActivityGoal {
                activity_id: activity.id,
                week_start_date: week_start(Local::now().date_naive()),
                goal_text: required(sub, "text")?.to_string(),
            };
            let created: ActivityGoal =
                api.send(api.post("/api/activity_goals").json(&goal)).await?;
            println!("Sub-goal {} added to {}.", created.id, activity.name);
        }
        Some((action @ ("done" | "undo"), sub)) => {
            let id = required_id(sub)?;
            let toggle = ToggleInput {
                completed: action == "done",
            };
            let goal: ActivityGoal = api
                .send(
                    api.post(&format!("/api/activity_goals/{}/toggle", id))
                        .json(&toggle),
                )
                .await?;
            println!("{} {}", checkbox(goal.completed), goal.goal_text);
        }
        Some(("rm", sub)) => {
            let id = required_id(sub)?;
            let _: serde_json::Value = api
                .send(api.delete(&format!("/api/activity_goals/{}", id)))
                .await?;
            println!("Sub-goal deleted.");
        }
        _ => {}
    }
    Ok(())
}

async fn timer_command(api: &Api, matches: &ArgMatches) -> Result<()> {
    let (action, sub) = matches
        .subcommand()
        .ok_or_else(|| anyhow!("missing timer action"))?;
    let activity = api.resolve(required(sub, "activity")?).await?;
    let date = day(sub)?;
    let base = format!("/api/timer/{}/{}", activity.id, date.format(DATE_FORMAT));

    match action {
        "start" | "pause" | "resume" => {
            let timer: TimerSync = api.send(api.post(&format!("{}/{}", base, action))).await?;
            print_timer(&activity, &timer);
        }
        "stop" => {
            let outcome: StopOutcome = api.send(api.post(&format!("{}/stop", base))).await?;
            println!(
                "Logged {:.1} min to {}; {:.1} min on {}.",
                outcome.minutes_added, activity.name, outcome.total_minutes, outcome.for_date
            );
        }
        "cancel" => {
            let _: serde_json::Value = api.send(api.post(&format!("{}/cancel", base))).await?;
            println!("Timer for {} discarded.", activity.name);
        }
        "status" => {
            let status: TimerStatus = api.send(api.get(&base)).await?;
            match status.timer {
                Some(timer) => print_timer(&activity, &timer),
                None => println!("No timer for {} on {}.", activity.name, date),
            }
        }
        "watch" => watch_timer(api, &activity, &base).await?,
        other => bail!("unknown timer action '{}'", other),
    }
    Ok(())
}

fn print_timer(activity: &Activity, timer: &TimerSync) {
    let state = if timer.is_active { "running" } else { "paused" };
    println!(
        "{} {}: {} {}",
        activity.name,
        timer.for_date,
        state,
        timer::format_elapsed(timer.elapsed_seconds(Utc::now()))
    );
}

/// Re-read the shared record on every tick and keep the newer copy, until it disappears.
async fn watch_timer(api: &Api, activity: &Activity, base: &str) -> Result<()> {
    let mut local: Option<TimerSync> = None;
    let mut ticker = interval(TickDuration::from_secs(POLL_INTERVAL_SECS));

    loop {
        ticker.tick().await;
        let status: TimerStatus = api.send(api.get(base)).await?;
        let remote = match status.timer {
            Some(remote) => remote,
            None => {
                println!("Timer for {} stopped.", activity.name);
                return Ok(());
            }
        };

        local = timer::reconcile(local, Some(remote));
        if let Some(current) = &local {
            print_timer(activity, current);
        }
    }
}

async fn print_activities(api: &Api) -> Result<()> {
    let activities = api.activities().await?;

    let mut table = Table::new();
    table.add_row(row![Fb => "Id", "Name", "Type", "Unit"]);
    for activity in activities {
        let kind = match activity.activity_type {
            ActivityType::Time => "time",
            ActivityType::Count => "count",
        };
        table.add_row(row![activity.id, activity.name, kind, activity.target_unit]);
    }
    table.printstd();

    Ok(())
}

fn heat_color(level: u8) -> color::Color {
    match level {
        0 => color::WHITE,
        1 => color::CYAN,
        2 => color::BRIGHT_CYAN,
        3 => color::GREEN,
        4 => color::BRIGHT_GREEN,
        _ => color::BRIGHT_YELLOW,
    }
}

fn checkbox(completed: bool) -> &'static str {
    if completed {
        "[x]"
    } else {
        "[ ]"
    }
}

fn activity_row(index: usize, summary: &ActivitySummary) -> Row {
    let name_color = if index % 2 == 1 {
        color::MAGENTA
    } else {
        color::WHITE
    };

    let mut cells = vec![Cell::new(&summary.name).with_style(Attr::ForegroundColor(name_color))];
    for value in summary.daily_values.values() {
        let shown = realized_in_target_units(summary.activity_type, *value);
        let text = match summary.activity_type {
            ActivityType::Time => format!("{:.1}", shown),
            ActivityType::Count => format!("{}", shown),
        };
        let level = cell_heat(summary.activity_type, *value, summary.target_value);
        cells.push(Cell::new(&text).with_style(Attr::ForegroundColor(heat_color(level))));
    }

    let done = summary.realized_hours.unwrap_or(summary.realized_value);
    cells.push(Cell::new(&format!("{} {}", summary.target_value, summary.target_unit)));
    cells.push(Cell::new(&format!("{}", done)));
    cells.push(Cell::new(&format!("{}%", summary.progress_percentage)));
    cells.push(Cell::new(
        &summary
            .daily_goal_minutes
            .map_or_else(|| "-".to_string(), |m| format!("{}m", m)),
    ));
    Row::new(cells)
}

async fn print_week(api: &Api, offset: i64, with_reflections: bool) -> Result<()> {
    let today = Local::now().date_naive();
    let week = week_start(today) - Duration::weeks(offset);

    let path = format!(
        "/api/dashboard/{}?today={}",
        week.format(DATE_FORMAT),
        today.format(DATE_FORMAT)
    );
    let dashboard: WeeklyDashboard = api.send(api.get(&path)).await?;

    println!("{}", dashboard.week_label);

    let mut header = vec![Cell::new("Activity").with_style(Attr::Bold)];
    for date in &dashboard.week_dates {
        header.push(Cell::new(&date.format("%a %d").to_string()).with_style(Attr::Bold));
    }
    for title in ["Target", "Done", "Progress", "Today"] {
        header.push(Cell::new(title).with_style(Attr::Bold));
    }

    let mut table = Table::new();
    table.add_row(Row::new(header));
    for (index, summary) in dashboard.activities.iter().enumerate() {
        table.add_row(activity_row(index, summary));
    }
    table.printstd();

    let totals = &dashboard.weekly_summary;
    println!(
        "Time: {}h of {}h ({}%)",
        totals.total_realized_hours, totals.total_target_hours, totals.overall_percentage
    );

    for summary in &dashboard.activities {
        if summary.goals.is_empty() {
            continue;
        }
        println!("{}", summary.name);
        for goal in &summary.goals {
            println!("  {} {} (#{})", checkbox(goal.completed), goal.goal_text, goal.id);
        }
    }

    if with_reflections {
        let mut reflections = Table::new();
        reflections.add_row(row![Fb => "Activity", "Reflection"]);
        for summary in &dashboard.activities {
            reflections.add_row(row![summary.name, summary.reflection_text]);
        }
        reflections.printstd();
    }

    Ok(())
}

async fn fetch_tasks(api: &Api, date: NaiveDate) -> Result<Vec<TaskItem>> {
    let path = format!("/api/google/tasks?date={}", date.format(DATE_FORMAT));
    api.send(api.get(&path)).await
}

fn print_tasks(date: NaiveDate, tasks: &[TaskItem]) {
    if tasks.is_empty() {
        println!("No tasks due {}.", date);
        return;
    }

    let mut table = Table::new();
    table.add_row(row![Fb => "", "Task", "Notes"]);
    for task in tasks {
        table.add_row(row![
            checkbox(task.completed),
            task.title,
            task.description.as_deref().unwrap_or_default()
        ]);
    }
    table.printstd();
}

/// Poll the day's tasks and redraw only when something changed.
async fn watch_tasks(api: &Api, date: NaiveDate) -> Result<()> {
    let mut shown: Option<Vec<TaskItem>> = None;
    let mut ticker = interval(TickDuration::from_secs(POLL_INTERVAL_SECS));

    loop {
        ticker.tick().await;
        let next = fetch_tasks(api, date).await?;
        let changed = match &shown {
            Some(previous) => tasks_changed(previous, &next),
            None => true,
        };
        if changed {
            print_tasks(date, &next);
            shown = Some(next);
        }
    }
}
