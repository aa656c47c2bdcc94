//! Inbound chat commands.
//!
//! A small fixed vocabulary, Italian like the rest of the product. Parsing
//! and execution are separate: [`parse`] is pure, [`CommandHandler`] runs a
//! parsed command against the store and returns the reply text. Non-command
//! chatter returns `None` and is ignored.

use chrono::{Datelike, Days, NaiveDate, Utc};
use chrono_tz::Tz;

use studiobot_proto::task::{Task, TaskStatus};

use crate::format;
use crate::scheduler;
use crate::store::accessor::StoreAccessor;
use crate::store::TaskStore;

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `!oggi` — today's digest.
    Today,
    /// `!settimana` — this week's digest.
    Week,
    /// `!mese` — this month's digest.
    Month,
    /// `!lista` — all open tasks.
    List,
    /// `!fatto <name>` — mark a task done.
    Done(String),
    /// `!inizia <name>` — mark a task in progress.
    Start(String),
    /// `!fatto-a <name>` — tick a checklist item.
    ChecklistDone(String),
    /// `!task <name>` — task detail.
    Detail(String),
    /// `!report` — per-member workload.
    Report,
    /// `!help` — command reference.
    Help,
}

/// Parses one line of chat text. `None` for anything that is not a
/// well-formed command, including known commands missing their argument.
#[must_use]
pub fn parse(text: &str) -> Option<Command> {
    let trimmed = text.trim();
    if !trimmed.starts_with('!') {
        return None;
    }
    let (keyword, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((k, r)) => (k, r.trim()),
        None => (trimmed, ""),
    };
    let keyword = keyword.to_lowercase();

    let bare = |cmd: Command| if rest.is_empty() { Some(cmd) } else { None };
    let with_arg = |make: fn(String) -> Command| {
        if rest.is_empty() {
            None
        } else {
            Some(make(rest.to_string()))
        }
    };

    match keyword.as_str() {
        "!oggi" => bare(Command::Today),
        "!settimana" => bare(Command::Week),
        "!mese" => bare(Command::Month),
        "!lista" => bare(Command::List),
        "!report" => bare(Command::Report),
        "!help" => bare(Command::Help),
        "!fatto" => with_arg(Command::Done),
        "!inizia" => with_arg(Command::Start),
        "!fatto-a" => with_arg(Command::ChecklistDone),
        "!task" => with_arg(Command::Detail),
        _ => None,
    }
}

/// Executes parsed commands against the store.
pub struct CommandHandler<S> {
    accessor: StoreAccessor<S>,
    tz: Tz,
}

impl<S: TaskStore> CommandHandler<S> {
    pub fn new(accessor: StoreAccessor<S>, tz: Tz) -> Self {
        Self { accessor, tz }
    }

    /// Handles one line of chat text at the current date.
    pub async fn handle(&self, text: &str) -> Option<String> {
        let today = Utc::now().with_timezone(&self.tz).date_naive();
        self.handle_at(text, today).await
    }

    /// Handles one line of chat text with `today` fixed by the caller.
    ///
    /// Returns `None` for non-commands; every recognized command gets a
    /// reply, store failures included.
    pub async fn handle_at(&self, text: &str, today: NaiveDate) -> Option<String> {
        let command = parse(text)?;
        tracing::debug!(?command, "handling command");
        let reply = match command {
            Command::Today => scheduler::build_daily_digest(&self.accessor, today)
                .await
                .unwrap_or_else(|e| store_trouble(&e)),
            Command::Week => {
                let monday = week_start(today);
                scheduler::build_weekly_digest(&self.accessor, monday)
                    .await
                    .unwrap_or_else(|e| store_trouble(&e))
            }
            Command::Month => {
                let first = today.with_day(1).unwrap_or(today);
                scheduler::build_monthly_digest(&self.accessor, first)
                    .await
                    .unwrap_or_else(|e| store_trouble(&e))
            }
            Command::List => match self.accessor.open_tasks().await {
                Ok(tasks) => format::task_list(&tasks),
                Err(e) => store_trouble(&e),
            },
            Command::Report => self.report(today).await,
            Command::Help => format::help(),
            Command::Detail(query) => self.detail(&query).await,
            Command::Done(query) => self.mark_done(&query).await,
            Command::Start(query) => self.mark_started(&query).await,
            Command::ChecklistDone(query) => self.tick_checklist(&query).await,
        };
        Some(reply)
    }

    async fn report(&self, today: NaiveDate) -> String {
        let members = match self.accessor.members().await {
            Ok(m) => m,
            Err(e) => return store_trouble(&e),
        };
        match self.accessor.store().fetch_tasks().await {
            Ok(tasks) => format::report(today, &members, &tasks),
            Err(e) => store_trouble(&e),
        }
    }

    async fn detail(&self, query: &str) -> String {
        match self.find_by_title(query).await {
            Ok(matches) => match matches.as_slice() {
                [] => format::not_found(query),
                [task] => format::task_detail(task),
                many => format::disambiguation(query, many),
            },
            Err(e) => store_trouble(&e),
        }
    }

    async fn mark_done(&self, query: &str) -> String {
        match self.find_by_title(query).await {
            Ok(matches) => match matches.as_slice() {
                [] => format::not_found(query),
                [task] if task.status == TaskStatus::Done => format::already_done(task),
                [task] => match self
                    .accessor
                    .store()
                    .update_status(&task.id, TaskStatus::Done)
                    .await
                {
                    Ok(()) => format::confirm_done(task),
                    Err(e) => store_trouble(&e),
                },
                many => format::disambiguation(query, many),
            },
            Err(e) => store_trouble(&e),
        }
    }

    async fn mark_started(&self, query: &str) -> String {
        match self.find_by_title(query).await {
            Ok(matches) => match matches.as_slice() {
                [] => format::not_found(query),
                [task] if task.status == TaskStatus::Inprogress => format::already_started(task),
                [task] => match self
                    .accessor
                    .store()
                    .update_status(&task.id, TaskStatus::Inprogress)
                    .await
                {
                    Ok(()) => format::confirm_started(task),
                    Err(e) => store_trouble(&e),
                },
                many => format::disambiguation(query, many),
            },
            Err(e) => store_trouble(&e),
        }
    }

    async fn tick_checklist(&self, query: &str) -> String {
        let tasks = match self.accessor.store().fetch_tasks().await {
            Ok(t) => t,
            Err(e) => return store_trouble(&e),
        };
        let needle = query.to_lowercase();
        // Open items of open tasks whose text contains the query.
        let mut matches: Vec<(Task, usize, String)> = Vec::new();
        for task in tasks.into_iter().filter(Task::is_open) {
            for (index, item) in task.checklist.iter().enumerate() {
                if !item.done && item.text.to_lowercase().contains(&needle) {
                    matches.push((task.clone(), index, item.text.clone()));
                }
            }
        }
        match matches.as_slice() {
            [] => format::not_found(query),
            [(task, index, item_text)] => match self
                .accessor
                .store()
                .set_checklist_done(&task.id, *index)
                .await
            {
                Ok(()) => format::confirm_checklist_done(task, item_text),
                Err(e) => store_trouble(&e),
            },
            many => {
                let listed: Vec<(Task, String)> = many
                    .iter()
                    .map(|(task, _, text)| (task.clone(), text.clone()))
                    .collect();
                format::checklist_disambiguation(query, &listed)
            }
        }
    }

    /// Case-insensitive substring match over all task titles.
    async fn find_by_title(&self, query: &str) -> Result<Vec<Task>, crate::store::StoreError> {
        let needle = query.to_lowercase();
        let tasks = self.accessor.store().fetch_tasks().await?;
        Ok(tasks
            .into_iter()
            .filter(|t| t.title.to_lowercase().contains(&needle))
            .collect())
    }
}

fn store_trouble(error: &crate::store::StoreError) -> String {
    tracing::warn!(error = %error, "command failed against the store");
    format::store_trouble()
}

/// Monday of the week `today` falls in.
fn week_start(today: NaiveDate) -> NaiveDate {
    let back = u64::from(today.weekday().num_days_from_monday());
    today.checked_sub_days(Days::new(back)).unwrap_or(today)
}
