//! Message formatting: pure functions from task/member data to the Italian
//! text delivered on the chat channel.
//!
//! No I/O here. Every function is total: empty inputs produce an affirmative
//! message, absent optional fields are omitted rather than rendered as a
//! placeholder.

use chrono::{Locale, NaiveDate};

use studiobot_proto::event::NotificationEvent;
use studiobot_proto::member::Member;
use studiobot_proto::task::{Priority, Task, TaskStatus};

/// Long-form Italian date, e.g. "lunedì 1 settembre 2026".
#[must_use]
pub fn long_date(date: NaiveDate) -> String {
    date.format_localized("%A %e %B %Y", Locale::it_IT)
        .to_string()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Italian label for a status.
#[must_use]
pub const fn status_label(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Todo => "da fare",
        TaskStatus::Inprogress => "in corso",
        TaskStatus::Done => "completato",
    }
}

/// Italian label for a priority.
#[must_use]
pub const fn priority_label(priority: Priority) -> &'static str {
    match priority {
        Priority::Low => "bassa",
        Priority::Medium => "media",
        Priority::High => "alta",
    }
}

/// "1 giorno" / "n giorni".
#[must_use]
pub fn days_phrase(days: i64) -> String {
    if days == 1 {
        "1 giorno".to_string()
    } else {
        format!("{days} giorni")
    }
}

/// One-line summary of a task for lists: title plus the optional due date.
fn task_line(task: &Task) -> String {
    let mut line = format!("• {}", task.title);
    if let Some(due) = task.due_date {
        line.push_str(&format!(" (scadenza {})", long_date(due)));
    }
    line
}

/// Renders one notification event.
#[must_use]
pub fn event_message(event: &NotificationEvent) -> String {
    match event {
        NotificationEvent::NewTask(task) => new_task(task),
        NotificationEvent::StatusChanged { task, old, new } => status_changed(task, *old, *new),
        NotificationEvent::NewAssignment { task, added } => new_assignment(task, added),
    }
}

/// Announcement for a freshly created, assigned task.
#[must_use]
pub fn new_task(task: &Task) -> String {
    let mut msg = format!("🆕 Nuovo task: *{}*", task.title);
    if !task.assigned_to.is_empty() {
        msg.push_str(&format!("\nAssegnato a: {}", task.assigned_to.join(", ")));
    }
    if let Some(due) = task.due_date {
        msg.push_str(&format!("\nScadenza: {}", long_date(due)));
    }
    if task.priority == Priority::High {
        msg.push_str("\n❗ Priorità alta");
    }
    msg
}

/// Announcement for a status transition.
#[must_use]
pub fn status_changed(task: &Task, old: TaskStatus, new: TaskStatus) -> String {
    match new {
        TaskStatus::Done => format!("✅ Task completato: *{}*", task.title),
        TaskStatus::Inprogress => format!("🔄 Task in lavorazione: *{}*", task.title),
        TaskStatus::Todo => format!(
            "↩️ Task riaperto: *{}* ({} → {})",
            task.title,
            status_label(old),
            status_label(new)
        ),
    }
}

/// Announcement for newly added assignees.
#[must_use]
pub fn new_assignment(task: &Task, added: &[String]) -> String {
    let mut msg = format!("👤 {} su: *{}*", assignment_lead(added), task.title);
    if let Some(due) = task.due_date {
        msg.push_str(&format!("\nScadenza: {}", long_date(due)));
    }
    msg
}

fn assignment_lead(added: &[String]) -> String {
    match added {
        [one] => format!("{one} è stato assegnato"),
        many => format!("{} sono stati assegnati", many.join(", ")),
    }
}

/// Morning digest: today's tasks grouped by member, plus the overdue tail.
///
/// With nothing due and nothing overdue, renders an affirmative message.
#[must_use]
pub fn daily_digest(today: NaiveDate, groups: &[(String, Vec<Task>)], overdue: &[Task]) -> String {
    if groups.is_empty() && overdue.is_empty() {
        return format!(
            "☀️ Buongiorno! Nessun task in scadenza oggi, {}. Buon lavoro!",
            long_date(today)
        );
    }
    let mut msg = format!("☀️ Buongiorno! Task in scadenza oggi, {}:", long_date(today));
    for (name, tasks) in groups {
        msg.push_str(&format!("\n\n*{name}*"));
        for task in tasks {
            msg.push_str(&format!("\n{}", task_line(task)));
        }
    }
    if !overdue.is_empty() {
        msg.push_str("\n\n⚠️ In ritardo:");
        for task in overdue {
            let mut line = format!("\n• {}", task.title);
            if let Some(due) = task.due_date {
                let late = (today - due).num_days();
                line.push_str(&format!(" ({} di ritardo)", days_phrase(late)));
            }
            msg.push_str(&line);
        }
    }
    msg
}

/// Evening warning about tasks due tomorrow.
#[must_use]
pub fn deadline_warning(tomorrow: NaiveDate, tasks: &[Task]) -> String {
    if tasks.is_empty() {
        return "🌙 Nessuna scadenza domani. Buona serata!".to_string();
    }
    let mut msg = format!("⏰ Promemoria: in scadenza domani, {}:", long_date(tomorrow));
    for task in tasks {
        msg.push_str(&format!("\n• {}", task.title));
        if !task.assigned_to.is_empty() {
            msg.push_str(&format!(" — {}", task.assigned_to.join(", ")));
        }
    }
    msg
}

/// Monday digest for the week `[from, to]`.
#[must_use]
pub fn weekly_digest(from: NaiveDate, to: NaiveDate, groups: &[(String, Vec<Task>)]) -> String {
    if groups.is_empty() {
        return "📅 Settimana libera: nessun task in scadenza. Buon lunedì!".to_string();
    }
    let mut msg = format!(
        "📅 Task della settimana ({} – {}):",
        long_date(from),
        long_date(to)
    );
    for (name, tasks) in groups {
        msg.push_str(&format!("\n\n*{name}*"));
        for task in tasks {
            msg.push_str(&format!("\n{}", task_line(task)));
        }
    }
    msg
}

/// First-of-month digest for the month starting at `first`.
#[must_use]
pub fn monthly_digest(first: NaiveDate, groups: &[(String, Vec<Task>)]) -> String {
    let month = first
        .format_localized("%B %Y", Locale::it_IT)
        .to_string();
    if groups.is_empty() {
        return format!("🗓️ Nessun task in scadenza a {month}.");
    }
    let mut msg = format!("🗓️ Task in scadenza a {month}:");
    for (name, tasks) in groups {
        msg.push_str(&format!("\n\n*{name}*"));
        for task in tasks {
            msg.push_str(&format!("\n{}", task_line(task)));
        }
    }
    msg
}

/// Full list of open tasks.
#[must_use]
pub fn task_list(tasks: &[Task]) -> String {
    if tasks.is_empty() {
        return "📋 Nessun task aperto. Tutto fatto!".to_string();
    }
    let mut msg = format!("📋 Task aperti ({}):", tasks.len());
    for task in tasks {
        msg.push_str(&format!(
            "\n• {} [{}]",
            task.title,
            status_label(task.status)
        ));
        if !task.assigned_to.is_empty() {
            msg.push_str(&format!(" — {}", task.assigned_to.join(", ")));
        }
    }
    msg
}

/// Detail card for a single task.
#[must_use]
pub fn task_detail(task: &Task) -> String {
    let mut msg = format!(
        "📌 *{}*\nStato: {}\nPriorità: {}",
        task.title,
        status_label(task.status),
        priority_label(task.priority)
    );
    if let Some(owner) = &task.owner {
        msg.push_str(&format!("\nResponsabile: {owner}"));
    }
    if !task.assigned_to.is_empty() {
        msg.push_str(&format!("\nAssegnato a: {}", task.assigned_to.join(", ")));
    }
    if let Some(due) = task.due_date {
        msg.push_str(&format!("\nScadenza: {}", long_date(due)));
    }
    if let Some(description) = &task.description {
        if !description.is_empty() {
            msg.push_str(&format!("\n\n{description}"));
        }
    }
    if !task.checklist.is_empty() {
        msg.push_str("\n\nChecklist:");
        for item in &task.checklist {
            let mark = if item.done { "✔" } else { "○" };
            msg.push_str(&format!("\n{mark} {}", item.text));
            if let Some(assignee) = &item.assignee {
                msg.push_str(&format!(" ({assignee})"));
            }
        }
    }
    msg
}

/// Per-member workload report.
#[must_use]
pub fn report(today: NaiveDate, members: &[Member], tasks: &[Task]) -> String {
    let open: Vec<&Task> = tasks.iter().filter(|t| t.is_open()).collect();
    let mut msg = format!("📊 Report del {}:", long_date(today));
    if open.is_empty() {
        msg.push_str("\nNessun task aperto. Tutto fatto!");
        return msg;
    }
    for member in members {
        let theirs: Vec<&&Task> = open
            .iter()
            .filter(|t| t.assigned_to.contains(&member.name))
            .collect();
        msg.push_str(&format!("\n\n*{}* — {} aperti", member.name, theirs.len()));
        for task in theirs {
            msg.push_str(&format!(
                "\n• {} [{}]",
                task.title,
                status_label(task.status)
            ));
        }
    }
    let unassigned: Vec<&&Task> = open.iter().filter(|t| t.assigned_to.is_empty()).collect();
    if !unassigned.is_empty() {
        msg.push_str(&format!("\n\n*Non assegnati* — {}", unassigned.len()));
        for task in unassigned {
            msg.push_str(&format!("\n• {}", task.title));
        }
    }
    msg
}

/// Reply when a title query matched more than one task. No mutation happened.
#[must_use]
pub fn disambiguation(query: &str, matches: &[Task]) -> String {
    let mut msg = format!(
        "🤔 Ho trovato {} task per \"{query}\". Quale intendi?",
        matches.len()
    );
    for task in matches {
        msg.push_str(&format!(
            "\n• {} [{}]",
            task.title,
            status_label(task.status)
        ));
    }
    msg
}

/// Reply when a checklist query matched items on more than one task.
#[must_use]
pub fn checklist_disambiguation(query: &str, matches: &[(Task, String)]) -> String {
    let mut msg = format!(
        "🤔 Ho trovato {} voci per \"{query}\". Quale intendi?",
        matches.len()
    );
    for (task, item_text) in matches {
        msg.push_str(&format!("\n• {item_text} (in *{}*)", task.title));
    }
    msg
}

/// Reply when the store could not be reached for a command.
#[must_use]
pub fn store_trouble() -> String {
    "⚠️ Archivio non raggiungibile al momento, riprova tra poco.".to_string()
}

/// Reply when a title query matched nothing.
#[must_use]
pub fn not_found(query: &str) -> String {
    format!("🔍 Nessun task trovato per \"{query}\".")
}

/// Confirmation after marking a task done.
#[must_use]
pub fn confirm_done(task: &Task) -> String {
    format!("✅ Fatto! *{}* segnato come completato.", task.title)
}

/// Confirmation after starting a task.
#[must_use]
pub fn confirm_started(task: &Task) -> String {
    format!("🔄 Ok, *{}* è ora in lavorazione.", task.title)
}

/// Confirmation after ticking a checklist item.
#[must_use]
pub fn confirm_checklist_done(task: &Task, item_text: &str) -> String {
    format!(
        "☑️ Voce \"{item_text}\" completata su *{}*.",
        task.title
    )
}

/// Informational reply when the task was already done.
#[must_use]
pub fn already_done(task: &Task) -> String {
    format!("ℹ️ *{}* è già completato.", task.title)
}

/// Informational reply when the task was already in progress.
#[must_use]
pub fn already_started(task: &Task) -> String {
    format!("ℹ️ *{}* è già in lavorazione.", task.title)
}

/// Command reference.
#[must_use]
pub fn help() -> String {
    "🤖 Comandi disponibili:\n\
     !oggi — task in scadenza oggi\n\
     !settimana — task della settimana\n\
     !mese — task del mese\n\
     !lista — tutti i task aperti\n\
     !task <nome> — dettaglio di un task\n\
     !fatto <nome> — segna un task come completato\n\
     !inizia <nome> — segna un task come in lavorazione\n\
     !fatto-a <nome> — completa una voce di checklist\n\
     !report — carico di lavoro per persona\n\
     !help — questo messaggio"
        .to_string()
}
