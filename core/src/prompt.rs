use chrono::{DateTime, Utc};

/// Default instruction for a search-grounded assistant, stamped with `now`
/// so the model can reason about recency.
pub fn default_system_prompt(now: DateTime<Utc>) -> String {
    format!(
        "You are a Google search-based chatbot. Always provide the most up-to-date \
         information and cite sources.\nToday is {}",
        format_date_time(now)
    )
}

fn format_date_time(now: DateTime<Utc>) -> String {
    now.format("%A, %B %-d, %Y at %H:%M UTC").to_string()
}
