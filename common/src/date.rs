use chrono::{Days, Local, NaiveDate};

/// Format a date the way the camera organises its day folders.
pub fn day_folder_name(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// The local date `days_ago` days before `today`.
pub fn date_before(today: NaiveDate, days_ago: u32) -> NaiveDate {
    today
        .checked_sub_days(Days::new(days_ago.into()))
        .unwrap_or(NaiveDate::MIN)
}

/// Day folder name for `days_ago` days before the current local date.
pub fn date_ago(days_ago: u32) -> String {
    day_folder_name(date_before(Local::now().date_naive(), days_ago))
}
