use serde::{Deserialize, Serialize};

/// Functional class of an application, as reported to the tracking server.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityCategory {
    Browser,
    Development,
    Productivity,
    Communication,
    Entertainment,
    System,
    Other,
}

// Checked in order; the first list with a match decides the category.
const CATEGORY_KEYWORDS: &[(ActivityCategory, &[&str])] = &[
    (
        ActivityCategory::Browser,
        &["chrome", "firefox", "msedge", "opera", "iexplore", "brave"],
    ),
    (
        ActivityCategory::Development,
        &[
            "code",
            "idea",
            "pycharm",
            "visual studio",
            "eclipse",
            "android studio",
            "xcode",
        ],
    ),
    (
        ActivityCategory::Productivity,
        &[
            "excel", "word", "powerpoint", "outlook", "onenote", "acrobat", "notepad",
        ],
    ),
    (
        ActivityCategory::Communication,
        &["teams", "slack", "zoom", "skype", "discord", "telegram"],
    ),
    (
        ActivityCategory::Entertainment,
        &["spotify", "netflix", "vlc", "itunes", "steam", "epic"],
    ),
    (
        ActivityCategory::System,
        &[
            "explorer",
            "cmd",
            "powershell",
            "task manager",
            "control panel",
            "settings",
        ],
    ),
];

/// Classifies a process by case-insensitive substring match of its name or
/// window title against the keyword tables. The executable path is accepted
/// for parity with the record format but does not participate in matching.
pub fn categorize(
    process_name: &str,
    window_title: &str,
    _application_path: &str,
) -> ActivityCategory {
    let name = process_name.to_lowercase();
    let title = window_title.to_lowercase();

    for (category, keywords) in CATEGORY_KEYWORDS {
        if keywords
            .iter()
            .any(|keyword| name.contains(keyword) || title.contains(keyword))
        {
            return *category;
        }
    }

    ActivityCategory::Other
}

/// An application counts as productive when its category is work-related.
pub fn is_productive(category: ActivityCategory) -> bool {
    matches!(
        category,
        ActivityCategory::Development
            | ActivityCategory::Productivity
            | ActivityCategory::Communication
    )
}
