//! Built-in text commands, matched exactly (case-insensitive, trimmed).

/// A recognized command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Erase every record for the identity.
    Erase,
    /// Clear the proactive schedule.
    StopCheckIns,
    /// Re-arm the proactive schedule.
    ResumeCheckIns,
    /// Capability summary.
    Help,
    /// Static crisis-resource text.
    CrisisResources,
    /// Today's journal entry count.
    JournalSummary,
}

/// Match a message against the command set.
pub fn parse(text: &str) -> Option<Command> {
    match text.trim().to_lowercase().as_str() {
        "forget me" | "delete my data" => Some(Command::Erase),
        "stop" | "stop check-ins" | "unsubscribe" => Some(Command::StopCheckIns),
        "resume" | "start check-ins" => Some(Command::ResumeCheckIns),
        "help" | "?" => Some(Command::Help),
        "crisis" | "help me" | "resources" => Some(Command::CrisisResources),
        "journal" => Some(Command::JournalSummary),
        _ => None,
    }
}

pub const HELP_TEXT: &str = "Here's what I can do:\n\
    • Just talk to me — I'm here to listen, day or night.\n\
    • Start a message with \"j:\" or \"journal:\" to save a journal entry.\n\
    • \"journal\" shows how much you've written today.\n\
    • \"stop\" pauses my daily check-ins, \"resume\" brings them back.\n\
    • \"crisis\" shows support resources right away.\n\
    • \"forget me\" deletes everything I know about you.";

pub const WELCOME_TEXT: &str = "Hi, I'm Ember. I'm here to keep you company — \
    to listen, check in, and help you journal. Everything you share stays \
    between us, and you can write \"help\" any time to see what I can do.";

pub const ERASED_TEXT: &str = "Done. I've deleted everything I knew about you. \
    If you ever want to start fresh, just say hi.";

pub const STOPPED_TEXT: &str = "Okay, I've paused my check-ins. Message me \
    whenever you like, and write \"resume\" if you want them back.";

pub const RESUMED_TEXT: &str = "Welcome back! I'll check in with you each \
    morning and nudge you about journaling in the evening.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_matches_case_insensitive_and_trimmed() {
        assert_eq!(parse("  Forget Me "), Some(Command::Erase));
        assert_eq!(parse("DELETE MY DATA"), Some(Command::Erase));
        assert_eq!(parse("stop"), Some(Command::StopCheckIns));
        assert_eq!(parse("Stop Check-ins"), Some(Command::StopCheckIns));
        assert_eq!(parse("unsubscribe"), Some(Command::StopCheckIns));
        assert_eq!(parse("resume"), Some(Command::ResumeCheckIns));
        assert_eq!(parse("start check-ins"), Some(Command::ResumeCheckIns));
        assert_eq!(parse("?"), Some(Command::Help));
        assert_eq!(parse("Help Me"), Some(Command::CrisisResources));
        assert_eq!(parse("resources"), Some(Command::CrisisResources));
        assert_eq!(parse("journal"), Some(Command::JournalSummary));
    }

    #[test]
    fn partial_matches_are_not_commands() {
        assert_eq!(parse("please stop doing that"), None);
        assert_eq!(parse("can you help"), None);
        assert_eq!(parse("journal: today was okay"), None);
        assert_eq!(parse("i need resources for school"), None);
    }
}
