use crate::types::GoalEvent;

/// Emit a goal event as a single JSON line to stdout.
pub fn report_goal(event: &GoalEvent) {
    if let Ok(json) = serde_json::to_string(event) {
        println!("{json}");
    }
}
