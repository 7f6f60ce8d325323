use super::enums::TaskState;
use super::task::Task;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// A flattened row for rendering the task list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatRow {
    /// Index into the active task slice
    pub task_index: usize,
    /// Depth in the subtask tree (0 = top level)
    pub depth: usize,
    /// Whether this is the last child of its parent
    pub is_last: bool,
}

/// Flatten the active set into display order.
///
/// Tasks whose parent is active are listed directly under that parent, in active-set
/// order. Tasks whose parent is missing (completed or deleted) are shown at top level
/// in their own position.
pub fn flatten_tasks(tasks: &[Task]) -> Vec<FlatRow> {
    let active: HashSet<Uuid> = tasks.iter().map(|t| t.id).collect();

    let mut children: HashMap<Uuid, Vec<usize>> = HashMap::new();
    let mut roots = Vec::new();
    for (idx, task) in tasks.iter().enumerate() {
        match task.parent_id {
            Some(parent) if parent != task.id && active.contains(&parent) => {
                children.entry(parent).or_default().push(idx)
            }
            _ => roots.push(idx),
        }
    }

    let mut rows = Vec::with_capacity(tasks.len());
    let mut visited = HashSet::new();
    for idx in roots {
        push_subtree(tasks, &children, idx, 0, false, &mut visited, &mut rows);
    }

    // Anything left over sits in a parent loop; show it flat rather than hide it
    for (idx, task) in tasks.iter().enumerate() {
        if !visited.contains(&task.id) {
            push_subtree(tasks, &children, idx, 0, false, &mut visited, &mut rows);
        }
    }

    rows
}

fn push_subtree(
    tasks: &[Task],
    children: &HashMap<Uuid, Vec<usize>>,
    idx: usize,
    depth: usize,
    is_last: bool,
    visited: &mut HashSet<Uuid>,
    rows: &mut Vec<FlatRow>,
) {
    let task = &tasks[idx];
    if !visited.insert(task.id) {
        return;
    }
    rows.push(FlatRow {
        task_index: idx,
        depth,
        is_last,
    });

    if let Some(kids) = children.get(&task.id) {
        for (pos, &child) in kids.iter().enumerate() {
            push_subtree(tasks, children, child, depth + 1, pos + 1 == kids.len(), visited, rows);
        }
    }
}

/// Format seconds as "MM:SS", or "H:MM:SS" past the hour
pub fn format_clock(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

/// Format seconds as "Xh Ym" (omits 0 values)
pub fn format_duration(seconds: i64) -> String {
    let total_minutes = seconds.max(0) / 60;
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;

    if hours > 0 && minutes > 0 {
        format!("{}h {}m", hours, minutes)
    } else if hours > 0 {
        format!("{}h", hours)
    } else {
        format!("{}m", minutes)
    }
}

/// Choose progress glyph based on elapsed/estimate ratio
pub fn progress_glyph(ratio: f64, use_emoji: bool) -> &'static str {
    if use_emoji {
        if ratio < 0.25 {
            "🌱"
        } else if ratio < 1.0 {
            "🌿"
        } else {
            "🌵"
        }
    } else if ratio < 0.25 {
        "*"
    } else if ratio < 1.0 {
        "+"
    } else {
        "!"
    }
}

/// Get status badge text
pub fn status_badge(state: TaskState) -> &'static str {
    match state {
        TaskState::Ongoing => "⏱ ONGOING",
        TaskState::Paused => "⏸ PAUSED",
        TaskState::Backlog => "· BACKLOG",
        TaskState::Completed => "✓ DONE",
    }
}

/// Get tree connector for subtasks
pub fn tree_connector(is_last: bool) -> &'static str {
    if is_last {
        "└─"
    } else {
        "├─"
    }
}
