//! Blocker relations between tasks and cycle detection.

use crate::types::Task;
use std::collections::{HashMap, HashSet, VecDeque};

/// Whether making `task_id` wait on `blocker_id` would close a cycle.
///
/// A cycle exists if `blocker_id` already (transitively) waits on `task_id`.
pub fn would_create_cycle(tasks: &[Task], task_id: &str, blocker_id: &str) -> bool {
    if task_id == blocker_id {
        return true;
    }

    let edges: HashMap<&str, &[String]> = tasks
        .iter()
        .map(|t| (t.id.as_str(), t.dependencies.as_slice()))
        .collect();

    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    queue.push_back(blocker_id);

    while let Some(current) = queue.pop_front() {
        if current == task_id {
            return true;
        }
        if !visited.insert(current) {
            continue;
        }

        for dep in edges.get(current).copied().unwrap_or_default() {
            if !visited.contains(dep.as_str()) {
                queue.push_back(dep.as_str());
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Priority;
    use chrono::DateTime;

    fn task(id: &str, deps: &[&str]) -> Task {
        let ts = DateTime::from_timestamp(0, 0).unwrap();
        Task {
            id: id.into(),
            user_id: "u".into(),
            title: id.into(),
            description: String::new(),
            status: "todo".into(),
            position: 0,
            priority: Priority::Medium,
            tags: vec![],
            subtasks: vec![],
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
            due_date: None,
            started_at: None,
            completed_at: None,
            last_moved_at: None,
            recurring: None,
            archived: false,
            comment_count: 0,
            created_at: ts,
            updated_at: ts,
        }
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        assert!(would_create_cycle(&[task("a", &[])], "a", "a"));
    }

    #[test]
    fn detects_transitive_cycle() {
        // c waits on b, b waits on a; a waiting on c closes the loop.
        let tasks = vec![task("a", &[]), task("b", &["a"]), task("c", &["b"])];
        assert!(would_create_cycle(&tasks, "a", "c"));
        assert!(!would_create_cycle(&tasks, "c", "a"));
    }

    #[test]
    fn tolerates_dangling_references() {
        let tasks = vec![task("a", &["ghost"])];
        assert!(!would_create_cycle(&tasks, "b", "a"));
    }
}
