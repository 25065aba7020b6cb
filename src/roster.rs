use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// One configured teacher. The index is the stable 0-based ordinal used as
/// the foreign key for rating records; it is assigned from list position and
/// never persisted in the store.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub index: i64,
    pub name: String,
    pub subject: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RosterEntry {
    name: String,
    subject: String,
}

/// The fixed teacher list, immutable for the process lifetime.
#[derive(Debug, Clone)]
pub struct Roster {
    teachers: Vec<Teacher>,
}

impl Roster {
    /// Load the roster from a JSON file (an array of `{name, subject}`
    /// entries, indexed by position), or fall back to the built-in list.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let entries = match path {
            Some(p) => {
                let text = std::fs::read_to_string(p)
                    .with_context(|| format!("failed to read roster file {}", p.display()))?;
                serde_json::from_str::<Vec<RosterEntry>>(&text)
                    .with_context(|| format!("failed to parse roster file {}", p.display()))?
            }
            None => default_entries(),
        };
        anyhow::ensure!(!entries.is_empty(), "roster must contain at least one teacher");

        let teachers = entries
            .into_iter()
            .enumerate()
            .map(|(i, e)| Teacher {
                index: i as i64,
                name: e.name,
                subject: e.subject,
            })
            .collect();
        Ok(Self { teachers })
    }

    pub fn get(&self, index: i64) -> Option<&Teacher> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.teachers.get(i))
    }

    pub fn len(&self) -> usize {
        self.teachers.len()
    }
}

fn default_entries() -> Vec<RosterEntry> {
    [
        ("Ms Anuradha Singh", "DBMS"),
        ("Mr Krishna", "Software Engineering"),
        ("Mr Anurag Tripathi", "Computer Graphic"),
        ("Mr Ramu Padey", "Operation Research"),
    ]
    .into_iter()
    .map(|(name, subject)| RosterEntry {
        name: name.to_string(),
        subject: subject.to_string(),
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_file(prefix: &str, contents: &str) -> PathBuf {
        let p = std::env::temp_dir().join(format!(
            "{}-{}.json",
            prefix,
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        std::fs::write(&p, contents).expect("write temp roster");
        p
    }

    #[test]
    fn default_roster_has_four_indexed_teachers() {
        let roster = Roster::load(None).expect("default roster");
        assert_eq!(roster.len(), 4);
        assert_eq!(roster.get(0).map(|t| t.subject.as_str()), Some("DBMS"));
        assert_eq!(roster.get(3).map(|t| t.index), Some(3));
        assert!(roster.get(4).is_none());
        assert!(roster.get(-1).is_none());
    }

    #[test]
    fn roster_file_entries_are_indexed_by_position() {
        let p = temp_file(
            "rateboard-roster",
            r#"[{"name": "A", "subject": "Math"}, {"name": "B", "subject": "Physics"}]"#,
        );
        let roster = Roster::load(Some(&p)).expect("roster from file");
        assert_eq!(roster.len(), 2);
        assert_eq!(roster.get(1).map(|t| t.name.as_str()), Some("B"));
        let _ = std::fs::remove_file(p);
    }

    #[test]
    fn empty_roster_file_is_rejected() {
        let p = temp_file("rateboard-roster-empty", "[]");
        assert!(Roster::load(Some(&p)).is_err());
        let _ = std::fs::remove_file(p);
    }
}
