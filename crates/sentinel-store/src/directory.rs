use sentinel_core::{Subject, SubjectDirectory, SentinelResult, VehicleAttributes};
use std::sync::RwLock;

use crate::error::StoreError;

/// In-memory stand-in for the external identity directory.
///
/// Matches the subject id, national id or staff code, ignoring ASCII case.
#[derive(Default)]
pub struct InMemoryDirectory {
    subjects: RwLock<Vec<Subject>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subjects(subjects: Vec<Subject>) -> Self {
        Self {
            subjects: RwLock::new(subjects),
        }
    }

    /// Directory pre-populated with the demo roster used by the CLI.
    pub fn demo() -> Self {
        Self::with_subjects(demo_subjects())
    }

    /// Add or replace a subject keyed by its id.
    pub fn insert(&self, subject: Subject) -> SentinelResult<()> {
        let mut subjects = self
            .subjects
            .write()
            .map_err(|e| StoreError::LockPoisoned(format!("directory: {}", e)))?;
        subjects.retain(|s| s.id != subject.id);
        subjects.push(subject);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.subjects.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SubjectDirectory for InMemoryDirectory {
    fn resolve(&self, identifier: &str) -> SentinelResult<Option<Subject>> {
        let needle = identifier.trim();
        if needle.is_empty() {
            return Ok(None);
        }
        let subjects = self
            .subjects
            .read()
            .map_err(|e| StoreError::LockPoisoned(format!("directory: {}", e)))?;
        let found = subjects.iter().find(|s| {
            s.id.as_str().eq_ignore_ascii_case(needle)
                || s.national_id
                    .as_deref()
                    .is_some_and(|n| n.eq_ignore_ascii_case(needle))
                || s.staff_code
                    .as_deref()
                    .is_some_and(|c| c.eq_ignore_ascii_case(needle))
        });
        Ok(found.cloned())
    }
}

fn demo_subjects() -> Vec<Subject> {
    let mut connor = Subject::guest("V-1001", "Sarah Connor");
    connor.national_id = Some("890101-14-5566".into());
    connor.vehicle = Some(VehicleAttributes {
        plate_number: "WAA 1234".into(),
        model: Some("Toyota Camry".into()),
    });

    let mut doe = Subject::guest("V-1003", "John Doe");
    doe.national_id = Some("950505-10-1234".into());

    let mut bond = Subject::guest("V-1005", "James Bond");
    bond.national_id = Some("000707-01-0007".into());

    let mut officer = Subject::staff("S-2001", "Officer PB-2001");
    officer.staff_code = Some("PB-2001".into());

    vec![connor, doe, bond, officer]
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::SubjectClass;

    #[test]
    fn test_resolve_by_id_national_and_staff_code() {
        let dir = InMemoryDirectory::demo();
        assert_eq!(dir.len(), 4);

        let by_id = dir.resolve("v-1003").unwrap().unwrap();
        assert_eq!(by_id.display_name, "John Doe");

        let by_ic = dir.resolve("000707-01-0007").unwrap().unwrap();
        assert_eq!(by_ic.id.as_str(), "V-1005");

        let by_staff = dir.resolve("pb-2001").unwrap().unwrap();
        assert_eq!(by_staff.class, SubjectClass::Staff);
    }

    #[test]
    fn test_resolve_unknown_and_blank() {
        let dir = InMemoryDirectory::demo();
        assert!(dir.resolve("X-9999").unwrap().is_none());
        assert!(dir.resolve("   ").unwrap().is_none());
    }

    #[test]
    fn test_insert_replaces_existing() {
        let dir = InMemoryDirectory::new();
        assert!(dir.is_empty());
        dir.insert(Subject::guest("G-1", "First")).unwrap();
        dir.insert(Subject::guest("G-1", "Renamed")).unwrap();
        assert_eq!(dir.len(), 1);
        assert_eq!(dir.resolve("G-1").unwrap().unwrap().display_name, "Renamed");
    }
}
