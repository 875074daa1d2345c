use std::sync::Mutex;

use hashbrown::HashMap;

use crate::models::{ClassSession, Weekday};

/// Natural key of a persisted class: (lecturer, room, batch, weekday, start).
type SessionKey = (String, String, String, Weekday, u8);

/// Where generated timetables end up.
pub trait SessionStore: Send + Sync {
    /// Inserts or overwrites the session sharing its natural key.
    fn upsert(&self, session: &ClassSession);

    fn list(&self) -> Vec<ClassSession>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: Mutex<HashMap<SessionKey, ClassSession>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn key(session: &ClassSession) -> SessionKey {
    (
        session.lecturer.clone(),
        session.room.clone(),
        session.batch_code.clone(),
        session.weekday,
        session.start_time,
    )
}

impl SessionStore for MemoryStore {
    fn upsert(&self, session: &ClassSession) {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.insert(key(session), session.clone());
    }

    /// Ordered by weekday, start time, then room.
    fn list(&self) -> Vec<ClassSession> {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let mut listed: Vec<ClassSession> = sessions.values().cloned().collect();
        listed.sort_by(|a, b| {
            (a.weekday, a.start_time, &a.room, &a.batch_code)
                .cmp(&(b.weekday, b.start_time, &b.room, &b.batch_code))
        });
        listed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionKind;

    fn session(id: u32, day: Weekday, start: u8, room: &str) -> ClassSession {
        ClassSession {
            id,
            lecturer: "L1".into(),
            subject_code: "CS101".into(),
            room: room.into(),
            batch_code: "B1".into(),
            kind: SessionKind::Lecture,
            weekday: day,
            start_time: start,
            end_time: start + 2,
        }
    }

    #[test]
    fn upsert_is_idempotent_on_natural_key() {
        let store = MemoryStore::new();
        store.upsert(&session(1, Weekday::Monday, 8, "R1"));
        store.upsert(&session(1, Weekday::Monday, 8, "R1"));

        let mut renamed = session(7, Weekday::Monday, 8, "R1");
        renamed.subject_code = "CS102".into();
        store.upsert(&renamed);

        let listed = store.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].subject_code, "CS102");
    }

    #[test]
    fn lists_in_timetable_order() {
        let store = MemoryStore::new();
        store.upsert(&session(1, Weekday::Wednesday, 8, "R1"));
        store.upsert(&session(2, Weekday::Monday, 14, "R1"));
        store.upsert(&session(3, Weekday::Monday, 8, "R2"));

        let ids: Vec<u32> = store.list().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }
}
