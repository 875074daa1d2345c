use hashbrown::HashMap;
use log::debug;

use crate::error::ScheduleError;
use crate::models::{ProblemRequest, RoomType, SessionKind, Weekday};

#[derive(Debug, Clone)]
pub struct Room {
    pub room_num: String,
    pub capacity: u32,
    pub room_type: RoomType,
}

#[derive(Debug, Clone)]
pub struct Lecturer {
    pub staff_no: String,
    pub department_id: u64,
    pub preferred_days: Vec<Weekday>,
}

#[derive(Debug, Clone)]
pub struct Subject {
    pub course_id: u64,
    pub has_lab: bool,
}

#[derive(Debug, Clone)]
pub struct Batch {
    pub batch_code: String,
    pub course_id: u64,
    pub year: u32,
    pub semester: u32,
    pub headcount: u32,
}

/// One session that has to be placed on the timetable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Demand {
    pub batch_code: String,
    pub subject_code: String,
    pub kind: SessionKind,
}

/// Read-only lookup tables for one generation run.
///
/// Rooms and lecturers are kept sorted by key so that every deterministic
/// scan (repair, fallbacks) visits them in the same order.
#[derive(Debug, Clone)]
pub struct ProblemInstance {
    rooms: Vec<Room>,
    lecturers: Vec<Lecturer>,
    batches: Vec<Batch>,
    room_index: HashMap<String, usize>,
    lecturer_index: HashMap<String, usize>,
    batch_index: HashMap<String, usize>,
    subjects: HashMap<String, Subject>,
    course_department: HashMap<u64, u64>,
    batch_subjects: HashMap<String, Vec<String>>,
}

impl ProblemInstance {
    pub fn build(request: &ProblemRequest) -> Result<Self, ScheduleError> {
        let mut rooms: Vec<Room> = Vec::with_capacity(request.rooms.len());
        for room in &request.rooms {
            if room.capacity == 0 {
                return Err(malformed(format!("room {} has zero capacity", room.room_num)));
            }
            rooms.push(Room {
                room_num: room.room_num.clone(),
                capacity: room.capacity,
                room_type: room.room_type,
            });
        }
        rooms.sort_by(|a, b| a.room_num.cmp(&b.room_num));
        let room_index = index_unique(rooms.iter().map(|r| r.room_num.as_str()), "room")?;

        let mut course_department = HashMap::new();
        for course in &request.courses {
            if course_department
                .insert(course.course_id, course.department_id)
                .is_some()
            {
                return Err(malformed(format!("duplicate course {}", course.course_id)));
            }
        }

        let mut lecturers: Vec<Lecturer> = request
            .lecturers
            .iter()
            .map(|l| Lecturer {
                staff_no: l.staff_no.clone(),
                department_id: l.department_id,
                preferred_days: l.preferred_days.clone(),
            })
            .collect();
        lecturers.sort_by(|a, b| a.staff_no.cmp(&b.staff_no));
        let lecturer_index =
            index_unique(lecturers.iter().map(|l| l.staff_no.as_str()), "lecturer")?;

        let mut subjects = HashMap::new();
        for subject in &request.subjects {
            if !course_department.contains_key(&subject.course_id) {
                return Err(malformed(format!(
                    "subject {} references unknown course {}",
                    subject.subject_code, subject.course_id
                )));
            }
            let previous = subjects.insert(
                subject.subject_code.clone(),
                Subject {
                    course_id: subject.course_id,
                    has_lab: subject.has_lab,
                },
            );
            if previous.is_some() {
                return Err(malformed(format!("duplicate subject {}", subject.subject_code)));
            }
        }

        let mut batches = Vec::with_capacity(request.batches.len());
        for batch in &request.batches {
            if !course_department.contains_key(&batch.course_id) {
                return Err(malformed(format!(
                    "batch {} references unknown course {}",
                    batch.batch_code, batch.course_id
                )));
            }
            if batch.headcount == 0 {
                return Err(malformed(format!("batch {} has zero headcount", batch.batch_code)));
            }
            batches.push(Batch {
                batch_code: batch.batch_code.clone(),
                course_id: batch.course_id,
                year: batch.year,
                semester: batch.semester,
                headcount: batch.headcount,
            });
        }
        let batch_index = index_unique(batches.iter().map(|b| b.batch_code.as_str()), "batch")?;

        let mut batch_subjects: HashMap<String, Vec<String>> = HashMap::new();
        for link in &request.batch_subjects {
            if !batch_index.contains_key(&link.batch_code) {
                return Err(malformed(format!(
                    "batch-subject link references unknown batch {}",
                    link.batch_code
                )));
            }
            if !subjects.contains_key(&link.subject_code) {
                return Err(malformed(format!(
                    "batch-subject link references unknown subject {}",
                    link.subject_code
                )));
            }
            let required = batch_subjects.entry(link.batch_code.clone()).or_default();
            if !required.contains(&link.subject_code) {
                required.push(link.subject_code.clone());
            }
        }

        Ok(Self {
            rooms,
            lecturers,
            batches,
            room_index,
            lecturer_index,
            batch_index,
            subjects,
            course_department,
            batch_subjects,
        })
    }

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    pub fn lecturers(&self) -> &[Lecturer] {
        &self.lecturers
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub fn room(&self, room_num: &str) -> Option<&Room> {
        self.room_index.get(room_num).map(|&i| &self.rooms[i])
    }

    pub fn lecturer(&self, staff_no: &str) -> Option<&Lecturer> {
        self.lecturer_index.get(staff_no).map(|&i| &self.lecturers[i])
    }

    pub fn batch(&self, batch_code: &str) -> Option<&Batch> {
        self.batch_index.get(batch_code).map(|&i| &self.batches[i])
    }

    pub fn subject(&self, subject_code: &str) -> Option<&Subject> {
        self.subjects.get(subject_code)
    }

    pub fn room_capacity(&self, room_num: &str) -> Option<u32> {
        self.room(room_num).map(|r| r.capacity)
    }

    pub fn batch_course(&self, batch_code: &str) -> Option<u64> {
        self.batch(batch_code).map(|b| b.course_id)
    }

    pub fn batch_headcount(&self, batch_code: &str) -> Option<u32> {
        self.batch(batch_code).map(|b| b.headcount)
    }

    pub fn preferred_days(&self, staff_no: &str) -> &[Weekday] {
        self.lecturer(staff_no)
            .map(|l| l.preferred_days.as_slice())
            .unwrap_or(&[])
    }

    pub fn subject_department(&self, subject_code: &str) -> Option<u64> {
        let subject = self.subject(subject_code)?;
        self.course_department.get(&subject.course_id).copied()
    }

    pub fn required_subjects(&self, batch_code: &str) -> &[String] {
        self.batch_subjects
            .get(batch_code)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Batches in input order, each with its required subjects expanded into
    /// a lecture demand plus a lab demand for lab subjects.
    pub fn demands(&self) -> Vec<Demand> {
        let mut demands = Vec::new();
        for batch in &self.batches {
            let before = demands.len();
            for subject_code in self.required_subjects(&batch.batch_code) {
                demands.push(Demand {
                    batch_code: batch.batch_code.clone(),
                    subject_code: subject_code.clone(),
                    kind: SessionKind::Lecture,
                });
                if self.subject(subject_code).is_some_and(|s| s.has_lab) {
                    demands.push(Demand {
                        batch_code: batch.batch_code.clone(),
                        subject_code: subject_code.clone(),
                        kind: SessionKind::Lab,
                    });
                }
            }
            debug!(
                "batch {} (course {}, year {} semester {}): {} sessions",
                batch.batch_code,
                batch.course_id,
                batch.year,
                batch.semester,
                demands.len() - before
            );
        }
        demands
    }
}

fn malformed(message: String) -> ScheduleError {
    ScheduleError::MalformedInstance(message)
}

fn index_unique<'a>(
    keys: impl Iterator<Item = &'a str>,
    entity: &str,
) -> Result<HashMap<String, usize>, ScheduleError> {
    let mut index = HashMap::new();
    for (i, key) in keys.enumerate() {
        if index.insert(key.to_owned(), i).is_some() {
            return Err(malformed(format!("duplicate {entity} {key}")));
        }
    }
    Ok(index)
}
