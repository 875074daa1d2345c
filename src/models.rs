use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
}

impl Weekday {
    pub const ALL: [Weekday; 5] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
    ];
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl FromStr for Weekday {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monday" | "mon" => Ok(Weekday::Monday),
            "tuesday" | "tue" => Ok(Weekday::Tuesday),
            "wednesday" | "wed" => Ok(Weekday::Wednesday),
            "thursday" | "thu" => Ok(Weekday::Thursday),
            "friday" | "fri" => Ok(Weekday::Friday),
            other => Err(format!("unknown weekday `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoomType {
    Classroom,
    Laboratory,
}

/// Lecture sessions run 2 hours, lab components 3 hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Lecture,
    Lab,
}

impl SessionKind {
    pub fn duration(self) -> u8 {
        match self {
            SessionKind::Lecture => 2,
            SessionKind::Lab => 3,
        }
    }

    pub fn room_type(self) -> RoomType {
        match self {
            SessionKind::Lecture => RoomType::Classroom,
            SessionKind::Lab => RoomType::Laboratory,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Optimize {
    #[default]
    Maximize,
    Minimize,
}

impl Optimize {
    /// True when `candidate` is strictly better than `incumbent`.
    pub fn beats(self, candidate: i64, incumbent: i64) -> bool {
        match self {
            Optimize::Maximize => candidate > incumbent,
            Optimize::Minimize => candidate < incumbent,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RoomRequest {
    pub room_num: String,
    pub capacity: u32,
    pub room_type: RoomType,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LecturerRequest {
    pub staff_no: String,
    pub department_id: u64,
    #[serde(default, deserialize_with = "weekday_list")]
    pub preferred_days: Vec<Weekday>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CourseRequest {
    pub course_id: u64,
    pub department_id: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SubjectRequest {
    pub subject_code: String,
    pub course_id: u64,
    #[serde(default)]
    pub has_lab: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BatchRequest {
    pub batch_code: String,
    pub course_id: u64,
    pub year: u32,
    pub semester: u32,
    pub headcount: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BatchSubjectRequest {
    pub batch_code: String,
    pub subject_code: String,
}

/// Raw entity lists as supplied by the data layer.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ProblemRequest {
    #[serde(default)]
    pub rooms: Vec<RoomRequest>,
    #[serde(default)]
    pub lecturers: Vec<LecturerRequest>,
    #[serde(default)]
    pub courses: Vec<CourseRequest>,
    #[serde(default)]
    pub subjects: Vec<SubjectRequest>,
    #[serde(default)]
    pub batches: Vec<BatchRequest>,
    #[serde(default)]
    pub batch_subjects: Vec<BatchSubjectRequest>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerateRequest {
    #[serde(flatten)]
    pub problem: ProblemRequest,
    #[serde(default)]
    pub parameters: GaParameters,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct GaParameters {
    pub population_size: usize,
    pub crossover_rate: f64,
    pub mutation_rate: f64,
    pub generations: usize,
    pub optimize: Optimize,
    pub seed: Option<u64>,
    pub time_limit_ms: Option<u64>,
}

impl Default for GaParameters {
    fn default() -> Self {
        Self {
            population_size: 100,
            crossover_rate: 0.9,
            mutation_rate: 0.1,
            generations: 100,
            optimize: Optimize::Maximize,
            seed: None,
            time_limit_ms: None,
        }
    }
}

/// One gene: a scheduled class session. Times are whole hours of the day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSession {
    pub id: u32,
    pub lecturer: String,
    pub subject_code: String,
    pub room: String,
    pub batch_code: String,
    pub kind: SessionKind,
    pub weekday: Weekday,
    pub start_time: u8,
    pub end_time: u8,
}

impl ClassSession {
    pub fn overlaps(&self, other: &ClassSession) -> bool {
        self.weekday == other.weekday
            && self.start_time < other.end_time
            && other.start_time < self.end_time
    }

    /// Two sessions collide when they overlap and share a room, lecturer or batch.
    pub fn collides_with(&self, other: &ClassSession) -> bool {
        self.overlaps(other)
            && (self.room == other.room
                || self.lecturer == other.lecturer
                || self.batch_code == other.batch_code)
    }
}

/// A (batch, subject, kind) demand that could not be given a lecturer or room.
#[derive(Debug, Clone, Serialize)]
pub struct Unassignable {
    pub batch_code: String,
    pub subject_code: String,
    pub kind: SessionKind,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutcome {
    pub fitness: i64,
    pub generations: usize,
    pub schedule: Vec<ClassSession>,
    pub unassignable: Vec<Unassignable>,
    pub unresolved: Vec<u32>,
    /// Best-so-far fitness after each generation.
    pub best_fitness_history: Vec<i64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct GenerationStatus {
    pub generation: usize,
    pub elapsed_time: Duration,
    pub current_fitness: i64,
    pub best_fitness: i64,
    pub unresolved_conflicts: usize,
    pub is_finished: bool,
}

/// Accepts `["Monday", "Friday"]` as well as the stored `"Monday, Friday"` form.
fn weekday_list<'de, D>(deserializer: D) -> Result<Vec<Weekday>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Days {
        List(Vec<String>),
        Joined(String),
    }

    let raw = match Days::deserialize(deserializer)? {
        Days::List(days) => days,
        Days::Joined(joined) => joined
            .split(',')
            .filter(|d| !d.trim().is_empty())
            .map(str::to_owned)
            .collect(),
    };

    let mut days = Vec::with_capacity(raw.len());
    for day in raw {
        let day = day.parse::<Weekday>().map_err(serde::de::Error::custom)?;
        if !days.contains(&day) {
            days.push(day);
        }
    }
    Ok(days)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preferred_days_accept_joined_string() {
        let lecturer: LecturerRequest = serde_json::from_str(
            r#"{"staff_no":"L1","department_id":1,"preferred_days":"Monday, wed, Monday"}"#,
        )
        .unwrap();
        assert_eq!(lecturer.preferred_days, vec![Weekday::Monday, Weekday::Wednesday]);
    }

    #[test]
    fn preferred_days_accept_list() {
        let lecturer: LecturerRequest = serde_json::from_str(
            r#"{"staff_no":"L1","department_id":1,"preferred_days":["Friday","Tuesday"]}"#,
        )
        .unwrap();
        assert_eq!(lecturer.preferred_days, vec![Weekday::Friday, Weekday::Tuesday]);
    }

    #[test]
    fn unknown_weekday_is_rejected() {
        let parsed = serde_json::from_str::<LecturerRequest>(
            r#"{"staff_no":"L1","department_id":1,"preferred_days":"Someday"}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn parameters_fill_defaults() {
        let params: GaParameters = serde_json::from_str(r#"{"generations": 5}"#).unwrap();
        assert_eq!(params.generations, 5);
        assert_eq!(params.population_size, 100);
        assert_eq!(params.crossover_rate, 0.9);
        assert_eq!(params.mutation_rate, 0.1);
        assert_eq!(params.optimize, Optimize::Maximize);
    }

    #[test]
    fn back_to_back_sessions_do_not_overlap() {
        let a = ClassSession {
            id: 1,
            lecturer: "L1".into(),
            subject_code: "S1".into(),
            room: "R1".into(),
            batch_code: "B1".into(),
            kind: SessionKind::Lecture,
            weekday: Weekday::Monday,
            start_time: 8,
            end_time: 10,
        };
        let mut b = a.clone();
        b.id = 2;
        b.start_time = 10;
        b.end_time = 12;
        assert!(!a.collides_with(&b));
        b.start_time = 9;
        b.end_time = 11;
        assert!(a.collides_with(&b));
    }
}
