use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Department {
    #[serde(rename = "학과명")]
    pub name: String,
    #[serde(rename = "소속대학")]
    pub college: String,
    #[serde(rename = "건물호실")]
    pub room: String,
    #[serde(rename = "전화번호")]
    pub phone: String,
    #[serde(rename = "웹사이트")]
    pub website: String,
    #[serde(rename = "평균학점")]
    pub avg_gpa: f64,
    #[serde(rename = "학생목록")]
    pub students: Vec<StudentRecord>,
    #[serde(rename = "학생회장")]
    pub council_president: String,
}

/// A roster entry. Only `GPA` is required; `attributes` holds every field,
/// `GPA` included, in dataset order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct StudentRecord {
    pub gpa: f64,
    pub attributes: Map<String, Value>,
}

impl StudentRecord {
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}

impl TryFrom<Map<String, Value>> for StudentRecord {
    type Error = String;

    fn try_from(attributes: Map<String, Value>) -> Result<Self, Self::Error> {
        let gpa = attributes
            .get("GPA")
            .and_then(Value::as_f64)
            .ok_or_else(|| "student record is missing a numeric GPA".to_string())?;
        Ok(Self { gpa, attributes })
    }
}

impl From<StudentRecord> for Map<String, Value> {
    fn from(record: StudentRecord) -> Self {
        record.attributes
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartmentSummary {
    pub name: String,
    pub college: String,
    pub room: String,
    pub phone: String,
    pub website: String,
    pub avg_gpa: f64,
    pub student_count: usize,
    pub council_president: String,
}

impl From<&Department> for DepartmentSummary {
    fn from(department: &Department) -> Self {
        Self {
            name: department.name.clone(),
            college: department.college.clone(),
            room: department.room.clone(),
            phone: department.phone.clone(),
            website: department.website.clone(),
            avg_gpa: department.avg_gpa,
            student_count: department.students.len(),
            council_president: department.council_president.clone(),
        }
    }
}

/// Roster of one department with the positions of its highest and lowest GPA.
#[derive(Debug, Clone, Serialize)]
pub struct RosterView<'a> {
    pub department: &'a str,
    pub students: &'a [StudentRecord],
    pub highest_gpa: Option<usize>,
    pub lowest_gpa: Option<usize>,
}

impl<'a> RosterView<'a> {
    pub fn new(department: &'a str, students: &'a [StudentRecord]) -> Self {
        let mut highest: Option<usize> = None;
        let mut lowest: Option<usize> = None;

        for (idx, student) in students.iter().enumerate() {
            if highest.map_or(true, |best| student.gpa > students[best].gpa) {
                highest = Some(idx);
            }
            if lowest.map_or(true, |worst| student.gpa < students[worst].gpa) {
                lowest = Some(idx);
            }
        }

        Self {
            department,
            students,
            highest_gpa: highest,
            lowest_gpa: lowest,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }
}
