use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

use crate::storage::Entity;

/// Payloads that carry a plaintext password which must be hashed before it
/// leaves the handler.
pub trait Credentials {
    fn password_mut(&mut self) -> Option<&mut String> {
        None
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Admin {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub age: i32,
    pub status: String,
    pub login: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AdminPayload {
    pub full_name: String,
    pub email: String,
    pub age: i32,
    pub status: String,
    pub login: String,
    pub password: String,
}

impl Credentials for AdminPayload {
    fn password_mut(&mut self) -> Option<&mut String> {
        Some(&mut self.password)
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Branch {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BranchPayload {
    pub name: String,
    pub address: String,
}

impl Credentials for BranchPayload {}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub group_type: String,
    pub teacher_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GroupPayload {
    pub name: String,
    pub group_type: String,
    pub teacher_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
}

impl Credentials for GroupPayload {}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Lesson {
    pub id: Uuid,
    pub theme: String,
    pub group_id: Option<Uuid>,
    pub schedule_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LessonPayload {
    pub theme: String,
    pub group_id: Option<Uuid>,
    pub schedule_id: Option<Uuid>,
}

impl Credentials for LessonPayload {}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub price: f64,
    pub student_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
    pub admin_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PaymentPayload {
    pub price: f64,
    pub student_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
    pub admin_id: Option<Uuid>,
}

impl PaymentPayload {
    /// The student whose paid sum this payment increases, if any.
    pub fn credited_student(&self) -> Option<Uuid> {
        if self.price > 0.0 {
            self.student_id
        } else {
            None
        }
    }
}

impl Credentials for PaymentPayload {}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Schedule {
    pub id: Uuid,
    pub room: String,
    pub group_id: Option<Uuid>,
    pub teacher_id: Option<Uuid>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SchedulePayload {
    pub room: String,
    pub group_id: Option<Uuid>,
    pub teacher_id: Option<Uuid>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

impl Credentials for SchedulePayload {}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Student {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub age: i32,
    pub paid_sum: f64,
    pub status: String,
    pub login: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub group_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StudentPayload {
    pub full_name: String,
    pub email: String,
    pub age: i32,
    pub paid_sum: f64,
    pub status: String,
    pub login: String,
    pub password: String,
    pub group_id: Option<Uuid>,
}

impl Credentials for StudentPayload {
    fn password_mut(&mut self) -> Option<&mut String> {
        Some(&mut self.password)
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,
    pub label: String,
    pub score: i32,
    pub lesson_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
    pub deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TaskPayload {
    pub label: String,
    pub score: i32,
    pub lesson_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
    pub deadline: Option<DateTime<Utc>>,
}

impl Credentials for TaskPayload {}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Teacher {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub age: i32,
    pub status: String,
    pub login: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub branch_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TeacherPayload {
    pub full_name: String,
    pub email: String,
    pub age: i32,
    pub status: String,
    pub login: String,
    pub password: String,
    pub branch_id: Option<Uuid>,
}

impl Credentials for TeacherPayload {
    fn password_mut(&mut self) -> Option<&mut String> {
        Some(&mut self.password)
    }
}

/// One row of the admin payment report.
#[derive(Debug, Clone, Serialize)]
pub struct AdminPayment {
    pub admin: Admin,
    pub payment: Payment,
}

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;

/// A validated list request. `page` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub search: Option<String>,
    pub page: u32,
    pub limit: u32,
}

impl ListQuery {
    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.limit)
    }
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            search: None,
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Raw `?search=&page=&limit=` parameters. Anything unparsable falls back to
/// the defaults instead of rejecting the request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub search: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl ListParams {
    pub fn into_query(self) -> ListQuery {
        fn positive(raw: Option<String>, default: u32) -> u32 {
            raw.and_then(|value| value.trim().parse::<u32>().ok())
                .filter(|value| *value > 0)
                .unwrap_or(default)
        }

        ListQuery {
            search: self.search.filter(|search| !search.trim().is_empty()),
            page: positive(self.page, DEFAULT_PAGE),
            limit: positive(self.limit, DEFAULT_LIMIT),
        }
    }
}

/// A window of records plus the total number of matches.
///
/// Serializes as `{ "<plural>": [...], "count": n }`.
#[derive(Debug, Clone)]
pub struct Page<E> {
    pub items: Vec<E>,
    pub count: i64,
}

impl<E: Entity> Serialize for Page<E> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry(E::PLURAL, &self.items)?;
        map.serialize_entry("count", &self.count)?;
        map.end()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StudentLogin {
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(page: Option<&str>, limit: Option<&str>) -> ListParams {
        ListParams {
            search: None,
            page: page.map(str::to_string),
            limit: limit.map(str::to_string),
        }
    }

    #[test]
    fn list_params_fall_back_to_defaults() {
        assert_eq!(params(None, None).into_query(), ListQuery::default());
        assert_eq!(params(Some("abc"), Some("-3")).into_query(), ListQuery::default());
        assert_eq!(params(Some("0"), Some("0")).into_query(), ListQuery::default());
    }

    #[test]
    fn list_params_parse_page_and_limit() {
        let query = params(Some("2"), Some("25")).into_query();
        assert_eq!(query.page, 2);
        assert_eq!(query.limit, 25);
        assert_eq!(query.offset(), 25);
    }

    #[test]
    fn blank_search_is_dropped() {
        let query = ListParams {
            search: Some("   ".to_string()),
            ..ListParams::default()
        }
        .into_query();
        assert_eq!(query.search, None);
    }

    #[test]
    fn only_positive_payments_credit_a_student() {
        let student = Uuid::new_v4();
        let mut payment = PaymentPayload {
            price: 50000.0,
            student_id: Some(student),
            ..PaymentPayload::default()
        };
        assert_eq!(payment.credited_student(), Some(student));

        payment.price = 0.0;
        assert_eq!(payment.credited_student(), None);
    }

    #[test]
    fn passwords_are_never_serialized() {
        let student = Student {
            id: Uuid::new_v4(),
            full_name: "Ana".to_string(),
            email: String::new(),
            age: 20,
            paid_sum: 0.0,
            status: String::new(),
            login: "ana1".to_string(),
            password: "$pbkdf2-sha256$hash".to_string(),
            group_id: None,
            created_at: Utc::now(),
            updated_at: None,
        };
        let json = serde_json::to_value(&student).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["login"], "ana1");
    }
}
