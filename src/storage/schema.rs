use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{Entity, PgQueryAs, Reference, Repository, Storage};
use crate::models::{
    Admin, AdminPayload, Branch, BranchPayload, Group, GroupPayload, Lesson, LessonPayload,
    Payment, PaymentPayload, Schedule, SchedulePayload, Student, StudentPayload, Task,
    TaskPayload, Teacher, TeacherPayload,
};

fn present(keys: &[(&'static str, Option<Uuid>)]) -> Vec<Reference> {
    keys.iter()
        .filter_map(|(table, id)| id.map(|id| (*table, id)))
        .collect()
}

fn non_empty(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

impl Entity for Admin {
    type Payload = AdminPayload;

    const NAME: &'static str = "admin";
    const PLURAL: &'static str = "admins";
    const COLUMNS: &'static [&'static str] =
        &["full_name", "email", "age", "status", "login", "password"];
    const SEARCH: Option<&'static str> = Some("full_name");

    fn id(&self) -> Uuid {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn unique_key(&self) -> Option<&str> {
        non_empty(&self.login)
    }

    fn search_text(&self) -> Option<&str> {
        Some(&self.full_name)
    }

    fn assemble(
        id: Uuid,
        payload: AdminPayload,
        created_at: DateTime<Utc>,
        updated_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            full_name: payload.full_name,
            email: payload.email,
            age: payload.age,
            status: payload.status,
            login: payload.login,
            password: payload.password,
            created_at,
            updated_at,
        }
    }

    fn bind<'q, O>(payload: &'q AdminPayload, query: PgQueryAs<'q, O>) -> PgQueryAs<'q, O> {
        query
            .bind(&payload.full_name)
            .bind(&payload.email)
            .bind(payload.age)
            .bind(&payload.status)
            .bind(&payload.login)
            .bind(&payload.password)
    }

    fn repository(storage: &dyn Storage) -> &dyn Repository<Self> {
        storage.admins()
    }
}

impl Entity for Branch {
    type Payload = BranchPayload;

    const NAME: &'static str = "branch";
    const PLURAL: &'static str = "branches";
    const COLUMNS: &'static [&'static str] = &["name", "address"];
    const SEARCH: Option<&'static str> = Some("name");

    fn id(&self) -> Uuid {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn search_text(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn assemble(
        id: Uuid,
        payload: BranchPayload,
        created_at: DateTime<Utc>,
        updated_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            name: payload.name,
            address: payload.address,
            created_at,
            updated_at,
        }
    }

    fn bind<'q, O>(payload: &'q BranchPayload, query: PgQueryAs<'q, O>) -> PgQueryAs<'q, O> {
        query.bind(&payload.name).bind(&payload.address)
    }

    fn repository(storage: &dyn Storage) -> &dyn Repository<Self> {
        storage.branches()
    }
}

impl Entity for Group {
    type Payload = GroupPayload;

    const NAME: &'static str = "group";
    const PLURAL: &'static str = "groups";
    const COLUMNS: &'static [&'static str] = &["name", "group_type", "teacher_id", "branch_id"];
    const SEARCH: Option<&'static str> = Some("name");

    fn id(&self) -> Uuid {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn references(&self) -> Vec<Reference> {
        present(&[
            ("teachers", self.teacher_id),
            ("branches", self.branch_id),
        ])
    }

    fn search_text(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn assemble(
        id: Uuid,
        payload: GroupPayload,
        created_at: DateTime<Utc>,
        updated_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            name: payload.name,
            group_type: payload.group_type,
            teacher_id: payload.teacher_id,
            branch_id: payload.branch_id,
            created_at,
            updated_at,
        }
    }

    fn bind<'q, O>(payload: &'q GroupPayload, query: PgQueryAs<'q, O>) -> PgQueryAs<'q, O> {
        query
            .bind(&payload.name)
            .bind(&payload.group_type)
            .bind(payload.teacher_id)
            .bind(payload.branch_id)
    }

    fn repository(storage: &dyn Storage) -> &dyn Repository<Self> {
        storage.groups()
    }
}

impl Entity for Lesson {
    type Payload = LessonPayload;

    const NAME: &'static str = "lesson";
    const PLURAL: &'static str = "lessons";
    const COLUMNS: &'static [&'static str] = &["theme", "group_id", "schedule_id"];
    const SEARCH: Option<&'static str> = Some("theme");

    fn id(&self) -> Uuid {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn references(&self) -> Vec<Reference> {
        present(&[
            ("groups", self.group_id),
            ("schedules", self.schedule_id),
        ])
    }

    fn search_text(&self) -> Option<&str> {
        Some(&self.theme)
    }

    fn assemble(
        id: Uuid,
        payload: LessonPayload,
        created_at: DateTime<Utc>,
        updated_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            theme: payload.theme,
            group_id: payload.group_id,
            schedule_id: payload.schedule_id,
            created_at,
            updated_at,
        }
    }

    fn bind<'q, O>(payload: &'q LessonPayload, query: PgQueryAs<'q, O>) -> PgQueryAs<'q, O> {
        query
            .bind(&payload.theme)
            .bind(payload.group_id)
            .bind(payload.schedule_id)
    }

    fn repository(storage: &dyn Storage) -> &dyn Repository<Self> {
        storage.lessons()
    }
}

impl Entity for Payment {
    type Payload = PaymentPayload;

    const NAME: &'static str = "payment";
    const PLURAL: &'static str = "payments";
    const COLUMNS: &'static [&'static str] = &["price", "student_id", "branch_id", "admin_id"];
    // Payments have no free-text column; `search` is ignored.
    const SEARCH: Option<&'static str> = None;

    fn id(&self) -> Uuid {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn references(&self) -> Vec<Reference> {
        present(&[
            ("students", self.student_id),
            ("branches", self.branch_id),
            ("admins", self.admin_id),
        ])
    }

    fn search_text(&self) -> Option<&str> {
        None
    }

    fn assemble(
        id: Uuid,
        payload: PaymentPayload,
        created_at: DateTime<Utc>,
        updated_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            price: payload.price,
            student_id: payload.student_id,
            branch_id: payload.branch_id,
            admin_id: payload.admin_id,
            created_at,
            updated_at,
        }
    }

    fn bind<'q, O>(payload: &'q PaymentPayload, query: PgQueryAs<'q, O>) -> PgQueryAs<'q, O> {
        query
            .bind(payload.price)
            .bind(payload.student_id)
            .bind(payload.branch_id)
            .bind(payload.admin_id)
    }

    fn repository(storage: &dyn Storage) -> &dyn Repository<Self> {
        storage.payments()
    }
}

impl Entity for Schedule {
    type Payload = SchedulePayload;

    const NAME: &'static str = "schedule";
    const PLURAL: &'static str = "schedules";
    const COLUMNS: &'static [&'static str] =
        &["room", "group_id", "teacher_id", "starts_at", "ends_at"];
    const SEARCH: Option<&'static str> = Some("room");

    fn id(&self) -> Uuid {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn references(&self) -> Vec<Reference> {
        present(&[
            ("groups", self.group_id),
            ("teachers", self.teacher_id),
        ])
    }

    fn search_text(&self) -> Option<&str> {
        Some(&self.room)
    }

    fn assemble(
        id: Uuid,
        payload: SchedulePayload,
        created_at: DateTime<Utc>,
        updated_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            room: payload.room,
            group_id: payload.group_id,
            teacher_id: payload.teacher_id,
            starts_at: payload.starts_at,
            ends_at: payload.ends_at,
            created_at,
            updated_at,
        }
    }

    fn bind<'q, O>(payload: &'q SchedulePayload, query: PgQueryAs<'q, O>) -> PgQueryAs<'q, O> {
        query
            .bind(&payload.room)
            .bind(payload.group_id)
            .bind(payload.teacher_id)
            .bind(payload.starts_at)
            .bind(payload.ends_at)
    }

    fn repository(storage: &dyn Storage) -> &dyn Repository<Self> {
        storage.schedules()
    }
}

impl Entity for Student {
    type Payload = StudentPayload;

    const NAME: &'static str = "student";
    const PLURAL: &'static str = "students";
    const COLUMNS: &'static [&'static str] = &[
        "full_name",
        "email",
        "age",
        "paid_sum",
        "status",
        "login",
        "password",
        "group_id",
    ];
    const SEARCH: Option<&'static str> = Some("full_name");

    fn id(&self) -> Uuid {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn unique_key(&self) -> Option<&str> {
        non_empty(&self.login)
    }

    fn references(&self) -> Vec<Reference> {
        present(&[
            ("groups", self.group_id),
        ])
    }

    fn search_text(&self) -> Option<&str> {
        Some(&self.full_name)
    }

    fn assemble(
        id: Uuid,
        payload: StudentPayload,
        created_at: DateTime<Utc>,
        updated_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            full_name: payload.full_name,
            email: payload.email,
            age: payload.age,
            paid_sum: payload.paid_sum,
            status: payload.status,
            login: payload.login,
            password: payload.password,
            group_id: payload.group_id,
            created_at,
            updated_at,
        }
    }

    fn bind<'q, O>(payload: &'q StudentPayload, query: PgQueryAs<'q, O>) -> PgQueryAs<'q, O> {
        query
            .bind(&payload.full_name)
            .bind(&payload.email)
            .bind(payload.age)
            .bind(payload.paid_sum)
            .bind(&payload.status)
            .bind(&payload.login)
            .bind(&payload.password)
            .bind(payload.group_id)
    }

    fn repository(storage: &dyn Storage) -> &dyn Repository<Self> {
        storage.students()
    }
}

impl Entity for Task {
    type Payload = TaskPayload;

    const NAME: &'static str = "task";
    const PLURAL: &'static str = "tasks";
    const COLUMNS: &'static [&'static str] =
        &["label", "score", "lesson_id", "group_id", "deadline"];
    const SEARCH: Option<&'static str> = Some("label");

    fn id(&self) -> Uuid {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn references(&self) -> Vec<Reference> {
        present(&[
            ("lessons", self.lesson_id),
            ("groups", self.group_id),
        ])
    }

    fn search_text(&self) -> Option<&str> {
        Some(&self.label)
    }

    fn assemble(
        id: Uuid,
        payload: TaskPayload,
        created_at: DateTime<Utc>,
        updated_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            label: payload.label,
            score: payload.score,
            lesson_id: payload.lesson_id,
            group_id: payload.group_id,
            deadline: payload.deadline,
            created_at,
            updated_at,
        }
    }

    fn bind<'q, O>(payload: &'q TaskPayload, query: PgQueryAs<'q, O>) -> PgQueryAs<'q, O> {
        query
            .bind(&payload.label)
            .bind(payload.score)
            .bind(payload.lesson_id)
            .bind(payload.group_id)
            .bind(payload.deadline)
    }

    fn repository(storage: &dyn Storage) -> &dyn Repository<Self> {
        storage.tasks()
    }
}

impl Entity for Teacher {
    type Payload = TeacherPayload;

    const NAME: &'static str = "teacher";
    const PLURAL: &'static str = "teachers";
    const COLUMNS: &'static [&'static str] = &[
        "full_name",
        "email",
        "age",
        "status",
        "login",
        "password",
        "branch_id",
    ];
    const SEARCH: Option<&'static str> = Some("full_name");

    fn id(&self) -> Uuid {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn unique_key(&self) -> Option<&str> {
        non_empty(&self.login)
    }

    fn references(&self) -> Vec<Reference> {
        present(&[
            ("branches", self.branch_id),
        ])
    }

    fn search_text(&self) -> Option<&str> {
        Some(&self.full_name)
    }

    fn assemble(
        id: Uuid,
        payload: TeacherPayload,
        created_at: DateTime<Utc>,
        updated_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            full_name: payload.full_name,
            email: payload.email,
            age: payload.age,
            status: payload.status,
            login: payload.login,
            password: payload.password,
            branch_id: payload.branch_id,
            created_at,
            updated_at,
        }
    }

    fn bind<'q, O>(payload: &'q TeacherPayload, query: PgQueryAs<'q, O>) -> PgQueryAs<'q, O> {
        query
            .bind(&payload.full_name)
            .bind(&payload.email)
            .bind(payload.age)
            .bind(&payload.status)
            .bind(&payload.login)
            .bind(&payload.password)
            .bind(payload.branch_id)
    }

    fn repository(storage: &dyn Storage) -> &dyn Repository<Self> {
        storage.teachers()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns_are_distinct<E: Entity>() {
        let mut seen = std::collections::HashSet::new();
        for column in E::COLUMNS {
            assert!(seen.insert(*column), "{} repeats column {column}", E::NAME);
            assert!(!matches!(*column, "id" | "created_at" | "updated_at"));
        }
        if let Some(search) = E::SEARCH {
            assert!(E::COLUMNS.contains(&search), "{} searches unknown column", E::NAME);
        }
    }

    #[test]
    fn every_entity_declares_sane_columns() {
        columns_are_distinct::<Admin>();
        columns_are_distinct::<Branch>();
        columns_are_distinct::<Group>();
        columns_are_distinct::<Lesson>();
        columns_are_distinct::<Payment>();
        columns_are_distinct::<Schedule>();
        columns_are_distinct::<Student>();
        columns_are_distinct::<Task>();
        columns_are_distinct::<Teacher>();
    }

    #[test]
    fn blank_logins_are_not_unique_keys() {
        let student = Student::assemble(Uuid::new_v4(), StudentPayload::default(), Utc::now(), None);
        assert_eq!(student.unique_key(), None);

        let payload = StudentPayload {
            login: "ana1".to_string(),
            ..StudentPayload::default()
        };
        let student = Student::assemble(Uuid::new_v4(), payload, Utc::now(), None);
        assert_eq!(student.unique_key(), Some("ana1"));
    }

    #[test]
    fn only_present_foreign_keys_are_references() {
        let admin = Uuid::new_v4();
        let payload = PaymentPayload {
            price: 10.0,
            admin_id: Some(admin),
            ..PaymentPayload::default()
        };
        let payment = Payment::assemble(Uuid::new_v4(), payload, Utc::now(), None);
        assert_eq!(payment.references(), vec![("admins", admin)]);

        let branch = Branch::assemble(Uuid::new_v4(), BranchPayload::default(), Utc::now(), None);
        assert!(branch.references().is_empty());
    }
}
