//! PostgreSQL repositories.
//!
//! SQL text is derived from each entity's column list; every value that comes
//! from a request, including the search text, is passed as a bound parameter.

use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Row};
use uuid::Uuid;

use super::{
    AdminReports, Entity, PaymentLedger, Repository, Storage, StorageError, StudentAccounts,
};
use crate::models::{
    Admin, AdminPayment, Branch, Group, Lesson, ListQuery, Page, Payment, PaymentPayload,
    Schedule, Student, Task, Teacher,
};

/// Opens the pool and applies the embedded migrations.
pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(url)
        .await?;
    log::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    log::info!("Database migrations applied");

    Ok(pool)
}

fn select_columns<E: Entity>() -> String {
    let mut columns = vec!["id"];
    columns.extend_from_slice(E::COLUMNS);
    columns.extend_from_slice(&["created_at", "updated_at"]);
    columns.join(", ")
}

fn insert_sql<E: Entity>() -> String {
    let placeholders = (1..=E::COLUMNS.len() + 1)
        .map(|n| format!("${n}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} (id, {}) VALUES ({placeholders}) RETURNING {}",
        E::PLURAL,
        E::COLUMNS.join(", "),
        select_columns::<E>()
    )
}

fn update_sql<E: Entity>() -> String {
    let assignments = E::COLUMNS
        .iter()
        .enumerate()
        .map(|(n, column)| format!("{column} = ${}", n + 1))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "UPDATE {} SET {assignments}, updated_at = now() WHERE id = ${} RETURNING {}",
        E::PLURAL,
        E::COLUMNS.len() + 1,
        select_columns::<E>()
    )
}

fn select_by_id_sql<E: Entity>() -> String {
    format!("SELECT {} FROM {} WHERE id = $1", select_columns::<E>(), E::PLURAL)
}

fn search_clause<E: Entity>(query: &ListQuery, placeholder: usize) -> String {
    match (E::SEARCH, &query.search) {
        (Some(column), Some(_)) => format!(" WHERE {column} ILIKE ${placeholder}"),
        _ => String::new(),
    }
}

fn list_sql<E: Entity>(query: &ListQuery) -> String {
    format!(
        "SELECT COUNT(*) OVER() AS total_count, {} FROM {}{} ORDER BY created_at, id OFFSET $1 LIMIT $2",
        select_columns::<E>(),
        E::PLURAL,
        search_clause::<E>(query, 3)
    )
}

fn count_sql<E: Entity>(query: &ListQuery) -> String {
    format!(
        "SELECT COUNT(*) FROM {}{}",
        E::PLURAL,
        search_clause::<E>(query, 1)
    )
}

/// `ILIKE` pattern matching `search` literally anywhere in the column.
fn like_pattern(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for ch in search.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

fn search_pattern<E: Entity>(query: &ListQuery) -> Option<String> {
    E::SEARCH.and(query.search.as_deref()).map(like_pattern)
}

pub struct PgRepository<E> {
    pool: PgPool,
    entity: PhantomData<fn() -> E>,
}

impl<E> PgRepository<E> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            entity: PhantomData,
        }
    }
}

#[async_trait]
impl<E: Entity> Repository<E> for PgRepository<E> {
    async fn create(&self, payload: &E::Payload) -> Result<E, StorageError> {
        let sql = insert_sql::<E>();
        let query = sqlx::query_as::<_, E>(&sql).bind(Uuid::new_v4());
        Ok(E::bind(payload, query).fetch_one(&self.pool).await?)
    }

    async fn update(&self, id: Uuid, payload: &E::Payload) -> Result<E, StorageError> {
        let sql = update_sql::<E>();
        let query = sqlx::query_as::<_, E>(&sql);
        E::bind(payload, query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::NotFound)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<E, StorageError> {
        sqlx::query_as::<_, E>(&select_by_id_sql::<E>())
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::NotFound)
    }

    async fn get_all(&self, query: &ListQuery) -> Result<Page<E>, StorageError> {
        let pattern = search_pattern::<E>(query);

        let sql = list_sql::<E>(query);
        let mut rows = sqlx::query(&sql)
            .bind(query.offset())
            .bind(i64::from(query.limit));
        if let Some(pattern) = &pattern {
            rows = rows.bind(pattern);
        }
        let rows = rows.fetch_all(&self.pool).await?;

        let mut count = 0_i64;
        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            count = row.try_get("total_count")?;
            items.push(E::from_row(row)?);
        }

        // An empty window says nothing about the total, ask for it directly.
        if items.is_empty() && query.page > 1 {
            let sql = count_sql::<E>(query);
            let mut total = sqlx::query_scalar::<_, i64>(&sql);
            if let Some(pattern) = &pattern {
                total = total.bind(pattern);
            }
            count = total.fetch_one(&self.pool).await?;
        }

        Ok(Page { items, count })
    }

    async fn delete(&self, id: Uuid) -> Result<(), StorageError> {
        sqlx::query(&format!("DELETE FROM {} WHERE id = $1", E::PLURAL))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

pub struct PgStorage {
    pool: PgPool,
    admins: PgRepository<Admin>,
    branches: PgRepository<Branch>,
    groups: PgRepository<Group>,
    lessons: PgRepository<Lesson>,
    payments: PgRepository<Payment>,
    schedules: PgRepository<Schedule>,
    students: PgRepository<Student>,
    tasks: PgRepository<Task>,
    teachers: PgRepository<Teacher>,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self {
            admins: PgRepository::new(pool.clone()),
            branches: PgRepository::new(pool.clone()),
            groups: PgRepository::new(pool.clone()),
            lessons: PgRepository::new(pool.clone()),
            payments: PgRepository::new(pool.clone()),
            schedules: PgRepository::new(pool.clone()),
            students: PgRepository::new(pool.clone()),
            tasks: PgRepository::new(pool.clone()),
            teachers: PgRepository::new(pool.clone()),
            pool,
        }
    }
}

impl Storage for PgStorage {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    fn admins(&self) -> &dyn Repository<Admin> {
        &self.admins
    }

    fn branches(&self) -> &dyn Repository<Branch> {
        &self.branches
    }

    fn groups(&self) -> &dyn Repository<Group> {
        &self.groups
    }

    fn lessons(&self) -> &dyn Repository<Lesson> {
        &self.lessons
    }

    fn payments(&self) -> &dyn Repository<Payment> {
        &self.payments
    }

    fn schedules(&self) -> &dyn Repository<Schedule> {
        &self.schedules
    }

    fn students(&self) -> &dyn Repository<Student> {
        &self.students
    }

    fn tasks(&self) -> &dyn Repository<Task> {
        &self.tasks
    }

    fn teachers(&self) -> &dyn Repository<Teacher> {
        &self.teachers
    }

    fn accounts(&self) -> &dyn StudentAccounts {
        self
    }

    fn ledger(&self) -> &dyn PaymentLedger {
        self
    }

    fn reports(&self) -> &dyn AdminReports {
        self
    }
}

#[async_trait]
impl StudentAccounts for PgStorage {
    async fn get_by_login(&self, login: &str) -> Result<Student, StorageError> {
        let sql = format!(
            "SELECT {} FROM students WHERE login = $1",
            select_columns::<Student>()
        );
        sqlx::query_as::<_, Student>(&sql)
            .bind(login)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl PaymentLedger for PgStorage {
    async fn record(&self, payload: &PaymentPayload) -> Result<Payment, StorageError> {
        let mut tx = self.pool.begin().await?;

        let sql = insert_sql::<Payment>();
        let query = sqlx::query_as::<_, Payment>(&sql).bind(Uuid::new_v4());
        let payment = Payment::bind(payload, query).fetch_one(&mut *tx).await?;

        if let Some(student_id) = payload.credited_student() {
            let credited = sqlx::query(
                "UPDATE students SET paid_sum = paid_sum + $1, updated_at = now() WHERE id = $2",
            )
            .bind(payload.price)
            .bind(student_id)
            .execute(&mut *tx)
            .await?;

            if credited.rows_affected() == 0 {
                return Err(StorageError::InvalidReference(format!(
                    "student {student_id} does not exist"
                )));
            }
        }

        tx.commit().await?;
        Ok(payment)
    }
}

const ADMIN_PAYMENTS_SQL: &str = "SELECT
        a.id AS admin_id,
        a.full_name AS admin_full_name,
        a.email AS admin_email,
        a.age AS admin_age,
        a.status AS admin_status,
        a.login AS admin_login,
        a.password AS admin_password,
        a.created_at AS admin_created_at,
        a.updated_at AS admin_updated_at,
        p.id AS payment_id,
        p.price AS payment_price,
        p.student_id AS payment_student_id,
        p.branch_id AS payment_branch_id,
        p.created_at AS payment_created_at,
        p.updated_at AS payment_updated_at
    FROM admins a
    JOIN payments p ON a.id = p.admin_id
    WHERE a.id = $1
    ORDER BY p.created_at, p.id";

#[derive(FromRow)]
struct AdminPaymentRow {
    admin_id: Uuid,
    admin_full_name: String,
    admin_email: String,
    admin_age: i32,
    admin_status: String,
    admin_login: String,
    admin_password: String,
    admin_created_at: DateTime<Utc>,
    admin_updated_at: Option<DateTime<Utc>>,
    payment_id: Uuid,
    payment_price: f64,
    payment_student_id: Option<Uuid>,
    payment_branch_id: Option<Uuid>,
    payment_created_at: DateTime<Utc>,
    payment_updated_at: Option<DateTime<Utc>>,
}

impl From<AdminPaymentRow> for AdminPayment {
    fn from(row: AdminPaymentRow) -> Self {
        Self {
            admin: Admin {
                id: row.admin_id,
                full_name: row.admin_full_name,
                email: row.admin_email,
                age: row.admin_age,
                status: row.admin_status,
                login: row.admin_login,
                password: row.admin_password,
                created_at: row.admin_created_at,
                updated_at: row.admin_updated_at,
            },
            payment: Payment {
                id: row.payment_id,
                price: row.payment_price,
                student_id: row.payment_student_id,
                branch_id: row.payment_branch_id,
                admin_id: Some(row.admin_id),
                created_at: row.payment_created_at,
                updated_at: row.payment_updated_at,
            },
        }
    }
}

#[async_trait]
impl AdminReports for PgStorage {
    async fn admin_payments(&self, admin_id: Uuid) -> Result<Vec<AdminPayment>, StorageError> {
        let rows = sqlx::query_as::<_, AdminPaymentRow>(ADMIN_PAYMENTS_SQL)
            .bind(admin_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(AdminPayment::from).collect())
    }
}
