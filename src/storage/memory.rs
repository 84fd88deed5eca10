//! Process-local storage, used when no `DATABASE_URL` is configured.
//!
//! State does not survive a restart.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::{
    AdminReports, Entity, PaymentLedger, Reference, Repository, Storage, StorageError,
    StudentAccounts,
};
use crate::models::{
    Admin, AdminPayment, Branch, Group, Lesson, ListQuery, Page, Payment, PaymentPayload,
    Schedule, Student, Task, Teacher,
};

/// Live ids per table, each with the number of rows referencing it.
///
/// Every write locks this first, then the tables it touches.
#[derive(Debug, Default)]
struct Links {
    tables: HashMap<&'static str, HashMap<Uuid, usize>>,
}

impl Links {
    fn check(&self, references: &[Reference]) -> Result<(), StorageError> {
        for (table, id) in references {
            let exists = self
                .tables
                .get(table)
                .is_some_and(|ids| ids.contains_key(id));
            if !exists {
                return Err(StorageError::InvalidReference(format!(
                    "{table} row {id} does not exist"
                )));
            }
        }
        Ok(())
    }

    fn attach(&mut self, table: &'static str, id: Uuid, references: &[Reference]) {
        self.tables.entry(table).or_default().insert(id, 0);
        self.link(references);
    }

    fn detach(
        &mut self,
        table: &'static str,
        id: Uuid,
        references: &[Reference],
    ) -> Result<(), StorageError> {
        let referenced = self
            .tables
            .get(table)
            .and_then(|ids| ids.get(&id))
            .is_some_and(|count| *count > 0);
        if referenced {
            return Err(StorageError::InvalidReference(format!(
                "{table} row {id} is still referenced"
            )));
        }
        if let Some(ids) = self.tables.get_mut(table) {
            ids.remove(&id);
        }
        self.unlink(references);
        Ok(())
    }

    fn link(&mut self, references: &[Reference]) {
        for (table, id) in references {
            if let Some(count) = self.tables.get_mut(table).and_then(|ids| ids.get_mut(id)) {
                *count += 1;
            }
        }
    }

    fn unlink(&mut self, references: &[Reference]) {
        for (table, id) in references {
            if let Some(count) = self.tables.get_mut(table).and_then(|ids| ids.get_mut(id)) {
                *count = count.saturating_sub(1);
            }
        }
    }
}

pub struct MemoryRepository<E> {
    rows: RwLock<Vec<E>>,
    links: Arc<Mutex<Links>>,
}

impl<E> MemoryRepository<E> {
    fn new(links: Arc<Mutex<Links>>) -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
            links,
        }
    }
}

fn check_unique<E: Entity>(rows: &[E], candidate: &E) -> Result<(), StorageError> {
    let Some(key) = candidate.unique_key() else {
        return Ok(());
    };
    let taken = rows
        .iter()
        .any(|row| row.id() != candidate.id() && row.unique_key() == Some(key));
    if taken {
        return Err(StorageError::Conflict(format!(
            "{} with key `{key}` already exists",
            E::NAME
        )));
    }
    Ok(())
}

fn matches_search<E: Entity>(row: &E, needle: Option<&str>) -> bool {
    match (E::SEARCH, needle) {
        (Some(_), Some(needle)) => row
            .search_text()
            .is_some_and(|text| text.to_lowercase().contains(needle)),
        _ => true,
    }
}

#[async_trait]
impl<E: Entity> Repository<E> for MemoryRepository<E> {
    async fn create(&self, payload: &E::Payload) -> Result<E, StorageError> {
        let record = E::assemble(Uuid::new_v4(), payload.clone(), Utc::now(), None);
        let references = record.references();

        let mut links = self.links.lock().await;
        let mut rows = self.rows.write().await;
        links.check(&references)?;
        check_unique(&rows, &record)?;
        links.attach(E::PLURAL, record.id(), &references);
        rows.push(record.clone());
        Ok(record)
    }

    async fn update(&self, id: Uuid, payload: &E::Payload) -> Result<E, StorageError> {
        let mut links = self.links.lock().await;
        let mut rows = self.rows.write().await;
        let position = rows
            .iter()
            .position(|row| row.id() == id)
            .ok_or(StorageError::NotFound)?;
        let created_at = rows[position].created_at();
        let record = E::assemble(id, payload.clone(), created_at, Some(Utc::now()));
        let references = record.references();
        links.check(&references)?;
        check_unique(&rows, &record)?;

        links.unlink(&rows[position].references());
        links.link(&references);
        rows[position] = record.clone();
        Ok(record)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<E, StorageError> {
        self.rows
            .read()
            .await
            .iter()
            .find(|row| row.id() == id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn get_all(&self, query: &ListQuery) -> Result<Page<E>, StorageError> {
        let needle = query.search.as_deref().map(str::to_lowercase);
        let rows = self.rows.read().await;
        let matching: Vec<&E> = rows
            .iter()
            .filter(|row| matches_search(*row, needle.as_deref()))
            .collect();

        let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        let items = matching
            .iter()
            .skip(offset)
            .take(query.limit as usize)
            .map(|row| (*row).clone())
            .collect();

        Ok(Page {
            items,
            count: matching.len() as i64,
        })
    }

    async fn delete(&self, id: Uuid) -> Result<(), StorageError> {
        let mut links = self.links.lock().await;
        let mut rows = self.rows.write().await;
        let Some(position) = rows.iter().position(|row| row.id() == id) else {
            return Ok(());
        };
        links.detach(E::PLURAL, id, &rows[position].references())?;
        rows.remove(position);
        Ok(())
    }
}

pub struct MemoryStorage {
    links: Arc<Mutex<Links>>,
    admins: MemoryRepository<Admin>,
    branches: MemoryRepository<Branch>,
    groups: MemoryRepository<Group>,
    lessons: MemoryRepository<Lesson>,
    payments: MemoryRepository<Payment>,
    schedules: MemoryRepository<Schedule>,
    students: MemoryRepository<Student>,
    tasks: MemoryRepository<Task>,
    teachers: MemoryRepository<Teacher>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        let links = Arc::new(Mutex::new(Links::default()));
        Self {
            admins: MemoryRepository::new(Arc::clone(&links)),
            branches: MemoryRepository::new(Arc::clone(&links)),
            groups: MemoryRepository::new(Arc::clone(&links)),
            lessons: MemoryRepository::new(Arc::clone(&links)),
            payments: MemoryRepository::new(Arc::clone(&links)),
            schedules: MemoryRepository::new(Arc::clone(&links)),
            students: MemoryRepository::new(Arc::clone(&links)),
            tasks: MemoryRepository::new(Arc::clone(&links)),
            teachers: MemoryRepository::new(Arc::clone(&links)),
            links,
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn backend(&self) -> &'static str {
        "memory"
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
impl StudentAccounts for MemoryStorage {
    async fn get_by_login(&self, login: &str) -> Result<Student, StorageError> {
        self.students
            .rows
            .read()
            .await
            .iter()
            .find(|student| student.login == login)
            .cloned()
            .ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl PaymentLedger for MemoryStorage {
    async fn record(&self, payload: &PaymentPayload) -> Result<Payment, StorageError> {
        let mut links = self.links.lock().await;
        let mut students = self.students.rows.write().await;
        let mut payments = self.payments.rows.write().await;

        let now = Utc::now();
        let payment = Payment::assemble(Uuid::new_v4(), payload.clone(), now, None);
        let references = payment.references();
        links.check(&references)?;

        if let Some(student_id) = payload.credited_student() {
            let student = students
                .iter_mut()
                .find(|student| student.id == student_id)
                .ok_or_else(|| {
                    StorageError::InvalidReference(format!("student {student_id} does not exist"))
                })?;
            student.paid_sum += payload.price;
            student.updated_at = Some(now);
        }

        links.attach(Payment::PLURAL, payment.id, &references);
        payments.push(payment.clone());
        Ok(payment)
    }
}

#[async_trait]
impl AdminReports for MemoryStorage {
    async fn admin_payments(&self, admin_id: Uuid) -> Result<Vec<AdminPayment>, StorageError> {
        let admins = self.admins.rows.read().await;
        let Some(admin) = admins.iter().find(|admin| admin.id == admin_id) else {
            return Ok(Vec::new());
        };
        let payments = self.payments.rows.read().await;
        Ok(payments
            .iter()
            .filter(|payment| payment.admin_id == Some(admin_id))
            .map(|payment| AdminPayment {
                admin: admin.clone(),
                payment: payment.clone(),
            })
            .collect())
    }
}
