//! In-process store used when no MongoDB instance is configured, and by tests.
//!
//! Every operation runs under a single lock, so the uniqueness rules the
//! MongoDB indexes provide hold here as well.

use std::collections::HashMap;
#[cfg(test)]
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::NaiveDate;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::data::assignment::db::AssignmentStore;
use crate::data::assignment::{Assignment, Submission};
use crate::data::attendance::db::{AttendanceEntry, AttendanceStore};
use crate::data::attendance::AttendanceRecord;
use crate::data::course::db::{CourseStore, CourseUpdateData};
use crate::data::course::Course;
use crate::data::notification::db::NotificationStore;
use crate::data::notification::Notification;
use crate::data::registration::db::RegistrationStore;
use crate::data::registration::{Registration, RegistrationStatus};
use crate::data::user::db::UserStore;
use crate::data::user::User;
use crate::data::{StoreError, StoreResult};
use crate::middleware::paging::PageState;

#[derive(Debug, Default)]
struct Collections {
    users: HashMap<String, User>,
    courses: HashMap<Uuid, Course>,
    registrations: HashMap<Uuid, Registration>,
    notifications: HashMap<Uuid, Notification>,
    assignments: HashMap<Uuid, Assignment>,
    submissions: HashMap<(Uuid, String), Submission>,
    attendance: HashMap<(Uuid, NaiveDate, String), AttendanceRecord>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
    #[cfg(test)]
    refuse_notifications: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    /// Makes notification writes fail until switched off again.
    #[cfg(test)]
    pub(crate) fn refuse_notifications(&self, refuse: bool) {
        self.refuse_notifications.store(refuse, Ordering::SeqCst);
    }
}

fn sorted_courses<'a>(courses: impl Iterator<Item = &'a Course>) -> Vec<Course> {
    let mut result: Vec<Course> = courses.cloned().collect();
    result.sort_by(|a, b| a.created.cmp(&b.created).then(a.id.cmp(&b.id)));
    result
}

fn sorted_registrations<'a>(
    registrations: impl Iterator<Item = &'a Registration>,
) -> Vec<Registration> {
    let mut result: Vec<Registration> = registrations.cloned().collect();
    result.sort_by(|a, b| a.requested_at.cmp(&b.requested_at).then(a.id.cmp(&b.id)));
    result
}

fn sorted_attendance<'a>(
    records: impl Iterator<Item = &'a AttendanceRecord>,
) -> Vec<AttendanceRecord> {
    let mut result: Vec<AttendanceRecord> = records.cloned().collect();
    result.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.student.cmp(&b.student)));
    result
}

#[rocket::async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut data = self.inner.write().await;
        if data.users.contains_key(&user.username) {
            return Err(StoreError::Duplicate);
        }
        data.users.insert(user.username.clone(), user.clone());
        Ok(())
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self.inner.read().await.users.get(username).cloned())
    }

    async fn add_user_course(&self, username: &str, course: Uuid) -> StoreResult<()> {
        let mut data = self.inner.write().await;
        if let Some(user) = data.users.get_mut(username) {
            if !user.courses.contains(&course) {
                user.courses.push(course);
            }
        }
        Ok(())
    }

    async fn remove_course_from_users(&self, course: Uuid) -> StoreResult<u64> {
        let mut data = self.inner.write().await;
        let mut modified = 0;
        for user in data.users.values_mut() {
            let before = user.courses.len();
            user.courses.retain(|it| *it != course);
            if user.courses.len() != before {
                modified += 1;
            }
        }
        Ok(modified)
    }
}

#[rocket::async_trait]
impl CourseStore for MemoryStore {
    async fn insert_course(&self, course: &Course) -> StoreResult<()> {
        let mut data = self.inner.write().await;
        if data.courses.contains_key(&course.id) {
            return Err(StoreError::Duplicate);
        }
        data.courses.insert(course.id, course.clone());
        Ok(())
    }

    async fn get_course(&self, id: Uuid) -> StoreResult<Option<Course>> {
        Ok(self.inner.read().await.courses.get(&id).cloned())
    }

    async fn get_courses(&self, ids: &[Uuid]) -> StoreResult<Vec<Course>> {
        let data = self.inner.read().await;
        Ok(sorted_courses(ids.iter().filter_map(|id| data.courses.get(id))))
    }

    async fn list_courses(&self, page: PageState) -> StoreResult<Vec<Course>> {
        let data = self.inner.read().await;
        Ok(sorted_courses(data.courses.values())
            .into_iter()
            .skip(page.skip() as usize)
            .take(page.page_length as usize)
            .collect())
    }

    async fn courses_by_teacher(&self, teacher: &str) -> StoreResult<Vec<Course>> {
        let data = self.inner.read().await;
        Ok(sorted_courses(
            data.courses.values().filter(|it| it.teacher == teacher),
        ))
    }

    async fn update_course(
        &self,
        id: Uuid,
        update: &CourseUpdateData,
    ) -> StoreResult<Option<Course>> {
        let mut data = self.inner.write().await;
        Ok(data.courses.get_mut(&id).map(|course| {
            update.apply(course);
            course.clone()
        }))
    }

    async fn delete_course(&self, id: Uuid) -> StoreResult<Option<Course>> {
        Ok(self.inner.write().await.courses.remove(&id))
    }
}

#[rocket::async_trait]
impl RegistrationStore for MemoryStore {
    async fn insert_registration(&self, registration: &Registration) -> StoreResult<()> {
        let mut data = self.inner.write().await;

        data.registrations.retain(|_, it| {
            !(it.student == registration.student
                && it.course == registration.course
                && it.status == RegistrationStatus::Rejected)
        });

        let taken = data.registrations.values().any(|it| {
            it.student == registration.student && it.course == registration.course
        });
        if taken || data.registrations.contains_key(&registration.id) {
            return Err(StoreError::Duplicate);
        }

        data.registrations
            .insert(registration.id, registration.clone());
        Ok(())
    }

    async fn get_registration(&self, id: Uuid) -> StoreResult<Option<Registration>> {
        Ok(self.inner.read().await.registrations.get(&id).cloned())
    }

    async fn registrations_for_student(&self, student: &str) -> StoreResult<Vec<Registration>> {
        let data = self.inner.read().await;
        Ok(sorted_registrations(
            data.registrations.values().filter(|it| it.student == student),
        ))
    }

    async fn registrations_for_courses(
        &self,
        courses: &[Uuid],
        status: RegistrationStatus,
    ) -> StoreResult<Vec<Registration>> {
        let data = self.inner.read().await;
        Ok(sorted_registrations(data.registrations.values().filter(
            |it| it.status == status && courses.contains(&it.course),
        )))
    }

    async fn is_registered(&self, student: &str, course: Uuid) -> StoreResult<bool> {
        let data = self.inner.read().await;
        Ok(data.registrations.values().any(|it| {
            it.student == student && it.course == course && it.status.is_registered()
        }))
    }

    async fn transition_registration(
        &self,
        id: Uuid,
        from: &[RegistrationStatus],
        to: RegistrationStatus,
    ) -> StoreResult<Option<Registration>> {
        let mut data = self.inner.write().await;
        Ok(data
            .registrations
            .get_mut(&id)
            .filter(|it| from.contains(&it.status))
            .map(|registration| {
                registration.status = to;
                registration.responded_at = Some(bson::DateTime::now());
                registration.clone()
            }))
    }

    async fn delete_registration(
        &self,
        id: Uuid,
        when: &[RegistrationStatus],
    ) -> StoreResult<Option<Registration>> {
        let mut data = self.inner.write().await;
        let matches = data
            .registrations
            .get(&id)
            .map(|it| when.contains(&it.status))
            .unwrap_or(false);

        Ok(if matches {
            data.registrations.remove(&id)
        } else {
            None
        })
    }

    async fn delete_course_registrations(&self, course: Uuid) -> StoreResult<u64> {
        let mut data = self.inner.write().await;
        let before = data.registrations.len();
        data.registrations.retain(|_, it| it.course != course);
        Ok((before - data.registrations.len()) as u64)
    }
}

#[rocket::async_trait]
impl NotificationStore for MemoryStore {
    async fn upsert_notification(&self, notification: &Notification) -> StoreResult<()> {
        #[cfg(test)]
        if self.refuse_notifications.load(Ordering::SeqCst) {
            return Err(StoreError::Inconsistent("notifications are switched off"));
        }

        let mut data = self.inner.write().await;
        data.notifications
            .entry(notification.id)
            .or_insert_with(|| notification.clone());
        Ok(())
    }

    async fn notifications_for(&self, student: &str) -> StoreResult<Vec<Notification>> {
        let data = self.inner.read().await;
        let mut result: Vec<Notification> = data
            .notifications
            .values()
            .filter(|it| it.student == student)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created.cmp(&a.created).then(a.id.cmp(&b.id)));
        Ok(result)
    }

    async fn mark_notification_read(&self, id: Uuid) -> StoreResult<Option<Notification>> {
        let mut data = self.inner.write().await;
        Ok(data.notifications.get_mut(&id).map(|it| {
            it.read = true;
            it.clone()
        }))
    }
}

#[rocket::async_trait]
impl AssignmentStore for MemoryStore {
    async fn insert_assignment(&self, assignment: &Assignment) -> StoreResult<()> {
        let mut data = self.inner.write().await;
        if data.assignments.contains_key(&assignment.id) {
            return Err(StoreError::Duplicate);
        }
        data.assignments.insert(assignment.id, assignment.clone());
        Ok(())
    }

    async fn get_assignment(&self, id: Uuid) -> StoreResult<Option<Assignment>> {
        Ok(self.inner.read().await.assignments.get(&id).cloned())
    }

    async fn assignments_for_course(&self, course: Uuid) -> StoreResult<Vec<Assignment>> {
        let data = self.inner.read().await;
        let mut result: Vec<Assignment> = data
            .assignments
            .values()
            .filter(|it| it.course == course)
            .cloned()
            .collect();
        result.sort_by(|a, b| a.created.cmp(&b.created).then(a.id.cmp(&b.id)));
        Ok(result)
    }

    async fn upsert_submission(
        &self,
        assignment: Uuid,
        student: &str,
        content: &str,
    ) -> StoreResult<Submission> {
        let mut data = self.inner.write().await;
        let submission = data
            .submissions
            .entry((assignment, student.to_string()))
            .or_insert_with(|| Submission {
                id: Uuid::new_v4(),
                assignment,
                student: student.to_string(),
                content: String::new(),
                submitted_at: bson::DateTime::now(),
            });
        submission.content = content.to_string();
        submission.submitted_at = bson::DateTime::now();
        Ok(submission.clone())
    }

    async fn submissions_for(&self, assignment: Uuid) -> StoreResult<Vec<Submission>> {
        let data = self.inner.read().await;
        let mut result: Vec<Submission> = data
            .submissions
            .values()
            .filter(|it| it.assignment == assignment)
            .cloned()
            .collect();
        result.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at));
        Ok(result)
    }
}

#[rocket::async_trait]
impl AttendanceStore for MemoryStore {
    async fn upsert_attendance(
        &self,
        course: Uuid,
        date: NaiveDate,
        entries: &[AttendanceEntry],
    ) -> StoreResult<Vec<AttendanceRecord>> {
        let mut data = self.inner.write().await;
        let mut stored = Vec::with_capacity(entries.len());

        for entry in entries {
            let record = data
                .attendance
                .entry((course, date, entry.student_id.clone()))
                .or_insert_with(|| AttendanceRecord {
                    id: Uuid::new_v4(),
                    course,
                    date,
                    student: entry.student_id.clone(),
                    present: entry.present,
                    marked_at: bson::DateTime::now(),
                });
            record.present = entry.present;
            record.marked_at = bson::DateTime::now();
            stored.push(record.clone());
        }

        Ok(sorted_attendance(stored.iter()))
    }

    async fn attendance_for_course(
        &self,
        course: Uuid,
        date: Option<NaiveDate>,
    ) -> StoreResult<Vec<AttendanceRecord>> {
        let data = self.inner.read().await;
        Ok(sorted_attendance(data.attendance.values().filter(|it| {
            it.course == course && date.map(|date| it.date == date).unwrap_or(true)
        })))
    }

    async fn attendance_for_student(&self, student: &str) -> StoreResult<Vec<AttendanceRecord>> {
        let data = self.inner.read().await;
        Ok(sorted_attendance(
            data.attendance.values().filter(|it| it.student == student),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::data::registration::Decision;
    use crate::data::user::PasswordHash;
    use crate::role::Role;

    #[tokio::test]
    async fn one_live_registration_per_pair() {
        let store = MemoryStore::new();
        let course = Uuid::new_v4();

        let first = Registration::new("s1", course);
        store.insert_registration(&first).await.expect("inserted");
        assert!(matches!(
            store.insert_registration(&Registration::new("s1", course)).await,
            Err(StoreError::Duplicate)
        ));

        // a rejection frees the pair again
        store
            .transition_registration(
                first.id,
                Decision::Reject.applies_to(),
                Decision::Reject.target(),
            )
            .await
            .expect("transitioned");
        let second = Registration::new("s1", course);
        store.insert_registration(&second).await.expect("re-requested");

        assert!(store.get_registration(first.id).await.expect("read").is_none());
        assert_eq!(
            store.registrations_for_student("s1").await.expect("read").len(),
            1
        );
    }

    #[tokio::test]
    async fn concurrent_requests_insert_once() {
        let store = Arc::new(MemoryStore::new());
        let course = Uuid::new_v4();

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .insert_registration(&Registration::new("s1", course))
                        .await
                        .is_ok()
                })
            })
            .collect();

        let mut inserted = 0;
        for task in tasks {
            if task.await.expect("task finished") {
                inserted += 1;
            }
        }
        assert_eq!(inserted, 1);
    }

    #[tokio::test]
    async fn transitions_only_apply_from_listed_statuses() {
        let store = MemoryStore::new();
        let registration = Registration::new("s1", Uuid::new_v4());
        store.insert_registration(&registration).await.expect("inserted");

        let approved = store
            .transition_registration(
                registration.id,
                Decision::Approve.applies_to(),
                Decision::Approve.target(),
            )
            .await
            .expect("transitioned")
            .expect("was pending");
        assert_eq!(approved.status, RegistrationStatus::Registered);
        assert!(approved.responded_at.is_some());

        let rejected = store
            .transition_registration(
                registration.id,
                Decision::Reject.applies_to(),
                Decision::Reject.target(),
            )
            .await
            .expect("no store error");
        assert!(rejected.is_none());
        assert!(store.is_registered("s1", registration.course).await.expect("read"));
    }

    #[tokio::test]
    async fn usernames_are_unique() {
        let store = MemoryStore::new();
        let user = User::new("s1_ana", PasswordHash([0; 24]), Role::Student);
        store.insert_user(&user).await.expect("inserted");
        assert!(matches!(
            store.insert_user(&user).await,
            Err(StoreError::Duplicate)
        ));

        let course = Uuid::new_v4();
        store.add_user_course("s1_ana", course).await.expect("added");
        store.add_user_course("s1_ana", course).await.expect("added");
        let stored = store
            .find_user_by_username("s1_ana")
            .await
            .expect("read")
            .expect("exists");
        assert_eq!(stored.courses, vec![course]);
        assert_eq!(store.remove_course_from_users(course).await.expect("pulled"), 1);
    }

    #[tokio::test]
    async fn attendance_marks_are_replaced() {
        let store = MemoryStore::new();
        let course = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2024, 9, 2).expect("valid date");
        let entry = |present| AttendanceEntry {
            student_id: "s1".to_string(),
            present,
        };

        store
            .upsert_attendance(course, date, &[entry(false)])
            .await
            .expect("marked");
        store
            .upsert_attendance(course, date, &[entry(true)])
            .await
            .expect("marked");

        let records = store
            .attendance_for_course(course, Some(date))
            .await
            .expect("read");
        assert_eq!(records.len(), 1);
        assert!(records[0].present);
        assert!(store
            .attendance_for_course(course, date.succ_opt())
            .await
            .expect("read")
            .is_empty());
    }
}
