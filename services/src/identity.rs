//! Turns a raw scan into a student or a room activator.
//!
//! Lookups are read-only apart from the audit entry written when a locked
//! fingerprint is presented.

use async_trait::async_trait;
use db::models::{audit_log, class, enrollment, fingerprint, room_activator, student, user};
use sea_orm::{ConnectionTrait, DatabaseConnection};

use crate::error::AttendanceError;

/// Who a biometric scan belongs to.
#[derive(Debug, Clone)]
pub enum Identity {
    Student(student::Model),
    /// Staff member whose finger switches a room's appliances instead of taking attendance.
    Activator {
        user: user::Model,
        binding: room_activator::Model,
    },
}

/// Resolves the owner of `slot` on `device_id`.
///
/// Student templates take precedence over activator bindings on the same slot.
pub async fn resolve_biometric<C: ConnectionTrait>(
    db: &C,
    device_id: &str,
    slot: i32,
) -> Result<Identity, AttendanceError> {
    if let Some(student) = fingerprint::Model::find_student(db, device_id, slot).await? {
        if student.fingerprint_locked {
            let detail = format!("device={device_id} slot={slot}");
            if let Err(err) = audit_log::Model::record(
                db,
                &format!("student:{}", student.id),
                "fingerprint_locked_scan",
                &detail,
            )
            .await
            {
                tracing::warn!(
                    student_id = student.id,
                    error = %err,
                    "failed to audit locked scan"
                );
            }
            return Err(AttendanceError::FingerprintLocked {
                student_name: student.full_name,
            });
        }
        return Ok(Identity::Student(student));
    }

    match room_activator::Model::find_for_scan(db, device_id, slot).await? {
        Some((binding, user)) if user.can_activate_room => {
            Ok(Identity::Activator { user, binding })
        }
        Some((_, user)) => {
            tracing::info!(
                user_id = user.id,
                device_id,
                slot,
                "activator binding without room permission"
            );
            Err(AttendanceError::IdentityNotFound)
        }
        None => Err(AttendanceError::IdentityNotFound),
    }
}

/// Fails with `NotEnrolled` unless `student` actively attends `class_id`.
pub async fn ensure_enrolled<C: ConnectionTrait>(
    db: &C,
    student: &student::Model,
    class_id: i64,
) -> Result<(), AttendanceError> {
    if enrollment::Model::is_enrolled(db, student.id, class_id).await? {
        Ok(())
    } else {
        Err(AttendanceError::NotEnrolled {
            student_name: student.full_name.clone(),
        })
    }
}

/// Fields a name-based terminal sends to identify a student and class.
#[derive(Debug, Clone, Copy)]
pub struct NameLookup<'a> {
    pub student_name: &'a str,
    pub class_id: Option<i64>,
    pub class_name: Option<&'a str>,
    pub instructor_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct ResolvedName {
    pub student: student::Model,
    pub class: class::Model,
}

/// One strategy for resolving a [`NameLookup`].
#[async_trait]
pub trait NameResolver: Send + Sync {
    fn label(&self) -> &'static str;

    async fn resolve(
        &self,
        db: &DatabaseConnection,
        lookup: &NameLookup<'_>,
    ) -> Result<ResolvedName, AttendanceError>;
}

/// Trusts the `class_id` carried by the event.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassScopedResolver;

#[async_trait]
impl NameResolver for ClassScopedResolver {
    fn label(&self) -> &'static str {
        "class_scoped"
    }

    async fn resolve(
        &self,
        db: &DatabaseConnection,
        lookup: &NameLookup<'_>,
    ) -> Result<ResolvedName, AttendanceError> {
        let class_id = lookup
            .class_id
            .ok_or_else(|| AttendanceError::InvalidRequest("class_id is required".into()))?;
        let class = class::Model::get_by_id(db, class_id)
            .await?
            .ok_or_else(|| AttendanceError::NotFound(format!("Class {class_id}")))?;

        if let Some(instructor_id) = lookup.instructor_id {
            if instructor_id != class.instructor_id {
                return Err(AttendanceError::InvalidRequest(format!(
                    "class {class_id} is not taught by instructor {instructor_id}"
                )));
            }
        }

        let student = student_for_instructor(db, lookup.student_name, class.instructor_id).await?;
        Ok(ResolvedName { student, class })
    }
}

/// Re-resolves the class from its name, then the student within that class's instructor.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectTableResolver;

#[async_trait]
impl NameResolver for DirectTableResolver {
    fn label(&self) -> &'static str {
        "direct_table"
    }

    async fn resolve(
        &self,
        db: &DatabaseConnection,
        lookup: &NameLookup<'_>,
    ) -> Result<ResolvedName, AttendanceError> {
        let class = match lookup.class_name {
            Some(name) => {
                let mut classes = class::Model::find_by_name(db, name, lookup.instructor_id).await?;
                match classes.len() {
                    1 => classes.remove(0),
                    0 => return Err(AttendanceError::NotFound(format!("Class '{name}'"))),
                    _ => {
                        return Err(AttendanceError::InvalidRequest(format!(
                            "class name '{name}' is ambiguous"
                        )));
                    }
                }
            }
            None => match lookup.class_id {
                Some(id) => class::Model::get_by_id(db, id)
                    .await?
                    .ok_or_else(|| AttendanceError::NotFound(format!("Class {id}")))?,
                None => {
                    return Err(AttendanceError::InvalidRequest(
                        "class_name or class_id is required".into(),
                    ));
                }
            },
        };

        let student = student_for_instructor(db, lookup.student_name, class.instructor_id).await?;
        Ok(ResolvedName { student, class })
    }
}

async fn student_for_instructor<C: ConnectionTrait>(
    db: &C,
    name: &str,
    instructor_id: i64,
) -> Result<student::Model, AttendanceError> {
    let mut found = student::Model::find_by_name_for_instructor(db, name, instructor_id).await?;
    match found.len() {
        1 => Ok(found.remove(0)),
        0 => Err(AttendanceError::IdentityNotFound),
        n => {
            tracing::info!(matches = n, instructor_id, "student name is ambiguous");
            Err(AttendanceError::IdentityNotFound)
        }
    }
}
