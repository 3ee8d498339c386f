pub mod attendance_session;
pub mod audit_log;
pub mod class;
pub mod enrollment;
pub mod fingerprint;
pub mod iot_device;
pub mod notification;
pub mod room;
pub mod room_activator;
pub mod student;
pub mod user;

pub use attendance_session::Entity as AttendanceSession;
pub use audit_log::Entity as AuditLog;
pub use class::Entity as Class;
pub use enrollment::Entity as Enrollment;
pub use fingerprint::Entity as Fingerprint;
pub use iot_device::Entity as IotDevice;
pub use notification::Entity as Notification;
pub use room::Entity as Room;
pub use room_activator::Entity as RoomActivator;
pub use student::Entity as Student;
pub use user::Entity as User;
