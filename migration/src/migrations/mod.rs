pub mod m202601100001_create_users;
pub mod m202601100002_create_students;
pub mod m202601100003_create_rooms;
pub mod m202601100004_create_classes;
pub mod m202601100005_create_enrollments;
pub mod m202601100006_create_fingerprints;
pub mod m202601100007_create_room_activators;
pub mod m202601100008_create_iot_devices;
pub mod m202601100009_create_attendance_sessions;
pub mod m202601100010_create_notifications;
pub mod m202601100011_create_audit_logs;
