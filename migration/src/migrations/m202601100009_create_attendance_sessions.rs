use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m202601100009_create_attendance_sessions"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Alias::new("attendance_sessions"))
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Alias::new("id"))
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Alias::new("student_id")).integer().not_null())
                    .col(ColumnDef::new(Alias::new("class_id")).integer().not_null())
                    .col(ColumnDef::new(Alias::new("session_day")).date().not_null())
                    // 0 for the live session of a key; voided rows move to their own id.
                    .col(
                        ColumnDef::new(Alias::new("check_in_slot"))
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Alias::new("check_in_at")).timestamp().not_null())
                    .col(ColumnDef::new(Alias::new("check_out_at")).timestamp().null())
                    .col(ColumnDef::new(Alias::new("status")).string().not_null())
                    .col(ColumnDef::new(Alias::new("entry_method")).string().not_null())
                    .col(
                        ColumnDef::new(Alias::new("is_correction"))
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Alias::new("corrects_session_id")).integer().null())
                    .col(ColumnDef::new(Alias::new("original_check_in_at")).timestamp().null())
                    .col(ColumnDef::new(Alias::new("voided_at")).timestamp().null())
                    .col(ColumnDef::new(Alias::new("admin_note")).text().null())
                    .col(ColumnDef::new(Alias::new("note_by")).integer().null())
                    .col(ColumnDef::new(Alias::new("note_at")).timestamp().null())
                    .col(ColumnDef::new(Alias::new("created_by")).integer().null())
                    .col(
                        ColumnDef::new(Alias::new("created_at"))
                            .timestamp()
                            .not_null()
                            .default(Expr::cust("CURRENT_TIMESTAMP")),
                    )
                    .col(
                        ColumnDef::new(Alias::new("updated_at"))
                            .timestamp()
                            .not_null()
                            .default(Expr::cust("CURRENT_TIMESTAMP")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_att_sess_student")
                            .from(Alias::new("attendance_sessions"), Alias::new("student_id"))
                            .to(Alias::new("students"), Alias::new("id"))
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_att_sess_class")
                            .from(Alias::new("attendance_sessions"), Alias::new("class_id"))
                            .to(Alias::new("classes"), Alias::new("id"))
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_att_sess_corrects")
                            .from(
                                Alias::new("attendance_sessions"),
                                Alias::new("corrects_session_id"),
                            )
                            .to(Alias::new("attendance_sessions"), Alias::new("id"))
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // Turns a lost check-in race between two kiosks into a constraint violation.
        manager
            .create_index(
                Index::create()
                    .name("ux_att_sess_student_class_day_slot")
                    .table(Alias::new("attendance_sessions"))
                    .col(Alias::new("student_id"))
                    .col(Alias::new("class_id"))
                    .col(Alias::new("session_day"))
                    .col(Alias::new("check_in_slot"))
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ix_att_sess_class_day")
                    .table(Alias::new("attendance_sessions"))
                    .col(Alias::new("class_id"))
                    .col(Alias::new("session_day"))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(Alias::new("attendance_sessions"))
                    .to_owned(),
            )
            .await
    }
}
